//! Cache keys identifying the same cacheable request across call sites.

use crate::method::VisitMethod;
use crate::payload::VisitBody;
use crate::pending::PendingVisit;
use crate::target::without_fragment;
use std::fmt;
use url::Url;

/// Deterministic key over URL, method, payload and partial-reload selectors.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestFingerprint(String);

impl RequestFingerprint {
    pub fn of(visit: &PendingVisit) -> Self {
        Self::from_parts(
            &visit.url,
            visit.method,
            &visit.body,
            &visit.only,
            &visit.except,
        )
    }

    pub fn from_parts(
        url: &Url,
        method: VisitMethod,
        body: &VisitBody,
        only: &[String],
        except: &[String],
    ) -> Self {
        let url = without_fragment(url);
        Self(format!(
            "{} {}|body={}|only={}|except={}",
            method.as_str(),
            url.as_str(),
            body.canonical(),
            normalized_selectors(only),
            normalized_selectors(except),
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn normalized_selectors(selectors: &[String]) -> String {
    let mut sorted: Vec<&str> = selectors.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.dedup();
    sorted.join(",")
}

#[cfg(test)]
mod tests {
    use super::RequestFingerprint;
    use crate::method::VisitMethod;
    use crate::payload::VisitBody;
    use proptest::prelude::*;
    use serde_json::json;

    fn url(input: &str) -> url::Url {
        match url::Url::parse(input) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        }
    }

    #[test]
    fn fragment_does_not_change_fingerprint() {
        let plain = RequestFingerprint::from_parts(
            &url("https://app.test/docs"),
            VisitMethod::Get,
            &VisitBody::Empty,
            &[],
            &[],
        );
        let anchored = RequestFingerprint::from_parts(
            &url("https://app.test/docs#intro"),
            VisitMethod::Get,
            &VisitBody::Empty,
            &[],
            &[],
        );
        assert_eq!(plain, anchored);
    }

    #[test]
    fn method_and_body_distinguish_requests() {
        let target = url("https://app.test/users");
        let get = RequestFingerprint::from_parts(&target, VisitMethod::Get, &VisitBody::Empty, &[], &[]);
        let post = RequestFingerprint::from_parts(
            &target,
            VisitMethod::Post,
            &VisitBody::Json(json!({ "name": "Ada" })),
            &[],
            &[],
        );
        assert_ne!(get, post);
    }

    proptest! {
        #[test]
        fn selector_order_and_duplicates_are_ignored(
            mut selectors in proptest::collection::vec("[a-z]{1,6}", 0..6)
        ) {
            let target = url("https://app.test/feed");
            let first = RequestFingerprint::from_parts(
                &target, VisitMethod::Get, &VisitBody::Empty, &selectors, &[],
            );
            selectors.reverse();
            let duplicated: Vec<String> = selectors.iter().chain(selectors.iter()).cloned().collect();
            let second = RequestFingerprint::from_parts(
                &target, VisitMethod::Get, &VisitBody::Empty, &duplicated, &[],
            );
            prop_assert_eq!(first, second);
        }
    }
}
