//! Turns caller options into a complete `PendingVisit`.

use crate::headers::validate_header;
use crate::options::VisitOptions;
use crate::page::TOP_FRAME;
use crate::payload::transform_url_and_data;
use crate::pending::PendingVisit;
use crate::target::VisitTarget;
use crate::target::resolve_target;
use url::Url;
use wp_core::WaypointResult;

/// Pure visit normalizer: identical inputs always produce identical visits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitBuilder {
    base: Url,
}

impl VisitBuilder {
    /// `base` resolves relative hrefs (normally the current page URL).
    pub fn new(base: &Url) -> Self {
        Self { base: base.clone() }
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn build(
        &self,
        target: impl Into<VisitTarget>,
        options: &VisitOptions,
    ) -> WaypointResult<PendingVisit> {
        let target = target.into();
        let url = resolve_target(&target, &self.base)?;

        for (name, value) in &options.headers {
            validate_header(name, value)?;
        }

        let method = options.method.unwrap_or_default();
        let force_form_data = options.force_form_data.unwrap_or(false);
        let query_string_array_format = options.query_string_array_format.unwrap_or_default();
        let (url, body) = transform_url_and_data(
            url,
            &options.data,
            method,
            force_form_data,
            query_string_array_format,
        );
        tracing::trace!(url = %url, method = %method, "visit normalized");

        Ok(PendingVisit {
            url,
            method,
            body,
            replace: options.replace.unwrap_or(false),
            preserve_scroll: options.preserve_scroll.unwrap_or(false),
            preserve_state: options.preserve_state.unwrap_or(false),
            only: options.only.clone().unwrap_or_default(),
            except: options.except.clone().unwrap_or_default(),
            headers: options.headers.clone(),
            error_bag: options.error_bag.clone().unwrap_or_default(),
            force_form_data,
            query_string_array_format,
            is_async: options.is_async.unwrap_or(false),
            show_progress: options.show_progress.unwrap_or(true),
            fresh: options.fresh.unwrap_or(false),
            reset: options.reset.clone().unwrap_or_default(),
            preserve_url: options.preserve_url.unwrap_or(false),
            prefetch: options.prefetch.unwrap_or(false),
            frame: options
                .frame
                .clone()
                .unwrap_or_else(|| TOP_FRAME.to_owned()),
            termination: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::VisitBuilder;
    use crate::method::VisitMethod;
    use crate::options::VisitOptions;
    use crate::payload::VisitBody;
    use crate::page::TOP_FRAME;
    use serde_json::json;

    fn builder() -> VisitBuilder {
        match url::Url::parse("https://app.test/users") {
            Ok(base) => VisitBuilder::new(&base),
            Err(error) => panic!("{error}"),
        }
    }

    #[test]
    fn applies_defaults_for_unset_options() {
        let visit = builder().build("/users/1", &VisitOptions::default());
        let visit = match visit {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };

        assert_eq!(visit.method, VisitMethod::Get);
        assert!(!visit.is_async);
        assert!(visit.show_progress);
        assert!(!visit.preserve_state);
        assert!(!visit.preserve_scroll);
        assert_eq!(visit.frame, TOP_FRAME);
        assert_eq!(visit.body, VisitBody::Empty);
        assert!(!visit.cancelled() && !visit.completed() && !visit.interrupted());
    }

    #[test]
    fn caller_values_win_over_defaults() {
        let options = VisitOptions::new()
            .method(VisitMethod::Post)
            .preserve_scroll(true)
            .show_progress(false)
            .frame("sidebar")
            .only(["users"])
            .field("name", json!("Ada"));

        let visit = match builder().build("/users", &options) {
            Ok(value) => value,
            Err(error) => panic!("{error}"),
        };

        assert_eq!(visit.method, VisitMethod::Post);
        assert!(visit.preserve_scroll);
        assert!(!visit.show_progress);
        assert_eq!(visit.frame, "sidebar");
        assert_eq!(visit.only, vec!["users".to_owned()]);
        assert_eq!(visit.body, VisitBody::Json(json!({ "name": "Ada" })));
    }

    #[test]
    fn build_is_deterministic() {
        let options = VisitOptions::new().field("q", json!("rust"));
        let first = builder().build("/search", &options);
        let second = builder().build("/search", &options);
        assert_eq!(first, second);
    }

    #[test]
    fn invalid_caller_header_is_a_usage_error() {
        let options = VisitOptions::new().header("X-Bad", "a\nb");
        let visit = builder().build("/users", &options);
        assert!(visit.is_err());
        if let Err(error) = visit {
            assert_eq!(error.code, "visit.header_value_invalid");
        }
    }
}
