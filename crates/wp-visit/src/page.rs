//! Page snapshots and navigation responses.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Frame id of the top-level view.
pub const TOP_FRAME: &str = "_top";

/// Current view state of one frame: component identity, props and URL.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub component: String,
    #[serde(default)]
    pub props: serde_json::Map<String, Value>,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Deferred prop groups: group name to member prop names.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub deferred_props: BTreeMap<String, Vec<String>>,
}

impl Page {
    pub fn new(component: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_prop(mut self, name: impl Into<String>, value: Value) -> Self {
        self.props.insert(name.into(), value);
        self
    }

    pub fn with_deferred_group<I, S>(mut self, group: impl Into<String>, props: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deferred_props
            .insert(group.into(), props.into_iter().map(Into::into).collect());
        self
    }

    /// Validation errors returned with the page, optionally scoped to an error bag.
    pub fn validation_errors(&self, error_bag: &str) -> Option<&serde_json::Map<String, Value>> {
        let errors = self.props.get("errors")?.as_object()?;
        let scoped = if error_bag.is_empty() {
            errors
        } else {
            errors.get(error_bag)?.as_object()?
        };

        if scoped.is_empty() { None } else { Some(scoped) }
    }

    /// Merges `incoming` props per key, keeping everything else.
    pub fn merge_props(&mut self, incoming: serde_json::Map<String, Value>) {
        for (key, value) in incoming {
            self.props.insert(key, value);
        }
    }
}

/// Server answer to a visit as reported by the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitResponse {
    pub status: u16,
    #[serde(default)]
    pub page: Option<Page>,
}

impl VisitResponse {
    pub fn ok(page: Page) -> Self {
        Self {
            status: 200,
            page: Some(page),
        }
    }

    pub fn status(status: u16) -> Self {
        Self { status, page: None }
    }

    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.status) && self.page.is_some()
    }
}
