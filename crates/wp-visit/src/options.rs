//! Caller-facing visit options.

use crate::callbacks::VisitCallbacks;
use crate::method::VisitMethod;
use crate::payload::QueryStringArrayFormat;
use crate::payload::RequestPayload;
use serde_json::Value;
use std::collections::BTreeMap;

/// Options for one navigation. Unset fields fall back to the builder defaults.
#[derive(Debug, Clone, Default)]
pub struct VisitOptions {
    pub method: Option<VisitMethod>,
    pub data: RequestPayload,
    pub replace: Option<bool>,
    pub preserve_scroll: Option<bool>,
    pub preserve_state: Option<bool>,
    pub only: Option<Vec<String>>,
    pub except: Option<Vec<String>>,
    pub headers: BTreeMap<String, String>,
    pub error_bag: Option<String>,
    pub force_form_data: Option<bool>,
    pub query_string_array_format: Option<QueryStringArrayFormat>,
    pub is_async: Option<bool>,
    pub show_progress: Option<bool>,
    pub fresh: Option<bool>,
    pub reset: Option<Vec<String>>,
    pub preserve_url: Option<bool>,
    pub prefetch: Option<bool>,
    pub frame: Option<String>,
    pub callbacks: VisitCallbacks,
}

/// Options accepted by `reload`; the router forces the reload-specific fields.
pub type ReloadOptions = VisitOptions;

impl VisitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: VisitMethod) -> Self {
        self.method = Some(method);
        self
    }

    pub fn data(mut self, data: RequestPayload) -> Self {
        self.data = data;
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.data.insert(name.into(), value);
        self
    }

    pub fn replace(mut self, replace: bool) -> Self {
        self.replace = Some(replace);
        self
    }

    pub fn preserve_scroll(mut self, preserve: bool) -> Self {
        self.preserve_scroll = Some(preserve);
        self
    }

    pub fn preserve_state(mut self, preserve: bool) -> Self {
        self.preserve_state = Some(preserve);
        self
    }

    pub fn only<I, S>(mut self, props: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.only = Some(props.into_iter().map(Into::into).collect());
        self
    }

    pub fn except<I, S>(mut self, props: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.except = Some(props.into_iter().map(Into::into).collect());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn error_bag(mut self, bag: impl Into<String>) -> Self {
        self.error_bag = Some(bag.into());
        self
    }

    pub fn force_form_data(mut self, force: bool) -> Self {
        self.force_form_data = Some(force);
        self
    }

    pub fn query_string_array_format(mut self, format: QueryStringArrayFormat) -> Self {
        self.query_string_array_format = Some(format);
        self
    }

    pub fn asynchronous(mut self, is_async: bool) -> Self {
        self.is_async = Some(is_async);
        self
    }

    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = Some(show);
        self
    }

    pub fn fresh(mut self, fresh: bool) -> Self {
        self.fresh = Some(fresh);
        self
    }

    pub fn reset<I, S>(mut self, props: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reset = Some(props.into_iter().map(Into::into).collect());
        self
    }

    pub fn preserve_url(mut self, preserve: bool) -> Self {
        self.preserve_url = Some(preserve);
        self
    }

    pub fn frame(mut self, frame: impl Into<String>) -> Self {
        self.frame = Some(frame.into());
        self
    }

    pub fn callbacks(mut self, callbacks: VisitCallbacks) -> Self {
        self.callbacks = callbacks;
        self
    }
}
