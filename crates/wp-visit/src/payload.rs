//! Payload encoding into query strings and request bodies.

use crate::method::VisitMethod;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use url::Url;
use url::form_urlencoded;

/// Caller-supplied visit data.
pub type RequestPayload = serde_json::Map<String, Value>;

/// How arrays are spelled in encoded keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryStringArrayFormat {
    /// `tags[]=a&tags[]=b`
    #[default]
    Brackets,
    /// `tags[0]=a&tags[1]=b`
    Indices,
}

/// One field of a multipart body.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FormField {
    pub name: String,
    pub value: String,
}

/// Encoded request body.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum VisitBody {
    #[default]
    Empty,
    Json(Value),
    Multipart(Vec<FormField>),
}

impl VisitBody {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Json(_) => false,
            Self::Multipart(fields) => fields.is_empty(),
        }
    }

    /// Stable textual form used for fingerprinting.
    pub fn canonical(&self) -> String {
        match self {
            Self::Empty => String::new(),
            // serde_json object keys are kept sorted, so this is deterministic.
            Self::Json(value) => value.to_string(),
            Self::Multipart(fields) => fields
                .iter()
                .map(|field| format!("{}={}", field.name, field.value))
                .collect::<Vec<_>>()
                .join("&"),
        }
    }
}

/// Places `data` either into the URL query (GET) or into a body.
///
/// `force_form_data` always produces a multipart body, even for GET.
pub fn transform_url_and_data(
    mut url: Url,
    data: &RequestPayload,
    method: VisitMethod,
    force_form_data: bool,
    format: QueryStringArrayFormat,
) -> (Url, VisitBody) {
    if force_form_data {
        let fields = flatten_payload(data, format)
            .into_iter()
            .map(|(name, value)| FormField { name, value })
            .collect();
        return (url, VisitBody::Multipart(fields));
    }

    if method.encodes_payload_in_url() {
        merge_into_query(&mut url, data, format);
        return (url, VisitBody::Empty);
    }

    (url, VisitBody::Json(Value::Object(data.clone())))
}

/// Flattens nested payload values into bracketed key/value pairs.
pub fn flatten_payload(data: &RequestPayload, format: QueryStringArrayFormat) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for (key, value) in data {
        flatten_value(key.clone(), value, format, &mut out);
    }
    out
}

fn flatten_value(
    prefix: String,
    value: &Value,
    format: QueryStringArrayFormat,
    out: &mut Vec<(String, String)>,
) {
    match value {
        Value::Null => out.push((prefix, String::new())),
        Value::Bool(flag) => out.push((prefix, flag.to_string())),
        Value::Number(number) => out.push((prefix, number.to_string())),
        Value::String(text) => out.push((prefix, text.clone())),
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                let key = match format {
                    QueryStringArrayFormat::Brackets => format!("{prefix}[]"),
                    QueryStringArrayFormat::Indices => format!("{prefix}[{index}]"),
                };
                flatten_value(key, item, format, out);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                flatten_value(format!("{prefix}[{key}]"), item, format, out);
            }
        }
    }
}

fn merge_into_query(url: &mut Url, data: &RequestPayload, format: QueryStringArrayFormat) {
    if data.is_empty() {
        return;
    }

    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !data.contains_key(key_root(key)))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    pairs.extend(flatten_payload(data, format));

    if pairs.is_empty() {
        url.set_query(None);
        return;
    }

    let query = pairs
        .iter()
        .map(|(key, value)| format!("{}={}", encode_key(key), encode_component(value)))
        .collect::<Vec<_>>()
        .join("&");
    url.set_query(Some(&query));
}

fn key_root(key: &str) -> &str {
    key.split('[').next().unwrap_or(key)
}

fn encode_component(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

fn encode_key(key: &str) -> String {
    encode_component(key).replace("%5B", "[").replace("%5D", "]")
}
