//! Header validation for outbound navigation requests.

use wp_core::WaypointError;
use wp_core::WaypointResult;

/// Single header with validated wire-safe name/value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: &str, value: &str) -> WaypointResult<Self> {
        validate_header(name, value)?;
        Ok(Self {
            name: name.to_owned(),
            value: value.to_owned(),
        })
    }
}

pub fn validate_header(name: &str, value: &str) -> WaypointResult<()> {
    if !is_valid_header_name(name) {
        return Err(WaypointError::new(
            "visit.header_name_invalid",
            format!("invalid HTTP header name `{name}`"),
        ));
    }

    if value.bytes().any(|byte| matches!(byte, b'\r' | b'\n' | 0)) {
        return Err(WaypointError::new(
            "visit.header_value_invalid",
            format!("invalid characters found in HTTP header `{name}`"),
        ));
    }

    Ok(())
}

/// Case-insensitive lookup over an ordered header list.
pub fn find_header<'a>(headers: &'a [Header], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|header| header.name.eq_ignore_ascii_case(name))
        .map(|header| header.value.as_str())
}

/// Inserts or overwrites `name`, matching case-insensitively.
pub fn upsert_header(headers: &mut Vec<Header>, header: Header) {
    match headers
        .iter_mut()
        .find(|existing| existing.name.eq_ignore_ascii_case(&header.name))
    {
        Some(existing) => *existing = header,
        None => headers.push(header),
    }
}

fn is_valid_header_name(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }

    name.bytes().all(is_token_char)
}

fn is_token_char(byte: u8) -> bool {
    byte.is_ascii_alphanumeric()
        || matches!(
            byte,
            b'!' | b'#'
                | b'$'
                | b'%'
                | b'&'
                | b'\''
                | b'*'
                | b'+'
                | b'-'
                | b'.'
                | b'^'
                | b'_'
                | b'`'
                | b'|'
                | b'~'
        )
}
