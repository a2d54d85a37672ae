//! Target URL resolution and validation.

use url::Url;
use wp_core::WaypointError;
use wp_core::WaypointResult;

/// Where a visit should go: an absolute URL or an href relative to the current page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisitTarget {
    Url(Url),
    Href(String),
}

impl From<Url> for VisitTarget {
    fn from(value: Url) -> Self {
        Self::Url(value)
    }
}

impl From<&Url> for VisitTarget {
    fn from(value: &Url) -> Self {
        Self::Url(value.clone())
    }
}

impl From<&str> for VisitTarget {
    fn from(value: &str) -> Self {
        Self::Href(value.to_owned())
    }
}

impl From<String> for VisitTarget {
    fn from(value: String) -> Self {
        Self::Href(value)
    }
}

impl From<&String> for VisitTarget {
    fn from(value: &String) -> Self {
        Self::Href(value.clone())
    }
}

/// Resolves a target against `base` and applies navigation URL policy.
pub fn resolve_target(target: &VisitTarget, base: &Url) -> WaypointResult<Url> {
    let url = match target {
        VisitTarget::Url(url) => url.clone(),
        VisitTarget::Href(href) => base.join(href.trim()).map_err(|error| {
            WaypointError::new(
                "visit.url.invalid",
                format!("failed to resolve `{href}` against `{base}`: {error}"),
            )
        })?,
    };

    validate_navigation_url(&url)?;
    Ok(url)
}

/// Parses an absolute URL used as a resolution base.
pub fn parse_base(input: &str) -> WaypointResult<Url> {
    let url = Url::parse(input).map_err(|error| {
        WaypointError::new(
            "visit.url.invalid",
            format!("failed to parse URL `{input}`: {error}"),
        )
    })?;
    validate_navigation_url(&url)?;
    Ok(url)
}

fn validate_navigation_url(url: &Url) -> WaypointResult<()> {
    if url.cannot_be_a_base() {
        return Err(WaypointError::new(
            "visit.url.invalid_base",
            format!("`{url}` cannot be used for navigation"),
        ));
    }

    if !matches!(url.scheme(), "http" | "https") {
        return Err(WaypointError::new(
            "visit.url.scheme_unsupported",
            format!("unsupported scheme `{}`", url.scheme()),
        ));
    }

    if !url.username().is_empty() || url.password().is_some() {
        return Err(WaypointError::new(
            "visit.url.credentials_disallowed",
            "URL userinfo (`username:password@`) is not allowed",
        ));
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(WaypointError::new(
            "visit.url.host_missing",
            "URL must include a host",
        ));
    }

    Ok(())
}

/// URL as sent on the wire: fragments are client-side only.
pub fn without_fragment(url: &Url) -> Url {
    let mut out = url.clone();
    out.set_fragment(None);
    out
}
