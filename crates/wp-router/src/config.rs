//! Router configuration.

use serde::Deserialize;
use std::time::Duration;
use url::Url;
use wp_core::WaypointError;
use wp_core::WaypointResult;
use wp_visit::TOP_FRAME;

pub const DEFAULT_CACHE_FOR_MS: u64 = 30_000;
pub const DEFAULT_BASE_URL: &str = "http://localhost/";

/// Router-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Frame the router navigates and scopes history to.
    pub frame: String,
    /// TTL applied to prefetches that do not pass one explicitly.
    pub default_cache_for_ms: u64,
    /// Resolves relative targets while no page is loaded.
    pub base_url: String,
    pub asset_version: Option<String>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            frame: TOP_FRAME.to_owned(),
            default_cache_for_ms: DEFAULT_CACHE_FOR_MS,
            base_url: DEFAULT_BASE_URL.to_owned(),
            asset_version: None,
        }
    }
}

impl RouterConfig {
    pub fn from_json(input: &str) -> WaypointResult<Self> {
        let config: Self = serde_json::from_str(input).map_err(|error| {
            WaypointError::new(
                "config.parse_failed",
                format!("failed to parse router config: {error}"),
            )
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `WAYPOINT_FRAME`, `WAYPOINT_CACHE_FOR_MS` and `WAYPOINT_BASE_URL`.
    pub fn with_env_overrides(self) -> WaypointResult<Self> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> WaypointResult<Self> {
        if let Some(frame) = lookup("WAYPOINT_FRAME") {
            self.frame = frame;
        }

        if let Some(cache_for) = lookup("WAYPOINT_CACHE_FOR_MS") {
            self.default_cache_for_ms = cache_for.trim().parse().map_err(|error| {
                WaypointError::new(
                    "config.cache_for_invalid",
                    format!("WAYPOINT_CACHE_FOR_MS `{cache_for}` is not a millisecond count: {error}"),
                )
            })?;
        }

        if let Some(base_url) = lookup("WAYPOINT_BASE_URL") {
            self.base_url = base_url;
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> WaypointResult<()> {
        if self.frame.trim().is_empty() {
            return Err(WaypointError::new(
                "config.frame_empty",
                "router frame name must not be empty",
            ));
        }

        self.base_url()?;
        Ok(())
    }

    pub fn default_cache_for(&self) -> Duration {
        Duration::from_millis(self.default_cache_for_ms)
    }

    pub fn base_url(&self) -> WaypointResult<Url> {
        wp_visit::target::parse_base(&self.base_url)
    }
}
