//! Router configuration.
//!
//! Settings can be constructed programmatically or loaded from environment
//! variables.

use crate::query::ArrayFormat;
use std::env;

/// Session storage key of the location-visit marker.
pub const DEFAULT_LOCATION_VISIT_KEY: &str = "inertiaLocationVisit";

/// Runtime configuration for a [`Router`](crate::router::Router).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouterConfig {
    /// Array spelling used when GET payloads are folded into the query string
    pub array_format: ArrayFormat,
    /// Session key bridging a location visit across the full page load
    pub location_visit_key: String,
    /// Whether a browser reload drops the remembered state of the entry
    pub clear_remembered_state_on_reload: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new(ArrayFormat::Brackets)
    }
}

impl RouterConfig {
    /// Create a configuration with the given array format and stock defaults.
    #[inline]
    #[must_use]
    pub fn new(array_format: ArrayFormat) -> Self {
        Self {
            array_format,
            location_visit_key: DEFAULT_LOCATION_VISIT_KEY.to_owned(),
            clear_remembered_state_on_reload: true,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `INERTIA_ARRAY_FORMAT`: `brackets` or `indices` (default: brackets)
    /// - `INERTIA_LOCATION_VISIT_KEY`: session key of the location-visit marker
    /// - `INERTIA_CLEAR_REMEMBERED_ON_RELOAD`: set to "0" to keep remembered
    ///   state across reloads (default: cleared)
    ///
    /// Unparseable values fall back to the defaults.
    #[inline]
    #[must_use]
    pub fn from_env() -> Self {
        let array_format = env::var("INERTIA_ARRAY_FORMAT")
            .ok()
            .and_then(|val| val.parse::<ArrayFormat>().ok())
            .unwrap_or_default();
        let location_visit_key = env::var("INERTIA_LOCATION_VISIT_KEY")
            .ok()
            .filter(|val| !val.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LOCATION_VISIT_KEY.to_owned());
        let clear_remembered_state_on_reload =
            env::var("INERTIA_CLEAR_REMEMBERED_ON_RELOAD").ok().as_deref() != Some("0");
        Self {
            array_format,
            location_visit_key,
            clear_remembered_state_on_reload,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_location_visit_key(mut self, key: impl Into<String>) -> Self {
        self.location_visit_key = key.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn with_clear_remembered_state_on_reload(mut self, clear: bool) -> Self {
        self.clear_remembered_state_on_reload = clear;
        self
    }
}
