//! Marker bridging a server-forced full navigation.
//!
//! Before the browser leaves the document, the preserve-scroll choice is
//! written to session storage; the next load consumes it once.

use crate::error::VisitError;
use crate::platform::SessionStore;
use log::warn;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationVisit {
    #[serde(default)]
    pub preserve_scroll: bool,
}

impl LocationVisit {
    /// Persist the marker under `key`.
    ///
    /// # Errors
    /// Fails when session storage rejects the write.
    pub fn store(self, session: &dyn SessionStore, key: &str) -> Result<(), VisitError> {
        let encoded = serde_json::to_string(&self)?;
        session
            .set_item(key, &encoded)
            .map_err(VisitError::Browser)
    }

    pub fn exists(session: &dyn SessionStore, key: &str) -> bool {
        session.get_item(key).is_some()
    }

    /// Read and remove the marker. A malformed marker is dropped and treated
    /// as `preserveScroll: false`.
    pub fn take(session: &dyn SessionStore, key: &str) -> Option<Self> {
        let raw = session.get_item(key)?;
        session.remove_item(key);
        Some(serde_json::from_str(&raw).unwrap_or_else(|err| {
            warn!("ignoring malformed location visit marker: {err}");
            Self::default()
        }))
    }
}
