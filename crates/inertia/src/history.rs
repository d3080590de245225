//! Page snapshots stored on history entries.
//!
//! Each entry carries the serialized [`Page`] that produced it, so a
//! back/forward traversal can restore the page without a round trip.

use crate::error::VisitError;
use crate::page::Page;
use crate::platform::{HistoryState, HistoryStore};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::Arc;
use url::Url;

pub const REMEMBERED_STATE_KEY: &str = "rememberedState";
pub const SCROLL_REGIONS_KEY: &str = "scrollRegions";
pub const VERSION_KEY: &str = "version";

/// Default key for [`History::remember`] and [`History::restore`].
pub const DEFAULT_REMEMBER_KEY: &str = "default";

#[derive(Clone)]
pub struct History {
    store: Arc<dyn HistoryStore>,
}

impl History {
    pub fn new(store: Arc<dyn HistoryStore>) -> Self {
        Self { store }
    }

    /// Add an entry for `page`.
    ///
    /// # Errors
    /// Fails when the page does not serialize or the store rejects it.
    pub fn push_page(&self, page: &Page, url: &Url) -> Result<(), VisitError> {
        let state = page_state(page)?;
        self.store
            .push_state(state, url)
            .map_err(VisitError::History)
    }

    /// Overwrite the current entry with `page`.
    ///
    /// # Errors
    /// Fails when the page does not serialize or the store rejects it.
    pub fn replace_page(&self, page: &Page, url: Option<&Url>) -> Result<(), VisitError> {
        let state = page_state(page)?;
        self.store
            .replace_state(state, url)
            .map_err(VisitError::History)
    }

    pub fn has_any_state(&self) -> bool {
        self.store.state().is_some()
    }

    pub fn get_state(&self, key: &str) -> Option<Value> {
        self.store.state().and_then(|mut state| state.remove(key))
    }

    /// Typed read of one key. Missing or mistyped values yield `None`.
    pub fn get_state_as<Target: DeserializeOwned>(&self, key: &str) -> Option<Target> {
        self.get_state(key)
            .and_then(|value| serde_json::from_value(value).ok())
    }

    /// Set one key on the current entry.
    ///
    /// # Errors
    /// Fails when the store rejects the write.
    pub fn set_state(&self, key: &str, value: Value) -> Result<(), VisitError> {
        let mut state = self.store.state().unwrap_or_default();
        state.insert(key.to_owned(), value);
        self.store
            .replace_state(state, None)
            .map_err(VisitError::History)
    }

    /// Remove one key from the current entry. A no-op without state.
    ///
    /// # Errors
    /// Fails when the store rejects the write.
    pub fn delete_state(&self, key: &str) -> Result<(), VisitError> {
        let Some(mut state) = self.store.state() else {
            return Ok(());
        };
        if state.remove(key).is_some() {
            self.store
                .replace_state(state, None)
                .map_err(VisitError::History)?;
        }
        Ok(())
    }

    /// The page stored on the current entry.
    ///
    /// # Errors
    /// Fails when the entry holds state that is not a page.
    pub fn get_all_state(&self) -> Result<Option<Page>, VisitError> {
        self.store
            .state()
            .map(|state| serde_json::from_value(Value::Object(state)))
            .transpose()
            .map_err(VisitError::from)
    }

    /// Remembered state of the current entry, if any was stored.
    pub fn remembered_state(&self) -> Option<Map<String, Value>> {
        match self.get_state(REMEMBERED_STATE_KEY) {
            Some(Value::Object(state)) => Some(state),
            Some(_) | None => None,
        }
    }

    /// Store `data` under `key` in the current entry's remembered state.
    ///
    /// # Errors
    /// Fails when `data` does not serialize or the store rejects the write.
    pub fn remember<Data: Serialize>(&self, data: &Data, key: &str) -> Result<(), VisitError> {
        let mut remembered = self.remembered_state().unwrap_or_default();
        remembered.insert(key.to_owned(), serde_json::to_value(data)?);
        self.set_state(REMEMBERED_STATE_KEY, Value::Object(remembered))
    }

    /// Value previously stored with [`History::remember`].
    pub fn restore(&self, key: &str) -> Option<Value> {
        self.remembered_state()
            .and_then(|mut remembered| remembered.remove(key))
    }
}

fn page_state(page: &Page) -> Result<HistoryState, VisitError> {
    match serde_json::to_value(page)? {
        Value::Object(state) => Ok(state),
        _ => Ok(HistoryState::new()),
    }
}
