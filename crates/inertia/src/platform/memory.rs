//! In-process collaborators.
//!
//! [`MemoryBrowser`] models one tab: a session history stack, session storage
//! and the address bar. The remaining types stand in for the view layer when
//! no renderer is attached.

use super::{
    ComponentHandle, ComponentResolver, HistoryState, HistoryStore, InvalidResponseView,
    Location, NavigationType, ScrollKeeper, SessionStore, Swap, ViewSwapper,
};
use crate::page::Page;
use crate::sync::lock;
use async_trait::async_trait;
use core::mem;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use url::Url;

#[derive(Clone, Debug)]
struct Entry {
    url: Url,
    state: Option<HistoryState>,
}

#[derive(Debug)]
struct BrowserState {
    back: Vec<Entry>,
    current: Entry,
    forward: Vec<Entry>,
    session: BTreeMap<String, String>,
    navigation_type: NavigationType,
    assigned: Vec<Url>,
    reloads: usize,
}

impl BrowserState {
    fn push(&mut self, entry: Entry) {
        let previous = mem::replace(&mut self.current, entry);
        self.back.push(previous);
        self.forward.clear();
    }
}

/// One browser tab held in memory.
#[derive(Debug)]
pub struct MemoryBrowser {
    state: Mutex<BrowserState>,
}

impl MemoryBrowser {
    /// A tab freshly navigated to `url` with an empty history entry.
    pub fn new(url: Url) -> Arc<Self> {
        Self::build(url, NavigationType::Navigate, None)
    }

    /// A tab reached through `navigation_type`.
    pub fn with_navigation_type(url: Url, navigation_type: NavigationType) -> Arc<Self> {
        Self::build(url, navigation_type, None)
    }

    /// A tab whose current entry already carries `state`.
    pub fn with_history_state(
        url: Url,
        navigation_type: NavigationType,
        state: HistoryState,
    ) -> Arc<Self> {
        Self::build(url, navigation_type, Some(state))
    }

    /// Seed a session storage item.
    #[must_use]
    pub fn with_session_item(self: Arc<Self>, key: &str, value: &str) -> Arc<Self> {
        lock(&self.state)
            .session
            .insert(key.to_owned(), value.to_owned());
        self
    }

    fn build(url: Url, navigation_type: NavigationType, state: Option<HistoryState>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(BrowserState {
                back: Vec::new(),
                current: Entry { url, state },
                forward: Vec::new(),
                session: BTreeMap::new(),
                navigation_type,
                assigned: Vec::new(),
                reloads: 0,
            }),
        })
    }

    /// Step back one entry. Returns `false` at the start of history.
    pub fn back(&self) -> bool {
        let mut state = lock(&self.state);
        let Some(previous) = state.back.pop() else {
            return false;
        };
        let left = mem::replace(&mut state.current, previous);
        state.forward.push(left);
        true
    }

    /// Step forward one entry. Returns `false` at the end of history.
    pub fn forward(&self) -> bool {
        let mut state = lock(&self.state);
        let Some(next) = state.forward.pop() else {
            return false;
        };
        let left = mem::replace(&mut state.current, next);
        state.back.push(left);
        true
    }

    /// URLs handed to [`Location::assign`], oldest first.
    pub fn assigned(&self) -> Vec<Url> {
        lock(&self.state).assigned.clone()
    }

    pub fn reload_count(&self) -> usize {
        lock(&self.state).reloads
    }

    pub fn history_len(&self) -> usize {
        let state = lock(&self.state);
        state.back.len() + 1 + state.forward.len()
    }

    pub fn session_item(&self, key: &str) -> Option<String> {
        lock(&self.state).session.get(key).cloned()
    }
}

impl HistoryStore for MemoryBrowser {
    fn push_state(&self, state: HistoryState, url: &Url) -> anyhow::Result<()> {
        lock(&self.state).push(Entry {
            url: url.clone(),
            state: Some(state),
        });
        Ok(())
    }

    fn replace_state(&self, state: HistoryState, url: Option<&Url>) -> anyhow::Result<()> {
        let mut browser = lock(&self.state);
        browser.current.state = Some(state);
        if let Some(target) = url {
            browser.current.url = target.clone();
        }
        Ok(())
    }

    fn state(&self) -> Option<HistoryState> {
        lock(&self.state).current.state.clone()
    }
}

impl SessionStore for MemoryBrowser {
    fn get_item(&self, key: &str) -> Option<String> {
        self.session_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> anyhow::Result<()> {
        lock(&self.state)
            .session
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove_item(&self, key: &str) {
        lock(&self.state).session.remove(key);
    }
}

impl Location for MemoryBrowser {
    fn href(&self) -> Url {
        lock(&self.state).current.url.clone()
    }

    /// Records the target and loads it as a new, stateless entry.
    fn assign(&self, url: &Url) -> anyhow::Result<()> {
        let mut state = lock(&self.state);
        state.assigned.push(url.clone());
        state.push(Entry {
            url: url.clone(),
            state: None,
        });
        state.navigation_type = NavigationType::Navigate;
        Ok(())
    }

    fn reload(&self) -> anyhow::Result<()> {
        let mut state = lock(&self.state);
        state.reloads += 1;
        state.navigation_type = NavigationType::Reload;
        Ok(())
    }

    fn navigation_type(&self) -> NavigationType {
        lock(&self.state).navigation_type
    }
}

/// Resolves every component name to the name itself.
#[derive(Clone, Copy, Debug, Default)]
pub struct NameResolver;

#[async_trait]
impl ComponentResolver for NameResolver {
    async fn resolve(&self, name: &str) -> anyhow::Result<ComponentHandle> {
        Ok(Arc::new(name.to_owned()))
    }
}

/// Logs each swap instead of mounting anything.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingSwapper;

#[async_trait]
impl ViewSwapper for LoggingSwapper {
    async fn swap(&self, swap: Swap<'_>) -> anyhow::Result<()> {
        debug!(
            "swap to {} at {} (preserve state: {})",
            swap.page.component, swap.page.url, swap.preserve_state
        );
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NullScroll;

impl ScrollKeeper for NullScroll {
    fn save(&self, _page: &Page) {}

    fn reset(&self, _page: &Page) {}

    fn restore(&self, _page: &Page) {}
}

/// Logs non-protocol responses instead of displaying them.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingInvalidView;

impl InvalidResponseView for LoggingInvalidView {
    fn show(&self, body: &str) {
        warn!("received a non-protocol response ({} bytes)", body.len());
    }
}
