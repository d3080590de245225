//! Collaborator contracts.
//!
//! The engine never renders, performs I/O or touches browser state itself; it
//! talks to these traits. [`memory`] provides in-process implementations for
//! headless use and tests.

pub mod memory;

use crate::error::TransportError;
use crate::http::{HttpRequest, HttpResponse, UploadProgress};
use crate::page::Page;
use async_trait::async_trait;
use core::any::Any;
use serde_json::{Map, Value};
use std::sync::Arc;
use url::Url;

/// Whatever the resolver hands back for a component name.
pub type ComponentHandle = Arc<dyn Any + Send + Sync>;

/// Serialized state attached to one history entry.
pub type HistoryState = Map<String, Value>;

/// Upload progress callback handed to the transport.
pub type ProgressSink = Arc<dyn Fn(UploadProgress) + Send + Sync>;

/// Looks up the renderable unit for a component name. May suspend, for
/// example while code is lazily loaded.
#[async_trait]
pub trait ComponentResolver: Send + Sync {
    /// # Errors
    /// Returns an error when no component is registered under `name`.
    async fn resolve(&self, name: &str) -> anyhow::Result<ComponentHandle>;
}

/// Arguments of one view swap.
pub struct Swap<'swap> {
    pub component: ComponentHandle,
    pub page: &'swap Page,
    pub preserve_state: bool,
}

/// Mounts a resolved component with its page.
#[async_trait]
pub trait ViewSwapper: Send + Sync {
    /// # Errors
    /// Returns an error when the view cannot be mounted.
    async fn swap(&self, swap: Swap<'_>) -> anyhow::Result<()>;
}

/// Performs one HTTP exchange. Every status code is a response.
#[async_trait]
pub trait Transport: Send + Sync {
    /// # Errors
    /// Returns a [`TransportError`] only when no response was received.
    async fn send(
        &self,
        request: HttpRequest,
        progress: ProgressSink,
    ) -> Result<HttpResponse, TransportError>;
}

/// The browser session history.
pub trait HistoryStore: Send + Sync {
    /// Push a new entry for `url` carrying `state`.
    ///
    /// # Errors
    /// Returns an error when the state cannot be stored.
    fn push_state(&self, state: HistoryState, url: &Url) -> anyhow::Result<()>;

    /// Replace the state of the current entry, optionally changing its URL.
    ///
    /// # Errors
    /// Returns an error when the state cannot be stored.
    fn replace_state(&self, state: HistoryState, url: Option<&Url>) -> anyhow::Result<()>;

    /// State of the current entry, `None` for an entry that never had any.
    fn state(&self) -> Option<HistoryState>;
}

/// Tab-scoped key/value storage surviving full page loads.
pub trait SessionStore: Send + Sync {
    fn get_item(&self, key: &str) -> Option<String>;

    /// # Errors
    /// Returns an error when the storage refuses the write.
    fn set_item(&self, key: &str, value: &str) -> anyhow::Result<()>;

    fn remove_item(&self, key: &str);
}

/// How the current document was reached.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NavigationType {
    #[default]
    Navigate,
    Reload,
    BackForward,
}

/// The browser address bar.
pub trait Location: Send + Sync {
    fn href(&self) -> Url;

    /// Start a full navigation to `url`.
    ///
    /// # Errors
    /// Returns an error when the navigation cannot be started.
    fn assign(&self, url: &Url) -> anyhow::Result<()>;

    /// # Errors
    /// Returns an error when the reload cannot be started.
    fn reload(&self) -> anyhow::Result<()>;

    fn navigation_type(&self) -> NavigationType;
}

/// Scroll bookkeeping for the current page.
pub trait ScrollKeeper: Send + Sync {
    /// Capture the scroll regions of `page` into history.
    fn save(&self, page: &Page);
    /// Scroll every region to the top.
    fn reset(&self, page: &Page);
    /// Apply the regions recorded on `page`.
    fn restore(&self, page: &Page);
}

/// Displays a response that did not speak the page protocol.
pub trait InvalidResponseView: Send + Sync {
    fn show(&self, body: &str);
}

/// Every collaborator a [`Router`](crate::router::Router) needs.
#[derive(Clone)]
pub struct Platform {
    pub resolver: Arc<dyn ComponentResolver>,
    pub swapper: Arc<dyn ViewSwapper>,
    pub transport: Arc<dyn Transport>,
    pub history: Arc<dyn HistoryStore>,
    pub session: Arc<dyn SessionStore>,
    pub location: Arc<dyn Location>,
    pub scroll: Arc<dyn ScrollKeeper>,
    pub invalid_view: Arc<dyn InvalidResponseView>,
}

impl Platform {
    /// Wire a transport to one in-memory browser and the headless stand-ins.
    pub fn headless(
        transport: Arc<dyn Transport>,
        browser: &Arc<memory::MemoryBrowser>,
    ) -> Self {
        Self {
            resolver: Arc::new(memory::NameResolver),
            swapper: Arc::new(memory::LoggingSwapper),
            transport,
            history: Arc::clone(browser) as Arc<dyn HistoryStore>,
            session: Arc::clone(browser) as Arc<dyn SessionStore>,
            location: Arc::clone(browser) as Arc<dyn Location>,
            scroll: Arc::new(memory::NullScroll),
            invalid_view: Arc::new(memory::LoggingInvalidView),
        }
    }
}
