//! Entry point for navigation.
//!
//! A [`Router`] admits visit intents, keeps at most one synchronous visit in
//! flight, fires the lifecycle hooks and picks how the first page is shown.

use crate::config::RouterConfig;
use crate::error::VisitError;
use crate::events::{EventBus, EventKind, GlobalEvent, ListenerOutcome, Subscription};
use crate::history::{History, REMEMBERED_STATE_KEY, SCROLL_REGIONS_KEY, VERSION_KEY};
use crate::href::{hash_of, href_to_url};
use crate::location_visit::LocationVisit;
use crate::page::Page;
use crate::params::RequestParams;
use crate::payload::{RequestPayload, VisitData, object_to_form_data};
use crate::platform::{HistoryState, NavigationType, Platform};
use crate::poll::{PollHandle, PollRegistry};
use crate::query::merge_data_into_query_string;
use crate::request::{CancelOptions, Request};
use crate::response::ResponseOutcome;
use crate::store::{PageStore, SetOptions, SetOutcome};
use crate::stream::RequestStream;
use crate::visit::{Method, Visit, VisitOptions};
use core::time::Duration;
use log::{debug, info, warn};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use url::Url;

/// Shortest period between two poll reloads.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// State shared by the router, its requests and its poll loops.
pub(crate) struct RouterCore {
    pub(crate) platform: Platform,
    pub(crate) store: PageStore,
    pub(crate) events: Arc<EventBus>,
    pub(crate) history: History,
    pub(crate) polls: PollRegistry,
    pub(crate) config: RouterConfig,
    pub(crate) sync_stream: RequestStream,
    pub(crate) async_stream: RequestStream,
}

/// A dispatched visit running on the runtime.
#[derive(Debug)]
pub struct VisitTask {
    handle: JoinHandle<Result<Option<ResponseOutcome>, VisitError>>,
}

impl VisitTask {
    pub(crate) const fn new(
        handle: JoinHandle<Result<Option<ResponseOutcome>, VisitError>>,
    ) -> Self {
        Self { handle }
    }

    /// Wait for the visit to settle.
    ///
    /// `Ok(None)` means the visit was cancelled or its failure was absorbed
    /// by an `exception` listener.
    ///
    /// # Errors
    /// Returns the visit's unabsorbed failure, or [`VisitError::Task`] when
    /// the task itself died.
    pub async fn settled(self) -> Result<Option<ResponseOutcome>, VisitError> {
        self.handle.await?
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

#[derive(Clone)]
pub struct Router {
    core: Arc<RouterCore>,
}

impl Router {
    pub fn new(initial_page: Page, platform: Platform, config: RouterConfig) -> Self {
        let events = EventBus::new();
        let history = History::new(Arc::clone(&platform.history));
        let store = PageStore::new(initial_page, &platform, history.clone(), Arc::clone(&events));
        Self {
            core: Arc::new(RouterCore {
                platform,
                store,
                events,
                history,
                polls: PollRegistry::default(),
                config,
                sync_stream: RequestStream::sync_lane(),
                async_stream: RequestStream::async_lane(),
            }),
        }
    }

    pub(crate) const fn from_core(core: Arc<RouterCore>) -> Self {
        Self { core }
    }

    /// Show the bootstrapped page.
    ///
    /// A back/forward traversal onto an entry with stored state restores
    /// that state. A pending location-visit marker completes the server
    /// redirect. Anything else is a fresh load of the initial page.
    ///
    /// # Errors
    /// Propagates failures of the history store, the resolver and the swap.
    pub async fn init(&self) -> Result<(), VisitError> {
        let core = &self.core;
        let navigation_type = core.platform.location.navigation_type();
        if core.config.clear_remembered_state_on_reload
            && navigation_type == NavigationType::Reload
        {
            core.history.delete_state(REMEMBERED_STATE_KEY)?;
        }

        if core.history.has_any_state() && navigation_type == NavigationType::BackForward {
            self.handle_back_forward_visit().await
        } else if LocationVisit::exists(
            core.platform.session.as_ref(),
            &core.config.location_visit_key,
        ) {
            self.handle_location_visit().await
        } else {
            self.handle_initial_page_visit().await
        }
    }

    async fn handle_back_forward_visit(&self) -> Result<(), VisitError> {
        let core = &self.core;
        match core.store.get().version {
            Some(version) => core.history.set_state(VERSION_KEY, Value::String(version))?,
            None => core.history.delete_state(VERSION_KEY)?,
        }
        let Some(page) = core.history.get_all_state()? else {
            return self.handle_initial_page_visit().await;
        };
        let options = SetOptions {
            replace: false,
            preserve_scroll: true,
            preserve_state: true,
        };
        if core.store.set(page, options).await? == SetOutcome::Applied {
            let page = core.store.get();
            core.platform.scroll.restore(&page);
            core.events.fire(&GlobalEvent::Navigate(&page));
        }
        Ok(())
    }

    async fn handle_location_visit(&self) -> Result<(), VisitError> {
        let core = &self.core;
        let marker = LocationVisit::take(
            core.platform.session.as_ref(),
            &core.config.location_visit_key,
        )
        .unwrap_or_default();

        core.store.set_url_hash(&hash_of(&core.platform.location.href()));
        core.store.remember(core.history.remembered_state().unwrap_or_default());
        core.store.set_scroll_regions(
            core.history
                .get_state_as(SCROLL_REGIONS_KEY)
                .unwrap_or_default(),
        );

        let options = SetOptions {
            replace: false,
            preserve_scroll: marker.preserve_scroll,
            preserve_state: true,
        };
        if core.store.set(core.store.get(), options).await? == SetOutcome::Applied {
            let page = core.store.get();
            if marker.preserve_scroll {
                core.platform.scroll.restore(&page);
            }
            core.events.fire(&GlobalEvent::Navigate(&page));
        }
        Ok(())
    }

    async fn handle_initial_page_visit(&self) -> Result<(), VisitError> {
        let core = &self.core;
        core.store.set_url_hash(&hash_of(&core.platform.location.href()));
        let options = SetOptions {
            preserve_state: true,
            ..SetOptions::default()
        };
        if core.store.set(core.store.get(), options).await? == SetOutcome::Applied {
            core.events.fire(&GlobalEvent::Navigate(&core.store.get()));
        }
        Ok(())
    }

    /// Visit `href`, resolved against the browser location.
    ///
    /// Returns `Ok(None)` when `on_before` or a `before` listener vetoed the
    /// visit.
    ///
    /// # Errors
    /// Returns [`VisitError::InvalidUrl`] when `href` does not resolve.
    pub fn visit(
        &self,
        href: &str,
        options: VisitOptions,
    ) -> Result<Option<VisitTask>, VisitError> {
        let url = href_to_url(href, &self.core.platform.location.href())?;
        Ok(self.visit_url(url, options))
    }

    /// Visit an absolute URL.
    pub fn visit_url(&self, url: Url, options: VisitOptions) -> Option<VisitTask> {
        let core = &self.core;
        let VisitOptions {
            method,
            data,
            replace,
            preserve_scroll,
            preserve_state,
            only,
            except,
            headers,
            error_bag,
            force_form_data,
            query_string_array_format,
            is_async,
            callbacks,
        } = options;
        let array_format = query_string_array_format.unwrap_or(core.config.array_format);

        let (url, payload) = if data.has_files() || force_form_data {
            (url, RequestPayload::Multipart(object_to_form_data(data)))
        } else {
            let (merged, rest) =
                merge_data_into_query_string(method, &url, data.fields, array_format);
            (merged, RequestPayload::Fields(rest))
        };

        let visit = Visit {
            url,
            method,
            data: payload,
            replace,
            preserve_scroll: preserve_scroll.unwrap_or_default(),
            preserve_state: preserve_state.unwrap_or_default(),
            only,
            except,
            headers,
            error_bag: error_bag.filter(|bag| !bag.is_empty()),
            force_form_data,
            query_string_array_format: array_format,
            is_async,
        };

        if let Some(on_before) = &callbacks.on_before
            && !on_before(&visit)
        {
            debug!("visit to {} vetoed by on_before", visit.url);
            return None;
        }
        if !core.events.fire(&GlobalEvent::Before(&visit)) {
            debug!("visit to {} vetoed by a before listener", visit.url);
            return None;
        }

        if !visit.is_async {
            core.sync_stream.interrupt_in_flight();
        }

        let current = core.store.get();
        core.platform.scroll.save(&current);

        if let Some(on_start) = &callbacks.on_start {
            on_start(&visit);
        }
        core.events.fire(&GlobalEvent::Start(&visit));

        info!("{} {}", visit.method, visit.url);
        let lane = if visit.is_async {
            &core.async_stream
        } else {
            &core.sync_stream
        };
        let request = Request::new(RequestParams::new(visit, callbacks), current, core);
        Some(lane.send(request))
    }

    /// # Errors
    /// See [`Router::visit`].
    pub fn get(
        &self,
        href: &str,
        data: impl Into<VisitData>,
        options: VisitOptions,
    ) -> Result<Option<VisitTask>, VisitError> {
        self.visit(href, options.method(Method::Get).data(data))
    }

    /// Defaults `preserve_state` to `true`.
    ///
    /// # Errors
    /// See [`Router::visit`].
    pub fn post(
        &self,
        href: &str,
        data: impl Into<VisitData>,
        options: VisitOptions,
    ) -> Result<Option<VisitTask>, VisitError> {
        self.visit(href, mutating(options, Method::Post).data(data))
    }

    /// Defaults `preserve_state` to `true`.
    ///
    /// # Errors
    /// See [`Router::visit`].
    pub fn put(
        &self,
        href: &str,
        data: impl Into<VisitData>,
        options: VisitOptions,
    ) -> Result<Option<VisitTask>, VisitError> {
        self.visit(href, mutating(options, Method::Put).data(data))
    }

    /// Defaults `preserve_state` to `true`.
    ///
    /// # Errors
    /// See [`Router::visit`].
    pub fn patch(
        &self,
        href: &str,
        data: impl Into<VisitData>,
        options: VisitOptions,
    ) -> Result<Option<VisitTask>, VisitError> {
        self.visit(href, mutating(options, Method::Patch).data(data))
    }

    /// Defaults `preserve_state` to `true`.
    ///
    /// # Errors
    /// See [`Router::visit`].
    pub fn delete(
        &self,
        href: &str,
        options: VisitOptions,
    ) -> Result<Option<VisitTask>, VisitError> {
        self.visit(href, mutating(options, Method::Delete))
    }

    /// Revisit the current location, always preserving scroll and state.
    ///
    /// # Errors
    /// See [`Router::visit`].
    pub fn reload(&self, options: VisitOptions) -> Result<Option<VisitTask>, VisitError> {
        let href = self.core.platform.location.href();
        Ok(self.visit_url(href, options.preserve_scroll(true).preserve_state(true)))
    }

    /// Visit with a replaced history entry.
    ///
    /// # Errors
    /// See [`Router::visit`].
    #[deprecated(note = "use `visit` with `VisitOptions::replace(true)` or the method helpers")]
    pub fn replace(
        &self,
        href: &str,
        options: VisitOptions,
    ) -> Result<Option<VisitTask>, VisitError> {
        warn!(
            "Router::replace is deprecated and will be removed; use Router::{}() instead",
            options.method.as_str().to_ascii_lowercase()
        );
        self.visit(href, options.with_preserve_defaults(false, true).replace(true))
    }

    /// Cancel the active synchronous visit.
    pub fn cancel(&self) {
        if let Some(active) = self.core.sync_stream.active() {
            active.cancel(CancelOptions::CANCELLED);
        }
    }

    /// Store `data` under `key` in the current history entry.
    ///
    /// # Errors
    /// Fails when `data` does not serialize or history rejects the write.
    pub fn remember<Data: Serialize>(&self, data: &Data, key: &str) -> Result<(), VisitError> {
        self.core.history.remember(data, key)
    }

    pub fn restore(&self, key: &str) -> Option<Value> {
        self.core.history.restore(key)
    }

    /// Listen for a lifecycle event of every visit.
    pub fn on<Callback, Outcome>(&self, kind: EventKind, listener: Callback) -> Subscription
    where
        Callback: Fn(&GlobalEvent<'_>) -> Outcome + Send + Sync + 'static,
        Outcome: Into<ListenerOutcome>,
    {
        self.core.events.on(kind, listener)
    }

    /// Reload asynchronously every `interval` until stopped. Intervals shorter
    /// than [`MIN_POLL_INTERVAL`] are raised to it.
    ///
    /// Every non-partial protocol response stops all polls, including the
    /// poll's own reload; pass `only` to keep a poll alive.
    pub fn poll(&self, interval: Duration, options: VisitOptions) -> PollHandle {
        let handle = self.core.polls.register();
        let token = handle.token();
        let owner = Arc::downgrade(&self.core);
        let options = options.asynchronous(true);
        let period = interval.max(MIN_POLL_INTERVAL);
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let Some(core) = owner.upgrade() else {
                    break;
                };
                if let Err(error) = Router::from_core(core).reload(options.clone()) {
                    warn!("poll reload failed: {error}");
                }
            }
            debug!("poll loop stopped");
        });
        handle
    }

    /// React to a browser back/forward traversal.
    ///
    /// An entry without state only gets the browser hash reattached. An entry
    /// with state has its page swapped in without touching history.
    ///
    /// # Errors
    /// Fails when the state is not a page or a collaborator fails.
    pub async fn handle_popstate(&self, state: Option<HistoryState>) -> Result<(), VisitError> {
        let core = &self.core;
        let Some(state) = state else {
            let location = core.platform.location.href();
            let mut page = core.store.get();
            let mut url = href_to_url(&page.url, &location)?;
            url.set_fragment(location.fragment());
            page.url = url.to_string();
            core.history.replace_page(&page, Some(&url))?;
            core.store.set_url(page.url.clone());
            core.platform.scroll.reset(&page);
            return Ok(());
        };

        let page: Page = serde_json::from_value(Value::Object(state))?;
        if core.store.swap_in(&page, false).await? == SetOutcome::Applied {
            core.platform.scroll.restore(&page);
            core.events.fire(&GlobalEvent::Navigate(&page));
        }
        Ok(())
    }

    /// Snapshot of the current page.
    pub fn page(&self) -> Page {
        self.core.store.get()
    }

    pub fn store(&self) -> &PageStore {
        &self.core.store
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.core.events
    }

    pub fn config(&self) -> &RouterConfig {
        &self.core.config
    }

    /// Visits still running on the asynchronous lane.
    pub fn pending_async_visits(&self) -> usize {
        self.core.async_stream.len()
    }

    /// Poll loops still running.
    pub fn active_polls(&self) -> usize {
        self.core.polls.len()
    }
}

fn mutating(options: VisitOptions, method: Method) -> VisitOptions {
    options.method(method).with_preserve_defaults(false, true)
}
