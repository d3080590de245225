#![allow(dead_code, reason = "each test binary uses a different subset")]
use anyhow::Result;
use async_trait::async_trait;
use inertia::http::X_INERTIA;
use inertia::platform::memory::MemoryBrowser;
use inertia::platform::{
    ComponentHandle, ComponentResolver, HistoryStore, InvalidResponseView, Location,
    ProgressSink, ScrollKeeper, SessionStore, Swap, Transport, ViewSwapper,
};
use inertia::{
    EventKind, GlobalEvent, HttpRequest, HttpResponse, Page, Platform, Router, RouterConfig,
    TransportError, VisitStatus,
};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Notify, mpsc, oneshot};
use tokio::time::{sleep, timeout};
use url::Url;

pub const BASE: &str = "https://app.test";

pub fn init_logging() {
    if let Err(error) = env_logger::builder().is_test(true).try_init() {
        log::trace!("logger already installed: {error}");
    }
}

pub fn url(path: &str) -> Url {
    Url::parse(&format!("{BASE}{path}")).unwrap()
}

pub fn page(component: &str, path: &str) -> Page {
    Page::new(component, format!("{BASE}{path}"))
}

/// Unwrap a JSON object literal.
pub fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

/// A protocol response carrying `page`.
pub fn inertia_response(page: &Page) -> HttpResponse {
    HttpResponse::new(200)
        .with_header(X_INERTIA, "true")
        .with_header("Content-Type", "application/json")
        .with_body(serde_json::to_vec(page).unwrap())
}

/// One exchange held by the [`ScriptedTransport`] until the test answers it.
pub struct PendingExchange {
    pub request: HttpRequest,
    pub progress: ProgressSink,
    reply: oneshot::Sender<Result<HttpResponse, TransportError>>,
}

impl PendingExchange {
    pub fn path(&self) -> &str {
        self.request.url.path()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.request.headers.get(name)
    }

    /// Answer the exchange. Ignored when the request was already aborted.
    pub fn respond(self, response: HttpResponse) {
        let _ = self.reply.send(Ok(response));
    }

    pub fn fail(self, error: TransportError) {
        let _ = self.reply.send(Err(error));
    }
}

/// Transport whose exchanges are answered by the test.
pub struct ScriptedTransport {
    sender: mpsc::UnboundedSender<PendingExchange>,
}

impl ScriptedTransport {
    pub fn new() -> (Arc<Self>, Exchanges) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Arc::new(Self { sender }), Exchanges { receiver })
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(
        &self,
        request: HttpRequest,
        progress: ProgressSink,
    ) -> Result<HttpResponse, TransportError> {
        let (reply, answer) = oneshot::channel();
        self.sender
            .send(PendingExchange {
                request,
                progress,
                reply,
            })
            .map_err(|_closed| TransportError::Network("script closed".to_owned()))?;
        answer
            .await
            .map_err(|_dropped| TransportError::Network("exchange dropped".to_owned()))?
    }
}

pub struct Exchanges {
    receiver: mpsc::UnboundedReceiver<PendingExchange>,
}

impl Exchanges {
    /// The next exchange sent by the router.
    ///
    /// # Panics
    /// Panics if nothing is sent within five seconds.
    pub async fn next(&mut self) -> PendingExchange {
        timeout(Duration::from_secs(5), self.receiver.recv())
            .await
            .expect("no exchange within five seconds")
            .expect("transport dropped")
    }

    /// Give spawned visits a moment, then report whether anything was sent.
    pub async fn none_pending(&mut self) -> bool {
        sleep(Duration::from_millis(30)).await;
        self.receiver.try_recv().is_err()
    }
}

/// Resolves component names to themselves, optionally holding some back.
#[derive(Default)]
pub struct GatedResolver {
    gates: Mutex<HashMap<String, Arc<Notify>>>,
}

impl GatedResolver {
    /// Hold resolution of `component` until the returned gate is notified.
    pub fn gate(&self, component: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates
            .lock()
            .unwrap()
            .insert(component.to_owned(), Arc::clone(&gate));
        gate
    }
}

#[async_trait]
impl ComponentResolver for GatedResolver {
    async fn resolve(&self, name: &str) -> anyhow::Result<ComponentHandle> {
        let gate = self.gates.lock().unwrap().get(name).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if name == "Missing" {
            anyhow::bail!("no component named {name}");
        }
        Ok(Arc::new(name.to_owned()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SwapRecord {
    pub component: String,
    pub url: String,
    pub preserve_state: bool,
}

#[derive(Default)]
pub struct RecordingSwapper {
    swaps: Mutex<Vec<SwapRecord>>,
}

impl RecordingSwapper {
    pub fn swaps(&self) -> Vec<SwapRecord> {
        self.swaps.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<SwapRecord> {
        self.swaps.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ViewSwapper for RecordingSwapper {
    async fn swap(&self, swap: Swap<'_>) -> anyhow::Result<()> {
        self.swaps.lock().unwrap().push(SwapRecord {
            component: swap.page.component.clone(),
            url: swap.page.url.clone(),
            preserve_state: swap.preserve_state,
        });
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingScroll {
    calls: Mutex<Vec<String>>,
}

impl RecordingScroll {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, action: &str, page: &Page) {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{action} {}", page.component));
    }
}

impl ScrollKeeper for RecordingScroll {
    fn save(&self, page: &Page) {
        self.record("save", page);
    }

    fn reset(&self, page: &Page) {
        self.record("reset", page);
    }

    fn restore(&self, page: &Page) {
        self.record("restore", page);
    }
}

#[derive(Default)]
pub struct RecordingInvalidView {
    shown: Mutex<Vec<String>>,
}

impl RecordingInvalidView {
    pub fn shown(&self) -> Vec<String> {
        self.shown.lock().unwrap().clone()
    }
}

impl InvalidResponseView for RecordingInvalidView {
    fn show(&self, body: &str) {
        self.shown.lock().unwrap().push(body.to_owned());
    }
}

/// Every global event, described as one line each.
#[derive(Clone, Default)]
pub struct EventLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl EventLog {
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries().iter().filter(|seen| *seen == entry).count()
    }

    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.entries()
            .iter()
            .filter(|seen| seen.starts_with(prefix))
            .count()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().position(|seen| seen == entry)
    }
}

pub fn status_name(status: VisitStatus) -> &'static str {
    if status.completed() {
        "completed"
    } else if status.cancelled() {
        "cancelled"
    } else if status.interrupted() {
        "interrupted"
    } else {
        "pending"
    }
}

fn describe(event: &GlobalEvent<'_>) -> String {
    match event {
        GlobalEvent::Before(visit) => format!("before {}", visit.url.path()),
        GlobalEvent::Start(visit) => format!("start {}", visit.url.path()),
        GlobalEvent::Progress(progress) => format!("progress {}", progress.percentage),
        GlobalEvent::Success(page) => format!("success {}", page.component),
        GlobalEvent::Error(errors) => format!("error {}", Value::Object((*errors).clone())),
        GlobalEvent::Invalid(response) => format!("invalid {}", response.status),
        GlobalEvent::Exception(error) => format!("exception {error}"),
        GlobalEvent::Finish { visit, status } => {
            format!("finish {} {}", visit.url.path(), status_name(*status))
        }
        GlobalEvent::Navigate(page) => format!("navigate {}", page.component),
    }
}

pub fn record_events(router: &Router) -> EventLog {
    let log = EventLog::default();
    for kind in [
        EventKind::Before,
        EventKind::Start,
        EventKind::Progress,
        EventKind::Success,
        EventKind::Error,
        EventKind::Invalid,
        EventKind::Exception,
        EventKind::Finish,
        EventKind::Navigate,
    ] {
        let entries = Arc::clone(&log.entries);
        router.on(kind, move |event| {
            entries.lock().unwrap().push(describe(event));
        });
    }
    log
}

/// Session storage that is full: reads find nothing and writes fail.
#[derive(Debug, Default)]
pub struct FullSession;

impl SessionStore for FullSession {
    fn get_item(&self, _key: &str) -> Option<String> {
        None
    }

    fn set_item(&self, _key: &str, _value: &str) -> Result<()> {
        anyhow::bail!("quota exceeded")
    }

    fn remove_item(&self, _key: &str) {}
}

pub struct Harness {
    pub router: Router,
    pub browser: Arc<MemoryBrowser>,
    pub exchanges: Exchanges,
    pub resolver: Arc<GatedResolver>,
    pub swapper: Arc<RecordingSwapper>,
    pub scroll: Arc<RecordingScroll>,
    pub invalid: Arc<RecordingInvalidView>,
    pub events: EventLog,
}

/// A router whose browser sits at the initial page's URL.
pub fn harness(initial: Page) -> Harness {
    let browser = MemoryBrowser::new(Url::parse(&initial.url).unwrap());
    harness_with(initial, browser, RouterConfig::default())
}

pub fn harness_with(initial: Page, browser: Arc<MemoryBrowser>, config: RouterConfig) -> Harness {
    let session = Arc::clone(&browser) as Arc<dyn SessionStore>;
    harness_on(initial, browser, session, config)
}

/// Like [`harness_with`], with session storage served by `session`.
pub fn harness_on(
    initial: Page,
    browser: Arc<MemoryBrowser>,
    session: Arc<dyn SessionStore>,
    config: RouterConfig,
) -> Harness {
    init_logging();
    let (transport, exchanges) = ScriptedTransport::new();
    let resolver = Arc::new(GatedResolver::default());
    let swapper = Arc::new(RecordingSwapper::default());
    let scroll = Arc::new(RecordingScroll::default());
    let invalid = Arc::new(RecordingInvalidView::default());
    let platform = Platform {
        resolver: Arc::clone(&resolver) as Arc<dyn ComponentResolver>,
        swapper: Arc::clone(&swapper) as Arc<dyn ViewSwapper>,
        transport: transport as Arc<dyn Transport>,
        history: Arc::clone(&browser) as Arc<dyn HistoryStore>,
        session,
        location: Arc::clone(&browser) as Arc<dyn Location>,
        scroll: Arc::clone(&scroll) as Arc<dyn ScrollKeeper>,
        invalid_view: Arc::clone(&invalid) as Arc<dyn InvalidResponseView>,
    };
    let router = Router::new(initial, platform, config);
    let events = record_events(&router);
    Harness {
        router,
        browser,
        exchanges,
        resolver,
        swapper,
        scroll,
        invalid,
        events,
    }
}

/// Build a harness and run the router's initial page load.
pub async fn started(initial: Page) -> Result<Harness> {
    let harness = harness(initial);
    harness.router.init().await?;
    Ok(harness)
}

/// Wait for `condition`, polling while spawned visits make progress.
///
/// # Panics
/// Panics if the condition does not hold within two seconds.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not met within two seconds");
}
