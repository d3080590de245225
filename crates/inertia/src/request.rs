//! One network exchange and its terminal bookkeeping.

use crate::error::VisitError;
use crate::events::{EventBus, GlobalEvent};
use crate::http::{HttpRequest, Progress, UploadProgress};
use crate::page::Page;
use crate::params::{RequestParams, protocol_headers};
use crate::platform::ProgressSink;
use crate::response::{Response, ResponseOutcome};
use crate::router::RouterCore;
use core::sync::atomic::{AtomicBool, Ordering};
use log::{debug, warn};
use std::sync::{Arc, Weak};
use tokio_util::sync::CancellationToken;

/// How a request was stopped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CancelOptions {
    pub cancelled: bool,
    pub interrupted: bool,
}

impl CancelOptions {
    /// Stopped on request of the caller.
    pub const CANCELLED: Self = Self {
        cancelled: true,
        interrupted: false,
    };
    /// Stopped because a newer visit took over the lane.
    pub const INTERRUPTED: Self = Self {
        cancelled: false,
        interrupted: true,
    };
}

/// Handed to `on_cancel_token`; cancels the visit it was created for.
#[derive(Clone, Debug)]
pub struct CancelToken {
    request: Weak<Request>,
}

impl CancelToken {
    /// Cancel the visit. A no-op once it has settled.
    pub fn cancel(&self) {
        if let Some(request) = self.request.upgrade() {
            request.cancel(CancelOptions::CANCELLED);
        }
    }
}

/// Executor of one visit.
///
/// Bound to the page that was current at dispatch. A newer visit never
/// reaches into an older request; it cancels it.
pub struct Request {
    params: RequestParams,
    originating: Page,
    core: Weak<RouterCore>,
    events: Arc<EventBus>,
    abort: CancellationToken,
    settled: AtomicBool,
}

impl Request {
    pub(crate) fn new(
        params: RequestParams,
        originating: Page,
        core: &Arc<RouterCore>,
    ) -> Arc<Self> {
        let request = Arc::new(Self {
            params,
            originating,
            core: Arc::downgrade(core),
            events: Arc::clone(&core.events),
            abort: CancellationToken::new(),
            settled: AtomicBool::new(false),
        });
        if let Some(on_cancel_token) = &request.params.callbacks().on_cancel_token {
            on_cancel_token(CancelToken {
                request: Arc::downgrade(&request),
            });
        }
        request
    }

    pub const fn params(&self) -> &RequestParams {
        &self.params
    }

    /// The page that was current when the visit was dispatched.
    pub const fn originating(&self) -> &Page {
        &self.originating
    }

    /// Whether finish bookkeeping has run.
    pub fn is_settled(&self) -> bool {
        self.settled.load(Ordering::Acquire)
    }

    /// Perform the exchange and interpret its response.
    ///
    /// Returns `Ok(None)` when the visit was cancelled or the exception was
    /// absorbed by a listener.
    ///
    /// # Errors
    /// Returns the failure of an exchange that produced no usable response,
    /// unless an `exception` listener prevented it.
    pub async fn send(self: Arc<Self>) -> Result<Option<ResponseOutcome>, VisitError> {
        let Some(core) = self.core.upgrade() else {
            return Ok(None);
        };
        let visit = self.params.visit();
        let current = core.store.get();
        let mut url = visit.url.clone();
        url.set_fragment(None);
        let body = self.params.data();
        let progress = self.progress_sink(body.is_multipart());
        let exchange = HttpRequest {
            method: visit.method,
            url,
            headers: protocol_headers(visit, &current),
            query: self.params.query_params(),
            body,
        };
        debug!("sending {} {}", exchange.method, exchange.url);

        let transport = Arc::clone(&core.platform.transport);
        let result = tokio::select! {
            biased;
            () = self.abort.cancelled() => {
                debug!("{} {} aborted", visit.method, visit.url);
                return Ok(None);
            }
            result = transport.send(exchange, progress) => result,
        };

        match result {
            Ok(response) => match Response::new(&self, &core, response).handle().await {
                Ok(outcome) => {
                    self.finish();
                    Ok(Some(outcome))
                }
                Err(error) => self.fail(error),
            },
            Err(error) => self.fail(VisitError::from(error)),
        }
    }

    /// Abort the exchange and record why. Finish listeners always hear about
    /// it, but only once per request.
    pub fn cancel(&self, options: CancelOptions) {
        if self.settled.swap(true, Ordering::AcqRel) {
            return;
        }
        self.abort.cancel();
        self.params.mark_as_cancelled(options.cancelled, options.interrupted);
        self.fire_finish_events();
    }

    fn fail(&self, error: VisitError) -> Result<Option<ResponseOutcome>, VisitError> {
        if self.abort.is_cancelled() {
            return Ok(None);
        }
        warn!("visit to {} failed: {error}", self.params.visit().url);
        let propagate = self.events.fire(&GlobalEvent::Exception(&error));
        self.finish();
        if propagate { Err(error) } else { Ok(None) }
    }

    fn finish(&self) {
        if self.params.was_cancelled_at_all() || self.settled.swap(true, Ordering::AcqRel) {
            return;
        }
        self.params.mark_as_finished();
        self.fire_finish_events();
    }

    fn fire_finish_events(&self) {
        let visit = self.params.visit();
        let status = self.params.status();
        if let Some(on_finish) = &self.params.callbacks().on_finish {
            on_finish(visit, status);
        }
        self.events.fire(&GlobalEvent::Finish { visit, status });
    }

    fn progress_sink(self: &Arc<Self>, multipart: bool) -> ProgressSink {
        if !multipart {
            return Arc::new(|_progress: UploadProgress| {});
        }
        let request = Arc::downgrade(self);
        Arc::new(move |raw: UploadProgress| {
            if let Some(request) = request.upgrade() {
                request.report_progress(raw);
            }
        })
    }

    fn report_progress(&self, raw: UploadProgress) {
        let progress = Progress::from(raw);
        if let Some(on_progress) = &self.params.callbacks().on_progress {
            on_progress(&progress);
        }
        self.events.fire(&GlobalEvent::Progress(&progress));
    }
}
