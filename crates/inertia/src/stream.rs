//! Lanes of in-flight requests.
//!
//! The synchronous lane holds at most one request and interrupts it when a new
//! one arrives. The asynchronous lane runs any number side by side.

use crate::request::{CancelOptions, Request};
use crate::router::VisitTask;
use crate::sync::lock;
use std::sync::{Arc, Mutex};
use tracing::{Instrument as _, info_span};

pub struct RequestStream {
    max_concurrent: Option<usize>,
    interruptible: bool,
    requests: Arc<Mutex<Vec<Arc<Request>>>>,
}

impl RequestStream {
    pub fn new(max_concurrent: Option<usize>, interruptible: bool) -> Self {
        Self {
            max_concurrent,
            interruptible,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// One request at a time, interrupted by the next.
    pub fn sync_lane() -> Self {
        Self::new(Some(1), true)
    }

    /// Unbounded and never interrupted.
    pub fn async_lane() -> Self {
        Self::new(None, false)
    }

    /// Track `request` and run it on the runtime until it settles.
    pub fn send(&self, request: Arc<Request>) -> VisitTask {
        lock(&self.requests).push(Arc::clone(&request));
        let requests = Arc::clone(&self.requests);
        let visit = request.params().visit();
        let span = info_span!(
            "visit",
            method = %visit.method,
            url = %visit.url,
            is_async = visit.is_async
        );
        let handle = tokio::spawn(
            async move {
                let result = Arc::clone(&request).send().await;
                lock(&requests).retain(|tracked| !Arc::ptr_eq(tracked, &request));
                result
            }
            .instrument(span),
        );
        VisitTask::new(handle)
    }

    /// Interrupt the oldest request when the lane is full.
    pub fn interrupt_in_flight(&self) {
        self.cancel_in_flight(false);
    }

    /// Interrupt the oldest request; `force` ignores the lane's limits.
    pub fn cancel_in_flight(&self, force: bool) {
        let oldest = {
            let mut requests = lock(&self.requests);
            if !force && !self.should_cancel(requests.len()) {
                return;
            }
            if requests.is_empty() {
                return;
            }
            requests.remove(0)
        };
        oldest.cancel(CancelOptions::INTERRUPTED);
    }

    /// Cancel every tracked request with `options`.
    pub fn cancel_all(&self, options: CancelOptions) {
        let drained: Vec<Arc<Request>> = lock(&self.requests).drain(..).collect();
        for request in drained {
            request.cancel(options);
        }
    }

    /// The most recently dispatched request still in flight.
    pub fn active(&self) -> Option<Arc<Request>> {
        lock(&self.requests).last().map(Arc::clone)
    }

    pub fn len(&self) -> usize {
        lock(&self.requests).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.requests).is_empty()
    }

    fn should_cancel(&self, in_flight: usize) -> bool {
        self.interruptible && self.max_concurrent.is_some_and(|limit| in_flight >= limit)
    }
}
