//! Derived request parameters and the terminal flags of a visit.

use crate::http::{
    ACCEPT, ACCEPT_HTML, Headers, X_INERTIA, X_INERTIA_ERROR_BAG, X_INERTIA_PARTIAL_COMPONENT,
    X_INERTIA_PARTIAL_DATA, X_INERTIA_PARTIAL_EXCEPT, X_INERTIA_VERSION, X_REQUESTED_WITH,
};
use crate::page::Page;
use crate::payload::RequestPayload;
use crate::sync::lock;
use crate::visit::{Visit, VisitCallbacks};
use serde_json::{Map, Value};
use std::sync::Mutex;

/// Terminal flags of a visit. At most one is set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VisitStatus {
    completed: bool,
    cancelled: bool,
    interrupted: bool,
}

impl VisitStatus {
    /// A visit still in flight.
    pub const fn new() -> Self {
        Self {
            completed: false,
            cancelled: false,
            interrupted: false,
        }
    }

    pub const fn completed(self) -> bool {
        self.completed
    }

    pub const fn cancelled(self) -> bool {
        self.cancelled
    }

    pub const fn interrupted(self) -> bool {
        self.interrupted
    }
}

/// A resolved visit bound to its hooks and terminal flags.
///
/// The flags only change through [`RequestParams::mark_as_finished`] and
/// [`RequestParams::mark_as_cancelled`].
#[derive(Debug)]
pub struct RequestParams {
    visit: Visit,
    callbacks: VisitCallbacks,
    status: Mutex<VisitStatus>,
}

impl RequestParams {
    pub fn new(visit: Visit, callbacks: VisitCallbacks) -> Self {
        Self {
            visit,
            callbacks,
            status: Mutex::new(VisitStatus::new()),
        }
    }

    pub const fn visit(&self) -> &Visit {
        &self.visit
    }

    pub const fn callbacks(&self) -> &VisitCallbacks {
        &self.callbacks
    }

    /// Body of the exchange: empty for GET, the payload otherwise.
    pub fn data(&self) -> RequestPayload {
        if self.visit.method.is_get() {
            RequestPayload::empty()
        } else {
            self.visit.data.clone()
        }
    }

    /// Query parameters of the exchange: the payload for GET, empty otherwise.
    pub fn query_params(&self) -> Map<String, Value> {
        if self.visit.method.is_get() {
            self.visit.data.fields().cloned().unwrap_or_default()
        } else {
            Map::new()
        }
    }

    pub fn is_partial(&self) -> bool {
        self.visit.is_partial()
    }

    pub const fn is_async(&self) -> bool {
        self.visit.is_async
    }

    /// Custom headers plus the partial-reload and error-bag headers.
    pub fn headers(&self, current_component: &str) -> Headers {
        visit_headers(&self.visit, current_component)
    }

    pub fn mark_as_finished(&self) {
        *lock(&self.status) = VisitStatus {
            completed: true,
            cancelled: false,
            interrupted: false,
        };
    }

    /// Run the cancel hook, then record how the visit was stopped.
    pub fn mark_as_cancelled(&self, cancelled: bool, interrupted: bool) {
        if let Some(on_cancel) = &self.callbacks.on_cancel {
            on_cancel();
        }
        *lock(&self.status) = VisitStatus {
            completed: false,
            cancelled,
            interrupted,
        };
    }

    pub fn status(&self) -> VisitStatus {
        *lock(&self.status)
    }

    pub fn was_cancelled_at_all(&self) -> bool {
        let status = self.status();
        status.cancelled || status.interrupted
    }
}

/// Custom headers of `visit` extended with the partial-reload and error-bag
/// headers. `current_component` names the page the partial data belongs to.
pub fn visit_headers(visit: &Visit, current_component: &str) -> Headers {
    let mut headers = visit.headers.clone();
    if visit.is_partial() {
        headers.insert(X_INERTIA_PARTIAL_COMPONENT, current_component);
    }
    if !visit.only.is_empty() {
        headers.insert(X_INERTIA_PARTIAL_DATA, visit.only.join(","));
    }
    if !visit.except.is_empty() {
        headers.insert(X_INERTIA_PARTIAL_EXCEPT, visit.except.join(","));
    }
    if let Some(bag) = visit.error_bag.as_deref().filter(|bag| !bag.is_empty()) {
        headers.insert(X_INERTIA_ERROR_BAG, bag);
    }
    headers
}

/// Full header set sent for `visit` while `current` is the current page.
pub fn protocol_headers(visit: &Visit, current: &Page) -> Headers {
    let mut headers = visit.headers.clone();
    headers.insert(ACCEPT, ACCEPT_HTML);
    headers.insert(X_REQUESTED_WITH, "XMLHttpRequest");
    headers.insert(X_INERTIA, "true");
    headers.extend(&visit_headers(visit, &current.component));
    if let Some(version) = current.version.as_deref().filter(|version| !version.is_empty()) {
        headers.insert(X_INERTIA_VERSION, version);
    }
    headers
}
