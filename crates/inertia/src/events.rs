//! Global lifecycle listeners.
//!
//! Every visit announces its lifecycle through named events. Listeners are
//! registered per [`EventKind`] and observe every visit of the router; a
//! listener may prevent the default reaction of the cancelable kinds.

use crate::error::VisitError;
use crate::http::{HttpResponse, Progress};
use crate::page::{Errors, Page};
use crate::params::VisitStatus;
use crate::sync::lock;
use crate::visit::Visit;
use core::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Before,
    Start,
    Progress,
    Success,
    Error,
    Invalid,
    Exception,
    Finish,
    Navigate,
}

impl EventKind {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::Start => "start",
            Self::Progress => "progress",
            Self::Success => "success",
            Self::Error => "error",
            Self::Invalid => "invalid",
            Self::Exception => "exception",
            Self::Finish => "finish",
            Self::Navigate => "navigate",
        }
    }

    /// Whether a listener can prevent the default reaction.
    pub const fn is_cancelable(self) -> bool {
        matches!(self, Self::Before | Self::Invalid | Self::Exception)
    }
}

/// Payload handed to listeners.
#[derive(Debug)]
pub enum GlobalEvent<'evt> {
    /// Preventing aborts the visit.
    Before(&'evt Visit),
    Start(&'evt Visit),
    Progress(&'evt Progress),
    Success(&'evt Page),
    Error(&'evt Errors),
    /// Preventing suppresses the invalid-response view.
    Invalid(&'evt HttpResponse),
    /// Preventing swallows the error instead of returning it.
    Exception(&'evt VisitError),
    Finish {
        visit: &'evt Visit,
        status: VisitStatus,
    },
    Navigate(&'evt Page),
}

impl GlobalEvent<'_> {
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Before(_) => EventKind::Before,
            Self::Start(_) => EventKind::Start,
            Self::Progress(_) => EventKind::Progress,
            Self::Success(_) => EventKind::Success,
            Self::Error(_) => EventKind::Error,
            Self::Invalid(_) => EventKind::Invalid,
            Self::Exception(_) => EventKind::Exception,
            Self::Finish { .. } => EventKind::Finish,
            Self::Navigate(_) => EventKind::Navigate,
        }
    }
}

/// What a listener wants done with the default reaction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ListenerOutcome {
    #[default]
    Continue,
    Prevent,
}

impl From<()> for ListenerOutcome {
    fn from((): ()) -> Self {
        Self::Continue
    }
}

/// `false` prevents, mirroring a DOM listener returning `false`.
impl From<bool> for ListenerOutcome {
    fn from(proceed: bool) -> Self {
        if proceed { Self::Continue } else { Self::Prevent }
    }
}

type Listener = Arc<dyn Fn(&GlobalEvent<'_>) -> ListenerOutcome + Send + Sync>;

#[derive(Default)]
pub struct EventBus {
    listeners: Mutex<Vec<(u64, EventKind, Listener)>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register `listener` for `kind`.
    pub fn on<Callback, Outcome>(
        self: &Arc<Self>,
        kind: EventKind,
        listener: Callback,
    ) -> Subscription
    where
        Callback: Fn(&GlobalEvent<'_>) -> Outcome + Send + Sync + 'static,
        Outcome: Into<ListenerOutcome>,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let wrapped: Listener =
            Arc::new(move |event: &GlobalEvent<'_>| -> ListenerOutcome { listener(event).into() });
        lock(&self.listeners).push((id, kind, wrapped));
        Subscription {
            bus: Arc::downgrade(self),
            id,
        }
    }

    /// Deliver `event` to every listener of its kind.
    ///
    /// Returns `false` only when the event is cancelable and some listener
    /// prevented it. Listeners run without the registry lock held, so they
    /// may subscribe or unsubscribe freely.
    pub fn fire(&self, event: &GlobalEvent<'_>) -> bool {
        let kind = event.kind();
        let snapshot: Vec<Listener> = lock(&self.listeners)
            .iter()
            .filter(|(_, registered, _)| *registered == kind)
            .map(|(_, _, listener)| Arc::clone(listener))
            .collect();
        let mut prevented = false;
        for listener in snapshot {
            if listener(event) == ListenerOutcome::Prevent {
                prevented = true;
            }
        }
        !(prevented && kind.is_cancelable())
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).len()
    }

    fn remove(&self, id: u64) {
        lock(&self.listeners).retain(|(registered, _, _)| *registered != id);
    }
}

/// Handle returned by [`EventBus::on`].
#[derive(Debug)]
pub struct Subscription {
    bus: Weak<EventBus>,
    id: u64,
}

impl Subscription {
    /// Remove the listener. A no-op once the bus is gone.
    pub fn unsubscribe(self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.remove(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use core::sync::atomic::AtomicUsize;

    #[test]
    fn prevent_only_affects_cancelable_kinds() {
        let bus = EventBus::new();
        let _invalid = bus.on(EventKind::Invalid, |_event| false);
        let _navigate = bus.on(EventKind::Navigate, |_event| false);

        let response = HttpResponse::new(500);
        assert!(!bus.fire(&GlobalEvent::Invalid(&response)));
        let page = Page::new("Home", "/");
        assert!(bus.fire(&GlobalEvent::Navigate(&page)));
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let subscription = bus.on(EventKind::Success, move |_event| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let page = Page::new("Home", "/");
        bus.fire(&GlobalEvent::Success(&page));
        subscription.unsubscribe();
        bus.fire(&GlobalEvent::Success(&page));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn every_listener_runs_even_after_prevent() {
        let bus = EventBus::new();
        let calls = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let counter = Arc::clone(&calls);
            let _sub = bus.on(EventKind::Exception, move |_event| {
                counter.fetch_add(1, Ordering::SeqCst);
                false
            });
        }
        let error = VisitError::Transport(TransportError::Timeout);
        assert!(!bus.fire(&GlobalEvent::Exception(&error)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
