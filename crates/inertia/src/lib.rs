//! Visit pipeline for server-driven single-page navigation.
//!
//! The server answers every request with a structured [`Page`] instead of HTML.
//! This crate turns navigation intents into exactly one in-flight exchange,
//! resolves races between overlapping visits, and applies the outcome to a
//! single [`PageStore`] while coordinating history, scroll state, partial
//! reloads and deferred props.
//!
//! Rendering, transport, history storage and scroll bookkeeping are external
//! collaborators described by the traits in [`platform`].

pub mod config;
pub mod error;
pub mod events;
pub mod history;
pub mod href;
pub mod http;
pub mod location_visit;
pub mod page;
pub mod params;
pub mod payload;
pub mod platform;
pub mod poll;
pub mod query;
pub mod request;
pub mod response;
pub mod router;
pub mod store;
pub mod stream;
/// Mutex helpers shared by the stateful modules.
mod sync;
pub mod visit;

pub use config::RouterConfig;
pub use error::{TransportError, VisitError};
pub use events::{EventBus, EventKind, GlobalEvent, ListenerOutcome, Subscription};
pub use http::{Headers, HttpRequest, HttpResponse, Progress, UploadProgress};
pub use page::{Errors, Page, Props, ScrollRegion};
pub use params::{RequestParams, VisitStatus};
pub use payload::{FilePart, FormData, FormEntry, RequestPayload, VisitData};
pub use platform::Platform;
pub use poll::PollHandle;
pub use query::ArrayFormat;
pub use request::{CancelOptions, CancelToken};
pub use response::ResponseOutcome;
pub use router::{Router, VisitTask};
pub use store::{PageStore, SetOptions, SetOutcome};
pub use visit::{Method, PreserveOption, Visit, VisitCallbacks, VisitOptions};
