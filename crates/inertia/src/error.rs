//! Error taxonomy for the visit pipeline.
//!
//! Validation errors, invalid responses, location redirects and cancellations
//! are ordinary outcomes and never show up here. These types only describe
//! exchanges that failed without a usable response and collaborator failures.

use thiserror::Error;
use tokio::task::JoinError;
use url::ParseError;

/// A network exchange that produced no HTTP response at all.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection, DNS or protocol failure.
    #[error("network error: {0}")]
    Network(String),
    /// The exchange exceeded the transport's deadline.
    #[error("request timed out")]
    Timeout,
    /// The transport refused to build the request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Failure surfaced through the `exception` lifecycle event.
#[derive(Debug, Error)]
pub enum VisitError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("page payload could not be (de)serialized: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid url `{href}`: {source}")]
    InvalidUrl {
        href: String,
        #[source]
        source: ParseError,
    },
    #[error("failed to resolve component `{component}`: {source}")]
    ComponentResolution {
        component: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("view swap failed: {0}")]
    Swap(#[source] anyhow::Error),
    #[error("history store failed: {0}")]
    History(#[source] anyhow::Error),
    #[error("browser collaborator failed: {0}")]
    Browser(#[source] anyhow::Error),
    #[error("visit task ended abnormally: {0}")]
    Task(#[from] JoinError),
}
