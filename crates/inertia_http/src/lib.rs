//! reqwest-backed [`Transport`] for the inertia visit pipeline.

pub mod multipart;

use async_trait::async_trait;
use core::time::Duration;
use inertia::platform::{ProgressSink, Transport};
use inertia::query::to_query_string;
use inertia::{
    ArrayFormat, Headers, HttpRequest, HttpResponse, Method, RequestPayload, TransportError,
};
use log::{debug, trace};
use multipart::MultipartBody;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Body, Client, Error as ReqwestError, Method as WireMethod, RequestBuilder};
use serde_json::Value;
use std::env;

/// Default deadline of one exchange.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings of the underlying HTTP client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpTransportConfig {
    /// Deadline of one exchange, `None` to wait forever
    pub timeout: Option<Duration>,
    /// `User-Agent` sent with every exchange
    pub user_agent: Option<String>,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            timeout: Some(DEFAULT_TIMEOUT),
            user_agent: Some(format!("inertia/{}", env!("CARGO_PKG_VERSION"))),
        }
    }
}

impl HttpTransportConfig {
    /// Load configuration from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `INERTIA_HTTP_TIMEOUT_MS`: exchange deadline in milliseconds, `0`
    ///   disables it (default: 30000)
    /// - `INERTIA_HTTP_USER_AGENT`: user agent string
    #[inline]
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let timeout = env::var("INERTIA_HTTP_TIMEOUT_MS")
            .ok()
            .and_then(|val| val.parse::<u64>().ok())
            .map_or(defaults.timeout, |millis| {
                (millis > 0).then_some(Duration::from_millis(millis))
            });
        let user_agent = env::var("INERTIA_HTTP_USER_AGENT")
            .ok()
            .filter(|val| !val.trim().is_empty())
            .or(defaults.user_agent);
        Self {
            timeout,
            user_agent,
        }
    }
}

/// Sends visits over HTTP with a shared reqwest [`Client`].
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// # Errors
    /// Returns [`TransportError::InvalidRequest`] when the client cannot be
    /// built, for example because the TLS backend fails to initialize.
    pub fn new(config: &HttpTransportConfig) -> Result<Self, TransportError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        let client = builder
            .build()
            .map_err(|err| TransportError::InvalidRequest(err.to_string()))?;
        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub const fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Translate `request` into a reqwest builder without sending it.
    pub fn prepare(&self, request: HttpRequest, progress: ProgressSink) -> RequestBuilder {
        let HttpRequest {
            method,
            mut url,
            headers,
            query,
            body,
        } = request;
        if !query.is_empty() {
            let extra = to_query_string(&query, ArrayFormat::default());
            let joined = match url.query().filter(|existing| !existing.is_empty()) {
                Some(existing) => format!("{existing}&{extra}"),
                None => extra,
            };
            url.set_query(Some(&joined));
        }

        let mut builder = apply_headers(self.client.request(wire_method(method), url), &headers);
        match body {
            RequestPayload::Fields(fields) if fields.is_empty() => {}
            RequestPayload::Fields(fields) => {
                builder = builder.json(&Value::Object(fields));
            }
            RequestPayload::Multipart(form) => {
                let encoded = MultipartBody::encode(&form);
                trace!("multipart body of {} bytes", encoded.len());
                builder = builder
                    .header(CONTENT_TYPE, encoded.content_type())
                    .header(CONTENT_LENGTH, encoded.len())
                    .body(Body::wrap_stream(encoded.into_stream(progress)));
            }
        }
        builder
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        request: HttpRequest,
        progress: ProgressSink,
    ) -> Result<HttpResponse, TransportError> {
        let builder = self.prepare(request, progress);
        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status().as_u16();
        let headers: Headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|text| (name.as_str().to_owned(), text.to_owned()))
            })
            .collect();
        let body = response.bytes().await.map_err(transport_error)?;
        debug!("received {status} with {} bytes", body.len());
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn apply_headers(mut builder: RequestBuilder, headers: &Headers) -> RequestBuilder {
    for (name, value) in headers.iter() {
        builder = builder.header(name, value);
    }
    builder
}

fn wire_method(method: Method) -> WireMethod {
    match method {
        Method::Get => WireMethod::GET,
        Method::Post => WireMethod::POST,
        Method::Put => WireMethod::PUT,
        Method::Patch => WireMethod::PATCH,
        Method::Delete => WireMethod::DELETE,
    }
}

fn transport_error(err: ReqwestError) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_builder() {
        TransportError::InvalidRequest(err.to_string())
    } else {
        TransportError::Network(err.to_string())
    }
}
