//! Wire-level request and response types plus the protocol header names.

use crate::payload::RequestPayload;
use crate::visit::Method;
use bytes::Bytes;
use serde_json::{Map, Value};
use url::Url;

pub const X_INERTIA: &str = "X-Inertia";
pub const X_INERTIA_VERSION: &str = "X-Inertia-Version";
pub const X_INERTIA_LOCATION: &str = "X-Inertia-Location";
pub const X_INERTIA_PARTIAL_COMPONENT: &str = "X-Inertia-Partial-Component";
pub const X_INERTIA_PARTIAL_DATA: &str = "X-Inertia-Partial-Data";
pub const X_INERTIA_PARTIAL_EXCEPT: &str = "X-Inertia-Partial-Except";
pub const X_INERTIA_ERROR_BAG: &str = "X-Inertia-Error-Bag";
pub const X_REQUESTED_WITH: &str = "X-Requested-With";
pub const ACCEPT: &str = "Accept";

/// Value sent in the `Accept` header of every protocol request.
pub const ACCEPT_HTML: &str = "text/html, application/xhtml+xml";

/// Status the server answers with to force a full browser navigation.
pub const STATUS_CONFLICT: u16 = 409;

/// Ordered header list with case-insensitive lookup.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Set `name`, replacing any value already stored under it in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(slot) = self
            .0
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(&name))
        {
            slot.1 = value;
        } else {
            self.0.push((name, value));
        }
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub const fn len(&self) -> usize {
        self.0.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append every header of `other`, later values winning.
    pub fn extend(&mut self, other: &Self) {
        for (name, value) in other.iter() {
            self.insert(name, value);
        }
    }
}

impl<Name: Into<String>, Val: Into<String>> FromIterator<(Name, Val)> for Headers {
    fn from_iter<Iter: IntoIterator<Item = (Name, Val)>>(iter: Iter) -> Self {
        let mut headers = Self::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

/// One outgoing exchange as handed to the [`Transport`](crate::platform::Transport).
#[derive(Clone, Debug)]
pub struct HttpRequest {
    pub method: Method,
    /// Target without its fragment.
    pub url: Url,
    pub headers: Headers,
    /// Extra query parameters the transport serializes onto `url`.
    pub query: Map<String, Value>,
    pub body: RequestPayload,
}

/// A completed exchange. Every status code counts as a response.
#[derive(Clone, Debug, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Whether the server spoke the page protocol.
    pub fn is_protocol(&self) -> bool {
        self.headers.contains(X_INERTIA)
    }

    /// Lossy UTF-8 view of the body.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Raw upload progress reported by a transport.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UploadProgress {
    pub loaded: u64,
    pub total: Option<u64>,
}

impl UploadProgress {
    /// Fraction in `0.0..=1.0`, when the total is known and non-zero.
    pub fn fraction(&self) -> Option<f64> {
        self.total
            .filter(|total| *total > 0)
            .map(|total| (self.loaded as f64 / total as f64).clamp(0.0, 1.0))
    }
}

/// Upload progress as delivered to `on_progress` and the `progress` event.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Progress {
    pub loaded: u64,
    pub total: Option<u64>,
    pub fraction: Option<f64>,
    /// `0..=100`, zero while the total is unknown.
    pub percentage: u8,
}

impl From<UploadProgress> for Progress {
    fn from(raw: UploadProgress) -> Self {
        let fraction = raw.fraction();
        let percentage = fraction.map_or(0, |value| (value * 100.0).round() as u8);
        Self {
            loaded: raw.loaded,
            total: raw.total,
            fraction,
            percentage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn header_lookup_ignores_case() {
        let mut headers = Headers::new().with("X-Inertia", "true");
        assert_eq!(headers.get("x-inertia"), Some("true"));
        headers.insert("x-INERTIA", "false");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get(X_INERTIA), Some("false"));
    }

    #[test]
    fn progress_percentage() {
        let halfway = Progress::from(UploadProgress {
            loaded: 512,
            total: Some(1024),
        });
        assert_eq!(halfway.percentage, 50);
        assert_eq!(halfway.fraction, Some(0.5));

        let unknown = Progress::from(UploadProgress {
            loaded: 10,
            total: None,
        });
        assert_eq!(unknown.percentage, 0);
        assert_eq!(unknown.fraction, None);

        let third = Progress::from(UploadProgress {
            loaded: 1,
            total: Some(3),
        });
        assert_eq!(third.percentage, 33);
    }
}
