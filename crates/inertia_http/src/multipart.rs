//! `multipart/form-data` encoding with upload progress.
//!
//! The whole form is encoded up front so the length is known, then handed to
//! reqwest as a stream of chunks. Every chunk pulled by the connection is
//! reported to the progress sink.

use bytes::{BufMut as _, Bytes, BytesMut};
use core::sync::atomic::{AtomicU64, Ordering};
use futures::stream::{self, Stream, StreamExt as _};
use inertia::platform::ProgressSink;
use inertia::{FormData, FormEntry, UploadProgress};
use std::io;
use std::time::{SystemTime, UNIX_EPOCH};

/// Size of the chunks handed to the connection.
pub const CHUNK_SIZE: usize = 64 * 1024;

const CRLF: &[u8] = b"\r\n";

static BOUNDARY_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A fully encoded form body.
#[derive(Clone, Debug)]
pub struct MultipartBody {
    boundary: String,
    bytes: Bytes,
}

impl MultipartBody {
    /// Encode `form` with a fresh boundary.
    pub fn encode(form: &FormData) -> Self {
        Self::encode_with_boundary(form, fresh_boundary())
    }

    pub fn encode_with_boundary(form: &FormData, boundary: String) -> Self {
        let mut buf = BytesMut::new();
        for entry in form.entries() {
            buf.put_slice(b"--");
            buf.put_slice(boundary.as_bytes());
            buf.put_slice(CRLF);
            match entry {
                FormEntry::Text { name, value } => {
                    buf.put_slice(
                        format!("Content-Disposition: form-data; name=\"{}\"", escape(name))
                            .as_bytes(),
                    );
                    buf.put_slice(CRLF);
                    buf.put_slice(CRLF);
                    buf.put_slice(value.as_bytes());
                }
                FormEntry::File { name, part } => {
                    buf.put_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"",
                            escape(name),
                            escape(&part.file_name)
                        )
                        .as_bytes(),
                    );
                    buf.put_slice(CRLF);
                    let content_type = part
                        .content_type
                        .as_deref()
                        .unwrap_or("application/octet-stream");
                    buf.put_slice(format!("Content-Type: {content_type}").as_bytes());
                    buf.put_slice(CRLF);
                    buf.put_slice(CRLF);
                    buf.put_slice(&part.bytes);
                }
            }
            buf.put_slice(CRLF);
        }
        buf.put_slice(b"--");
        buf.put_slice(boundary.as_bytes());
        buf.put_slice(b"--");
        buf.put_slice(CRLF);
        Self {
            boundary,
            bytes: buf.freeze(),
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Value of the `Content-Type` header for this body.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Stream the body in [`CHUNK_SIZE`] pieces, reporting the bytes handed
    /// out so far after each one.
    pub fn into_stream(
        self,
        progress: ProgressSink,
    ) -> impl Stream<Item = Result<Bytes, io::Error>> + Send + 'static {
        let total = self.len();
        let chunks: Vec<Bytes> = (0..self.bytes.len())
            .step_by(CHUNK_SIZE)
            .map(|start| {
                self.bytes
                    .slice(start..(start + CHUNK_SIZE).min(self.bytes.len()))
            })
            .collect();
        let mut loaded = 0_u64;
        stream::iter(chunks).map(move |chunk| {
            loaded += chunk.len() as u64;
            progress(UploadProgress {
                loaded,
                total: Some(total),
            });
            Ok(chunk)
        })
    }
}

/// Quotes and line breaks cannot appear inside a quoted header parameter.
fn escape(value: &str) -> String {
    value
        .replace('"', "%22")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

fn fresh_boundary() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_nanos() as u64);
    let sequence = BOUNDARY_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("----inertia-{nanos:016x}{sequence:04x}")
}
