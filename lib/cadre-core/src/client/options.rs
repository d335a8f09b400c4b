//! Per-request options for the REST engine.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};

use http::Method;
use tokio::io::{AsyncRead, AsyncWrite};

/// Streamed request body source.
pub type RequestStream = Box<dyn AsyncRead + Send + Unpin>;

/// Streamed response body sink.
pub type ResponseStream = Box<dyn AsyncWrite + Send + Unpin>;

/// Buffered request payload.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::From)]
pub enum WriteData {
    /// A JSON value, serialized when the content type is `application/json`.
    Json(serde_json::Value),
    /// Plain text sent as-is.
    #[from(skip)]
    Text(String),
    /// Raw bytes sent as-is.
    #[from(skip)]
    Bytes(Vec<u8>),
}

impl WriteData {
    /// Serializes the payload for the wire.
    ///
    /// # Errors
    ///
    /// Fails when a [`WriteData::Json`] value cannot be serialized.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        match self {
            Self::Json(value) => serde_json::to_vec(value),
            Self::Text(text) => Ok(text.clone().into_bytes()),
            Self::Bytes(bytes) => Ok(bytes.clone()),
        }
    }

    /// Loggable rendition of the payload for failure diagnostics.
    pub fn to_diagnostic_string(&self) -> String {
        match self {
            Self::Json(value) => {
                serde_json::to_string(value).unwrap_or_else(|_| format!("{value:?}"))
            }
            Self::Text(text) => text.clone(),
            Self::Bytes(bytes) => format!("<{} bytes>", bytes.len()),
        }
    }
}

/// Transfer progress shared between the engine and its caller.
///
/// Cheap to clone; all clones observe the same counters. The reported
/// percentage stays below 100 until [`ProgressTask::finish`] is called, since
/// the total size of a streamed body is not always known up front.
#[derive(Debug, Clone, Default)]
pub struct ProgressTask {
    inner: Arc<ProgressInner>,
}

#[derive(Debug, Default)]
struct ProgressInner {
    percent: AtomicU8,
    transferred: AtomicU64,
    complete: AtomicBool,
    message: std::sync::Mutex<String>,
}

impl ProgressTask {
    /// Creates a fresh progress tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records transferred bytes against an optional known total.
    ///
    /// The byte count is always retained; the percentage only moves when the
    /// total is known.
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss, clippy::cast_sign_loss)]
    pub fn update(&self, transferred: u64, total: Option<u64>) {
        self.inner.transferred.store(transferred, Ordering::Relaxed);
        let percent = match total {
            Some(total) if total > 0 => {
                let raw = (transferred as f64 / total as f64 * 100.0) as u8;
                raw.min(99)
            }
            _ => self.inner.percent.load(Ordering::Relaxed),
        };
        self.inner.percent.store(percent, Ordering::Relaxed);
    }

    /// Updates the human-readable status message.
    pub fn set_message(&self, message: impl Into<String>) {
        if let Ok(mut guard) = self.inner.message.lock() {
            *guard = message.into();
        }
    }

    /// Marks the transfer complete and pins the percentage at 100.
    pub fn finish(&self) {
        self.inner.percent.store(100, Ordering::Relaxed);
        self.inner.complete.store(true, Ordering::Relaxed);
    }

    /// Current completion percentage in `[0, 100]`.
    pub fn percent(&self) -> u8 {
        self.inner.percent.load(Ordering::Relaxed)
    }

    /// Bytes transferred so far.
    pub fn transferred(&self) -> u64 {
        self.inner.transferred.load(Ordering::Relaxed)
    }

    /// Whether [`ProgressTask::finish`] has been called.
    pub fn is_complete(&self) -> bool {
        self.inner.complete.load(Ordering::Relaxed)
    }

    /// Current status message.
    pub fn message(&self) -> String {
        self.inner
            .message
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

/// Everything the engine needs to perform one request.
///
/// Built with [`RestRequest::new`] and the `with_*` setters. Exactly one body
/// source may be supplied; the engine rejects a request carrying both
/// `write_data` and `request_stream`.
#[derive(derive_more::Debug)]
pub struct RestRequest {
    /// HTTP verb.
    pub method: Method,
    /// Resource URI, joined after the session base path.
    pub resource: String,
    /// Caller headers, merged after auth headers (last-write-wins).
    pub headers: Vec<(String, String)>,
    /// Buffered request payload.
    pub write_data: Option<WriteData>,
    /// Streamed request body.
    #[debug(ignore)]
    pub request_stream: Option<RequestStream>,
    /// Streamed response sink.
    #[debug(ignore)]
    pub response_stream: Option<ResponseStream>,
    /// Collapse CRLF to LF in the streamed request body.
    pub normalize_request_new_lines: bool,
    /// Rewrite the streamed response body to the native line ending.
    pub normalize_response_new_lines: bool,
    /// Progress reporting for streamed transfers.
    pub progress_task: Option<ProgressTask>,
}

impl RestRequest {
    /// Creates a request for the given verb and resource.
    pub fn new(method: Method, resource: impl Into<String>) -> Self {
        Self {
            method,
            resource: resource.into(),
            headers: Vec::new(),
            write_data: None,
            request_stream: None,
            response_stream: None,
            normalize_request_new_lines: false,
            normalize_response_new_lines: false,
            progress_task: None,
        }
    }

    /// Adds a request header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Adds several request headers.
    #[must_use]
    pub fn with_headers(
        mut self,
        headers: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Sets the buffered request payload.
    #[must_use]
    pub fn with_write_data(mut self, data: WriteData) -> Self {
        self.write_data = Some(data);
        self
    }

    /// Sets the streamed request body.
    #[must_use]
    pub fn with_request_stream(mut self, stream: RequestStream) -> Self {
        self.request_stream = Some(stream);
        self
    }

    /// Sets the streamed response sink.
    #[must_use]
    pub fn with_response_stream(mut self, stream: ResponseStream) -> Self {
        self.response_stream = Some(stream);
        self
    }

    /// Enables CRLF collapsing on the streamed request body.
    #[must_use]
    pub fn normalize_request_new_lines(mut self, normalize: bool) -> Self {
        self.normalize_request_new_lines = normalize;
        self
    }

    /// Enables native line-ending rewriting on the streamed response body.
    #[must_use]
    pub fn normalize_response_new_lines(mut self, normalize: bool) -> Self {
        self.normalize_response_new_lines = normalize;
        self
    }

    /// Attaches a progress tracker.
    #[must_use]
    pub fn with_progress_task(mut self, task: ProgressTask) -> Self {
        self.progress_task = Some(task);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::check;
    use serde_json::json;

    #[test]
    fn test_write_data_json_serializes() {
        let data = WriteData::Json(json!({"name": "value"}));
        check!(data.to_bytes().unwrap() == br#"{"name":"value"}"#);
    }

    #[test]
    fn test_write_data_bytes_pass_through() {
        let data = WriteData::Bytes(vec![0, 159, 146, 150]);
        check!(data.to_bytes().unwrap() == vec![0, 159, 146, 150]);
        check!(data.to_diagnostic_string() == "<4 bytes>");
    }

    #[test]
    fn test_progress_stays_below_hundred_until_finished() {
        let task = ProgressTask::new();
        task.update(50, Some(100));
        check!(task.percent() == 50);

        task.update(100, Some(100));
        check!(task.percent() == 99);
        check!(!task.is_complete());

        task.finish();
        check!(task.percent() == 100);
        check!(task.is_complete());
    }

    #[test]
    fn test_progress_without_total_keeps_last_percent() {
        let task = ProgressTask::new();
        task.update(25, Some(100));
        task.update(4096, None);
        check!(task.percent() == 25);
    }

    #[test]
    fn test_progress_retains_byte_count_without_total() {
        let task = ProgressTask::new();
        task.update(8192, None);
        check!(task.transferred() == 8192);
        check!(task.percent() == 0);

        task.update(16384, None);
        check!(task.transferred() == 16384);
    }

    #[test]
    fn test_request_builder_collects_headers() {
        let request = RestRequest::new(Method::GET, "/api/items")
            .with_header("Accept", "application/json")
            .with_header("X-Trace", "abc");
        check!(request.headers.len() == 2);
        check!(request.resource == "/api/items");
    }
}
