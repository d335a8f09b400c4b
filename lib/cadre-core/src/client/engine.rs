//! The REST engine performing one HTTP(S) exchange against a [`Session`].

use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use http::header::{CONTENT_ENCODING, CONTENT_TYPE, SET_COOKIE};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, trace};

use crate::censor::Censor;
use crate::env::EnvSettings;
use crate::session::Session;

use super::compression::{ContentEncoding, StreamDecoder, decompress_buffer};
use super::error::{ErrorProcessor, ErrorSource, RestClientError, RestFailure};
use super::newline::{RequestNormalizer, ResponseNormalizer};
use super::options::{ProgressTask, RequestStream, RestRequest, WriteData};
use super::proxy::ProxySettings;

/// Performs one request against a session and retains the outcome.
///
/// An engine is single-use: create one per request via [`RestEngine::new`],
/// call [`RestEngine::request`], then read `status`, `data` and
/// `request_succeeded` off it. The borrowed session may be mutated by the
/// exchange (cookie storage).
pub struct RestEngine<'s> {
    session: &'s mut Session,
    censor: Arc<Censor>,
    error_processor: Option<Box<dyn ErrorProcessor>>,
    env_prefix: Option<String>,
    status: Option<StatusCode>,
    data: Vec<u8>,
    request_succeeded: bool,
}

impl std::fmt::Debug for RestEngine<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestEngine")
            .field("status", &self.status)
            .field("request_succeeded", &self.request_succeeded)
            .finish_non_exhaustive()
    }
}

impl<'s> RestEngine<'s> {
    /// Creates an engine over the session with a default censor.
    pub fn new(session: &'s mut Session) -> Self {
        Self {
            session,
            censor: Arc::new(Censor::new()),
            error_processor: None,
            env_prefix: None,
            status: None,
            data: Vec::new(),
            request_succeeded: false,
        }
    }

    /// Replaces the censor used for header redaction in logs.
    #[must_use]
    pub fn with_censor(mut self, censor: Arc<Censor>) -> Self {
        self.censor = censor;
        self
    }

    /// Installs a hook that may replace the failure built for a failed
    /// exchange.
    #[must_use]
    pub fn with_error_processor(mut self, processor: Box<dyn ErrorProcessor>) -> Self {
        self.error_processor = Some(processor);
        self
    }

    /// Sets the environment prefix used for timeout fallbacks.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// HTTP status of the last exchange, once a server responded.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Whether the last exchange completed with a 2xx status.
    pub fn request_succeeded(&self) -> bool {
        self.request_succeeded
    }

    /// Raw (decompressed) response body of the last buffered exchange.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Response body as text, with invalid UTF-8 replaced.
    pub fn data_string(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }

    /// Performs the request.
    ///
    /// Resolves with the response body as a string (empty when the body was
    /// streamed) for a status in `[200, 300)`.
    ///
    /// # Errors
    ///
    /// Fails before any transport activity on validation, credential or
    /// certificate problems; fails with a boxed [`RestFailure`] when the
    /// exchange itself goes wrong.
    pub async fn request(&mut self, request: RestRequest) -> Result<String, RestClientError> {
        if request.resource.trim().is_empty() {
            return Err(RestClientError::BlankOption { name: "resource" });
        }
        if request.write_data.is_some() && request.request_stream.is_some() {
            return Err(RestClientError::ConflictingBodySources);
        }

        let env = match &self.env_prefix {
            Some(prefix) => EnvSettings::read(prefix),
            None => EnvSettings::default(),
        };
        let connect_timeout = self
            .session
            .socket_connect_timeout
            .or(env.socket_connect_timeout);
        let completion_timeout = self
            .session
            .request_completion_timeout
            .or(env.request_completion_timeout);

        let path = posix_join(&self.session.base_path, &request.resource);
        let url = url::Url::parse(&format!(
            "{}://{}:{}{path}",
            self.session.protocol, self.session.hostname, self.session.port
        ))?;

        let auth = super::auth::resolve_auth(self.session)?;

        let mut builder = reqwest::Client::builder().no_proxy();
        if let Some(timeout) = connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if !self.session.reject_unauthorized {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(identity) = auth.identity {
            builder = builder.identity(identity);
        }
        if let Some(proxy) = ProxySettings::system_proxy(self.session) {
            builder = builder.proxy(reqwest::Proxy::all(proxy.proxy_url)?);
        }
        let client = builder.build()?;

        let mut headers = HeaderMap::new();
        for (name, value) in &auth.headers {
            let value = HeaderValue::from_str(value).map_err(|err| {
                RestClientError::InvalidAuthHeader {
                    message: err.to_string(),
                }
            })?;
            headers.insert(HeaderName::from_static(*name), value);
        }
        // caller headers land after auth headers so callers may override them
        for (name, value) in &request.headers {
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|err| {
                    RestClientError::InvalidHeader {
                        name: name.clone(),
                        message: err.to_string(),
                    }
                })?;
            let header_value = HeaderValue::from_str(value).map_err(|err| {
                RestClientError::InvalidHeader {
                    name: name.clone(),
                    message: err.to_string(),
                }
            })?;
            headers.insert(header_name, header_value);
        }
        if request.write_data.as_ref().is_some_and(|data| matches!(data, WriteData::Json(_)))
            && !headers.contains_key(CONTENT_TYPE)
        {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }

        trace!(
            method = %request.method,
            url = %url,
            headers = %self.stringify_headers(&headers),
            "sending request"
        );

        let mut request_builder = client
            .request(request.method.clone(), url)
            .headers(headers.clone());
        if let Some(timeout) = completion_timeout {
            request_builder = request_builder.timeout(timeout);
        }
        if let Some(data) = &request.write_data {
            let bytes = data.to_bytes().map_err(|error| RestClientError::JsonParse {
                context: "Failed to serialize the request payload".to_string(),
                error,
            })?;
            request_builder = request_builder.body(bytes);
        } else if let Some(stream) = request.request_stream {
            request_builder = request_builder.body(request_body(
                stream,
                request.normalize_request_new_lines,
                request.progress_task.clone(),
            ));
        }

        let response = match request_builder.send().await {
            Ok(response) => response,
            Err(err) => {
                let (source, message) = self.classify_send_error(&err);
                return Err(self.build_failure(
                    &request.method,
                    &request.resource,
                    &headers,
                    request.write_data.as_ref(),
                    source,
                    message,
                    None,
                    Some(err.to_string()),
                ));
            }
        };

        let status = response.status();
        self.status = Some(status);
        self.request_succeeded = status.is_success();
        debug!(%status, "response received");

        if self.session.auth_type == crate::session::AuthType::Token
            || self.session.store_cookie
        {
            let cookies: Vec<String> = response
                .headers()
                .get_all(SET_COOKIE)
                .iter()
                .filter_map(|value| value.to_str().ok())
                .map(ToString::to_string)
                .collect();
            if !cookies.is_empty() {
                self.session.store_cookie(&cookies);
            }
        }

        let encoding = response
            .headers()
            .get(CONTENT_ENCODING)
            .and_then(|value| value.to_str().ok())
            .and_then(ContentEncoding::from_header);
        let content_length = response.content_length();

        // failures are always buffered so diagnostics can carry the body
        if status.is_success() && request.response_stream.is_some() {
            let Some(sink) = request.response_stream else {
                return Ok(String::new());
            };
            transfer_response(
                response,
                sink,
                encoding,
                request.normalize_response_new_lines,
                request.progress_task.as_ref(),
                content_length,
            )
            .await?;
            self.data.clear();
            return Ok(String::new());
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(err) => {
                let (source, message) = self.classify_send_error(&err);
                return Err(self.build_failure(
                    &request.method,
                    &request.resource,
                    &headers,
                    request.write_data.as_ref(),
                    source,
                    message,
                    Some(status),
                    Some(err.to_string()),
                ));
            }
        };
        self.data = match encoding {
            Some(encoding) if status.is_success() => decompress_buffer(&body, encoding)?,
            Some(encoding) => {
                // keep the raw body for diagnostics when a failure body is corrupt
                decompress_buffer(&body, encoding).unwrap_or_else(|_| body.to_vec())
            }
            None => body.to_vec(),
        };
        if let Some(progress) = &request.progress_task {
            progress.finish();
        }

        if status.is_success() {
            return Ok(self.data_string());
        }
        let cause = self.data_string();
        Err(self.build_failure(
            &request.method,
            &request.resource,
            &headers,
            request.write_data.as_ref(),
            ErrorSource::Http,
            format!("Rest API failure with HTTP(S) status {}", status.as_u16()),
            Some(status),
            Some(cause),
        ))
    }

    fn classify_send_error(&self, err: &reqwest::Error) -> (ErrorSource, String) {
        if err.is_timeout() {
            if err.is_connect() {
                (
                    ErrorSource::Timeout,
                    "Connection timed out. Check the host, port, and firewall rules.".to_string(),
                )
            } else {
                if let Some(callback) = &self.session.completion_timeout_callback {
                    callback();
                }
                (
                    ErrorSource::Timeout,
                    "HTTP request timed out after connecting.".to_string(),
                )
            }
        } else {
            (
                ErrorSource::Client,
                "Failed to send an HTTP request.".to_string(),
            )
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn build_failure(
        &self,
        method: &http::Method,
        resource: &str,
        headers: &HeaderMap,
        write_data: Option<&WriteData>,
        source: ErrorSource,
        message: String,
        http_status: Option<StatusCode>,
        cause: Option<String>,
    ) -> RestClientError {
        let headers_text = self.stringify_headers(headers);
        let payload_text = write_data
            .map(WriteData::to_diagnostic_string)
            .unwrap_or_else(|| "None".to_string());
        let additional_details = format!(
            "Protocol:          {}\n\
             Host:              {}\n\
             Port:              {}\n\
             Base Path:         {}\n\
             Resource:          {}\n\
             Request:           {}\n\
             Headers:           {}\n\
             Payload:           {}\n\
             Auth type:         {}\n\
             Allow Unauth Cert: {}",
            self.session.protocol,
            self.session.hostname,
            self.session.port,
            self.session.base_path,
            resource,
            method,
            headers_text,
            payload_text,
            self.session.auth_type,
            !self.session.reject_unauthorized,
        );

        let mut failure = RestFailure {
            message,
            source,
            http_status,
            protocol: self.session.protocol.to_string(),
            host: self.session.hostname.clone(),
            port: self.session.port,
            base_path: self.session.base_path.clone(),
            resource: resource.to_string(),
            request: method.clone(),
            headers: headers_text,
            payload: payload_text,
            cause,
            additional_details,
        };
        if let Some(processor) = &self.error_processor {
            if let Some(replacement) = processor.process(&failure) {
                failure = replacement;
            }
        }
        RestClientError::Failure(Box::new(failure))
    }

    fn stringify_headers(&self, headers: &HeaderMap) -> String {
        let censored: Vec<(String, String)> = headers
            .iter()
            .map(|(name, value)| {
                let value = if self.censor.is_censored(name.as_str()) {
                    crate::censor::CENSOR_RESPONSE.to_string()
                } else {
                    String::from_utf8_lossy(value.as_bytes()).into_owned()
                };
                (name.to_string(), value)
            })
            .collect();
        serde_json::to_string(&censored).unwrap_or_else(|_| format!("{censored:?}"))
    }
}

async fn transfer_response(
    response: reqwest::Response,
    mut sink: super::options::ResponseStream,
    encoding: Option<ContentEncoding>,
    normalize_new_lines: bool,
    progress: Option<&ProgressTask>,
    content_length: Option<u64>,
) -> Result<(), RestClientError> {
    let mut stream = response.bytes_stream();
    let mut decoder = encoding.map(|encoding| StreamDecoder::new(encoding, normalize_new_lines));
    let mut normalizer = (encoding.is_none() && normalize_new_lines && cfg!(windows))
        .then(ResponseNormalizer::default);
    let mut received: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        received += chunk.len() as u64;
        let bytes = match (&mut decoder, &mut normalizer) {
            (Some(decoder), _) => decoder.chunk(&chunk)?,
            (None, Some(normalizer)) => normalizer.process(&chunk),
            (None, None) => chunk.to_vec(),
        };
        sink.write_all(&bytes).await?;
        if let Some(progress) = progress {
            progress.update(received, content_length);
        }
    }
    if let Some(decoder) = decoder {
        let tail = decoder.finish()?;
        sink.write_all(&tail).await?;
    }
    sink.flush().await?;
    if let Some(progress) = progress {
        progress.finish();
    }
    debug!(bytes = received, "response stream complete");
    Ok(())
}

/// Joins the base path and resource with single forward slashes.
fn posix_join(base_path: &str, resource: &str) -> String {
    let (resource_path, query) = match resource.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (resource, None),
    };
    let mut path = String::from("/");
    for segment in base_path.split('/').chain(resource_path.split('/')) {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        if !path.ends_with('/') {
            path.push('/');
        }
        path.push_str(segment);
    }
    match query {
        Some(query) => format!("{path}?{query}"),
        None => path,
    }
}

fn request_body(
    reader: RequestStream,
    normalize_new_lines: bool,
    progress: Option<ProgressTask>,
) -> reqwest::Body {
    struct State {
        reader: RequestStream,
        normalizer: Option<RequestNormalizer>,
        progress: Option<ProgressTask>,
        sent: u64,
        done: bool,
    }

    let state = State {
        reader,
        normalizer: normalize_new_lines.then(RequestNormalizer::default),
        progress,
        sent: 0,
        done: false,
    };
    let stream = futures::stream::try_unfold(state, |mut state| async move {
        if state.done {
            return Ok::<_, std::io::Error>(None);
        }
        let mut buf = vec![0_u8; 8192];
        let read = state.reader.read(&mut buf).await?;
        if read == 0 {
            state.done = true;
            if let Some(progress) = &state.progress {
                progress.finish();
            }
            let tail: Vec<u8> = state
                .normalizer
                .as_mut()
                .and_then(RequestNormalizer::finish)
                .into_iter()
                .collect();
            if tail.is_empty() {
                return Ok(None);
            }
            return Ok(Some((Bytes::from(tail), state)));
        }
        state.sent += read as u64;
        let chunk = match &mut state.normalizer {
            Some(normalizer) => normalizer.process(&buf[..read]),
            None => {
                buf.truncate(read);
                buf
            }
        };
        if let Some(progress) = &state.progress {
            progress.update(state.sent, None);
        }
        Ok(Some((Bytes::from(chunk), state)))
    });
    reqwest::Body::wrap_stream(stream)
}
