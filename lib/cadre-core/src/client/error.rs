use http::{Method, StatusCode};

use crate::session::SessionError;

/// Where a failed exchange went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum ErrorSource {
    /// The request never reached a server (DNS, refused connection, socket
    /// failure, certificate file problems).
    #[display("client")]
    Client,
    /// The server responded with a status outside [200, 300).
    #[display("http")]
    Http,
    /// A socket or completion timeout fired.
    #[display("timeout")]
    Timeout,
}

/// Diagnostic details for a failed HTTP(S) exchange.
///
/// Constructed exactly once per failed request, after the response (if any)
/// has been fully drained. Headers and payload are stringified defensively so
/// diagnostics survive even when the values cannot be serialized.
#[derive(Debug, Clone)]
pub struct RestFailure {
    /// Human-readable failure summary.
    pub message: String,
    /// Failure classification.
    pub source: ErrorSource,
    /// HTTP status, when a server responded.
    pub http_status: Option<StatusCode>,
    /// Session protocol ("http"/"https").
    pub protocol: String,
    /// Target host.
    pub host: String,
    /// Target port.
    pub port: u16,
    /// Session base path.
    pub base_path: String,
    /// Resource URI of the failed request.
    pub resource: String,
    /// HTTP verb of the failed request.
    pub request: Method,
    /// Stringified request headers (censor before logging).
    pub headers: String,
    /// Stringified request payload (censor before logging).
    pub payload: String,
    /// Raw (decompressed) response body or underlying cause text.
    pub cause: Option<String>,
    /// Formatted multi-line diagnostic block.
    pub additional_details: String,
}

impl std::fmt::Display for RestFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}\n{}", self.message, self.additional_details)
    }
}

/// Strategy hook to customize the failure produced for a failed request.
///
/// The engine calls [`ErrorProcessor::process`] with the computed failure;
/// returning `Some` replaces it, returning `None` keeps the computed one.
pub trait ErrorProcessor: Send + Sync {
    /// Inspects and optionally replaces the failure before it is thrown.
    fn process(&self, failure: &RestFailure) -> Option<RestFailure>;
}

/// Errors produced by the REST client.
#[derive(Debug, derive_more::Error, derive_more::Display, derive_more::From)]
pub enum RestClientError {
    /// A request failed after being dispatched (client, http or timeout).
    #[display("{_0}")]
    Failure(#[error(not(source))] Box<RestFailure>),

    /// Session construction or validation failed.
    Session(SessionError),

    /// Decompression of a response body failed.
    Decompress(DecompressError),

    /// A required option was blank or missing.
    #[display("Required option '{name}' must not be blank")]
    #[from(skip)]
    BlankOption {
        /// Name of the offending option.
        name: &'static str,
    },

    /// Both a buffered payload and a request stream were supplied.
    #[display("You cannot specify both write_data and request_stream")]
    ConflictingBodySources,

    /// The session carries no usable credentials for its auth type.
    #[display("No credentials for a BASIC or TOKEN type of session.")]
    NoCredentials,

    /// A PEM certificate or key file could not be read.
    #[display("Failed to open one or more PEM certificate files, the file(s) did not exist.\n{message}")]
    #[from(skip)]
    PemRead {
        /// Underlying read failure.
        message: String,
    },

    /// Credentials could not be encoded into a header value.
    #[display("Invalid header value for authentication: {message}")]
    #[from(skip)]
    InvalidAuthHeader {
        /// Description of the invalid characters.
        message: String,
    },

    /// A caller-supplied header could not be encoded.
    #[display("Invalid request header '{name}': {message}")]
    #[from(skip)]
    InvalidHeader {
        /// The offending header name.
        name: String,
        /// Description of the problem.
        message: String,
    },

    /// Reading or writing a local stream failed.
    #[display("Stream I/O failed: {_0}")]
    Io(std::io::Error),

    /// The request URL could not be constructed.
    UrlError(url::ParseError),

    /// The underlying HTTP client reported a configuration error.
    ReqwestError(reqwest::Error),

    /// A successful response could not be parsed as JSON.
    #[display("{context}: {error}")]
    #[from(skip)]
    JsonParse {
        /// Contextual message describing which request succeeded.
        context: String,
        /// The underlying JSON parsing error.
        error: serde_json::Error,
    },
}

impl RestClientError {
    /// HTTP status carried by the error, when a server responded.
    pub fn http_status(&self) -> Option<StatusCode> {
        match self {
            Self::Failure(failure) => failure.http_status,
            _ => None,
        }
    }

    /// Failure classification for dispatched requests.
    pub fn source(&self) -> Option<ErrorSource> {
        match self {
            Self::Failure(failure) => Some(failure.source),
            _ => None,
        }
    }

    /// Raw response body or underlying cause text for dispatched requests.
    pub fn cause(&self) -> Option<&str> {
        match self {
            Self::Failure(failure) => failure.cause.as_deref(),
            _ => None,
        }
    }
}

/// Errors raised while decoding a compressed response body.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Error, derive_more::Display)]
pub enum DecompressError {
    /// A fully buffered response body failed to decode.
    #[display("Failed to decompress the buffered response: {message}")]
    Buffer {
        /// Underlying decoder failure.
        message: String,
    },

    /// A streamed response body failed to decode.
    #[display("Failed to decompress the response stream: {message}")]
    Stream {
        /// Underlying decoder failure.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rest_client_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<RestClientError>();
        assert_sync::<RestClientError>();
    }

    #[test]
    fn test_pem_read_message() {
        let err = RestClientError::PemRead {
            message: "No such file or directory".to_string(),
        };
        assert!(
            err.to_string()
                .contains("Failed to open one or more PEM certificate files")
        );
    }

    #[test]
    fn test_failure_accessors() {
        let failure = RestFailure {
            message: "Rest API failure with HTTP(S) status 400".to_string(),
            source: ErrorSource::Http,
            http_status: Some(StatusCode::BAD_REQUEST),
            protocol: "https".to_string(),
            host: "example.com".to_string(),
            port: 443,
            base_path: String::new(),
            resource: "/api".to_string(),
            request: Method::GET,
            headers: "[]".to_string(),
            payload: "None".to_string(),
            cause: Some("bad input".to_string()),
            additional_details: String::new(),
        };
        let err = RestClientError::Failure(Box::new(failure));

        assert_eq!(err.http_status(), Some(StatusCode::BAD_REQUEST));
        assert_eq!(err.source(), Some(ErrorSource::Http));
        assert_eq!(err.cause(), Some("bad input"));
    }
}
