//! Connection descriptors for REST requests.
//!
//! A [`Session`] carries everything needed to reach a service: host, port,
//! protocol, base path, the authentication type and its credentials, TLS
//! settings, and timeouts. Sessions are built once per logical connection via
//! [`SessionBuilder`], stay immutable for the duration of a request, and may
//! be mutated between requests (token refresh, cookie storage).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use serde::{Deserialize, Serialize};

mod secret;
pub use self::secret::SecretString;

/// Basic auth scheme prefix.
pub const BASIC_PREFIX: &str = "Basic ";

/// Bearer auth scheme prefix.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Default HTTP port.
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// Default HTTPS port.
pub const DEFAULT_HTTPS_PORT: u16 = 443;

/// Callback invoked when a request exceeds its completion timeout.
pub type CompletionTimeoutCallback = Arc<dyn Fn() + Send + Sync>;

/// Errors raised while building or validating a [`Session`].
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Error, derive_more::Display)]
pub enum SessionError {
    /// The hostname is missing or blank.
    #[display("The hostname is required.")]
    MissingHostname,

    /// The hostname embeds a protocol prefix.
    #[display("The hostname should not contain the protocol.")]
    HostnameContainsProtocol,

    /// Basic auth requires user+password or pre-encoded credentials.
    #[display("Must have user & password OR base64 encoded credentials")]
    MissingBasicCredentials,

    /// Bearer auth requires a token value.
    #[display("Must have a token value for a bearer type of session")]
    MissingBearerToken,

    /// Token (cookie) auth requires a token type.
    #[display("You must provide a token type to use cookie authentication")]
    MissingTokenType,

    /// Token auth requires a token value or fallback basic credentials.
    #[display("Must have user & password OR tokenType & tokenValue OR cert & certKey.")]
    MissingTokenCredentials,

    /// PEM certificate auth requires both certificate and key files.
    #[display("Must have a certificate and key for a cert-pem type of session")]
    MissingCertFiles,

    /// PEM certificate auth is not allowed over plain HTTP.
    #[display(
        "Certificate based authentication cannot be used over HTTP. \
         Please set protocol to HTTPS to use certificate authentication."
    )]
    CertOverHttp,
}

/// Wire protocol for the session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_more::Display, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Plain-text HTTP.
    #[display("http")]
    Http,
    /// HTTP over TLS.
    #[display("https")]
    #[default]
    Https,
}

/// Authentication mechanism requested for a session.
///
/// Exactly one credential shape is populated on the session, consistent with
/// this type; the selection logic lives in the REST engine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_more::Display, Default,
)]
#[serde(rename_all = "kebab-case")]
pub enum AuthType {
    /// No authentication.
    #[display("none")]
    #[default]
    None,
    /// HTTP Basic authentication (user+password or pre-encoded).
    #[display("basic")]
    Basic,
    /// `Authorization: Bearer <token>`.
    #[display("bearer")]
    Bearer,
    /// Cookie-based token authentication (`Cookie: <type>=<value>`).
    #[display("token")]
    Token,
    /// Client certificate authentication with PEM cert and key files.
    #[display("cert-pem")]
    CertPem,
}

/// The connection descriptor used by the REST client.
///
/// Construct via [`Session::builder`]; the builder applies defaults and
/// validates that the populated credentials match the [`AuthType`].
#[derive(Clone, derive_more::Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Wire protocol.
    pub protocol: Protocol,
    /// Target host, without a protocol prefix.
    pub hostname: String,
    /// Target port.
    pub port: u16,
    /// Path prefix joined in front of every resource.
    pub base_path: String,
    /// Whether to reject servers with unverifiable certificates.
    pub reject_unauthorized: bool,
    /// Authentication mechanism.
    #[serde(rename = "type")]
    pub auth_type: AuthType,
    /// User name for basic auth.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Password for basic auth.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<SecretString>,
    /// Pre-encoded `user:password` in base64.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base64_encoded_auth: Option<SecretString>,
    /// Cookie name for token auth (for example `LtpaToken2`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Token value for token or bearer auth.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_value: Option<SecretString>,
    /// PEM certificate file for cert auth.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cert: Option<PathBuf>,
    /// PEM key file for cert auth.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cert_key: Option<PathBuf>,
    /// Maximum time to wait for the socket to connect.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub socket_connect_timeout: Option<Duration>,
    /// Maximum time to wait for the whole request to complete.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_completion_timeout: Option<Duration>,
    /// Invoked when the completion timeout fires.
    #[serde(skip)]
    #[debug(ignore)]
    pub completion_timeout_callback: Option<CompletionTimeoutCallback>,
    /// Store cookies from responses even when the auth type is not `Token`.
    pub store_cookie: bool,
}

impl Session {
    /// Starts building a session.
    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    /// Base64-encodes `user:password` for basic authentication.
    pub fn base64_auth(user: &str, password: &str) -> String {
        base64::engine::general_purpose::STANDARD.encode(format!("{user}:{password}"))
    }

    /// Recovers the user name from base64-encoded basic credentials.
    pub fn username_from_auth(auth: &str) -> Option<String> {
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(auth.trim_start_matches(BASIC_PREFIX.trim_end()))
            .ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let split = decoded.rfind(':')?;
        Some(decoded[..split].to_string())
    }

    /// Recovers the password from base64-encoded basic credentials.
    pub fn password_from_auth(auth: &str) -> Option<String> {
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(auth.trim_start_matches(BASIC_PREFIX.trim_end()))
            .ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let split = decoded.rfind(':')?;
        Some(decoded[split + 1..].to_string())
    }

    /// Parses `Set-Cookie` header values and refreshes the session token.
    ///
    /// Each cookie string is split on `;`; the element whose name matches the
    /// session's token type updates `token_type` and `token_value`. Called by
    /// the engine when the auth type is `Token` or `store_cookie` is set.
    pub fn store_cookie(&mut self, cookies: &[String]) {
        let Some(token_type) = self.token_type.clone() else {
            return;
        };
        for cookie in cookies {
            for element in cookie.split(';') {
                let element = element.trim();
                if element.starts_with(&token_type) {
                    if let Some(split) = element.find('=') {
                        self.token_type = Some(element[..split].to_string());
                        self.token_value = Some(element[split + 1..].into());
                    }
                }
            }
        }
    }
}

/// Builder for [`Session`] applying defaults and credential-shape validation.
#[derive(Default, derive_more::Debug)]
pub struct SessionBuilder {
    protocol: Option<Protocol>,
    hostname: Option<String>,
    port: Option<u16>,
    base_path: Option<String>,
    reject_unauthorized: Option<bool>,
    auth_type: Option<AuthType>,
    user: Option<String>,
    password: Option<SecretString>,
    base64_encoded_auth: Option<SecretString>,
    token_type: Option<String>,
    token_value: Option<SecretString>,
    cert: Option<PathBuf>,
    cert_key: Option<PathBuf>,
    socket_connect_timeout: Option<Duration>,
    request_completion_timeout: Option<Duration>,
    #[debug(ignore)]
    completion_timeout_callback: Option<CompletionTimeoutCallback>,
    store_cookie: bool,
}

impl SessionBuilder {
    /// Sets the wire protocol (default https).
    #[must_use]
    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = Some(protocol);
        self
    }

    /// Sets the target hostname (required).
    #[must_use]
    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// Sets the target port (defaults to 443/80 by protocol).
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the base path prefix (default empty).
    #[must_use]
    pub fn base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = Some(base_path.into());
        self
    }

    /// Sets certificate verification (default true).
    #[must_use]
    pub fn reject_unauthorized(mut self, reject: bool) -> Self {
        self.reject_unauthorized = Some(reject);
        self
    }

    /// Sets the authentication type (default none).
    #[must_use]
    pub fn auth_type(mut self, auth_type: AuthType) -> Self {
        self.auth_type = Some(auth_type);
        self
    }

    /// Sets the basic-auth user name.
    #[must_use]
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Sets the basic-auth password.
    #[must_use]
    pub fn password(mut self, password: impl Into<SecretString>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets pre-encoded base64 basic credentials.
    #[must_use]
    pub fn base64_encoded_auth(mut self, auth: impl Into<SecretString>) -> Self {
        self.base64_encoded_auth = Some(auth.into());
        self
    }

    /// Sets the cookie name used for token auth.
    #[must_use]
    pub fn token_type(mut self, token_type: impl Into<String>) -> Self {
        self.token_type = Some(token_type.into());
        self
    }

    /// Sets the token value for token or bearer auth.
    #[must_use]
    pub fn token_value(mut self, token_value: impl Into<SecretString>) -> Self {
        self.token_value = Some(token_value.into());
        self
    }

    /// Sets the PEM certificate file for cert auth.
    #[must_use]
    pub fn cert(mut self, cert: impl Into<PathBuf>) -> Self {
        self.cert = Some(cert.into());
        self
    }

    /// Sets the PEM key file for cert auth.
    #[must_use]
    pub fn cert_key(mut self, cert_key: impl Into<PathBuf>) -> Self {
        self.cert_key = Some(cert_key.into());
        self
    }

    /// Sets the socket connect timeout.
    #[must_use]
    pub fn socket_connect_timeout(mut self, timeout: Duration) -> Self {
        self.socket_connect_timeout = Some(timeout);
        self
    }

    /// Sets the request completion timeout.
    #[must_use]
    pub fn request_completion_timeout(mut self, timeout: Duration) -> Self {
        self.request_completion_timeout = Some(timeout);
        self
    }

    /// Sets the callback fired when the completion timeout is exceeded.
    #[must_use]
    pub fn completion_timeout_callback(mut self, callback: CompletionTimeoutCallback) -> Self {
        self.completion_timeout_callback = Some(callback);
        self
    }

    /// Stores cookies from responses regardless of auth type.
    #[must_use]
    pub fn store_cookie(mut self, store: bool) -> Self {
        self.store_cookie = store;
        self
    }

    /// Validates the credential shape and produces the session.
    ///
    /// # Errors
    ///
    /// Returns a [`SessionError`] when the hostname is missing or contains a
    /// protocol, or when the populated credentials do not match the auth type.
    pub fn build(self) -> Result<Session, SessionError> {
        let hostname = self.hostname.filter(|h| !h.trim().is_empty());
        let Some(hostname) = hostname else {
            return Err(SessionError::MissingHostname);
        };
        if hostname.contains("://") {
            return Err(SessionError::HostnameContainsProtocol);
        }

        let protocol = self.protocol.unwrap_or_default();
        let port = self.port.unwrap_or(match protocol {
            Protocol::Http => DEFAULT_HTTP_PORT,
            Protocol::Https => DEFAULT_HTTPS_PORT,
        });
        let auth_type = self.auth_type.unwrap_or_default();

        let mut session = Session {
            protocol,
            hostname,
            port,
            base_path: self.base_path.unwrap_or_default(),
            reject_unauthorized: self.reject_unauthorized.unwrap_or(true),
            auth_type,
            user: self.user,
            password: self.password,
            base64_encoded_auth: self.base64_encoded_auth,
            token_type: self.token_type,
            token_value: self.token_value,
            cert: self.cert,
            cert_key: self.cert_key,
            socket_connect_timeout: self.socket_connect_timeout,
            request_completion_timeout: self.request_completion_timeout,
            completion_timeout_callback: self.completion_timeout_callback,
            store_cookie: self.store_cookie,
        };

        match auth_type {
            AuthType::None => {}
            AuthType::Basic => {
                let has_pair = session.user.is_some() && session.password.is_some();
                if !has_pair && session.base64_encoded_auth.is_none() {
                    return Err(SessionError::MissingBasicCredentials);
                }
            }
            AuthType::Bearer => {
                if session.token_value.is_none() {
                    return Err(SessionError::MissingBearerToken);
                }
            }
            AuthType::Token => {
                if session.token_type.is_none() {
                    return Err(SessionError::MissingTokenType);
                }
                let has_pair = session.user.is_some() && session.password.is_some();
                if session.token_value.is_none()
                    && !has_pair
                    && session.base64_encoded_auth.is_none()
                {
                    return Err(SessionError::MissingTokenCredentials);
                }
            }
            AuthType::CertPem => {
                if session.cert.is_none() || session.cert_key.is_none() {
                    return Err(SessionError::MissingCertFiles);
                }
                if protocol == Protocol::Http {
                    return Err(SessionError::CertOverHttp);
                }
            }
        }

        // For basic and token sessions, keep the pair and encoded forms of the
        // credentials in sync so either can be consumed downstream.
        if matches!(auth_type, AuthType::Basic | AuthType::Token) {
            match (&session.user, &session.password, &session.base64_encoded_auth) {
                (Some(user), Some(password), None) => {
                    session.base64_encoded_auth =
                        Some(Session::base64_auth(user, password.as_str()).into());
                }
                (_, _, Some(auth)) => {
                    if session.user.is_none() {
                        session.user = Session::username_from_auth(auth.as_str());
                    }
                    if session.password.is_none() {
                        session.password = Session::password_from_auth(auth.as_str()).map(Into::into);
                    }
                }
                _ => {}
            }
        }

        Ok(session)
    }
}
