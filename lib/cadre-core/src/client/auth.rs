//! Authentication selection for outgoing requests.
//!
//! Exactly one mechanism is applied per request, in the fixed precedence
//! order token, basic, bearer, cert-pem. Token wins over basic so a session
//! holding both a cookie and fallback credentials keeps using the cookie.

use tracing::debug;

use crate::session::{AuthType, BASIC_PREFIX, BEARER_PREFIX, Session};

use super::error::RestClientError;

/// Credentials resolved from a session, ready to attach to a request.
#[derive(Default, derive_more::Debug)]
pub(crate) struct ResolvedAuth {
    /// Headers to set before caller headers are merged.
    pub headers: Vec<(&'static str, String)>,
    /// Client certificate identity for TLS.
    #[debug(ignore)]
    pub identity: Option<reqwest::Identity>,
}

/// Selects and materializes the session's credentials.
///
/// # Errors
///
/// Fails with [`RestClientError::PemRead`] when certificate files cannot be
/// read, and with [`RestClientError::NoCredentials`] when the session
/// requires authentication but no mechanism produced credentials.
pub(crate) fn resolve_auth(session: &Session) -> Result<ResolvedAuth, RestClientError> {
    let mut resolved = ResolvedAuth::default();
    if session.auth_type == AuthType::None {
        return Ok(resolved);
    }

    let credentials_set = set_token_auth(session, &mut resolved)
        || set_password_auth(session, &mut resolved)
        || set_bearer_auth(session, &mut resolved)
        || set_cert_pem_auth(session, &mut resolved)?;

    if !credentials_set {
        return Err(RestClientError::NoCredentials);
    }
    Ok(resolved)
}

fn set_token_auth(session: &Session, resolved: &mut ResolvedAuth) -> bool {
    if session.auth_type != AuthType::Token {
        return false;
    }
    let (Some(token_type), Some(token_value)) = (&session.token_type, &session.token_value)
    else {
        return false;
    };
    debug!("using cookie authentication with token type {token_type}");
    resolved
        .headers
        .push(("cookie", format!("{token_type}={}", token_value.as_str())));
    true
}

fn set_password_auth(session: &Session, resolved: &mut ResolvedAuth) -> bool {
    // Token sessions without a token fall back to basic credentials so the
    // first request can log in and obtain one.
    if !matches!(session.auth_type, AuthType::Basic | AuthType::Token) {
        return false;
    }
    let encoded = match &session.base64_encoded_auth {
        Some(auth) => auth.as_str().to_string(),
        None => match (&session.user, &session.password) {
            (Some(user), Some(password)) => Session::base64_auth(user, password.as_str()),
            _ => return false,
        },
    };
    debug!("using basic authentication");
    resolved
        .headers
        .push(("authorization", format!("{BASIC_PREFIX}{encoded}")));
    true
}

fn set_bearer_auth(session: &Session, resolved: &mut ResolvedAuth) -> bool {
    if session.auth_type != AuthType::Bearer {
        return false;
    }
    let Some(token_value) = &session.token_value else {
        return false;
    };
    debug!("using bearer authentication");
    resolved
        .headers
        .push(("authorization", format!("{BEARER_PREFIX}{}", token_value.as_str())));
    true
}

fn set_cert_pem_auth(
    session: &Session,
    resolved: &mut ResolvedAuth,
) -> Result<bool, RestClientError> {
    if session.auth_type != AuthType::CertPem {
        return Ok(false);
    }
    let (Some(cert), Some(cert_key)) = (&session.cert, &session.cert_key) else {
        return Ok(false);
    };
    debug!("using PEM certificate authentication");

    let mut pem = std::fs::read(cert).map_err(|err| RestClientError::PemRead {
        message: err.to_string(),
    })?;
    let key = std::fs::read(cert_key).map_err(|err| RestClientError::PemRead {
        message: err.to_string(),
    })?;
    pem.push(b'\n');
    pem.extend(key);

    let identity = reqwest::Identity::from_pem(&pem).map_err(|err| RestClientError::PemRead {
        message: err.to_string(),
    })?;
    resolved.identity = Some(identity);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::{check, let_assert};

    use crate::session::AuthType;

    fn header<'a>(resolved: &'a ResolvedAuth, name: &str) -> Option<&'a str> {
        resolved
            .headers
            .iter()
            .find(|(header, _)| *header == name)
            .map(|(_, value)| value.as_str())
    }

    #[test]
    fn test_none_session_sets_nothing() {
        let session = Session::builder().hostname("example.com").build().unwrap();
        let resolved = resolve_auth(&session).unwrap();
        check!(resolved.headers.is_empty());
        check!(resolved.identity.is_none());
    }

    #[test]
    fn test_basic_session_sets_authorization() {
        let session = Session::builder()
            .hostname("example.com")
            .auth_type(AuthType::Basic)
            .user("user")
            .password("pass")
            .build()
            .unwrap();

        let resolved = resolve_auth(&session).unwrap();
        check!(header(&resolved, "authorization") == Some("Basic dXNlcjpwYXNz"));
    }

    #[test]
    fn test_token_session_sets_cookie() {
        let session = Session::builder()
            .hostname("example.com")
            .auth_type(AuthType::Token)
            .token_type("LtpaToken2")
            .token_value("abc123")
            .build()
            .unwrap();

        let resolved = resolve_auth(&session).unwrap();
        check!(header(&resolved, "cookie") == Some("LtpaToken2=abc123"));
        check!(header(&resolved, "authorization").is_none());
    }

    #[test]
    fn test_token_session_without_token_falls_back_to_basic() {
        let session = Session::builder()
            .hostname("example.com")
            .auth_type(AuthType::Token)
            .token_type("LtpaToken2")
            .user("user")
            .password("pass")
            .build()
            .unwrap();

        let resolved = resolve_auth(&session).unwrap();
        check!(header(&resolved, "authorization") == Some("Basic dXNlcjpwYXNz"));
        check!(header(&resolved, "cookie").is_none());
    }

    #[test]
    fn test_bearer_session_sets_bearer_header() {
        let session = Session::builder()
            .hostname("example.com")
            .auth_type(AuthType::Bearer)
            .token_value("my-token")
            .build()
            .unwrap();

        let resolved = resolve_auth(&session).unwrap();
        check!(header(&resolved, "authorization") == Some("Bearer my-token"));
    }

    #[test]
    fn test_missing_cert_files_fail_before_transport() {
        let session = Session::builder()
            .hostname("example.com")
            .auth_type(AuthType::CertPem)
            .cert("/definitely/missing/cert.pem")
            .cert_key("/definitely/missing/key.pem")
            .build()
            .unwrap();

        let_assert!(Err(RestClientError::PemRead { .. }) = resolve_auth(&session));
    }

    #[test]
    fn test_stripped_credentials_yield_no_credentials_error() {
        let mut session = Session::builder()
            .hostname("example.com")
            .auth_type(AuthType::Basic)
            .user("user")
            .password("pass")
            .build()
            .unwrap();
        session.user = None;
        session.password = None;
        session.base64_encoded_auth = None;

        let_assert!(Err(RestClientError::NoCredentials) = resolve_auth(&session));
    }
}
