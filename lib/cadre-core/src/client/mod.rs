//! REST client surface: the per-request engine and a verb façade over it.

use http::Method;
use serde::de::DeserializeOwned;

use crate::session::Session;

mod auth;
mod compression;
mod engine;
mod error;
mod newline;
mod options;
mod proxy;

pub use self::compression::{ContentEncoding, StreamDecoder, decompress_buffer};
pub use self::engine::RestEngine;
pub use self::error::{
    DecompressError, ErrorProcessor, ErrorSource, RestClientError, RestFailure,
};
pub use self::options::{
    ProgressTask, RequestStream, ResponseStream, RestRequest, WriteData,
};
pub use self::proxy::ProxySettings;

/// Members of the engine state a full-response call may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientProperty {
    /// The verb and resource of the request.
    Request,
    /// The HTTP status of the response.
    Response,
    /// The raw response body.
    Data,
    /// The response body as text.
    DataString,
    /// Whether the request completed with a 2xx status.
    RequestSuccess,
    /// Whether the request completed with a non-2xx status.
    RequestFailure,
}

impl ClientProperty {
    /// All properties, the default selection.
    pub const ALL: &'static [Self] = &[
        Self::Request,
        Self::Response,
        Self::Data,
        Self::DataString,
        Self::RequestSuccess,
        Self::RequestFailure,
    ];
}

/// Selected members of the engine state after a successful exchange.
#[derive(Debug, Clone, Default)]
pub struct FullResponse {
    /// `<VERB> <resource>` of the request.
    pub request: Option<String>,
    /// HTTP status of the response.
    pub status: Option<http::StatusCode>,
    /// Raw (decompressed) response body.
    pub data: Option<Vec<u8>>,
    /// Response body as text.
    pub data_string: Option<String>,
    /// Whether the request completed with a 2xx status.
    pub request_success: Option<bool>,
    /// Whether the request completed with a non-2xx status.
    pub request_failure: Option<bool>,
}

/// Options for the `*_expect_full_response` calls.
#[derive(derive_more::Debug, Default)]
pub struct FullResponseOptions {
    /// Resource URI.
    pub resource: String,
    /// Request headers.
    pub headers: Vec<(String, String)>,
    /// Buffered request payload.
    pub write_data: Option<WriteData>,
    /// Members to return; `None` selects all of them.
    pub properties: Option<Vec<ClientProperty>>,
}

/// Verb façade over [`RestEngine`].
///
/// Every call creates a fresh engine over the borrowed session, performs one
/// request and shapes the result. The session may be mutated by the exchange
/// (token refresh from cookies).
#[derive(Debug)]
pub struct RestClient;

/// Whether a query string carries content, judged by its final character.
pub fn has_query_string(query: &str) -> bool {
    !query.ends_with('?')
}

impl RestClient {
    /// GET returning the response body as text.
    ///
    /// # Errors
    ///
    /// Fails as [`RestEngine::request`] does.
    pub async fn get_expect_string(
        session: &mut Session,
        resource: &str,
        headers: Vec<(String, String)>,
    ) -> Result<String, RestClientError> {
        Self::perform(session, RestRequest::new(Method::GET, resource).with_headers(headers)).await
    }

    /// PUT returning the response body as text.
    ///
    /// # Errors
    ///
    /// Fails as [`RestEngine::request`] does.
    pub async fn put_expect_string(
        session: &mut Session,
        resource: &str,
        headers: Vec<(String, String)>,
        data: WriteData,
    ) -> Result<String, RestClientError> {
        Self::perform(
            session,
            RestRequest::new(Method::PUT, resource)
                .with_headers(headers)
                .with_write_data(data),
        )
        .await
    }

    /// POST returning the response body as text.
    ///
    /// # Errors
    ///
    /// Fails as [`RestEngine::request`] does.
    pub async fn post_expect_string(
        session: &mut Session,
        resource: &str,
        headers: Vec<(String, String)>,
        data: Option<WriteData>,
    ) -> Result<String, RestClientError> {
        let mut request = RestRequest::new(Method::POST, resource).with_headers(headers);
        if let Some(data) = data {
            request = request.with_write_data(data);
        }
        Self::perform(session, request).await
    }

    /// DELETE returning the response body as text.
    ///
    /// # Errors
    ///
    /// Fails as [`RestEngine::request`] does.
    pub async fn delete_expect_string(
        session: &mut Session,
        resource: &str,
        headers: Vec<(String, String)>,
    ) -> Result<String, RestClientError> {
        Self::perform(
            session,
            RestRequest::new(Method::DELETE, resource).with_headers(headers),
        )
        .await
    }

    /// GET parsing the response body as JSON.
    ///
    /// # Errors
    ///
    /// Fails as [`RestEngine::request`] does, or with a contextual
    /// [`RestClientError::JsonParse`] when the body is not the expected shape.
    pub async fn get_expect_json<T: DeserializeOwned>(
        session: &mut Session,
        resource: &str,
        headers: Vec<(String, String)>,
    ) -> Result<T, RestClientError> {
        let body = Self::get_expect_string(session, resource, headers).await?;
        parse_json(&body, Method::GET)
    }

    /// PUT parsing the response body as JSON.
    ///
    /// # Errors
    ///
    /// Fails as [`RestClient::get_expect_json`] does.
    pub async fn put_expect_json<T: DeserializeOwned>(
        session: &mut Session,
        resource: &str,
        headers: Vec<(String, String)>,
        data: WriteData,
    ) -> Result<T, RestClientError> {
        let body = Self::put_expect_string(session, resource, headers, data).await?;
        parse_json(&body, Method::PUT)
    }

    /// POST parsing the response body as JSON.
    ///
    /// # Errors
    ///
    /// Fails as [`RestClient::get_expect_json`] does.
    pub async fn post_expect_json<T: DeserializeOwned>(
        session: &mut Session,
        resource: &str,
        headers: Vec<(String, String)>,
        data: Option<WriteData>,
    ) -> Result<T, RestClientError> {
        let body = Self::post_expect_string(session, resource, headers, data).await?;
        parse_json(&body, Method::POST)
    }

    /// DELETE parsing the response body as JSON.
    ///
    /// # Errors
    ///
    /// Fails as [`RestClient::get_expect_json`] does.
    pub async fn delete_expect_json<T: DeserializeOwned>(
        session: &mut Session,
        resource: &str,
        headers: Vec<(String, String)>,
    ) -> Result<T, RestClientError> {
        let body = Self::delete_expect_string(session, resource, headers).await?;
        parse_json(&body, Method::DELETE)
    }

    /// GET returning the raw (decompressed) response body.
    ///
    /// # Errors
    ///
    /// Fails as [`RestEngine::request`] does.
    pub async fn get_expect_buffer(
        session: &mut Session,
        resource: &str,
        headers: Vec<(String, String)>,
    ) -> Result<Vec<u8>, RestClientError> {
        let mut engine = RestEngine::new(session);
        engine
            .request(RestRequest::new(Method::GET, resource).with_headers(headers))
            .await?;
        Ok(engine.data().to_vec())
    }

    /// PUT returning the raw (decompressed) response body.
    ///
    /// # Errors
    ///
    /// Fails as [`RestEngine::request`] does.
    pub async fn put_expect_buffer(
        session: &mut Session,
        resource: &str,
        headers: Vec<(String, String)>,
        data: WriteData,
    ) -> Result<Vec<u8>, RestClientError> {
        let mut engine = RestEngine::new(session);
        engine
            .request(
                RestRequest::new(Method::PUT, resource)
                    .with_headers(headers)
                    .with_write_data(data),
            )
            .await?;
        Ok(engine.data().to_vec())
    }

    /// POST returning the raw (decompressed) response body.
    ///
    /// # Errors
    ///
    /// Fails as [`RestEngine::request`] does.
    pub async fn post_expect_buffer(
        session: &mut Session,
        resource: &str,
        headers: Vec<(String, String)>,
        data: Option<WriteData>,
    ) -> Result<Vec<u8>, RestClientError> {
        let mut request = RestRequest::new(Method::POST, resource).with_headers(headers);
        if let Some(data) = data {
            request = request.with_write_data(data);
        }
        let mut engine = RestEngine::new(session);
        engine.request(request).await?;
        Ok(engine.data().to_vec())
    }

    /// DELETE returning the raw (decompressed) response body.
    ///
    /// # Errors
    ///
    /// Fails as [`RestEngine::request`] does.
    pub async fn delete_expect_buffer(
        session: &mut Session,
        resource: &str,
        headers: Vec<(String, String)>,
    ) -> Result<Vec<u8>, RestClientError> {
        let mut engine = RestEngine::new(session);
        engine
            .request(RestRequest::new(Method::DELETE, resource).with_headers(headers))
            .await?;
        Ok(engine.data().to_vec())
    }

    /// GET writing the response body to a stream.
    ///
    /// # Errors
    ///
    /// Fails as [`RestEngine::request`] does.
    pub async fn get_streamed(
        session: &mut Session,
        resource: &str,
        headers: Vec<(String, String)>,
        response_stream: ResponseStream,
        normalize_response_new_lines: bool,
        progress_task: Option<ProgressTask>,
    ) -> Result<(), RestClientError> {
        let mut request = RestRequest::new(Method::GET, resource)
            .with_headers(headers)
            .with_response_stream(response_stream)
            .normalize_response_new_lines(normalize_response_new_lines);
        if let Some(task) = progress_task {
            request = request.with_progress_task(task);
        }
        Self::perform(session, request).await.map(|_| ())
    }

    /// DELETE writing the response body to a stream.
    ///
    /// # Errors
    ///
    /// Fails as [`RestEngine::request`] does.
    pub async fn delete_streamed(
        session: &mut Session,
        resource: &str,
        headers: Vec<(String, String)>,
        response_stream: ResponseStream,
        normalize_response_new_lines: bool,
        progress_task: Option<ProgressTask>,
    ) -> Result<(), RestClientError> {
        let mut request = RestRequest::new(Method::DELETE, resource)
            .with_headers(headers)
            .with_response_stream(response_stream)
            .normalize_response_new_lines(normalize_response_new_lines);
        if let Some(task) = progress_task {
            request = request.with_progress_task(task);
        }
        Self::perform(session, request).await.map(|_| ())
    }

    /// PUT streaming the request body and writing the response to a stream.
    ///
    /// # Errors
    ///
    /// Fails as [`RestEngine::request`] does.
    #[allow(clippy::too_many_arguments)]
    pub async fn put_streamed(
        session: &mut Session,
        resource: &str,
        headers: Vec<(String, String)>,
        response_stream: ResponseStream,
        request_stream: RequestStream,
        normalize_response_new_lines: bool,
        normalize_request_new_lines: bool,
        progress_task: Option<ProgressTask>,
    ) -> Result<(), RestClientError> {
        let mut request = RestRequest::new(Method::PUT, resource)
            .with_headers(headers)
            .with_response_stream(response_stream)
            .with_request_stream(request_stream)
            .normalize_response_new_lines(normalize_response_new_lines)
            .normalize_request_new_lines(normalize_request_new_lines);
        if let Some(task) = progress_task {
            request = request.with_progress_task(task);
        }
        Self::perform(session, request).await.map(|_| ())
    }

    /// POST streaming the request body and writing the response to a stream.
    ///
    /// # Errors
    ///
    /// Fails as [`RestEngine::request`] does.
    #[allow(clippy::too_many_arguments)]
    pub async fn post_streamed(
        session: &mut Session,
        resource: &str,
        headers: Vec<(String, String)>,
        response_stream: ResponseStream,
        request_stream: RequestStream,
        normalize_response_new_lines: bool,
        normalize_request_new_lines: bool,
        progress_task: Option<ProgressTask>,
    ) -> Result<(), RestClientError> {
        let mut request = RestRequest::new(Method::POST, resource)
            .with_headers(headers)
            .with_response_stream(response_stream)
            .with_request_stream(request_stream)
            .normalize_response_new_lines(normalize_response_new_lines)
            .normalize_request_new_lines(normalize_request_new_lines);
        if let Some(task) = progress_task {
            request = request.with_progress_task(task);
        }
        Self::perform(session, request).await.map(|_| ())
    }

    /// PUT streaming the request body, returning the response as text.
    ///
    /// # Errors
    ///
    /// Fails as [`RestEngine::request`] does.
    pub async fn put_streamed_request_only(
        session: &mut Session,
        resource: &str,
        headers: Vec<(String, String)>,
        request_stream: RequestStream,
        normalize_request_new_lines: bool,
        progress_task: Option<ProgressTask>,
    ) -> Result<String, RestClientError> {
        let mut request = RestRequest::new(Method::PUT, resource)
            .with_headers(headers)
            .with_request_stream(request_stream)
            .normalize_request_new_lines(normalize_request_new_lines);
        if let Some(task) = progress_task {
            request = request.with_progress_task(task);
        }
        Self::perform(session, request).await
    }

    /// POST streaming the request body, returning the response as text.
    ///
    /// # Errors
    ///
    /// Fails as [`RestEngine::request`] does.
    pub async fn post_streamed_request_only(
        session: &mut Session,
        resource: &str,
        headers: Vec<(String, String)>,
        request_stream: RequestStream,
        normalize_request_new_lines: bool,
        progress_task: Option<ProgressTask>,
    ) -> Result<String, RestClientError> {
        let mut request = RestRequest::new(Method::POST, resource)
            .with_headers(headers)
            .with_request_stream(request_stream)
            .normalize_request_new_lines(normalize_request_new_lines);
        if let Some(task) = progress_task {
            request = request.with_progress_task(task);
        }
        Self::perform(session, request).await
    }

    /// GET returning selected members of the engine state.
    ///
    /// # Errors
    ///
    /// Fails as [`RestEngine::request`] does.
    pub async fn get_expect_full_response(
        session: &mut Session,
        options: FullResponseOptions,
    ) -> Result<FullResponse, RestClientError> {
        Self::full_response(session, Method::GET, options).await
    }

    /// PUT returning selected members of the engine state.
    ///
    /// # Errors
    ///
    /// Fails as [`RestEngine::request`] does.
    pub async fn put_expect_full_response(
        session: &mut Session,
        options: FullResponseOptions,
    ) -> Result<FullResponse, RestClientError> {
        Self::full_response(session, Method::PUT, options).await
    }

    /// POST returning selected members of the engine state.
    ///
    /// # Errors
    ///
    /// Fails as [`RestEngine::request`] does.
    pub async fn post_expect_full_response(
        session: &mut Session,
        options: FullResponseOptions,
    ) -> Result<FullResponse, RestClientError> {
        Self::full_response(session, Method::POST, options).await
    }

    /// DELETE returning selected members of the engine state.
    ///
    /// # Errors
    ///
    /// Fails as [`RestEngine::request`] does.
    pub async fn delete_expect_full_response(
        session: &mut Session,
        options: FullResponseOptions,
    ) -> Result<FullResponse, RestClientError> {
        Self::full_response(session, Method::DELETE, options).await
    }

    async fn full_response(
        session: &mut Session,
        method: Method,
        options: FullResponseOptions,
    ) -> Result<FullResponse, RestClientError> {
        let mut request =
            RestRequest::new(method.clone(), options.resource.clone()).with_headers(options.headers);
        if let Some(data) = options.write_data {
            request = request.with_write_data(data);
        }
        let mut engine = RestEngine::new(session);
        engine.request(request).await?;

        let properties = options
            .properties
            .as_deref()
            .unwrap_or(ClientProperty::ALL);
        Ok(extract_expected_data(
            &engine,
            &method,
            &options.resource,
            properties,
        ))
    }

    async fn perform(
        session: &mut Session,
        request: RestRequest,
    ) -> Result<String, RestClientError> {
        let mut engine = RestEngine::new(session);
        engine.request(request).await
    }
}

/// Reads the requested members off a live engine.
pub fn extract_expected_data(
    engine: &RestEngine<'_>,
    method: &Method,
    resource: &str,
    properties: &[ClientProperty],
) -> FullResponse {
    let mut response = FullResponse::default();
    for property in properties {
        match property {
            ClientProperty::Request => {
                response.request = Some(format!("{method} {resource}"));
            }
            ClientProperty::Response => response.status = engine.status(),
            ClientProperty::Data => response.data = Some(engine.data().to_vec()),
            ClientProperty::DataString => response.data_string = Some(engine.data_string()),
            ClientProperty::RequestSuccess => {
                response.request_success = Some(engine.request_succeeded());
            }
            ClientProperty::RequestFailure => {
                response.request_failure = Some(!engine.request_succeeded());
            }
        }
    }
    response
}

fn parse_json<T: DeserializeOwned>(body: &str, method: Method) -> Result<T, RestClientError> {
    serde_json::from_str(body).map_err(|error| RestClientError::JsonParse {
        context: format!(
            "The {method} request appeared to succeed, but the response was not in the expected format"
        ),
        error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::{check, let_assert};

    #[test]
    fn test_has_query_string() {
        check!(has_query_string("/api/items?name=value"));
        check!(has_query_string("/api/items"));
        check!(!has_query_string("/api/items?"));
    }

    #[test]
    fn test_parse_json_carries_verb_context() {
        let result: Result<serde_json::Value, _> = parse_json("not json", Method::GET);
        let_assert!(Err(RestClientError::JsonParse { context, .. }) = result);
        check!(context.contains("The GET request appeared to succeed"));
    }

    #[test]
    fn test_extract_expected_data_selects_requested_members() {
        let mut session = crate::session::Session::builder()
            .hostname("example.com")
            .build()
            .unwrap();
        let engine = RestEngine::new(&mut session);

        let response = extract_expected_data(
            &engine,
            &Method::GET,
            "/api/items",
            &[ClientProperty::Request, ClientProperty::RequestFailure],
        );
        check!(response.request.as_deref() == Some("GET /api/items"));
        check!(response.request_failure == Some(true));
        check!(response.status.is_none());
        check!(response.data.is_none());
    }
}
