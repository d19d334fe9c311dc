use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Request, StatusCode};
use thiserror::Error;

/// Network-level failure: the provider never produced a parseable response.
#[derive(Debug, Error)]
#[error("transport error: {message}")]
pub struct TransportError {
    message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        Self::new(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RawResponse {
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

pub type RawRequest = Request<Bytes>;

#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, request: RawRequest) -> Result<RawResponse, TransportError>;
}

/// Record of one provider HTTP attempt, kept for channel logs regardless of
/// whether a response ever arrived.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub method: String,
    pub url: String,
    pub request_body: String,
    pub response: Option<RawResponse>,
    pub error: Option<String>,
    pub elapsed: Duration,
}

/// Executes `request` and captures the attempt as an [`Exchange`].
pub async fn execute_recorded(client: &dyn HttpClient, request: RawRequest) -> Exchange {
    let method = request.method().to_string();
    let url = request.uri().to_string();
    let request_body = String::from_utf8_lossy(request.body()).into_owned();
    let started = Instant::now();
    let result = client.execute(request).await;
    let elapsed = started.elapsed();
    match result {
        Ok(response) => Exchange {
            method,
            url,
            request_body,
            response: Some(response),
            error: None,
            elapsed,
        },
        Err(err) => Exchange {
            method,
            url,
            request_body,
            response: None,
            error: Some(err.to_string()),
            elapsed,
        },
    }
}

/// [`HttpClient`] backed by a shared reqwest client with a per-request
/// timeout.
pub struct ReqwestClient {
    inner: reqwest::Client,
}

impl ReqwestClient {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let inner = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { inner })
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn execute(&self, request: RawRequest) -> Result<RawResponse, TransportError> {
        let request = reqwest::Request::try_from(request.map(reqwest::Body::from))?;
        let response = self.inner.execute(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Canned(StatusCode, &'static str);

    #[async_trait]
    impl HttpClient for Canned {
        async fn execute(&self, _request: RawRequest) -> Result<RawResponse, TransportError> {
            Ok(RawResponse {
                status: self.0,
                headers: HeaderMap::new(),
                body: Bytes::from_static(self.1.as_bytes()),
            })
        }
    }

    struct Down;

    #[async_trait]
    impl HttpClient for Down {
        async fn execute(&self, _request: RawRequest) -> Result<RawResponse, TransportError> {
            Err(TransportError::new("connection refused"))
        }
    }

    fn request() -> RawRequest {
        Request::builder()
            .method("POST")
            .uri("https://api.example.com/send")
            .body(Bytes::from_static(b"To=123"))
            .unwrap()
    }

    #[tokio::test]
    async fn exchange_captures_response() {
        let exchange =
            execute_recorded(&Canned(StatusCode::OK, r#"{"sid":"SM1"}"#), request()).await;
        assert_eq!(exchange.method, "POST");
        assert_eq!(exchange.url, "https://api.example.com/send");
        assert_eq!(exchange.request_body, "To=123");
        assert_eq!(exchange.response.unwrap().body_text(), r#"{"sid":"SM1"}"#);
        assert!(exchange.error.is_none());
    }

    #[tokio::test]
    async fn exchange_captures_transport_error() {
        let exchange = execute_recorded(&Down, request()).await;
        assert!(exchange.response.is_none());
        assert_eq!(
            exchange.error.as_deref(),
            Some("transport error: connection refused")
        );
    }
}
