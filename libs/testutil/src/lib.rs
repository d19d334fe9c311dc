//! Test utilities shared by adapter and gateway tests: a scripted HTTP client
//! and channel fixtures matching the shapes providers configure in practice.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use uuid::Uuid;

use mercury_core::{
    CONFIG_ACCOUNT_SID, CONFIG_AUTH_TOKEN, Channel, ChannelType, HttpClient, RawRequest,
    RawResponse, TransportError, UrnScheme,
};

/// One request the [`MockHttpClient`] saw, for assertions.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub url: String,
    pub headers: HeaderMap,
    pub body: String,
}

impl RecordedRequest {
    /// Decodes the form-encoded body into (key, value) pairs.
    pub fn form_pairs(&self) -> Vec<(String, String)> {
        url::form_urlencoded::parse(self.body.as_bytes())
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect()
    }

    /// First decoded form value for `key`.
    pub fn form_value(&self, key: &str) -> Option<String> {
        self.form_pairs()
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }
}

/// [`HttpClient`] with scripted responses, recording every request it is
/// handed. Responses are served in FIFO order; running out of script is a
/// transport error so tests fail loudly.
#[derive(Default)]
pub struct MockHttpClient {
    responses: Mutex<VecDeque<Result<RawResponse, String>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, status: u16, body: &str) {
        let response = RawResponse {
            status: StatusCode::from_u16(status).expect("valid status code"),
            headers: HeaderMap::new(),
            body: Bytes::copy_from_slice(body.as_bytes()),
        };
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    pub fn enqueue_transport_error(&self, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn execute(&self, request: RawRequest) -> Result<RawResponse, TransportError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            method: request.method().to_string(),
            url: request.uri().to_string(),
            headers: request.headers().clone(),
            body: String::from_utf8_lossy(request.body()).into_owned(),
        });
        match self.responses.lock().unwrap().pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(TransportError::new(message)),
            None => Err(TransportError::new("no scripted response")),
        }
    }
}

/// Fixed uuid so callback URLs are stable across test runs.
pub const TEST_CHANNEL_UUID: &str = "8eb23e93-5ecb-45ba-b726-3b064e0c56ab";

/// An SMS channel configured the way a Twilio tenant would be.
pub fn twilio_channel() -> Channel {
    Channel::new(
        ChannelType::new("T"),
        Uuid::parse_str(TEST_CHANNEL_UUID).expect("valid uuid"),
        "Twilio Test",
        "+12065551212",
    )
    .with_country("US")
    .with_config(CONFIG_AUTH_TOKEN, "6789")
    .with_config(CONFIG_ACCOUNT_SID, "ACtest1234")
    .with_callback_domain("gw.example.com")
}

/// A Twilio channel carrying WhatsApp traffic.
pub fn twilio_whatsapp_channel() -> Channel {
    Channel::new(
        ChannelType::new("T"),
        Uuid::parse_str(TEST_CHANNEL_UUID).expect("valid uuid"),
        "Twilio WhatsApp Test",
        "+14155238886",
    )
    .with_schemes(vec![UrnScheme::WhatsApp])
    .with_config(CONFIG_AUTH_TOKEN, "6789")
    .with_config(CONFIG_ACCOUNT_SID, "ACtest1234")
    .with_callback_domain("gw.example.com")
}
