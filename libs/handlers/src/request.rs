use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use security::FormParams;
use url::form_urlencoded;

use mercury_core::{MsgId, MsgStatus, MsgUuid};

/// One provider webhook call, as handed to a channel handler by the dispatch
/// layer. Carries the raw body so adapters can verify signatures over the
/// exact bytes the provider signed.
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    method: Method,
    host: String,
    path_and_query: String,
    headers: HeaderMap,
    body: Bytes,
}

impl WebhookRequest {
    pub fn new(
        method: Method,
        host: impl Into<String>,
        path_and_query: impl Into<String>,
        headers: HeaderMap,
        body: Bytes,
    ) -> Self {
        Self {
            method,
            host: host.into(),
            path_and_query: path_and_query.into(),
            headers,
            body,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Decodes the form-encoded body into parameters, preserving value order
    /// per key.
    pub fn form(&self) -> FormParams {
        let mut params = FormParams::new();
        for (key, value) in form_urlencoded::parse(&self.body) {
            params
                .entry(key.into_owned())
                .or_default()
                .push(value.into_owned());
        }
        params
    }

    /// First value of a query-string parameter, decoded.
    pub fn query_param(&self, name: &str) -> Option<String> {
        let (_, query) = self.path_and_query.split_once('?')?;
        form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    /// The externally visible request URL. Providers sign against the https
    /// form of the callback they were configured with.
    pub fn url(&self) -> String {
        format!("https://{}{}", self.host, self.path_and_query)
    }

    /// The request URL with the path substituted from a trusted reverse-proxy
    /// header, when present.
    pub fn url_with_path_override(&self, header: &str) -> String {
        match self.header(header) {
            Some(path) if !path.is_empty() => format!("https://{}{}", self.host, path),
            _ => self.url(),
        }
    }
}

/// Acknowledgement returned to the provider. The format is dictated by each
/// provider's expectations, not a shared schema.
#[derive(Debug, Clone)]
pub struct Ack {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub body: String,
}

impl Ack {
    pub fn json(status: StatusCode, body: serde_json::Value) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: body.to_string(),
        }
    }
}

/// What an inbound webhook produced.
#[derive(Debug, Clone)]
pub enum ReceiveEvent {
    Msg {
        id: MsgId,
        uuid: MsgUuid,
    },
    Status {
        msg_id: MsgId,
        external_id: Option<String>,
        status: MsgStatus,
    },
}

/// Result of a successfully handled webhook: zero or more events plus the
/// provider-appropriate acknowledgement. An ignored request carries no
/// events but still acks, so providers don't retry non-erroneous deliveries.
#[derive(Debug)]
pub struct ReceiveOutcome {
    pub events: Vec<ReceiveEvent>,
    pub ack: Ack,
}

impl ReceiveOutcome {
    pub fn events(events: Vec<ReceiveEvent>, ack: Ack) -> Self {
        Self { events, ack }
    }

    pub fn ignored(ack: Ack) -> Self {
        Self {
            events: Vec::new(),
            ack,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn request(body: &'static str) -> WebhookRequest {
        let mut headers = HeaderMap::new();
        headers.insert("X-Forwarded-Path", HeaderValue::from_static("/proxied?x=1"));
        WebhookRequest::new(
            Method::POST,
            "gw.example.com",
            "/c/t/abc/status?id=42&action=callback",
            headers,
            Bytes::from_static(body.as_bytes()),
        )
    }

    #[test]
    fn form_preserves_value_order_per_key() {
        let req = request("MediaUrl0=a&Body=hello+world&MediaUrl0=b");
        let form = req.form();
        assert_eq!(form["MediaUrl0"], vec!["a", "b"]);
        assert_eq!(form["Body"], vec!["hello world"]);
    }

    #[test]
    fn query_params_decode() {
        let req = request("");
        assert_eq!(req.query_param("id").as_deref(), Some("42"));
        assert_eq!(req.query_param("action").as_deref(), Some("callback"));
        assert_eq!(req.query_param("missing"), None);
    }

    #[test]
    fn url_uses_forwarded_path_when_present() {
        let req = request("");
        assert_eq!(
            req.url(),
            "https://gw.example.com/c/t/abc/status?id=42&action=callback"
        );
        assert_eq!(
            req.url_with_path_override("X-Forwarded-Path"),
            "https://gw.example.com/proxied?x=1"
        );
        assert_eq!(req.url_with_path_override("X-Other"), req.url());
    }
}
