use std::fmt;
use std::time::Duration;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::channel::Channel;
use crate::http::Exchange;
use crate::ids::MsgId;

/// Audit record of one HTTP exchange with a provider, attached to the status
/// update it produced. Write-once per attempt: after hand-off the only
/// permitted mutation path is [`ChannelLog::with_error`], which consumes the
/// log before it is sealed.
#[derive(Debug, Clone)]
pub struct ChannelLog {
    description: String,
    channel_uuid: Uuid,
    msg_id: MsgId,
    method: String,
    url: String,
    request: String,
    status_code: Option<u16>,
    response: String,
    elapsed: Duration,
    created_on: OffsetDateTime,
    error: Option<String>,
}

impl ChannelLog {
    /// Creates a log with no recorded exchange, for failures that happen
    /// before any request is built.
    pub fn new(description: impl Into<String>, channel: &Channel, msg_id: MsgId) -> Self {
        Self {
            description: description.into(),
            channel_uuid: *channel.uuid(),
            msg_id,
            method: String::new(),
            url: String::new(),
            request: String::new(),
            status_code: None,
            response: String::new(),
            elapsed: Duration::ZERO,
            created_on: OffsetDateTime::now_utc(),
            error: None,
        }
    }

    /// Creates a log from a recorded provider exchange, carrying over any
    /// transport error it captured.
    pub fn from_exchange(
        description: impl Into<String>,
        channel: &Channel,
        msg_id: MsgId,
        exchange: &Exchange,
    ) -> Self {
        Self {
            description: description.into(),
            channel_uuid: *channel.uuid(),
            msg_id,
            method: exchange.method.clone(),
            url: exchange.url.clone(),
            request: exchange.request_body.clone(),
            status_code: exchange.response.as_ref().map(|r| r.status.as_u16()),
            response: exchange
                .response
                .as_ref()
                .map(|r| r.body_text())
                .unwrap_or_default(),
            elapsed: exchange.elapsed,
            created_on: OffsetDateTime::now_utc(),
            error: exchange.error.clone(),
        }
    }

    /// Returns the log with an error annotation appended.
    pub fn with_error(mut self, label: &str, err: impl fmt::Display) -> Self {
        self.error = Some(format!("{label}: {err}"));
        self
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn channel_uuid(&self) -> &Uuid {
        &self.channel_uuid
    }

    pub fn msg_id(&self) -> MsgId {
        self.msg_id
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn request(&self) -> &str {
        &self.request
    }

    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    pub fn response(&self) -> &str {
        &self.response
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn created_on(&self) -> OffsetDateTime {
        self.created_on
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}
