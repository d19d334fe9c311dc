use std::sync::Arc;

use async_trait::async_trait;
use http::StatusCode;
use serde_json::json;

use mercury_core::{Backend, Channel, ChannelType, HandlerError, HttpClient, Msg, StatusUpdate};
use security::SignatureError;

use crate::request::{Ack, ReceiveOutcome, WebhookRequest};

/// Webhook routes a handler can serve, declared during initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerRoute {
    Receive,
    Status,
}

impl HandlerRoute {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandlerRoute::Receive => "receive",
            HandlerRoute::Status => "status",
        }
    }
}

/// Server-level settings shared with every handler at initialization.
#[derive(Debug, Clone, Default)]
pub struct HandlerConfig {
    /// Default callback domain for channels without an override.
    pub domain: String,
    /// Server-wide switch suppressing non-failure delivery reports.
    pub ignore_delivery_reports: bool,
}

/// The per-provider adapter contract.
///
/// A handler variant may support receiving only, sending only, or both; the
/// routes it returns from [`ChannelHandler::initialize`] and the default
/// method bodies express which capabilities it implements. Handlers are
/// registered once at startup and shared immutably between request tasks.
#[async_trait]
pub trait ChannelHandler: Send + Sync {
    fn channel_type(&self) -> &ChannelType;

    fn name(&self) -> &str;

    /// Called once at registration time, before any traffic is accepted.
    /// Returns the webhook routes this handler serves.
    fn initialize(&mut self, config: &HandlerConfig) -> Result<Vec<HandlerRoute>, HandlerError>;

    /// Authenticates, decodes, and normalizes an inbound message webhook,
    /// handing canonical messages to the backend.
    async fn receive_message(
        &self,
        channel: Arc<Channel>,
        request: &WebhookRequest,
        backend: &dyn Backend,
    ) -> Result<ReceiveOutcome, HandlerError> {
        let _ = (channel, request, backend);
        Err(HandlerError::Unsupported)
    }

    /// Authenticates and decodes a delivery-status callback.
    async fn receive_status(
        &self,
        channel: Arc<Channel>,
        request: &WebhookRequest,
        backend: &dyn Backend,
    ) -> Result<ReceiveOutcome, HandlerError> {
        let _ = (channel, request, backend);
        Err(HandlerError::Unsupported)
    }

    /// Transmits an outgoing message, returning the correlated status update.
    /// Provider and transport failures are encoded in the update, not raised.
    async fn send_msg(
        &self,
        msg: &Msg,
        http: &dyn HttpClient,
        backend: &dyn Backend,
    ) -> Result<StatusUpdate, HandlerError> {
        let _ = (msg, http, backend);
        Err(HandlerError::Unsupported)
    }

    /// Acknowledgement for a request that was understood but deliberately not
    /// acted on. Adapters override this to match their provider's format.
    fn write_ignored(&self, details: &str) -> Ack {
        Ack::json(StatusCode::OK, json!({ "message": details }))
    }

    /// Acknowledgement for a rejected request. Providers still receive a
    /// syntactically valid document in the format they expect.
    fn write_error(&self, status: StatusCode, err: &HandlerError) -> Ack {
        Ack::json(status, json!({ "error": err.to_string() }))
    }
}

/// Maps a signature failure onto the handler taxonomy: configuration problems
/// stay configuration errors, everything else is an authentication failure.
pub fn signature_error(err: SignatureError) -> HandlerError {
    match err {
        SignatureError::Config => {
            HandlerError::configuration("invalid or missing auth token in channel config")
        }
        SignatureError::Missing => HandlerError::authentication("missing request signature"),
        SignatureError::Invalid => HandlerError::authentication("invalid request signature"),
    }
}
