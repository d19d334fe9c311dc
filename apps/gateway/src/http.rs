use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{OriginalUri, Path, State},
    http::{HeaderMap, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use metrics::counter;
use serde_json::json;
use tracing::{Instrument, warn};
use uuid::Uuid;

use mercury_core::{Backend, ChannelType, HandlerError};
use mercury_handlers::{Ack, HandlerRegistry, HandlerRoute, WebhookRequest};

#[derive(Clone)]
pub struct GatewayState {
    pub registry: Arc<HandlerRegistry>,
    pub backend: Arc<dyn Backend>,
    /// Host to assume when a request carries no Host header.
    pub default_domain: String,
}

pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route(
            "/c/{channel_type}/{channel_uuid}/receive",
            post(receive_message),
        )
        .route(
            "/c/{channel_type}/{channel_uuid}/status",
            post(receive_status),
        )
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn receive_message(
    State(state): State<GatewayState>,
    Path((channel_type, channel_uuid)): Path<(String, String)>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    dispatch(
        state,
        HandlerRoute::Receive,
        channel_type,
        channel_uuid,
        uri,
        headers,
        body,
    )
    .await
}

async fn receive_status(
    State(state): State<GatewayState>,
    Path((channel_type, channel_uuid)): Path<(String, String)>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    dispatch(
        state,
        HandlerRoute::Status,
        channel_type,
        channel_uuid,
        uri,
        headers,
        body,
    )
    .await
}

async fn dispatch(
    state: GatewayState,
    route: HandlerRoute,
    channel_type: String,
    channel_uuid: String,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let span = tracing::info_span!(
        "webhook",
        channel_type = %channel_type,
        channel_uuid = %channel_uuid,
        route = route.as_str()
    );
    async move {
        let channel_type = ChannelType::new(channel_type);
        let handler = match state.registry.lookup(&channel_type) {
            Ok(handler) => handler,
            Err(err) => return error_response(StatusCode::NOT_FOUND, err.to_string()),
        };
        if !state.registry.serves_route(&channel_type, route) {
            return error_response(
                StatusCode::NOT_FOUND,
                format!(
                    "channel type `{channel_type}` does not serve {}",
                    route.as_str()
                ),
            );
        }
        let uuid = match Uuid::parse_str(&channel_uuid) {
            Ok(uuid) => uuid,
            Err(err) => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    format!("invalid channel uuid: {err}"),
                );
            }
        };
        let channel = match state.backend.channel(&channel_type, &uuid).await {
            Ok(Some(channel)) => channel,
            Ok(None) => return error_response(StatusCode::NOT_FOUND, "channel not found".into()),
            Err(err) => {
                tracing::error!(error = %err, "channel lookup failed");
                return error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "backend unavailable".into(),
                );
            }
        };

        let host = headers
            .get(header::HOST)
            .and_then(|value| value.to_str().ok())
            .unwrap_or(state.default_domain.as_str())
            .to_string();
        let path_and_query = uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| uri.path().to_string());
        let request = WebhookRequest::new(Method::POST, host, path_and_query, headers, body);

        let result = match route {
            HandlerRoute::Receive => {
                handler
                    .receive_message(channel, &request, state.backend.as_ref())
                    .await
            }
            HandlerRoute::Status => {
                handler
                    .receive_status(channel, &request, state.backend.as_ref())
                    .await
            }
        };

        match result {
            Ok(outcome) => {
                let outcome_label = if outcome.events.is_empty() {
                    "ignored"
                } else {
                    "accepted"
                };
                counter!(
                    "gateway_webhooks_total",
                    "channel_type" => channel_type.to_string(),
                    "route" => route.as_str(),
                    "outcome" => outcome_label
                )
                .increment(1);
                ack_response(outcome.ack)
            }
            Err(err) => {
                let status = error_status(&err);
                warn!(error = %err, status = status.as_u16(), "webhook rejected");
                counter!(
                    "gateway_webhooks_total",
                    "channel_type" => channel_type.to_string(),
                    "route" => route.as_str(),
                    "outcome" => "rejected"
                )
                .increment(1);
                // still a syntactically valid document for the provider
                ack_response(handler.write_error(status, &err))
            }
        }
    }
    .instrument(span)
    .await
}

fn error_status(err: &HandlerError) -> StatusCode {
    match err {
        HandlerError::Authentication(_) => StatusCode::UNAUTHORIZED,
        HandlerError::Validation(_)
        | HandlerError::UrnValidation(_)
        | HandlerError::Configuration(_)
        | HandlerError::UnrecognizedStatus { .. } => StatusCode::BAD_REQUEST,
        HandlerError::MsgNotFound | HandlerError::Unsupported => StatusCode::NOT_FOUND,
        HandlerError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn ack_response(ack: Ack) -> Response {
    (
        ack.status,
        [(header::CONTENT_TYPE, ack.content_type)],
        ack.body,
    )
        .into_response()
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
