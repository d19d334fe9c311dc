//! Mercury gateway binary: registers the channel handlers, starts the send
//! worker pool, and serves the per-channel webhook routes.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use mercury_backend_memory::MemBackend;
use mercury_core::{Backend, Channel, ReqwestClient};
use mercury_gateway::config::GatewayConfig;
use mercury_gateway::http::{GatewayState, build_router};
use mercury_gateway::worker::spawn_send_workers;
use mercury_handlers::HandlerRegistry;
use mercury_handlers::twilio::TwilioHandler;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = GatewayConfig::from_env()?;

    let mem = Arc::new(MemBackend::new());
    if let Ok(path) = std::env::var("CHANNELS_FILE") {
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("read channels file {path}"))?;
        let channels: Vec<Channel> =
            serde_json::from_str(&raw).with_context(|| format!("parse channels file {path}"))?;
        for channel in channels {
            mem.add_channel(channel).await;
        }
    }
    let backend: Arc<dyn Backend> = mem;

    // registration happens before any traffic; the registry is read-only after
    let handler_config = config.handler_config();
    let mut registry = HandlerRegistry::new();
    registry.register(Box::new(TwilioHandler::sms()), &handler_config)?;
    registry.register(Box::new(TwilioHandler::messaging_service()), &handler_config)?;
    registry.register(Box::new(TwilioHandler::twiml_api()), &handler_config)?;
    let registry = Arc::new(registry);

    let http = Arc::new(ReqwestClient::new(config.send_timeout)?);
    spawn_send_workers(
        &config.worker_config(),
        Arc::clone(&registry),
        Arc::clone(&backend),
        http,
    );

    let state = GatewayState {
        registry,
        backend,
        default_domain: config.domain.clone(),
    };
    let app = build_router(state);

    tracing::info!("mercury-gateway listening on {}", config.addr);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}
