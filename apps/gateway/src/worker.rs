use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::task::JoinHandle;
use tracing::{Instrument, error, info_span, warn};

use mercury_core::{Backend, HttpClient, Msg, MsgStatus, StatusUpdate};
use mercury_handlers::HandlerRegistry;

#[derive(Debug, Clone)]
pub struct SendWorkerConfig {
    pub workers: usize,
    pub send_timeout: Duration,
    pub poll_interval: Duration,
}

/// Spawns the outbound worker pool. Each worker drains the backend's
/// outgoing queue independently; in-flight sends are bounded only by the
/// pool size.
pub fn spawn_send_workers(
    config: &SendWorkerConfig,
    registry: Arc<HandlerRegistry>,
    backend: Arc<dyn Backend>,
    http: Arc<dyn HttpClient>,
) -> Vec<JoinHandle<()>> {
    (0..config.workers)
        .map(|worker| {
            let config = config.clone();
            let registry = Arc::clone(&registry);
            let backend = Arc::clone(&backend);
            let http = Arc::clone(&http);
            tokio::spawn(async move {
                send_loop(worker, config, registry, backend, http).await;
            })
        })
        .collect()
}

async fn send_loop(
    worker: usize,
    config: SendWorkerConfig,
    registry: Arc<HandlerRegistry>,
    backend: Arc<dyn Backend>,
    http: Arc<dyn HttpClient>,
) {
    loop {
        match backend.pop_next_outgoing().await {
            Ok(Some(msg)) => {
                send_one(
                    &registry,
                    backend.as_ref(),
                    http.as_ref(),
                    msg,
                    config.send_timeout,
                )
                .await;
            }
            Ok(None) => tokio::time::sleep(config.poll_interval).await,
            Err(err) => {
                error!(worker, error = %err, "outbound queue poll failed");
                tokio::time::sleep(config.poll_interval).await;
            }
        }
    }
}

/// Sends one message through its channel's handler and persists the
/// resulting status. A handler error or timeout leaves the message Errored
/// so the backend's retry policy picks it up again.
pub async fn send_one(
    registry: &HandlerRegistry,
    backend: &dyn Backend,
    http: &dyn HttpClient,
    msg: Msg,
    send_timeout: Duration,
) {
    let channel_type = msg.channel().channel_type().clone();
    let span = info_span!("send", msg_id = %msg.id(), channel_type = %channel_type);
    async {
        let status = match registry.lookup(&channel_type) {
            Ok(handler) => {
                match tokio::time::timeout(send_timeout, handler.send_msg(&msg, http, backend))
                    .await
                {
                    Ok(Ok(status)) => status,
                    Ok(Err(err)) => {
                        warn!(error = %err, "send failed");
                        errored_status(&msg)
                    }
                    Err(_) => {
                        warn!(timeout_secs = send_timeout.as_secs(), "send timed out");
                        errored_status(&msg)
                    }
                }
            }
            Err(err) => {
                error!(error = %err, "no handler for queued message");
                errored_status(&msg)
            }
        };

        counter!(
            "gateway_sends_total",
            "channel_type" => channel_type.to_string(),
            "status" => status.status().as_str()
        )
        .increment(1);

        if let Err(err) = backend.write_status(status).await {
            error!(error = %err, "failed to persist send status");
        }
    }
    .instrument(span)
    .await
}

fn errored_status(msg: &Msg) -> StatusUpdate {
    StatusUpdate::for_id(Arc::clone(msg.channel()), msg.id(), MsgStatus::Errored)
}
