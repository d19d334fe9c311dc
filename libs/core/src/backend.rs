use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::channel::{Channel, ChannelType};
use crate::ids::MsgId;
use crate::msg::Msg;
use crate::status::{MsgStatus, StatusUpdate};
use crate::urn::Urn;

/// Persistence and queueing contract consumed by the pipelines.
///
/// Implementations own durability, retry scheduling for `Errored` statuses,
/// deduplication of redelivered webhooks, and spooling when their own storage
/// is unreachable. The gateway never retries a write itself.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Looks up the configured channel for a webhook route.
    async fn channel(
        &self,
        channel_type: &ChannelType,
        uuid: &Uuid,
    ) -> Result<Option<Arc<Channel>>>;

    /// Creates an incoming message bound to this backend. The id stays nil
    /// until [`Backend::write_msg`] assigns it.
    fn new_incoming_msg(&self, channel: Arc<Channel>, urn: Urn, text: &str) -> Msg {
        Msg::incoming(channel, urn, text)
    }

    fn new_status_for_id(
        &self,
        channel: Arc<Channel>,
        msg_id: MsgId,
        status: MsgStatus,
    ) -> StatusUpdate {
        StatusUpdate::for_id(channel, msg_id, status)
    }

    fn new_status_for_external_id(
        &self,
        channel: Arc<Channel>,
        external_id: &str,
        status: MsgStatus,
    ) -> StatusUpdate {
        StatusUpdate::for_external_id(channel, external_id, status)
    }

    /// Persists and enqueues an inbound message, assigning its id. Duplicate
    /// webhook deliveries (same channel and provider external id) must
    /// resolve to the original id rather than create a second message.
    async fn write_msg(&self, msg: &mut Msg) -> Result<()>;

    /// Records a delivery-state transition. Updates that resolve to no known
    /// message are dropped, not retried.
    async fn write_status(&self, status: StatusUpdate) -> Result<()>;

    /// Marks the message's contact as opted out of further sends.
    async fn stop_msg_contact(&self, msg: &Msg) -> Result<()>;

    /// Pops the next queued outgoing message, if any. Consumed by the send
    /// worker pool.
    async fn pop_next_outgoing(&self) -> Result<Option<Msg>>;
}
