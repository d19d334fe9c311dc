//! In-memory [`Backend`] used by the dev binary and the test suite. The
//! production backend is an external system; this twin implements the same
//! contract, including inbound deduplication keyed on the channel uuid and
//! the provider's external id.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

use mercury_core::{Backend, Channel, ChannelType, Msg, MsgId, StatusUpdate};

#[derive(Default)]
struct State {
    channels: HashMap<(ChannelType, Uuid), Arc<Channel>>,
    msgs: Vec<Msg>,
    external_ids: HashMap<(Uuid, String), MsgId>,
    outgoing: VecDeque<Msg>,
    statuses: Vec<StatusUpdate>,
    stopped: Vec<String>,
}

pub struct MemBackend {
    next_id: AtomicI64,
    state: RwLock<State>,
}

impl MemBackend {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            state: RwLock::new(State::default()),
        }
    }

    pub async fn add_channel(&self, channel: Channel) -> Arc<Channel> {
        let channel = Arc::new(channel);
        let key = (channel.channel_type().clone(), *channel.uuid());
        self.state
            .write()
            .await
            .channels
            .insert(key, Arc::clone(&channel));
        channel
    }

    /// Stores and enqueues an outgoing message for the send workers,
    /// assigning an id when it has none yet.
    pub async fn queue_outgoing(&self, mut msg: Msg) -> MsgId {
        if msg.id().is_nil() {
            msg.assign_id(MsgId::new(self.next_id.fetch_add(1, Ordering::Relaxed)));
        }
        let id = msg.id();
        let mut state = self.state.write().await;
        state.msgs.push(msg.clone());
        state.outgoing.push_back(msg);
        id
    }

    pub async fn written_msgs(&self) -> Vec<Msg> {
        self.state.read().await.msgs.clone()
    }

    pub async fn statuses(&self) -> Vec<StatusUpdate> {
        self.state.read().await.statuses.clone()
    }

    pub async fn stopped_contacts(&self) -> Vec<String> {
        self.state.read().await.stopped.clone()
    }
}

impl Default for MemBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for MemBackend {
    async fn channel(
        &self,
        channel_type: &ChannelType,
        uuid: &Uuid,
    ) -> Result<Option<Arc<Channel>>> {
        let state = self.state.read().await;
        Ok(state.channels.get(&(channel_type.clone(), *uuid)).cloned())
    }

    async fn write_msg(&self, msg: &mut Msg) -> Result<()> {
        let mut state = self.state.write().await;

        // a redelivered webhook resolves to the original message
        if let Some(external_id) = msg.external_id() {
            let key = (*msg.channel().uuid(), external_id.to_string());
            if let Some(existing) = state.external_ids.get(&key) {
                msg.assign_id(*existing);
                return Ok(());
            }
        }

        let id = MsgId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        msg.assign_id(id);
        if let Some(external_id) = msg.external_id() {
            state
                .external_ids
                .insert((*msg.channel().uuid(), external_id.to_string()), id);
        }
        state.msgs.push(msg.clone());
        Ok(())
    }

    async fn write_status(&self, status: StatusUpdate) -> Result<()> {
        if !status.has_target() {
            warn!("status update with no target, dropping");
            return Ok(());
        }
        let mut state = self.state.write().await;
        let resolved = if !status.msg_id().is_nil() {
            state.msgs.iter().any(|msg| msg.id() == status.msg_id())
        } else {
            status.external_id().is_some_and(|external_id| {
                state
                    .msgs
                    .iter()
                    .any(|msg| msg.external_id() == Some(external_id))
            })
        };
        if !resolved {
            warn!(
                msg_id = %status.msg_id(),
                external_id = status.external_id().unwrap_or(""),
                "message not found, dropping status update"
            );
            return Ok(());
        }
        state.statuses.push(status);
        Ok(())
    }

    async fn stop_msg_contact(&self, msg: &Msg) -> Result<()> {
        let urn = msg.urn().to_string();
        let mut state = self.state.write().await;
        if !state.stopped.contains(&urn) {
            state.stopped.push(urn);
        }
        Ok(())
    }

    async fn pop_next_outgoing(&self) -> Result<Option<Msg>> {
        Ok(self.state.write().await.outgoing.pop_front())
    }
}
