use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::channel::Channel;
use crate::ids::MsgId;
use crate::log::ChannelLog;

/// Canonical delivery states exposed to the backend.
///
/// `Delivered` and `Failed` are terminal. `Errored` marks a retryable failure
/// and must never be treated as terminal by retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MsgStatus {
    /// Handed to the provider, no acknowledgement yet.
    Wired,
    Sent,
    Delivered,
    Failed,
    Errored,
}

impl MsgStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MsgStatus::Wired => "wired",
            MsgStatus::Sent => "sent",
            MsgStatus::Delivered => "delivered",
            MsgStatus::Failed => "failed",
            MsgStatus::Errored => "errored",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MsgStatus::Delivered | MsgStatus::Failed)
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, MsgStatus::Errored)
    }
}

impl fmt::Display for MsgStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One delivery-state transition for one message, addressed by internal id,
/// provider external id, or both.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    channel: Arc<Channel>,
    msg_id: MsgId,
    external_id: Option<String>,
    status: MsgStatus,
    logs: Vec<ChannelLog>,
}

impl StatusUpdate {
    pub fn for_id(channel: Arc<Channel>, msg_id: MsgId, status: MsgStatus) -> Self {
        Self {
            channel,
            msg_id,
            external_id: None,
            status,
            logs: Vec::new(),
        }
    }

    pub fn for_external_id(
        channel: Arc<Channel>,
        external_id: impl Into<String>,
        status: MsgStatus,
    ) -> Self {
        Self {
            channel,
            msg_id: MsgId::NIL,
            external_id: Some(external_id.into()),
            status,
            logs: Vec::new(),
        }
    }

    pub fn channel(&self) -> &Arc<Channel> {
        &self.channel
    }

    pub fn msg_id(&self) -> MsgId {
        self.msg_id
    }

    pub fn external_id(&self) -> Option<&str> {
        self.external_id.as_deref()
    }

    pub fn status(&self) -> MsgStatus {
        self.status
    }

    pub fn set_status(&mut self, status: MsgStatus) {
        self.status = status;
    }

    /// Records the provider's own identifier for the message.
    pub fn set_external_id(&mut self, external_id: impl Into<String>) {
        self.external_id = Some(external_id.into());
    }

    pub fn add_log(&mut self, log: ChannelLog) {
        self.logs.push(log);
    }

    pub fn logs(&self) -> &[ChannelLog] {
        &self.logs
    }

    /// Whether this update can be correlated to a message at all.
    pub fn has_target(&self) -> bool {
        !self.msg_id.is_nil() || self.external_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelType;
    use uuid::Uuid;

    fn channel() -> Arc<Channel> {
        Arc::new(Channel::new(
            ChannelType::new("T"),
            Uuid::new_v4(),
            "Test",
            "+12065551212",
        ))
    }

    #[test]
    fn terminal_and_retryable_states() {
        assert!(MsgStatus::Delivered.is_terminal());
        assert!(MsgStatus::Failed.is_terminal());
        assert!(!MsgStatus::Errored.is_terminal());
        assert!(MsgStatus::Errored.is_retryable());
        assert!(!MsgStatus::Wired.is_terminal());
        assert!(!MsgStatus::Sent.is_retryable());
    }

    #[test]
    fn update_targets() {
        let by_id = StatusUpdate::for_id(channel(), MsgId::new(10), MsgStatus::Wired);
        assert!(by_id.has_target());
        assert_eq!(by_id.msg_id(), MsgId::new(10));
        assert_eq!(by_id.external_id(), None);

        let by_ext = StatusUpdate::for_external_id(channel(), "SM1", MsgStatus::Delivered);
        assert!(by_ext.has_target());
        assert!(by_ext.msg_id().is_nil());
        assert_eq!(by_ext.external_id(), Some("SM1"));

        let neither = StatusUpdate::for_id(channel(), MsgId::NIL, MsgStatus::Sent);
        assert!(!neither.has_target());
    }

    #[test]
    fn status_value_is_mutable_until_handoff() {
        let mut update = StatusUpdate::for_id(channel(), MsgId::new(1), MsgStatus::Errored);
        update.set_status(MsgStatus::Wired);
        update.set_external_id("SM99");
        assert_eq!(update.status(), MsgStatus::Wired);
        assert_eq!(update.external_id(), Some("SM99"));
    }
}
