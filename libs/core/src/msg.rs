use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::channel::Channel;
use crate::ids::{MsgId, MsgUuid};
use crate::urn::Urn;

/// Title/URL pair rendered as a tappable button by providers that support it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlButton {
    pub title: String,
    pub url: String,
}

/// Reference to a media item carried alongside a message body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub content_type: Option<String>,
    pub url: String,
}

impl Attachment {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            content_type: None,
            url: url.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Parses the `content/type:url` wire form, tolerating bare URLs.
    ///
    /// ```
    /// use mercury_core::Attachment;
    ///
    /// let att = Attachment::parse("image/jpeg:https://example.com/a.jpg");
    /// assert_eq!(att.content_type.as_deref(), Some("image/jpeg"));
    /// assert_eq!(att.url, "https://example.com/a.jpg");
    ///
    /// let att = Attachment::parse("https://example.com/a.jpg");
    /// assert_eq!(att.content_type, None);
    /// ```
    pub fn parse(raw: &str) -> Self {
        if let Some((prefix, rest)) = raw.split_once(':') {
            if prefix.contains('/') && !rest.is_empty() {
                return Self {
                    content_type: Some(prefix.to_string()),
                    url: rest.to_string(),
                };
            }
        }
        Self {
            content_type: None,
            url: raw.to_string(),
        }
    }
}

impl fmt::Display for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.content_type {
            Some(content_type) => write!(f, "{}:{}", content_type, self.url),
            None => f.write_str(&self.url),
        }
    }
}

/// One inbound or outbound communication unit in canonical form.
///
/// Construction goes through [`Msg::incoming`] or [`Msg::outgoing`]; all
/// further mutation is fluent (`with_*` consumes and returns the value), so
/// two bindings never alias the same logical message.
#[derive(Debug, Clone)]
pub struct Msg {
    id: MsgId,
    uuid: MsgUuid,
    text: String,
    attachments: Vec<Attachment>,
    external_id: Option<String>,
    urn: Urn,
    urn_auth: Option<String>,
    contact_name: Option<String>,
    quick_replies: Vec<String>,
    url_buttons: Vec<UrlButton>,
    response_to_id: MsgId,
    response_to_external_id: Option<String>,
    channel: Arc<Channel>,
    received_on: Option<OffsetDateTime>,
    sent_on: Option<OffsetDateTime>,
    high_priority: bool,
    event_id: i64,
}

impl Msg {
    /// Creates a message received from a provider. The received timestamp is
    /// set now; the backend assigns the id on write.
    pub fn incoming(channel: Arc<Channel>, urn: Urn, text: impl Into<String>) -> Self {
        let mut msg = Self::bare(channel, urn, text);
        msg.received_on = Some(OffsetDateTime::now_utc());
        msg
    }

    /// Creates a message to be delivered to a provider. Outgoing messages
    /// never carry a received timestamp.
    pub fn outgoing(channel: Arc<Channel>, urn: Urn, text: impl Into<String>) -> Self {
        Self::bare(channel, urn, text)
    }

    fn bare(channel: Arc<Channel>, urn: Urn, text: impl Into<String>) -> Self {
        Self {
            id: MsgId::NIL,
            uuid: MsgUuid::new(),
            text: text.into(),
            attachments: Vec::new(),
            external_id: None,
            urn,
            urn_auth: None,
            contact_name: None,
            quick_replies: Vec::new(),
            url_buttons: Vec::new(),
            response_to_id: MsgId::NIL,
            response_to_external_id: None,
            channel,
            received_on: None,
            sent_on: None,
            high_priority: false,
            event_id: 0,
        }
    }

    pub fn id(&self) -> MsgId {
        self.id
    }

    /// Records the backend-assigned id. The id is write-once; assigning over
    /// an existing id is a programming error.
    pub fn assign_id(&mut self, id: MsgId) {
        debug_assert!(self.id.is_nil() || self.id == id, "msg id reassigned");
        self.id = id;
    }

    pub fn uuid(&self) -> MsgUuid {
        self.uuid
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn external_id(&self) -> Option<&str> {
        self.external_id.as_deref()
    }

    pub fn urn(&self) -> &Urn {
        &self.urn
    }

    pub fn urn_auth(&self) -> Option<&str> {
        self.urn_auth.as_deref()
    }

    pub fn contact_name(&self) -> Option<&str> {
        self.contact_name.as_deref()
    }

    pub fn quick_replies(&self) -> &[String] {
        &self.quick_replies
    }

    pub fn url_buttons(&self) -> &[UrlButton] {
        &self.url_buttons
    }

    pub fn response_to_id(&self) -> MsgId {
        self.response_to_id
    }

    pub fn response_to_external_id(&self) -> Option<&str> {
        self.response_to_external_id.as_deref()
    }

    pub fn channel(&self) -> &Arc<Channel> {
        &self.channel
    }

    pub fn received_on(&self) -> Option<OffsetDateTime> {
        self.received_on
    }

    pub fn sent_on(&self) -> Option<OffsetDateTime> {
        self.sent_on
    }

    pub fn high_priority(&self) -> bool {
        self.high_priority
    }

    pub fn event_id(&self) -> i64 {
        self.event_id
    }

    pub fn with_external_id(mut self, external_id: impl Into<String>) -> Self {
        self.external_id = Some(external_id.into());
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn with_urn_auth(mut self, auth: impl Into<String>) -> Self {
        self.urn_auth = Some(auth.into());
        self
    }

    pub fn with_contact_name(mut self, name: impl Into<String>) -> Self {
        self.contact_name = Some(name.into());
        self
    }

    pub fn with_quick_replies(mut self, replies: Vec<String>) -> Self {
        self.quick_replies = replies;
        self
    }

    pub fn with_url_buttons(mut self, buttons: Vec<UrlButton>) -> Self {
        self.url_buttons = buttons;
        self
    }

    pub fn with_response_to(mut self, id: MsgId, external_id: Option<String>) -> Self {
        self.response_to_id = id;
        self.response_to_external_id = external_id;
        self
    }

    pub fn with_received_on(mut self, received_on: OffsetDateTime) -> Self {
        self.received_on = Some(received_on);
        self
    }

    pub fn with_sent_on(mut self, sent_on: OffsetDateTime) -> Self {
        self.sent_on = Some(sent_on);
        self
    }

    pub fn with_high_priority(mut self, high_priority: bool) -> Self {
        self.high_priority = high_priority;
        self
    }

    pub fn with_event_id(mut self, event_id: i64) -> Self {
        self.event_id = event_id;
        self
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
    fn incoming_sets_received_timestamp() {
        let msg = Msg::incoming(channel(), Urn::whatsapp("123").unwrap(), "hi");
        assert!(msg.received_on().is_some());
        assert!(msg.sent_on().is_none());
        assert!(msg.id().is_nil());
        assert_ne!(msg.uuid(), MsgUuid::NIL);
    }

    #[test]
    fn outgoing_has_no_received_timestamp() {
        let msg = Msg::outgoing(channel(), Urn::tel("+12065550000", None).unwrap(), "out");
        assert!(msg.received_on().is_none());
    }

    #[test]
    fn fluent_mutation_accumulates() {
        let msg = Msg::incoming(channel(), Urn::whatsapp("123").unwrap(), "hi")
            .with_external_id("SM123")
            .with_contact_name("Ada")
            .with_attachment(Attachment::parse("image/jpeg:https://example.com/a.jpg"))
            .with_attachment(Attachment::new("https://example.com/b.jpg"))
            .with_quick_replies(vec!["yes".into(), "no".into()])
            .with_high_priority(true);

        assert_eq!(msg.external_id(), Some("SM123"));
        assert_eq!(msg.contact_name(), Some("Ada"));
        assert_eq!(msg.attachments().len(), 2);
        assert_eq!(msg.quick_replies(), ["yes", "no"]);
        assert!(msg.high_priority());
    }

    #[test]
    fn attachment_wire_form_round_trips() {
        let att = Attachment::parse("audio/mp3:https://example.com/a.mp3");
        assert_eq!(att.to_string(), "audio/mp3:https://example.com/a.mp3");
        let att = Attachment::parse("https://example.com/a.mp3");
        assert_eq!(att.to_string(), "https://example.com/a.mp3");
    }
}
