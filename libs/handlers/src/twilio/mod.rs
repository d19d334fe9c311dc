//! Handler for Twilio channels: SMS, Messaging Service, and TwiML API
//! variants, including Twilio's WhatsApp Business routing.

use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use bytes::Bytes;
use http::{Method, StatusCode, header};
use serde_json::Value;
use tracing::error;
use url::{Url, form_urlencoded};

use mercury_core::{
    Attachment, Backend, CONFIG_ACCOUNT_SID, CONFIG_AUTH_TOKEN, CONFIG_IGNORE_DELIVERY_REPORTS,
    CONFIG_MESSAGING_SERVICE_SID, CONFIG_SEND_URL, Channel, ChannelLog, ChannelType, HandlerError,
    HttpClient, Msg, MsgId, MsgStatus, StatusUpdate, Urn, UrnScheme, execute_recorded,
};

use crate::form::Form;
use crate::request::{Ack, ReceiveEvent, ReceiveOutcome, WebhookRequest};
use crate::text::{decode_possible_base64, split_msg};
use crate::traits::{ChannelHandler, HandlerConfig, HandlerRoute, signature_error};

const SIGNATURE_HEADER: &str = "X-Twilio-Signature";
const FORWARDED_PATH_HEADER: &str = "X-Forwarded-Path";

const MAX_MSG_LENGTH: usize = 1600;
const DEFAULT_SEND_URL: &str = "https://api.twilio.com/2010-04-01/Accounts";

/// Error code Twilio returns when the recipient has replied "stop".
const ERROR_STOPPED: i64 = 21610;

const STATUS_VOCABULARY: &str = "'queued', 'failed', 'sent', 'delivered', or 'undelivered'";

const TWIML_EMPTY: &str = r#"<?xml version="1.0" encoding="UTF-8"?><Response/>"#;

fn status_from_provider(value: &str) -> Result<MsgStatus, HandlerError> {
    match value {
        "queued" => Ok(MsgStatus::Sent),
        "failed" => Ok(MsgStatus::Failed),
        "sent" => Ok(MsgStatus::Sent),
        "delivered" => Ok(MsgStatus::Delivered),
        "undelivered" => Ok(MsgStatus::Failed),
        other => Err(HandlerError::UnrecognizedStatus {
            value: other.to_string(),
            expected: STATUS_VOCABULARY,
        }),
    }
}

fn twiml_ack() -> Ack {
    Ack {
        status: StatusCode::OK,
        content_type: "text/xml",
        body: TWIML_EMPTY.to_string(),
    }
}

fn twiml_comment(details: &str) -> Ack {
    Ack {
        status: StatusCode::OK,
        content_type: "text/xml",
        body: format!(r#"<?xml version="1.0" encoding="UTF-8"?><!-- {details} --><Response/>"#),
    }
}

pub struct TwilioHandler {
    channel_type: ChannelType,
    name: &'static str,
    ignore_delivery_reports: bool,
    domain: String,
}

impl TwilioHandler {
    pub fn new(channel_type: &str, name: &'static str) -> Self {
        Self {
            channel_type: ChannelType::new(channel_type),
            name,
            ignore_delivery_reports: false,
            domain: String::new(),
        }
    }

    pub fn sms() -> Self {
        Self::new("T", "Twilio")
    }

    pub fn messaging_service() -> Self {
        Self::new("TMS", "Twilio Messaging Service")
    }

    pub fn twiml_api() -> Self {
        Self::new("TW", "TwiML API")
    }

    fn validate_signature(
        &self,
        channel: &Channel,
        request: &WebhookRequest,
    ) -> Result<(), HandlerError> {
        let auth_token = channel.string_config(CONFIG_AUTH_TOKEN).ok_or_else(|| {
            HandlerError::configuration("invalid or missing auth token in channel config")
        })?;
        // a trusted reverse proxy may have rewritten the path the provider signed
        let url = request.url_with_path_override(FORWARDED_PATH_HEADER);
        security::verify_signature(
            request.header(SIGNATURE_HEADER),
            &url,
            &request.form(),
            auth_token,
        )
        .map_err(signature_error)
    }

    fn message_urn(
        &self,
        channel: &Channel,
        address: &str,
        country: Option<&str>,
    ) -> Result<Urn, HandlerError> {
        if channel.is_scheme(UrnScheme::WhatsApp) {
            // Twilio WhatsApp from is in the form `whatsapp:+12211414154`;
            // official WhatsApp ids carry no leading +
            let id = address.split(':').next_back().unwrap_or(address);
            Ok(Urn::whatsapp(id)?)
        } else {
            Ok(Urn::tel(address, country)?)
        }
    }
}

#[async_trait::async_trait]
impl ChannelHandler for TwilioHandler {
    fn channel_type(&self) -> &ChannelType {
        &self.channel_type
    }

    fn name(&self) -> &str {
        self.name
    }

    fn initialize(&mut self, config: &HandlerConfig) -> Result<Vec<HandlerRoute>, HandlerError> {
        self.ignore_delivery_reports = config.ignore_delivery_reports;
        self.domain = config.domain.clone();
        Ok(vec![HandlerRoute::Receive, HandlerRoute::Status])
    }

    async fn receive_message(
        &self,
        channel: Arc<Channel>,
        request: &WebhookRequest,
        backend: &dyn Backend,
    ) -> Result<ReceiveOutcome, HandlerError> {
        self.validate_signature(&channel, request)?;

        let form = Form::from_request(request);
        let message_sid = form.required("MessageSid")?.to_string();
        form.required("AccountSid")?;
        let from = form.required("From")?.to_string();
        form.required("To")?;
        let num_media = form.int_or("NumMedia", 0);

        let urn = self.message_urn(&channel, &from, form.get_non_empty("FromCountry"))?;

        // Twilio sometimes sends concatenated sms as base64 encoded MMS
        let body = match form.get_non_empty("Body") {
            Some(body) => decode_possible_base64(body),
            None => String::new(),
        };

        let mut msg = backend
            .new_incoming_msg(channel, urn, &body)
            .with_external_id(message_sid.as_str());
        for i in 0..num_media {
            if let Some(media_url) = form.get_non_empty(&format!("MediaUrl{i}")) {
                msg = msg.with_attachment(Attachment::parse(media_url));
            }
        }

        backend.write_msg(&mut msg).await?;

        Ok(ReceiveOutcome::events(
            vec![ReceiveEvent::Msg {
                id: msg.id(),
                uuid: msg.uuid(),
            }],
            twiml_ack(),
        ))
    }

    async fn receive_status(
        &self,
        channel: Arc<Channel>,
        request: &WebhookRequest,
        backend: &dyn Backend,
    ) -> Result<ReceiveOutcome, HandlerError> {
        self.validate_signature(&channel, request)?;

        let form = Form::from_request(request);
        let (message_sid, provider_status) = match (
            form.get_non_empty("MessageSid"),
            form.get_non_empty("MessageStatus"),
        ) {
            (Some(sid), Some(status)) => (sid.to_string(), status.to_string()),
            _ => return Ok(ReceiveOutcome::ignored(self.write_ignored("no msg status, ignoring"))),
        };

        let status = status_from_provider(&provider_status)?;

        let ignore = self.ignore_delivery_reports
            || channel.bool_config_or(CONFIG_IGNORE_DELIVERY_REPORTS, false);
        if ignore && status != MsgStatus::Failed {
            return Ok(ReceiveOutcome::ignored(
                self.write_ignored("ignoring non error delivery report"),
            ));
        }

        // an explicit id in the callback URL wins over the provider's own id
        let update = match request.query_param("id") {
            Some(raw) => match raw.parse::<i64>() {
                Ok(id) => backend.new_status_for_id(channel, MsgId::new(id), status),
                Err(err) => {
                    error!(error = %err, id = %raw, "invalid message id on status callback");
                    backend.new_status_for_external_id(channel, &message_sid, status)
                }
            },
            None => backend.new_status_for_external_id(channel, &message_sid, status),
        };

        let event = ReceiveEvent::Status {
            msg_id: update.msg_id(),
            external_id: update.external_id().map(str::to_string),
            status,
        };
        backend.write_status(update).await?;

        Ok(ReceiveOutcome::events(vec![event], twiml_ack()))
    }

    async fn send_msg(
        &self,
        msg: &Msg,
        http: &dyn HttpClient,
        backend: &dyn Backend,
    ) -> Result<StatusUpdate, HandlerError> {
        let channel = msg.channel();

        let account_sid = channel
            .string_config(CONFIG_ACCOUNT_SID)
            .ok_or_else(|| HandlerError::configuration("missing account sid for twilio channel"))?
            .to_string();
        let auth_token = channel
            .string_config(CONFIG_AUTH_TOKEN)
            .ok_or_else(|| {
                HandlerError::configuration("missing account auth token for twilio channel")
            })?
            .to_string();

        let callback_domain = channel.callback_domain(&self.domain);
        let callback_url = format!(
            "https://{}/c/{}/{}/status?id={}&action=callback",
            callback_domain,
            self.channel_type.as_str().to_lowercase(),
            channel.uuid(),
            msg.id()
        );

        let send_url = {
            let base = channel.string_config_or(CONFIG_SEND_URL, DEFAULT_SEND_URL);
            join_send_url(base, &account_sid)?
        };
        let authorization = format!(
            "Basic {}",
            B64.encode(format!("{account_sid}:{auth_token}"))
        );

        let whatsapp = channel.is_scheme(UrnScheme::WhatsApp);
        let mut to = msg.urn().path().to_string();
        let mut sender = channel.address().to_string();
        if whatsapp {
            // Twilio expects whatsapp-prefixed addresses on both legs
            to = format!("{}:+{}", UrnScheme::WhatsApp, to.trim_start_matches('+'));
            sender = format!("{}:{}", UrnScheme::WhatsApp, sender);
        }
        let service_sid = channel
            .string_config(CONFIG_MESSAGING_SERVICE_SID)
            .map(str::to_string);

        // errored until a send attempt proves otherwise, so an unclassified
        // failure leaves the message marked for retry
        let mut status = backend.new_status_for_id(Arc::clone(channel), msg.id(), MsgStatus::Errored);

        let parts = split_msg(msg.text(), MAX_MSG_LENGTH);
        for (i, part) in parts.iter().enumerate() {
            let body = {
                let mut form = form_urlencoded::Serializer::new(String::new());
                form.append_pair("To", &to);
                form.append_pair("Body", part);
                form.append_pair("StatusCallback", &callback_url);

                // any media rides on the first part only
                if i == 0 {
                    if let Some(attachment) = msg.attachments().first() {
                        form.append_pair("MediaUrl", &attachment.url);
                    }
                }

                // a pooled messaging service takes precedence over our address
                match &service_sid {
                    Some(sid) => form.append_pair("MessagingServiceSid", sid),
                    None => form.append_pair("From", &sender),
                };

                Bytes::from(form.finish())
            };

            let request = http::Request::builder()
                .method(Method::POST)
                .uri(send_url.as_str())
                .header(header::AUTHORIZATION, authorization.as_str())
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .header(header::ACCEPT, "application/json")
                .body(body)
                .map_err(|err| HandlerError::Backend(err.into()))?;

            let exchange = execute_recorded(http, request).await;
            let mut log = ChannelLog::from_exchange("Message Sent", channel, msg.id(), &exchange);

            let Some(response) = exchange.response.as_ref() else {
                // transport failure, already annotated on the log
                status.add_log(log);
                return Ok(status);
            };
            let body: Option<Value> = serde_json::from_slice(&response.body).ok();

            if !response.status.is_success() {
                let error_code = body
                    .as_ref()
                    .and_then(|body| body.get("code"))
                    .and_then(Value::as_i64)
                    .unwrap_or(0);
                if error_code == ERROR_STOPPED {
                    status.set_status(MsgStatus::Failed);
                    backend.stop_msg_contact(msg).await?;
                }
                let detail = if error_code != 0 {
                    format!("received error code from twilio '{error_code}'")
                } else {
                    format!("received status '{}' from twilio", response.status)
                };
                log = log.with_error("Message Send Error", detail);
                status.add_log(log);
                return Ok(status);
            }

            match body
                .as_ref()
                .and_then(|body| body.get("sid"))
                .and_then(Value::as_str)
            {
                Some(sid) => {
                    status.set_status(MsgStatus::Wired);
                    // only the first part's external id is recorded
                    if i == 0 {
                        status.set_external_id(sid);
                    }
                    status.add_log(log);
                }
                None => {
                    log = log.with_error("Message Send Error", "unable to get sid from body");
                    status.add_log(log);
                    return Ok(status);
                }
            }
        }

        Ok(status)
    }

    fn write_ignored(&self, details: &str) -> Ack {
        twiml_comment(details)
    }
}

fn join_send_url(base: &str, account_sid: &str) -> Result<String, HandlerError> {
    let mut url = Url::parse(base)
        .map_err(|err| HandlerError::configuration(format!("invalid send url '{base}': {err}")))?;
    url.path_segments_mut()
        .map_err(|_| HandlerError::configuration(format!("invalid send url '{base}'")))?
        .pop_if_empty()
        .extend([account_sid, "Messages.json"]);
    Ok(url.to_string())
}
