use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;
use url::form_urlencoded;

use mercury_backend_memory::MemBackend;
use mercury_core::{
    Backend, CONFIG_IGNORE_DELIVERY_REPORTS, Channel, Msg, MsgId, MsgStatus, Urn,
};
use mercury_gateway::http::{GatewayState, build_router};
use mercury_gateway::worker::send_one;
use mercury_handlers::twilio::TwilioHandler;
use mercury_handlers::{HandlerConfig, HandlerRegistry};
use mercury_testutil::{MockHttpClient, TEST_CHANNEL_UUID, twilio_channel};

const SIGNATURE_HEADER: &str = "X-Twilio-Signature";
const HOST: &str = "gw.example.com";

fn registry() -> Arc<HandlerRegistry> {
    let config = HandlerConfig {
        domain: HOST.into(),
        ignore_delivery_reports: false,
    };
    let mut registry = HandlerRegistry::new();
    registry
        .register(Box::new(TwilioHandler::sms()), &config)
        .unwrap();
    registry
        .register(Box::new(TwilioHandler::messaging_service()), &config)
        .unwrap();
    Arc::new(registry)
}

async fn app_with_channel(channel: Channel) -> (Router, Arc<MemBackend>) {
    let backend = Arc::new(MemBackend::new());
    backend.add_channel(channel).await;
    let state = GatewayState {
        registry: registry(),
        backend: Arc::clone(&backend) as Arc<dyn Backend>,
        default_domain: HOST.into(),
    };
    (build_router(state), backend)
}

fn encode_form(pairs: &[(&str, &str)]) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in pairs {
        serializer.append_pair(key, value);
    }
    serializer.finish()
}

fn sign(path_and_query: &str, body: &str, auth_token: &str) -> String {
    let url = format!("https://{HOST}{path_and_query}");
    let mut params = security::FormParams::new();
    for (key, value) in form_urlencoded::parse(body.as_bytes()) {
        params
            .entry(key.into_owned())
            .or_default()
            .push(value.into_owned());
    }
    security::calculate_signature(&url, &params, auth_token).unwrap()
}

fn post(path_and_query: &str, body: String, signature: Option<String>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(path_and_query)
        .header("host", HOST)
        .header("content-type", "application/x-www-form-urlencoded");
    if let Some(signature) = signature {
        builder = builder.header(SIGNATURE_HEADER, signature);
    }
    builder.body(Body::from(body)).unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("collect body")
        .to_bytes();
    String::from_utf8_lossy(&bytes).into_owned()
}

fn mo_body() -> String {
    encode_form(&[
        ("MessageSid", "SMabc123"),
        ("AccountSid", "ACtest1234"),
        ("From", "+12065550000"),
        ("FromCountry", "US"),
        ("To", "+12065551212"),
        ("Body", "hello gateway"),
        ("NumMedia", "1"),
        ("MediaUrl0", "https://api.twilio.com/media/1.jpg"),
    ])
}

#[tokio::test]
async fn signed_receive_writes_msg_and_acks_twiml() {
    let (app, backend) = app_with_channel(twilio_channel()).await;
    let path = format!("/c/t/{TEST_CHANNEL_UUID}/receive");
    let body = mo_body();
    let signature = sign(&path, &body, "6789");

    let response = app.oneshot(post(&path, body, Some(signature))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "text/xml"
    );
    assert_eq!(
        body_text(response).await,
        r#"<?xml version="1.0" encoding="UTF-8"?><Response/>"#
    );

    let msgs = backend.written_msgs().await;
    assert_eq!(msgs.len(), 1);
    assert_eq!(msgs[0].text(), "hello gateway");
    assert_eq!(msgs[0].external_id(), Some("SMabc123"));
    assert_eq!(msgs[0].attachments().len(), 1);
}

#[tokio::test]
async fn unsigned_receive_is_rejected_before_backend() {
    let (app, backend) = app_with_channel(twilio_channel()).await;
    let path = format!("/c/t/{TEST_CHANNEL_UUID}/receive");

    let response = app.oneshot(post(&path, mo_body(), None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_text(response).await;
    assert!(body.contains("missing request signature"), "body: {body}");
    assert!(backend.written_msgs().await.is_empty());
}

#[tokio::test]
async fn duplicate_webhook_delivery_is_deduplicated() {
    let (app, backend) = app_with_channel(twilio_channel()).await;
    let path = format!("/c/t/{TEST_CHANNEL_UUID}/receive");
    let body = mo_body();
    let signature = sign(&path, &body, "6789");

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(post(&path, body.clone(), Some(signature.clone())))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(backend.written_msgs().await.len(), 1);
}

#[tokio::test]
async fn unknown_channel_type_is_fatal_404() {
    let (app, _backend) = app_with_channel(twilio_channel()).await;
    let path = format!("/c/zz/{TEST_CHANNEL_UUID}/receive");

    let response = app.oneshot(post(&path, mo_body(), None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_text(response).await;
    assert!(body.contains("no handler registered for channel type `ZZ`"));
}

#[tokio::test]
async fn unknown_channel_uuid_is_404() {
    let (app, _backend) = app_with_channel(twilio_channel()).await;
    let path = "/c/t/0139967f-30b1-44e1-b1fc-b35678771b22/receive";

    let response = app
        .oneshot(post(path, mo_body(), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_text(response).await.contains("channel not found"));
}

#[tokio::test]
async fn malformed_channel_uuid_is_400() {
    let (app, _backend) = app_with_channel(twilio_channel()).await;

    let response = app
        .oneshot(post("/c/t/not-a-uuid/receive", mo_body(), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

async fn seed_msg(backend: &MemBackend, channel: &Arc<Channel>, external_id: &str) -> MsgId {
    let mut msg = Msg::incoming(
        Arc::clone(channel),
        Urn::tel("+12065550000", None).unwrap(),
        "hi",
    )
    .with_external_id(external_id);
    backend.write_msg(&mut msg).await.unwrap();
    msg.id()
}

#[tokio::test]
async fn status_callback_records_delivery() {
    let (app, backend) = app_with_channel(twilio_channel()).await;
    let channel = backend
        .channel(&mercury_core::ChannelType::new("T"), &uuid::Uuid::parse_str(TEST_CHANNEL_UUID).unwrap())
        .await
        .unwrap()
        .unwrap();
    let id = seed_msg(&backend, &channel, "SMout1").await;

    let path = format!("/c/t/{TEST_CHANNEL_UUID}/status?id={id}&action=callback");
    let body = encode_form(&[("MessageSid", "SMout1"), ("MessageStatus", "delivered")]);
    let signature = sign(&path, &body, "6789");

    let response = app.oneshot(post(&path, body, Some(signature))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let statuses = backend.statuses().await;
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].status(), MsgStatus::Delivered);
    assert_eq!(statuses[0].msg_id(), id);
}

#[tokio::test]
async fn delivery_reports_are_suppressed_by_channel_flag() {
    let channel = twilio_channel().with_config(CONFIG_IGNORE_DELIVERY_REPORTS, true);
    let (app, backend) = app_with_channel(channel).await;
    let arc_channel = backend
        .channel(&mercury_core::ChannelType::new("T"), &uuid::Uuid::parse_str(TEST_CHANNEL_UUID).unwrap())
        .await
        .unwrap()
        .unwrap();
    let id = seed_msg(&backend, &arc_channel, "SMout2").await;

    let path = format!("/c/t/{TEST_CHANNEL_UUID}/status?id={id}&action=callback");
    let body = encode_form(&[("MessageSid", "SMout2"), ("MessageStatus", "delivered")]);
    let signature = sign(&path, &body, "6789");

    let response = app.oneshot(post(&path, body, Some(signature))).await.unwrap();

    // still a valid twiml ack so the provider doesn't retry
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.contains("ignoring non error delivery report"));
    assert!(body.ends_with("<Response/>"));
    assert!(backend.statuses().await.is_empty());
}

#[tokio::test]
async fn unknown_provider_status_is_400() {
    let (app, backend) = app_with_channel(twilio_channel()).await;
    let path = format!("/c/t/{TEST_CHANNEL_UUID}/status");
    let body = encode_form(&[("MessageSid", "SMx"), ("MessageStatus", "bounced")]);
    let signature = sign(&path, &body, "6789");

    let response = app.oneshot(post(&path, body, Some(signature))).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await.contains("unknown status 'bounced'"));
    assert!(backend.statuses().await.is_empty());
}

#[tokio::test]
async fn healthz_responds() {
    let (app, _backend) = app_with_channel(twilio_channel()).await;
    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn send_worker_delivers_queued_msg_and_persists_status() {
    let backend = Arc::new(MemBackend::new());
    let channel = backend.add_channel(twilio_channel()).await;
    let registry = registry();
    let mock = MockHttpClient::new();
    mock.enqueue(201, r#"{"sid": "SMsent1"}"#);

    let id = backend
        .queue_outgoing(Msg::outgoing(
            Arc::clone(&channel),
            Urn::tel("+12065550000", None).unwrap(),
            "queued message",
        ))
        .await;

    let msg = backend.pop_next_outgoing().await.unwrap().unwrap();
    send_one(
        &registry,
        backend.as_ref(),
        &mock,
        msg,
        Duration::from_secs(5),
    )
    .await;

    let statuses = backend.statuses().await;
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].msg_id(), id);
    assert_eq!(statuses[0].status(), MsgStatus::Wired);
    assert_eq!(statuses[0].external_id(), Some("SMsent1"));
    assert_eq!(statuses[0].logs().len(), 1);

    let requests = mock.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        requests[0].form_value("StatusCallback").unwrap(),
        format!("https://gw.example.com/c/t/{TEST_CHANNEL_UUID}/status?id={id}&action=callback")
    );
}

#[tokio::test]
async fn send_worker_leaves_errored_status_on_transport_failure() {
    let backend = Arc::new(MemBackend::new());
    let channel = backend.add_channel(twilio_channel()).await;
    let registry = registry();
    let mock = MockHttpClient::new();
    mock.enqueue_transport_error("dns failure");

    backend
        .queue_outgoing(Msg::outgoing(
            Arc::clone(&channel),
            Urn::tel("+12065550000", None).unwrap(),
            "queued message",
        ))
        .await;

    let msg = backend.pop_next_outgoing().await.unwrap().unwrap();
    send_one(
        &registry,
        backend.as_ref(),
        &mock,
        msg,
        Duration::from_secs(5),
    )
    .await;

    let statuses = backend.statuses().await;
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].status(), MsgStatus::Errored);
}
