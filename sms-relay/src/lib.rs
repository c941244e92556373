use std::{future::Future, net::SocketAddr};

use anyhow::Context;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use common::{ack_body_json, Notification};
use serde::Serialize;
use thiserror::Error;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

pub const TOPIC_ENV: &str = "SNS_TOPIC_ARN";
pub const GATEWAY_ENV: &str = "SMS_GATEWAY_URL";
pub const BIND_ENV: &str = "RELAY_BIND";
pub const DEFAULT_BIND: &str = "0.0.0.0:3000";

const CORS_HEADERS: [(header::HeaderName, &str); 3] = [
    (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
    (header::ACCESS_CONTROL_ALLOW_HEADERS, "*"),
    (header::ACCESS_CONTROL_ALLOW_METHODS, "POST, OPTIONS"),
];

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("gateway request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("gateway answered {0}")]
    Status(u16),
}

/// Somewhere SMS messages can be published to.
pub trait Publisher: Clone + Send + Sync + 'static {
    fn publish(
        &self,
        topic_arn: &str,
        message: &str,
    ) -> impl Future<Output = Result<(), PublishError>> + Send;
}

#[derive(Serialize)]
struct GatewayMessage<'a> {
    topic_arn: &'a str,
    message: &'a str,
}

/// Hands the message to an HTTP SMS gateway. Anything but a 200 counts as a
/// failure.
#[derive(Clone)]
pub struct WebhookPublisher {
    client: reqwest::Client,
    url: String,
}

impl WebhookPublisher {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

impl Publisher for WebhookPublisher {
    async fn publish(&self, topic_arn: &str, message: &str) -> Result<(), PublishError> {
        let response = self
            .client
            .post(&self.url)
            .json(&GatewayMessage { topic_arn, message })
            .send()
            .await?;

        match response.status() {
            reqwest::StatusCode::OK => Ok(()),
            status => Err(PublishError::Status(status.as_u16())),
        }
    }
}

/// Only logs the message, for running without a gateway.
#[derive(Clone, Default)]
pub struct LogPublisher;

impl Publisher for LogPublisher {
    async fn publish(&self, topic_arn: &str, message: &str) -> Result<(), PublishError> {
        info!("📨 {} -> {}", topic_arn, message);
        Ok(())
    }
}

/// The publisher picked from the environment at startup
#[derive(Clone)]
pub enum SmsPublisher {
    Webhook(WebhookPublisher),
    Log(LogPublisher),
}

impl Publisher for SmsPublisher {
    async fn publish(&self, topic_arn: &str, message: &str) -> Result<(), PublishError> {
        match self {
            SmsPublisher::Webhook(publisher) => publisher.publish(topic_arn, message).await,
            SmsPublisher::Log(publisher) => publisher.publish(topic_arn, message).await,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RelayConfig {
    pub topic_arn: String,
    pub gateway_url: Option<String>,
    pub bind: SocketAddr,
}

impl RelayConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let topic_arn = lookup(TOPIC_ENV).with_context(|| format!("{} is not set", TOPIC_ENV))?;
        let gateway_url = lookup(GATEWAY_ENV).filter(|url| !url.is_empty());
        let bind = lookup(BIND_ENV)
            .unwrap_or_else(|| DEFAULT_BIND.to_string())
            .parse::<SocketAddr>()
            .with_context(|| format!("{} is not a socket address", BIND_ENV))?;

        Ok(Self {
            topic_arn,
            gateway_url,
            bind,
        })
    }

    pub fn publisher(&self) -> SmsPublisher {
        match &self.gateway_url {
            Some(url) => SmsPublisher::Webhook(WebhookPublisher::new(url.clone())),
            None => {
                warn!("⚠️  {} not set, messages will only be logged", GATEWAY_ENV);
                SmsPublisher::Log(LogPublisher)
            }
        }
    }
}

#[derive(Clone)]
pub struct AppState<P> {
    pub topic_arn: String,
    pub publisher: P,
}

pub fn router<P: Publisher>(state: AppState<P>) -> Router {
    Router::new()
        .route("/", post(relay_bare::<P>))
        .route("/:state", post(relay_state::<P>))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// The first sensors posted to the bare URL when the door opened
async fn relay_bare<P: Publisher>(State(state): State<AppState<P>>, body: Bytes) -> Response {
    relay(&state, Notification::Open, "/", &body).await
}

async fn relay_state<P: Publisher>(
    State(state): State<AppState<P>>,
    Path(door): Path<String>,
    body: Bytes,
) -> Response {
    let Ok(notification) = door.parse::<Notification>() else {
        warn!("Unknown mailbox state: {}", door);
        return (StatusCode::BAD_REQUEST, CORS_HEADERS, "unknown mailbox state").into_response();
    };
    relay(&state, notification, &format!("/{}", door), &body).await
}

async fn relay<P: Publisher>(
    state: &AppState<P>,
    notification: Notification,
    path: &str,
    body: &[u8],
) -> Response {
    info!(
        "📬 Event: POST {} ({} bytes) {}",
        path,
        body.len(),
        String::from_utf8_lossy(body)
    );

    if let Err(e) = state
        .publisher
        .publish(&state.topic_arn, notification.sms_text())
        .await
    {
        error!("Failed to publish {}: {}", notification, e);
        return (StatusCode::BAD_GATEWAY, CORS_HEADERS, "publish failed").into_response();
    }

    (
        StatusCode::OK,
        CORS_HEADERS,
        [(header::CONTENT_TYPE, "application/json")],
        ack_body_json(),
    )
        .into_response()
}

async fn health() -> StatusCode {
    StatusCode::OK
}
