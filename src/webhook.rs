//! Intake of onboarding requests coming from the service catalog.
//!
//! The catalog posts an envelope around the [OnboardingRequest]. Accepted envelopes are turned into
//! a [Notification] and forwarded to the workflow engine, which later calls back the control
//! endpoints. Nothing here touches the collector configuration.
use crate::fragment::OnboardingRequest;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use duration_str::deserialize_duration;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const DEFAULT_NOTIFIER_URL: &str = "http://localhost:5678/webhook/otel-automation";
pub const DEFAULT_BLUEPRINT: &str = "observability-request";
pub const NOTIFICATION_SOURCE: &str = "port";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(thiserror::Error, Debug)]
pub enum WebhookError {
    #[error("invalid blueprint `{0}`")]
    InvalidBlueprint(String),

    #[error("invalid notifier url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("could not build the notifier client: {0}")]
    Build(String),

    #[error("could not reach the notifier: {0}")]
    Send(String),

    #[error("notifier answered with status {0}")]
    UnexpectedStatus(u16),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WebhookConfig {
    /// Endpoint receiving the forwarded notifications.
    #[serde(default = "default_notifier_url")]
    pub notifier_url: String,
    /// Only envelopes created from this blueprint are accepted.
    #[serde(default = "default_blueprint")]
    pub blueprint: String,
    #[serde(default = "default_timeout", deserialize_with = "deserialize_duration")]
    pub timeout: Duration,
}

fn default_notifier_url() -> String {
    DEFAULT_NOTIFIER_URL.to_string()
}

fn default_blueprint() -> String {
    DEFAULT_BLUEPRINT.to_string()
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            notifier_url: default_notifier_url(),
            blueprint: default_blueprint(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WebhookEnvelope {
    pub context: EnvelopeContext,
    pub payload: EnvelopePayload,
    pub action: EnvelopeAction,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EnvelopeContext {
    #[serde(default)]
    pub entity: Option<String>,
    pub blueprint: String,
    #[serde(rename = "runId")]
    pub run_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EnvelopePayload {
    pub properties: OnboardingRequest,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EnvelopeAction {
    pub identifier: String,
    #[serde(default)]
    pub title: String,
}

/// Message sent to the workflow engine.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Notification {
    pub request_id: String,
    pub action: String,
    pub request: OnboardingRequest,
    pub source: String,
    pub timestamp: String,
}

impl WebhookEnvelope {
    /// Checks the envelope comes from `expected_blueprint` and builds the notification for it.
    pub fn into_notification(
        self,
        expected_blueprint: &str,
        now: DateTime<Utc>,
    ) -> Result<Notification, WebhookError> {
        if self.context.blueprint != expected_blueprint {
            return Err(WebhookError::InvalidBlueprint(self.context.blueprint));
        }
        Ok(Notification {
            request_id: self.context.run_id,
            action: self.action.identifier,
            request: self.payload.properties,
            source: NOTIFICATION_SOURCE.to_string(),
            timestamp: now.to_rfc3339(),
        })
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationForwarder: Send + Sync {
    async fn forward(&self, notification: &Notification) -> Result<(), WebhookError>;
}

/// Posts notifications as JSON to the configured url.
#[derive(Debug)]
pub struct HttpForwarder {
    client: reqwest::Client,
    url: Url,
}

impl HttpForwarder {
    pub fn try_new(config: &WebhookConfig) -> Result<Self, WebhookError> {
        let url = Url::parse(&config.notifier_url).map_err(|err| WebhookError::InvalidUrl {
            url: config.notifier_url.clone(),
            reason: err.to_string(),
        })?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| WebhookError::Build(err.to_string()))?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl NotificationForwarder for HttpForwarder {
    async fn forward(&self, notification: &Notification) -> Result<(), WebhookError> {
        let response = self
            .client
            .post(self.url.clone())
            .json(notification)
            .send()
            .await
            .map_err(|err| WebhookError::Send(err.to_string()))?;

        match response.status() {
            StatusCode::OK => {
                debug!(request_id = %notification.request_id, "notification forwarded to {}", self.url);
                Ok(())
            }
            status => Err(WebhookError::UnexpectedStatus(status.as_u16())),
        }
    }
}
