use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use tracing::{info, warn};

use crate::models::decision::{DeliveryResult, ReschedulePayload};

#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Delivers one reschedule request. Failures are reported in the result, never retried.
    async fn dispatch(&self, payload: &ReschedulePayload) -> DeliveryResult;
}

/// Wire shape of the webhook body.
#[derive(Debug, Serialize)]
pub struct WebhookPayload<'a> {
    pub email: &'a str,
    pub subject: &'a str,
    pub message: &'a str,
}

impl<'a> From<&'a ReschedulePayload> for WebhookPayload<'a> {
    fn from(payload: &'a ReschedulePayload) -> Self {
        Self {
            email: &payload.sender,
            subject: &payload.subject,
            message: &payload.body,
        }
    }
}

pub struct WebhookDispatcher {
    http: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl WebhookDispatcher {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            timeout,
        }
    }
}

#[async_trait]
impl Dispatcher for WebhookDispatcher {
    async fn dispatch(&self, payload: &ReschedulePayload) -> DeliveryResult {
        let body = WebhookPayload::from(payload);
        let response = self
            .http
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(err) => {
                let detail = if err.is_timeout() {
                    format!("request timed out after {:?}", self.timeout)
                } else {
                    format!("transport error: {}", err)
                };
                warn!(endpoint = %self.endpoint, %detail, "reschedule request not delivered");
                return DeliveryResult::failed(None, detail);
            }
        };

        let status = response.status();
        if status == StatusCode::OK {
            info!(to = %payload.sender, "reschedule request sent");
            return DeliveryResult::delivered(status.as_u16(), "Response email sent successfully");
        }

        let body = response.text().await;
        warn!(status = status.as_u16(), "webhook rejected reschedule request");
        DeliveryResult::failed(Some(status.as_u16()), failure_detail(status.as_u16(), body))
    }
}

fn failure_detail<E: std::fmt::Display>(status: u16, body: Result<String, E>) -> String {
    let response = match body {
        Ok(text) => text,
        Err(err) => format!("<unreadable response body: {}>", err),
    };
    format!("Failed to send email. Status code: {}. Response: {}", status, response)
}
