//! Alert delivery
//!
//! Alerts go out as a JSON POST to an operator-configured webhook. Email
//! delivery is expected to come from a mail relay (SMTP gateway) that sits
//! behind that webhook and mails `message` to `recipient` under `subject`.
//! Chat or incident tools can take the same payload. Delivery is
//! fire-and-forget: a failed send is logged and never affects the sync cycle.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::domain::services::AlertNotifier;
use crate::infrastructure::config::AlertConfig;
use crate::infrastructure::http_client::HttpClient;

#[derive(Debug, Serialize)]
struct AlertMessage<'a> {
    subject: &'a str,
    message: &'a str,
    recipient: &'a str,
}

pub struct WebhookAlertNotifier {
    http: HttpClient,
    webhook_url: String,
    recipient: String,
}

impl WebhookAlertNotifier {
    pub fn new(http: HttpClient, webhook_url: impl Into<String>, recipient: impl Into<String>) -> Self {
        Self {
            http: http.with_context_label("alert"),
            webhook_url: webhook_url.into(),
            recipient: recipient.into(),
        }
    }
}

#[async_trait]
impl AlertNotifier for WebhookAlertNotifier {
    async fn notify(&self, subject: &str, message: &str) {
        let body = AlertMessage {
            subject,
            message,
            recipient: &self.recipient,
        };
        let request = self.http.post(&self.webhook_url).json(&body);

        match self.http.send(request).await {
            Ok(_) => info!("📣 Alert sent: {}", subject),
            Err(e) => error!("❌ Failed to send alert '{}': {}", subject, e),
        }
    }
}

/// Used when alerting is switched off; the alert only reaches the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogOnlyAlertNotifier;

#[async_trait]
impl AlertNotifier for LogOnlyAlertNotifier {
    async fn notify(&self, subject: &str, message: &str) {
        warn!("🚨 {}\n{}", subject, message);
    }
}

/// Pick the notifier for the configured alert channel
pub fn notifier_from_config(http: HttpClient, config: &AlertConfig) -> Arc<dyn AlertNotifier> {
    if config.enabled && !config.webhook_url.trim().is_empty() {
        Arc::new(WebhookAlertNotifier::new(http, &config.webhook_url, &config.recipient))
    } else {
        Arc::new(LogOnlyAlertNotifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn alert_carries_the_fields_a_mail_relay_needs() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hooks/sync"))
            .and(body_json(json!({
                "subject": "Catalog sync: 2 item(s) failed",
                "message": "details",
                "recipient": "ops@example.com"
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let config = AlertConfig {
            enabled: true,
            webhook_url: format!("{}/hooks/sync", server.uri()),
            recipient: "ops@example.com".to_string(),
        };
        notifier_from_config(HttpClient::default(), &config)
            .notify("Catalog sync: 2 item(s) failed", "details")
            .await;
    }

    #[tokio::test]
    async fn delivery_failure_is_swallowed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = WebhookAlertNotifier::new(HttpClient::default(), server.uri(), "");
        notifier.notify("subject", "message").await;
    }

    #[tokio::test]
    async fn disabled_alerting_never_touches_the_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let config = AlertConfig {
            enabled: false,
            webhook_url: server.uri(),
            recipient: String::new(),
        };
        notifier_from_config(HttpClient::default(), &config)
            .notify("subject", "message")
            .await;
    }
}
