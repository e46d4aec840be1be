use anyhow::Context;
use std::future::Future;

/// Somewhere a finished report can be sent.
pub trait NotificationSink {
    fn send(&self, text: &str) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// Posts to a Slack-compatible incoming webhook.
#[derive(Debug, Clone)]
pub struct SlackWebhookSink {
    client: reqwest::Client,
    webhook_url: String,
}

impl SlackWebhookSink {
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url: webhook_url.into(),
        }
    }
}

impl NotificationSink for SlackWebhookSink {
    async fn send(&self, text: &str) -> anyhow::Result<()> {
        self.client
            .post(&self.webhook_url)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .context("Failed to reach the webhook")?
            .error_for_status()
            .context("Webhook rejected the message")?;

        Ok(())
    }
}

/// Prints the report, for when no webhook is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

impl NotificationSink for StdoutSink {
    async fn send(&self, text: &str) -> anyhow::Result<()> {
        println!("{}", text);
        Ok(())
    }
}

/// Send once. A failed delivery is logged and otherwise ignored.
pub async fn deliver<S: NotificationSink>(sink: &S, text: &str) {
    match sink.send(text).await {
        Ok(()) => log::info!("Report delivered"),
        Err(e) => log::warn!("Failed to deliver report: {:?}", e),
    }
}
