use anyhow::{Context as _, Result};
use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

/// Best-effort sink for human-readable lifecycle events. Implementations
/// swallow their own failures; a lost notification never affects a task.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str);
}

/// Fallback sink that only writes to the log.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, text: &str) {
        info!("{text}");
    }
}

/// Posts to a Telegram chat; `topic_id` targets a forum thread within it.
pub struct TelegramNotifier {
    http: reqwest::Client,
    token: String,
    chat_id: String,
    topic_id: Option<i64>,
}

impl TelegramNotifier {
    pub fn new(token: String, chat_id: String, topic_id: Option<i64>) -> Self {
        Self {
            http: reqwest::Client::new(),
            token,
            chat_id,
            topic_id,
        }
    }

    async fn try_send(&self, text: &str) -> Result<()> {
        let mut body = json!({
            "chat_id": self.chat_id,
            "text": text,
        });
        if let Some(topic_id) = self.topic_id {
            body["message_thread_id"] = json!(topic_id);
        }

        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.token);
        self.http
            .post(url)
            .json(&body)
            .send()
            .await
            .context("post chat message")?
            .error_for_status()
            .context("chat api status")?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) {
        if let Err(err) = self.try_send(text).await {
            warn!(error = %format!("{err:#}"), "failed to send chat message");
        }
    }
}
