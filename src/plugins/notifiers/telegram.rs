use crate::config::TelegramConfig;
use crate::plugins::traits::{NotifierPlugin, NotificationMessage, NotificationResult};
use crate::utils::error::{AppError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct TelegramSettings {
    pub bot_token: String,
    pub chat_id: String,
    pub api_base_url: String,
    pub timeout: Duration,
}

impl TelegramSettings {
    /// `None` unless both token and chat id are present.
    pub fn from_config(config: &TelegramConfig) -> Option<Self> {
        if !config.is_configured() {
            return None;
        }

        Some(TelegramSettings {
            bot_token: config.bot_token.clone()?,
            chat_id: config.chat_id.clone()?,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.timeout_seconds),
        })
    }
}

/// Bot API envelope: `{"ok": true, "result": {...}}` or
/// `{"ok": false, "error_code": 400, "description": "..."}`.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    result: Option<SentMessage>,
    error_code: Option<u16>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

pub struct TelegramNotifier {
    client: Client,
    settings: TelegramSettings,
}

impl TelegramNotifier {
    pub fn new(settings: TelegramSettings) -> Result<Self> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(TelegramNotifier { client, settings })
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.settings.api_base_url, self.settings.bot_token)
    }

    fn create_payload(&self, message: &NotificationMessage) -> serde_json::Value {
        json!({
            "chat_id": self.settings.chat_id,
            "text": message.text(),
            "disable_web_page_preview": true
        })
    }
}

#[async_trait]
impl NotifierPlugin for TelegramNotifier {
    fn name(&self) -> &str {
        "Telegram Notifier"
    }

    fn plugin_type(&self) -> &str {
        "telegram"
    }

    fn description(&self) -> &str {
        "Posts alerts to a Telegram chat through the Bot API"
    }

    async fn notify(&self, message: &NotificationMessage) -> Result<NotificationResult> {
        let payload = self.create_payload(message);

        // The endpoint embeds the bot token; keep it out of error messages.
        let response = self
            .client
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::notification(self.plugin_type(), e.without_url()))?;

        let status = response.status();
        let body: ApiResponse = response.json().await.map_err(|e| {
            AppError::notification(
                self.plugin_type(),
                format!("unreadable response (HTTP {}): {}", status, e.without_url()),
            )
        })?;

        if !body.ok {
            return Err(AppError::notification(
                self.plugin_type(),
                format!(
                    "Bot API error {}: {}",
                    body.error_code.unwrap_or(status.as_u16()),
                    body.description.unwrap_or_else(|| "no description".to_string())
                ),
            ));
        }

        Ok(NotificationResult::delivered(
            body.result.map(|sent| format!("telegram-{}", sent.message_id)),
            1,
        ))
    }
}
