use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::Notifier;
use crate::error::BotError;
use crate::settings::TelegramConfig;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Sends messages through the Telegram Bot API
#[derive(Clone)]
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
}

impl TelegramNotifier {
    pub fn new(config: &TelegramConfig) -> Result<Self, BotError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| BotError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base: config
                .api_url
                .clone()
                .unwrap_or_else(|| TELEGRAM_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            bot_token: config.bot_token.clone(),
            chat_id: config.chat_id.clone(),
        })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    /// Endpoint: POST /bot{token}/sendMessage
    async fn send_message(&self, text: &str) -> Result<(), BotError> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);

        let response = self
            .client
            .post(&url)
            .json(&SendMessageRequest {
                chat_id: &self.chat_id,
                text,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(BotError::TransientNetwork(format!(
                "Telegram API error: {}",
                response.status()
            )));
        }

        Ok(())
    }
}
