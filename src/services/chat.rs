use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::error::{AppError, Result};

const CHAT_API_URL: &str = "https://api.telegram.org";

/// Delivers a formatted message (minimal HTML hyperlink markup) to a channel.
#[async_trait]
pub trait ChatSink: Send + Sync {
    async fn send_message(&self, channel_id: &str, text: &str) -> Result<()>;
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

pub struct ChatClient {
    client: Client,
    bot_token: String,
}

impl ChatClient {
    pub fn new(bot_token: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, bot_token }
    }
}

#[async_trait]
impl ChatSink for ChatClient {
    async fn send_message(&self, channel_id: &str, text: &str) -> Result<()> {
        let request = SendMessageRequest {
            chat_id: channel_id,
            text,
            parse_mode: "HTML",
        };

        let response = self
            .client
            .post(format!(
                "{CHAT_API_URL}/bot{}/sendMessage",
                self.bot_token
            ))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(AppError::ChatApi(format!("API error: {error_text}")));
        }

        Ok(())
    }
}
