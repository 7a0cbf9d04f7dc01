//! # gb-telegram
//!
//! `ChatChannel` over the Telegram Bot HTTP API. Owns transport details only:
//! endpoint construction, JSON payloads and mapping of API-level failures.
//! The bot token is part of every URL, so reqwest errors are stripped of
//! their URL before they are reported.

mod dto;

use std::time::Duration;

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use gb_core::moderation::ActionControl;
use gb_core::traits::{ChatChannel, ChatId};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::debug;

use dto::{
    AnswerCallbackQuery, ApiResponse, EditReplyMarkup, InlineKeyboard, SendMessage, SendPhoto,
};

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

pub struct TelegramChannel {
    client: Client,
    api_base: String,
    token: SecretString,
}

impl TelegramChannel {
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(
        api_base: impl Into<String>,
        token: SecretString,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        let api_base: String = api_base.into();
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token.expose_secret(), method)
    }

    async fn call<T: Serialize + Sync>(&self, method: &str, payload: &T) -> anyhow::Result<()> {
        let response = self
            .client
            .post(self.method_url(method))
            .json(payload)
            .send()
            .await
            .map_err(|err| anyhow!("{method} request failed: {}", err.without_url()))?;

        let status = response.status();
        let body: ApiResponse = response
            .json()
            .await
            .map_err(|err| anyhow!("{method} returned an unreadable body ({status}): {}", err.without_url()))?;

        if !body.ok {
            bail!(
                "{method} rejected ({status}): {}",
                body.description.unwrap_or_else(|| "no description".to_string())
            );
        }
        debug!(method, "telegram call succeeded");
        Ok(())
    }
}

#[async_trait]
impl ChatChannel for TelegramChannel {
    async fn send_text(
        &self,
        chat: ChatId,
        text: &str,
        reply_to: Option<i64>,
        controls: &[ActionControl],
    ) -> anyhow::Result<()> {
        let payload = SendMessage {
            chat_id: chat,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
            reply_to_message_id: reply_to,
            reply_markup: InlineKeyboard::from_controls(controls),
        };
        self.call("sendMessage", &payload).await
    }

    async fn send_photo(&self, chat: ChatId, photo_url: &str, caption: &str) -> anyhow::Result<()> {
        let payload = SendPhoto { chat_id: chat, photo: photo_url, caption };
        self.call("sendPhoto", &payload).await
    }

    async fn clear_controls(&self, chat: ChatId, message_id: i64) -> anyhow::Result<()> {
        let payload = EditReplyMarkup {
            chat_id: chat,
            message_id,
            reply_markup: InlineKeyboard::default(),
        };
        self.call("editMessageReplyMarkup", &payload).await
    }

    async fn answer_action(&self, action_id: &str, text: &str) -> anyhow::Result<()> {
        let payload = AnswerCallbackQuery { callback_query_id: action_id, text };
        self.call("answerCallbackQuery", &payload).await
    }
}
