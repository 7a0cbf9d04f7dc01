//! Bot API request and response bodies.

use gb_core::moderation::ActionControl;
use gb_core::traits::ChatId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub(crate) struct SendMessage<'a> {
    pub chat_id: ChatId,
    pub text: &'a str,
    pub parse_mode: &'static str,
    pub disable_web_page_preview: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to_message_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<InlineKeyboard>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SendPhoto<'a> {
    pub chat_id: ChatId,
    pub photo: &'a str,
    pub caption: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct EditReplyMarkup {
    pub chat_id: ChatId,
    pub message_id: i64,
    pub reply_markup: InlineKeyboard,
}

#[derive(Debug, Serialize)]
pub(crate) struct AnswerCallbackQuery<'a> {
    pub callback_query_id: &'a str,
    pub text: &'a str,
}

#[derive(Debug, Default, Serialize)]
pub(crate) struct InlineKeyboard {
    pub inline_keyboard: Vec<Vec<InlineButton>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct InlineButton {
    pub text: String,
    pub callback_data: String,
}

impl InlineKeyboard {
    /// All controls on a single row; `None` when there are none.
    pub fn from_controls(controls: &[ActionControl]) -> Option<Self> {
        if controls.is_empty() {
            return None;
        }
        let row = controls
            .iter()
            .map(|c| InlineButton {
                text: c.label.clone(),
                callback_data: c.action.callback_data(),
            })
            .collect();
        Some(Self { inline_keyboard: vec![row] })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiResponse {
    pub ok: bool,
    #[serde(default)]
    pub description: Option<String>,
}
