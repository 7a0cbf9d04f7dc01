//! Telegram webhook ingestion.
//!
//! Updates are decoded into [`Inbound`] and handed to the moderation
//! processor. The endpoint answers `200 {"ok": true}` no matter what, so the
//! platform never retries an update we already looked at.

use actix_web::{web, HttpResponse};
use gb_core::moderation::Inbound;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::handlers::AppState;

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

impl Update {
    /// Button presses win over text. Updates carrying neither, and presses
    /// whose originating message is unknown, are ignored.
    pub fn into_inbound(self) -> Option<Inbound> {
        if let Some(query) = self.callback_query {
            let message = query.message?;
            return Some(Inbound::Action {
                chat: message.chat.id,
                message_id: message.message_id,
                action_id: query.id,
                data: query.data.unwrap_or_default(),
            });
        }

        let message = self.message?;
        Some(Inbound::Text {
            chat: message.chat.id,
            message_id: message.message_id,
            text: message.text?,
        })
    }
}

/// `POST /api/telegram/webhook`
pub async fn telegram_webhook(data: web::Data<AppState>, body: web::Bytes) -> HttpResponse {
    match serde_json::from_slice::<Update>(&body) {
        Ok(update) => {
            let update_id = update.update_id;
            match update.into_inbound() {
                Some(inbound) => data.moderation.handle(inbound).await,
                None => debug!(update_id, "ignoring update without text or action"),
            }
        }
        Err(err) => warn!(error = %err, "undecodable telegram update"),
    }
    HttpResponse::Ok().json(json!({ "ok": true }))
}

/// `GET /api/telegram/webhook`
pub async fn method_not_allowed() -> HttpResponse {
    HttpResponse::MethodNotAllowed().json(json!({ "error": "Method not allowed" }))
}
