//! # Notification Dispatcher
//!
//! Pushes new-entry and visitor alerts to the operator chat. Sends are
//! best-effort: failures are logged and never reach the caller.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{GuestbookEntry, PublicationPolicy, SiteInfo};
use crate::moderation::{Action, ActionControl};
use crate::sanitize::{escape, truncate_chars};
use crate::traits::{ChatChannel, ChatId};

#[derive(Clone)]
pub struct NotificationDispatcher {
    chat: Arc<dyn ChatChannel>,
    operator: ChatId,
    site: SiteInfo,
    policy: PublicationPolicy,
}

impl NotificationDispatcher {
    pub fn new(
        chat: Arc<dyn ChatChannel>,
        operator: ChatId,
        site: SiteInfo,
        policy: PublicationPolicy,
    ) -> Self {
        Self { chat, operator, site, policy }
    }

    /// Notifies in a detached task. The handle may be dropped; request paths do.
    pub fn dispatch(&self, entry: GuestbookEntry) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move { this.notify(&entry).await })
    }

    pub fn dispatch_visitor_alert(
        &self,
        path: String,
        at: DateTime<Utc>,
        ip_hash: String,
    ) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move { this.visitor_alert(&path, at, &ip_hash).await })
    }

    /// Sends the entry summary with its action controls, then the photo if any.
    pub async fn notify(&self, entry: &GuestbookEntry) {
        let text = self.entry_summary(entry);
        let controls = self.entry_controls(entry.id);
        match self.chat.send_text(self.operator, &text, None, &controls).await {
            Ok(()) => debug!(entry_id = %entry.id, "operator notified of new entry"),
            Err(err) => {
                let err = AppError::Transport(format!("{err:#}"));
                warn!(entry_id = %entry.id, error = %err, "failed to notify operator of new entry");
            }
        }

        // The photo goes separately; losing it must not undo the summary.
        if let Some(url) = &entry.photo_url {
            let caption = format!("Photo from {}", entry.name);
            if let Err(err) = self.chat.send_photo(self.operator, url, &caption).await {
                warn!(entry_id = %entry.id, error = %err, "failed to forward entry photo");
            }
        }
    }

    pub async fn visitor_alert(&self, path: &str, at: DateTime<Utc>, ip_hash: &str) {
        let text = format!(
            "🔔 <b>New Visitor Alert</b>\n\nSomeone just visited your homepage!\n\n\
             📍 Path: <code>{}</code>\n🕐 Time: {}\n🌍 IP Hash: <code>{}...</code>",
            escape(path),
            self.site.local_time(at),
            truncate_chars(ip_hash, 8)
        );
        if let Err(err) = self.chat.send_text(self.operator, &text, None, &[]).await {
            warn!(error = %err, "failed to send visitor alert");
        }
    }

    pub fn entry_summary(&self, entry: &GuestbookEntry) -> String {
        let mut text = format!("<b>New Guestbook Entry</b>\n\nFrom: {}\n", escape(&entry.name));
        if let Some(phone) = &entry.phone {
            text.push_str(&format!("Phone: {}\n", escape(phone)));
        }
        if entry.photo_url.is_some() {
            text.push_str("Photo: Yes\n");
        }
        text.push_str(&format!("\nMessage:\n\"{}\"\n\n", escape(&entry.message)));

        match self.policy {
            PublicationPolicy::Auto => text.push_str(&format!(
                "✅ <b>Published instantly</b> - Visible at: {}",
                self.site.guestbook_url()
            )),
            PublicationPolicy::Moderated => {
                text.push_str("⏳ <b>Awaiting approval</b> - publish or delete below")
            }
        }
        text
    }

    /// Buttons attached to a new-entry notification, carrying the entry id.
    pub fn entry_controls(&self, id: Uuid) -> Vec<ActionControl> {
        let first = match self.policy {
            PublicationPolicy::Auto => ActionControl::new("✅ Keep", Action::Keep(id)),
            PublicationPolicy::Moderated => ActionControl::new("✅ Publish", Action::Publish(id)),
        };
        vec![first, ActionControl::new("🗑️ Delete", Action::Delete(id))]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ChatCall, RecordingChat};

    fn entry(photo: Option<&str>) -> GuestbookEntry {
        GuestbookEntry {
            id: Uuid::now_v7(),
            name: "Ana <3".to_string(),
            phone: Some("+971 50".to_string()),
            message: "Hello there!".to_string(),
            photo_url: photo.map(str::to_string),
            published: true,
            created_at: Utc::now(),
        }
    }

    fn dispatcher(chat: Arc<RecordingChat>, policy: PublicationPolicy) -> NotificationDispatcher {
        NotificationDispatcher::new(chat, 99, SiteInfo::default(), policy)
    }

    #[tokio::test]
    async fn summary_carries_controls_with_entry_id() {
        let chat = Arc::new(RecordingChat::default());
        let entry = entry(None);
        dispatcher(chat.clone(), PublicationPolicy::Auto).notify(&entry).await;

        match &chat.calls()[..] {
            [ChatCall::Text { chat, text, controls, .. }] => {
                assert_eq!(*chat, 99);
                assert!(text.contains("From: Ana &lt;3"));
                assert!(text.contains("Phone: +971 50"));
                assert!(!text.contains("Photo: Yes"));
                assert!(text.contains("Published instantly"));
                assert_eq!(controls[0].action, Action::Keep(entry.id));
                assert_eq!(controls[1].action, Action::Delete(entry.id));
            }
            other => panic!("unexpected calls: {other:?}"),
        }
    }

    #[tokio::test]
    async fn moderated_policy_offers_publish() {
        let chat = Arc::new(RecordingChat::default());
        let d = dispatcher(chat, PublicationPolicy::Moderated);
        let id = Uuid::now_v7();
        assert_eq!(d.entry_controls(id)[0].action, Action::Publish(id));
    }

    #[tokio::test]
    async fn photo_is_sent_even_when_summary_fails() {
        let chat = Arc::new(RecordingChat::failing());
        dispatcher(chat.clone(), PublicationPolicy::Auto)
            .notify(&entry(Some("https://photos.test/a.jpg")))
            .await;

        let calls = chat.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[1],
            ChatCall::Photo {
                chat: 99,
                url: "https://photos.test/a.jpg".into(),
                caption: "Photo from Ana <3".into(),
            }
        );
    }

    #[tokio::test]
    async fn dispatch_runs_detached() {
        let chat = Arc::new(RecordingChat::default());
        let handle = dispatcher(chat.clone(), PublicationPolicy::Auto).dispatch(entry(None));
        handle.await.unwrap();
        assert_eq!(chat.texts().len(), 1);
    }

    #[tokio::test]
    async fn visitor_alert_shows_hash_prefix() {
        let chat = Arc::new(RecordingChat::default());
        dispatcher(chat.clone(), PublicationPolicy::Auto)
            .visitor_alert("/h", Utc::now(), "0123456789abcdef")
            .await;
        let text = &chat.texts()[0];
        assert!(text.contains("<code>01234567...</code>"));
        assert!(text.contains("<code>/h</code>"));
    }
}
