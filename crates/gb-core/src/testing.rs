//! In-memory port doubles shared by unit and integration tests.
//!
//! Enabled for this crate's tests and for other crates via the `testing` feature.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::models::{EntryFilter, GuestbookEntry, NewEntry, ScanEvent, SiteStatus};
use crate::moderation::ActionControl;
use crate::traits::{ChatChannel, ChatId, GuestbookRepo, IdentityProvider, PhotoStore, ScanRepo, StatusRepo};

/// Entry, status and scan store kept in a few mutex-guarded vectors.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<Vec<GuestbookEntry>>,
    status: Mutex<Option<SiteStatus>>,
    scans: Mutex<Vec<ScanEvent>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts entries whose creation times increase in list order.
    pub fn seeded(count: usize) -> Self {
        let store = Self::new();
        {
            let mut entries = store.entries.lock().unwrap();
            let base = Utc::now() - Duration::minutes(count as i64);
            for i in 0..count {
                entries.push(GuestbookEntry {
                    id: Uuid::now_v7(),
                    name: format!("Guest {i}"),
                    phone: None,
                    message: format!("Message number {i}"),
                    photo_url: None,
                    published: true,
                    created_at: base + Duration::minutes(i as i64),
                });
            }
        }
        store
    }

    pub fn entries(&self) -> Vec<GuestbookEntry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn scans(&self) -> Vec<ScanEvent> {
        self.scans.lock().unwrap().clone()
    }

    /// Every call fails while set.
    pub fn set_unavailable(&self, down: bool) {
        self.unavailable.store(down, Ordering::SeqCst);
    }

    fn check(&self) -> anyhow::Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(anyhow!("store unavailable"))
        } else {
            Ok(())
        }
    }

    fn newest_first(mut entries: Vec<GuestbookEntry>, limit: i64) -> Vec<GuestbookEntry> {
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries.truncate(usize::try_from(limit).unwrap_or(0));
        entries
    }
}

#[async_trait]
impl GuestbookRepo for MemoryStore {
    async fn create_entry(&self, entry: NewEntry) -> anyhow::Result<GuestbookEntry> {
        self.check()?;
        let created = GuestbookEntry {
            id: Uuid::now_v7(),
            name: entry.name,
            phone: entry.phone,
            message: entry.message,
            photo_url: entry.photo_url,
            published: entry.published,
            created_at: Utc::now(),
        };
        self.entries.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn list_published(&self, limit: i64) -> anyhow::Result<Vec<GuestbookEntry>> {
        self.check()?;
        let published = self.entries().into_iter().filter(|e| e.published).collect();
        Ok(Self::newest_first(published, limit))
    }

    async fn list_entries(&self, filter: EntryFilter, limit: i64) -> anyhow::Result<Vec<GuestbookEntry>> {
        self.check()?;
        let selected = self
            .entries()
            .into_iter()
            .filter(|e| filter == EntryFilter::All || !e.published)
            .collect();
        Ok(Self::newest_first(selected, limit))
    }

    async fn set_published(&self, id: Uuid, published: bool) -> anyhow::Result<Option<GuestbookEntry>> {
        self.check()?;
        let mut entries = self.entries.lock().unwrap();
        Ok(entries.iter_mut().find(|e| e.id == id).map(|e| {
            e.published = published;
            e.clone()
        }))
    }

    async fn get_entry(&self, id: Uuid) -> anyhow::Result<Option<GuestbookEntry>> {
        self.check()?;
        Ok(self.entries().into_iter().find(|e| e.id == id))
    }

    async fn delete_entry(&self, id: Uuid) -> anyhow::Result<Option<GuestbookEntry>> {
        self.check()?;
        let mut entries = self.entries.lock().unwrap();
        Ok(entries.iter().position(|e| e.id == id).map(|idx| entries.remove(idx)))
    }

    async fn count_entries(&self) -> anyhow::Result<u64> {
        self.check()?;
        Ok(self.entries.lock().unwrap().len() as u64)
    }

    async fn delete_all(&self) -> anyhow::Result<u64> {
        self.check()?;
        let mut entries = self.entries.lock().unwrap();
        let count = entries.len() as u64;
        entries.clear();
        Ok(count)
    }
}

#[async_trait]
impl StatusRepo for MemoryStore {
    async fn get_status(&self) -> anyhow::Result<Option<SiteStatus>> {
        self.check()?;
        Ok(self.status.lock().unwrap().clone())
    }

    async fn set_status(&self, message: &str, at: DateTime<Utc>) -> anyhow::Result<SiteStatus> {
        self.check()?;
        let status = SiteStatus { message: message.to_string(), updated_at: at };
        *self.status.lock().unwrap() = Some(status.clone());
        Ok(status)
    }
}

#[async_trait]
impl ScanRepo for MemoryStore {
    async fn record_scan(&self, event: ScanEvent) -> anyhow::Result<()> {
        self.check()?;
        self.scans.lock().unwrap().push(event);
        Ok(())
    }

    async fn count_scans(&self) -> anyhow::Result<u64> {
        self.check()?;
        Ok(self.scans.lock().unwrap().len() as u64)
    }
}

/// Photo store that remembers uploads and returns `https://photos.test/<name>`.
#[derive(Default)]
pub struct MemoryPhotos {
    pub saved: Mutex<Vec<(String, usize, String)>>,
    pub failing: bool,
}

#[async_trait]
impl PhotoStore for MemoryPhotos {
    async fn save_photo(&self, file_name: &str, data: Vec<u8>, content_type: &str) -> anyhow::Result<String> {
        if self.failing {
            return Err(anyhow!("bucket unavailable"));
        }
        self.saved
            .lock()
            .unwrap()
            .push((file_name.to_string(), data.len(), content_type.to_string()));
        Ok(format!("https://photos.test/{file_name}"))
    }
}

/// Something the recording chat was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCall {
    Text {
        chat: ChatId,
        text: String,
        reply_to: Option<i64>,
        controls: Vec<ActionControl>,
    },
    Photo {
        chat: ChatId,
        url: String,
        caption: String,
    },
    ClearControls {
        chat: ChatId,
        message_id: i64,
    },
    Answer {
        action_id: String,
        text: String,
    },
}

/// Chat double that records every call. When `failing` is set each call is
/// still recorded but returns an error.
#[derive(Default)]
pub struct RecordingChat {
    calls: Mutex<Vec<ChatCall>>,
    pub failing: bool,
}

impl RecordingChat {
    pub fn failing() -> Self {
        Self { failing: true, ..Self::default() }
    }

    pub fn calls(&self) -> Vec<ChatCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ChatCall::Text { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: ChatCall) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push(call);
        if self.failing {
            Err(anyhow!("chat unreachable"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ChatChannel for RecordingChat {
    async fn send_text(
        &self,
        chat: ChatId,
        text: &str,
        reply_to: Option<i64>,
        controls: &[ActionControl],
    ) -> anyhow::Result<()> {
        self.record(ChatCall::Text {
            chat,
            text: text.to_string(),
            reply_to,
            controls: controls.to_vec(),
        })
    }

    async fn send_photo(&self, chat: ChatId, photo_url: &str, caption: &str) -> anyhow::Result<()> {
        self.record(ChatCall::Photo {
            chat,
            url: photo_url.to_string(),
            caption: caption.to_string(),
        })
    }

    async fn clear_controls(&self, chat: ChatId, message_id: i64) -> anyhow::Result<()> {
        self.record(ChatCall::ClearControls { chat, message_id })
    }

    async fn answer_action(&self, action_id: &str, text: &str) -> anyhow::Result<()> {
        self.record(ChatCall::Answer {
            action_id: action_id.to_string(),
            text: text.to_string(),
        })
    }
}

/// Identity double: digests are `h(<value>)`, one operator chat.
pub struct FixedIdentity {
    pub operator: ChatId,
}

impl IdentityProvider for FixedIdentity {
    fn digest(&self, value: &str) -> String {
        format!("h({value})")
    }

    fn is_operator(&self, chat: ChatId) -> bool {
        chat == self.operator
    }
}
