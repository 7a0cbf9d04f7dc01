//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be used by the binary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{EntryFilter, GuestbookEntry, NewEntry, ScanEvent, SiteStatus};
use crate::moderation::ActionControl;

/// Identifier of a chat on the operator's messaging platform.
pub type ChatId = i64;

/// Data persistence contract for guestbook entries.
///
/// Single-row operations are assumed atomic; nothing spans several tables.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait GuestbookRepo: Send + Sync {
    /// Inserts the entry, assigning its id and creation time.
    async fn create_entry(&self, entry: NewEntry) -> anyhow::Result<GuestbookEntry>;

    /// Published entries, newest first.
    async fn list_published(&self, limit: i64) -> anyhow::Result<Vec<GuestbookEntry>>;

    /// Entries for the operator, newest first.
    async fn list_entries(&self, filter: EntryFilter, limit: i64)
        -> anyhow::Result<Vec<GuestbookEntry>>;

    /// Returns the updated entry, or `None` when the id does not exist.
    async fn set_published(&self, id: Uuid, published: bool)
        -> anyhow::Result<Option<GuestbookEntry>>;

    async fn get_entry(&self, id: Uuid) -> anyhow::Result<Option<GuestbookEntry>>;

    /// Hard delete. Returns the removed row, or `None` when it was already gone.
    async fn delete_entry(&self, id: Uuid) -> anyhow::Result<Option<GuestbookEntry>>;

    async fn count_entries(&self) -> anyhow::Result<u64>;

    /// Deletes every entry and returns how many rows went away.
    async fn delete_all(&self) -> anyhow::Result<u64>;
}

/// Contract for the singleton site banner.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait StatusRepo: Send + Sync {
    async fn get_status(&self) -> anyhow::Result<Option<SiteStatus>>;
    async fn set_status(&self, message: &str, at: DateTime<Utc>) -> anyhow::Result<SiteStatus>;
}

/// Append-only log of visitor pings.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ScanRepo: Send + Sync {
    async fn record_scan(&self, event: ScanEvent) -> anyhow::Result<()>;
    async fn count_scans(&self) -> anyhow::Result<u64>;
}

/// Blob storage contract for guest photos.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PhotoStore: Send + Sync {
    /// Stores the bytes under `file_name` and returns a publicly resolvable URL.
    async fn save_photo(
        &self,
        file_name: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> anyhow::Result<String>;
}

/// Push side of the operator's chat platform.
///
/// Message text uses the small HTML subset chat clients render
/// (`<b>`, `<i>`, `<code>`); callers escape user-provided text.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ChatChannel: Send + Sync {
    /// Sends a text message, optionally threaded and carrying action controls.
    async fn send_text(
        &self,
        chat: ChatId,
        text: &str,
        reply_to: Option<i64>,
        controls: &[ActionControl],
    ) -> anyhow::Result<()>;

    async fn send_photo(&self, chat: ChatId, photo_url: &str, caption: &str)
        -> anyhow::Result<()>;

    /// Removes every action control from a previously sent message.
    async fn clear_controls(&self, chat: ChatId, message_id: i64) -> anyhow::Result<()>;

    /// Acknowledges an action so the client stops its spinner.
    async fn answer_action(&self, action_id: &str, text: &str) -> anyhow::Result<()>;
}

/// Identity and authorization contract.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait IdentityProvider: Send + Sync {
    /// One-way digest of an identifying value (IP address, user agent).
    fn digest(&self, value: &str) -> String;

    /// Key identifying one visitor (network origin plus client software).
    fn visitor_key(&self, ip: &str, user_agent: &str) -> String {
        self.digest(&format!("{ip}:{user_agent}"))
    }

    /// Whether moderation commands from this chat are honoured.
    fn is_operator(&self, chat: ChatId) -> bool;
}
