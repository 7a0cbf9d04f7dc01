//! # Domain Models
//!
//! These structs represent the core entities of the guestbook.
//! Entry ids are UUID v7 so they sort by creation time.

use bytes::Bytes;
use chrono::{DateTime, Offset, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single guestbook submission as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestbookEntry {
    pub id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    /// Always 3..=1000 characters.
    pub message: String,
    /// Public URL of the uploaded photo, if one was attached
    pub photo_url: Option<String>,
    /// Controls public visibility
    pub published: bool,
    pub created_at: DateTime<Utc>,
}

/// A validated entry ready to be inserted. The store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    pub name: String,
    pub phone: Option<String>,
    pub message: String,
    pub photo_url: Option<String>,
    pub published: bool,
}

/// The public view of an entry returned by the listing endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct PublicEntry {
    pub id: Uuid,
    pub name: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub photo_url: Option<String>,
}

impl From<GuestbookEntry> for PublicEntry {
    fn from(entry: GuestbookEntry) -> Self {
        Self {
            id: entry.id,
            name: entry.name,
            message: entry.message,
            created_at: entry.created_at,
            photo_url: entry.photo_url,
        }
    }
}

/// Singleton banner shown on the site's home page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteStatus {
    pub message: String,
    pub updated_at: DateTime<Utc>,
}

/// A privacy-preserving record of a visitor landing on the site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEvent {
    pub path: String,
    pub ip_hash: String,
    pub ua_hash: String,
}

/// Raw guest input as received from the form.
#[derive(Debug, Clone, Default)]
pub struct Submission {
    pub name: String,
    pub phone: Option<String>,
    pub message: String,
    pub photo: Option<PhotoUpload>,
}

/// An attached photo before validation.
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    /// File name supplied by the browser, used only for its extension
    pub file_name: Option<String>,
    /// Declared MIME type (e.g. `image/png`)
    pub content_type: String,
    pub data: Bytes,
}

/// Which entries a moderation listing should include.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryFilter {
    Unpublished,
    All,
}

/// Whether new entries go live immediately or wait for the operator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublicationPolicy {
    /// Entries are inserted with `published = true`.
    #[default]
    Auto,
    /// Entries are inserted hidden and must be published from the operator chat.
    Moderated,
}

impl PublicationPolicy {
    pub fn publishes_on_submit(self) -> bool {
        matches!(self, Self::Auto)
    }
}

/// Public links and display settings used when composing operator messages.
#[derive(Debug, Clone)]
pub struct SiteInfo {
    /// e.g. `https://example.org`, without trailing slash
    pub public_base_url: String,
    pub utc_offset: chrono::FixedOffset,
    /// Label printed after local times, e.g. `GST`
    pub zone_label: String,
}

impl SiteInfo {
    pub fn home_url(&self) -> String {
        format!("{}/h", self.public_base_url)
    }

    pub fn guestbook_url(&self) -> String {
        format!("{}/h/guestbook", self.public_base_url)
    }

    /// Formats a timestamp as e.g. `Mar 4, 2026, 6:05 PM GST`.
    pub fn local_time(&self, at: DateTime<Utc>) -> String {
        let local = at.with_timezone(&self.utc_offset);
        format!("{} {}", local.format("%b %-d, %Y, %-I:%M %p"), self.zone_label)
    }
}

impl Default for SiteInfo {
    fn default() -> Self {
        Self {
            public_base_url: "http://localhost:8080".to_string(),
            utc_offset: Utc.fix(),
            zone_label: "UTC".to_string(),
        }
    }
}
