//! # Submission Gateway
//!
//! Validates and sanitises a guest message, applies the rate limit, stores
//! the optional photo and the entry, then hands the entry to the notifier.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{error, info};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{GuestbookEntry, NewEntry, PhotoUpload, PublicationPolicy, Submission};
use crate::notify::NotificationDispatcher;
use crate::rate_limit::FixedWindowLimiter;
use crate::sanitize::{char_len, truncate_chars};
use crate::traits::{GuestbookRepo, PhotoStore};

pub const MAX_NAME_CHARS: usize = 100;
pub const MAX_PHONE_CHARS: usize = 20;
pub const MAX_MESSAGE_CHARS: usize = 1000;
pub const MIN_MESSAGE_CHARS: usize = 3;
pub const MAX_PHOTO_BYTES: usize = 5 * 1024 * 1024;

/// Declared content types accepted for photos.
pub const ALLOWED_PHOTO_TYPES: [&str; 5] =
    ["image/jpeg", "image/jpg", "image/png", "image/webp", "image/heic"];

/// Submissions allowed per identity within one window.
#[derive(Debug, Clone, Copy)]
pub struct SubmissionLimits {
    pub max_per_window: u32,
    pub window: Duration,
}

impl Default for SubmissionLimits {
    fn default() -> Self {
        Self {
            max_per_window: 5,
            window: Duration::from_secs(3600),
        }
    }
}

/// Text fields after trimming and truncation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanFields {
    pub name: String,
    pub phone: Option<String>,
    pub message: String,
}

pub struct SubmissionGateway {
    entries: Arc<dyn GuestbookRepo>,
    photos: Arc<dyn PhotoStore>,
    limiter: Arc<FixedWindowLimiter>,
    notifier: NotificationDispatcher,
    policy: PublicationPolicy,
    limits: SubmissionLimits,
}

impl SubmissionGateway {
    pub fn new(
        entries: Arc<dyn GuestbookRepo>,
        photos: Arc<dyn PhotoStore>,
        limiter: Arc<FixedWindowLimiter>,
        notifier: NotificationDispatcher,
        policy: PublicationPolicy,
    ) -> Self {
        Self {
            entries,
            photos,
            limiter,
            notifier,
            policy,
            limits: SubmissionLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: SubmissionLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Runs the whole submission. Nothing is stored unless every step passes;
    /// the operator notification is fire-and-forget.
    pub async fn submit(&self, identity: &str, submission: Submission) -> Result<GuestbookEntry> {
        let decision = self
            .limiter
            .check(identity, self.limits.max_per_window, self.limits.window);
        if !decision.allowed {
            info!("guestbook submission rate limited");
            return Err(AppError::RateLimited);
        }

        let fields = clean_fields(&submission.name, submission.phone.as_deref(), &submission.message)?;

        let photo_url = match submission.photo.filter(|p| !p.data.is_empty()) {
            Some(photo) => Some(self.store_photo(photo).await?),
            None => None,
        };

        let entry = self
            .entries
            .create_entry(NewEntry {
                name: fields.name,
                phone: fields.phone,
                message: fields.message,
                photo_url,
                published: self.policy.publishes_on_submit(),
            })
            .await
            .map_err(|err| {
                error!(error = %err, "failed to insert guestbook entry");
                AppError::storage(err)
            })?;

        info!(
            entry_id = %entry.id,
            published = entry.published,
            has_photo = entry.photo_url.is_some(),
            remaining = decision.remaining,
            "guestbook entry created"
        );

        // Detached: the handle is dropped so the request does not wait.
        drop(self.notifier.dispatch(entry.clone()));
        Ok(entry)
    }

    async fn store_photo(&self, photo: PhotoUpload) -> Result<String> {
        validate_photo(&photo)?;
        let file_name = photo_file_name(&photo, Utc::now());
        let url = self
            .photos
            .save_photo(&file_name, photo.data.to_vec(), &photo.content_type)
            .await
            .map_err(|err| {
                error!(file_name = %file_name, error = %err, "photo upload failed");
                AppError::storage(err)
            })?;
        info!(file_name = %file_name, bytes = photo.data.len(), "photo stored");
        Ok(url)
    }
}

/// Trims and truncates the text fields, enforcing presence and minimum length.
pub fn clean_fields(name: &str, phone: Option<&str>, message: &str) -> Result<CleanFields> {
    let name = name.trim();
    let message = message.trim();
    if name.is_empty() || message.is_empty() {
        return Err(AppError::Validation("Name and message are required.".to_string()));
    }

    let message = truncate_chars(message, MAX_MESSAGE_CHARS);
    if char_len(message) < MIN_MESSAGE_CHARS {
        return Err(AppError::Validation(format!(
            "Message must be at least {MIN_MESSAGE_CHARS} characters."
        )));
    }

    let phone = phone
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| truncate_chars(p, MAX_PHONE_CHARS).to_string());

    Ok(CleanFields {
        name: truncate_chars(name, MAX_NAME_CHARS).to_string(),
        phone,
        message: message.to_string(),
    })
}

pub fn validate_photo(photo: &PhotoUpload) -> Result<()> {
    if photo.data.len() > MAX_PHOTO_BYTES {
        return Err(AppError::PhotoTooLarge { max_bytes: MAX_PHOTO_BYTES });
    }
    let declared = photo.content_type.trim().to_ascii_lowercase();
    if !ALLOWED_PHOTO_TYPES.contains(&declared.as_str()) {
        return Err(AppError::UnsupportedPhotoType(photo.content_type.clone()));
    }
    Ok(())
}

/// `<unix-millis>-<8 hex>.<ext>`: the time prefix orders uploads and the
/// random part keeps concurrent uploads apart.
pub fn photo_file_name(photo: &PhotoUpload, now: DateTime<Utc>) -> String {
    let suffix: String = Uuid::new_v4().simple().to_string().chars().take(8).collect();
    format!("{}-{}.{}", now.timestamp_millis(), suffix, photo_extension(photo))
}

/// Derived from the validated content type only; the guest's file name
/// never reaches the stored name.
fn photo_extension(photo: &PhotoUpload) -> &'static str {
    match photo.content_type.trim().to_ascii_lowercase().as_str() {
        "image/png" => "png",
        "image/webp" => "webp",
        "image/heic" => "heic",
        _ => "jpg",
    }
}
