//! # Moderation Command Processor
//!
//! Executes operator commands arriving from the chat platform against the
//! entry and status stores, then replies on the same channel.

mod command;

pub use command::{Action, ActionControl, Command};

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{EntryFilter, GuestbookEntry, SiteInfo, SiteStatus};
use crate::sanitize::{char_len, escape, preview, strip_html_tags};
use crate::traits::{ChatChannel, ChatId, GuestbookRepo, IdentityProvider, StatusRepo};

pub const MAX_STATUS_CHARS: usize = 250;
const PREVIEW_CHARS: usize = 100;
/// Telegram rejects `sendMessage` text longer than this. Counting the raw
/// HTML keeps the visible text under it too.
pub const MAX_REPLY_CHARS: usize = 4096;
/// Room kept for the "not shown" footer.
const LISTING_FOOTER_CHARS: usize = 64;

/// An update received from the chat platform, already stripped of transport detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Text {
        chat: ChatId,
        message_id: i64,
        text: String,
    },
    Action {
        chat: ChatId,
        message_id: i64,
        action_id: String,
        data: String,
    },
}

/// What executing a command produced, independent of the input surface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    pub text: Option<String>,
    pub controls: Vec<ActionControl>,
    /// Short acknowledgement shown for button presses
    pub ack: Option<String>,
    /// Remove the buttons from the originating message
    pub retract: bool,
}

impl Outcome {
    fn reply(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), ..Self::default() }
    }

    fn with_controls(mut self, controls: Vec<ActionControl>) -> Self {
        self.controls = controls;
        self
    }

    fn acknowledged(mut self, ack: &str) -> Self {
        self.ack = Some(ack.to_string());
        self
    }

    fn retracting(mut self) -> Self {
        self.retract = true;
        self
    }
}

/// Page sizes for the operator listings.
#[derive(Debug, Clone, Copy)]
pub struct ListingPages {
    pub pending: i64,
    pub all: i64,
}

impl Default for ListingPages {
    fn default() -> Self {
        Self { pending: 10, all: 50 }
    }
}

pub struct ModerationProcessor {
    entries: Arc<dyn GuestbookRepo>,
    status: Arc<dyn StatusRepo>,
    chat: Arc<dyn ChatChannel>,
    identity: Arc<dyn IdentityProvider>,
    site: SiteInfo,
    pages: ListingPages,
}

impl ModerationProcessor {
    pub fn new(
        entries: Arc<dyn GuestbookRepo>,
        status: Arc<dyn StatusRepo>,
        chat: Arc<dyn ChatChannel>,
        identity: Arc<dyn IdentityProvider>,
        site: SiteInfo,
    ) -> Self {
        Self {
            entries,
            status,
            chat,
            identity,
            site,
            pages: ListingPages::default(),
        }
    }

    pub fn with_pages(mut self, pages: ListingPages) -> Self {
        self.pages = pages;
        self
    }

    /// Processes one inbound update. Never fails: every problem is logged or
    /// reported back to the operator.
    pub async fn handle(&self, inbound: Inbound) {
        match inbound {
            Inbound::Text { chat, message_id, text } => {
                if !self.identity.is_operator(chat) {
                    debug!(chat, "ignoring message from unauthorised chat");
                    return;
                }
                let Some(command) = Command::parse_text(&text) else {
                    return;
                };
                debug!(chat, ?command, "executing operator command");

                let outcome = self.execute(command).await;
                if let Some(text) = outcome.text {
                    self.send(chat, &text, Some(message_id), &outcome.controls).await;
                }
            }
            Inbound::Action { chat, message_id, action_id, data } => {
                if !self.identity.is_operator(chat) {
                    warn!(chat, "action from unauthorised chat");
                    self.answer(&action_id, "Unauthorized").await;
                    return;
                }
                let Some(action) = Action::parse(&data) else {
                    debug!(chat, data = %data, "unrecognised action");
                    self.answer(&action_id, "Done").await;
                    return;
                };

                let outcome = self.execute(action.into()).await;
                if outcome.retract {
                    if let Err(err) = self.chat.clear_controls(chat, message_id).await {
                        warn!(chat, message_id, error = %err, "failed to retract action controls");
                    }
                }
                self.answer(&action_id, outcome.ack.as_deref().unwrap_or("Done")).await;
                if let Some(text) = outcome.text {
                    self.send(chat, &text, None, &outcome.controls).await;
                }
            }
        }
    }

    /// Runs a command against the stores and describes the reply.
    pub async fn execute(&self, command: Command) -> Outcome {
        match command {
            Command::SetStatus(raw) => match self.set_status(&raw).await {
                Ok(status) => Outcome::reply(format!(
                    "Status updated.\n\nNew message:\n\"{}\"\n\nLive at: {}",
                    escape(&status.message),
                    self.site.home_url()
                )),
                Err(AppError::Validation(msg)) => Outcome::reply(msg),
                Err(_) => Outcome::reply("Failed to update status. Please try again."),
            },
            Command::CurrentStatus => match self.current_status().await {
                Ok(Some(status)) => Outcome::reply(format!(
                    "Current status message:\n\n\"{}\"\n\nLast updated: {}",
                    escape(&status.message),
                    self.site.local_time(status.updated_at)
                )),
                Ok(None) => Outcome::reply("No status message has been set yet."),
                Err(_) => Outcome::reply("Failed to fetch current status."),
            },
            Command::Pending => self.listing(EntryFilter::Unpublished, self.pages.pending).await,
            Command::ListAll => self.listing(EntryFilter::All, self.pages.all).await,
            Command::Publish(raw) => match self.publish_entry(&raw).await {
                Ok(entry) => Outcome::reply(format!(
                    "Entry published.\n\nFrom: {}\nMessage: \"{}\"\n\nNow visible at: {}",
                    escape(&entry.name),
                    escape(&preview(&entry.message, PREVIEW_CHARS)),
                    self.site.guestbook_url()
                ))
                .acknowledged("Published")
                .retracting(),
                Err(err) => Self::failed("publish", &raw, &err),
            },
            Command::Delete(raw) => match self.delete_entry(&raw).await {
                Ok(entry) => Outcome::reply(format!("Entry deleted.\n\nFrom: {}", escape(&entry.name)))
                    .acknowledged("Deleted")
                    .retracting(),
                Err(err) => Self::failed("delete", &raw, &err),
            },
            Command::Keep(raw) => match self.keep_entry(&raw).await {
                Ok(entry) => Outcome::reply(format!(
                    "Entry kept.\n\nFrom: {}\nMessage: \"{}\"",
                    escape(&entry.name),
                    escape(&preview(&entry.message, PREVIEW_CHARS))
                ))
                .acknowledged("Kept"),
                Err(err) => Self::failed("keep", &raw, &err),
            },
            Command::NukeAll => match self.count_entries().await {
                Ok(0) => Outcome::reply("No guestbook entries to delete."),
                Ok(count) => Outcome::reply(format!(
                    "<b>Warning:</b> this will permanently delete all {count} guestbook entries.\n\nAre you sure?"
                ))
                .with_controls(vec![
                    ActionControl::new("Yes, delete all", Action::ConfirmNuke),
                    ActionControl::new("Cancel", Action::CancelNuke),
                ]),
                Err(_) => Outcome::reply("Failed to count guestbook entries."),
            },
            Command::ConfirmNuke => match self.nuke_all().await {
                Ok(0) => Outcome::reply("No guestbook entries to delete.")
                    .acknowledged("Nothing to delete")
                    .retracting(),
                Ok(count) => Outcome::reply(format!("Deleted {count} guestbook entries."))
                    .acknowledged("Deleted")
                    .retracting(),
                Err(_) => Outcome::reply("Failed to delete guestbook entries. Please try again.")
                    .acknowledged("Failed"),
            },
            Command::CancelNuke => Outcome::reply("Cancelled. No entries were deleted.")
                .acknowledged("Cancelled")
                .retracting(),
            Command::Help => Outcome::reply(help_text()),
            Command::MissingArgument { usage } => Outcome::reply(usage),
            Command::Unknown => {
                Outcome::reply("Unknown command. Send /help for available commands.")
            }
        }
    }

    /// Strips tags, validates length and stores the new banner.
    pub async fn set_status(&self, raw: &str) -> Result<SiteStatus> {
        let message = validate_status(raw)?;
        let status = self
            .status
            .set_status(&message, Utc::now())
            .await
            .map_err(|err| {
                error!(error = %err, "failed to update site status");
                AppError::storage(err)
            })?;
        info!(chars = char_len(&status.message), "site status updated");
        Ok(status)
    }

    pub async fn current_status(&self) -> Result<Option<SiteStatus>> {
        self.status.get_status().await.map_err(|err| {
            error!(error = %err, "failed to read site status");
            AppError::storage(err)
        })
    }

    pub async fn publish_entry(&self, raw_id: &str) -> Result<GuestbookEntry> {
        let id = parse_entry_id(raw_id)?;
        let entry = self
            .entries
            .set_published(id, true)
            .await
            .map_err(|err| store_failure("publish", id, err))?
            .ok_or_else(|| AppError::entry_not_found(raw_id))?;
        info!(entry_id = %id, "entry published");
        Ok(entry)
    }

    /// Hard delete. A replay for an id that is already gone yields `NotFound`.
    pub async fn delete_entry(&self, raw_id: &str) -> Result<GuestbookEntry> {
        let id = parse_entry_id(raw_id)?;
        let entry = self
            .entries
            .delete_entry(id)
            .await
            .map_err(|err| store_failure("delete", id, err))?
            .ok_or_else(|| AppError::entry_not_found(raw_id))?;
        info!(entry_id = %id, "entry deleted");
        Ok(entry)
    }

    /// Confirms the entry still exists without changing it.
    pub async fn keep_entry(&self, raw_id: &str) -> Result<GuestbookEntry> {
        let id = parse_entry_id(raw_id)?;
        self.entries
            .get_entry(id)
            .await
            .map_err(|err| store_failure("read", id, err))?
            .ok_or_else(|| AppError::entry_not_found(raw_id))
    }

    pub async fn count_entries(&self) -> Result<u64> {
        self.entries.count_entries().await.map_err(|err| {
            error!(error = %err, "failed to count entries");
            AppError::storage(err)
        })
    }

    /// Deletes every entry. Only reachable through the confirm control.
    pub async fn nuke_all(&self) -> Result<u64> {
        let deleted = self.entries.delete_all().await.map_err(|err| {
            error!(error = %err, "bulk delete failed");
            AppError::storage(err)
        })?;
        warn!(deleted, "all guestbook entries deleted by operator");
        Ok(deleted)
    }

    async fn listing(&self, filter: EntryFilter, limit: i64) -> Outcome {
        let entries = match self.entries.list_entries(filter, limit).await {
            Ok(entries) => entries,
            Err(err) => {
                error!(error = %err, ?filter, "failed to list entries");
                return Outcome::reply("Failed to fetch guestbook entries.");
            }
        };

        let (title, empty) = match filter {
            EntryFilter::Unpublished => ("Pending Guestbook Entries", "No pending entries."),
            EntryFilter::All => ("Guestbook Entries", "No guestbook entries."),
        };
        if entries.is_empty() {
            return Outcome::reply(empty);
        }

        let mut text = format!("<b>{title} ({}):</b>\n\n", entries.len());
        let budget = MAX_REPLY_CHARS - LISTING_FOOTER_CHARS;
        let mut shown = 0;
        for (index, entry) in entries.iter().enumerate() {
            let block = self.listing_block(index + 1, entry, filter);
            if char_len(&text) + char_len(&block) > budget {
                break;
            }
            text.push_str(&block);
            shown += 1;
        }

        let omitted = entries.len() - shown;
        if omitted > 0 {
            debug!(shown, omitted, "listing truncated to fit one message");
            text.push_str(&format!("... and {omitted} more not shown."));
        }
        Outcome::reply(text.trim_end().to_string())
    }

    fn listing_block(&self, position: usize, entry: &GuestbookEntry, filter: EntryFilter) -> String {
        let mut block = format!("{position}. {}", escape(&entry.name));
        if let Some(phone) = &entry.phone {
            block.push_str(&format!(" ({})", escape(phone)));
        }
        if filter == EntryFilter::All {
            block.push_str(if entry.published { " [live]" } else { " [hidden]" });
        }
        block.push_str(&format!(
            "\n   \"{}\"\n   Date: {} | ID: <code>{}</code>\n   ",
            escape(&preview(&entry.message, PREVIEW_CHARS)),
            entry.created_at.with_timezone(&self.site.utc_offset).format("%b %-d, %Y"),
            entry.id
        ));
        if !entry.published {
            block.push_str(&format!("/publish {} | ", entry.id));
        }
        block.push_str(&format!("/delete {}\n\n", entry.id));
        block
    }

    fn failed(verb: &str, raw_id: &str, err: &AppError) -> Outcome {
        match err {
            AppError::NotFound(..) => Outcome::reply(format!(
                "Failed to {verb} entry. Entry ID {} not found.",
                escape(raw_id)
            ))
            .acknowledged("Entry not found"),
            _ => Outcome::reply(format!("Failed to {verb} entry. Please try again."))
                .acknowledged("Failed"),
        }
    }

    async fn send(&self, chat: ChatId, text: &str, reply_to: Option<i64>, controls: &[ActionControl]) {
        if let Err(err) = self.chat.send_text(chat, text, reply_to, controls).await {
            let err = AppError::Transport(format!("{err:#}"));
            warn!(chat, error = %err, "failed to send operator reply");
        }
    }

    async fn answer(&self, action_id: &str, text: &str) {
        if let Err(err) = self.chat.answer_action(action_id, text).await {
            warn!(action_id, error = %err, "failed to acknowledge action");
        }
    }
}

/// Sanitises a banner message: tags removed, then 1..=250 characters.
pub fn validate_status(raw: &str) -> Result<String> {
    let stripped = strip_html_tags(raw);
    let message = stripped.trim();

    if message.is_empty() {
        return Err(AppError::Validation(
            "Invalid message content. Please avoid using HTML tags.".to_string(),
        ));
    }
    let len = char_len(message);
    if len > MAX_STATUS_CHARS {
        return Err(AppError::Validation(format!(
            "Message too long ({len}/{MAX_STATUS_CHARS} characters). Please shorten it."
        )));
    }
    Ok(message.to_string())
}

fn parse_entry_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::entry_not_found(raw))
}

fn store_failure(op: &str, id: Uuid, err: anyhow::Error) -> AppError {
    error!(entry_id = %id, op, error = %err, "entry store operation failed");
    AppError::storage(err)
}

fn help_text() -> String {
    [
        "<b>Guestbook Management Bot</b>",
        "",
        "<b>Available Commands:</b>",
        "/status &lt;message&gt; - Update homepage banner",
        "/current - View current status",
        "/pending - View pending guestbook entries",
        "/list - View all guestbook entries",
        "/publish &lt;id&gt; - Publish a guestbook entry",
        "/delete &lt;id&gt; - Delete a guestbook entry",
        "/nukeall - Delete every guestbook entry (asks first)",
        "/help - Show this message",
        "",
        "<b>Status Message Rules:</b>",
        "• Maximum 250 characters",
        "• HTML tags will be removed",
        "",
        "<b>Examples:</b>",
        "/status Welcome to our home. We're here all weekend.",
        "/status Currently away, back on Monday.",
    ]
    .join("\n")
}
