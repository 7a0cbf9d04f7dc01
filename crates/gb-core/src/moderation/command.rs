//! The operator command set and its two input surfaces.
//!
//! Slash commands typed into the chat and inline-button actions both end up
//! as a [`Command`]; the processor only ever executes commands.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An operation an inline button triggers. Serialized into callback data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Keep(Uuid),
    Publish(Uuid),
    Delete(Uuid),
    ConfirmNuke,
    CancelNuke,
}

impl Action {
    /// Callback data carried by the button, e.g. `delete_<uuid>`.
    pub fn callback_data(&self) -> String {
        match self {
            Self::Keep(id) => format!("keep_{id}"),
            Self::Publish(id) => format!("publish_{id}"),
            Self::Delete(id) => format!("delete_{id}"),
            Self::ConfirmNuke => "confirm_nuke".to_string(),
            Self::CancelNuke => "cancel_nuke".to_string(),
        }
    }

    /// Parses callback data. Unknown tags and malformed ids yield `None`.
    pub fn parse(data: &str) -> Option<Self> {
        match data {
            "confirm_nuke" => return Some(Self::ConfirmNuke),
            "cancel_nuke" => return Some(Self::CancelNuke),
            _ => {}
        }

        let (tag, id) = data.split_once('_')?;
        let id = Uuid::parse_str(id).ok()?;
        match tag {
            "keep" => Some(Self::Keep(id)),
            "publish" => Some(Self::Publish(id)),
            "delete" => Some(Self::Delete(id)),
            _ => None,
        }
    }
}

/// A labelled inline button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionControl {
    pub label: String,
    pub action: Action,
}

impl ActionControl {
    pub fn new(label: impl Into<String>, action: Action) -> Self {
        Self { label: label.into(), action }
    }
}

/// Every operation the operator can request.
///
/// Entry ids stay as typed text so a malformed id can be reported back
/// verbatim as "not found".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SetStatus(String),
    CurrentStatus,
    Pending,
    ListAll,
    Publish(String),
    Delete(String),
    Keep(String),
    NukeAll,
    ConfirmNuke,
    CancelNuke,
    Help,
    /// A known command typed without its required argument
    MissingArgument { usage: &'static str },
    Unknown,
}

impl Command {
    /// Parses chat text. Returns `None` for anything that is not a `/command`.
    ///
    /// Accepts the `/command@BotName` form group chats produce.
    pub fn parse_text(text: &str) -> Option<Self> {
        let text = text.trim();
        let body = text.strip_prefix('/')?;

        let (head, arg) = match body.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (body, ""),
        };
        let name = head.split('@').next().unwrap_or(head);

        let command = match name {
            "status" if arg.is_empty() => Self::MissingArgument {
                usage: "Please provide a status message.\n\nExample: /status Welcome to our home",
            },
            "status" => Self::SetStatus(arg.to_string()),
            "current" => Self::CurrentStatus,
            "pending" => Self::Pending,
            "list" => Self::ListAll,
            "publish" if arg.is_empty() => Self::MissingArgument {
                usage: "Please provide an entry ID.\n\nExample: /publish &lt;id&gt;",
            },
            "publish" => Self::Publish(arg.to_string()),
            "delete" if arg.is_empty() => Self::MissingArgument {
                usage: "Please provide an entry ID.\n\nExample: /delete &lt;id&gt;",
            },
            "delete" => Self::Delete(arg.to_string()),
            "nukeall" => Self::NukeAll,
            "help" | "start" => Self::Help,
            _ => Self::Unknown,
        };
        Some(command)
    }
}

impl From<Action> for Command {
    fn from(action: Action) -> Self {
        match action {
            Action::Keep(id) => Self::Keep(id.to_string()),
            Action::Publish(id) => Self::Publish(id.to_string()),
            Action::Delete(id) => Self::Delete(id.to_string()),
            Action::ConfirmNuke => Self::ConfirmNuke,
            Action::CancelNuke => Self::CancelNuke,
        }
    }
}
