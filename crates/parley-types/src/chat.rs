//! Chat session, message, and attachment types for Parley.
//!
//! These types model the client-side conversation history: sessions,
//! messages (user-authored or persona replies), uploaded attachments, and
//! the snapshot that is persisted as one unit after every mutation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Current layout version of [`ConversationSnapshot`].
pub const SNAPSHOT_VERSION: u32 = 1;

/// Kind of an uploaded attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    File,
}

impl AttachmentKind {
    /// Classify a filename by extension. Unknown extensions are files.
    pub fn from_filename(name: &str) -> Self {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "png" | "jpg" | "jpeg" | "gif" | "webp" | "svg" => AttachmentKind::Image,
            _ => AttachmentKind::File,
        }
    }
}

impl fmt::Display for AttachmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttachmentKind::Image => write!(f, "image"),
            AttachmentKind::File => write!(f, "file"),
        }
    }
}

impl FromStr for AttachmentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "image" => Ok(AttachmentKind::Image),
            "file" => Ok(AttachmentKind::File),
            other => Err(format!("invalid attachment kind: '{other}'")),
        }
    }
}

/// A file or image that has been uploaded to the object store.
///
/// Only constructed from a completed upload, so `url` always resolves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub kind: AttachmentKind,
    pub url: String,
    pub name: String,
    pub storage_key: String,
    pub size_bytes: u64,
}

/// Display identity attached to a simulated reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaRef {
    pub id: String,
    pub name: String,
}

/// A single message within a chat session. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub text: String,
    pub is_user: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona: Option<PersonaRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl ChatMessage {
    /// A user-authored text message.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            text: text.into(),
            is_user: true,
            timestamp: Utc::now(),
            persona: None,
            attachments: Vec::new(),
        }
    }

    /// A user-authored message carrying uploaded attachments.
    pub fn user_with_attachments(text: impl Into<String>, attachments: Vec<Attachment>) -> Self {
        Self {
            attachments,
            ..Self::user(text)
        }
    }

    /// A reply authored by a persona.
    pub fn persona(persona: PersonaRef, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            text: text.into(),
            is_user: false,
            timestamp: Utc::now(),
            persona: Some(persona),
            attachments: Vec::new(),
        }
    }
}

/// A named, ordered conversation thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: Uuid,
    pub name: String,
    pub messages: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatSession {
    /// Create an empty session named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Lightweight listing view of this session.
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id,
            name: self.name.clone(),
            message_count: self.messages.len(),
            updated_at: self.updated_at,
            preview: self.messages.last().map(|m| preview_text(&m.text)),
        }
    }
}

/// Maximum characters of the last message shown in a session listing.
const PREVIEW_CHARS: usize = 48;

fn preview_text(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

/// Session listing entry, ordered most recently updated first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: Uuid,
    pub name: String,
    pub message_count: usize,
    pub updated_at: DateTime<Utc>,
    pub preview: Option<String>,
}

/// The unit of durable client-side state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSnapshot {
    pub version: u32,
    pub sessions: Vec<ChatSession>,
    pub active_session_id: Option<Uuid>,
    /// Next ordinal used to name a new session ("Chat N").
    #[serde(default = "default_ordinal")]
    pub next_ordinal: u32,
}

fn default_ordinal() -> u32 {
    1
}

impl Default for ConversationSnapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            sessions: Vec::new(),
            active_session_id: None,
            next_ordinal: default_ordinal(),
        }
    }
}
