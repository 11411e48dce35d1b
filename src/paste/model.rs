//! Paste records and the views handed to callers.

use serde::{Deserialize, Serialize};

/// A stored paste.
///
/// Timestamps are unix seconds. A `delete_time` of 0 means the paste never
/// expires.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Paste {
    pub id: String,
    pub title: String,
    pub body: String,
    pub syntax: String,
    pub create_time: i64,
    pub delete_time: i64,
    pub one_use: bool,
    pub author: String,
    pub author_email: String,
    #[serde(rename = "authorURL")]
    pub author_url: String,
}

impl Paste {
    /// Build the record for `new` under a server-assigned id and create time.
    pub fn from_new(id: String, create_time: i64, new: NewPaste) -> Self {
        Self {
            id,
            title: new.title,
            body: new.body,
            syntax: new.syntax,
            create_time,
            delete_time: new.delete_time.max(0),
            one_use: new.one_use,
            author: new.author,
            author_email: new.author_email,
            author_url: new.author_url,
        }
    }

    /// Whether the paste has expired at unix time `now`.
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.delete_time > 0 && self.delete_time < now
    }
}

/// Caller-supplied fields of a new paste.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPaste {
    pub title: String,
    pub body: String,
    pub syntax: String,
    /// Absolute expiry in unix seconds; 0 or negative never expires
    pub delete_time: i64,
    pub one_use: bool,
    pub author: String,
    pub author_email: String,
    #[serde(rename = "authorURL")]
    pub author_url: String,
}

/// Server-assigned fields returned after a successful `add`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedPaste {
    pub id: String,
    pub create_time: i64,
    pub delete_time: i64,
}

impl From<&Paste> for CreatedPaste {
    fn from(paste: &Paste) -> Self {
        Self {
            id: paste.id.clone(),
            create_time: paste.create_time,
            delete_time: paste.delete_time,
        }
    }
}

/// Result of opening a paste.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasteView {
    /// The full record
    Full(Paste),
    /// A one-use paste that was not confirmed; carries the id only
    Redacted { id: String },
}

impl PasteView {
    pub fn id(&self) -> &str {
        match self {
            PasteView::Full(paste) => &paste.id,
            PasteView::Redacted { id } => id,
        }
    }

    pub fn is_redacted(&self) -> bool {
        matches!(self, PasteView::Redacted { .. })
    }

    /// The record as serialized to clients. Redacted views have every field
    /// except `id` and `oneUse` empty.
    pub fn into_paste(self) -> Paste {
        match self {
            PasteView::Full(paste) => paste,
            PasteView::Redacted { id } => Paste {
                id,
                one_use: true,
                ..Paste::default()
            },
        }
    }
}
