//! Validation and normalization of paste submissions.

use serde::{Deserialize, Deserializer, Serialize};

use super::model::NewPaste;
use crate::config::PasteConfig;
use crate::error::{GuardError, Result};

/// Maximum length of each author field, in characters.
pub const AUTHOR_FIELD_MAX_LENGTH: usize = 100;

/// Syntax used when the submission names none.
pub const DEFAULT_SYNTAX: &str = "plaintext";

/// Line ending the stored body should use.
///
/// Serialized as the form values `LF`, `CRLF` and `CR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LineEnd {
    #[default]
    Lf,
    CrLf,
    Cr,
}

impl LineEnd {
    /// Parse a form value. An empty value selects `Lf`.
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "" | "LF" | "lf" => Ok(LineEnd::Lf),
            "CRLF" | "crlf" => Ok(LineEnd::CrLf),
            "CR" | "cr" => Ok(LineEnd::Cr),
            other => Err(GuardError::BadRequest(format!("unknown line end {:?}", other))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LineEnd::Lf => "\n",
            LineEnd::CrLf => "\r\n",
            LineEnd::Cr => "\r",
        }
    }

    /// The line ending used most in `text`, if it has any line breaks.
    ///
    /// A `\r\n` pair counts as one CRLF only, never as a lone CR or LF as well.
    pub fn detect(text: &str) -> Option<Self> {
        let crlf = text.matches("\r\n").count();
        let cr = text.matches('\r').count() - crlf;
        let lf = text.matches('\n').count() - crlf;

        if crlf == 0 && cr == 0 && lf == 0 {
            None
        } else if crlf >= cr && crlf >= lf {
            Some(LineEnd::CrLf)
        } else if cr >= lf {
            Some(LineEnd::Cr)
        } else {
            Some(LineEnd::Lf)
        }
    }

    /// Rewrite the dominant line ending of `text` to `self`.
    ///
    /// Every occurrence of the dominant ending's sequence is replaced. Endings
    /// that do not contain that sequence are left as they are.
    pub fn convert(&self, text: &str) -> String {
        match LineEnd::detect(text) {
            Some(found) if found != *self => text.replace(found.as_str(), self.as_str()),
            _ => text.to_string(),
        }
    }
}

/// A paste submission as received from a client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasteDraft {
    #[serde(default)]
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub syntax: String,
    /// Lifetime in seconds from now; `None` or 0 never expires
    #[serde(default)]
    pub lifetime_secs: Option<i64>,
    #[serde(default, deserialize_with = "deserialize_line_end")]
    pub line_end: LineEnd,
    #[serde(default)]
    pub one_use: bool,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub author_email: String,
    #[serde(default, rename = "authorURL")]
    pub author_url: String,
}

impl PasteDraft {
    /// A draft holding only a body.
    pub fn with_body(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    /// Validate against `limits` and produce the record to store.
    ///
    /// `now` is the unix time a lifetime is counted from.
    pub fn validate(self, limits: &PasteConfig, now: i64) -> Result<NewPaste> {
        let title: String = self
            .title
            .chars()
            .filter(|c| *c != '\n' && *c != '\r')
            .map(|c| if c == '\t' { ' ' } else { c })
            .collect();
        check_length("title", &title, limits.title_max_length)?;

        if self.body.is_empty() {
            return Err(GuardError::BadRequest("body is empty".to_string()));
        }
        check_length("body", &self.body, limits.body_max_length)?;
        let body = self.line_end.convert(&self.body);

        let syntax = if self.syntax.is_empty() {
            DEFAULT_SYNTAX.to_string()
        } else {
            self.syntax
        };
        if !limits.allowed_syntaxes.is_empty() && !limits.allowed_syntaxes.contains(&syntax) {
            return Err(GuardError::BadRequest(format!("unknown syntax {:?}", syntax)));
        }

        let delete_time = resolve_delete_time(self.lifetime_secs, limits.max_lifetime_secs, now)?;

        check_length("author", &self.author, AUTHOR_FIELD_MAX_LENGTH)?;
        check_length("author email", &self.author_email, AUTHOR_FIELD_MAX_LENGTH)?;
        check_length("author URL", &self.author_url, AUTHOR_FIELD_MAX_LENGTH)?;

        Ok(NewPaste {
            title,
            body,
            syntax,
            delete_time,
            one_use: self.one_use,
            author: self.author,
            author_email: self.author_email,
            author_url: self.author_url,
        })
    }
}

fn deserialize_line_end<'de, D>(deserializer: D) -> std::result::Result<LineEnd, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    LineEnd::parse(&value).map_err(serde::de::Error::custom)
}

fn check_length(field: &str, value: &str, max: usize) -> Result<()> {
    if max > 0 && value.chars().count() > max {
        return Err(GuardError::PayloadTooLarge(format!(
            "{} longer than {} characters",
            field, max
        )));
    }
    Ok(())
}

fn resolve_delete_time(lifetime: Option<i64>, max_lifetime: u64, now: i64) -> Result<i64> {
    let lifetime = lifetime.unwrap_or(0);

    if max_lifetime > 0 {
        let max = i64::try_from(max_lifetime).unwrap_or(i64::MAX);
        if lifetime <= 0 || lifetime > max {
            return Err(GuardError::BadRequest(format!(
                "lifetime must be between 1 and {} seconds",
                max
            )));
        }
    }

    if lifetime > 0 {
        Ok(now.saturating_add(lifetime))
    } else {
        Ok(0)
    }
}
