//! Success payload shapes
//!
//! What the service returns on 2xx for each endpoint. Every field is
//! optional; the service has changed shape over time and the client takes
//! whatever it can use.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::classifier::Payload;

/// Reply to `POST /chat/rag`
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ChatReply {
    /// Answer text (current field name)
    #[serde(default)]
    pub result: Option<String>,
    /// Answer text (older field name)
    #[serde(default)]
    pub answer: Option<String>,
    /// Answer text (oldest field name)
    #[serde(default)]
    pub message: Option<String>,
    /// Chat id the service wants the client to use from now on
    #[serde(default)]
    pub chat_id: Option<String>,
    /// Token accounting, passed through for logs
    #[serde(default)]
    pub usage: Option<Value>,
}

impl ChatReply {
    /// First non-blank answer field
    #[must_use]
    pub fn answer(&self) -> Option<&str> {
        [&self.result, &self.answer, &self.message]
            .into_iter()
            .filter_map(|field| field.as_deref())
            .map(str::trim)
            .find(|text| !text.is_empty())
    }

    /// The returned chat id, if it is usable
    #[must_use]
    pub fn chat_id(&self) -> Option<&str> {
        self.chat_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

impl Payload for ChatReply {
    fn is_recognized(&self) -> bool {
        self.result.is_some()
            || self.answer.is_some()
            || self.message.is_some()
            || self.chat_id.is_some()
    }
}

/// Reply to `POST /files/upload`
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct UploadReceipt {
    /// Confirmation text
    #[serde(default)]
    pub message: Option<String>,
    /// Stored file name
    #[serde(default)]
    pub filename: Option<String>,
    /// Stored subject
    #[serde(default)]
    pub subject: Option<String>,
    /// Stored size in bytes
    #[serde(default)]
    pub size: Option<f64>,
    /// Remote id (current field name)
    #[serde(default)]
    pub file_id: Option<Value>,
    /// Remote id (older field name)
    #[serde(default)]
    pub id: Option<Value>,
    /// Upload time (current field name)
    #[serde(default)]
    pub uploaded_at: Option<Value>,
    /// Upload time (older field name)
    #[serde(default)]
    pub created_at: Option<Value>,
}

impl UploadReceipt {
    /// Remote document id, from `file_id` then `id`
    #[must_use]
    pub fn remote_id(&self) -> Option<String> {
        [&self.file_id, &self.id]
            .into_iter()
            .filter_map(Option::as_ref)
            .find_map(scalar_text)
    }

    /// Upload time, from `uploaded_at` then `created_at`
    #[must_use]
    pub fn uploaded_at(&self) -> Option<DateTime<Utc>> {
        [&self.uploaded_at, &self.created_at]
            .into_iter()
            .filter_map(Option::as_ref)
            .find_map(parse_timestamp)
    }

    /// Stored size, if the service reported a sane one
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn size_bytes(&self) -> Option<u64> {
        self.size
            .filter(|size| size.is_finite() && *size >= 0.0)
            .map(|size| size.round() as u64)
    }
}

impl Payload for UploadReceipt {}

/// Reply to `DELETE /files/delete/{id}`
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct DeleteReceipt {
    /// Confirmation text
    #[serde(default)]
    pub message: Option<String>,
}

impl Payload for DeleteReceipt {}

/// One record of a stored chat
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct HistoryRecord {
    /// `user`, `assistant`, or anything else
    #[serde(default)]
    pub role: String,
    /// Message text
    #[serde(default)]
    pub content: String,
    /// When it was said, in whatever format the service used
    #[serde(default)]
    pub timestamp: Option<Value>,
}

/// Reply to `GET /chat/history/{id}`
///
/// Either a bare array or an object wrapping one.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum HistoryPage {
    /// `[ {...}, ... ]`
    Records(Vec<HistoryRecord>),
    /// `{ "messages": [...] }`
    Messages {
        /// The records
        messages: Vec<HistoryRecord>,
    },
    /// `{ "history": [...] }`
    History {
        /// The records
        history: Vec<HistoryRecord>,
    },
}

impl HistoryPage {
    /// Records in the order the service sent them
    #[must_use]
    pub fn into_records(self) -> Vec<HistoryRecord> {
        match self {
            Self::Records(records)
            | Self::Messages { messages: records }
            | Self::History { history: records } => records,
        }
    }
}

impl Payload for HistoryPage {}

/// String or number as text
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Lenient timestamp parsing
///
/// Accepts RFC 3339, naive ISO 8601 (taken as UTC) and epoch seconds, either
/// as a number or a numeric string.
#[must_use]
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(text) => parse_timestamp_str(text.trim()),
        Value::Number(n) => n.as_f64().and_then(from_epoch_secs),
        _ => None,
    }
}

fn parse_timestamp_str(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    text.parse::<f64>().ok().and_then(from_epoch_secs)
}

#[allow(clippy::cast_possible_truncation)]
fn from_epoch_secs(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    DateTime::from_timestamp_millis((secs * 1000.0).round() as i64)
}
