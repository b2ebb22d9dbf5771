//! Document Library
//!
//! Local mirror of the documents the user has uploaded. Most recent first,
//! ids unique. Only the desk mutates it.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Document id, remote or locally generated
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Wrap an id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Placeholder id for documents the service did not name
    #[must_use]
    pub fn placeholder() -> Self {
        Self(format!("local-{}", Uuid::new_v4()))
    }

    /// The id as sent on the wire
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of a listed document
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentStatus {
    /// Listed normally
    Active,
    /// A delete is in flight
    Deleting,
}

/// One uploaded document
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentEntry {
    /// Remote id or placeholder
    pub id: DocumentId,
    /// File name
    pub name: String,
    /// Subject label
    pub subject: String,
    /// Size in bytes
    pub size_bytes: u64,
    /// When it was uploaded
    pub uploaded_at: DateTime<Utc>,
    status: DocumentStatus,
}

impl DocumentEntry {
    /// A freshly uploaded document
    pub fn new(
        id: DocumentId,
        name: impl Into<String>,
        subject: impl Into<String>,
        size_bytes: u64,
        uploaded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            subject: subject.into(),
            size_bytes,
            uploaded_at,
            status: DocumentStatus::Active,
        }
    }

    /// Current status
    #[must_use]
    pub fn status(&self) -> DocumentStatus {
        self.status
    }

    /// Size in megabytes with two decimals, e.g. `1.50 MB`
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn size_label(&self) -> String {
        format!("{:.2} MB", self.size_bytes as f64 / BYTES_PER_MB)
    }

    /// Upload date, e.g. `2024-03-01`
    #[must_use]
    pub fn date_label(&self) -> String {
        self.uploaded_at.format("%Y-%m-%d").to_string()
    }
}

/// Ordered, id-unique document list
#[derive(Clone, Debug, Default)]
pub struct DocumentLibrary {
    entries: Vec<DocumentEntry>,
}

impl DocumentLibrary {
    /// Create an empty library
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries, most recent first
    #[must_use]
    pub fn entries(&self) -> &[DocumentEntry] {
        &self.entries
    }

    /// Look up an entry
    #[must_use]
    pub fn get(&self, id: &DocumentId) -> Option<&DocumentEntry> {
        self.entries.iter().find(|entry| &entry.id == id)
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is listed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert at the front, replacing any entry with the same id
    ///
    /// A replaced entry that is mid-delete hands its `Deleting` status to
    /// the new one, so the pending delete stays the only one for that id.
    pub(crate) fn insert(&mut self, mut entry: DocumentEntry) {
        if let Some(index) = self.entries.iter().position(|e| e.id == entry.id) {
            let replaced = self.entries.remove(index);
            if replaced.status == DocumentStatus::Deleting {
                entry.status = DocumentStatus::Deleting;
            }
        }
        self.entries.insert(0, entry);
    }

    /// Set the status of an entry; returns false if it is not listed
    pub(crate) fn set_status(&mut self, id: &DocumentId, status: DocumentStatus) -> bool {
        match self.entries.iter_mut().find(|entry| &entry.id == id) {
            Some(entry) => {
                entry.status = status;
                true
            }
            None => false,
        }
    }

    /// Remove an entry
    pub(crate) fn remove(&mut self, id: &DocumentId) -> Option<DocumentEntry> {
        let index = self.entries.iter().position(|entry| &entry.id == id)?;
        Some(self.entries.remove(index))
    }
}
