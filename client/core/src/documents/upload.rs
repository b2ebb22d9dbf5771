//! Upload Coordinator
//!
//! Local precondition checks and the mapping from a classified upload
//! outcome to a library entry or a failure. The desk owns dispatch.

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::library::{DocumentEntry, DocumentId};
use crate::backend::LocalFile;
use crate::classifier::Outcome;
use crate::payload::UploadReceipt;

/// Subject used when the user does not give one
pub const DEFAULT_SUBJECT: &str = "General";

/// Confirmation shown when the service sends none
pub const DEFAULT_UPLOAD_MESSAGE: &str = "File uploaded successfully";

/// Upload refused before any network call
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum UploadRejection {
    /// Nothing selected
    #[error("no file selected")]
    NoFile,
    /// Not a PDF by name
    #[error("only PDF files are supported: {name}")]
    NotPdf {
        /// Selected file name
        name: String,
    },
    /// Over the size limit
    #[error("{name} is too large ({size_bytes} bytes, limit {limit_bytes} bytes)")]
    TooLarge {
        /// Selected file name
        name: String,
        /// Its size
        size_bytes: u64,
        /// The configured limit
        limit_bytes: u64,
    },
    /// A subject was typed but it is only whitespace
    #[error("subject must not be blank")]
    BlankSubject,
}

/// Upload that reached the service and did not produce a document
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum UploadFailure {
    /// 400/422 or another client error
    #[error("upload rejected: {message}")]
    Validation {
        /// Server detail or a generic message
        message: String,
    },
    /// 413
    #[error("the service refused the file as too large")]
    TooLarge,
    /// 429
    #[error("too many uploads, try again shortly")]
    RateLimited,
    /// 5xx
    #[error("the service failed to store the file: {message}")]
    Server {
        /// Server detail or a generic message
        message: String,
    },
    /// The 60 second bound elapsed
    #[error("the upload timed out")]
    Timeout,
    /// Transport failure
    #[error("could not reach the service: {reason}")]
    Network {
        /// Transport failure description
        reason: String,
    },
    /// 401/403
    #[error("not authorized to upload")]
    Unauthorized,
    /// 404
    #[error("the upload endpoint was not found")]
    NotFound,
}

/// What the user answered when asked for a subject
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SubjectInput {
    /// The prompt was dismissed
    Cancelled,
    /// Text as typed
    Entered(String),
}

impl SubjectInput {
    /// The subject to send
    ///
    /// # Errors
    ///
    /// Returns [`UploadRejection::BlankSubject`] when whitespace was typed.
    pub fn resolve(&self) -> Result<String, UploadRejection> {
        match self {
            Self::Cancelled => Ok(DEFAULT_SUBJECT.to_string()),
            Self::Entered(text) if text.is_empty() => Ok(DEFAULT_SUBJECT.to_string()),
            Self::Entered(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    Err(UploadRejection::BlankSubject)
                } else {
                    Ok(trimmed.to_string())
                }
            }
        }
    }
}

impl From<Option<String>> for SubjectInput {
    fn from(input: Option<String>) -> Self {
        input.map_or(Self::Cancelled, Self::Entered)
    }
}

/// The file picker
///
/// Taken at the start of every upload attempt, so it is always empty
/// afterwards and the same file can be picked again.
#[derive(Clone, Debug, Default)]
pub struct FileSelection {
    file: Option<LocalFile>,
}

impl FileSelection {
    /// Nothing selected
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Select a file, replacing any previous choice
    pub fn select(&mut self, file: LocalFile) {
        self.file = Some(file);
    }

    /// The current choice
    #[must_use]
    pub fn selected(&self) -> Option<&LocalFile> {
        self.file.as_ref()
    }

    /// Whether nothing is selected
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.file.is_none()
    }

    /// Take the choice, leaving the selection empty
    pub fn take(&mut self) -> Option<LocalFile> {
        self.file.take()
    }
}

/// An upload that passed every local check
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadRequest {
    /// The file
    pub file: LocalFile,
    /// Resolved subject
    pub subject: String,
}

/// Run the local checks, in order: file, type, size, subject
///
/// # Errors
///
/// Returns the first failed check.
pub fn check_upload(
    file: Option<LocalFile>,
    subject: &SubjectInput,
    max_upload_bytes: u64,
) -> Result<UploadRequest, UploadRejection> {
    let file = file.ok_or(UploadRejection::NoFile)?;

    if !file.name.to_lowercase().ends_with(".pdf") {
        return Err(UploadRejection::NotPdf { name: file.name });
    }
    if file.size_bytes > max_upload_bytes {
        return Err(UploadRejection::TooLarge {
            name: file.name,
            size_bytes: file.size_bytes,
            limit_bytes: max_upload_bytes,
        });
    }
    let subject = subject.resolve()?;

    Ok(UploadRequest { file, subject })
}

/// Local facts about a dispatched upload, used to build the entry
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct UploadedFile {
    pub name: String,
    pub size_bytes: u64,
    pub subject: String,
}

/// Commit or discard a finished upload
pub(crate) fn resolve_upload(
    local: UploadedFile,
    outcome: Outcome<UploadReceipt>,
    now: DateTime<Utc>,
) -> Result<(DocumentEntry, String), UploadFailure> {
    match outcome {
        Outcome::Success(receipt) => {
            let message = receipt
                .message
                .as_deref()
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .unwrap_or(DEFAULT_UPLOAD_MESSAGE)
                .to_string();
            Ok((entry_from_receipt(local, &receipt, now), message))
        }
        // The service stored the file but said something we cannot read
        Outcome::Malformed { .. } => Ok((
            DocumentEntry::new(
                DocumentId::placeholder(),
                local.name,
                local.subject,
                local.size_bytes,
                now,
            ),
            DEFAULT_UPLOAD_MESSAGE.to_string(),
        )),
        Outcome::ValidationError { message } => Err(UploadFailure::Validation { message }),
        Outcome::PayloadTooLarge => Err(UploadFailure::TooLarge),
        Outcome::RateLimited => Err(UploadFailure::RateLimited),
        Outcome::ServerError { message } => Err(UploadFailure::Server { message }),
        Outcome::Timeout => Err(UploadFailure::Timeout),
        Outcome::NetworkError { reason } => Err(UploadFailure::Network { reason }),
        Outcome::Unauthorized => Err(UploadFailure::Unauthorized),
        Outcome::NotFound | Outcome::SessionExpired => Err(UploadFailure::NotFound),
    }
}

fn entry_from_receipt(
    local: UploadedFile,
    receipt: &UploadReceipt,
    now: DateTime<Utc>,
) -> DocumentEntry {
    let non_blank = |field: &Option<String>| {
        field
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
    };

    DocumentEntry::new(
        receipt
            .remote_id()
            .map_or_else(DocumentId::placeholder, DocumentId::new),
        non_blank(&receipt.filename).unwrap_or(local.name),
        non_blank(&receipt.subject).unwrap_or(local.subject),
        receipt.size_bytes().unwrap_or(local.size_bytes),
        receipt.uploaded_at().unwrap_or(now),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MIB: u64 = 1024 * 1024;

    fn local() -> UploadedFile {
        UploadedFile {
            name: "notes.pdf".to_string(),
            size_bytes: 2048,
            subject: "Biology".to_string(),
        }
    }

    #[test]
    fn test_subject_resolution() {
        assert_eq!(SubjectInput::Cancelled.resolve().unwrap(), DEFAULT_SUBJECT);
        assert_eq!(
            SubjectInput::Entered(String::new()).resolve().unwrap(),
            DEFAULT_SUBJECT
        );
        assert_eq!(
            SubjectInput::Entered("  Physics ".to_string())
                .resolve()
                .unwrap(),
            "Physics"
        );
        assert_eq!(
            SubjectInput::Entered("   ".to_string()).resolve(),
            Err(UploadRejection::BlankSubject)
        );
    }

    #[test]
    fn test_check_order() {
        let subject = SubjectInput::Entered("  ".to_string());

        assert_eq!(
            check_upload(None, &subject, 50 * MIB),
            Err(UploadRejection::NoFile)
        );
        assert!(matches!(
            check_upload(Some(LocalFile::sized("a.docx", 60 * MIB)), &subject, 50 * MIB),
            Err(UploadRejection::NotPdf { .. })
        ));
        assert!(matches!(
            check_upload(Some(LocalFile::sized("a.pdf", 60 * MIB)), &subject, 50 * MIB),
            Err(UploadRejection::TooLarge { .. })
        ));
        assert_eq!(
            check_upload(Some(LocalFile::sized("a.pdf", MIB)), &subject, 50 * MIB),
            Err(UploadRejection::BlankSubject)
        );
    }

    #[test]
    fn test_pdf_extension_case_insensitive_and_limit_inclusive() {
        let request = check_upload(
            Some(LocalFile::sized("Report.PDF", 50 * MIB)),
            &SubjectInput::Cancelled,
            50 * MIB,
        )
        .unwrap();
        assert_eq!(request.subject, DEFAULT_SUBJECT);
        assert_eq!(request.file.name, "Report.PDF");
    }

    #[test]
    fn test_selection_take_resets() {
        let mut selection = FileSelection::new();
        selection.select(LocalFile::sized("a.pdf", 1));
        assert!(!selection.is_empty());
        assert!(selection.take().is_some());
        assert!(selection.is_empty());
    }

    #[test]
    fn test_resolve_from_receipt() {
        let receipt = UploadReceipt {
            message: Some("Stored!".to_string()),
            filename: Some("notes-v2.pdf".to_string()),
            file_id: Some(serde_json::json!("f-1")),
            size: Some(4096.0),
            ..UploadReceipt::default()
        };
        let (entry, message) =
            resolve_upload(local(), Outcome::Success(receipt), Utc::now()).unwrap();

        assert_eq!(message, "Stored!");
        assert_eq!(entry.id, DocumentId::new("f-1"));
        assert_eq!(entry.name, "notes-v2.pdf");
        assert_eq!(entry.subject, "Biology");
        assert_eq!(entry.size_bytes, 4096);
    }

    #[test]
    fn test_resolve_empty_receipt_uses_local_metadata() {
        let now = Utc::now();
        let (entry, message) =
            resolve_upload(local(), Outcome::Success(UploadReceipt::default()), now).unwrap();

        assert_eq!(message, DEFAULT_UPLOAD_MESSAGE);
        assert!(entry.id.as_str().starts_with("local-"));
        assert_eq!(entry.name, "notes.pdf");
        assert_eq!(entry.size_bytes, 2048);
        assert_eq!(entry.uploaded_at, now);
    }

    #[test]
    fn test_resolve_malformed_counts_as_stored() {
        let outcome = Outcome::Malformed {
            raw: "OK".to_string(),
        };
        let (entry, _) = resolve_upload(local(), outcome, Utc::now()).unwrap();
        assert_eq!(entry.name, "notes.pdf");
    }

    #[test]
    fn test_resolve_failures() {
        let cases = [
            (
                Outcome::ValidationError {
                    message: "bad pdf".to_string(),
                },
                UploadFailure::Validation {
                    message: "bad pdf".to_string(),
                },
            ),
            (Outcome::PayloadTooLarge, UploadFailure::TooLarge),
            (Outcome::RateLimited, UploadFailure::RateLimited),
            (Outcome::Timeout, UploadFailure::Timeout),
            (Outcome::Unauthorized, UploadFailure::Unauthorized),
            (Outcome::NotFound, UploadFailure::NotFound),
        ];

        for (outcome, expected) in cases {
            assert_eq!(resolve_upload(local(), outcome, Utc::now()), Err(expected));
        }
    }
}
