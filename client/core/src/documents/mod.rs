//! Document Library and its coordinators
//!
//! [`DocumentDesk`] owns the [`DocumentLibrary`] and is the only thing that
//! mutates it. Uploads and deletes run as independent spawned tasks, each
//! bounded by its own timeout; their completions come back over a channel
//! and are applied when the owner calls [`DocumentDesk::settle`] or
//! [`DocumentDesk::poll`].
//!
//! Mutations are two-phase: a delete marks its entry `Deleting` at dispatch
//! and either removes it or reverts it to `Active` when the call settles. An
//! upload only adds an entry once the service confirms it.

mod delete;
mod library;
mod upload;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

pub use delete::{DeleteFailure, DeleteRejection, DEFAULT_DELETE_MESSAGE};
pub use library::{DocumentEntry, DocumentId, DocumentLibrary, DocumentStatus};
pub use upload::{
    check_upload, FileSelection, SubjectInput, UploadFailure, UploadRejection, UploadRequest,
    DEFAULT_SUBJECT, DEFAULT_UPLOAD_MESSAGE,
};

use delete::{check_delete, resolve_delete, DeleteResolution};
use upload::{resolve_upload, UploadedFile};

use crate::backend::{bounded, Attempt, RemoteService};
use crate::classifier::{classify, Endpoint};
use crate::config::ClientConfig;
use crate::payload::{DeleteReceipt, UploadReceipt};

/// Limits applied to document operations
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentLimits {
    /// Largest file accepted for upload
    pub max_upload_bytes: u64,
    /// Bound on one upload call
    pub upload_timeout: Duration,
    /// Bound on one delete call
    pub delete_timeout: Duration,
}

impl Default for DocumentLimits {
    fn default() -> Self {
        Self::from(&ClientConfig::default())
    }
}

impl From<&ClientConfig> for DocumentLimits {
    fn from(config: &ClientConfig) -> Self {
        Self {
            max_upload_bytes: config.max_upload_bytes,
            upload_timeout: config.upload_timeout,
            delete_timeout: config.delete_timeout,
        }
    }
}

/// Handle for one dispatched document operation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(u64);

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Result of a settled upload
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UploadReport {
    /// Stored and listed
    Uploaded {
        /// Operation handle
        ticket: Ticket,
        /// The new entry
        entry: DocumentEntry,
        /// Server confirmation text
        message: String,
    },
    /// Not stored; nothing listed
    Failed {
        /// Operation handle
        ticket: Ticket,
        /// Selected file name
        file_name: String,
        /// Why
        failure: UploadFailure,
    },
}

/// Result of a settled delete
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeleteReport {
    /// Removed from the service and the library
    Deleted {
        /// Operation handle
        ticket: Ticket,
        /// Removed id
        id: DocumentId,
        /// Server confirmation text
        message: String,
    },
    /// The service did not have it; removed from the library
    AlreadyDeleted {
        /// Operation handle
        ticket: Ticket,
        /// Removed id
        id: DocumentId,
    },
    /// Not deleted; the entry is active again
    Failed {
        /// Operation handle
        ticket: Ticket,
        /// Entry id
        id: DocumentId,
        /// Why
        failure: DeleteFailure,
    },
}

/// Any settled document operation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DocumentReport {
    /// See [`UploadReport`]
    Upload(UploadReport),
    /// See [`DeleteReport`]
    Delete(DeleteReport),
}

/// Completion sent back by a spawned call
#[derive(Debug)]
enum DocumentCompletion {
    Upload {
        ticket: Ticket,
        local: UploadedFile,
        attempt: Attempt,
    },
    Delete {
        ticket: Ticket,
        id: DocumentId,
        attempt: Attempt,
    },
}

/// Owner of the document library and its in-flight operations
pub struct DocumentDesk<B: RemoteService + ?Sized + 'static> {
    backend: Arc<B>,
    library: DocumentLibrary,
    limits: DocumentLimits,
    in_flight: HashMap<Ticket, AbortHandle>,
    next_ticket: u64,
    completion_tx: mpsc::UnboundedSender<DocumentCompletion>,
    completion_rx: mpsc::UnboundedReceiver<DocumentCompletion>,
}

impl<B: RemoteService + ?Sized + 'static> DocumentDesk<B> {
    /// Create a desk with an empty library
    pub fn new(backend: Arc<B>, limits: DocumentLimits) -> Self {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        Self {
            backend,
            library: DocumentLibrary::new(),
            limits,
            in_flight: HashMap::new(),
            next_ticket: 1,
            completion_tx,
            completion_rx,
        }
    }

    /// The library as currently known
    #[must_use]
    pub fn library(&self) -> &DocumentLibrary {
        &self.library
    }

    /// Limits in effect
    #[must_use]
    pub fn limits(&self) -> &DocumentLimits {
        &self.limits
    }

    /// Number of operations still running
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    fn issue_ticket(&mut self) -> Ticket {
        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;
        ticket
    }

    /// Validate and dispatch an upload of the selected file
    ///
    /// The selection is emptied whatever happens.
    ///
    /// # Errors
    ///
    /// Returns an [`UploadRejection`] if a local check fails; nothing is sent
    /// and the library is untouched.
    pub fn upload(
        &mut self,
        selection: &mut FileSelection,
        subject: SubjectInput,
    ) -> Result<Ticket, UploadRejection> {
        let file = selection.take();
        let request = check_upload(file, &subject, self.limits.max_upload_bytes).map_err(|e| {
            tracing::info!(error = %e, "Upload rejected locally");
            e
        })?;

        let ticket = self.issue_ticket();
        let local = UploadedFile {
            name: request.file.name.clone(),
            size_bytes: request.file.size_bytes,
            subject: request.subject.clone(),
        };
        tracing::info!(
            %ticket,
            file = %local.name,
            size_bytes = local.size_bytes,
            subject = %local.subject,
            "Uploading document"
        );

        let backend = Arc::clone(&self.backend);
        let tx = self.completion_tx.clone();
        let limit = self.limits.upload_timeout;
        let task = tokio::spawn(async move {
            let attempt = bounded(
                limit,
                backend.upload_document(&request.file, &request.subject),
            )
            .await;
            let _ = tx.send(DocumentCompletion::Upload {
                ticket,
                local,
                attempt,
            });
        });
        self.in_flight.insert(ticket, task.abort_handle());

        Ok(ticket)
    }

    /// Confirm and dispatch a delete
    ///
    /// `confirm` sees the entry and must return `true` to proceed. On
    /// dispatch the entry is marked `Deleting` until the call settles.
    ///
    /// # Errors
    ///
    /// Returns a [`DeleteRejection`] for unknown ids, entries already being
    /// deleted and declined confirmations.
    pub fn delete<F>(&mut self, id: &DocumentId, confirm: F) -> Result<Ticket, DeleteRejection>
    where
        F: FnOnce(&DocumentEntry) -> bool,
    {
        check_delete(&self.library, id, confirm).map_err(|e| {
            tracing::info!(error = %e, "Delete not dispatched");
            e
        })?;

        self.library.set_status(id, DocumentStatus::Deleting);
        let ticket = self.issue_ticket();
        tracing::info!(%ticket, id = %id, "Deleting document");

        let backend = Arc::clone(&self.backend);
        let tx = self.completion_tx.clone();
        let limit = self.limits.delete_timeout;
        let id = id.clone();
        let task = tokio::spawn(async move {
            let attempt = bounded(limit, backend.delete_document(id.as_str())).await;
            let _ = tx.send(DocumentCompletion::Delete {
                ticket,
                id,
                attempt,
            });
        });
        self.in_flight.insert(ticket, task.abort_handle());

        Ok(ticket)
    }

    /// Wait for the next operation to settle and apply it
    ///
    /// Returns `None` immediately when nothing is in flight.
    pub async fn settle(&mut self) -> Option<DocumentReport> {
        if self.in_flight.is_empty() {
            return None;
        }
        let completion = self.completion_rx.recv().await?;
        Some(self.apply(completion))
    }

    /// Apply every completion that is already available
    pub fn poll(&mut self) -> Vec<DocumentReport> {
        let mut reports = Vec::new();
        while let Ok(completion) = self.completion_rx.try_recv() {
            reports.push(self.apply(completion));
        }
        reports
    }

    /// Abort every running operation
    ///
    /// Entries marked `Deleting` revert to `Active`, since their outcome
    /// will never be known.
    pub fn shutdown(&mut self) {
        for (_, handle) in self.in_flight.drain() {
            handle.abort();
        }
        let deleting: Vec<DocumentId> = self
            .library
            .entries()
            .iter()
            .filter(|entry| entry.status() == DocumentStatus::Deleting)
            .map(|entry| entry.id.clone())
            .collect();
        for id in &deleting {
            self.library.set_status(id, DocumentStatus::Active);
        }
        while self.completion_rx.try_recv().is_ok() {}
    }

    fn apply(&mut self, completion: DocumentCompletion) -> DocumentReport {
        match completion {
            DocumentCompletion::Upload {
                ticket,
                local,
                attempt,
            } => {
                self.in_flight.remove(&ticket);
                DocumentReport::Upload(self.apply_upload(ticket, local, &attempt))
            }
            DocumentCompletion::Delete {
                ticket,
                id,
                attempt,
            } => {
                self.in_flight.remove(&ticket);
                DocumentReport::Delete(self.apply_delete(ticket, id, &attempt))
            }
        }
    }

    fn apply_upload(
        &mut self,
        ticket: Ticket,
        local: UploadedFile,
        attempt: &Attempt,
    ) -> UploadReport {
        let outcome = classify::<UploadReceipt>(Endpoint::Upload, attempt);
        let kind = outcome.kind();
        let file_name = local.name.clone();

        match resolve_upload(local, outcome, Utc::now()) {
            Ok((entry, message)) => {
                tracing::info!(%ticket, id = %entry.id, outcome = ?kind, "Upload stored");
                self.library.insert(entry.clone());
                UploadReport::Uploaded {
                    ticket,
                    entry,
                    message,
                }
            }
            Err(failure) => {
                tracing::warn!(%ticket, file = %file_name, error = %failure, "Upload failed");
                UploadReport::Failed {
                    ticket,
                    file_name,
                    failure,
                }
            }
        }
    }

    fn apply_delete(
        &mut self,
        ticket: Ticket,
        id: DocumentId,
        attempt: &Attempt,
    ) -> DeleteReport {
        let outcome = classify::<DeleteReceipt>(Endpoint::Delete, attempt);

        match resolve_delete(outcome) {
            DeleteResolution::Removed { message } => {
                self.library.remove(&id);
                tracing::info!(%ticket, id = %id, "Document deleted");
                DeleteReport::Deleted {
                    ticket,
                    id,
                    message,
                }
            }
            DeleteResolution::AlreadyGone => {
                self.library.remove(&id);
                tracing::info!(%ticket, id = %id, "Document was already gone");
                DeleteReport::AlreadyDeleted { ticket, id }
            }
            DeleteResolution::Revert(failure) => {
                self.library.set_status(&id, DocumentStatus::Active);
                tracing::warn!(
                    %ticket,
                    id = %id,
                    error = %failure,
                    "Delete failed, entry restored"
                );
                DeleteReport::Failed {
                    ticket,
                    id,
                    failure,
                }
            }
        }
    }
}

impl<B: RemoteService + ?Sized + 'static> Drop for DocumentDesk<B> {
    fn drop(&mut self) {
        for handle in self.in_flight.values() {
            handle.abort();
        }
    }
}
