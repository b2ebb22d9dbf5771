//! Delete Coordinator
//!
//! Gating checks before a delete is dispatched and the mapping from its
//! classified outcome to commit (remove) or compensation (revert).

use thiserror::Error;

use super::library::{DocumentEntry, DocumentId, DocumentLibrary, DocumentStatus};
use crate::classifier::Outcome;
use crate::payload::DeleteReceipt;

/// Confirmation shown when the service sends none
pub const DEFAULT_DELETE_MESSAGE: &str = "File deleted";

/// Delete refused before any network call
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DeleteRejection {
    /// Not in the library
    #[error("no document with id {id}")]
    UnknownDocument {
        /// Requested id
        id: DocumentId,
    },
    /// A delete for this entry is already in flight
    #[error("{id} is already being deleted")]
    AlreadyDeleting {
        /// Requested id
        id: DocumentId,
    },
    /// The user did not confirm
    #[error("deletion of {id} was not confirmed")]
    NotConfirmed {
        /// Requested id
        id: DocumentId,
    },
}

/// Delete that reached the service and was not applied; the entry is back
/// to active
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DeleteFailure {
    /// 401/403
    #[error("not authorized to delete this file")]
    Unauthorized,
    /// 5xx
    #[error("the service failed to delete the file: {message}")]
    Server {
        /// Server detail or a generic message
        message: String,
    },
    /// The 15 second bound elapsed
    #[error("the delete timed out")]
    Timeout,
    /// Transport failure
    #[error("could not reach the service: {reason}")]
    Network {
        /// Transport failure description
        reason: String,
    },
    /// 429
    #[error("too many requests, try again shortly")]
    RateLimited,
    /// Other client errors
    #[error("delete rejected: {message}")]
    Validation {
        /// Server detail or a generic message
        message: String,
    },
}

/// How a finished delete is applied to the library
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum DeleteResolution {
    /// Confirmed; drop the entry
    Removed {
        message: String,
    },
    /// The service had no such document; drop the entry too
    AlreadyGone,
    /// Put the entry back to active
    Revert(DeleteFailure),
}

/// Check that `id` can be deleted and ask for confirmation
///
/// `confirm` is only called once the entry is known to be deletable.
pub(crate) fn check_delete<F>(
    library: &DocumentLibrary,
    id: &DocumentId,
    confirm: F,
) -> Result<(), DeleteRejection>
where
    F: FnOnce(&DocumentEntry) -> bool,
{
    let entry = library
        .get(id)
        .ok_or_else(|| DeleteRejection::UnknownDocument { id: id.clone() })?;

    if entry.status() == DocumentStatus::Deleting {
        return Err(DeleteRejection::AlreadyDeleting { id: id.clone() });
    }
    if !confirm(entry) {
        return Err(DeleteRejection::NotConfirmed { id: id.clone() });
    }
    Ok(())
}

pub(crate) fn resolve_delete(outcome: Outcome<DeleteReceipt>) -> DeleteResolution {
    match outcome {
        Outcome::Success(receipt) => DeleteResolution::Removed {
            message: receipt
                .message
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| DEFAULT_DELETE_MESSAGE.to_string()),
        },
        // 2xx is a confirmed delete even if the body is unreadable
        Outcome::Malformed { .. } => DeleteResolution::Removed {
            message: DEFAULT_DELETE_MESSAGE.to_string(),
        },
        Outcome::NotFound | Outcome::SessionExpired => DeleteResolution::AlreadyGone,
        Outcome::Unauthorized => DeleteResolution::Revert(DeleteFailure::Unauthorized),
        Outcome::ServerError { message } => {
            DeleteResolution::Revert(DeleteFailure::Server { message })
        }
        Outcome::Timeout => DeleteResolution::Revert(DeleteFailure::Timeout),
        Outcome::NetworkError { reason } => {
            DeleteResolution::Revert(DeleteFailure::Network { reason })
        }
        Outcome::RateLimited => DeleteResolution::Revert(DeleteFailure::RateLimited),
        Outcome::ValidationError { message } => {
            DeleteResolution::Revert(DeleteFailure::Validation { message })
        }
        Outcome::PayloadTooLarge => DeleteResolution::Revert(DeleteFailure::Validation {
            message: "request too large".to_string(),
        }),
    }
}
