//! Remote Service Traits
//!
//! Trait definitions for the document Q&A service. This abstraction lets the
//! session manager and the document coordinators work against the real HTTP
//! service, a scripted test double, or anything else that can answer the four
//! remote operations.
//!
//! # Design Philosophy
//!
//! Implementations only move bytes. They report what the service said
//! (status code plus body text) or that the transport failed; deciding what
//! a response *means* is the job of [`crate::classifier`].

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::session::SessionId;

/// A completed HTTP-style exchange, body kept as raw text
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body, possibly empty and possibly not JSON
    pub body: String,
}

impl RawResponse {
    /// Create a response from a status and body text
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Create a response whose body is the given JSON value
    #[must_use]
    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        Self::new(status, value.to_string())
    }

    /// Whether the status is in the 2xx range
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failures below the HTTP layer
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The transport gave up waiting
    #[error("request timed out")]
    Timeout,
    /// DNS, connection refused, reset, TLS...
    #[error("connection failed: {0}")]
    Connect(String),
    /// The local payload could not be read
    #[error("could not read local file: {0}")]
    Io(String),
}

/// The settled result of one bounded remote call
///
/// This is the only thing the classifier ever sees: the call has either
/// produced a response, run out of time, or failed in transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Attempt {
    /// The service answered (any status)
    Completed(RawResponse),
    /// The bounded wait elapsed and the call was cancelled
    TimedOut,
    /// The call failed before a response arrived
    Failed {
        /// Human-readable transport failure
        reason: String,
    },
}

impl From<Result<RawResponse, TransportError>> for Attempt {
    fn from(result: Result<RawResponse, TransportError>) -> Self {
        match result {
            Ok(response) => Self::Completed(response),
            Err(TransportError::Timeout) => Self::TimedOut,
            Err(e) => Self::Failed {
                reason: e.to_string(),
            },
        }
    }
}

/// Run a remote call under a fixed time bound
///
/// Exceeding `limit` drops the call future, which cancels the request, and
/// yields [`Attempt::TimedOut`].
pub async fn bounded<F>(limit: Duration, call: F) -> Attempt
where
    F: Future<Output = Result<RawResponse, TransportError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => Attempt::from(result),
        Err(_) => {
            tracing::debug!(limit_ms = limit.as_millis() as u64, "Remote call timed out");
            Attempt::TimedOut
        }
    }
}

/// One user turn as sent to the service
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnRequest {
    /// The user's question
    pub query: String,
    /// Current chat id, when the conversation is bound
    pub chat_id: Option<SessionId>,
}

/// Where the bytes of a [`LocalFile`] live
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileSource {
    /// On disk; read only when the upload is dispatched
    Path(PathBuf),
    /// Already in memory
    Memory(Vec<u8>),
}

/// A file the user picked for upload
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalFile {
    /// File name as shown to the user and sent to the service
    pub name: String,
    /// Size in bytes
    pub size_bytes: u64,
    /// Content location
    pub source: FileSource,
}

impl LocalFile {
    /// Describe an in-memory file
    pub fn in_memory(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            size_bytes: bytes.len() as u64,
            source: FileSource::Memory(bytes),
        }
    }

    /// Describe a file of a given size without holding its content
    ///
    /// Useful for validating a selection before anything is read.
    pub fn sized(name: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            name: name.into(),
            size_bytes,
            source: FileSource::Memory(Vec::new()),
        }
    }

    /// Describe a file on disk (reads metadata only)
    ///
    /// # Errors
    ///
    /// Returns an error if the file metadata cannot be read.
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            name,
            size_bytes: metadata.len(),
            source: FileSource::Path(path.to_path_buf()),
        })
    }

    /// Load the file content
    ///
    /// # Errors
    ///
    /// Returns an error if an on-disk file cannot be read.
    pub async fn read_bytes(&self) -> std::io::Result<Vec<u8>> {
        match &self.source {
            FileSource::Path(path) => tokio::fs::read(path).await,
            FileSource::Memory(bytes) => Ok(bytes.clone()),
        }
    }
}

/// Remote document Q&A service
///
/// Implement this trait to point the client at a different service or to
/// script responses in tests.
#[async_trait]
pub trait RemoteService: Send + Sync {
    /// Get the service name (for logs)
    fn name(&self) -> &str;

    /// Check whether the service is reachable at all
    async fn health_check(&self) -> bool;

    /// Send one user turn, with the chat id when bound
    async fn submit_turn(&self, request: &TurnRequest) -> Result<RawResponse, TransportError>;

    /// Upload a document under a subject label
    async fn upload_document(
        &self,
        file: &LocalFile,
        subject: &str,
    ) -> Result<RawResponse, TransportError>;

    /// Delete a document by its remote id
    async fn delete_document(&self, id: &str) -> Result<RawResponse, TransportError>;

    /// Fetch up to `limit` turns previously exchanged in a chat
    async fn get_history(
        &self,
        session_id: &SessionId,
        limit: usize,
    ) -> Result<RawResponse, TransportError>;
}
