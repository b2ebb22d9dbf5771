//! HTTP Backend Implementation
//!
//! [`RemoteService`] over the EduBot REST API.
//!
//! # EduBot API
//!
//! - `POST /chat/rag` - Ask a question (multipart form: `query`, optional `chat_id`)
//! - `GET /chat/history/{chat_id}?limit=N` - Previously exchanged turns
//! - `POST /files/upload?subject=...` - Upload a PDF (multipart part `file`)
//! - `DELETE /files/delete/{file_id}` - Remove an uploaded document
//!
//! Per-call time bounds are applied by the caller (see
//! [`bounded`](super::bounded)); the HTTP client itself only bounds connect.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Url;
use thiserror::Error;

use super::traits::{LocalFile, RawResponse, RemoteService, TransportError, TurnRequest};
use crate::session::SessionId;

/// Default service address
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Errors building an [`HttpBackend`]
#[derive(Debug, Error)]
pub enum BackendSetupError {
    /// The base URL could not be used
    #[error("invalid service URL {url}: {reason}")]
    InvalidUrl {
        /// The URL as given
        url: String,
        /// Why it was rejected
        reason: String,
    },
    /// reqwest refused to build a client
    #[error("failed to create HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// EduBot REST client
#[derive(Clone)]
pub struct HttpBackend {
    /// Service root, e.g. `http://localhost:8000`
    base_url: Url,
    /// HTTP client
    http_client: reqwest::Client,
}

impl HttpBackend {
    /// Create a new backend for the given service root
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is not an absolute http(s) URL or the
    /// HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, BackendSetupError> {
        let parsed = parse_base_url(base_url)?;
        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            base_url: parsed,
            http_client,
        })
    }

    /// The service root this backend talks to
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build an endpoint URL from path segments (each segment is percent-encoded)
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn chat_url(&self) -> Url {
        self.endpoint(&["chat", "rag"])
    }

    fn history_url(&self, session_id: &SessionId) -> Url {
        self.endpoint(&["chat", "history", session_id.as_str()])
    }

    fn upload_url(&self) -> Url {
        self.endpoint(&["files", "upload"])
    }

    fn delete_url(&self, id: &str) -> Url {
        self.endpoint(&["files", "delete", id])
    }
}

/// Parse and check a service root URL
///
/// # Errors
///
/// Returns [`BackendSetupError::InvalidUrl`] for anything that is not an
/// absolute http(s) URL.
pub fn parse_base_url(base_url: &str) -> Result<Url, BackendSetupError> {
    let invalid = |reason: String| BackendSetupError::InvalidUrl {
        url: base_url.to_string(),
        reason,
    };

    let url = Url::parse(base_url.trim()).map_err(|e| invalid(e.to_string()))?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("expected an http(s) URL".to_string()));
    }
    Ok(url)
}

/// Map a reqwest failure onto the transport taxonomy
fn transport_error(e: &reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Connect(e.to_string())
    }
}

/// Read status and body, whatever the status
async fn settle(response: reqwest::Response) -> Result<RawResponse, TransportError> {
    let status = response.status().as_u16();
    let body = response.text().await.map_err(|e| transport_error(&e))?;
    Ok(RawResponse { status, body })
}

#[async_trait]
impl RemoteService for HttpBackend {
    fn name(&self) -> &'static str {
        "EduBot HTTP"
    }

    async fn health_check(&self) -> bool {
        self.http_client
            .get(self.base_url.clone())
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .is_ok()
    }

    async fn submit_turn(&self, request: &TurnRequest) -> Result<RawResponse, TransportError> {
        let mut form = Form::new().text("query", request.query.clone());
        if let Some(ref chat_id) = request.chat_id {
            form = form.text("chat_id", chat_id.as_str().to_string());
        }

        let response = self
            .http_client
            .post(self.chat_url())
            .multipart(form)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        settle(response).await
    }

    async fn upload_document(
        &self,
        file: &LocalFile,
        subject: &str,
    ) -> Result<RawResponse, TransportError> {
        let bytes = file
            .read_bytes()
            .await
            .map_err(|e| TransportError::Io(format!("{}: {e}", file.name)))?;

        let part = Part::bytes(bytes)
            .file_name(file.name.clone())
            .mime_str("application/pdf")
            .map_err(|e| transport_error(&e))?;
        let form = Form::new().part("file", part);

        let response = self
            .http_client
            .post(self.upload_url())
            .query(&[("subject", subject)])
            .multipart(form)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        settle(response).await
    }

    async fn delete_document(&self, id: &str) -> Result<RawResponse, TransportError> {
        let response = self
            .http_client
            .delete(self.delete_url(id))
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        settle(response).await
    }

    async fn get_history(
        &self,
        session_id: &SessionId,
        limit: usize,
    ) -> Result<RawResponse, TransportError> {
        let response = self
            .http_client
            .get(self.history_url(session_id))
            .query(&[("limit", limit)])
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        settle(response).await
    }
}
