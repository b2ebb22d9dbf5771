//! Scripted remote service shared by the integration tests
//!
//! Each remote operation has its own queue of scripted replies. When a queue
//! runs dry the operation falls back to a sensible default, so tests only
//! script what they care about.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use edubot_core::{
    DocumentDesk, DocumentLimits, LocalFile, RawResponse, RemoteService, SessionId,
    SessionManager, SessionSettings, TransportError, TurnRequest,
};

// ============================================================================
// Scripted Replies
// ============================================================================

/// One scripted reply
#[derive(Clone, Debug)]
pub enum Scripted {
    /// Answer right away
    Respond(RawResponse),
    /// Answer after a delay
    RespondAfter(Duration, RawResponse),
    /// Fail in transport
    Fail(TransportError),
    /// Never answer
    Hang,
}

impl Scripted {
    pub fn json(status: u16, value: Value) -> Self {
        Self::Respond(RawResponse::json(status, &value))
    }

    pub fn status(status: u16) -> Self {
        Self::Respond(RawResponse::new(status, ""))
    }

    pub fn text(status: u16, body: &str) -> Self {
        Self::Respond(RawResponse::new(status, body))
    }

    pub fn refused() -> Self {
        Self::Fail(TransportError::Connect("connection refused".to_string()))
    }

    async fn play(self) -> Result<RawResponse, TransportError> {
        match self {
            Self::Respond(response) => Ok(response),
            Self::RespondAfter(delay, response) => {
                tokio::time::sleep(delay).await;
                Ok(response)
            }
            Self::Fail(error) => Err(error),
            Self::Hang => std::future::pending().await,
        }
    }
}

// ============================================================================
// Scripted Backend
// ============================================================================

/// A remote service that plays back scripted replies and counts calls
#[derive(Default)]
pub struct ScriptedBackend {
    chat: Mutex<VecDeque<Scripted>>,
    upload: Mutex<VecDeque<Scripted>>,
    delete: Mutex<VecDeque<Scripted>>,
    history: Mutex<VecDeque<Scripted>>,

    chat_calls: AtomicUsize,
    upload_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    history_calls: AtomicUsize,

    chat_requests: Mutex<Vec<TurnRequest>>,
    uploads: Mutex<Vec<(String, String)>>,
    deletes: Mutex<Vec<String>>,
    history_limits: Mutex<Vec<usize>>,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script_chat(&self, reply: Scripted) {
        self.chat.lock().unwrap().push_back(reply);
    }

    pub fn script_upload(&self, reply: Scripted) {
        self.upload.lock().unwrap().push_back(reply);
    }

    pub fn script_delete(&self, reply: Scripted) {
        self.delete.lock().unwrap().push_back(reply);
    }

    pub fn script_history(&self, reply: Scripted) {
        self.history.lock().unwrap().push_back(reply);
    }

    pub fn chat_calls(&self) -> usize {
        self.chat_calls.load(Ordering::SeqCst)
    }

    pub fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    pub fn chat_requests(&self) -> Vec<TurnRequest> {
        self.chat_requests.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> Vec<(String, String)> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.deletes.lock().unwrap().clone()
    }

    pub fn history_limits(&self) -> Vec<usize> {
        self.history_limits.lock().unwrap().clone()
    }

    fn next(queue: &Mutex<VecDeque<Scripted>>, default: impl FnOnce() -> Scripted) -> Scripted {
        queue.lock().unwrap().pop_front().unwrap_or_else(default)
    }
}

#[async_trait]
impl RemoteService for ScriptedBackend {
    fn name(&self) -> &str {
        "Scripted"
    }

    async fn health_check(&self) -> bool {
        true
    }

    async fn submit_turn(&self, request: &TurnRequest) -> Result<RawResponse, TransportError> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        self.chat_requests.lock().unwrap().push(request.clone());
        let reply = Self::next(&self.chat, || {
            Scripted::json(200, json!({"result": "Here is what your documents say."}))
        });
        reply.play().await
    }

    async fn upload_document(
        &self,
        file: &LocalFile,
        subject: &str,
    ) -> Result<RawResponse, TransportError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        self.uploads
            .lock()
            .unwrap()
            .push((file.name.clone(), subject.to_string()));
        let reply = Self::next(&self.upload, || Scripted::json(200, json!({})));
        reply.play().await
    }

    async fn delete_document(&self, id: &str) -> Result<RawResponse, TransportError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.deletes.lock().unwrap().push(id.to_string());
        let reply = Self::next(&self.delete, || {
            Scripted::json(200, json!({"message": "File deleted successfully"}))
        });
        reply.play().await
    }

    async fn get_history(
        &self,
        _session_id: &SessionId,
        limit: usize,
    ) -> Result<RawResponse, TransportError> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        self.history_limits.lock().unwrap().push(limit);
        let reply = Self::next(&self.history, || Scripted::status(404));
        reply.play().await
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub const MIB: u64 = 1024 * 1024;

pub fn manager(backend: &Arc<ScriptedBackend>) -> SessionManager<ScriptedBackend> {
    SessionManager::new(Arc::clone(backend), SessionSettings::default())
}

pub fn manager_with(
    backend: &Arc<ScriptedBackend>,
    settings: SessionSettings,
) -> SessionManager<ScriptedBackend> {
    SessionManager::new(Arc::clone(backend), settings)
}

pub fn desk(backend: &Arc<ScriptedBackend>) -> DocumentDesk<ScriptedBackend> {
    DocumentDesk::new(Arc::clone(backend), DocumentLimits::default())
}

pub fn pdf(name: &str, size_bytes: u64) -> LocalFile {
    LocalFile::sized(name, size_bytes)
}
