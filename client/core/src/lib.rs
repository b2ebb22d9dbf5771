//! EduBot Core - Session and Document Lifecycle for the EduBot client
//!
//! This crate holds everything the EduBot client does except drawing: it
//! keeps a conversation going against the remote document Q&A service,
//! interprets every kind of reply the service can give, heals expired
//! sessions, and keeps a local list of uploaded PDFs in step with the
//! service while uploads and deletes are in flight.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                     Surface (CLI, GUI, tests)                    │
//! │        submit / start / upload / delete      settle / poll       │
//! └───────────────┬───────────────────────────────────┬──────────────┘
//!                 │                                   │
//! ┌───────────────┴───────────────────────────────────┴──────────────┐
//! │                          EDUBOT CORE                              │
//! │  ┌───────────────────────────┐   ┌─────────────────────────────┐  │
//! │  │      SessionManager       │   │        DocumentDesk         │  │
//! │  │  Session  ConversationLog │   │  DocumentLibrary            │  │
//! │  │  recovery timer, fallback │   │  upload/delete coordinators │  │
//! │  └─────────────┬─────────────┘   └──────────────┬──────────────┘  │
//! │                │   spawned, bounded calls        │                 │
//! │                └──────────────┬──────────────────┘                 │
//! │                      classify(Attempt) -> Outcome                  │
//! │                               │                                    │
//! │                     RemoteService (HttpBackend)                    │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`SessionManager`]: submits turns, applies outcomes, runs recovery
//! - [`DocumentDesk`]: owns the [`DocumentLibrary`] and its in-flight operations
//! - [`Outcome`]: the classified result of one remote call
//! - [`RemoteService`]: the four remote operations; [`HttpBackend`] implements it
//! - [`ClientConfig`]: defaults, TOML file, environment and CLI overrides
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use edubot_core::{HttpBackend, SessionManager, SessionSettings};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let backend = Arc::new(HttpBackend::new("http://localhost:8000")?);
//!     let mut manager = SessionManager::new(backend, SessionSettings::default());
//!
//!     manager.start_conversation();
//!     manager.submit("What does chapter 3 say about mitochondria?");
//!
//!     while let Some(event) = manager.settle().await {
//!         println!("{event:?}");
//!     }
//!     for turn in manager.log().turns() {
//!         println!("{:?}: {}", turn.sender(), turn.text());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`backend`]: remote service trait, HTTP adapter, bounded calls
//! - [`classifier`]: status/body/timeout to [`Outcome`]
//! - [`config`]: configuration loading
//! - [`conversation`]: turns and the conversation log
//! - [`documents`]: document library, upload and delete coordinators
//! - [`fallback`]: canned answers
//! - [`history`]: stored conversation retrieval
//! - [`manager`]: the session manager
//! - [`payload`]: success payload shapes
//! - [`session`]: session id and lifecycle state

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod classifier;
pub mod config;
pub mod conversation;
pub mod documents;
pub mod fallback;
pub mod history;
pub mod manager;
pub mod payload;
pub mod session;

// Re-exports for convenience
pub use backend::{
    bounded, Attempt, BackendSetupError, HttpBackend, LocalFile, RawResponse, RemoteService,
    TransportError, TurnRequest,
};
pub use classifier::{classify, Endpoint, Outcome, OutcomeKind};
pub use conversation::{ConversationLog, Sender, Turn, TurnKind};
pub use documents::{
    DeleteFailure, DeleteRejection, DeleteReport, DocumentDesk, DocumentEntry, DocumentId,
    DocumentLibrary, DocumentLimits, DocumentReport, DocumentStatus, FileSelection, SubjectInput,
    Ticket, UploadFailure, UploadRejection, UploadReport,
};
pub use manager::{ManagerEvent, SessionManager, SessionSettings, SubmitStatus};
pub use session::{Session, SessionId, SessionState};

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, ClientConfig, ClientToml,
    ConfigError, ConfigOverrides, ConfigSource,
};
