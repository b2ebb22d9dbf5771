//! Remote Service Integration
//!
//! Abstracted access to the document Q&A service through a common trait.
//!
//! # Usage
//!
//! ```ignore
//! use edubot_core::backend::{bounded, HttpBackend, RemoteService, TurnRequest};
//!
//! let backend = HttpBackend::new("http://localhost:8000")?;
//! let request = TurnRequest { query: "What is RAG?".into(), chat_id: None };
//! let attempt = bounded(Duration::from_secs(30), backend.submit_turn(&request)).await;
//! ```

mod http;
mod traits;

pub use http::{parse_base_url, BackendSetupError, HttpBackend, DEFAULT_BASE_URL};
pub use traits::{
    bounded, Attempt, FileSource, LocalFile, RawResponse, RemoteService, TransportError,
    TurnRequest,
};
