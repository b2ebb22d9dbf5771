//! Session Manager
//!
//! Drives one conversation against the remote service: appends turns, sends
//! them one at a time, interprets the classified outcome and heals the
//! session when the service stops recognizing it.
//!
//! # Control flow
//!
//! Every remote call and the recovery timer run as spawned tasks. They never
//! touch manager state; they send a completion back over a channel and the
//! owner applies it by calling [`SessionManager::settle`] (await the next
//! one) or [`SessionManager::poll`] (drain what is ready). All mutation
//! therefore happens on the owner's task, one completion at a time.
//!
//! Completions carry the epoch they were started in. Starting or resuming a
//! conversation bumps the epoch, so anything still arriving from the previous
//! conversation is discarded instead of applied.
//!
//! # Recovery
//!
//! A `SessionExpired` or `Unauthorized` reply clears the id (`Expired`) and
//! arms a single timer. When it fires a fresh id is generated (`Rebinding`),
//! a "ready" notice is appended and the session is `Bound` again. At most one
//! timer is armed at a time.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use crate::backend::{bounded, Attempt, RemoteService, TurnRequest};
use crate::classifier::{classify, Endpoint, Outcome, OutcomeKind};
use crate::config::ClientConfig;
use crate::conversation::{ConversationLog, Turn};
use crate::fallback;
use crate::history::load_history;
use crate::payload::ChatReply;
use crate::session::{Session, SessionId, SessionState};

/// Opening line of a new conversation
pub const GREETING: &str =
    "Hello and welcome! I'm your intelligent assistant. How can I help you today? ✨";

/// Shown when the service no longer knows the chat id
pub const SESSION_EXPIRED_NOTICE: &str =
    "Your session has expired. A new session will be started in a moment.";

/// Shown when the service refuses the chat id
pub const UNAUTHORIZED_NOTICE: &str =
    "The service did not accept this session. A new session will be started in a moment.";

/// Shown once a replacement session is in place
pub const READY_NOTICE: &str = "A new session is ready. You can continue asking questions.";

/// Prefix of the answer given when the service could not be reached
pub const OFFLINE_PREFIX: &str =
    "I couldn't reach the service, so here is a quick answer instead:";

/// Prefix of the answer given when the service took too long
pub const TIMEOUT_PREFIX: &str =
    "The service took too long to answer, so here is a quick answer instead:";

/// Prefix of the answer given when the reply could not be read
pub const UNEXPECTED_REPLY_PREFIX: &str =
    "The service sent a reply I couldn't read, so here is a quick answer instead:";

/// Shown on 429
pub const RATE_LIMITED_NOTICE: &str =
    "The service is receiving too many requests. Please wait a moment and try again.";

/// Shown on 413
pub const TOO_LARGE_NOTICE: &str = "Your message is too long for the service to accept.";

/// Settings the manager needs from [`ClientConfig`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionSettings {
    /// Bound on one chat turn
    pub chat_timeout: Duration,
    /// Wait before a replacement session is created
    pub recovery_delay: Duration,
    /// Most turns fetched when loading history
    pub history_limit: usize,
    /// Open a new conversation with [`GREETING`]
    pub greet_on_start: bool,
    /// Try loading stored history when a conversation starts
    pub load_history_on_start: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&ClientConfig::default())
    }
}

impl From<&ClientConfig> for SessionSettings {
    fn from(config: &ClientConfig) -> Self {
        Self {
            chat_timeout: config.chat_timeout,
            recovery_delay: config.recovery_delay,
            history_limit: config.history_limit,
            greet_on_start: config.greet_on_start,
            load_history_on_start: config.load_history_on_start,
        }
    }
}

/// What [`SessionManager::submit`] did with the text
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitStatus {
    /// Empty or whitespace-only; nothing happened
    Ignored,
    /// Another turn is still in flight; nothing happened
    Busy,
    /// The user turn was appended and the call sent
    Dispatched,
}

/// What applying one completion did
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ManagerEvent {
    /// A chat turn settled and exactly one reply or notice was appended
    Answered {
        /// How the call was classified
        outcome: OutcomeKind,
    },
    /// Stored history replaced the log
    HistoryLoaded {
        /// Turns restored
        turns: usize,
    },
    /// History could not be loaded; the log was left alone
    HistoryUnavailable,
    /// A replacement session was bound after expiry
    Recovered {
        /// The new id
        session_id: SessionId,
    },
    /// A completion from a superseded conversation was discarded
    Stale,
}

#[derive(Debug)]
enum Completion {
    Turn {
        epoch: u64,
        query: String,
        attempt: Attempt,
    },
    History {
        epoch: u64,
        turns: Option<Vec<Turn>>,
        greet_if_missing: bool,
    },
    Recovery {
        epoch: u64,
    },
}

/// Owner of the session, the conversation log and their background work
pub struct SessionManager<B: RemoteService + ?Sized + 'static> {
    backend: Arc<B>,
    settings: SessionSettings,
    session: Session,
    log: ConversationLog,
    epoch: u64,
    in_flight: Option<AbortHandle>,
    history_task: Option<AbortHandle>,
    recovery: Option<AbortHandle>,
    completion_tx: mpsc::UnboundedSender<Completion>,
    completion_rx: mpsc::UnboundedReceiver<Completion>,
}

impl<B: RemoteService + ?Sized + 'static> SessionManager<B> {
    /// Create an unbound manager with an empty log
    pub fn new(backend: Arc<B>, settings: SessionSettings) -> Self {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        Self {
            backend,
            settings,
            session: Session::unbound(),
            log: ConversationLog::new(),
            epoch: 0,
            in_flight: None,
            history_task: None,
            recovery: None,
            completion_tx,
            completion_rx,
        }
    }

    /// Current session
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The conversation so far
    #[must_use]
    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    /// Settings in effect
    #[must_use]
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Whether a chat turn is in flight
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Whether a recovery timer is armed
    #[must_use]
    pub fn is_recovering(&self) -> bool {
        self.recovery.is_some()
    }

    /// Whether any background work will still produce a completion
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.in_flight.is_some() || self.history_task.is_some() || self.recovery.is_some()
    }

    /// Start a fresh conversation
    ///
    /// Cancels everything still running, binds a newly generated id and
    /// clears the log. Depending on settings, either greets right away or
    /// first tries to load stored history (greeting if there is none).
    pub fn start_conversation(&mut self) -> SessionId {
        self.reset();
        let id = SessionId::generate();
        self.session = Session::bound(id.clone());
        tracing::info!(session_id = %id, "Started conversation");

        if self.settings.load_history_on_start {
            self.spawn_history(id.clone(), self.settings.greet_on_start);
        } else if self.settings.greet_on_start {
            self.log.push(Turn::assistant(GREETING));
        }
        id
    }

    /// Continue an existing conversation under `id`
    ///
    /// History is loaded in the background; if it cannot be loaded the log
    /// stays empty and no notice is shown.
    pub fn resume_conversation(&mut self, id: SessionId) {
        self.reset();
        tracing::info!(session_id = %id, "Resuming conversation");
        self.session = Session::bound(id.clone());
        self.spawn_history(id, false);
    }

    /// Submit one user turn
    ///
    /// The user turn is appended immediately; the reply arrives through
    /// [`settle`](Self::settle) or [`poll`](Self::poll).
    pub fn submit(&mut self, text: &str) -> SubmitStatus {
        let query = text.trim();
        if query.is_empty() {
            return SubmitStatus::Ignored;
        }
        if self.in_flight.is_some() {
            tracing::debug!("Submit rejected, a turn is already in flight");
            return SubmitStatus::Busy;
        }

        self.log.push(Turn::user(query));

        let request = TurnRequest {
            query: query.to_string(),
            chat_id: self.session.id().cloned(),
        };
        tracing::debug!(
            state = %self.session.state(),
            bound = request.chat_id.is_some(),
            "Dispatching turn"
        );

        let backend = Arc::clone(&self.backend);
        let tx = self.completion_tx.clone();
        let limit = self.settings.chat_timeout;
        let epoch = self.epoch;
        let task = tokio::spawn(async move {
            let attempt = bounded(limit, backend.submit_turn(&request)).await;
            let _ = tx.send(Completion::Turn {
                epoch,
                query: request.query,
                attempt,
            });
        });
        self.in_flight = Some(task.abort_handle());

        SubmitStatus::Dispatched
    }

    /// Wait for the next completion and apply it
    ///
    /// Returns `None` immediately when nothing is pending.
    pub async fn settle(&mut self) -> Option<ManagerEvent> {
        if !self.has_pending() {
            return None;
        }
        let completion = self.completion_rx.recv().await?;
        Some(self.apply(completion))
    }

    /// Apply every completion that is already available
    pub fn poll(&mut self) -> Vec<ManagerEvent> {
        let mut events = Vec::new();
        while let Ok(completion) = self.completion_rx.try_recv() {
            events.push(self.apply(completion));
        }
        events
    }

    /// Cancel the in-flight turn, history load and recovery timer
    pub fn shutdown(&mut self) {
        self.abort_all();
        while self.completion_rx.try_recv().is_ok() {}
    }

    fn reset(&mut self) {
        self.shutdown();
        self.epoch += 1;
        self.log.replace_all(Vec::new());
    }

    fn abort_all(&mut self) {
        for handle in [
            self.in_flight.take(),
            self.history_task.take(),
            self.recovery.take(),
        ]
        .into_iter()
        .flatten()
        {
            handle.abort();
        }
    }

    fn spawn_history(&mut self, id: SessionId, greet_if_missing: bool) {
        let backend = Arc::clone(&self.backend);
        let tx = self.completion_tx.clone();
        let limit = self.settings.history_limit;
        let timeout = self.settings.chat_timeout;
        let epoch = self.epoch;
        let task = tokio::spawn(async move {
            let turns = load_history(backend.as_ref(), &id, limit, timeout).await;
            let _ = tx.send(Completion::History {
                epoch,
                turns,
                greet_if_missing,
            });
        });
        self.history_task = Some(task.abort_handle());
    }

    fn apply(&mut self, completion: Completion) -> ManagerEvent {
        match completion {
            Completion::Turn {
                epoch,
                query,
                attempt,
            } => {
                if epoch != self.epoch {
                    return ManagerEvent::Stale;
                }
                self.in_flight = None;
                self.apply_turn(&query, &attempt)
            }
            Completion::History {
                epoch,
                turns,
                greet_if_missing,
            } => {
                if epoch != self.epoch {
                    return ManagerEvent::Stale;
                }
                self.history_task = None;
                self.apply_history(turns, greet_if_missing)
            }
            Completion::Recovery { epoch } => {
                if epoch != self.epoch {
                    return ManagerEvent::Stale;
                }
                self.recovery = None;
                self.finish_recovery()
            }
        }
    }

    fn apply_turn(&mut self, query: &str, attempt: &Attempt) -> ManagerEvent {
        let outcome = classify::<ChatReply>(Endpoint::Chat, attempt);
        let kind = outcome.kind();

        match outcome {
            Outcome::Success(reply) => {
                let answer = reply
                    .answer()
                    .map_or_else(|| fallback::synthesize(query), String::from);
                self.log.push(Turn::assistant(answer));
                if let Some(id) = reply.chat_id() {
                    self.adopt_id(SessionId::new(id));
                }
            }
            Outcome::SessionExpired => {
                self.log.push(Turn::notice(SESSION_EXPIRED_NOTICE));
                self.begin_recovery();
            }
            Outcome::Unauthorized => {
                self.log.push(Turn::notice(UNAUTHORIZED_NOTICE));
                self.begin_recovery();
            }
            Outcome::ValidationError { message } => {
                self.log
                    .push(Turn::notice(format!("Your message was rejected: {message}")));
            }
            Outcome::RateLimited => self.log.push(Turn::notice(RATE_LIMITED_NOTICE)),
            Outcome::PayloadTooLarge => self.log.push(Turn::notice(TOO_LARGE_NOTICE)),
            Outcome::ServerError { message } => {
                self.log.push(Turn::notice(format!(
                    "The service ran into a problem: {message}"
                )));
            }
            Outcome::NotFound => {
                self.log
                    .push(Turn::notice("The service could not find the conversation."));
            }
            Outcome::Malformed { ref raw } => {
                tracing::debug!(raw = %raw, "Unreadable chat reply");
                self.push_fallback(UNEXPECTED_REPLY_PREFIX, query);
            }
            Outcome::Timeout => self.push_fallback(TIMEOUT_PREFIX, query),
            Outcome::NetworkError { ref reason } => {
                tracing::debug!(reason = %reason, "Chat transport failure");
                self.push_fallback(OFFLINE_PREFIX, query);
            }
        }

        if kind == OutcomeKind::Success {
            tracing::debug!(state = %self.session.state(), "Turn answered");
        } else {
            tracing::warn!(outcome = ?kind, state = %self.session.state(), "Turn failed");
        }
        ManagerEvent::Answered { outcome: kind }
    }

    fn push_fallback(&mut self, prefix: &str, query: &str) {
        let answer = fallback::synthesize(query);
        self.log.push(Turn::notice(format!("{prefix}\n\n{answer}")));
    }

    /// Take the id the service handed back
    fn adopt_id(&mut self, id: SessionId) {
        if self.session.id() == Some(&id) {
            return;
        }
        let previous = self.session.state();
        self.session = self.session.with_id(id);
        tracing::debug!(
            from = %previous,
            to = %self.session.state(),
            session_id = ?self.session.id(),
            "Adopted chat id from service"
        );

        // A usable id makes a pending replacement pointless
        if previous == SessionState::Expired {
            if let Some(timer) = self.recovery.take() {
                timer.abort();
            }
        }
    }

    fn begin_recovery(&mut self) {
        self.session = Session::expired();
        if self.recovery.is_some() {
            tracing::debug!("Recovery already pending");
            return;
        }

        tracing::info!(
            delay_ms = self.settings.recovery_delay.as_millis() as u64,
            "Session expired, scheduling recovery"
        );
        let tx = self.completion_tx.clone();
        let delay = self.settings.recovery_delay;
        let epoch = self.epoch;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Completion::Recovery { epoch });
        });
        self.recovery = Some(timer.abort_handle());
    }

    fn finish_recovery(&mut self) -> ManagerEvent {
        if self.session.state() != SessionState::Expired {
            return ManagerEvent::Stale;
        }

        let id = SessionId::generate();
        self.session = Session::rebinding(id.clone());
        self.log.push(Turn::notice(READY_NOTICE));
        self.session = Session::bound(id.clone());
        tracing::info!(session_id = %id, "Session recovered");

        ManagerEvent::Recovered { session_id: id }
    }

    fn apply_history(
        &mut self,
        turns: Option<Vec<Turn>>,
        greet_if_missing: bool,
    ) -> ManagerEvent {
        // Turns submitted while history was loading stay after it
        let later = self.log.turns().to_vec();

        match turns {
            Some(restored) if !restored.is_empty() => {
                let count = restored.len();
                let mut merged = restored;
                merged.extend(later);
                self.log.replace_all(merged);
                ManagerEvent::HistoryLoaded { turns: count }
            }
            _ => {
                if greet_if_missing {
                    let mut merged = vec![Turn::assistant(GREETING)];
                    merged.extend(later);
                    self.log.replace_all(merged);
                }
                ManagerEvent::HistoryUnavailable
            }
        }
    }
}

impl<B: RemoteService + ?Sized + 'static> Drop for SessionManager<B> {
    fn drop(&mut self) {
        self.abort_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{LocalFile, RawResponse, TransportError};
    use async_trait::async_trait;

    /// Backend for tests that never reach the network
    struct Unreachable;

    #[async_trait]
    impl RemoteService for Unreachable {
        fn name(&self) -> &str {
            "Unreachable"
        }

        async fn health_check(&self) -> bool {
            false
        }

        async fn submit_turn(&self, _: &TurnRequest) -> Result<RawResponse, TransportError> {
            Err(TransportError::Connect("unreachable".to_string()))
        }

        async fn upload_document(
            &self,
            _: &LocalFile,
            _: &str,
        ) -> Result<RawResponse, TransportError> {
            Err(TransportError::Connect("unreachable".to_string()))
        }

        async fn delete_document(&self, _: &str) -> Result<RawResponse, TransportError> {
            Err(TransportError::Connect("unreachable".to_string()))
        }

        async fn get_history(
            &self,
            _: &SessionId,
            _: usize,
        ) -> Result<RawResponse, TransportError> {
            Err(TransportError::Connect("unreachable".to_string()))
        }
    }

    fn idle_manager(settings: SessionSettings) -> SessionManager<Unreachable> {
        SessionManager::new(Arc::new(Unreachable), settings)
    }

    #[test]
    fn test_new_manager_is_unbound_and_empty() {
        let manager = idle_manager(SessionSettings::default());
        assert_eq!(manager.session().state(), SessionState::Unbound);
        assert!(manager.log().is_empty());
        assert!(!manager.has_pending());
    }

    #[test]
    fn test_start_without_history_greets_synchronously() {
        let mut manager = idle_manager(SessionSettings::default());
        let id = manager.start_conversation();

        assert!(id.as_str().starts_with("chat-"));
        assert_eq!(manager.session().id(), Some(&id));
        assert_eq!(manager.log().turns()[0].text(), GREETING);
        assert!(!manager.has_pending());
    }

    #[test]
    fn test_start_without_greeting_leaves_log_empty() {
        let mut manager = idle_manager(SessionSettings {
            greet_on_start: false,
            ..SessionSettings::default()
        });
        manager.start_conversation();
        assert!(manager.log().is_empty());
    }

    #[test]
    fn test_blank_submit_needs_no_runtime() {
        let mut manager = idle_manager(SessionSettings::default());
        assert_eq!(manager.submit("   "), SubmitStatus::Ignored);
        assert!(!manager.is_busy());
    }

    #[test]
    fn test_settle_when_idle_is_ready_immediately() {
        let mut manager = idle_manager(SessionSettings::default());
        let mut settle = tokio_test::task::spawn(manager.settle());
        assert_eq!(tokio_test::assert_ready!(settle.poll()), None);
    }

    #[test]
    fn test_poll_when_idle_is_empty() {
        let mut manager = idle_manager(SessionSettings::default());
        assert!(manager.poll().is_empty());
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = ClientConfig::default();
        config.chat_timeout = Duration::from_secs(9);
        config.greet_on_start = false;

        let settings = SessionSettings::from(&config);
        assert_eq!(settings.chat_timeout, Duration::from_secs(9));
        assert_eq!(settings.recovery_delay, Duration::from_secs(2));
        assert!(!settings.greet_on_start);
    }

    #[test]
    fn test_default_settings_match_config_defaults() {
        let settings = SessionSettings::default();
        assert_eq!(settings.chat_timeout, Duration::from_secs(30));
        assert_eq!(settings.history_limit, 50);
        assert!(settings.greet_on_start);
        assert!(!settings.load_history_on_start);
    }
}
