//! Response Classification
//!
//! Turns a settled remote [`Attempt`] into exactly one [`Outcome`].
//!
//! Classification is pure: no I/O, no logging side effects that matter, and
//! it never fails. Error bodies are best-effort JSON; when they are not, a
//! generic message is used instead of propagating a parse fault.

use serde::de::DeserializeOwned;

use crate::backend::{Attempt, RawResponse};

/// Message used when a rejected request carries no readable detail
pub const GENERIC_VALIDATION_MESSAGE: &str = "The request was rejected by the service";

/// Message used when a failing server carries no readable detail
pub const GENERIC_SERVER_MESSAGE: &str = "The service encountered an internal error";

/// Longest raw body kept in [`Outcome::Malformed`]
const MAX_RAW_LEN: usize = 512;

/// Which remote operation produced the attempt
///
/// Only matters for 404: for conversation calls it means the service has no
/// record of the chat id, for document calls it means the document is gone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endpoint {
    /// `submitTurn`
    Chat,
    /// `getHistory`
    History,
    /// `uploadDocument`
    Upload,
    /// `deleteDocument`
    Delete,
}

/// A success payload shape
pub trait Payload: DeserializeOwned {
    /// Whether the decoded body looks like what this endpoint returns
    fn is_recognized(&self) -> bool {
        true
    }
}

/// The classified result of one remote call
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome<T> {
    /// 2xx with a recognizable payload
    Success(T),
    /// 404 on a conversation call
    SessionExpired,
    /// 404 on a document call
    NotFound,
    /// 401 or 403
    Unauthorized,
    /// 400, 422 or another client error
    ValidationError {
        /// Server-supplied detail or a generic message
        message: String,
    },
    /// 413
    PayloadTooLarge,
    /// 429
    RateLimited,
    /// 5xx
    ServerError {
        /// Server-supplied detail or a generic message
        message: String,
    },
    /// Transport failure (DNS, connect, reset)
    NetworkError {
        /// Transport failure description
        reason: String,
    },
    /// The bounded wait elapsed
    Timeout,
    /// 2xx with a body we cannot interpret, or an unexpected status class
    Malformed {
        /// The body, truncated
        raw: String,
    },
}

/// Payload-free tag of an [`Outcome`], for logs and reports
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutcomeKind {
    /// See [`Outcome::Success`]
    Success,
    /// See [`Outcome::SessionExpired`]
    SessionExpired,
    /// See [`Outcome::NotFound`]
    NotFound,
    /// See [`Outcome::Unauthorized`]
    Unauthorized,
    /// See [`Outcome::ValidationError`]
    ValidationError,
    /// See [`Outcome::PayloadTooLarge`]
    PayloadTooLarge,
    /// See [`Outcome::RateLimited`]
    RateLimited,
    /// See [`Outcome::ServerError`]
    ServerError,
    /// See [`Outcome::NetworkError`]
    NetworkError,
    /// See [`Outcome::Timeout`]
    Timeout,
    /// See [`Outcome::Malformed`]
    Malformed,
}

impl<T> Outcome<T> {
    /// The payload-free tag
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::Success(_) => OutcomeKind::Success,
            Self::SessionExpired => OutcomeKind::SessionExpired,
            Self::NotFound => OutcomeKind::NotFound,
            Self::Unauthorized => OutcomeKind::Unauthorized,
            Self::ValidationError { .. } => OutcomeKind::ValidationError,
            Self::PayloadTooLarge => OutcomeKind::PayloadTooLarge,
            Self::RateLimited => OutcomeKind::RateLimited,
            Self::ServerError { .. } => OutcomeKind::ServerError,
            Self::NetworkError { .. } => OutcomeKind::NetworkError,
            Self::Timeout => OutcomeKind::Timeout,
            Self::Malformed { .. } => OutcomeKind::Malformed,
        }
    }

    /// Whether this outcome should trigger session recovery
    pub fn needs_rebind(&self) -> bool {
        matches!(self, Self::SessionExpired | Self::Unauthorized)
    }
}

/// Classify a settled attempt
pub fn classify<T: Payload>(endpoint: Endpoint, attempt: &Attempt) -> Outcome<T> {
    match attempt {
        Attempt::TimedOut => Outcome::Timeout,
        Attempt::Failed { reason } => Outcome::NetworkError {
            reason: reason.clone(),
        },
        Attempt::Completed(response) => classify_response(endpoint, response),
    }
}

fn classify_response<T: Payload>(endpoint: Endpoint, response: &RawResponse) -> Outcome<T> {
    match response.status {
        200..=299 => decode_success(&response.body),
        404 => match endpoint {
            Endpoint::Chat | Endpoint::History => Outcome::SessionExpired,
            Endpoint::Upload | Endpoint::Delete => Outcome::NotFound,
        },
        401 | 403 => Outcome::Unauthorized,
        413 => Outcome::PayloadTooLarge,
        429 => Outcome::RateLimited,
        400..=499 => Outcome::ValidationError {
            message: error_detail(&response.body)
                .unwrap_or_else(|| GENERIC_VALIDATION_MESSAGE.to_string()),
        },
        500.. => Outcome::ServerError {
            message: error_detail(&response.body)
                .unwrap_or_else(|| GENERIC_SERVER_MESSAGE.to_string()),
        },
        _ => Outcome::Malformed {
            raw: truncate(&format!("HTTP {}: {}", response.status, response.body)),
        },
    }
}

fn decode_success<T: Payload>(body: &str) -> Outcome<T> {
    let text = if body.trim().is_empty() { "{}" } else { body };

    match serde_json::from_str::<T>(text) {
        Ok(payload) if payload.is_recognized() => Outcome::Success(payload),
        _ => Outcome::Malformed {
            raw: truncate(body),
        },
    }
}

/// Extract a readable detail from an error body
///
/// Understands `{"detail": "..."}`, validation lists of the form
/// `{"detail": [{"msg": "..."}]}`, `{"message": "..."}` and `{"error": "..."}`.
/// Returns `None` for anything else, including non-JSON bodies.
#[must_use]
pub fn error_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;

    let from_detail = value.get("detail").and_then(|detail| match detail {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Array(items) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(serde_json::Value::as_str))
                .collect();
            (!messages.is_empty()).then(|| messages.join("; "))
        }
        _ => None,
    });

    from_detail
        .or_else(|| {
            ["message", "error"].iter().find_map(|key| {
                value
                    .get(*key)
                    .and_then(serde_json::Value::as_str)
                    .map(String::from)
            })
        })
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn truncate(raw: &str) -> String {
    if raw.len() <= MAX_RAW_LEN {
        return raw.to_string();
    }
    let mut end = MAX_RAW_LEN;
    while !raw.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &raw[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;

    #[derive(Clone, Debug, PartialEq, Deserialize)]
    struct Answer {
        result: Option<String>,
    }

    impl Payload for Answer {
        fn is_recognized(&self) -> bool {
            self.result.is_some()
        }
    }

    #[derive(Clone, Debug, PartialEq, Deserialize)]
    struct Anything {}

    impl Payload for Anything {}

    fn completed(status: u16, body: &str) -> Attempt {
        Attempt::Completed(RawResponse::new(status, body))
    }

    #[test]
    fn test_success_with_answer() {
        let outcome: Outcome<Answer> =
            classify(Endpoint::Chat, &completed(200, r#"{"result":"42"}"#));
        assert_eq!(
            outcome,
            Outcome::Success(Answer {
                result: Some("42".to_string())
            })
        );
    }

    #[test]
    fn test_success_with_unrecognized_shape_is_malformed() {
        let outcome: Outcome<Answer> = classify(Endpoint::Chat, &completed(200, r#"{"foo":1}"#));
        assert_eq!(outcome.kind(), OutcomeKind::Malformed);

        let outcome: Outcome<Answer> = classify(Endpoint::Chat, &completed(200, "<html>"));
        assert_eq!(
            outcome,
            Outcome::Malformed {
                raw: "<html>".to_string()
            }
        );
    }

    #[test]
    fn test_empty_success_body_decodes_as_empty_object() {
        let outcome: Outcome<Anything> = classify(Endpoint::Delete, &completed(204, ""));
        assert_eq!(outcome, Outcome::Success(Anything {}));
    }

    #[test]
    fn test_not_found_depends_on_endpoint() {
        let chat: Outcome<Anything> = classify(Endpoint::Chat, &completed(404, ""));
        let history: Outcome<Anything> = classify(Endpoint::History, &completed(404, ""));
        let upload: Outcome<Anything> = classify(Endpoint::Upload, &completed(404, ""));
        let delete: Outcome<Anything> = classify(Endpoint::Delete, &completed(404, ""));

        assert_eq!(chat, Outcome::SessionExpired);
        assert_eq!(history, Outcome::SessionExpired);
        assert_eq!(upload, Outcome::NotFound);
        assert_eq!(delete, Outcome::NotFound);
    }

    #[test]
    fn test_auth_statuses() {
        for status in [401, 403] {
            let outcome: Outcome<Anything> = classify(Endpoint::Chat, &completed(status, ""));
            assert_eq!(outcome, Outcome::Unauthorized);
            assert!(outcome.needs_rebind());
        }
    }

    #[test]
    fn test_validation_detail_string() {
        let outcome: Outcome<Anything> = classify(
            Endpoint::Chat,
            &completed(422, r#"{"detail":"query must not be empty"}"#),
        );
        assert_eq!(
            outcome,
            Outcome::ValidationError {
                message: "query must not be empty".to_string()
            }
        );
    }

    #[test]
    fn test_validation_detail_list() {
        let body = r#"{"detail":[{"loc":["body","query"],"msg":"field required"},{"msg":"too short"}]}"#;
        let outcome: Outcome<Anything> = classify(Endpoint::Upload, &completed(422, body));
        assert_eq!(
            outcome,
            Outcome::ValidationError {
                message: "field required; too short".to_string()
            }
        );
    }

    #[test]
    fn test_validation_unparseable_body_falls_back() {
        let outcome: Outcome<Anything> =
            classify(Endpoint::Upload, &completed(400, "Bad Request"));
        assert_eq!(
            outcome,
            Outcome::ValidationError {
                message: GENERIC_VALIDATION_MESSAGE.to_string()
            }
        );
    }

    #[test]
    fn test_other_client_errors_are_validation() {
        let outcome: Outcome<Anything> = classify(Endpoint::Chat, &completed(409, ""));
        assert_eq!(outcome.kind(), OutcomeKind::ValidationError);
    }

    #[test]
    fn test_limits_and_server_errors() {
        let too_large: Outcome<Anything> = classify(Endpoint::Upload, &completed(413, ""));
        let limited: Outcome<Anything> = classify(Endpoint::Chat, &completed(429, "slow down"));
        let server: Outcome<Anything> = classify(Endpoint::Chat, &completed(503, "oops"));
        let detailed: Outcome<Anything> = classify(
            Endpoint::Chat,
            &completed(500, r#"{"message":"index unavailable"}"#),
        );

        assert_eq!(too_large, Outcome::PayloadTooLarge);
        assert_eq!(limited, Outcome::RateLimited);
        assert_eq!(
            server,
            Outcome::ServerError {
                message: GENERIC_SERVER_MESSAGE.to_string()
            }
        );
        assert_eq!(
            detailed,
            Outcome::ServerError {
                message: "index unavailable".to_string()
            }
        );
    }

    #[test]
    fn test_transport_outcomes() {
        let timeout: Outcome<Anything> = classify(Endpoint::Chat, &Attempt::TimedOut);
        let network: Outcome<Anything> = classify(
            Endpoint::Chat,
            &Attempt::Failed {
                reason: "connection refused".to_string(),
            },
        );

        assert_eq!(timeout, Outcome::Timeout);
        assert_eq!(
            network,
            Outcome::NetworkError {
                reason: "connection refused".to_string()
            }
        );
    }

    #[test]
    fn test_unexpected_status_class_is_malformed() {
        let outcome: Outcome<Anything> = classify(Endpoint::Chat, &completed(302, ""));
        assert_eq!(outcome.kind(), OutcomeKind::Malformed);
    }

    #[test]
    fn test_classification_is_idempotent() {
        let attempts = [
            completed(200, r#"{"result":"hi"}"#),
            completed(200, "nope"),
            completed(404, ""),
            completed(422, r#"{"detail":"bad"}"#),
            completed(500, ""),
            Attempt::TimedOut,
        ];

        for attempt in &attempts {
            let first: Outcome<Answer> = classify(Endpoint::Chat, attempt);
            let second: Outcome<Answer> = classify(Endpoint::Chat, attempt);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_malformed_raw_is_truncated() {
        let body = "x".repeat(2_000);
        let outcome: Outcome<Answer> = classify(Endpoint::Chat, &completed(200, &body));
        match outcome {
            Outcome::Malformed { raw } => assert!(raw.len() < 600),
            other => panic!("Expected Malformed, got {other:?}"),
        }
    }

    #[test]
    fn test_error_detail_ignores_blank() {
        assert_eq!(error_detail(r#"{"detail":"   "}"#), None);
        assert_eq!(error_detail("plain text"), None);
        assert_eq!(
            error_detail(r#"{"error":"quota exceeded"}"#),
            Some("quota exceeded".to_string())
        );
    }
}
