//! History Loader
//!
//! Best-effort retrieval of the turns previously exchanged under a chat id.
//! Any failure yields `None`; history never produces a notice.

use std::time::Duration;

use chrono::Utc;

use crate::backend::{bounded, RemoteService};
use crate::classifier::{classify, Endpoint, Outcome};
use crate::conversation::{Sender, Turn, TurnKind};
use crate::payload::{parse_timestamp, HistoryPage, HistoryRecord};
use crate::session::SessionId;

/// Fetch and order the stored turns of `session_id`
///
/// Returns at most the last `limit` turns, oldest first.
pub async fn load_history<B>(
    backend: &B,
    session_id: &SessionId,
    limit: usize,
    timeout: Duration,
) -> Option<Vec<Turn>>
where
    B: RemoteService + ?Sized,
{
    let attempt = bounded(timeout, backend.get_history(session_id, limit)).await;

    match classify::<HistoryPage>(Endpoint::History, &attempt) {
        Outcome::Success(page) => {
            let turns = order_records(page.into_records(), limit);
            tracing::debug!(
                session_id = %session_id,
                turns = turns.len(),
                "Loaded conversation history"
            );
            Some(turns)
        }
        other => {
            tracing::debug!(
                session_id = %session_id,
                outcome = ?other.kind(),
                "History unavailable"
            );
            None
        }
    }
}

/// Map records to turns, sort ascending by time, keep the last `limit`
///
/// The sort is stable and records without a readable timestamp sort first,
/// keeping their relative order. They are stamped with the earliest known
/// timestamp, so the turns stay ascending by [`Turn::timestamp`].
#[must_use]
pub fn order_records(records: Vec<HistoryRecord>, limit: usize) -> Vec<Turn> {
    let mut stamped: Vec<_> = records
        .into_iter()
        .map(|record| {
            let at = record.timestamp.as_ref().and_then(parse_timestamp);
            (at, record)
        })
        .collect();
    stamped.sort_by_key(|(at, _)| *at);
    let earliest = stamped
        .iter()
        .find_map(|(at, _)| *at)
        .unwrap_or_else(Utc::now);

    let skip = stamped.len().saturating_sub(limit);
    stamped
        .into_iter()
        .skip(skip)
        .map(|(at, record)| {
            let sender = if record.role.eq_ignore_ascii_case("user") {
                Sender::User
            } else {
                Sender::Assistant
            };
            Turn::at(
                record.content,
                sender,
                TurnKind::Reply,
                at.unwrap_or(earliest),
            )
        })
        .collect()
}
