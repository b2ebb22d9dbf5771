//! Plain-text rendering of turns, documents and reports

use edubot_core::{
    DeleteReport, DocumentEntry, DocumentReport, DocumentStatus, Sender, Session, Turn, TurnKind,
    UploadReport,
};

/// One conversation turn
pub fn turn(turn: &Turn) -> String {
    match (turn.sender(), turn.kind()) {
        (Sender::User, _) => format!("you> {}", turn.text()),
        (Sender::Assistant, TurnKind::Reply) => format!("edubot> {}", turn.text()),
        (Sender::Assistant, TurnKind::Notice) => format!("  * {}", turn.text()),
    }
}

/// One library row
pub fn entry(entry: &DocumentEntry) -> String {
    let mut row = format!(
        "{:<14} {} [{}] {} {}",
        entry.id.as_str(),
        entry.name,
        entry.subject,
        entry.size_label(),
        entry.date_label()
    );
    if entry.status() == DocumentStatus::Deleting {
        row.push_str(" (deleting)");
    }
    row
}

/// The whole library, newest first
pub fn library<'a>(entries: impl IntoIterator<Item = &'a DocumentEntry>) -> String {
    let rows: Vec<String> = entries.into_iter().map(entry).collect();
    if rows.is_empty() {
        "No documents uploaded yet.".to_string()
    } else {
        rows.join("\n")
    }
}

/// A settled upload or delete
pub fn report(report: &DocumentReport) -> String {
    match report {
        DocumentReport::Upload(UploadReport::Uploaded { entry, message, .. }) => {
            format!("{message}: {} ({})", entry.name, entry.id)
        }
        DocumentReport::Upload(UploadReport::Failed {
            file_name, failure, ..
        }) => format!("Upload of {file_name} failed: {failure}"),
        DocumentReport::Delete(DeleteReport::Deleted { id, message, .. }) => {
            format!("{message}: {id}")
        }
        DocumentReport::Delete(DeleteReport::AlreadyDeleted { id, .. }) => {
            format!("{id} was already gone from the service; removed from the list")
        }
        DocumentReport::Delete(DeleteReport::Failed { id, failure, .. }) => {
            format!("Could not delete {id}: {failure}")
        }
    }
}

/// Session id and state
pub fn session(session: &Session) -> String {
    match session.id() {
        Some(id) => format!("session {id} ({})", session.state()),
        None => format!("no session id ({})", session.state()),
    }
}
