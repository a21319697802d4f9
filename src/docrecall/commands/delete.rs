use super::{CmdMessage, CmdResult, Engine};
use crate::model::{Scope, SessionKey, Table};
use crate::store::TableStore;

/// Hot close: drop the session's recovery state. Local history: drop one
/// snapshot, or every snapshot of the session when no timestamp is given.
pub fn run<S: TableStore>(
    engine: &Engine<S>,
    session: &SessionKey,
    scope: Scope,
    timestamp: Option<i64>,
) -> CmdResult {
    let mut result = CmdResult::default();

    let removed = match scope {
        Scope::HotClose => Ok(engine.retention.purge_session(session, &Table::HOT_CLOSE)),
        Scope::LocalHistory => match timestamp {
            Some(ts) => engine.store.delete_at(Table::LocalHistory, session, ts),
            None => engine.store.delete_session(Table::LocalHistory, session),
        },
    };

    match removed {
        Ok(0) => result.add_message(CmdMessage::info(format!(
            "Nothing stored for {} in {}.",
            session, scope
        ))),
        Ok(n) => {
            result.removed = n;
            result.add_message(CmdMessage::success(format!(
                "Removed {} row(s) for {} from {}.",
                n, session, scope
            )));
        }
        Err(err) => {
            if err.is_unavailable() {
                tracing::debug!(session = %session, scope = %scope, "Delete skipped, store unavailable");
            } else {
                tracing::warn!(session = %session, scope = %scope, error = %err, "Delete failed");
            }
            result.add_message(CmdMessage::warning(format!("Could not delete: {}", err)));
        }
    }

    result
}
