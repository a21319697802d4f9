//! Reading stored state back.
//!
//! Reads never fail. A missing table, an unavailable store or a payload that
//! no longer decodes all read as "nothing stored" for that field.

use super::Engine;
use crate::codec::decode_value;
use crate::error::StoreError;
use crate::model::{FieldKind, HotCloseState, Scope, SessionData, SessionKey, Snapshot, Table};
use crate::store::{Row, TableStore};

fn newest_row<S: TableStore>(engine: &Engine<S>, table: Table, session: &SessionKey) -> Option<Row> {
    match engine.store.select(table, session) {
        Ok(rows) => rows.into_iter().next(),
        Err(err) => {
            log_read_failure(table, session, &err);
            None
        }
    }
}

fn log_read_failure(table: Table, session: &SessionKey, err: &StoreError) {
    match err {
        StoreError::MissingTable { .. } => {
            tracing::debug!(table = %table, session = %session, "Nothing stored, table missing");
        }
        StoreError::Unavailable => {
            tracing::debug!(table = %table, session = %session, "Nothing read, store unavailable");
        }
        _ => tracing::warn!(table = %table, session = %session, error = %err, "Read failed"),
    }
}

fn decode_field<S: TableStore>(engine: &Engine<S>, kind: FieldKind, session: &SessionKey, state: &mut HotCloseState) {
    let Some(row) = newest_row(engine, kind.table(), session) else {
        return;
    };
    let codec = engine.codec.as_ref();
    let decoded = match kind {
        FieldKind::CursorPosition => decode_value(codec, &row.value).map(|v| state.cursor = Some(v)),
        FieldKind::ScrollPosition => decode_value(codec, &row.value).map(|v| state.scroll = Some(v)),
        FieldKind::UndoRedoHistory => decode_value(codec, &row.value).map(|v| state.history = Some(v)),
        FieldKind::DocumentText => codec.decode_text(&row.value).map(|v| state.text = Some(v)),
    };
    if let Err(err) = decoded {
        tracing::warn!(table = %kind.table(), session = %session, error = %err, "Stored value does not decode");
    }
}

pub fn hot_close<S: TableStore>(engine: &Engine<S>, session: &SessionKey) -> HotCloseState {
    let mut state = HotCloseState::default();
    for kind in FieldKind::ALL {
        decode_field(engine, kind, session, &mut state);
    }
    state
}

/// All snapshots of a session, newest first.
pub fn local_history<S: TableStore>(engine: &Engine<S>, session: &SessionKey) -> Vec<Snapshot> {
    let rows = match engine.store.select(Table::LocalHistory, session) {
        Ok(rows) => rows,
        Err(err) => {
            log_read_failure(Table::LocalHistory, session, &err);
            return Vec::new();
        }
    };

    let mut snapshots: Vec<Snapshot> = rows
        .into_iter()
        .filter_map(|row| match engine.codec.decode_text(&row.value) {
            Ok(text) => Some(Snapshot {
                timestamp: row.timestamp,
                text,
            }),
            Err(err) => {
                tracing::warn!(session = %session, timestamp = row.timestamp, error = %err, "Skipping undecodable snapshot");
                None
            }
        })
        .collect();
    snapshots.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    snapshots
}

pub fn session<S: TableStore>(engine: &Engine<S>, session: &SessionKey, scope: Scope) -> SessionData {
    match scope {
        Scope::HotClose => SessionData::HotClose(hot_close(engine, session)),
        Scope::LocalHistory => SessionData::LocalHistory(local_history(engine, session)),
    }
}

pub fn snapshot<S: TableStore>(engine: &Engine<S>, session: &SessionKey, timestamp: i64) -> Option<Snapshot> {
    let row = match engine.store.select_at(Table::LocalHistory, session, timestamp) {
        Ok(row) => row?,
        Err(err) => {
            log_read_failure(Table::LocalHistory, session, &err);
            return None;
        }
    };
    match engine.codec.decode_text(&row.value) {
        Ok(text) => Some(Snapshot { timestamp, text }),
        Err(err) => {
            tracing::warn!(session = %session, timestamp, error = %err, "Snapshot does not decode");
            None
        }
    }
}
