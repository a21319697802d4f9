//! Writing editor state into the store.
//!
//! A hot-close capture is four independent writes: cursor, scroll and history
//! first, then the document text. One failing field never stops the others.
//! When the document turns out to be clean after the writes, the session's
//! hot-close rows are purged, so a clean document leaves nothing to recover.

use super::{now_millis, Engine};
use crate::codec::encode_value;
use crate::editor::EditorSession;
use crate::model::{FieldKind, Scope, SessionKey, Table};
use crate::store::TableStore;
use crate::upsert::{WriteOutcome, WriteStatus};

#[derive(Debug, Clone)]
pub struct CaptureReport {
    pub session: SessionKey,
    pub fields: Vec<(FieldKind, WriteOutcome)>,
    /// Rows purged because the document was clean. `None` if it was dirty.
    pub purged: Option<usize>,
}

impl CaptureReport {
    pub fn stored(&self) -> usize {
        self.fields.iter().filter(|(_, o)| o.is_stored()).count()
    }

    pub fn outcome(&self, kind: FieldKind) -> Option<&WriteOutcome> {
        self.fields.iter().find(|(k, _)| *k == kind).map(|(_, o)| o)
    }
}

#[derive(Debug, Clone)]
pub struct SaveReport {
    pub session: SessionKey,
    pub snapshot: WriteOutcome,
    pub purged: usize,
}

fn encoded<S: TableStore>(engine: &Engine<S>, kind: FieldKind, editor: &dyn EditorSession) -> Result<String, String> {
    let codec = engine.codec.as_ref();
    let result = match kind {
        FieldKind::CursorPosition => encode_value(codec, &editor.cursor_pos()),
        FieldKind::ScrollPosition => encode_value(codec, &editor.scroll_pos()),
        FieldKind::UndoRedoHistory => encode_value(codec, &editor.history()),
        FieldKind::DocumentText => codec.encode_text(&editor.value()),
    };
    result.map_err(|e| e.to_string())
}

pub fn unsaved_changes<S: TableStore>(engine: &Engine<S>, editor: &dyn EditorSession) -> CaptureReport {
    let session = editor.file_path();

    if !engine.enabled(Scope::HotClose) {
        let fields = FieldKind::ALL
            .iter()
            .map(|&k| (k, WriteOutcome::new(k.table(), WriteStatus::Disabled)))
            .collect();
        return CaptureReport {
            session,
            fields,
            purged: None,
        };
    }

    let touched_at = now_millis();
    let mut fields = Vec::with_capacity(FieldKind::ALL.len());
    for kind in FieldKind::ALL {
        let outcome = match encoded(engine, kind, editor) {
            Ok(value) => engine.upserter.write(kind.table(), &session, &value, touched_at),
            Err(reason) => {
                tracing::warn!(session = %session, field = ?kind, error = %reason, "Could not encode field");
                WriteOutcome::new(kind.table(), WriteStatus::EncodeFailed(reason))
            }
        };
        fields.push((kind, outcome));
    }

    let purged = (!editor.is_dirty()).then(|| engine.retention.purge_session(&session, &Table::HOT_CLOSE));

    CaptureReport {
        session,
        fields,
        purged,
    }
}

pub fn local_history_snapshot<S: TableStore>(
    engine: &Engine<S>,
    session: &SessionKey,
    text: &str,
    timestamp: i64,
) -> WriteOutcome {
    if !engine.enabled(Scope::LocalHistory) {
        return WriteOutcome::new(Table::LocalHistory, WriteStatus::Disabled);
    }
    match engine.codec.encode_text(text) {
        Ok(value) => engine
            .upserter
            .write(Table::LocalHistory, session, &value, timestamp),
        Err(err) => {
            tracing::warn!(session = %session, error = %err, "Could not encode snapshot");
            WriteOutcome::new(Table::LocalHistory, WriteStatus::EncodeFailed(err.to_string()))
        }
    }
}

/// A save: snapshot the saved text, and drop the recovery state it made obsolete.
pub fn record_save<S: TableStore>(engine: &Engine<S>, editor: &dyn EditorSession, timestamp: i64) -> SaveReport {
    let session = editor.file_path();
    let snapshot = local_history_snapshot(engine, &session, &editor.value(), timestamp);
    let purged = if engine.enabled(Scope::HotClose) {
        engine.retention.purge_session(&session, &Table::HOT_CLOSE)
    } else {
        0
    };
    SaveReport {
        session,
        snapshot,
        purged,
    }
}
