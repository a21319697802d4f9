//! # API Facade
//!
//! [`RecallApi`] is the single entry point for every docrecall operation. It
//! owns the wired engine (store, codec, upserter, retention policy) and the
//! per-session debounce handles, and dispatches to `commands/*.rs`.
//!
//! ## Dependencies Are Injected
//!
//! Nothing is looked up globally. [`RecallApi::new`] takes the codec,
//! upserter and retention policy it should use; [`RecallApi::from_config`]
//! is the convenience wiring of the default parts.
//!
//! ## Failure Model
//!
//! Capture, read, delete and wipe never return `Err`. Storage faults become
//! outcome values (`WriteOutcome`, `CaptureReport`) or empty reads, and are
//! logged. `Result` is only used where the caller did something wrong, such
//! as scheduling without a tokio runtime.
//!
//! ## Debounced Capture
//!
//! ```text
//! editor keyup ──▶ Trigger::touch ──(1250ms quiet)──▶ capture_unsaved_changes
//! ```
//!
//! The scheduled closure holds both the API and the editor weakly: dropping
//! either silences the pending capture. A session is released from the
//! scheduler once it is saved or a capture finds it clean.

use crate::codec::{Codec, DeflateCodec};
use crate::commands::capture::{CaptureReport, SaveReport};
use crate::commands::doctor::DoctorReport;
use crate::commands::{self, CmdResult, Engine};
use crate::config::RecallConfig;
use crate::editor::EditorSession;
use crate::error::Result;
use crate::model::{Features, Scope, SessionData, SessionKey, Snapshot};
use crate::retention::RetentionPolicy;
use crate::schema::SchemaReport;
use crate::scheduler::{SyncScheduler, Trigger};
use crate::store::TableStore;
use crate::upsert::{Upserter, WriteOutcome};
use std::sync::Arc;
use std::time::Duration;

pub struct RecallApi<S: TableStore> {
    engine: Engine<S>,
    scheduler: SyncScheduler,
}

impl<S: TableStore + 'static> RecallApi<S> {
    pub fn new(
        store: Arc<S>,
        codec: Arc<dyn Codec>,
        upserter: Upserter<S>,
        retention: RetentionPolicy<S>,
        debounce: Duration,
    ) -> Self {
        Self {
            engine: Engine::new(store, codec, upserter, retention),
            scheduler: SyncScheduler::new(debounce),
        }
    }

    /// Wire the default parts from a config. Features are recorded but no
    /// table is created until [`initialize_schema`](Self::initialize_schema).
    pub fn from_config(store: Arc<S>, config: &RecallConfig) -> Self {
        let retention = RetentionPolicy::new(Arc::clone(&store), config.snapshots_per_session);
        let upserter = Upserter::new(Arc::clone(&store), retention.clone());
        let codec = Arc::new(DeflateCodec::new(config.compression_level));
        let api = Self::new(store, codec, upserter, retention, config.debounce());
        api.engine.set_features(config.features);
        api
    }

    pub fn store(&self) -> &Arc<S> {
        &self.engine.store
    }

    pub fn features(&self) -> Features {
        self.engine.features()
    }

    pub fn initialize_schema(&self, features: Features) -> SchemaReport {
        self.engine.set_features(features);
        self.engine.schema.initialize(features)
    }

    /// Same as [`initialize_schema`](Self::initialize_schema), reported as messages.
    pub fn init(&self, features: Features) -> CmdResult {
        commands::init::run(&self.engine, features)
    }

    /// Get the debounce trigger for the editor's session. Touch it on every
    /// edit; the capture runs once edits go quiet.
    ///
    /// The editor is not kept alive by the scheduler: the caller owns it.
    pub fn schedule_capture(
        self: &Arc<Self>,
        editor: Arc<dyn EditorSession>,
        delay: Option<Duration>,
    ) -> Result<Trigger> {
        let api = Arc::downgrade(self);
        let session = editor.file_path();
        let scheduled_as = session.clone();
        let editor = Arc::downgrade(&editor);
        self.scheduler.schedule(session, delay, move || {
            let (Some(api), Some(editor)) = (api.upgrade(), editor.upgrade()) else {
                return;
            };
            let report = api.capture_unsaved_changes(editor.as_ref());
            if report.purged.is_some() {
                api.scheduler.release(&scheduled_as);
            }
        })
    }

    /// Run every pending debounced capture now.
    pub fn flush_pending(&self) -> usize {
        self.scheduler.flush_all()
    }

    pub fn cancel_capture(&self, session: &SessionKey) -> bool {
        self.scheduler.remove(session)
    }

    pub fn capture_unsaved_changes(&self, editor: &dyn EditorSession) -> CaptureReport {
        commands::capture::unsaved_changes(&self.engine, editor)
    }

    pub fn capture_local_history_snapshot(
        &self,
        session: &SessionKey,
        text: &str,
        timestamp: i64,
    ) -> WriteOutcome {
        commands::capture::local_history_snapshot(&self.engine, session, text, timestamp)
    }

    /// Snapshot the saved text and drop the session's recovery state,
    /// including any capture still pending for it.
    pub fn record_save(&self, editor: &dyn EditorSession, timestamp: i64) -> SaveReport {
        let report = commands::capture::record_save(&self.engine, editor, timestamp);
        self.scheduler.remove(&report.session);
        report
    }

    pub fn read_session(&self, session: &SessionKey, scope: Scope) -> SessionData {
        commands::read::session(&self.engine, session, scope)
    }

    pub fn read_snapshot(&self, session: &SessionKey, timestamp: i64) -> Option<Snapshot> {
        commands::read::snapshot(&self.engine, session, timestamp)
    }

    pub fn delete_session(
        &self,
        session: &SessionKey,
        scope: Scope,
        timestamp: Option<i64>,
    ) -> CmdResult {
        commands::delete::run(&self.engine, session, scope, timestamp)
    }

    pub fn wipe_all(&self, scope: Scope) -> CmdResult {
        commands::wipe::run(&self.engine, scope)
    }

    pub fn usage(&self) -> CmdResult {
        commands::stats::run(&self.engine)
    }

    pub fn doctor(&self) -> CmdResult {
        commands::doctor::run(&self.engine)
    }

    pub fn doctor_report(&self) -> DoctorReport {
        commands::doctor::scan(&self.engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::DocumentState;
    use crate::model::{CursorPos, Table};
    use crate::store::memory::InMemoryStore;
    use std::sync::Mutex;
    use tokio::time::sleep;

    fn api() -> (Arc<InMemoryStore>, RecallApi<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let api = RecallApi::from_config(Arc::clone(&store), &RecallConfig::default());
        api.initialize_schema(Features::default());
        (store, api)
    }

    #[test]
    fn from_config_applies_settings() {
        let mut config = RecallConfig::default();
        config.features.local_history = false;
        config.snapshots_per_session = 2;
        let api = RecallApi::from_config(Arc::new(InMemoryStore::new()), &config);

        assert!(!api.features().local_history);
        assert!(api.init(api.features()).messages.len() == 1);
        assert!(!api.store().has_table(Table::LocalHistory));
    }

    #[test]
    fn dispatches_capture_and_read() {
        let (_store, api) = api();
        let doc = DocumentState::new("/a.js", "body").with_cursor(4, 2);

        api.capture_unsaved_changes(&doc);

        match api.read_session(&"/a.js".into(), Scope::HotClose) {
            SessionData::HotClose(state) => assert_eq!(state.cursor, Some(CursorPos::new(4, 2))),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn dispatches_snapshot_delete_and_wipe() {
        let (_store, api) = api();
        let a = SessionKey::from("/a.js");
        api.capture_local_history_snapshot(&a, "hello", 100);

        assert_eq!(api.read_snapshot(&a, 100).map(|s| s.text), Some("hello".into()));
        assert_eq!(api.delete_session(&a, Scope::LocalHistory, Some(100)).removed, 1);

        api.capture_local_history_snapshot(&a, "again", 200);
        api.wipe_all(Scope::LocalHistory);
        assert!(api.read_session(&a, Scope::LocalHistory).is_empty());
    }

    #[test]
    fn dispatches_usage_and_doctor() {
        let (_store, api) = api();
        assert_eq!(api.usage().usage.len(), 5);
        assert_eq!(api.doctor_report(), DoctorReport::default());
    }

    /// An editor whose path and text can change while a capture is pending.
    struct LiveEditor {
        state: Mutex<DocumentState>,
    }

    impl EditorSession for LiveEditor {
        fn file_path(&self) -> SessionKey {
            self.state.lock().unwrap().file_path()
        }
        fn cursor_pos(&self) -> CursorPos {
            self.state.lock().unwrap().cursor_pos()
        }
        fn scroll_pos(&self) -> crate::model::ScrollPos {
            self.state.lock().unwrap().scroll_pos()
        }
        fn history(&self) -> serde_json::Value {
            self.state.lock().unwrap().history()
        }
        fn value(&self) -> String {
            self.state.lock().unwrap().value()
        }
        fn is_dirty(&self) -> bool {
            self.state.lock().unwrap().is_dirty()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn scheduled_capture_uses_identity_at_run_time() {
        let (_store, api) = api();
        let api = Arc::new(api);
        let editor = Arc::new(LiveEditor {
            state: Mutex::new(DocumentState::new("/draft.js", "v1")),
        });

        let trigger = api.schedule_capture(editor.clone(), None).unwrap();
        trigger.touch();
        sleep(Duration::from_millis(500)).await;
        {
            let mut state = editor.state.lock().unwrap();
            state.path = "/renamed.js".into();
            state.text = "v2".into();
        }
        trigger.touch();
        sleep(Duration::from_millis(2000)).await;

        assert!(api.read_session(&"/draft.js".into(), Scope::HotClose).is_empty());
        match api.read_session(&"/renamed.js".into(), Scope::HotClose) {
            SessionData::HotClose(state) => assert_eq!(state.text.as_deref(), Some("v2")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn flush_pending_captures_immediately() {
        let (_store, api) = api();
        let api = Arc::new(api);
        let editor: Arc<dyn EditorSession> = Arc::new(DocumentState::new("/a.js", "unsaved"));

        api.schedule_capture(editor.clone(), Some(Duration::from_secs(60)))
            .unwrap()
            .touch();

        assert_eq!(api.flush_pending(), 1);
        assert!(!api.read_session(&"/a.js".into(), Scope::HotClose).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_api_silences_pending_capture() {
        let (store, api) = api();
        let api = Arc::new(api);
        let editor: Arc<dyn EditorSession> = Arc::new(DocumentState::new("/a.js", "unsaved"));
        let trigger = api.schedule_capture(editor.clone(), None).unwrap();
        trigger.touch();

        drop(api);
        sleep(Duration::from_secs(5)).await;

        assert!(store.rows(Table::UnsavedDocChanges).unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn saved_session_is_released_and_editor_not_retained() {
        let (_store, api) = api();
        let api = Arc::new(api);
        let editor = Arc::new(DocumentState::new("/a.js", "draft"));
        let trigger = api.schedule_capture(editor.clone(), None).unwrap();
        trigger.touch();
        sleep(Duration::from_secs(2)).await;
        assert!(!api.read_session(&"/a.js".into(), Scope::HotClose).is_empty());

        api.record_save(&DocumentState::new("/a.js", "draft").clean(), 10);

        assert!(api.scheduler.trigger(&"/a.js".into()).is_none());
        assert_eq!(Arc::strong_count(&editor), 1);
        assert!(api.read_session(&"/a.js".into(), Scope::HotClose).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn clean_capture_releases_the_session() {
        let (_store, api) = api();
        let api = Arc::new(api);
        let editor = Arc::new(DocumentState::new("/a.js", "saved").clean());

        api.schedule_capture(editor.clone(), None).unwrap().touch();
        assert!(api.scheduler.trigger(&"/a.js".into()).is_some());
        sleep(Duration::from_secs(2)).await;

        assert!(api.scheduler.trigger(&"/a.js".into()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_editor_skips_the_capture() {
        let (store, api) = api();
        let api = Arc::new(api);
        let editor: Arc<dyn EditorSession> = Arc::new(DocumentState::new("/a.js", "unsaved"));
        let trigger = api.schedule_capture(editor.clone(), None).unwrap();
        trigger.touch();

        drop(editor);
        sleep(Duration::from_secs(5)).await;

        assert!(store.rows(Table::UnsavedDocChanges).unwrap().is_empty());
    }

    /// Formatted log output, shared with the subscriber under test.
    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn unavailable_store_is_logged_once() {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let store = Arc::new(InMemoryStore::new());
            store.set_unavailable(true);
            let api = RecallApi::from_config(Arc::clone(&store), &RecallConfig::default());
            let a = SessionKey::from("/a.js");

            api.init(Features::default());
            for ts in 0..3 {
                api.capture_unsaved_changes(&DocumentState::new("/a.js", "draft"));
                api.capture_local_history_snapshot(&a, "draft", ts);
                api.read_session(&a, Scope::HotClose);
                api.read_session(&a, Scope::LocalHistory);
            }
            api.record_save(&DocumentState::new("/a.js", "draft").clean(), 10);
            api.delete_session(&a, Scope::LocalHistory, None);
            api.wipe_all(Scope::HotClose);
        });

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert_eq!(output.lines().count(), 1, "{}", output);
        assert!(output.contains("Store unavailable"));
    }
}
