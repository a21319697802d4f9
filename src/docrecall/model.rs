use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

const UNTITLED_PREFIX: &str = "untitled:/";

/// Full path of the document a stored row belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionKey(String);

impl SessionKey {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Placeholder key for a document that has no path on disk yet.
    pub fn untitled() -> Self {
        Self(format!("{}{}", UNTITLED_PREFIX, Uuid::new_v4()))
    }

    pub fn is_untitled(&self) -> bool {
        self.0.starts_with(UNTITLED_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionKey {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for SessionKey {
    fn from(path: String) -> Self {
        Self(path)
    }
}

/// The two independent persistence features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    HotClose,
    LocalHistory,
}

impl Scope {
    pub fn tables(self) -> &'static [Table] {
        match self {
            Scope::HotClose => &Table::HOT_CLOSE,
            Scope::LocalHistory => &[Table::LocalHistory],
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::HotClose => f.write_str("hot close"),
            Scope::LocalHistory => f.write_str("local history"),
        }
    }
}

/// The five bounded tables. Table names only ever come from here, so they
/// are safe to splice into SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Table {
    CursorPos,
    ScrollPos,
    UndoRedoHistory,
    UnsavedDocChanges,
    LocalHistory,
}

impl Table {
    pub const HOT_CLOSE: [Table; 4] = [
        Table::CursorPos,
        Table::ScrollPos,
        Table::UndoRedoHistory,
        Table::UnsavedDocChanges,
    ];

    pub const ALL: [Table; 5] = [
        Table::CursorPos,
        Table::ScrollPos,
        Table::UndoRedoHistory,
        Table::UnsavedDocChanges,
        Table::LocalHistory,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Table::CursorPos => "cursorpos_coords",
            Table::ScrollPos => "scrollpos_coords",
            Table::UndoRedoHistory => "undo_redo_history",
            Table::UnsavedDocChanges => "unsaved_doc_changes",
            Table::LocalHistory => "local_history_doctxt",
        }
    }

    pub fn scope(self) -> Scope {
        match self {
            Table::LocalHistory => Scope::LocalHistory,
            _ => Scope::HotClose,
        }
    }

    pub fn is_hot_close(self) -> bool {
        self.scope() == Scope::HotClose
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One kind of hot-close state. Each kind lives in its own table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    CursorPosition,
    ScrollPosition,
    UndoRedoHistory,
    DocumentText,
}

impl FieldKind {
    pub const ALL: [FieldKind; 4] = [
        FieldKind::CursorPosition,
        FieldKind::ScrollPosition,
        FieldKind::UndoRedoHistory,
        FieldKind::DocumentText,
    ];

    pub fn table(self) -> Table {
        match self {
            FieldKind::CursorPosition => Table::CursorPos,
            FieldKind::ScrollPosition => Table::ScrollPos,
            FieldKind::UndoRedoHistory => Table::UndoRedoHistory,
            FieldKind::DocumentText => Table::UnsavedDocChanges,
        }
    }

    /// Document text is stored as plain text; everything else goes through JSON.
    pub fn is_structured(self) -> bool {
        !matches!(self, FieldKind::DocumentText)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CursorPos {
    pub line: u32,
    pub ch: u32,
}

impl CursorPos {
    pub fn new(line: u32, ch: u32) -> Self {
        Self { line, ch }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScrollPos {
    pub x: f64,
    pub y: f64,
}

impl ScrollPos {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Decoded hot-close state for one session. Absent or undecodable fields are `None`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct HotCloseState {
    pub cursor: Option<CursorPos>,
    pub scroll: Option<ScrollPos>,
    pub history: Option<Value>,
    pub text: Option<String>,
}

impl HotCloseState {
    pub fn is_empty(&self) -> bool {
        self.cursor.is_none() && self.scroll.is_none() && self.history.is_none() && self.text.is_none()
    }
}

/// One retained local-history copy of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Capture time in milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub text: String,
}

/// What a `read_session` call yields for each scope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SessionData {
    HotClose(HotCloseState),
    LocalHistory(Vec<Snapshot>),
}

impl SessionData {
    pub fn is_empty(&self) -> bool {
        match self {
            SessionData::HotClose(state) => state.is_empty(),
            SessionData::LocalHistory(snapshots) => snapshots.is_empty(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Features {
    #[serde(default = "enabled")]
    pub hot_close: bool,
    #[serde(default = "enabled")]
    pub local_history: bool,
}

fn enabled() -> bool {
    true
}

impl Default for Features {
    fn default() -> Self {
        Self {
            hot_close: true,
            local_history: true,
        }
    }
}

impl Features {
    pub fn enabled(self, scope: Scope) -> bool {
        match scope {
            Scope::HotClose => self.hot_close,
            Scope::LocalHistory => self.local_history,
        }
    }
}
