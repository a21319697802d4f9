//! The editor side of a capture.
//!
//! The engine only ever reads from an editor session. Anything that can answer
//! these questions can be captured: a live editor buffer, a test double, or the
//! plain [`DocumentState`] value the CLI builds from files on disk.

use crate::model::{CursorPos, ScrollPos, SessionKey};
use serde_json::Value;

/// Read-only view of one open document.
pub trait EditorSession: Send + Sync {
    /// Identity of the document right now. Captures call this when they run,
    /// not when they were scheduled, so a rename between the two is honored.
    fn file_path(&self) -> SessionKey;
    fn cursor_pos(&self) -> CursorPos;
    fn scroll_pos(&self) -> ScrollPos;
    /// Opaque undo/redo history, stored as given.
    fn history(&self) -> Value;
    fn value(&self) -> String;
    fn is_dirty(&self) -> bool;
}

/// An editor session as plain data.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentState {
    pub path: SessionKey,
    pub cursor: CursorPos,
    pub scroll: ScrollPos,
    pub history: Value,
    pub text: String,
    pub dirty: bool,
}

impl DocumentState {
    /// A dirty document with empty history at the top of the file.
    pub fn new(path: impl Into<SessionKey>, text: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            cursor: CursorPos::default(),
            scroll: ScrollPos::default(),
            history: Value::Null,
            text: text.into(),
            dirty: true,
        }
    }

    pub fn with_cursor(mut self, line: u32, ch: u32) -> Self {
        self.cursor = CursorPos::new(line, ch);
        self
    }

    pub fn with_scroll(mut self, x: f64, y: f64) -> Self {
        self.scroll = ScrollPos::new(x, y);
        self
    }

    pub fn with_history(mut self, history: Value) -> Self {
        self.history = history;
        self
    }

    pub fn clean(mut self) -> Self {
        self.dirty = false;
        self
    }
}

impl EditorSession for DocumentState {
    fn file_path(&self) -> SessionKey {
        self.path.clone()
    }

    fn cursor_pos(&self) -> CursorPos {
        self.cursor
    }

    fn scroll_pos(&self) -> ScrollPos {
        self.scroll
    }

    fn history(&self) -> Value {
        self.history.clone()
    }

    fn value(&self) -> String {
        self.text.clone()
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }
}
