use crate::codec::Codec;
use crate::config::RecallConfig;
use crate::model::{Features, Scope};
use crate::retention::RetentionPolicy;
use crate::schema::SchemaManager;
use crate::store::{TableStore, TableUsage};
use crate::upsert::Upserter;
use chrono::Utc;
use std::sync::{Arc, Mutex, PoisonError};

pub mod capture;
pub mod config;
pub mod delete;
pub mod doctor;
pub mod init;
pub mod read;
pub mod stats;
pub mod wipe;

/// Everything a command needs, wired once by the API.
pub struct Engine<S: TableStore> {
    pub store: Arc<S>,
    pub codec: Arc<dyn Codec>,
    pub upserter: Upserter<S>,
    pub retention: RetentionPolicy<S>,
    pub schema: SchemaManager<S>,
    features: Mutex<Features>,
}

impl<S: TableStore> Engine<S> {
    pub fn new(
        store: Arc<S>,
        codec: Arc<dyn Codec>,
        upserter: Upserter<S>,
        retention: RetentionPolicy<S>,
    ) -> Self {
        Self {
            schema: SchemaManager::new(Arc::clone(&store)),
            store,
            codec,
            upserter,
            retention,
            features: Mutex::new(Features::default()),
        }
    }

    pub fn features(&self) -> Features {
        *self.features.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_features(&self, features: Features) {
        *self.features.lock().unwrap_or_else(PoisonError::into_inner) = features;
    }

    pub fn enabled(&self, scope: Scope) -> bool {
        self.features().enabled(scope)
    }
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct CmdMessage {
    pub level: MessageLevel,
    pub content: String,
}

impl CmdMessage {
    pub fn info(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Info,
            content: content.into(),
        }
    }

    pub fn success(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Success,
            content: content.into(),
        }
    }

    pub fn warning(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Warning,
            content: content.into(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Error,
            content: content.into(),
        }
    }
}

#[derive(Debug, Default)]
pub struct CmdResult {
    pub messages: Vec<CmdMessage>,
    /// Rows removed by the command, if it removes any.
    pub removed: usize,
    pub usage: Vec<TableUsage>,
    pub config: Option<RecallConfig>,
}

impl CmdResult {
    pub fn add_message(&mut self, message: CmdMessage) {
        self.messages.push(message);
    }

    pub fn with_usage(mut self, usage: Vec<TableUsage>) -> Self {
        self.usage = usage;
        self
    }

    pub fn with_config(mut self, config: RecallConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn has_errors(&self) -> bool {
        self.messages.iter().any(|m| m.level == MessageLevel::Error)
    }
}
