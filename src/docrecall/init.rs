use crate::api::RecallApi;
use crate::config::RecallConfig;
use crate::error::{RecallError, Result};
use crate::schema::SchemaReport;
use crate::store::sqlite::SqliteStore;
use directories::ProjectDirs;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const HOME_ENV: &str = "DOCRECALL_HOME";
pub const DB_FILENAME: &str = "change_history.db";

pub struct RecallContext {
    pub api: Arc<RecallApi<SqliteStore>>,
    pub config: RecallConfig,
    pub data_dir: PathBuf,
    pub schema: SchemaReport,
}

/// `DOCRECALL_HOME` if set, else the platform data directory.
pub fn data_dir() -> Result<PathBuf> {
    if let Some(home) = std::env::var_os(HOME_ENV).filter(|h| !h.is_empty()) {
        return Ok(PathBuf::from(home));
    }
    ProjectDirs::from("com", "docrecall", "docrecall")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| RecallError::Config("Could not determine data directory".to_string()))
}

/// Open the database in `data_dir` and create the tables of enabled features.
///
/// A database that cannot be opened does not fail here: the context is still
/// built, and every operation on it degrades to a logged no-op.
pub fn initialize(data_dir: &Path) -> Result<RecallContext> {
    fs::create_dir_all(data_dir)?;
    let config = RecallConfig::load(data_dir)?;

    let store = SqliteStore::open(&data_dir.join(DB_FILENAME), config.capacities());
    let api = RecallApi::from_config(Arc::new(store), &config);
    let schema = api.initialize_schema(config.features);

    Ok(RecallContext {
        api: Arc::new(api),
        config,
        data_dir: data_dir.to_path_buf(),
        schema,
    })
}
