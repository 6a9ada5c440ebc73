pub mod archive;
pub mod database;

use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use fd_lock::RwLock;
use serde::Serialize;
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::record::PaperRecord;
pub use archive::{ArchiveUpdate, QueryContext};
pub use database::DatabaseEntry;

const RESULTS_DIR: &str = "results";
const DATABASE_DIR: &str = "database";
const DATABASE_FILE: &str = "papers_db.json";
const LOCK_FILE: &str = ".harvest.lock";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Could not acquire store lock {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Could not replace {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Persisted history: dated result archives plus the cumulative database.
pub trait PaperStore {
    /// Most recent archive for `context` by date prefix, if any.
    fn latest_archive(&self, context: &QueryContext) -> Result<Option<PathBuf>, StoreError>;

    fn load_archive(&self, path: &Path) -> Result<Vec<PaperRecord>, StoreError>;

    /// Append records to the `day` archive of `context`, creating it if needed.
    fn append_to_archive(
        &self,
        context: &QueryContext,
        day: NaiveDate,
        records: &[PaperRecord],
    ) -> Result<ArchiveUpdate, StoreError>;

    /// `None` when no database has been written yet.
    fn load_database(&self) -> Result<Option<Vec<DatabaseEntry>>, StoreError>;

    /// Merge records into the database by identity key; returns how many were added.
    fn merge_into_database(&self, records: &[PaperRecord]) -> Result<usize, StoreError>;

    /// Run `f` while holding the store's exclusive lock.
    fn exclusive<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Self) -> Result<T, StoreError>,
        Self: Sized;
}

/// File-backed store laid out as
/// `<data_dir>/results/<date>_<context>.json` and
/// `<data_dir>/database/papers_db.json`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    results_dir: PathBuf,
    database_path: PathBuf,
    lock_path: PathBuf,
}

impl JsonFileStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            results_dir: data_dir.join(RESULTS_DIR),
            database_path: data_dir.join(DATABASE_DIR).join(DATABASE_FILE),
            lock_path: data_dir.join(LOCK_FILE),
        }
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }
}

impl PaperStore for JsonFileStore {
    fn latest_archive(&self, context: &QueryContext) -> Result<Option<PathBuf>, StoreError> {
        Ok(archive::find_latest(&self.results_dir, context)?)
    }

    fn load_archive(&self, path: &Path) -> Result<Vec<PaperRecord>, StoreError> {
        read_json(path)
    }

    fn append_to_archive(
        &self,
        context: &QueryContext,
        day: NaiveDate,
        records: &[PaperRecord],
    ) -> Result<ArchiveUpdate, StoreError> {
        archive::append(&self.results_dir, context, day, records)
    }

    fn load_database(&self) -> Result<Option<Vec<DatabaseEntry>>, StoreError> {
        database::load(&self.database_path)
    }

    fn merge_into_database(&self, records: &[PaperRecord]) -> Result<usize, StoreError> {
        // A database that exists but does not parse is an error here: treating
        // it as empty would overwrite every stored entry.
        let existing = database::load(&self.database_path)?.unwrap_or_default();
        let (merged, added) = database::merge(existing, records);
        write_json_atomic(&self.database_path, &merged)?;
        tracing::info!(
            "Database updated: {} (+{} papers, {} total)",
            self.database_path.display(),
            added,
            merged.len()
        );
        Ok(added)
    }

    fn exclusive<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Self) -> Result<T, StoreError>,
    {
        if let Some(parent) = self.lock_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)?;
        let mut lock = RwLock::new(file);
        let _guard = lock.write().map_err(|source| StoreError::Lock {
            path: self.lock_path.clone(),
            source,
        })?;
        f(self)
    }
}

/// Deserialize a whole JSON file.
pub(crate) fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let text = fs::read_to_string(path)?;
    serde_json::from_str(&text).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Write pretty JSON to a temp file beside `path`, then rename it into place.
pub(crate) fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        serde_json::to_writer_pretty(&mut writer, value).map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        writer.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StoreError::Persist {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}
