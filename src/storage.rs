//! Export of recorded sessions to durable storage.
//!
//! The recorder only hands over ordered record batches; where they end up is
//! the [`RecordStore`]'s business. Exports run off the frame path.

use crate::error::{RResult, RecorderError};
use crate::records::{quoted_writer, write_rows, CsvRecord, ImuRecord, PoseRecord, RecordKind, WifiRecord};
use crate::session::SessionData;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

/// Ordered records of one kind.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordBatch {
    Vio(Vec<PoseRecord>),
    RawImu(Vec<ImuRecord>),
    Wifi(Vec<WifiRecord>),
}

impl RecordBatch {
    pub fn kind(&self) -> RecordKind {
        fn kind_of<R: CsvRecord>(_: &[R]) -> RecordKind {
            R::KIND
        }
        match self {
            RecordBatch::Vio(rows) => kind_of(rows),
            RecordBatch::RawImu(rows) => kind_of(rows),
            RecordBatch::Wifi(rows) => kind_of(rows),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            RecordBatch::Vio(rows) => rows.len(),
            RecordBatch::RawImu(rows) => rows.len(),
            RecordBatch::Wifi(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Header plus every record, in order.
    pub fn write_csv<W: io::Write>(&self, out: &mut csv::Writer<W>) -> csv::Result<()> {
        match self {
            RecordBatch::Vio(rows) => write_rows(out, rows),
            RecordBatch::RawImu(rows) => write_rows(out, rows),
            RecordBatch::Wifi(rows) => write_rows(out, rows),
        }
    }
}

/// Destination for exported batches.
pub trait RecordStore: Send + Sync {
    /// Persist `batch` under `destination`; returns where it was written.
    fn store(&self, destination: &str, batch: &RecordBatch) -> RResult<String>;
}

/// Writes one CSV file per batch into a directory.
#[derive(Debug, Clone)]
pub struct CsvDirectoryStore {
    dir: PathBuf,
}

impl CsvDirectoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        CsvDirectoryStore { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl RecordStore for CsvDirectoryStore {
    fn store(&self, destination: &str, batch: &RecordBatch) -> RResult<String> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            RecorderError::Persistence(format!("cannot create {}: {}", self.dir.display(), e))
        })?;

        let path = self.dir.join(destination);
        let file = File::create(&path).map_err(|e| {
            RecorderError::Persistence(format!("cannot create {}: {}", path.display(), e))
        })?;

        let mut out = quoted_writer(file);
        batch.write_csv(&mut out).map_err(|e| {
            RecorderError::Persistence(format!("cannot write {}: {}", path.display(), e))
        })?;

        Ok(path.display().to_string())
    }
}

/// Keeps batches in memory. Useful for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    batches: Mutex<Vec<(String, RecordBatch)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> Vec<(String, RecordBatch)> {
        self.batches
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl RecordStore for MemoryStore {
    fn store(&self, destination: &str, batch: &RecordBatch) -> RResult<String> {
        self.batches
            .lock()
            .map_err(|_| RecorderError::Internal("Failed to acquire memory store lock".to_string()))?
            .push((destination.to_string(), batch.clone()));
        Ok(destination.to_string())
    }
}

/// `{name}_{stem}_{stamp}.csv` for each record kind.
pub fn export_filenames(name: &str, stamp_ms: i64) -> [(RecordKind, String); 3] {
    [RecordKind::Vio, RecordKind::RawImu, RecordKind::Wifi]
        .map(|kind| (kind, format!("{}_{}_{}.csv", name, kind.file_stem(), stamp_ms)))
}

/// Files written by one export.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportReport {
    pub files: Vec<String>,
    pub pose_rows: usize,
    pub imu_rows: usize,
    pub wifi_rows: usize,
}

/// Write the three batches of `data`. Stops at the first failing batch; the
/// caller still holds the data and may retry.
pub fn export_session(store: &dyn RecordStore, data: &SessionData, stamp_ms: i64) -> RResult<ExportReport> {
    let name = data
        .metadata
        .session_name
        .as_deref()
        .ok_or_else(|| RecorderError::Persistence("session has no name".to_string()))?;

    let mut files = Vec::with_capacity(3);
    for (kind, filename) in export_filenames(name, stamp_ms) {
        let batch = match kind {
            RecordKind::Vio => RecordBatch::Vio(data.pose.clone()),
            RecordKind::RawImu => RecordBatch::RawImu(data.imu.clone()),
            RecordKind::Wifi => RecordBatch::Wifi(data.wifi.clone()),
        };
        files.push(store.store(&filename, &batch)?);
    }

    log::info!(
        "[export] '{}': {} pose, {} imu, {} wifi rows",
        name,
        data.pose.len(),
        data.imu.len(),
        data.wifi.len()
    );

    Ok(ExportReport {
        files,
        pose_rows: data.pose.len(),
        imu_rows: data.imu.len(),
        wifi_rows: data.wifi.len(),
    })
}

/// Handle to an export running on its own thread.
#[derive(Debug)]
pub struct ExportJob {
    handle: JoinHandle<RResult<ExportReport>>,
}

impl ExportJob {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn wait(self) -> RResult<ExportReport> {
        self.handle
            .join()
            .map_err(|_| RecorderError::Internal("export thread panicked".to_string()))?
    }
}

/// Run [`export_session`] in the background and call `on_done` with the
/// outcome. The returned job may be dropped.
pub fn spawn_export<F>(
    store: Arc<dyn RecordStore>,
    data: SessionData,
    stamp_ms: i64,
    on_done: F,
) -> RResult<ExportJob>
where
    F: FnOnce(&RResult<ExportReport>) + Send + 'static,
{
    let handle = thread::Builder::new()
        .name("session-export".to_string())
        .spawn(move || {
            let result = export_session(store.as_ref(), &data, stamp_ms);
            if let Err(e) = &result {
                log::error!("[export] failed: {}", e);
            }
            on_done(&result);
            result
        })
        .map_err(|e| RecorderError::Internal(format!("cannot spawn export thread: {}", e)))?;

    Ok(ExportJob { handle })
}

/// Whole session as one pretty-printed JSON document.
pub fn session_to_json(data: &SessionData) -> RResult<String> {
    Ok(serde_json::to_string_pretty(data)?)
}
