//! # Telemetry Logger
//!
//! Writes [`TelemetryRecord`]s to JSONL files with rotation.
//!
//! Files are named `telemetry_<session>_<index>.jsonl`. `<session>` is the
//! local start time with milliseconds plus the process id
//! (`20261018_120000_123_p4242`), and `<index>` a counter padded to four
//! digits. After `max_records_per_file` records a new file is started and
//! the oldest files beyond `max_files_to_keep` are deleted, ordered by
//! session and then by numeric index. The file being written is never
//! deleted.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::types::{TelemetryEvent, TelemetryRecord};
use crate::config::TelemetryConfig;
use crate::error::Result;

const FILE_PREFIX: &str = "telemetry_";
const FILE_EXTENSION: &str = "jsonl";

/// Rotating JSONL writer.
#[derive(Debug)]
pub struct TelemetryLogger {
    log_dir: PathBuf,
    max_records_per_file: usize,
    max_files_to_keep: usize,
    session: String,
    file_index: u32,
    records_in_file: usize,
    writer: Option<BufWriter<File>>,
    current_path: Option<PathBuf>,
}

impl TelemetryLogger {
    /// Creates a logger writing into `log_dir`, creating the directory if needed.
    ///
    /// No file is created until the first record.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the directory cannot be created.
    pub fn new<P: AsRef<Path>>(
        log_dir: P,
        max_records_per_file: usize,
        max_files_to_keep: usize,
    ) -> Result<Self> {
        let log_dir = log_dir.as_ref().to_path_buf();
        fs::create_dir_all(&log_dir)?;

        Ok(Self {
            log_dir,
            max_records_per_file: max_records_per_file.max(1),
            max_files_to_keep: max_files_to_keep.max(1),
            session: session_stamp(),
            file_index: 0,
            records_in_file: 0,
            writer: None,
            current_path: None,
        })
    }

    /// Builds a logger from configuration; `None` when telemetry is disabled.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the log directory cannot be created.
    pub fn from_config(config: &TelemetryConfig) -> Result<Option<Self>> {
        if !config.enabled {
            return Ok(None);
        }

        let logger = Self::new(
            &config.log_dir,
            config.max_records_per_file,
            config.max_files_to_keep,
        )?;
        info!("Telemetry logging to {}", logger.log_dir.display());
        Ok(Some(logger))
    }

    /// Appends one timestamped event.
    ///
    /// # Errors
    ///
    /// Returns `Telemetry` on serialization failure and `Io` on write failure.
    pub fn log(&mut self, event: TelemetryEvent) -> Result<()> {
        self.log_record(&TelemetryRecord::now(event))
    }

    /// Appends a record as one JSON line.
    ///
    /// # Errors
    ///
    /// Returns `Telemetry` on serialization failure and `Io` on write failure.
    pub fn log_record(&mut self, record: &TelemetryRecord) -> Result<()> {
        if self.writer.is_none() || self.records_in_file >= self.max_records_per_file {
            self.rotate()?;
        }

        if let Some(writer) = self.writer.as_mut() {
            serde_json::to_writer(&mut *writer, record)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
            self.records_in_file += 1;
        }
        Ok(())
    }

    /// Path of the file currently being written.
    pub fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    fn rotate(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }

        // Never append to a file left by another logger
        let (file, path) = loop {
            self.file_index += 1;
            let path = self.log_dir.join(format!(
                "{}{}_{:04}.{}",
                FILE_PREFIX, self.session, self.file_index, FILE_EXTENSION
            ));
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => break (file, path),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        };
        debug!("Telemetry file: {}", path.display());

        self.writer = Some(BufWriter::new(file));
        self.current_path = Some(path);
        self.records_in_file = 0;

        self.prune()
    }

    /// Deletes the oldest telemetry files beyond the retention limit.
    fn prune(&self) -> Result<()> {
        let files = telemetry_files(&self.log_dir)?;
        if files.len() <= self.max_files_to_keep {
            return Ok(());
        }

        let excess = files.len() - self.max_files_to_keep;
        for path in files.into_iter().take(excess) {
            if self.current_path.as_deref() == Some(path.as_path()) {
                continue;
            }
            debug!("Removing old telemetry file: {}", path.display());
            fs::remove_file(&path)?;
        }
        Ok(())
    }
}

/// Session part of the file names for a logger created now.
fn session_stamp() -> String {
    format!(
        "{}_p{}",
        chrono::Local::now().format("%Y%m%d_%H%M%S_%3f"),
        std::process::id()
    )
}

/// Splits a telemetry file name into its (session, index) ordering key.
fn file_key(path: &Path) -> Option<(String, u32)> {
    if path.extension()?.to_str()? != FILE_EXTENSION {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let (session, index) = stem.strip_prefix(FILE_PREFIX)?.rsplit_once('_')?;
    Some((session.to_string(), index.parse().ok()?))
}

/// Lists telemetry files in `dir`, oldest first.
fn telemetry_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if let Some(key) = file_key(&path) {
            files.push((key, path));
        }
    }
    files.sort();
    Ok(files.into_iter().map(|(_, path)| path).collect())
}
