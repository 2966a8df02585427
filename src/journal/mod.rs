//! Append-only CSV record of every observed event and issued command.
//!
//! The file has a `Timestamp,Data` header followed by one row per record.
//! Rows are only ever appended; nothing here rewrites or deletes them.

mod csv;

use crate::lock_or_recover;
use chrono::{Local, NaiveDateTime, Timelike};
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const HEADER: [&str; 2] = ["Timestamp", "Data"];

/// One row of the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogRecord {
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: NaiveDateTime,
    pub description: String,
}

impl LogRecord {
    pub fn timestamp_text(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }
}

fn serialize_timestamp<S: serde::Serializer>(
    timestamp: &NaiveDateTime,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&timestamp.format(TIMESTAMP_FORMAT))
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("event log '{}' could not be opened", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to append to event log '{}'", path.display())]
    Append {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read event log '{}'", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Shared handle to the log file. Safe to use from any thread.
pub struct EventJournal {
    path: PathBuf,
    file: Mutex<File>,
}

impl EventJournal {
    /// Open (or create) the log for appending, writing the header to a new file.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let open_err = |source| StorageError::Open {
            path: path.clone(),
            source,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(open_err)?;
        let len = file.metadata().map_err(open_err)?.len();
        if len == 0 {
            file.write_all(csv::encode_row(&HEADER).as_bytes())
                .map_err(open_err)?;
        } else if !ends_with_newline(&mut file, len).map_err(open_err)? {
            // A cut-off last row would otherwise swallow the next append.
            file.write_all(b"\n").map_err(open_err)?;
            crate::log_debug(&format!(
                "event log {} ended mid-row; terminated it",
                path.display()
            ));
        }
        crate::log_debug(&format!("event log opened at {}", path.display()));
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record as a single write.
    pub fn append(&self, timestamp: NaiveDateTime, description: &str) -> Result<(), StorageError> {
        let mut file = lock_or_recover(&self.file, "event journal");
        self.write_row(&mut file, timestamp, description)
    }

    /// Append `description` stamped with the current local time.
    ///
    /// The clock is read under the file lock so timestamps never run backwards
    /// through the file.
    pub fn record(&self, description: &str) -> Result<LogRecord, StorageError> {
        let mut file = lock_or_recover(&self.file, "event journal");
        let timestamp = now();
        self.write_row(&mut file, timestamp, description)?;
        Ok(LogRecord {
            timestamp,
            description: description.to_string(),
        })
    }

    /// Records whose description contains `filter`, ignoring case, in file order.
    pub fn query(&self, filter: &str) -> Result<Vec<LogRecord>, StorageError> {
        let _file = lock_or_recover(&self.file, "event journal");
        query_log(&self.path, filter)
    }

    fn write_row(
        &self,
        file: &mut File,
        timestamp: NaiveDateTime,
        description: &str,
    ) -> Result<(), StorageError> {
        let stamp = timestamp.format(TIMESTAMP_FORMAT).to_string();
        let row = csv::encode_row(&[&stamp, description]);
        file.write_all(row.as_bytes())
            .and_then(|()| file.flush())
            .map_err(|source| StorageError::Append {
                path: self.path.clone(),
                source,
            })
    }
}

fn ends_with_newline(file: &mut File, len: u64) -> io::Result<bool> {
    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// Current local time truncated to whole seconds.
fn now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Read the log at `path` and keep records whose description contains
/// `filter` (case-insensitive). An empty filter keeps everything.
///
/// A missing file is an empty log. Rows with an unreadable timestamp are
/// skipped.
pub fn query_log(path: &Path, filter: &str) -> Result<Vec<LogRecord>, StorageError> {
    let text = match fs::read(path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(StorageError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let needle = filter.to_lowercase();
    let mut records = Vec::new();
    for (idx, row) in csv::parse_rows(&text).into_iter().enumerate() {
        if idx == 0 && row.first().map(String::as_str) == Some(HEADER[0]) {
            continue;
        }
        let Ok([timestamp, description]) = <[String; 2]>::try_from(row) else {
            crate::log_debug(&format!("skipping malformed log row {idx}"));
            continue;
        };
        if !description.to_lowercase().contains(&needle) {
            continue;
        }
        match NaiveDateTime::parse_from_str(&timestamp, TIMESTAMP_FORMAT) {
            Ok(timestamp) => records.push(LogRecord {
                timestamp,
                description,
            }),
            Err(err) => crate::log_debug(&format!(
                "skipping log row {idx} with bad timestamp {timestamp:?}: {err}"
            )),
        }
    }
    Ok(records)
}
