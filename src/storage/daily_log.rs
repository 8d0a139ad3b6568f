//! One JSON file per calendar day, appended one reading at a time.

use crate::error::{EnviroError, Result};
use crate::sensors::Reading;
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Durable per-day reading logs under a data directory.
///
/// A day's file is created on its first append and never deleted here.
/// Writes go to a temporary sibling and are renamed into place, so readers
/// see either the previous or the new complete file.
#[derive(Debug, Clone)]
pub struct PersistenceStore {
    data_dir: PathBuf,
}

impl PersistenceStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Create the data directory if it does not exist yet.
    pub async fn init(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.data_dir).await?;
        Ok(())
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Path of the log for `date`, e.g. `2024-01-01.json`.
    pub fn log_path(&self, date: NaiveDate) -> PathBuf {
        self.data_dir.join(format!("{}.json", date.format("%Y-%m-%d")))
    }

    /// Append `reading` to the log for `date`.
    ///
    /// Existing entries are kept verbatim. A file that is not a JSON array is
    /// discarded and replaced by a log holding only the new reading.
    pub async fn append(&self, date: NaiveDate, reading: &Reading) -> Result<()> {
        let path = self.log_path(date);
        let mut entries = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<Value>(&bytes) {
                Ok(Value::Array(entries)) => entries,
                Ok(_) | Err(_) => {
                    warn!("Corrupt file detected, resetting {}", path.display());
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        entries.push(serde_json::to_value(reading)?);
        write_atomically(&path, &encode(&entries)?).await?;

        debug!(
            "Reading saved to {} ({} entries)",
            path.display(),
            entries.len()
        );
        Ok(())
    }

    /// Every parseable reading stored for `date`, in file order.
    ///
    /// A missing file is an empty day. An unreadable file, or one that is
    /// not a JSON array, is skipped with a warning; so are entries that do
    /// not parse as readings.
    pub async fn load_day(&self, date: NaiveDate) -> Result<Vec<Reading>> {
        let path = self.log_path(date);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                warn!("Error reading {}, skipping: {}", path.display(), e);
                return Ok(Vec::new());
            }
        };

        let entries = match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Array(entries)) => entries,
            _ => {
                warn!("Error reading {}, skipping", path.display());
                return Ok(Vec::new());
            }
        };

        let readings = entries
            .into_iter()
            .filter_map(|entry| match serde_json::from_value::<Reading>(entry) {
                Ok(reading) => Some(reading),
                Err(e) => {
                    warn!("Skipping unparseable entry in {}: {}", path.display(), e);
                    None
                }
            })
            .collect();
        Ok(readings)
    }
}

/// Pretty-print with four-space indentation.
fn encode(entries: &[Value]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
    entries.serialize(&mut serializer)?;
    Ok(out)
}

async fn write_atomically(path: &Path, contents: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .ok_or_else(|| EnviroError::storage_error(format!("invalid log path {}", path.display())))?;
    let tmp = path.with_file_name(format!(".{}.tmp", file_name.to_string_lossy()));

    tokio::fs::write(&tmp, contents).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}
