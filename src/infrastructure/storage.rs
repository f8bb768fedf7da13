//! Persistent store and JSON export
//!
//! Saved batches accumulate in a single JSON array under the app data
//! directory. Exports are standalone pretty-printed documents.

use crate::domain::models::ReceivedFrame;
use anyhow::Context;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Collection every save-batch is appended to
pub const COLLECTION_KEY: &str = "miniPrinterData";

/// One press of "Save"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveBatch {
    pub timestamp: DateTime<Local>,
    pub device: String,
    pub data: Vec<ReceivedFrame>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub export_time: DateTime<Local>,
    pub device: String,
    pub total_packets: usize,
    pub total_bytes: usize,
    pub data: Vec<ReceivedFrame>,
}

pub struct DataStore {
    path: PathBuf,
}

impl DataStore {
    /// Store under the platform data directory
    pub fn open_default() -> anyhow::Result<Self> {
        let mut dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        dir.push("MiniPrinterMonitor");
        Ok(Self::in_dir(dir))
    }

    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let mut path = dir.into();
        path.push(format!("{}.json", COLLECTION_KEY));
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All batches saved so far, oldest first
    pub fn load(&self) -> anyhow::Result<Vec<SaveBatch>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let batches = serde_json::from_str(&contents)
            .with_context(|| format!("Corrupt data store {}", self.path.display()))?;
        Ok(batches)
    }

    /// Append a batch; returns how many frames it carried
    pub fn append(&self, batch: SaveBatch) -> anyhow::Result<usize> {
        let count = batch.data.len();
        let mut batches = self.load()?;
        batches.push(batch);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(&batches)?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;

        info!(
            "Saved {} frames ({} batches in store)",
            count,
            batches.len()
        );
        Ok(count)
    }
}

/// `mini_printer_data_2026-10-19T10-00-00-000.json`
pub fn export_file_name(time: DateTime<Local>) -> String {
    format!(
        "mini_printer_data_{}.json",
        time.format("%Y-%m-%dT%H-%M-%S-%3f")
    )
}

/// Write an export document into `dir`; returns the written path
pub fn write_export(dir: &Path, doc: &ExportDocument) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join(export_file_name(doc.export_time));
    let json = serde_json::to_string_pretty(doc)?;
    fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Exported {} frames to {}", doc.total_packets, path.display());
    Ok(path)
}
