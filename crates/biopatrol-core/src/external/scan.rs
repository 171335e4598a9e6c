//! Scan Recorder: append-only per-bed scan rows.
//!
//! Used both by the bio-sensor client (real scans, one row per attempt)
//! and the engine (N/A rows on conditional skips and shelf drops). The
//! real store is a persistent DB; this crate talks to it only through
//! [`ScanRecorder`] and ships an in-memory recording implementation for
//! tests and standalone use.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

/// One row of the scan-history table.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRow {
    pub location_id: String,
    pub bed_name: String,
    pub bpm: Option<f64>,
    pub rpm: Option<f64>,
    pub status: String,
    pub is_valid: bool,
    pub retry_count: u32,
    pub details: String,
    pub scanned_at: DateTime<Utc>,
}

impl ScanRow {
    /// Build an "N/A" row for a skipped or interrupted scan.
    pub fn not_available(location_id: impl Into<String>, bed_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            location_id: location_id.into(),
            bed_name: bed_name.into(),
            bpm: None,
            rpm: None,
            status: "N/A".to_string(),
            is_valid: false,
            retry_count: 0,
            details: reason.into(),
            scanned_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait ScanRecorder: Send + Sync {
    async fn record(&self, row: ScanRow) -> anyhow::Result<()>;
}

/// In-memory recorder: appends to a `Vec` behind a mutex. The default
/// implementation this crate ships, standing in for the real persistent
/// store.
#[derive(Default)]
pub struct InMemoryScanRecorder {
    rows: Mutex<Vec<ScanRow>>,
}

impl InMemoryScanRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn rows(&self) -> Vec<ScanRow> {
        self.rows.lock().await.clone()
    }
}

#[async_trait]
impl ScanRecorder for InMemoryScanRecorder {
    async fn record(&self, row: ScanRow) -> anyhow::Result<()> {
        self.rows.lock().await.push(row);
        Ok(())
    }
}
