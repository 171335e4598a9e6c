//! Bio-sensor Client: one method, blocking up to
//! `initial_wait + retry_count * wait_time` seconds for a valid reading.
//!
//! The real client talks MQTT to the physical sensor shelf. It
//! encapsulates its own internal retry/wait policy and persistence —
//! this crate's engine only ever sees
//! [`BioSensorClient::get_valid_scan_data`]'s optional payload; all
//! attempt-row bookkeeping (including invalid attempts) happens inside
//! the implementation, against the [`super::ScanRecorder`] it's handed.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::scan::{ScanRecorder, ScanRow};

/// A successful bio-sensor reading.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanPayload {
    pub bpm: f64,
    pub rpm: f64,
    pub extra: Value,
}

#[async_trait]
pub trait BioSensorClient: Send + Sync {
    /// Returns `Some(payload)` on a valid reading, `None` on timeout.
    /// `bed_name` is the human string used for scan-history rows.
    async fn get_valid_scan_data(
        &self,
        target_bed: &str,
        task_id: &str,
        bed_name: &str,
    ) -> Option<ScanPayload>;
}

/// A scripted client that always returns a valid reading on the first
/// attempt, recording one row per call to the wrapped [`ScanRecorder`].
/// This crate's default/standalone implementation of the interface;
/// exercising the real timeout/retry behavior against live MQTT hardware
/// is out of scope.
pub struct AlwaysValidBioSensor {
    recorder: Arc<dyn ScanRecorder>,
}

impl AlwaysValidBioSensor {
    pub fn new(recorder: Arc<dyn ScanRecorder>) -> Self {
        Self { recorder }
    }
}

#[async_trait]
impl BioSensorClient for AlwaysValidBioSensor {
    async fn get_valid_scan_data(&self, target_bed: &str, _task_id: &str, bed_name: &str) -> Option<ScanPayload> {
        let payload = ScanPayload {
            bpm: 72.0,
            rpm: 16.0,
            extra: Value::Null,
        };

        let _ = self
            .recorder
            .record(ScanRow {
                location_id: target_bed.to_string(),
                bed_name: bed_name.to_string(),
                bpm: Some(payload.bpm),
                rpm: Some(payload.rpm),
                status: "OK".to_string(),
                is_valid: true,
                retry_count: 0,
                details: String::new(),
                scanned_at: chrono::Utc::now(),
            })
            .await;

        Some(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::scan::InMemoryScanRecorder;

    #[tokio::test]
    async fn always_returns_a_reading_and_records_a_row() {
        let recorder = Arc::new(InMemoryScanRecorder::new());
        let client = AlwaysValidBioSensor::new(recorder.clone());

        let reading = client.get_valid_scan_data("B_101-1", "t1", "101-1").await;
        assert!(reading.is_some());

        let rows = recorder.rows().await;
        assert_eq!(rows.len(), 1);
        assert!(rows[0].is_valid);
        assert_eq!(rows[0].bed_name, "101-1");
    }
}
