//! Failure records for requests that did not succeed.

use chrono::{DateTime, Utc};
use observability::redact::sanitize_value;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticRecord {
    pub id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub method: String,
    pub url: String,
    pub status: Option<u16>,
    pub error: String,
    /// Request body with credential-looking values redacted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
}

impl DiagnosticRecord {
    pub fn new(
        method: impl Into<String>,
        url: impl Into<String>,
        status: Option<u16>,
        error: impl Into<String>,
        body: Option<&serde_json::Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            recorded_at: Utc::now(),
            method: method.into(),
            url: url.into(),
            status,
            error: error.into(),
            body: body.map(|b| sanitize_value("body", b)),
        }
    }
}

pub trait DiagnosticsSink: Send + Sync {
    fn record(&self, record: DiagnosticRecord);
}

/// Emits each record as a `warn!` event.
#[derive(Debug, Default)]
pub struct TracingDiagnostics;

impl DiagnosticsSink for TracingDiagnostics {
    fn record(&self, record: DiagnosticRecord) {
        let body = record
            .body
            .as_ref()
            .map(|b| b.to_string())
            .unwrap_or_default();
        warn!(
            id = %record.id,
            method = %record.method,
            url = %record.url,
            status = ?record.status,
            error = %record.error,
            body = %body,
            "Request failed"
        );
    }
}

/// Keeps records in memory for inspection.
#[derive(Debug, Default)]
pub struct MemoryDiagnostics {
    records: Mutex<Vec<DiagnosticRecord>>,
}

impl MemoryDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<DiagnosticRecord> {
        self.records.lock().clone()
    }
}

impl DiagnosticsSink for MemoryDiagnostics {
    fn record(&self, record: DiagnosticRecord) {
        self.records.lock().push(record);
    }
}
