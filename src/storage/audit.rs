// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Audit logging for security-relevant host events.
//!
//! Replay and rejected loads are recorded separately from routine saves so
//! an operator can alert on a rollback attempt rather than a generic failure.

use std::fs::{self, OpenOptions};
use std::io::Write;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{StoragePaths, StorageError, StorageResult};

/// Types of auditable events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    // Startup
    StateRestored,

    // Persistence
    StateSaved,
    PersistFailed,

    // Client-supplied loads
    StateLoaded,
    ReplayDetected,
    LoadRejected,
}

/// An audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID.
    pub event_id: String,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Type of event.
    pub event_type: AuditEventType,
    /// Command that triggered the event (if any).
    pub command: Option<String>,
    /// Source file of a loaded blob.
    pub source: Option<String>,
    /// Transaction count visible after the event.
    pub transaction_count: Option<u64>,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Error message if operation failed.
    pub error: Option<String>,
}

impl AuditEvent {
    /// Create a new audit event.
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
            command: None,
            source: None,
            transaction_count: None,
            success: true,
            error: None,
        }
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_transaction_count(mut self, count: u64) -> Self {
        self.transaction_count = Some(count);
        self
    }

    /// Mark as failed with error message.
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }
}

/// Append-only JSONL audit log, one file per day.
#[derive(Debug, Clone)]
pub struct AuditLog {
    paths: StoragePaths,
}

impl AuditLog {
    pub fn new(paths: StoragePaths) -> Self {
        Self { paths }
    }

    /// Append an event to the log for its day.
    pub fn log(&self, event: &AuditEvent) -> StorageResult<()> {
        let date = event.timestamp.format("%Y-%m-%d").to_string();
        let path = self.paths.audit_events_file(&date);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(&line)?;
        Ok(())
    }

    /// Read audit events for a specific date.
    pub fn read_events(&self, date: &str) -> StorageResult<Vec<AuditEvent>> {
        let path = self.paths.audit_events_file(date);
        let content = fs::read_to_string(&path)?;

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(StorageError::from))
            .collect()
    }

    /// Read events for an inclusive date range. Days without a log are skipped.
    pub fn read_events_range(
        &self,
        start_date: &str,
        end_date: &str,
    ) -> StorageResult<Vec<AuditEvent>> {
        let start = NaiveDate::parse_from_str(start_date, "%Y-%m-%d")
            .map_err(|e| StorageError::SerializationError(format!("Invalid start date: {e}")))?;
        let end = NaiveDate::parse_from_str(end_date, "%Y-%m-%d")
            .map_err(|e| StorageError::SerializationError(format!("Invalid end date: {e}")))?;

        let mut all_events = Vec::new();
        let mut current = start;
        while current <= end {
            let date_str = current.format("%Y-%m-%d").to_string();
            if let Ok(events) = self.read_events(&date_str) {
                all_events.extend(events);
            }
            current = current
                .succ_opt()
                .ok_or_else(|| StorageError::SerializationError("Date overflow".to_string()))?;
        }

        Ok(all_events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, AuditLog) {
        let temp = TempDir::new().unwrap();
        let log = AuditLog::new(StoragePaths::new(temp.path()));
        (temp, log)
    }

    #[test]
    fn create_audit_event() {
        let event = AuditEvent::new(AuditEventType::StateLoaded)
            .with_command("LOAD")
            .with_source("/tmp/state.bin")
            .with_transaction_count(4);

        assert_eq!(event.event_type, AuditEventType::StateLoaded);
        assert_eq!(event.command.as_deref(), Some("LOAD"));
        assert_eq!(event.source.as_deref(), Some("/tmp/state.bin"));
        assert_eq!(event.transaction_count, Some(4));
        assert!(event.success);
    }

    #[test]
    fn failed_event() {
        let event = AuditEvent::new(AuditEventType::PersistFailed).failed("disk full");
        assert!(!event.success);
        assert_eq!(event.error.as_deref(), Some("disk full"));
    }

    #[test]
    fn event_type_serializes_snake_case() {
        let json = serde_json::to_string(&AuditEventType::ReplayDetected).unwrap();
        assert_eq!(json, r#""replay_detected""#);
    }

    #[test]
    fn log_and_read_events() {
        let (_temp, log) = setup();

        log.log(&AuditEvent::new(AuditEventType::StateSaved).with_command("DEPOSIT"))
            .unwrap();
        log.log(&AuditEvent::new(AuditEventType::ReplayDetected).failed("stale counter"))
            .unwrap();

        let today = Utc::now().format("%Y-%m-%d").to_string();
        let events = log.read_events(&today).unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, AuditEventType::StateSaved);
        assert_eq!(events[1].event_type, AuditEventType::ReplayDetected);
        assert!(!events[1].success);
    }

    #[test]
    fn read_range_skips_missing_days() {
        let (_temp, log) = setup();
        log.log(&AuditEvent::new(AuditEventType::StateRestored)).unwrap();

        let today = Utc::now().date_naive();
        let start = today.pred_opt().unwrap().format("%Y-%m-%d").to_string();
        let end = today.succ_opt().unwrap().format("%Y-%m-%d").to_string();
        let events = log.read_events_range(&start, &end).unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn invalid_range_is_rejected() {
        let (_temp, log) = setup();
        assert!(matches!(
            log.read_events_range("yesterday", "2026-01-01"),
            Err(StorageError::SerializationError(_))
        ));
    }
}
