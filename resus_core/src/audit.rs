//! Append-only audit log for clinical events.
//!
//! Events are appended to a JSONL (JSON Lines) file with file locking to
//! ensure safe concurrent access. The core never writes here on its own:
//! durable persistence is an external responsibility, and callers (the
//! CLI, a server) drive the sink explicitly after each operation.

use crate::error::Result;
use crate::types::{CriticalAction, InterventionStatus, WeightEstimate};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// One auditable clinical event
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    WeightResolved {
        at: DateTime<Utc>,
        estimate: WeightEstimate,
    },
    TriggerFired {
        at: DateTime<Utc>,
        action: CriticalAction,
    },
    InterventionCreated {
        at: DateTime<Utc>,
        id: Uuid,
        template_id: String,
    },
    StatusChanged {
        at: DateTime<Utc>,
        id: Uuid,
        from: InterventionStatus,
        to: InterventionStatus,
        reason: Option<String>,
    },
}

/// Event sink trait for audit logging
pub trait AuditSink {
    fn append(&mut self, event: &AuditEvent) -> Result<()>;
}

/// JSONL-based audit sink with file locking
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    /// Create a new JSONL sink for the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl AuditSink for JsonlSink {
    fn append(&mut self, event: &AuditEvent) -> Result<()> {
        self.ensure_parent_dir()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        // Acquire exclusive lock
        file.lock_exclusive()?;

        let mut writer = std::io::BufWriter::new(&file);
        let line = serde_json::to_string(event)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;

        file.unlock()?;

        tracing::debug!("Appended audit event to {:?}", self.path);
        Ok(())
    }
}

/// Read all events from an audit file
///
/// Corrupt lines are skipped with a warning rather than failing the
/// whole read.
pub fn read_events(path: &Path) -> Result<Vec<AuditEvent>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    // Shared lock for reading
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let mut events = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<AuditEvent>(&line) {
            Ok(event) => events.push(event),
            Err(e) => {
                tracing::warn!("Failed to parse audit event at line {}: {}", line_num + 1, e);
            }
        }
    }

    file.unlock()?;
    tracing::debug!("Read {} audit events", events.len());
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Confidence, WeightMethod};

    fn weight_event() -> AuditEvent {
        AuditEvent::WeightResolved {
            at: Utc::now(),
            estimate: WeightEstimate {
                weight_kg: 14.0,
                method: WeightMethod::LengthTable,
                confidence: Confidence::High,
                source: "length 100 cm, zone 6".into(),
            },
        }
    }

    #[test]
    fn test_append_and_read_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("audit.jsonl");

        let mut sink = JsonlSink::new(&path);
        sink.append(&weight_event()).unwrap();
        sink.append(&AuditEvent::StatusChanged {
            at: Utc::now(),
            id: Uuid::new_v4(),
            from: InterventionStatus::InProgress,
            to: InterventionStatus::Completed,
            reason: None,
        })
        .unwrap();

        let events = read_events(&path).unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], AuditEvent::WeightResolved { .. }));
        assert!(matches!(events[1], AuditEvent::StatusChanged { .. }));
    }

    #[test]
    fn test_read_missing_file_is_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let events = read_events(&temp_dir.path().join("nope.jsonl")).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_corrupt_lines_are_skipped() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("audit.jsonl");

        let mut sink = JsonlSink::new(&path);
        sink.append(&weight_event()).unwrap();

        // Inject a corrupt line, then a valid one
        {
            use std::io::Write as _;
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            writeln!(file, "{{ not json").unwrap();
        }
        sink.append(&weight_event()).unwrap();

        let events = read_events(&path).unwrap();
        assert_eq!(events.len(), 2);
    }
}
