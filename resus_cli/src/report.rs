//! Handover summary export.
//!
//! The core exposes a read-only snapshot and performs no formatting; this
//! module is the external summary collaborator, flattening intervention
//! records to CSV for handover.

use resus_core::{Error, HandoverSnapshot, Result};
use serde::Serialize;
use std::path::Path;

/// Flattened CSV row for one intervention record
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    id: String,
    template_id: &'a str,
    title: &'a str,
    priority: String,
    status: String,
    created_at: String,
    started_at: Option<String>,
    ended_at: Option<String>,
    cycle: u32,
    bolus_number: Option<u32>,
    volume_given_ml: Option<f64>,
    max_volume_ml: Option<f64>,
}

/// Write every intervention record in the snapshot to a CSV file
pub fn write_handover_csv(path: &Path, snapshot: &HandoverSnapshot) -> Result<usize> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| Error::Other(format!("CSV error: {}", e)))?;

    let mut count = 0;
    for intervention in &snapshot.interventions {
        let row = CsvRow {
            id: intervention.id.to_string(),
            template_id: &intervention.template_id,
            title: &intervention.title,
            priority: format!("{:?}", intervention.priority).to_lowercase(),
            status: format!("{:?}", intervention.status),
            created_at: intervention.created_at.to_rfc3339(),
            started_at: intervention.started_at.map(|t| t.to_rfc3339()),
            ended_at: intervention.ended_at.map(|t| t.to_rfc3339()),
            cycle: intervention.cycle,
            bolus_number: intervention.bolus_number,
            volume_given_ml: intervention.volume_given_ml,
            max_volume_ml: intervention.max_volume_ml,
        };
        writer
            .serialize(row)
            .map_err(|e| Error::Other(format!("CSV error: {}", e)))?;
        count += 1;
    }

    writer
        .flush()
        .map_err(|e| Error::Other(format!("CSV error: {}", e)))?;

    tracing::info!("Wrote {} intervention records to {:?}", count, path);
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use resus_core::{Clock, InterventionTracker, ManualClock};

    #[test]
    fn test_csv_export_roundtrip_headers() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("handover.csv");

        let clock = ManualClock::new(chrono::Utc::now());
        let mut tracker = InterventionTracker::new(clock.clone());
        let id = tracker.start_template("ventilation_bvm", 14.0).unwrap();
        let _ = clock.now();
        tracker.complete(id).unwrap();

        let count = write_handover_csv(&path, &tracker.snapshot()).unwrap();
        assert_eq!(count, 1);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("id,template_id,title,priority,status"));
        assert!(contents.contains("ventilation_bvm"));
        assert!(contents.contains("Completed"));
    }

    #[test]
    fn test_empty_snapshot_writes_headers_only() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("handover.csv");

        let tracker = InterventionTracker::new(ManualClock::new(chrono::Utc::now()));
        let count = write_handover_csv(&path, &tracker.snapshot()).unwrap();
        assert_eq!(count, 0);
        assert!(path.exists());
    }
}
