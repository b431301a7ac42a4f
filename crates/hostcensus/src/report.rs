//! Delimited-file report sink

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use eyre::WrapErr;
use hostcensus_inventory::{CollectionKind, CollectionResult};
use tracing::info;

/// `<Kind>_<YYYY-MM-DD>.csv` for the local capture date
pub fn report_file_name(kind: CollectionKind, captured_at: DateTime<Utc>) -> String {
    let date = captured_at.with_timezone(&Local).format("%Y-%m-%d");
    format!("{}_{date}.csv", kind.file_stem())
}

/// Write every record of `result` under `dir`, header row first
///
/// The header is written even when there are no records.
///
/// # Errors
/// Returns error if the directory or file cannot be written
pub fn write_report(result: &CollectionResult, dir: &Path, delimiter: u8) -> eyre::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .wrap_err_with(|| format!("cannot create report directory {}", dir.display()))?;

    let path = dir.join(report_file_name(result.kind, result.captured_at));

    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(&path)
        .wrap_err_with(|| format!("cannot create report {}", path.display()))?;

    writer.write_record(result.kind.columns())?;
    for record in &result.records {
        writer.write_record(record.values())?;
    }
    writer.flush()?;

    info!(path = %path.display(), records = result.records.len(), "report written");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use hostcensus_inventory::{InventoryRecord, ServiceRecord};

    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("hostcensus_report_{name}_{}", std::process::id()))
    }

    fn result_with(records: Vec<InventoryRecord>) -> CollectionResult {
        let mut result = CollectionResult::empty(CollectionKind::Services);
        result.records = records;
        result
    }

    #[test]
    fn test_file_name_carries_date() {
        let at = Local.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap();
        assert_eq!(
            report_file_name(CollectionKind::ScheduledTasks, at.with_timezone(&Utc)),
            "ScheduledTasks_2026-03-14.csv"
        );
    }

    #[test]
    fn test_write_report_quotes_fields() {
        let dir = temp_dir("quotes");
        let result = result_with(vec![InventoryRecord::Service(ServiceRecord {
            host: "srv01".into(),
            service_name: "AppPool".into(),
            state: "Running".into(),
            run_as: Some("CORP\\svc-app".into()),
            description: Some("Serves \"app\", mostly".into()),
        })]);

        let path = write_report(&result, &dir, b',').unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "Host,ServiceName,State,RunAs,Description");
        assert_eq!(
            lines[1],
            r#"srv01,AppPool,Running,CORP\svc-app,"Serves ""app"", mostly""#
        );
    }

    #[test]
    fn test_empty_result_still_has_header() {
        let dir = temp_dir("empty");
        let path = write_report(&result_with(Vec::new()), &dir, b';').unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        assert_eq!(content, "Host;ServiceName;State;RunAs;Description\n");
    }
}
