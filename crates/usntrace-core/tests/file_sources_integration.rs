//! Scans over journal dumps and ancestor snapshots written to disk

mod common;

use common::{drive, JournalBuilder, TestRecord};
use std::path::PathBuf;
use usntrace_core::export;
use usntrace_core::{scan_files, DriveStatus, FailureKind, InternPools, PipelineConfig};

const SNAPSHOT_C: &str = r#"{
  "entries": [
    {"frn": 100, "parent": 5, "name": "Users"},
    {"frn": 200, "parent": 100, "name": "alice"},
    {"frn": 300, "parent": 200, "name": "Documents"},
    {"frn": 900, "parent": 5, "name": "Projects", "path": "C:\\Projects"},
    {"frn": 950, "parent": 900, "name": "usntrace"},
    {"frn": 999, "parent": 5, "name": "NeverReferenced"}
  ]
}"#;

fn write(dir: &tempfile::TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

fn sample_journal() -> Vec<u8> {
    JournalBuilder::new()
        .record(TestRecord::new(401, 300, "Budget.XLSX").usn(8).at(100))
        .padding(4)
        .record(TestRecord::new(402, 950, "Cargo.toml").usn(16).at(300).reason(0x2))
        .record(TestRecord::new(403, 5, "pagefile.sys").usn(24).at(200).reason(0x8000_0000))
        .build()
}

#[test]
fn test_scan_resolves_against_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let journal = write(&dir, "c.bin", &sample_journal());
    let snapshot = write(&dir, "c.json", SNAPSHOT_C.as_bytes());

    let pools = InternPools::shared();
    let report = scan_files(
        &[(drive('C'), journal)],
        &[(drive('C'), snapshot)],
        PipelineConfig::default(),
        pools.clone(),
    )
    .unwrap();

    let c = report.drive(drive('C')).unwrap();
    assert_eq!(c.status, DriveStatus::Completed);

    let paths: Vec<&str> = c.entries.iter().map(|e| &*e.full_path).collect();
    assert_eq!(
        paths,
        vec![
            "C:\\Projects\\usntrace\\Cargo.toml",
            "C:\\pagefile.sys",
            "C:\\Users\\alice\\Documents\\Budget.XLSX",
        ]
    );
    assert_eq!(c.statistics.padding_regions, 1);

    let labels: Vec<&str> = c.entries.iter().map(|e| &*e.reason_label).collect();
    assert_eq!(labels, vec!["Extended", "Closed", "Created"]);

    let csv = export::to_csv(&report.merged_entries(), &pools);
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[3].contains("\"xlsx\""));
    assert!(lines[1].starts_with("\"1970-01-01 00:05:00\""));
}

#[test]
fn test_missing_dump_and_snapshot_fail_per_drive() {
    let dir = tempfile::tempdir().unwrap();
    let journal_c = write(&dir, "c.bin", &sample_journal());
    let journal_e = write(&dir, "e.bin", &sample_journal());
    let snapshot_c = write(&dir, "c.json", SNAPSHOT_C.as_bytes());

    let report = scan_files(
        &[
            (drive('C'), journal_c),
            (drive('D'), dir.path().join("missing.bin")),
            (drive('E'), journal_e),
        ],
        &[(drive('C'), snapshot_c)],
        PipelineConfig::default(),
        InternPools::shared(),
    )
    .unwrap();

    assert_eq!(report.drives.len(), 3);
    assert!(report.drive(drive('C')).unwrap().is_completed());
    assert!(matches!(
        report.drive(drive('D')).unwrap().status,
        DriveStatus::Failed { kind: FailureKind::NoJournal, .. }
    ));
    // E has a journal but no snapshot to resolve it against
    assert!(matches!(
        report.drive(drive('E')).unwrap().status,
        DriveStatus::Failed { kind: FailureKind::Unreadable, .. }
    ));
}

#[test]
fn test_zero_length_dump_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let journal = write(&dir, "c.bin", &[]);
    let snapshot = write(&dir, "c.json", SNAPSHOT_C.as_bytes());

    let report = scan_files(
        &[(drive('C'), journal)],
        &[(drive('C'), snapshot)],
        PipelineConfig::default(),
        InternPools::shared(),
    )
    .unwrap();

    assert!(matches!(report.drives[0].status, DriveStatus::Empty { .. }));
}

#[test]
fn test_scan_requires_a_journal() {
    let result = scan_files(&[], &[], PipelineConfig::default(), InternPools::shared());
    assert!(result.is_err());
}

#[test]
fn test_text_report_over_real_run() {
    let dir = tempfile::tempdir().unwrap();
    let journal = write(&dir, "c.bin", &sample_journal());
    let snapshot = write(&dir, "c.json", SNAPSHOT_C.as_bytes());
    let pools = InternPools::shared();

    let report = scan_files(
        &[(drive('C'), journal), (drive('D'), dir.path().join("nope.bin"))],
        &[(drive('C'), snapshot)],
        PipelineConfig::default(),
        pools.clone(),
    )
    .unwrap();

    let text = export::to_text_report(&report, &pools);
    assert!(text.contains("C: completed"));
    assert!(text.contains("D: FAILED"));
    assert!(text.contains("C:\\Projects\\usntrace\\Cargo.toml"));
}
