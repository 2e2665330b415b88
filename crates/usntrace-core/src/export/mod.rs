/// Export of resolved journal entries and run reports
use std::collections::HashMap;

use crate::intern::InternPools;
use crate::journal::{flag_names, ChangeReason};
use crate::pipeline::{DriveReport, DriveStatus, RunReport};
use crate::JournalEntry;

/// Entries shown in the text report's recent-changes section
const RECENT_CHANGES_SHOWN: usize = 50;

const RULE_HEAVY: &str = "═══════════════════════════════════════════════════════════\n";
const RULE_LIGHT: &str = "───────────────────────────────────────────────────────────\n";

/// Export entries as CSV, one row per entry in the given order
pub fn to_csv(entries: &[JournalEntry], pools: &InternPools) -> String {
    let mut csv = String::from("Timestamp,Path,Reason,Extension,USN,FileTime\n");
    for entry in entries {
        let extension = entry.extension(pools);
        csv.push_str(&format!(
            "{},{},{},{},{},{}\n",
            quote(&entry.timestamp_display(pools)),
            quote(&entry.full_path),
            quote(&entry.reason_label),
            quote(extension.as_deref().unwrap_or("")),
            entry.usn,
            entry.file_time
        ));
    }
    csv
}

/// Export entries as pretty-printed JSON
pub fn to_json(entries: &[JournalEntry]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(entries)
}

/// Export the whole run, statuses and statistics included
pub fn report_to_json(report: &RunReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}

/// Human-readable summary of a run
pub fn to_text_report(report: &RunReport, pools: &InternPools) -> String {
    let mut text = String::new();

    text.push_str(RULE_HEAVY);
    text.push_str("           CHANGE JOURNAL TIMELINE\n");
    text.push_str(RULE_HEAVY);
    text.push_str(&format!("Run: {}\n", report.run_id));
    text.push_str(&format!(
        "Entries: {} across {} drive(s) in {}ms\n\n",
        report.total_entries(),
        report.drives.len(),
        report.elapsed_ms
    ));

    text.push_str("💽 DRIVES\n");
    text.push_str(RULE_LIGHT);
    for drive in &report.drives {
        push_drive_section(&mut text, drive);
    }

    let merged = report.merged_entries();

    text.push_str("\n📊 CHANGE REASONS\n");
    text.push_str(RULE_LIGHT);
    let histogram = reason_histogram(&merged);
    if histogram.is_empty() {
        text.push_str("  (no entries)\n");
    }
    for (reason, count) in &histogram {
        text.push_str(&format!("  {:>8} x {}\n", count, reason));
    }

    if !merged.is_empty() {
        text.push_str("\n📅 RECENT CHANGES\n");
        text.push_str(RULE_LIGHT);
        for entry in merged.iter().take(RECENT_CHANGES_SHOWN) {
            text.push_str(&format!(
                "{}  {:<20} {}\n",
                entry.timestamp_display(pools),
                entry.reason_label,
                entry.full_path
            ));
            text.push_str(&format!(
                "                     flags: {}\n",
                flag_names(entry.reason_bits).join(" | ")
            ));
        }

        if merged.len() > RECENT_CHANGES_SHOWN {
            text.push_str(&format!(
                "\n... and {} more entries\n",
                merged.len() - RECENT_CHANGES_SHOWN
            ));
        }
    }

    text
}

fn push_drive_section(text: &mut String, drive: &DriveReport) {
    let status = match &drive.status {
        DriveStatus::Completed => "completed".to_string(),
        DriveStatus::Empty { reason } => format!("empty ({})", reason),
        DriveStatus::Failed { kind, reason } => format!("FAILED [{:?}] {}", kind, reason),
        DriveStatus::Cancelled => "cancelled".to_string(),
    };
    text.push_str(&format!("{} {}\n", drive.drive, status));

    let stats = &drive.statistics;
    if stats.journal_bytes == 0 {
        return;
    }
    text.push_str(&format!(
        "   journal: {} bytes, {} records, {} skipped, {} padding regions\n",
        stats.journal_bytes, stats.records_decoded, stats.records_skipped, stats.padding_regions
    ));
    text.push_str(&format!(
        "   paths: {} at root, {} cached, {} climbed, {} unresolved\n",
        stats.resolve.root_parents,
        stats.resolve.cache_hits,
        stats.resolve.climbs,
        stats.resolve.unresolved()
    ));
    if stats.unknown_reasons > 0 {
        text.push_str(&format!(
            "   {} entries with no recognized reason bit\n",
            stats.unknown_reasons
        ));
    }
}

/// Entry count per reason label, in ladder order, zero counts omitted
fn reason_histogram(entries: &[JournalEntry]) -> Vec<(&'static str, usize)> {
    let mut counts: HashMap<ChangeReason, usize> = HashMap::new();
    for entry in entries {
        *counts.entry(entry.reason()).or_insert(0) += 1;
    }

    ChangeReason::ALL
        .iter()
        .filter_map(|reason| counts.get(reason).map(|&count| (reason.label(), count)))
        .collect()
}

/// Always-quoted CSV field with embedded quotes doubled
fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}
