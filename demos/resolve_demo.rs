//! Resolve a small synthetic change journal into a timeline
//!
//! Run with: cargo run --example resolve_demo

use byteorder::{LittleEndian, WriteBytesExt};
use std::collections::HashSet;
use std::io;
use usntrace_core::journal::reason::{
    USN_REASON_CLOSE, USN_REASON_DATA_EXTEND, USN_REASON_FILE_CREATE, USN_REASON_FILE_DELETE,
    USN_REASON_RENAME_NEW_NAME,
};
use usntrace_core::journal::time::{FILETIME_UNIX_EPOCH_OFFSET, TICKS_PER_SECOND};
use usntrace_core::journal::RECORD_HEADER_LEN;
use usntrace_core::{
    export, AncestorMap, Drive, InternPools, JournalData, JournalPipeline, PipelineConfig,
    SourceError,
};

/// 2024-01-01 00:00:00 UTC
const BASE_SECONDS: i64 = 1_704_067_200;

fn encode_record(
    out: &mut Vec<u8>,
    file_ref: u64,
    parent_ref: u64,
    usn: i64,
    seconds: i64,
    reason: u32,
    name: &str,
) -> io::Result<()> {
    let name_units: Vec<u16> = name.encode_utf16().collect();
    let name_bytes = name_units.len() * 2;
    let length = (RECORD_HEADER_LEN + name_bytes + 7) & !7;
    let start = out.len();

    out.write_u32::<LittleEndian>(length as u32)?;
    out.write_u16::<LittleEndian>(2)?;
    out.write_u16::<LittleEndian>(0)?;
    out.write_u64::<LittleEndian>(file_ref)?;
    out.write_u64::<LittleEndian>(parent_ref)?;
    out.write_i64::<LittleEndian>(usn)?;
    out.write_i64::<LittleEndian>(FILETIME_UNIX_EPOCH_OFFSET + (BASE_SECONDS + seconds) * TICKS_PER_SECOND)?;
    out.write_u32::<LittleEndian>(reason)?;
    out.write_u32::<LittleEndian>(0)?;
    out.write_u32::<LittleEndian>(0)?;
    out.write_u32::<LittleEndian>(0x20)?;
    out.write_u16::<LittleEndian>(name_bytes as u16)?;
    out.write_u16::<LittleEndian>(RECORD_HEADER_LEN as u16)?;
    for unit in name_units {
        out.write_u16::<LittleEndian>(unit)?;
    }
    out.resize(start + length, 0);
    Ok(())
}

fn synthetic_journal() -> io::Result<Vec<u8>> {
    let created = USN_REASON_FILE_CREATE | USN_REASON_CLOSE;
    let mut journal = Vec::new();
    encode_record(&mut journal, 1001, 300, 64, 5, created, "draft.docx")?;
    encode_record(&mut journal, 1001, 300, 128, 65, USN_REASON_DATA_EXTEND, "draft.docx")?;
    encode_record(&mut journal, 1001, 300, 192, 120, USN_REASON_RENAME_NEW_NAME, "final.docx")?;
    encode_record(&mut journal, 1002, 400, 256, 90, created, "build.log")?;
    encode_record(&mut journal, 1003, 5, 320, 30, USN_REASON_FILE_DELETE, "old-notes.txt")?;
    // Parent 777 is not in the ancestor map
    encode_record(&mut journal, 1004, 777, 384, 45, created, "mystery.bin")?;
    Ok(journal)
}

/// C:\Users\demo\Documents (300) and C:\Users\demo\src (400)
fn ancestors() -> AncestorMap {
    let mut map = AncestorMap::new();
    map.insert_entry(100, 5, "Users");
    map.insert_entry(200, 100, "demo");
    map.insert_entry(300, 200, "Documents");
    map.insert_entry(400, 200, "src");
    map
}

fn main() -> anyhow::Result<()> {
    let journal = synthetic_journal()?;
    let drive = Drive::new('C').ok_or_else(|| anyhow::anyhow!("invalid drive letter"))?;

    println!("usntrace Resolve Demo");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Journal bytes: {}", journal.len());
    println!();

    let pools = InternPools::shared();
    let mut pipeline = JournalPipeline::new(
        PipelineConfig::default(),
        move |_drive: Drive| -> Result<JournalData, SourceError> {
            Ok(JournalData::from(journal.clone()))
        },
        |_drive: Drive, needed: &HashSet<u64>| -> Result<AncestorMap, SourceError> {
            println!("Ancestor map requested for {} FRNs", needed.len());
            Ok(ancestors())
        },
        pools.clone(),
    );
    pipeline.set_progress_callback(|progress| {
        println!("  [{:>3}%] {}", progress.percent, progress.label);
    });

    let report = pipeline.run(&[drive]);

    println!();
    print!("{}", export::to_text_report(&report, &pools));

    let stats = pools.stats();
    println!();
    println!(
        "Pooled strings: {} paths, {} timestamps, {} reason labels",
        stats.paths, stats.timestamps, stats.reasons
    );

    pools.clear();
    Ok(())
}
