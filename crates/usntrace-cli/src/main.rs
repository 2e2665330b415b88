use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;
use usntrace_core::journal::{flag_names, format_filetime};
use usntrace_core::{
	export, file_pipeline, ChangeReason, Drive, DriveStatus, InternPools, JournalData,
	JournalReader, PipelineConfig, PipelineProgress, RunReport,
};

#[derive(Parser, Debug)]
#[command(name = "usntrace", version, about = "usntrace - NTFS change journal timeline reconstruction")]
struct Cli {
	/// Debug logging (RUST_LOG overrides)
	#[arg(short, long, global = true)]
	verbose: bool,
	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
	/// Resolve journal dumps into a sorted change timeline
	Scan {
		/// Raw journal dump per drive, e.g. C=usn_c.bin (repeatable)
		#[arg(long = "journal", value_name = "DRIVE=FILE", required = true, value_parser = parse_drive_path)]
		journals: Vec<(Drive, PathBuf)>,
		/// Ancestor snapshot (JSON) per drive, e.g. C=mft_c.json (repeatable)
		#[arg(long = "ancestors", value_name = "DRIVE=FILE", value_parser = parse_drive_path)]
		ancestors: Vec<(Drive, PathBuf)>,
		#[arg(long, value_enum, default_value_t = OutputFormat::Text)]
		format: OutputFormat,
		/// Write to a file instead of stdout
		#[arg(long)]
		output: Option<PathBuf>,
		/// Resolve paths on the calling thread only
		#[arg(long)]
		sequential: bool,
		/// Maximum ancestors walked per path
		#[arg(long, default_value_t = 256)]
		max_depth: usize,
		/// Dumps start with the 8-byte next-USN header
		#[arg(long)]
		skip_leading_usn: bool,
	},
	/// Print the decoded records of a journal dump
	Decode {
		file: PathBuf,
		/// Stop after this many records
		#[arg(long, default_value_t = 100)]
		limit: usize,
		#[arg(long)]
		skip_leading_usn: bool,
	},
	/// Classify a reason mask (decimal or 0x hex)
	Reasons {
		bits: String,
	},
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
	Csv,
	/// Entries only
	Json,
	/// Whole run: statuses, statistics and entries
	Report,
	Text,
}

fn main() -> Result<()> {
	let cli = Cli::parse();
	init_tracing(cli.verbose);

	match cli.command {
		Commands::Scan {
			journals,
			ancestors,
			format,
			output,
			sequential,
			max_depth,
			skip_leading_usn,
		} => {
			let config = PipelineConfig {
				max_climb_depth: max_depth,
				parallel_resolution: !sequential,
				skip_leading_usn,
				..PipelineConfig::default()
			};
			run_scan(&journals, &ancestors, config, format, output)?;
		}
		Commands::Decode { file, limit, skip_leading_usn } => {
			run_decode(&file, limit, skip_leading_usn)?;
		}
		Commands::Reasons { bits } => {
			let mask = parse_mask(&bits)?;
			println!("🔎 Reason mask 0x{:08X}", mask);
			println!("   Classified as: {}", ChangeReason::classify(mask));
			let names = flag_names(mask);
			if names.is_empty() {
				println!("   Flags: (none recognized)");
			} else {
				println!("   Flags: {}", names.join(" | "));
			}
		}
	}
	Ok(())
}

fn init_tracing(verbose: bool) {
	let default_level = if verbose { "debug" } else { "info" };
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.init();
}

fn run_scan(
	journals: &[(Drive, PathBuf)],
	ancestors: &[(Drive, PathBuf)],
	config: PipelineConfig,
	format: OutputFormat,
	output: Option<PathBuf>,
) -> Result<()> {
	let pools = InternPools::shared();
	let (mut pipeline, drives) = file_pipeline(journals, ancestors, config, pools.clone())?;

	let bars = if atty::is(atty::Stream::Stderr) {
		Some(progress_bars(&drives))
	} else {
		None
	};
	if let Some((_, bars)) = &bars {
		let bars = bars.clone();
		pipeline.set_progress_callback(move |progress: PipelineProgress| {
			if let Some(bar) = bars.get(&progress.drive) {
				bar.set_position(u64::from(progress.percent));
				bar.set_message(progress.stage.label());
			}
		});
	}

	let report = pipeline.run(&drives);

	if let Some((_, bars)) = &bars {
		for bar in bars.values() {
			bar.finish_and_clear();
		}
	}

	let rendered = render(&report, format, &pools)?;
	match &output {
		Some(path) => {
			let mut file = File::create(path)
				.with_context(|| format!("failed to create {}", path.display()))?;
			file.write_all(rendered.as_bytes())?;
			file.flush()?;
		}
		None => {
			let stdout = std::io::stdout();
			let mut handle = stdout.lock();
			handle.write_all(rendered.as_bytes())?;
			handle.flush()?;
		}
	}

	print_summary(&report, output.as_deref());
	pools.clear();

	if report.drives.iter().all(|d| matches!(d.status, DriveStatus::Failed { .. })) {
		anyhow::bail!("every requested drive failed");
	}
	Ok(())
}

fn progress_bars(drives: &[Drive]) -> (MultiProgress, Arc<HashMap<Drive, ProgressBar>>) {
	let multi = MultiProgress::new();
	let style = ProgressStyle::with_template("{prefix} [{bar:40.cyan/blue}] {pos:>3}% {msg}")
		.unwrap_or_else(|_| ProgressStyle::default_bar())
		.progress_chars("=> ");

	let bars = drives
		.iter()
		.map(|&drive| {
			let bar = multi.add(ProgressBar::new(100));
			bar.set_style(style.clone());
			bar.set_prefix(drive.to_string());
			(drive, bar)
		})
		.collect();

	(multi, Arc::new(bars))
}

fn render(report: &RunReport, format: OutputFormat, pools: &InternPools) -> Result<String> {
	let rendered = match format {
		OutputFormat::Csv => export::to_csv(&report.merged_entries(), pools),
		OutputFormat::Json => export::to_json(&report.merged_entries())?,
		OutputFormat::Report => export::report_to_json(report)?,
		OutputFormat::Text => export::to_text_report(report, pools),
	};
	Ok(rendered)
}

fn print_summary(report: &RunReport, output: Option<&Path>) {
	eprintln!("✅ Scan completed");
	eprintln!("📊 Run ID: {}", report.run_id);
	eprintln!("📈 Entries: {}", report.total_entries());
	for drive in &report.drives {
		match &drive.status {
			DriveStatus::Completed => eprintln!(
				"💽 {} {} entries ({} unresolved paths)",
				drive.drive,
				drive.entries.len(),
				drive.statistics.resolve.unresolved()
			),
			DriveStatus::Empty { reason } => eprintln!("💽 {} empty: {}", drive.drive, reason),
			DriveStatus::Failed { reason, .. } => eprintln!("❌ {} failed: {}", drive.drive, reason),
			DriveStatus::Cancelled => eprintln!("⚠️  {} cancelled", drive.drive),
		}
	}
	if let Some(path) = output {
		eprintln!("💾 Written to {}", path.display());
	}
}

fn run_decode(file: &Path, limit: usize, skip_leading_usn: bool) -> Result<()> {
	let bytes =
		JournalData::open(file).with_context(|| format!("failed to map {}", file.display()))?;
	let mut reader = if skip_leading_usn {
		JournalReader::starting_at(&bytes, 8)
	} else {
		JournalReader::new(&bytes)
	};

	println!("🔍 Decoding {} ({} bytes)", file.display(), bytes.len());
	let mut shown = 0;
	for record in reader.by_ref().take(limit) {
		println!(
			"{:>12}  {}  {:<20} parent={:<10} frn={:<10} {}",
			record.usn,
			format_filetime(record.timestamp_raw),
			ChangeReason::classify(record.reason_bits).label(),
			record.parent_frn(),
			record.file_frn(),
			record.file_name
		);
		shown += 1;
	}

	let stats = reader.stats();
	println!();
	println!(
		"📈 {} shown, {} decoded, {} corrupt, {} padding regions",
		shown, stats.records_decoded, stats.records_skipped, stats.padding_regions
	);
	if shown == limit && reader.offset() < bytes.len() {
		println!("   (stopped at --limit {}, offset {})", limit, reader.offset());
	}
	Ok(())
}

/// `C=path`, `c:=path` or `C:\=path`
fn parse_drive_path(value: &str) -> Result<(Drive, PathBuf), String> {
	let (drive, path) = value
		.split_once('=')
		.ok_or_else(|| format!("expected DRIVE=FILE, got '{}'", value))?;
	let drive: Drive = drive.parse().map_err(|e: usntrace_core::InvalidDrive| e.to_string())?;
	if path.is_empty() {
		return Err(format!("missing file for {}", drive));
	}
	Ok((drive, PathBuf::from(path)))
}

fn parse_mask(value: &str) -> Result<u32> {
	let value = value.trim();
	let mask = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
		Some(hex) => u32::from_str_radix(hex, 16),
		None => value.parse::<u32>(),
	};
	mask.with_context(|| format!("invalid reason mask '{}'", value))
}
