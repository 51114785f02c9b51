use std::fs::File;
use std::io::{self, BufWriter, Write};

use anyhow::{anyhow, Result};
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

use httpsrr_scan::stats::ScanStats;
use httpsrr_scan::{BatchMode, EngineConfig, QueryType, TargetState};

use crate::cli::OutputFormat;

/// Print a summary of the scan configuration before running.
pub fn write_config_summary(
	out: &mut dyn Write,
	config: &EngineConfig,
	input_count: usize,
	chunk_size: usize,
) -> io::Result<()> {
	let mode = match config.mode {
		BatchMode::Https => "HTTPS + NS/SOA/A/AAAA",
		BatchMode::Zone => "NS/SOA",
	};
	writeln!(out, "HTTPS Record Scan Configuration")?;
	writeln!(out, "===============================")?;
	writeln!(out, "Resolvers:      {}", config.resolvers.len())?;
	for r in &config.resolvers {
		writeln!(out, "  - {} ({})", r.label, r.endpoint)?;
	}
	writeln!(out, "Names:          {}", input_count)?;
	writeln!(out, "Mode:           {}", mode)?;
	writeln!(out, "Chunk size:     {}", chunk_size)?;
	writeln!(out, "Concurrency:    {}", config.concurrency)?;
	writeln!(out, "Timeout:        {} ms", config.options.timeout.as_millis())?;
	writeln!(out, "EDNS payload:   {}", config.options.edns_payload)?;
	let dnssec_label = if config.options.dnssec_ok { "yes" } else { "no" };
	writeln!(out, "DNSSEC OK:      {}", dnssec_label)?;
	writeln!(out, "Max CNAME hops: {}", config.max_chain)?;
	writeln!(out)
}

/// Print the totals of a finished scan as tables.
pub fn write_scan_summary(out: &mut dyn Write, stats: &ScanStats) -> io::Result<()> {
	let ms = |value: Option<f64>| value.map_or_else(|| "-".to_string(), |v| format!("{:.1} ms", v));

	let mut table = Table::new();
	table.load_preset(UTF8_FULL);
	table.set_content_arrangement(ContentArrangement::Dynamic);
	table.set_header(vec!["Attempted", "Resolved", "Dropped", "p50", "p95", "Peak in flight"]);
	table.add_row(vec![
		stats.attempted.to_string(),
		stats.resolved.to_string(),
		stats.dropped_total().to_string(),
		ms(stats.latency_percentile(50.0)),
		ms(stats.latency_percentile(95.0)),
		stats.peak_in_flight.to_string(),
	]);
	writeln!(out, "\nScan Results")?;
	writeln!(out, "============\n")?;
	writeln!(out, "{table}")?;

	if stats.dropped_total() > 0 {
		let mut dropped = Table::new();
		dropped.load_preset(UTF8_FULL);
		dropped.set_header(vec!["Dropped because", "Names"]);
		for (kind, count) in &stats.dropped {
			dropped.add_row(vec![kind.to_string(), count.to_string()]);
		}
		if stats.panicked > 0 {
			dropped.add_row(vec!["task panic".to_string(), stats.panicked.to_string()]);
		}
		writeln!(out, "\n{dropped}")?;
	}

	if !stats.recorded_errors.is_empty() {
		let mut errors = Table::new();
		errors.load_preset(UTF8_FULL);
		errors.set_header(vec!["Record", "Error", "Names"]);
		for (slot, kinds) in &stats.recorded_errors {
			for (kind, count) in kinds {
				errors.add_row(vec![slot.as_str().to_string(), kind.to_string(), count.to_string()]);
			}
		}
		writeln!(out, "\n{errors}")?;
	}

	writeln!(
		out,
		"\nHint mismatches: {} ipv4hint, {} ipv6hint",
		stats.ipv4_hint_mismatches, stats.ipv6_hint_mismatches
	)
}

/// One resolved name as a flat CSV row; answer cells hold JSON.
#[derive(Debug, Serialize)]
pub struct FlatRecord {
	pub rank: u64,
	pub domain: String,
	pub cname: Option<String>,
	pub https: Option<String>,
	pub a: Option<String>,
	pub aaaa: Option<String>,
	pub ns: Option<String>,
	pub soa: Option<String>,
	pub ipv4hint_consistent: bool,
	pub ipv6hint_consistent: bool,
	pub error: Option<String>,
}

impl FlatRecord {
	pub fn from_state(state: &TargetState) -> Result<Self> {
		let cell = |query_type: QueryType| -> Result<Option<String>> {
			match state.answer(query_type).flatten() {
				Some(answer) => Ok(Some(serde_json::to_string(answer)?)),
				None => Ok(None),
			}
		};
		let error = if state.errors().is_empty() {
			None
		} else {
			Some(serde_json::to_string(state.errors())?)
		};
		let check = state.hint_check();
		Ok(FlatRecord {
			rank: state.rank(),
			domain: state.name().to_string(),
			cname: state.canonical_name().map(String::from),
			https: cell(QueryType::Https)?,
			a: cell(QueryType::A)?,
			aaaa: cell(QueryType::Aaaa)?,
			ns: cell(QueryType::Ns)?,
			soa: cell(QueryType::Soa)?,
			ipv4hint_consistent: check.ipv4_consistent,
			ipv6hint_consistent: check.ipv6_consistent,
			error,
		})
	}
}

/// Sink for resolved names
pub enum RecordWriter {
	Csv(csv::Writer<Box<dyn Write>>),
	JsonLines(Box<dyn Write>),
}

impl RecordWriter {
	/// Open `path` (or stdout) for the given format.
	pub fn create(path: Option<&str>, format: OutputFormat) -> Result<Self> {
		let sink: Box<dyn Write> = match path {
			Some(path) => {
				let file = File::create(path).map_err(|e| anyhow!("failed to create '{}': {}", path, e))?;
				Box::new(BufWriter::new(file))
			}
			None => Box::new(BufWriter::new(io::stdout())),
		};
		Ok(Self::from_writer(sink, format))
	}

	pub fn from_writer(sink: Box<dyn Write>, format: OutputFormat) -> Self {
		match format {
			OutputFormat::Csv => RecordWriter::Csv(csv::Writer::from_writer(sink)),
			OutputFormat::Jsonl => RecordWriter::JsonLines(sink),
		}
	}

	pub fn write(&mut self, state: &TargetState) -> Result<()> {
		match self {
			RecordWriter::Csv(writer) => writer.serialize(FlatRecord::from_state(state)?)?,
			RecordWriter::JsonLines(writer) => {
				serde_json::to_writer(&mut *writer, state)?;
				writer.write_all(b"\n")?;
			}
		}
		Ok(())
	}

	/// Write a batch of results ordered by rank.
	pub fn write_all<'a, I>(&mut self, states: I) -> Result<()>
	where
		I: IntoIterator<Item = &'a TargetState>,
	{
		let mut states: Vec<&TargetState> = states.into_iter().collect();
		states.sort_by(|a, b| a.rank().cmp(&b.rank()).then_with(|| a.name().cmp(b.name())));
		for state in states {
			self.write(state)?;
		}
		self.flush()
	}

	pub fn flush(&mut self) -> Result<()> {
		match self {
			RecordWriter::Csv(writer) => writer.flush()?,
			RecordWriter::JsonLines(writer) => writer.flush()?,
		}
		Ok(())
	}
}
