mod cli;
mod output;

use std::io::{self, Write};
use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use httpsrr_scan::domains::{self, Variant};
use httpsrr_scan::resolver;
use httpsrr_scan::stats::ScanStats;
use httpsrr_scan::{EngineConfig, QueryOptions};

use crate::cli::Cli;
use crate::output::RecordWriter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.with_writer(io::stderr)
		.init();

	let cli = Cli::parse();

	// Collect resolvers from all sources
	let mut resolvers = Vec::new();
	for r in &cli.resolvers {
		resolvers.push(resolver::parse_resolver(r)?);
	}
	if let Some(path) = &cli.resolver_file {
		resolvers.extend(resolver::read_resolver_file(path)?);
	}
	if cli.system_resolvers {
		resolvers.extend(resolver::system_resolvers());
	}
	if resolvers.is_empty() {
		resolvers = resolver::default_resolvers();
	}

	let config = EngineConfig {
		resolvers,
		options: QueryOptions {
			edns_payload: cli.payload,
			dnssec_ok: !cli.no_dnssec,
			recursion_desired: !cli.no_recursion,
			authentic_data: cli.authentic_data,
			timeout: Duration::from_millis(cli.timeout),
		},
		concurrency: cli.concurrency,
		max_chain: cli.max_chain,
		mode: cli.mode.into(),
	};

	let entries = domains::read_domain_file(&cli.input)?;
	let variant: Variant = cli.variant.into();
	let chunk_size = cli.chunk_size.max(1);

	// Records go to stdout when no output file is given, so keep the summaries off it
	let mut summary: Box<dyn Write> = match cli.output {
		Some(_) => Box::new(io::stdout()),
		None => Box::new(io::stderr()),
	};
	output::write_config_summary(&mut summary, &config, entries.len(), chunk_size)?;

	let runner = config.build_runner()?;
	let mut writer = RecordWriter::create(cli.output.as_deref(), cli.format)?;
	let mut stats = ScanStats::default();

	for (index, chunk) in entries.chunks(chunk_size).enumerate() {
		let targets = domains::to_targets(chunk, variant);
		let report = runner.run_batch_report(targets).await;
		stats.absorb(&report, runner.gate().peak());
		writer.write_all(report.results.values())?;
		info!(
			chunk = index + 1,
			done = stats.attempted,
			total = entries.len(),
			"chunk written"
		);
	}
	writer.flush()?;

	output::write_scan_summary(&mut summary, &stats)?;
	Ok(())
}
