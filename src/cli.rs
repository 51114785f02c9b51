use clap::{Parser, ValueEnum};

use httpsrr_scan::domains::Variant;
use httpsrr_scan::BatchMode;

/// HTTPS/SVCB record scanner
#[derive(Parser, Debug)]
#[command(name = "httpsrr-scan")]
#[command(about = "Resolve HTTPS/SVCB records for large domain lists, following CNAME chains")]
pub struct Cli {
	/// Domain list: `rank,name` rows or one name per line
	pub input: String,

	/// Output file path (stdout when omitted)
	#[arg(short = 'o', long = "output")]
	pub output: Option<String>,

	/// Output format
	#[arg(long = "format", value_enum, default_value = "csv")]
	pub format: OutputFormat,

	/// Which form of each listed name to query
	#[arg(long = "variant", value_enum, default_value = "apex")]
	pub variant: VariantArg,

	/// What to resolve for each name
	#[arg(long = "mode", value_enum, default_value = "https")]
	pub mode: ModeArg,

	/// Names resolved per batch; results are written after each batch
	#[arg(long = "chunk-size", default_value = "5000")]
	pub chunk_size: usize,

	/// DNS resolver (repeatable): 1.1.1.1, tcp://ip, tls://ip#host, https://url
	#[arg(short = 'r', long = "resolver")]
	pub resolvers: Vec<String>,

	/// File containing resolver addresses (one per line)
	#[arg(short = 'f', long = "resolver-file")]
	pub resolver_file: Option<String>,

	/// Include system resolvers from /etc/resolv.conf
	#[arg(long = "system-resolvers")]
	pub system_resolvers: bool,

	/// Maximum names resolved at once
	#[arg(short = 'c', long = "concurrency", default_value = "40")]
	pub concurrency: usize,

	/// Per-query timeout in milliseconds, shared across resolvers
	#[arg(short = 't', long = "timeout", default_value = "5000")]
	pub timeout: u64,

	/// Advertised EDNS UDP payload size
	#[arg(long = "payload", default_value = "1420")]
	pub payload: u16,

	/// Do not set the DNSSEC OK bit
	#[arg(long = "no-dnssec")]
	pub no_dnssec: bool,

	/// Set the AD bit on queries
	#[arg(long = "authentic-data")]
	pub authentic_data: bool,

	/// Clear the RD bit on queries
	#[arg(long = "no-recursion")]
	pub no_recursion: bool,

	/// Maximum CNAME redirects followed per name
	#[arg(long = "max-chain", default_value = "20")]
	pub max_chain: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
	Csv,
	Jsonl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VariantArg {
	Raw,
	Apex,
	Www,
}

impl From<VariantArg> for Variant {
	fn from(arg: VariantArg) -> Self {
		match arg {
			VariantArg::Raw => Variant::Raw,
			VariantArg::Apex => Variant::Apex,
			VariantArg::Www => Variant::Www,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
	/// HTTPS with CNAME following, then NS, SOA, A and AAAA
	Https,
	/// NS and SOA only
	Zone,
}

impl From<ModeArg> for BatchMode {
	fn from(arg: ModeArg) -> Self {
		match arg {
			ModeArg::Https => BatchMode::Https,
			ModeArg::Zone => BatchMode::Zone,
		}
	}
}
