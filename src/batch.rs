use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::{ErrorKind, ResolveError};
use crate::gate::ConcurrencyGate;
use crate::supervisor::QuerySupervisor;
use crate::target::TargetState;

/// Which per-target pipeline a batch runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchMode {
	/// HTTPS with CNAME following, then NS, SOA, A, AAAA
	#[default]
	Https,
	/// NS and SOA only
	Zone,
}

/// Outcome of one batch
#[derive(Debug, Default)]
pub struct BatchReport {
	/// Targets that resolved, keyed by their original name
	pub results: HashMap<String, TargetState>,
	pub attempted: usize,
	/// Targets left out of `results`, by the kind of failure
	pub dropped: BTreeMap<ErrorKind, usize>,
	/// Resolution tasks that panicked
	pub panicked: usize,
	/// Time each resolved target spent holding a gate permit
	pub latencies: Vec<Duration>,
	pub elapsed: Duration,
}

impl BatchReport {
	pub fn dropped_total(&self) -> usize {
		self.dropped.values().sum::<usize>() + self.panicked
	}
}

type TaskOutput = (TargetState, Result<(), ResolveError>, Duration);

/// Runs many targets through a shared admission gate.
///
/// Each target gets its own task; the runner is the only consumer of task
/// results, so no result map is ever shared between tasks.
pub struct BatchRunner {
	supervisor: Arc<QuerySupervisor>,
	gate: ConcurrencyGate,
	mode: BatchMode,
}

impl BatchRunner {
	pub fn new(supervisor: Arc<QuerySupervisor>, gate: ConcurrencyGate, mode: BatchMode) -> Self {
		BatchRunner { supervisor, gate, mode }
	}

	pub fn supervisor(&self) -> &QuerySupervisor {
		&self.supervisor
	}

	pub fn gate(&self) -> &ConcurrencyGate {
		&self.gate
	}

	pub fn mode(&self) -> BatchMode {
		self.mode
	}

	/// Resolve every target and return those that succeeded, keyed by name.
	///
	/// Failing targets are left out. The batch itself never fails.
	pub async fn run_batch(&self, targets: Vec<TargetState>) -> HashMap<String, TargetState> {
		self.run_batch_report(targets).await.results
	}

	/// Like `run_batch`, also reporting what was dropped and how long targets took.
	pub async fn run_batch_report(&self, targets: Vec<TargetState>) -> BatchReport {
		let started = Instant::now();
		let mut report = BatchReport {
			attempted: targets.len(),
			..BatchReport::default()
		};

		let mut tasks = JoinSet::new();
		for state in targets {
			tasks.spawn(resolve_target(self.supervisor.clone(), self.gate.clone(), self.mode, state));
		}

		while let Some(joined) = tasks.join_next().await {
			match joined {
				Ok((state, Ok(()), latency)) => {
					report.latencies.push(latency);
					report.results.insert(state.name().to_string(), state);
				}
				Ok((state, Err(e), _)) => {
					debug!(name = %state.name(), error = %e, "dropping target");
					*report.dropped.entry(e.kind()).or_insert(0) += 1;
				}
				Err(e) => {
					warn!(error = %e, "resolution task failed");
					report.panicked += 1;
				}
			}
		}

		report.elapsed = started.elapsed();
		info!(
			attempted = report.attempted,
			resolved = report.results.len(),
			dropped = report.dropped_total(),
			peak_in_flight = self.gate.peak(),
			elapsed_ms = report.elapsed.as_millis() as u64,
			"batch complete"
		);
		report
	}
}

async fn resolve_target(
	supervisor: Arc<QuerySupervisor>,
	gate: ConcurrencyGate,
	mode: BatchMode,
	mut state: TargetState,
) -> TaskOutput {
	// Held until the task returns, on every path
	let _permit = match gate.acquire().await {
		Ok(permit) => permit,
		Err(e) => {
			let error = ResolveError::Transport(format!("admission gate closed: {}", e));
			return (state, Err(error), Duration::ZERO);
		}
	};

	let started = Instant::now();
	let outcome = match mode {
		BatchMode::Https => supervisor.resolve(&mut state).await,
		BatchMode::Zone => {
			supervisor.resolve_zone(&mut state).await;
			Ok(())
		}
	};
	(state, outcome, started.elapsed())
}
