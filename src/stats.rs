use std::collections::BTreeMap;

use crate::batch::BatchReport;
use crate::error::ErrorKind;
use crate::target::{ErrorSlot, TargetState};

/// Running totals across every batch of a scan
#[derive(Debug, Clone, Default)]
pub struct ScanStats {
	pub attempted: usize,
	pub resolved: usize,
	/// Targets dropped from the results, by failure kind
	pub dropped: BTreeMap<ErrorKind, usize>,
	pub panicked: usize,
	/// Failures recorded on resolved targets, per query type or CNAME
	pub recorded_errors: BTreeMap<ErrorSlot, BTreeMap<ErrorKind, usize>>,
	/// Resolved targets whose address hints disagree with their A/AAAA answers
	pub ipv4_hint_mismatches: usize,
	pub ipv6_hint_mismatches: usize,
	/// Peak simultaneous targets seen by the gate
	pub peak_in_flight: usize,
	latencies_ms: Vec<f64>,
}

impl ScanStats {
	/// Fold one batch into the totals.
	pub fn absorb(&mut self, report: &BatchReport, peak_in_flight: usize) {
		self.attempted += report.attempted;
		self.resolved += report.results.len();
		self.panicked += report.panicked;
		for (kind, count) in &report.dropped {
			*self.dropped.entry(*kind).or_insert(0) += count;
		}
		for state in report.results.values() {
			self.absorb_target(state);
		}
		self.latencies_ms
			.extend(report.latencies.iter().map(|d| d.as_secs_f64() * 1000.0));
		self.peak_in_flight = self.peak_in_flight.max(peak_in_flight);
	}

	fn absorb_target(&mut self, state: &TargetState) {
		for (slot, kind) in state.errors() {
			*self
				.recorded_errors
				.entry(*slot)
				.or_default()
				.entry(*kind)
				.or_insert(0) += 1;
		}
		let check = state.hint_check();
		if !check.ipv4_consistent {
			self.ipv4_hint_mismatches += 1;
		}
		if !check.ipv6_consistent {
			self.ipv6_hint_mismatches += 1;
		}
	}

	pub fn dropped_total(&self) -> usize {
		self.dropped.values().sum::<usize>() + self.panicked
	}

	/// Per-target latency percentile in milliseconds
	pub fn latency_percentile(&self, p: f64) -> Option<f64> {
		let mut sorted = self.latencies_ms.clone();
		sorted.sort_by(|a, b| a.total_cmp(b));
		percentile(&sorted, p)
	}

	pub fn latency_mean(&self) -> Option<f64> {
		mean(&self.latencies_ms)
	}
}

/// Calculate the p-th percentile from a sorted slice using nearest-rank method.
///
/// Args:
///   sorted_values: Pre-sorted slice of f64 values.
///   p: Percentile between 0.0 and 100.0 (e.g. 50.0 for median).
///
/// Returns:
///   None if the slice is empty, otherwise the percentile value.
pub fn percentile(sorted_values: &[f64], p: f64) -> Option<f64> {
	if sorted_values.is_empty() {
		return None;
	}
	// Nearest-rank: rank = ceil(p/100 * N), clamped to [1, N]
	let n = sorted_values.len();
	let rank = ((p / 100.0) * n as f64).ceil() as usize;
	Some(sorted_values[rank.clamp(1, n) - 1])
}

/// Calculate the arithmetic mean of a slice of values.
pub fn mean(values: &[f64]) -> Option<f64> {
	if values.is_empty() {
		return None;
	}
	let sum: f64 = values.iter().sum();
	Some(sum / values.len() as f64)
}
