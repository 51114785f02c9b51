use std::collections::BTreeMap;
use std::fmt;

use hickory_proto::rr::RecordType;
use serde::{Serialize, Serializer};
use tracing::debug;

use crate::decode::DecodedAnswer;
use crate::error::ErrorKind;

/// Maximum number of CNAME redirects followed for one target.
pub const MAX_CHAIN: u32 = 20;

/// Record types the engine queries for each target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QueryType {
	Https,
	Ns,
	Soa,
	A,
	Aaaa,
}

impl QueryType {
	pub fn record_type(&self) -> RecordType {
		match self {
			QueryType::Https => RecordType::HTTPS,
			QueryType::Ns => RecordType::NS,
			QueryType::Soa => RecordType::SOA,
			QueryType::A => RecordType::A,
			QueryType::Aaaa => RecordType::AAAA,
		}
	}

	/// NS and SOA describe a zone rather than a single name.
	pub fn is_zone_scoped(&self) -> bool {
		matches!(self, QueryType::Ns | QueryType::Soa)
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			QueryType::Https => "HTTPS",
			QueryType::Ns => "NS",
			QueryType::Soa => "SOA",
			QueryType::A => "A",
			QueryType::Aaaa => "AAAA",
		}
	}
}

impl fmt::Display for QueryType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Key of a recorded failure: a query type, or the CNAME chain itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorSlot {
	Query(QueryType),
	Cname,
}

impl ErrorSlot {
	pub fn as_str(&self) -> &'static str {
		match self {
			ErrorSlot::Query(query_type) => query_type.as_str(),
			ErrorSlot::Cname => "CNAME",
		}
	}
}

impl From<QueryType> for ErrorSlot {
	fn from(query_type: QueryType) -> Self {
		ErrorSlot::Query(query_type)
	}
}

impl Serialize for ErrorSlot {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(self.as_str())
	}
}

/// Outcome of comparing HTTPS address hints against A/AAAA answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HintCheck {
	pub ipv4_consistent: bool,
	pub ipv6_consistent: bool,
}

/// Per-target resolution state.
///
/// Created once per input name and owned by exactly one resolution task.
/// For every query type, an entry lives in at most one of `answers` and
/// `errors`; the setters keep the two maps disjoint.
#[derive(Debug, Clone, Serialize)]
pub struct TargetState {
	name: String,
	rank: u64,
	canonical_name: Option<String>,
	answers: BTreeMap<QueryType, Option<DecodedAnswer>>,
	errors: BTreeMap<ErrorSlot, ErrorKind>,
	chain_depth: u32,
}

impl TargetState {
	pub fn new(name: impl Into<String>, rank: u64) -> Self {
		TargetState {
			name: name.into(),
			rank,
			canonical_name: None,
			answers: BTreeMap::new(),
			errors: BTreeMap::new(),
			chain_depth: 0,
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn rank(&self) -> u64 {
		self.rank
	}

	pub fn canonical_name(&self) -> Option<&str> {
		self.canonical_name.as_deref()
	}

	/// Name that name-scoped queries should target right now.
	pub fn query_name(&self) -> &str {
		self.canonical_name.as_deref().unwrap_or(&self.name)
	}

	pub fn set_canonical_name(&mut self, canonical: String) {
		debug!(name = %self.name, canonical = %canonical, "following CNAME");
		self.canonical_name = Some(canonical);
	}

	pub fn chain_depth(&self) -> u32 {
		self.chain_depth
	}

	/// Count one more followed redirect and return the new depth.
	pub fn increment_chain_depth(&mut self) -> u32 {
		self.chain_depth += 1;
		self.chain_depth
	}

	pub fn set_answer(&mut self, query_type: QueryType, answer: Option<DecodedAnswer>) {
		self.errors.remove(&ErrorSlot::Query(query_type));
		self.answers.insert(query_type, answer);
	}

	pub fn set_error(&mut self, slot: ErrorSlot, kind: ErrorKind) {
		debug!(name = %self.name, slot = slot.as_str(), kind = %kind, "recording error");
		if let ErrorSlot::Query(query_type) = slot {
			self.answers.remove(&query_type);
		}
		self.errors.insert(slot, kind);
	}

	/// `None` if the type was never answered, `Some(None)` if it was answered empty.
	pub fn answer(&self, query_type: QueryType) -> Option<Option<&DecodedAnswer>> {
		self.answers.get(&query_type).map(Option::as_ref)
	}

	pub fn error(&self, slot: impl Into<ErrorSlot>) -> Option<ErrorKind> {
		self.errors.get(&slot.into()).copied()
	}

	pub fn answers(&self) -> &BTreeMap<QueryType, Option<DecodedAnswer>> {
		&self.answers
	}

	pub fn errors(&self) -> &BTreeMap<ErrorSlot, ErrorKind> {
		&self.errors
	}

	/// Check that every HTTPS address hint also appears in the A/AAAA answer.
	///
	/// A family with no hints, or with no plain addresses, counts as consistent.
	pub fn hint_check(&self) -> HintCheck {
		let https = match self.answer(QueryType::Https).flatten() {
			Some(DecodedAnswer::Https(https)) => Some(https),
			_ => None,
		};
		let (ipv4_hints, ipv6_hints) = match https {
			Some(https) => (https.ipv4_hints(), https.ipv6_hints()),
			None => (Vec::new(), Vec::new()),
		};
		HintCheck {
			ipv4_consistent: hints_consistent(&ipv4_hints, &self.addresses(QueryType::A)),
			ipv6_consistent: hints_consistent(&ipv6_hints, &self.addresses(QueryType::Aaaa)),
		}
	}

	fn addresses(&self, query_type: QueryType) -> Vec<String> {
		match self.answer(query_type).flatten() {
			Some(DecodedAnswer::Addresses(answer)) => answer.address_strings(),
			_ => Vec::new(),
		}
	}
}

fn hints_consistent(hints: &[String], addresses: &[String]) -> bool {
	if hints.is_empty() || addresses.is_empty() {
		return true;
	}
	hints.iter().all(|hint| addresses.contains(hint))
}
