use std::fmt;

use hickory_proto::rr::RecordType;
use serde::Serialize;
use thiserror::Error;

/// Storable classification of a failed lookup.
///
/// This is what ends up in `TargetState::errors`; the full `ResolveError`
/// with its context is only logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ErrorKind {
	Timeout,
	NoAnswer,
	ChainTooLong,
	UnsupportedRecordKind,
	NxDomain,
	TransportError,
}

impl ErrorKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			ErrorKind::Timeout => "Timeout",
			ErrorKind::NoAnswer => "NoAnswer",
			ErrorKind::ChainTooLong => "ChainTooLong",
			ErrorKind::UnsupportedRecordKind => "UnsupportedRecordKind",
			ErrorKind::NxDomain => "NxDomain",
			ErrorKind::TransportError => "TransportError",
		}
	}
}

impl fmt::Display for ErrorKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Errors raised while querying, following chains, or decoding answers.
#[derive(Debug, Error)]
pub enum ResolveError {
	#[error("timed out: {0}")]
	Timeout(String),

	#[error("no answer for {name} {record_type}")]
	NoAnswer { name: String, record_type: RecordType },

	#[error("CNAME chain from {name} exceeded {limit} hops")]
	ChainTooLong { name: String, limit: u32 },

	#[error("unexpected {found} record in {expected} answer")]
	UnsupportedRecordKind { found: RecordType, expected: RecordType },

	#[error("unsupported SvcParam key {0}")]
	UnsupportedSvcParam(u16),

	#[error("malformed {record_type} rdata: {reason}")]
	MalformedRdata { record_type: RecordType, reason: String },

	#[error("{0} does not exist")]
	NxDomain(String),

	#[error("invalid domain name '{name}': {reason}")]
	InvalidName { name: String, reason: String },

	#[error("{0}")]
	Transport(String),
}

impl ResolveError {
	/// Collapse the error into the kind recorded on a target.
	pub fn kind(&self) -> ErrorKind {
		match self {
			ResolveError::Timeout(_) => ErrorKind::Timeout,
			ResolveError::NoAnswer { .. } => ErrorKind::NoAnswer,
			ResolveError::ChainTooLong { .. } => ErrorKind::ChainTooLong,
			ResolveError::UnsupportedRecordKind { .. }
			| ResolveError::UnsupportedSvcParam(_)
			| ResolveError::MalformedRdata { .. } => ErrorKind::UnsupportedRecordKind,
			ResolveError::NxDomain(_) => ErrorKind::NxDomain,
			ResolveError::InvalidName { .. } | ResolveError::Transport(_) => ErrorKind::TransportError,
		}
	}

	/// Build an error of the given kind with a short context string.
	///
	/// Used where only the kind survives, e.g. when replaying a recorded outcome.
	#[cfg(test)]
	pub fn from_kind(kind: ErrorKind, context: &str) -> Self {
		match kind {
			ErrorKind::Timeout => ResolveError::Timeout(context.to_string()),
			ErrorKind::NoAnswer => ResolveError::NoAnswer {
				name: context.to_string(),
				record_type: RecordType::ANY,
			},
			ErrorKind::ChainTooLong => ResolveError::ChainTooLong {
				name: context.to_string(),
				limit: crate::target::MAX_CHAIN,
			},
			ErrorKind::UnsupportedRecordKind => ResolveError::MalformedRdata {
				record_type: RecordType::ANY,
				reason: context.to_string(),
			},
			ErrorKind::NxDomain => ResolveError::NxDomain(context.to_string()),
			ErrorKind::TransportError => ResolveError::Transport(context.to_string()),
		}
	}
}
