use hickory_proto::op::Message;
use hickory_proto::rr::RecordType;
use tracing::debug;

use crate::chain::ChainResolver;
use crate::decode::{decode, DecodedAnswer};
use crate::error::ResolveError;
use crate::target::{QueryType, TargetState};

/// Per-target query pipeline.
///
/// HTTPS decides whether a target is in scope: its failure is recorded and
/// returned. Every other query type is best effort and only recorded.
pub struct QuerySupervisor {
	resolver: ChainResolver,
}

impl QuerySupervisor {
	pub fn new(resolver: ChainResolver) -> Self {
		QuerySupervisor { resolver }
	}

	pub fn resolver(&self) -> &ChainResolver {
		&self.resolver
	}

	/// Resolve HTTPS (following CNAMEs), then NS, SOA, A and AAAA.
	///
	/// The follow-up queries only run when HTTPS produced a usable answer.
	/// They run concurrently and each outcome lands in its own slot.
	pub async fn resolve(&self, state: &mut TargetState) -> Result<(), ResolveError> {
		let https = match self.https_answer(state).await {
			Ok(answer) => answer,
			Err(e) => {
				state.set_error(QueryType::Https.into(), e.kind());
				return Err(e);
			}
		};
		state.set_answer(QueryType::Https, Some(https));

		let shared: &TargetState = state;
		let (ns, soa, a, aaaa) = tokio::join!(
			self.query_and_decode(shared, QueryType::Ns),
			self.query_and_decode(shared, QueryType::Soa),
			self.query_and_decode(shared, QueryType::A),
			self.query_and_decode(shared, QueryType::Aaaa),
		);
		record(state, QueryType::Ns, ns);
		record(state, QueryType::Soa, soa);
		record(state, QueryType::A, a);
		record(state, QueryType::Aaaa, aaaa);
		Ok(())
	}

	/// NS and SOA only, for tracking zone delegation over time.
	///
	/// Never fails; both outcomes are recorded on `state`.
	pub async fn resolve_zone(&self, state: &mut TargetState) {
		let shared: &TargetState = state;
		let (ns, soa) = tokio::join!(
			self.query_and_decode(shared, QueryType::Ns),
			self.query_and_decode(shared, QueryType::Soa),
		);
		record(state, QueryType::Ns, ns);
		record(state, QueryType::Soa, soa);
	}

	async fn https_answer(&self, state: &mut TargetState) -> Result<DecodedAnswer, ResolveError> {
		let message = self.resolver.resolve_https_with_chain(state).await?;
		let no_answer = || ResolveError::NoAnswer {
			name: state.query_name().to_string(),
			record_type: RecordType::HTTPS,
		};
		if message.answers().is_empty() {
			return Err(no_answer());
		}
		// An answer holding only DNAMEs or signatures decodes to nothing
		decode(&message, QueryType::Https)?.ok_or_else(no_answer)
	}

	async fn query_and_decode(
		&self,
		state: &TargetState,
		query_type: QueryType,
	) -> Result<Option<DecodedAnswer>, ResolveError> {
		let message: Message = self.resolver.resolve_one(state, query_type).await?;
		decode(&message, query_type)
	}
}

fn record(state: &mut TargetState, query_type: QueryType, outcome: Result<Option<DecodedAnswer>, ResolveError>) {
	match outcome {
		Ok(answer) => state.set_answer(query_type, answer),
		Err(e) => {
			debug!(name = %state.name(), query_type = %query_type, error = %e, "query failed");
			state.set_error(query_type.into(), e.kind());
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::ErrorKind;
	use crate::target::ErrorSlot;
	use crate::transport::scripted::{
		a_record, aaaa_record, cname_record, https_record, ns_record, rrsig_record, soa_record, ScriptedTransport,
	};
	use hickory_proto::rr::rdata::svcb::{SvcParamKey, SvcParamValue, Unknown};
	use std::sync::Arc;

	fn supervisor(transport: &Arc<ScriptedTransport>) -> QuerySupervisor {
		QuerySupervisor::new(ChainResolver::new(transport.clone()))
	}

	fn full_zone(name: &str) -> ScriptedTransport {
		ScriptedTransport::new()
			.answer(name, RecordType::HTTPS, vec![https_record(name, 1, ".", Vec::new())])
			.answer(name, RecordType::NS, vec![ns_record(name, "ns1.example.net.")])
			.answer(name, RecordType::SOA, vec![soa_record(name)])
			.answer(name, RecordType::A, vec![a_record(name, [192, 0, 2, 10])])
			.answer(name, RecordType::AAAA, vec![aaaa_record(name, "2001:db8::10")])
	}

	#[tokio::test]
	async fn test_full_pipeline_populates_every_type() {
		let transport = Arc::new(full_zone("example.com."));
		let mut state = TargetState::new("example.com", 1);
		supervisor(&transport).resolve(&mut state).await.unwrap();

		for query_type in [QueryType::Https, QueryType::Ns, QueryType::Soa, QueryType::A, QueryType::Aaaa] {
			assert!(
				matches!(state.answer(query_type), Some(Some(_))),
				"{} should be answered",
				query_type
			);
		}
		assert!(state.errors().is_empty());
		assert_eq!(transport.calls(), 5);
	}

	#[tokio::test]
	async fn test_empty_https_is_no_answer() {
		let transport = Arc::new(ScriptedTransport::new());
		let mut state = TargetState::new("example.com", 1);
		let err = supervisor(&transport).resolve(&mut state).await.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::NoAnswer);
		assert_eq!(state.error(QueryType::Https), Some(ErrorKind::NoAnswer));
		// No follow-up queries after HTTPS fails
		assert_eq!(transport.calls(), 1);
		assert!(state.answers().is_empty());
	}

	#[tokio::test]
	async fn test_signatures_only_https_is_no_answer() {
		let transport = Arc::new(ScriptedTransport::new().answer(
			"example.com.",
			RecordType::HTTPS,
			vec![rrsig_record("example.com.")],
		));
		let mut state = TargetState::new("example.com", 1);
		let err = supervisor(&transport).resolve(&mut state).await.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::NoAnswer);
		assert_eq!(state.error(QueryType::Https), Some(ErrorKind::NoAnswer));
		assert_eq!(transport.calls(), 1);
	}

	#[tokio::test]
	async fn test_failed_a_query_is_absorbed() {
		let transport = Arc::new(full_zone("example.com.").fail("example.com.", RecordType::A, ErrorKind::Timeout));
		let mut state = TargetState::new("example.com", 1);
		supervisor(&transport).resolve(&mut state).await.unwrap();

		assert_eq!(state.error(QueryType::A), Some(ErrorKind::Timeout));
		assert!(state.answer(QueryType::A).is_none());
		for query_type in [QueryType::Https, QueryType::Ns, QueryType::Soa, QueryType::Aaaa] {
			assert!(matches!(state.answer(query_type), Some(Some(_))));
		}
		assert_eq!(transport.calls(), 5);
	}

	#[tokio::test]
	async fn test_empty_follow_up_is_answered_none() {
		let transport = Arc::new(
			ScriptedTransport::new()
				.answer("example.com.", RecordType::HTTPS, vec![https_record("example.com.", 1, ".", Vec::new())]),
		);
		let mut state = TargetState::new("example.com", 1);
		supervisor(&transport).resolve(&mut state).await.unwrap();
		assert_eq!(state.answer(QueryType::Aaaa), Some(None));
		assert_eq!(state.error(QueryType::Aaaa), None);
	}

	#[tokio::test]
	async fn test_https_decode_failure_propagates() {
		let record = https_record(
			"example.com.",
			1,
			".",
			vec![(SvcParamKey::Key(9), SvcParamValue::Unknown(Unknown(vec![0])))],
		);
		let transport = Arc::new(ScriptedTransport::new().answer("example.com.", RecordType::HTTPS, vec![record]));
		let mut state = TargetState::new("example.com", 1);
		let err = supervisor(&transport).resolve(&mut state).await.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::UnsupportedRecordKind);
		assert_eq!(state.error(QueryType::Https), Some(ErrorKind::UnsupportedRecordKind));
	}

	#[tokio::test]
	async fn test_chain_too_long_fails_target() {
		let transport = Arc::new(
			ScriptedTransport::new()
				.answer("a.example.", RecordType::HTTPS, vec![cname_record("a.example.", "b.example.")])
				.answer("b.example.", RecordType::HTTPS, vec![cname_record("b.example.", "a.example.")]),
		);
		let mut state = TargetState::new("a.example.", 1);
		let err = supervisor(&transport).resolve(&mut state).await.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::ChainTooLong);
		assert_eq!(state.error(ErrorSlot::Cname), Some(ErrorKind::ChainTooLong));
		assert_eq!(state.error(QueryType::Https), Some(ErrorKind::ChainTooLong));
	}

	#[tokio::test]
	async fn test_follow_ups_target_canonical_name() {
		let transport = Arc::new(
			full_zone("edge.example.net.")
				.answer(
					"www.example.com.",
					RecordType::HTTPS,
					vec![cname_record("www.example.com.", "edge.example.net.")],
				),
		);
		let mut state = TargetState::new("www.example.com", 1);
		supervisor(&transport).resolve(&mut state).await.unwrap();
		assert_eq!(state.canonical_name(), Some("edge.example.net."));
		assert!(matches!(state.answer(QueryType::A), Some(Some(_))));
		assert!(transport
			.log()
			.iter()
			.any(|(name, record_type)| name == "edge.example.net." && *record_type == RecordType::AAAA));
	}

	#[tokio::test]
	async fn test_zone_mode_queries_ns_and_soa_only() {
		let transport = Arc::new(full_zone("example.com.").fail("example.com.", RecordType::NS, ErrorKind::TransportError));
		let mut state = TargetState::new("example.com", 1);
		supervisor(&transport).resolve_zone(&mut state).await;
		assert_eq!(state.error(QueryType::Ns), Some(ErrorKind::TransportError));
		assert!(matches!(state.answer(QueryType::Soa), Some(Some(_))));
		assert!(state.answer(QueryType::Https).is_none());
		assert_eq!(transport.calls(), 2);
	}
}
