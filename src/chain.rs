use hickory_proto::op::Message;
use hickory_proto::rr::{Name, RData, RecordType};
use tracing::debug;

use crate::dns::parse_name;
use crate::error::{ErrorKind, ResolveError};
use crate::target::{ErrorSlot, QueryType, TargetState, MAX_CHAIN};
use crate::transport::SharedTransport;

/// Issues single queries for a target and follows HTTPS CNAME chains.
///
/// No retries happen here; a failed query surfaces to the caller as is.
pub struct ChainResolver {
	transport: SharedTransport,
	max_chain: u32,
}

impl ChainResolver {
	pub fn new(transport: SharedTransport) -> Self {
		Self::with_max_chain(transport, MAX_CHAIN)
	}

	pub fn with_max_chain(transport: SharedTransport, max_chain: u32) -> Self {
		ChainResolver { transport, max_chain }
	}

	pub fn max_chain(&self) -> u32 {
		self.max_chain
	}

	/// Issue one query of `query_type` for the target's current name.
	pub async fn resolve_one(&self, state: &TargetState, query_type: QueryType) -> Result<Message, ResolveError> {
		let name = self.query_name(state, query_type).await?;
		self.transport.query(&name, query_type.record_type()).await
	}

	/// Name a query of `query_type` should be sent to.
	///
	/// Zone-scoped types (NS, SOA) go to the zone apex of a followed canonical
	/// name, or to the canonical name itself when the apex cannot be found.
	pub async fn query_name(&self, state: &TargetState, query_type: QueryType) -> Result<Name, ResolveError> {
		let name = parse_name(state.query_name())?;
		if !query_type.is_zone_scoped() || state.canonical_name().is_none() {
			return Ok(name);
		}
		match self.zone_apex(&name).await {
			Ok(apex) => Ok(apex),
			Err(e) => {
				debug!(name = %name, error = %e, "zone apex lookup failed, using canonical name");
				Ok(name)
			}
		}
	}

	/// Query HTTPS, following CNAME redirects until a terminal answer.
	///
	/// Every response that carries a CNAME collapses its chain into one
	/// canonical name and counts as one redirect. More than `max_chain`
	/// redirects records `ChainTooLong` under CNAME and fails.
	pub async fn resolve_https_with_chain(&self, state: &mut TargetState) -> Result<Message, ResolveError> {
		loop {
			let name = parse_name(state.query_name())?;
			let message = self.transport.query(&name, RecordType::HTTPS).await?;
			if !has_cname(&message) {
				return Ok(message);
			}

			let canonical = canonical_name(&message, &name);
			state.set_canonical_name(canonical.to_string());
			if state.increment_chain_depth() > self.max_chain {
				state.set_error(ErrorSlot::Cname, ErrorKind::ChainTooLong);
				return Err(ResolveError::ChainTooLong {
					name: state.name().to_string(),
					limit: self.max_chain,
				});
			}
		}
	}

	/// Find the zone apex enclosing `name`.
	///
	/// Queries SOA at `name` and each ancestor in turn. An SOA owned by the
	/// queried name is the apex; an empty answer whose authority section
	/// holds the SOA of an enclosing zone names that zone. NXDOMAIN moves up
	/// one label, any other failure is returned. Reaching the root without
	/// an SOA is `NoAnswer`.
	pub async fn zone_apex(&self, name: &Name) -> Result<Name, ResolveError> {
		let mut current = name.clone();
		loop {
			match self.transport.query(&current, RecordType::SOA).await {
				Ok(message) => {
					if let Some(apex) = apex_from_response(&message, &current) {
						return Ok(apex);
					}
				}
				Err(ResolveError::NxDomain(_)) => {}
				Err(e) => return Err(e),
			}
			if current.is_root() {
				return Err(ResolveError::NoAnswer {
					name: name.to_string(),
					record_type: RecordType::SOA,
				});
			}
			current = current.base_name();
		}
	}
}

fn apex_from_response(message: &Message, qname: &Name) -> Option<Name> {
	let mut soa_answers = message
		.answers()
		.iter()
		.filter(|record| record.record_type() == RecordType::SOA)
		.peekable();
	if soa_answers.peek().is_some() {
		// An SOA under another owner means qname was redirected; look higher
		return soa_answers
			.find(|record| record.name() == qname)
			.map(|record| record.name().clone());
	}

	message
		.name_servers()
		.iter()
		.filter(|record| record.record_type() == RecordType::SOA)
		.map(|record| record.name())
		.find(|owner| *owner != qname && owner.zone_of(qname))
		.cloned()
}

/// True if the answer section contains any CNAME record.
pub fn has_cname(message: &Message) -> bool {
	message
		.answers()
		.iter()
		.any(|record| record.record_type() == RecordType::CNAME)
}

/// Collapse the CNAME hops in one response, starting from `qname`.
///
/// Returns `qname` itself when no CNAME is owned by it.
pub fn canonical_name(message: &Message, qname: &Name) -> Name {
	let mut current = qname.clone();
	// Each hop consumes one record, so a cycle within the response ends here
	for _ in 0..message.answers().len() {
		let next = message.answers().iter().find_map(|record| match record.data() {
			RData::CNAME(cname) if record.name() == &current => Some(cname.0.clone()),
			_ => None,
		});
		match next {
			Some(next) => current = next,
			None => break,
		}
	}
	current
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::transport::scripted::{cname_record, fqdn, https_record, referral, response, soa_record, ScriptedTransport};
	use hickory_proto::rr::Record;
	use std::sync::Arc;

	fn binding(owner: &str) -> Record {
		https_record(owner, 1, ".", Vec::new())
	}

	fn resolver(transport: &Arc<ScriptedTransport>) -> ChainResolver {
		ChainResolver::new(transport.clone())
	}

	/// host0 -> host1 -> ... -> host{k}, one redirect per response
	fn chain_of(k: usize) -> ScriptedTransport {
		let mut transport = ScriptedTransport::new();
		for i in 0..k {
			let owner = format!("host{}.example.", i);
			let target = format!("host{}.example.", i + 1);
			transport = transport.answer(&owner, RecordType::HTTPS, vec![cname_record(&owner, &target)]);
		}
		let last = format!("host{}.example.", k);
		transport.answer(&last, RecordType::HTTPS, vec![binding(&last)])
	}

	#[tokio::test]
	async fn test_no_cname_is_terminal() {
		let transport = Arc::new(chain_of(0));
		let mut state = TargetState::new("host0.example.", 1);
		let message = resolver(&transport).resolve_https_with_chain(&mut state).await.unwrap();
		assert_eq!(message.answers().len(), 1);
		assert_eq!(state.chain_depth(), 0);
		assert_eq!(state.canonical_name(), None);
		assert_eq!(transport.calls(), 1);
	}

	#[tokio::test]
	async fn test_chain_of_k_resolves_after_k_redirects() {
		for k in [1usize, 5, 20] {
			let transport = Arc::new(chain_of(k));
			let mut state = TargetState::new("host0.example.", 1);
			let message = resolver(&transport).resolve_https_with_chain(&mut state).await.unwrap();
			assert_eq!(state.chain_depth(), k as u32);
			assert_eq!(state.canonical_name(), Some(format!("host{}.example.", k).as_str()));
			assert_eq!(message.answers()[0].record_type(), RecordType::HTTPS);
			assert_eq!(transport.calls(), k + 1);
			assert_eq!(state.error(ErrorSlot::Cname), None);
		}
	}

	#[tokio::test]
	async fn test_cycle_ends_with_chain_too_long() {
		let transport = Arc::new(
			ScriptedTransport::new()
				.answer("a.example.", RecordType::HTTPS, vec![cname_record("a.example.", "b.example.")])
				.answer("b.example.", RecordType::HTTPS, vec![cname_record("b.example.", "a.example.")]),
		);
		let mut state = TargetState::new("a.example.", 1);
		let err = resolver(&transport).resolve_https_with_chain(&mut state).await.unwrap_err();
		assert!(matches!(err, ResolveError::ChainTooLong { limit: 20, .. }), "got {:?}", err);
		assert_eq!(state.error(ErrorSlot::Cname), Some(ErrorKind::ChainTooLong));
		assert_eq!(state.chain_depth(), 21);
		assert_eq!(transport.calls(), 21);
	}

	#[tokio::test]
	async fn test_multi_hop_response_counts_once() {
		let transport = Arc::new(
			ScriptedTransport::new()
				.answer(
					"www.example.com.",
					RecordType::HTTPS,
					vec![
						cname_record("www.example.com.", "edge.cdn.example."),
						cname_record("edge.cdn.example.", "pop1.cdn.example."),
					],
				)
				.answer("pop1.cdn.example.", RecordType::HTTPS, vec![binding("pop1.cdn.example.")]),
		);
		let mut state = TargetState::new("www.example.com", 1);
		resolver(&transport).resolve_https_with_chain(&mut state).await.unwrap();
		assert_eq!(state.canonical_name(), Some("pop1.cdn.example."));
		assert_eq!(state.chain_depth(), 1);
		assert_eq!(transport.calls(), 2);
	}

	#[tokio::test]
	async fn test_transport_failure_propagates() {
		let transport = Arc::new(ScriptedTransport::new().fail("example.com.", RecordType::HTTPS, ErrorKind::Timeout));
		let mut state = TargetState::new("example.com", 1);
		let err = resolver(&transport).resolve_https_with_chain(&mut state).await.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::Timeout);
		assert_eq!(state.error(ErrorSlot::Cname), None);
	}

	#[test]
	fn test_canonical_name_handles_cycle_in_one_response() {
		let message = response(
			"a.example.",
			RecordType::HTTPS,
			vec![cname_record("a.example.", "b.example."), cname_record("b.example.", "a.example.")],
		);
		// Terminates; the exact landing point does not matter
		let canonical = canonical_name(&message, &fqdn("a.example."));
		assert!(canonical == fqdn("a.example.") || canonical == fqdn("b.example."));
	}

	#[tokio::test]
	async fn test_zone_apex_exact_owner() {
		let transport = Arc::new(ScriptedTransport::new().answer(
			"example.com.",
			RecordType::SOA,
			vec![soa_record("example.com.")],
		));
		let apex = resolver(&transport).zone_apex(&fqdn("example.com.")).await.unwrap();
		assert_eq!(apex, fqdn("example.com."));
	}

	#[tokio::test]
	async fn test_zone_apex_from_authority() {
		let transport = Arc::new(ScriptedTransport::new().message(
			"edge.cdn.example.net.",
			RecordType::SOA,
			referral("edge.cdn.example.net.", RecordType::SOA, vec![soa_record("example.net.")]),
		));
		let apex = resolver(&transport).zone_apex(&fqdn("edge.cdn.example.net.")).await.unwrap();
		assert_eq!(apex, fqdn("example.net."));
		assert_eq!(transport.calls(), 1);
	}

	#[tokio::test]
	async fn test_zone_apex_walks_past_nxdomain() {
		let transport = Arc::new(
			ScriptedTransport::new()
				.fail("gone.example.org.", RecordType::SOA, ErrorKind::NxDomain)
				.answer("example.org.", RecordType::SOA, vec![soa_record("example.org.")]),
		);
		let apex = resolver(&transport).zone_apex(&fqdn("gone.example.org.")).await.unwrap();
		assert_eq!(apex, fqdn("example.org."));
	}

	#[tokio::test]
	async fn test_zone_apex_fails_at_root() {
		let transport = Arc::new(ScriptedTransport::new());
		let err = resolver(&transport).zone_apex(&fqdn("a.b.")).await.unwrap_err();
		assert_eq!(err.kind(), ErrorKind::NoAnswer);
		// a.b., b., and the root
		assert_eq!(transport.calls(), 3);
	}

	#[tokio::test]
	async fn test_zone_scoped_query_uses_apex() {
		let transport = Arc::new(
			ScriptedTransport::new()
				.message(
					"pop1.cdn.example.",
					RecordType::SOA,
					referral("pop1.cdn.example.", RecordType::SOA, vec![soa_record("cdn.example.")]),
				),
		);
		let mut state = TargetState::new("www.example.com", 1);
		state.set_canonical_name("pop1.cdn.example.".to_string());
		let resolver = resolver(&transport);

		let name = resolver.query_name(&state, QueryType::Ns).await.unwrap();
		assert_eq!(name, fqdn("cdn.example."));
		let name = resolver.query_name(&state, QueryType::A).await.unwrap();
		assert_eq!(name, fqdn("pop1.cdn.example."));
	}

	#[tokio::test]
	async fn test_zone_scoped_query_falls_back_to_canonical() {
		let transport = Arc::new(ScriptedTransport::new().fail("pop1.cdn.example.", RecordType::SOA, ErrorKind::Timeout));
		let mut state = TargetState::new("www.example.com", 1);
		state.set_canonical_name("pop1.cdn.example.".to_string());
		let name = resolver(&transport).query_name(&state, QueryType::Soa).await.unwrap();
		assert_eq!(name, fqdn("pop1.cdn.example."));
	}

	#[tokio::test]
	async fn test_zone_scoped_query_without_canonical_uses_name() {
		let transport = Arc::new(ScriptedTransport::new());
		let state = TargetState::new("example.com", 1);
		let name = resolver(&transport).query_name(&state, QueryType::Ns).await.unwrap();
		assert_eq!(name, fqdn("example.com."));
		assert_eq!(transport.calls(), 0);
	}
}
