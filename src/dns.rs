use hickory_proto::op::{Edns, Message, MessageType, OpCode, Query};
use hickory_proto::rr::{Name, RecordType};

use crate::error::ResolveError;
use crate::transport::QueryOptions;

/// Parse a textual domain into an absolute `Name`.
pub fn parse_name(domain: &str) -> Result<Name, ResolveError> {
	let mut name = Name::from_ascii(domain).map_err(|e| ResolveError::InvalidName {
		name: domain.to_string(),
		reason: e.to_string(),
	})?;
	name.set_fqdn(true);
	Ok(name)
}

/// Build a DNS query message for the given name and record type.
///
/// An EDNS OPT record is always attached, carrying the advertised payload
/// size and the DO bit from `options`. Returns the serialized query bytes.
pub fn build_query(
	name: &Name,
	record_type: RecordType,
	txid: u16,
	options: &QueryOptions,
) -> Result<Vec<u8>, ResolveError> {
	let mut message = Message::new();
	message.set_id(txid);
	message.set_message_type(MessageType::Query);
	message.set_op_code(OpCode::Query);
	message.set_recursion_desired(options.recursion_desired);
	message.set_authentic_data(options.authentic_data);
	message.add_query(Query::query(name.clone(), record_type));

	let edns = message.extensions_mut().get_or_insert_with(Edns::new);
	edns.set_max_payload(options.edns_payload);
	edns.set_dnssec_ok(options.dnssec_ok);

	message
		.to_vec()
		.map_err(|e| ResolveError::Transport(format!("failed to serialize DNS query: {}", e)))
}

/// Parse a DNS response, validating the transaction ID and the echoed question.
///
/// Returns an error if the response cannot be parsed, the txid does not
/// match, or the question section names something else.
pub fn parse_response(
	bytes: &[u8],
	expected_txid: u16,
	expected_name: &Name,
	expected_type: RecordType,
) -> Result<Message, ResolveError> {
	let message = Message::from_vec(bytes)
		.map_err(|e| ResolveError::Transport(format!("failed to parse DNS response: {}", e)))?;

	if message.id() != expected_txid {
		return Err(ResolveError::Transport(format!(
			"txid mismatch: expected {}, got {}",
			expected_txid,
			message.id()
		)));
	}

	// Verify this is a response, not a query
	if message.message_type() != MessageType::Response {
		return Err(ResolveError::Transport("received a query instead of a response".to_string()));
	}

	// Name equality is case-insensitive
	let question_matches = message
		.queries()
		.iter()
		.any(|query| query.query_type() == expected_type && query.name() == expected_name);
	if !question_matches {
		return Err(ResolveError::Transport(format!(
			"question mismatch: expected {} {}",
			expected_name, expected_type
		)));
	}

	Ok(message)
}
