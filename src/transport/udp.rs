use std::net::SocketAddr;

use hickory_proto::op::Message;
use hickory_proto::rr::{Name, RecordType};
use tokio::net::UdpSocket;
use tracing::trace;

use crate::dns::parse_response;
use crate::error::ResolveError;

/// Smallest receive buffer, the classic DNS UDP limit
pub const MIN_BUFFER_SIZE: usize = 512;

/// Responses that fail validation are skipped this many times before giving up.
const MAX_RECV_ATTEMPTS: usize = 3;

/// Send a single query over UDP and wait for the matching response.
///
/// Creates a dedicated socket per query to avoid response stealing between
/// concurrent tasks. The caller applies the deadline.
pub async fn exchange(
	server: SocketAddr,
	query_bytes: &[u8],
	txid: u16,
	name: &Name,
	record_type: RecordType,
	buffer_size: usize,
) -> Result<Message, ResolveError> {
	let bind_addr = if server.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
	let socket = UdpSocket::bind(bind_addr)
		.await
		.map_err(|e| ResolveError::Transport(format!("failed to bind UDP socket: {}", e)))?;

	socket
		.send_to(query_bytes, server)
		.await
		.map_err(|e| ResolveError::Transport(format!("failed to send UDP query to {}: {}", server, e)))?;

	// Retry recv on txid or question mismatch
	let mut buf = vec![0u8; buffer_size];
	let mut last_error = None;
	for _ in 0..MAX_RECV_ATTEMPTS {
		let (len, src) = socket
			.recv_from(&mut buf)
			.await
			.map_err(|e| ResolveError::Transport(format!("UDP receive from {} failed: {}", server, e)))?;
		if src != server {
			trace!(expected = %server, got = %src, "ignoring datagram from unexpected peer");
			continue;
		}
		match parse_response(&buf[..len], txid, name, record_type) {
			Ok(message) => return Ok(message),
			Err(e) => {
				trace!(server = %server, error = %e, "discarding unusable UDP response");
				last_error = Some(e);
			}
		}
	}

	Err(last_error
		.unwrap_or_else(|| ResolveError::Transport(format!("no usable UDP response from {}", server))))
}
