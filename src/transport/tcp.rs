use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::ResolveError;

/// Send one length-prefixed query over a fresh TCP connection.
///
/// Returns the raw response bytes; the caller validates and applies the deadline.
pub async fn exchange(server: SocketAddr, query_bytes: &[u8]) -> Result<Vec<u8>, ResolveError> {
	let mut stream = TcpStream::connect(server)
		.await
		.map_err(|e| ResolveError::Transport(format!("connection to TCP server {} failed: {}", server, e)))?;
	stream
		.set_nodelay(true)
		.map_err(|e| ResolveError::Transport(format!("failed to set TCP_NODELAY on {}: {}", server, e)))?;

	send_with_length_prefix(&mut stream, query_bytes).await?;
	debug!(server = %server, message_len = query_bytes.len(), "TCP query sent");

	let response = read_with_length_prefix(&mut stream).await?;
	debug!(server = %server, response_len = response.len(), "TCP response received");
	Ok(response)
}

/// Write a DNS message with its two-byte length prefix (RFC 1035 §4.2.2).
pub(crate) async fn send_with_length_prefix<S>(stream: &mut S, message_bytes: &[u8]) -> Result<(), ResolveError>
where
	S: AsyncWrite + Unpin,
{
	let length = u16::try_from(message_bytes.len())
		.map_err(|_| ResolveError::Transport(format!("query too large: {} bytes", message_bytes.len())))?;

	stream
		.write_all(&length.to_be_bytes())
		.await
		.map_err(|e| ResolveError::Transport(format!("failed to write length prefix: {}", e)))?;
	stream
		.write_all(message_bytes)
		.await
		.map_err(|e| ResolveError::Transport(format!("failed to write DNS message: {}", e)))?;
	stream
		.flush()
		.await
		.map_err(|e| ResolveError::Transport(format!("failed to flush stream: {}", e)))?;
	Ok(())
}

/// Read one length-prefixed DNS message.
pub(crate) async fn read_with_length_prefix<S>(stream: &mut S) -> Result<Vec<u8>, ResolveError>
where
	S: AsyncRead + Unpin,
{
	let mut len_buf = [0u8; 2];
	stream
		.read_exact(&mut len_buf)
		.await
		.map_err(|e| ResolveError::Transport(format!("failed to read response length: {}", e)))?;

	let mut response = vec![0u8; usize::from(u16::from_be_bytes(len_buf))];
	stream
		.read_exact(&mut response)
		.await
		.map_err(|e| ResolveError::Transport(format!("failed to read response body: {}", e)))?;
	Ok(response)
}
