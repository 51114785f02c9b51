//! DNS-over-TLS (RFC 7858)

use std::net::SocketAddr;
use std::sync::Arc;

use rustls::pki_types::ServerName;
use tokio::net::TcpStream;
use tracing::debug;

use super::tcp::{read_with_length_prefix, send_with_length_prefix};
use crate::error::ResolveError;

/// TLS client configuration shared by every DoT query of one transport.
pub struct TlsConnector {
	connector: tokio_rustls::TlsConnector,
}

impl TlsConnector {
	pub fn new() -> Result<Self, ResolveError> {
		let mut root_store = rustls::RootCertStore::empty();
		root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

		let config = rustls::ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
			.with_safe_default_protocol_versions()
			.map_err(|e| ResolveError::Transport(format!("failed to configure TLS: {}", e)))?
			.with_root_certificates(root_store)
			.with_no_client_auth();

		Ok(TlsConnector {
			connector: tokio_rustls::TlsConnector::from(Arc::new(config)),
		})
	}

	/// Connect, handshake, and exchange one length-prefixed message.
	pub async fn exchange(
		&self,
		server: SocketAddr,
		server_name: &str,
		query_bytes: &[u8],
	) -> Result<Vec<u8>, ResolveError> {
		let name = ServerName::try_from(server_name.to_string())
			.map_err(|e| ResolveError::Transport(format!("invalid TLS hostname '{}': {}", server_name, e)))?;

		let tcp_stream = TcpStream::connect(server)
			.await
			.map_err(|e| ResolveError::Transport(format!("connection to TLS server {} failed: {}", server, e)))?;
		let mut stream = self
			.connector
			.connect(name, tcp_stream)
			.await
			.map_err(|e| ResolveError::Transport(format!("TLS handshake failed with {}: {}", server, e)))?;
		debug!(server = %server, hostname = %server_name, "TLS connection established");

		send_with_length_prefix(&mut stream, query_bytes).await?;
		let response = read_with_length_prefix(&mut stream).await?;
		debug!(server = %server, response_len = response.len(), "TLS response received");
		Ok(response)
	}
}
