pub mod https;
pub mod tcp;
pub mod tls;
pub mod udp;

#[cfg(test)]
pub mod scripted;

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hickory_proto::op::{Message, ResponseCode};
use hickory_proto::rr::{Name, RecordType};
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::dns::{build_query, parse_response};
use crate::error::ResolveError;

/// Per-query wire options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
	/// Advertised EDNS UDP payload size
	pub edns_payload: u16,
	pub dnssec_ok: bool,
	pub recursion_desired: bool,
	pub authentic_data: bool,
	/// Overall deadline for one query, shared across endpoint attempts
	pub timeout: Duration,
}

impl Default for QueryOptions {
	fn default() -> Self {
		QueryOptions {
			edns_payload: 1420,
			dnssec_ok: true,
			recursion_desired: true,
			authentic_data: false,
			timeout: Duration::from_secs(5),
		}
	}
}

/// Where and how to reach one recursive resolver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
	Udp(SocketAddr),
	Tcp(SocketAddr),
	/// DNS-over-TLS; `server_name` is checked against the certificate.
	Tls { addr: SocketAddr, server_name: String },
	/// DNS-over-HTTPS POST endpoint
	Https { url: String },
}

impl Endpoint {
	pub fn protocol_name(&self) -> &'static str {
		match self {
			Endpoint::Udp(_) => "UDP",
			Endpoint::Tcp(_) => "TCP",
			Endpoint::Tls { .. } => "TLS",
			Endpoint::Https { .. } => "HTTPS",
		}
	}
}

impl fmt::Display for Endpoint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Endpoint::Udp(addr) => write!(f, "udp://{}", addr),
			Endpoint::Tcp(addr) => write!(f, "tcp://{}", addr),
			Endpoint::Tls { addr, server_name } => write!(f, "tls://{}#{}", addr, server_name),
			Endpoint::Https { url } => f.write_str(url),
		}
	}
}

/// Configuration for a single DNS resolver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
	pub label: String,
	pub endpoint: Endpoint,
}

/// Something that can answer one DNS question.
///
/// Implementations return the full response message for NOERROR answers,
/// including empty ones; the caller decides what an empty answer means.
#[async_trait]
pub trait Transport: Send + Sync {
	async fn query(&self, name: &Name, record_type: RecordType) -> Result<Message, ResolveError>;
}

/// Stub resolver over an ordered list of recursive endpoints.
///
/// Endpoints are tried in order until one produces a usable answer or the
/// shared deadline from `QueryOptions::timeout` runs out.
pub struct StubTransport {
	resolvers: Vec<ResolverConfig>,
	options: QueryOptions,
	tls: tls::TlsConnector,
	http: https::HttpsClient,
}

impl StubTransport {
	pub fn new(resolvers: Vec<ResolverConfig>, options: QueryOptions) -> Result<Self, ResolveError> {
		if resolvers.is_empty() {
			return Err(ResolveError::Transport("no resolvers configured".to_string()));
		}
		Ok(StubTransport {
			resolvers,
			options,
			tls: tls::TlsConnector::new()?,
			http: https::HttpsClient::new()?,
		})
	}

	/// Send one query to one endpoint and return the validated response.
	async fn exchange(
		&self,
		endpoint: &Endpoint,
		name: &Name,
		record_type: RecordType,
	) -> Result<Message, ResolveError> {
		let txid: u16 = rand::random();
		let query_bytes = build_query(name, record_type, txid, &self.options)?;

		let response_bytes = match endpoint {
			Endpoint::Udp(addr) => {
				let buffer_size = usize::from(self.options.edns_payload).max(udp::MIN_BUFFER_SIZE);
				let message = udp::exchange(*addr, &query_bytes, txid, name, record_type, buffer_size).await?;
				if !message.truncated() {
					return Ok(message);
				}
				debug!(server = %addr, name = %name, "truncated UDP answer, retrying over TCP");
				tcp::exchange(*addr, &query_bytes).await?
			}
			Endpoint::Tcp(addr) => tcp::exchange(*addr, &query_bytes).await?,
			Endpoint::Tls { addr, server_name } => self.tls.exchange(*addr, server_name, &query_bytes).await?,
			Endpoint::Https { url } => self.http.exchange(url, &query_bytes).await?,
		};

		parse_response(&response_bytes, txid, name, record_type)
	}
}

#[async_trait]
impl Transport for StubTransport {
	async fn query(&self, name: &Name, record_type: RecordType) -> Result<Message, ResolveError> {
		let deadline = Instant::now() + self.options.timeout;
		let mut last_error = None;

		for resolver in &self.resolvers {
			let now = Instant::now();
			if now >= deadline {
				break;
			}

			let attempt = tokio::time::timeout(deadline - now, self.exchange(&resolver.endpoint, name, record_type));
			let message = match attempt.await {
				Ok(Ok(message)) => message,
				Ok(Err(e)) => {
					debug!(resolver = %resolver.label, name = %name, error = %e, "query failed");
					last_error = Some(e);
					continue;
				}
				Err(_) => {
					last_error = Some(ResolveError::Timeout(format!("{} {} via {}", name, record_type, resolver.label)));
					break;
				}
			};

			match message.response_code() {
				ResponseCode::NoError => {
					trace!(resolver = %resolver.label, name = %name, record_type = %record_type, "answered");
					return Ok(message);
				}
				ResponseCode::NXDomain => return Err(ResolveError::NxDomain(name.to_string())),
				rcode => {
					debug!(resolver = %resolver.label, name = %name, rcode = %rcode, "resolver refused to answer");
					last_error = Some(ResolveError::Transport(format!(
						"{} answered {} for {} {}",
						resolver.label, rcode, name, record_type
					)));
				}
			}
		}

		Err(last_error.unwrap_or_else(|| ResolveError::Timeout(format!("{} {}", name, record_type))))
	}
}

/// Shared handle to any transport
pub type SharedTransport = Arc<dyn Transport>;
