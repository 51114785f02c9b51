//! DNS-over-HTTPS (RFC 8484)
//!
//! Queries are sent as HTTP POST requests whose body is the raw DNS wire
//! message; the response body is the raw DNS wire response.

use tracing::debug;

use crate::error::ResolveError;

/// Content type for DNS wire messages over HTTP (RFC 8484 §4.1)
const DNS_MESSAGE_CONTENT_TYPE: &str = "application/dns-message";

/// Pooled HTTP client for DoH endpoints
pub struct HttpsClient {
	client: reqwest::Client,
}

impl HttpsClient {
	pub fn new() -> Result<Self, ResolveError> {
		let client = reqwest::Client::builder()
			.use_rustls_tls()
			.pool_max_idle_per_host(4)
			.build()
			.map_err(|e| ResolveError::Transport(format!("failed to build HTTP client: {}", e)))?;
		Ok(HttpsClient { client })
	}

	pub async fn exchange(&self, url: &str, query_bytes: &[u8]) -> Result<Vec<u8>, ResolveError> {
		debug!(url = %url, message_len = query_bytes.len(), "sending DoH query");

		let response = self
			.client
			.post(url)
			.header("Content-Type", DNS_MESSAGE_CONTENT_TYPE)
			.header("Accept", DNS_MESSAGE_CONTENT_TYPE)
			.body(query_bytes.to_vec())
			.send()
			.await
			.map_err(|e| ResolveError::Transport(format!("DoH request to {} failed: {}", url, e)))?;

		let status = response.status();
		if !status.is_success() {
			return Err(ResolveError::Transport(format!(
				"DoH server {} returned HTTP {}",
				url,
				status.as_u16()
			)));
		}

		let body = response
			.bytes()
			.await
			.map_err(|e| ResolveError::Transport(format!("failed to read DoH response from {}: {}", url, e)))?;
		debug!(url = %url, response_len = body.len(), "DoH response received");
		Ok(body.to_vec())
	}
}
