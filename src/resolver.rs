use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use anyhow::{anyhow, Result};

use crate::transport::{Endpoint, ResolverConfig};

const DNS_PORT: u16 = 53;
const DOT_PORT: u16 = 853;

/// Parse a resolver address string into a ResolverConfig.
///
/// Supports formats:
///   "1.1.1.1"                            -- UDP (TCP on truncation), default port 53
///   "1.1.1.1:53"                         -- IPv4 with explicit port
///   "2606:4700::1111"                    -- bare IPv6, default port 53
///   "[2606:4700::1111]:53"               -- bracketed IPv6 with port
///   "udp://9.9.9.9", "tcp://9.9.9.9:53"  -- explicit plain DNS protocol
///   "tls://1.1.1.1#cloudflare-dns.com"   -- DNS-over-TLS, default port 853
///   "https://dns.google/dns-query"       -- DNS-over-HTTPS
pub fn parse_resolver(input: &str) -> Result<ResolverConfig> {
	let trimmed = input.trim();
	if trimmed.is_empty() {
		return Err(anyhow!("empty resolver address"));
	}

	if trimmed.starts_with("https://") {
		return Ok(ResolverConfig {
			label: trimmed.to_string(),
			endpoint: Endpoint::Https {
				url: trimmed.to_string(),
			},
		});
	}

	if let Some(rest) = trimmed.strip_prefix("tls://") {
		let (address, server_name) = rest
			.split_once('#')
			.ok_or_else(|| anyhow!("DoT resolver '{}' needs a '#hostname' suffix", trimmed))?;
		if server_name.is_empty() {
			return Err(anyhow!("empty TLS hostname in '{}'", trimmed));
		}
		let addr = parse_socket_addr(address, DOT_PORT)?;
		return Ok(ResolverConfig {
			label: server_name.to_string(),
			endpoint: Endpoint::Tls {
				addr,
				server_name: server_name.to_string(),
			},
		});
	}

	if let Some(rest) = trimmed.strip_prefix("tcp://") {
		let addr = parse_socket_addr(rest, DNS_PORT)?;
		return Ok(ResolverConfig {
			label: format!("{}/tcp", addr.ip()),
			endpoint: Endpoint::Tcp(addr),
		});
	}

	let address = trimmed.strip_prefix("udp://").unwrap_or(trimmed);
	let addr = parse_socket_addr(address, DNS_PORT)?;
	Ok(ResolverConfig {
		label: addr.ip().to_string(),
		endpoint: Endpoint::Udp(addr),
	})
}

/// Parse an IP address with an optional port.
fn parse_socket_addr(input: &str, default_port: u16) -> Result<SocketAddr> {
	let addr = if input.starts_with('[') {
		// Bracketed IPv6 with port: [::1]:53
		input
			.parse()
			.map_err(|e| anyhow!("invalid bracketed IPv6 address '{}': {}", input, e))?
	} else if input.contains("::") || input.matches(':').count() > 1 {
		// Bare IPv6 address without port
		let ip: IpAddr = input
			.parse()
			.map_err(|e| anyhow!("invalid IPv6 address '{}': {}", input, e))?;
		SocketAddr::new(ip, default_port)
	} else if let Ok(addr) = input.parse::<SocketAddr>() {
		// IPv4 with port (e.g. "8.8.8.8:5353")
		addr
	} else {
		// Plain IPv4 without port
		let ip: IpAddr = input
			.parse()
			.map_err(|e| anyhow!("invalid IP address '{}': {}", input, e))?;
		SocketAddr::new(ip, default_port)
	};
	Ok(addr)
}

/// Read resolver addresses from a file, one per line.
///
/// Blank lines and lines starting with '#' are skipped.
pub fn read_resolver_file(path: &str) -> Result<Vec<ResolverConfig>> {
	let content = std::fs::read_to_string(path)
		.map_err(|e| anyhow!("failed to read resolver file '{}': {}", path, e))?;
	parse_resolver_lines(&content)
}

fn parse_resolver_lines(content: &str) -> Result<Vec<ResolverConfig>> {
	let mut resolvers = Vec::new();
	for line in content.lines() {
		let trimmed = line.trim();
		if trimmed.is_empty() || trimmed.starts_with('#') {
			continue;
		}
		resolvers.push(parse_resolver(trimmed)?);
	}
	Ok(resolvers)
}

/// Read system resolvers from /etc/resolv.conf (Unix only).
///
/// Returns an empty vec on non-Unix platforms or if the file cannot be read.
pub fn system_resolvers() -> Vec<ResolverConfig> {
	match std::fs::read_to_string("/etc/resolv.conf") {
		Ok(content) => parse_resolv_conf(&content),
		Err(_) => Vec::new(),
	}
}

fn parse_resolv_conf(content: &str) -> Vec<ResolverConfig> {
	let mut resolvers = Vec::new();
	for line in content.lines() {
		let mut parts = line.split_whitespace();
		if parts.next() != Some("nameserver") {
			continue;
		}
		// Scoped IPv6 (fe80::1%eth0) and other oddities are skipped
		if let Some(Ok(resolver)) = parts.next().map(parse_resolver) {
			resolvers.push(resolver);
		}
	}
	resolvers
}

/// Public resolvers used when none are configured.
pub fn default_resolvers() -> Vec<ResolverConfig> {
	vec![
		ResolverConfig {
			label: "Google".to_string(),
			endpoint: Endpoint::Udp(SocketAddr::new(IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)), DNS_PORT)),
		},
		ResolverConfig {
			label: "Cloudflare".to_string(),
			endpoint: Endpoint::Udp(SocketAddr::new(IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1)), DNS_PORT)),
		},
	]
}
