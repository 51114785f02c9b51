//! Flattening of DNS answers into serializable records.
//!
//! Every function here is a pure mapping from a parsed `Message` to a
//! `DecodedAnswer`. Decoding either yields a complete answer or fails; a
//! partially filled result is never returned.

use std::collections::BTreeMap;
use std::net::IpAddr;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hickory_proto::op::Message;
use hickory_proto::rr::rdata::svcb::{SvcParamValue, SVCB};
use hickory_proto::rr::{Name, RData, Record, RecordType};
use hickory_proto::serialize::binary::{BinDecodable, BinDecoder, BinEncodable};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::error::ResolveError;
use crate::target::QueryType;

/// Decoded answer for one query type
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DecodedAnswer {
	Https(HttpsAnswer),
	Addresses(AddressAnswer),
	NameServers(NameServerAnswer),
	Authority(SoaAnswer),
}

/// HTTPS service bindings plus the signatures that rode along with them
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpsAnswer {
	#[serde(rename = "HTTPS", skip_serializing_if = "Vec::is_empty")]
	pub bindings: Vec<ServiceBinding>,
	#[serde(rename = "RRSIG", skip_serializing_if = "Vec::is_empty")]
	pub signatures: Vec<Signature>,
}

impl HttpsAnswer {
	pub fn ipv4_hints(&self) -> Vec<String> {
		self.hints(SvcParamName::Ipv4Hint)
	}

	pub fn ipv6_hints(&self) -> Vec<String> {
		self.hints(SvcParamName::Ipv6Hint)
	}

	fn hints(&self, key: SvcParamName) -> Vec<String> {
		let mut hints = Vec::new();
		for binding in &self.bindings {
			if let Some(SvcValue::Text(text)) = binding.params.get(key) {
				hints.extend(text.split(',').filter(|s| !s.is_empty()).map(String::from));
			}
		}
		hints
	}
}

/// One HTTPS/SVCB record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceBinding {
	pub target: String,
	pub priority: u16,
	#[serde(flatten)]
	pub params: SvcParams,
	pub answer_ttl: u32,
	pub name: String,
}

/// The fixed set of SvcParam keys this decoder understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SvcParamName {
	Mandatory,
	Alpn,
	NoDefaultAlpn,
	Port,
	Ipv4Hint,
	Ech,
	Ipv6Hint,
}

impl SvcParamName {
	/// Map a numeric SvcParam key; keys 0 through 6 are the only known ones.
	pub fn from_code(code: u16) -> Option<Self> {
		match code {
			0 => Some(SvcParamName::Mandatory),
			1 => Some(SvcParamName::Alpn),
			2 => Some(SvcParamName::NoDefaultAlpn),
			3 => Some(SvcParamName::Port),
			4 => Some(SvcParamName::Ipv4Hint),
			5 => Some(SvcParamName::Ech),
			6 => Some(SvcParamName::Ipv6Hint),
			_ => None,
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			SvcParamName::Mandatory => "mandatory",
			SvcParamName::Alpn => "alpn",
			SvcParamName::NoDefaultAlpn => "no-default-alpn",
			SvcParamName::Port => "port",
			SvcParamName::Ipv4Hint => "ipv4hint",
			SvcParamName::Ech => "ech",
			SvcParamName::Ipv6Hint => "ipv6hint",
		}
	}
}

/// Decoded value of a single SvcParam
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SvcValue {
	Keys(Vec<u16>),
	Number(u16),
	Text(String),
	/// Presence-only parameter (no-default-alpn); serialized as null.
	Flag,
}

/// SvcParams ordered by key, serialized as flat `svcb.<key>` fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SvcParams(BTreeMap<SvcParamName, SvcValue>);

impl SvcParams {
	pub fn get(&self, key: SvcParamName) -> Option<&SvcValue> {
		self.0.get(&key)
	}
}

impl Serialize for SvcParams {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let mut map = serializer.serialize_map(Some(self.0.len()))?;
		for (key, value) in &self.0 {
			map.serialize_entry(&format!("svcb.{}", key.as_str()), value)?;
		}
		map.end()
	}
}

/// Flattened RRSIG record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signature {
	pub algorithm: String,
	pub expiration: u32,
	pub inception: u32,
	pub key_tag: u16,
	pub labels: u8,
	pub original_ttl: u32,
	pub rdclass: String,
	pub rdtype: String,
	/// Base64 of the raw signature bytes
	pub signature: String,
	pub signer: String,
	pub type_covered: String,
	pub answer_ttl: u32,
	pub name: String,
}

/// A or AAAA addresses, serialized as `{"A": "ip1,ip2", "name": owner}`.
///
/// Addresses from every owner in the answer are kept in answer order;
/// `name` is the owner of the last address record seen.
#[derive(Debug, Clone, PartialEq)]
pub struct AddressAnswer {
	pub record_type: QueryType,
	pub addresses: Vec<IpAddr>,
	pub name: String,
}

impl AddressAnswer {
	pub fn address_strings(&self) -> Vec<String> {
		self.addresses.iter().map(|a| a.to_string()).collect()
	}
}

impl Serialize for AddressAnswer {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let mut map = serializer.serialize_map(Some(2))?;
		map.serialize_entry(self.record_type.as_str(), &self.address_strings().join(","))?;
		map.serialize_entry("name", &self.name)?;
		map.end()
	}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NameServerAnswer {
	#[serde(rename = "NS")]
	pub nameservers: Vec<String>,
	pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SoaAnswer {
	pub mname: String,
	pub rname: String,
	pub serial: u32,
	pub refresh: i32,
	pub retry: i32,
	pub expire: i32,
	pub minimum: u32,
	pub answer_ttl: u32,
	pub name: String,
}

/// DNAME has no typed variant in hickory-proto and parses as an unknown type.
const DNAME_CODE: u16 = 39;

/// Decode the answer section of `message` for `query_type`.
///
/// Returns `Ok(None)` when nothing relevant is left once CNAMEs are skipped.
/// Any record that is neither the expected type nor CNAME, DNAME or RRSIG
/// fails the whole decode with `UnsupportedRecordKind`.
pub fn decode(message: &Message, query_type: QueryType) -> Result<Option<DecodedAnswer>, ResolveError> {
	let records = relevant_records(message, query_type)?;
	if records.is_empty() {
		return Ok(None);
	}
	match query_type {
		QueryType::Https => decode_https(&records),
		QueryType::A | QueryType::Aaaa => Ok(decode_addresses(&records, query_type)),
		QueryType::Ns => Ok(decode_nameservers(&records)),
		QueryType::Soa => Ok(decode_soa(&records)),
	}
}

/// Filter the answer section down to records worth flattening.
fn relevant_records(message: &Message, query_type: QueryType) -> Result<Vec<&Record>, ResolveError> {
	let expected = query_type.record_type();
	let mut records = Vec::new();
	for record in message.answers() {
		let found = record.record_type();
		let is_expected = found == expected
			|| (query_type == QueryType::Https && found == RecordType::SVCB);
		match found {
			_ if is_expected => records.push(record),
			RecordType::CNAME | RecordType::Unknown(DNAME_CODE) => continue,
			RecordType::RRSIG => {
				// Signatures are only part of the flattened HTTPS output
				if query_type == QueryType::Https {
					records.push(record);
				}
			}
			_ => return Err(ResolveError::UnsupportedRecordKind { found, expected }),
		}
	}
	Ok(records)
}

fn decode_https(records: &[&Record]) -> Result<Option<DecodedAnswer>, ResolveError> {
	let mut bindings = Vec::new();
	let mut signatures = Vec::new();
	for record in records {
		match record.data() {
			RData::HTTPS(https) => bindings.push(decode_binding(record, &https.0)?),
			RData::SVCB(svcb) => bindings.push(decode_binding(record, svcb)?),
			_ if record.record_type() == RecordType::RRSIG => signatures.push(decode_signature(record)?),
			_ => {
				return Err(ResolveError::UnsupportedRecordKind {
					found: record.record_type(),
					expected: RecordType::HTTPS,
				})
			}
		}
	}
	// Signatures without a binding leave nothing to report
	if bindings.is_empty() {
		return Ok(None);
	}
	Ok(Some(DecodedAnswer::Https(HttpsAnswer { bindings, signatures })))
}

fn decode_binding(record: &Record, svcb: &SVCB) -> Result<ServiceBinding, ResolveError> {
	Ok(ServiceBinding {
		target: svcb.target_name().to_string(),
		priority: svcb.svc_priority(),
		params: decode_svc_params(svcb)?,
		answer_ttl: record.ttl(),
		name: record.name().to_string(),
	})
}

fn decode_svc_params(svcb: &SVCB) -> Result<SvcParams, ResolveError> {
	let mut params = BTreeMap::new();
	for (key, value) in svcb.svc_params() {
		let code = u16::from(*key);
		let name = SvcParamName::from_code(code).ok_or(ResolveError::UnsupportedSvcParam(code))?;
		params.insert(name, decode_svc_value(value));
	}
	Ok(SvcParams(params))
}

fn decode_svc_value(value: &SvcParamValue) -> SvcValue {
	match value {
		SvcParamValue::Mandatory(mandatory) => {
			SvcValue::Keys(mandatory.0.iter().map(|key| u16::from(*key)).collect())
		}
		SvcParamValue::Alpn(alpn) => SvcValue::Text(alpn.0.join(",")),
		SvcParamValue::NoDefaultAlpn => SvcValue::Flag,
		SvcParamValue::Port(port) => SvcValue::Number(*port),
		SvcParamValue::Ipv4Hint(hint) => SvcValue::Text(join_display(&hint.0)),
		SvcParamValue::Ipv6Hint(hint) => SvcValue::Text(join_display(&hint.0)),
		// ECH config lists render as quoted base64
		other => SvcValue::Text(other.to_string().trim_matches('"').to_string()),
	}
}

fn join_display<T: std::fmt::Display>(items: &[T]) -> String {
	items.iter().map(|item| item.to_string()).collect::<Vec<_>>().join(",")
}

/// Length of the fixed RRSIG rdata header preceding the signer name (RFC 4034 §3.1)
const RRSIG_FIXED_LEN: usize = 18;

/// Flatten an RRSIG record from its wire-form rdata.
fn decode_signature(record: &Record) -> Result<Signature, ResolveError> {
	let malformed = |reason: String| ResolveError::MalformedRdata {
		record_type: RecordType::RRSIG,
		reason,
	};
	let rdata = record.data().to_bytes().map_err(|e| malformed(e.to_string()))?;
	if rdata.len() < RRSIG_FIXED_LEN {
		return Err(malformed(format!("{} bytes is shorter than the fixed header", rdata.len())));
	}

	let type_covered = u16::from_be_bytes([rdata[0], rdata[1]]);
	let algorithm = rdata[2];
	let labels = rdata[3];
	let original_ttl = u32::from_be_bytes([rdata[4], rdata[5], rdata[6], rdata[7]]);
	let expiration = u32::from_be_bytes([rdata[8], rdata[9], rdata[10], rdata[11]]);
	let inception = u32::from_be_bytes([rdata[12], rdata[13], rdata[14], rdata[15]]);
	let key_tag = u16::from_be_bytes([rdata[16], rdata[17]]);

	let tail = &rdata[RRSIG_FIXED_LEN..];
	let mut decoder = BinDecoder::new(tail);
	let signer = Name::read(&mut decoder).map_err(|e| malformed(format!("signer name: {}", e)))?;
	let signature = &tail[decoder.index()..];

	Ok(Signature {
		algorithm: algorithm_name(algorithm),
		expiration,
		inception,
		key_tag,
		labels,
		original_ttl,
		rdclass: record.dns_class().to_string(),
		rdtype: RecordType::RRSIG.to_string(),
		signature: BASE64.encode(signature),
		signer: signer.to_string(),
		type_covered: RecordType::from(type_covered).to_string(),
		answer_ttl: record.ttl(),
		name: record.name().to_string(),
	})
}

/// Mnemonic for a DNSSEC algorithm number (IANA registry)
fn algorithm_name(algorithm: u8) -> String {
	let name = match algorithm {
		1 => "RSAMD5",
		2 => "DH",
		3 => "DSA",
		5 => "RSASHA1",
		6 => "DSANSEC3SHA1",
		7 => "RSASHA1NSEC3SHA1",
		8 => "RSASHA256",
		10 => "RSASHA512",
		12 => "ECCGOST",
		13 => "ECDSAP256SHA256",
		14 => "ECDSAP384SHA384",
		15 => "ED25519",
		16 => "ED448",
		252 => "INDIRECT",
		253 => "PRIVATEDNS",
		254 => "PRIVATEOID",
		other => return other.to_string(),
	};
	name.to_string()
}

fn decode_addresses(records: &[&Record], query_type: QueryType) -> Option<DecodedAnswer> {
	let mut addresses = Vec::new();
	let mut owner = None;
	for record in records {
		let address = match record.data() {
			RData::A(a) => IpAddr::V4(a.0),
			RData::AAAA(aaaa) => IpAddr::V6(aaaa.0),
			_ => continue,
		};
		addresses.push(address);
		owner = Some(record.name().to_string());
	}
	let name = owner?;
	Some(DecodedAnswer::Addresses(AddressAnswer {
		record_type: query_type,
		addresses,
		name,
	}))
}

fn decode_nameservers(records: &[&Record]) -> Option<DecodedAnswer> {
	let mut nameservers = Vec::new();
	let mut owner = None;
	for record in records {
		if let RData::NS(ns) = record.data() {
			nameservers.push(ns.0.to_string());
			owner = Some(record.name().to_string());
		}
	}
	let name = owner?;
	Some(DecodedAnswer::NameServers(NameServerAnswer { nameservers, name }))
}

fn decode_soa(records: &[&Record]) -> Option<DecodedAnswer> {
	records.iter().find_map(|record| match record.data() {
		RData::SOA(soa) => Some(DecodedAnswer::Authority(SoaAnswer {
			mname: soa.mname().to_string(),
			rname: soa.rname().to_string(),
			serial: soa.serial(),
			refresh: soa.refresh(),
			retry: soa.retry(),
			expire: soa.expire(),
			minimum: soa.minimum(),
			answer_ttl: record.ttl(),
			name: record.name().to_string(),
		})),
		_ => None,
	})
}
