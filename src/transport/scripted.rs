//! In-memory transport with canned answers, plus record builders for tests.

use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use hickory_proto::op::{Message, MessageType, Query, ResponseCode};
use hickory_proto::rr::rdata::svcb::{SvcParamKey, SvcParamValue, SVCB};
use hickory_proto::rr::rdata::{A, AAAA, CNAME, HTTPS, NS, NULL, SOA};
use hickory_proto::rr::{Name, RData, Record, RecordType};

use super::Transport;
use crate::error::{ErrorKind, ResolveError};

type Reply = Result<Message, ErrorKind>;
type Fallback = Box<dyn Fn(&Name, RecordType) -> Reply + Send + Sync>;

/// Transport that answers from a script keyed by (name, record type).
///
/// Unscripted questions get an empty NOERROR response unless a fallback is set.
#[derive(Default)]
pub struct ScriptedTransport {
	script: HashMap<(String, RecordType), Reply>,
	fallback: Option<Fallback>,
	delay: Option<Duration>,
	calls: AtomicUsize,
	log: Mutex<Vec<(String, RecordType)>>,
}

fn key(name: &str, record_type: RecordType) -> (String, RecordType) {
	(fqdn(name).to_lowercase().to_string(), record_type)
}

impl ScriptedTransport {
	pub fn new() -> Self {
		Self::default()
	}

	/// Answer `name`/`record_type` with the given answer records.
	pub fn answer(mut self, name: &str, record_type: RecordType, records: Vec<Record>) -> Self {
		self.script
			.insert(key(name, record_type), Ok(response(name, record_type, records)));
		self
	}

	/// Answer with a prebuilt message.
	pub fn message(mut self, name: &str, record_type: RecordType, message: Message) -> Self {
		self.script.insert(key(name, record_type), Ok(message));
		self
	}

	pub fn fail(mut self, name: &str, record_type: RecordType, kind: ErrorKind) -> Self {
		self.script.insert(key(name, record_type), Err(kind));
		self
	}

	pub fn fallback<F>(mut self, fallback: F) -> Self
	where
		F: Fn(&Name, RecordType) -> Reply + Send + Sync + 'static,
	{
		self.fallback = Some(Box::new(fallback));
		self
	}

	pub fn delay(mut self, delay: Duration) -> Self {
		self.delay = Some(delay);
		self
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	pub fn log(&self) -> Vec<(String, RecordType)> {
		self.log.lock().unwrap().clone()
	}
}

#[async_trait]
impl Transport for ScriptedTransport {
	async fn query(&self, name: &Name, record_type: RecordType) -> Result<Message, ResolveError> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		let lookup = (name.to_lowercase().to_string(), record_type);
		self.log.lock().unwrap().push(lookup.clone());
		if let Some(delay) = self.delay {
			tokio::time::sleep(delay).await;
		}

		let reply = match self.script.get(&lookup) {
			Some(reply) => reply.clone(),
			None => match &self.fallback {
				Some(fallback) => fallback(name, record_type),
				None => Ok(response(&lookup.0, record_type, Vec::new())),
			},
		};
		reply.map_err(|kind| ResolveError::from_kind(kind, &lookup.0))
	}
}

pub fn fqdn(name: &str) -> Name {
	let mut name = Name::from_ascii(name).unwrap();
	name.set_fqdn(true);
	name
}

/// NOERROR response to `name`/`record_type` carrying `answers`.
pub fn response(name: &str, record_type: RecordType, answers: Vec<Record>) -> Message {
	let mut message = Message::new();
	message.set_message_type(MessageType::Response);
	message.set_response_code(ResponseCode::NoError);
	message.add_query(Query::query(fqdn(name), record_type));
	for record in answers {
		message.add_answer(record);
	}
	message
}

/// Empty NOERROR response whose authority section carries `authority`.
pub fn referral(name: &str, record_type: RecordType, authority: Vec<Record>) -> Message {
	let mut message = response(name, record_type, Vec::new());
	for record in authority {
		message.add_name_server(record);
	}
	message
}

pub fn cname_record(owner: &str, target: &str) -> Record {
	Record::from_rdata(fqdn(owner), 300, RData::CNAME(CNAME(fqdn(target))))
}

pub fn https_record(owner: &str, priority: u16, target: &str, params: Vec<(SvcParamKey, SvcParamValue)>) -> Record {
	Record::from_rdata(
		fqdn(owner),
		300,
		RData::HTTPS(HTTPS(SVCB::new(priority, fqdn(target), params))),
	)
}

pub fn a_record(owner: &str, octets: [u8; 4]) -> Record {
	Record::from_rdata(fqdn(owner), 300, RData::A(A::from(Ipv4Addr::from(octets))))
}

pub fn aaaa_record(owner: &str, address: &str) -> Record {
	let address = Ipv6Addr::from_str(address).unwrap();
	Record::from_rdata(fqdn(owner), 300, RData::AAAA(AAAA::from(address)))
}

pub fn ns_record(owner: &str, target: &str) -> Record {
	Record::from_rdata(fqdn(owner), 300, RData::NS(NS(fqdn(target))))
}

pub fn soa_record(owner: &str) -> Record {
	let mname = fqdn(&format!("ns.{}", owner.trim_end_matches('.')));
	let rname = fqdn(&format!("hostmaster.{}", owner.trim_end_matches('.')));
	Record::from_rdata(
		fqdn(owner),
		3600,
		RData::SOA(SOA::new(mname, rname, 2024010101, 7200, 3600, 1209600, 300)),
	)
}

/// DNAME redirecting the subtree under `owner` to `target`.
pub fn dname_record(owner: &str, target: &str) -> Record {
	let mut rdata = Vec::new();
	for label in target.trim_end_matches('.').split('.') {
		rdata.push(label.len() as u8);
		rdata.extend_from_slice(label.as_bytes());
	}
	rdata.push(0);
	Record::from_rdata(
		fqdn(owner),
		300,
		RData::Unknown {
			code: RecordType::Unknown(39),
			rdata: NULL::with(rdata),
		},
	)
}

/// RRSIG over HTTPS signed by example.com. with signature bytes 1, 2, 3, 4.
pub fn rrsig_record(owner: &str) -> Record {
	let mut rdata = vec![
		0, 65, // type covered: HTTPS
		13, // algorithm: ECDSAP256SHA256
		2,  // labels
		0, 0, 1, 44, // original ttl: 300
		0, 0, 0, 200, // expiration
		0, 0, 0, 100, // inception
		0x12, 0x34, // key tag
	];
	rdata.extend_from_slice(b"\x07example\x03com\x00");
	rdata.extend_from_slice(&[1, 2, 3, 4]);
	Record::from_rdata(
		fqdn(owner),
		300,
		RData::Unknown {
			code: RecordType::RRSIG,
			rdata: NULL::with(rdata),
		},
	)
}
