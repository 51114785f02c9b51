//! Bounded-concurrency HTTPS/SVCB record scanning.
//!
//! A [`BatchRunner`] pushes many [`TargetState`]s through a
//! [`ConcurrencyGate`]. Each target is resolved by a [`QuerySupervisor`],
//! which follows CNAME chains through a [`ChainResolver`] and flattens the
//! answers with [`decode::decode`].

pub mod batch;
pub mod chain;
pub mod config;
pub mod decode;
pub mod dns;
pub mod domains;
pub mod error;
pub mod gate;
pub mod resolver;
pub mod stats;
pub mod supervisor;
pub mod target;
pub mod transport;

pub use batch::{BatchMode, BatchReport, BatchRunner};
pub use chain::ChainResolver;
pub use config::EngineConfig;
pub use decode::DecodedAnswer;
pub use error::{ErrorKind, ResolveError};
pub use gate::{ConcurrencyGate, GatePermit};
pub use supervisor::QuerySupervisor;
pub use target::{ErrorSlot, QueryType, TargetState};
pub use transport::{Endpoint, QueryOptions, ResolverConfig, StubTransport, Transport};
