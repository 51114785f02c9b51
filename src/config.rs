use std::sync::Arc;

use crate::batch::{BatchMode, BatchRunner};
use crate::chain::ChainResolver;
use crate::error::ResolveError;
use crate::gate::ConcurrencyGate;
use crate::resolver::default_resolvers;
use crate::supervisor::QuerySupervisor;
use crate::target::MAX_CHAIN;
use crate::transport::{QueryOptions, ResolverConfig, SharedTransport, StubTransport};

/// Default number of targets resolved at once
pub const DEFAULT_CONCURRENCY: usize = 40;

/// Everything needed to assemble a resolution engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
	pub resolvers: Vec<ResolverConfig>,
	pub options: QueryOptions,
	pub concurrency: usize,
	pub max_chain: u32,
	pub mode: BatchMode,
}

impl Default for EngineConfig {
	fn default() -> Self {
		EngineConfig {
			resolvers: default_resolvers(),
			options: QueryOptions::default(),
			concurrency: DEFAULT_CONCURRENCY,
			max_chain: MAX_CHAIN,
			mode: BatchMode::Https,
		}
	}
}

impl EngineConfig {
	/// Build a runner that queries the configured resolvers.
	pub fn build_runner(&self) -> Result<BatchRunner, ResolveError> {
		let transport = StubTransport::new(self.resolvers.clone(), self.options.clone())?;
		Ok(self.build_runner_with(Arc::new(transport)))
	}

	/// Build a runner on top of an arbitrary transport.
	pub fn build_runner_with(&self, transport: SharedTransport) -> BatchRunner {
		let resolver = ChainResolver::with_max_chain(transport, self.max_chain);
		BatchRunner::new(
			Arc::new(QuerySupervisor::new(resolver)),
			ConcurrencyGate::new(self.concurrency),
			self.mode,
		)
	}
}
