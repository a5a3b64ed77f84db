//! Orchestration layer: storage gateway, line assembly, order fan-out.

pub mod aggregator;
pub mod assembler;
pub mod config;
pub mod context;
pub mod error;
pub mod fanout;
pub mod gateway;

#[cfg(test)]
mod integration_tests;

pub use aggregator::OrderAggregator;
pub use assembler::CompositeLineAssembler;
pub use config::OrchestratorConfig;
pub use context::RequestContext;
pub use error::OrchestrationError;
pub use fanout::join_settled;
pub use gateway::{
    GatewayError, HttpStorageTransport, InMemoryStorage, StorageTransport, SubObjectGateway,
    TransportError,
};
