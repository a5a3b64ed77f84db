//! `acqorders-core`: foundation building blocks shared by the purchasing
//! domain and the orchestration layer.
//!
//! This crate contains **pure** primitives (no IO, no async runtime).

pub mod error;
pub mod id;
pub mod value_object;

pub use error::{DomainError, DomainResult};
pub use id::{LineId, OrderId, TenantId};
pub use value_object::ValueObject;
