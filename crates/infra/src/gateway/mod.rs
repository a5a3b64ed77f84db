//! Storage boundary for sub-object calls.
//!
//! [`StorageTransport`] is the seam to the storage layer (HTTP in production,
//! [`InMemoryStorage`] in tests). [`SubObjectGateway`] sits on top of it and
//! turns raw responses into documents or typed errors.

pub mod http;
pub mod in_memory;
pub mod sub_object;
pub mod r#trait;

pub use http::HttpStorageTransport;
pub use in_memory::{InMemoryStorage, RecordedCall};
pub use sub_object::{SubObjectGateway, error_message};
pub use r#trait::{GatewayError, StorageRequest, StorageResponse, StorageTransport, TransportError};
