use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use thiserror::Error;

use acqorders_purchasing::Operation;

use crate::context::RequestContext;

/// One request against the storage layer.
///
/// `path` is relative to the context's base URL and may carry a query string
/// (`/po_line?limit=999&query=...`).
#[derive(Debug, Clone, PartialEq)]
pub struct StorageRequest {
    pub operation: Operation,
    pub path: String,
    pub body: Option<JsonValue>,
}

impl StorageRequest {
    pub fn new(operation: Operation, path: impl Into<String>) -> Self {
        Self {
            operation,
            path: path.into(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: Option<JsonValue>) -> Self {
        self.body = body;
        self
    }
}

/// Raw storage answer: status plus decoded body.
///
/// `body` is `None` for an empty body. Bodies that are not JSON come back as
/// [`JsonValue::String`] holding the raw text.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageResponse {
    pub status: u16,
    pub body: Option<JsonValue>,
}

impl StorageResponse {
    pub fn new(status: u16, body: Option<JsonValue>) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The request never produced a status (connection refused, timeout, ...).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("storage transport failure: {0}")]
pub struct TransportError(pub String);

/// Failure of a single sub-object call as seen by the orchestration layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Storage answered with a non-success status.
    #[error("storage responded {status}: {message}")]
    RemoteStatus { status: u16, message: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A success response whose body is not a JSON document.
    #[error("undecodable storage response: {0}")]
    Decode(String),
}

impl GatewayError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            GatewayError::RemoteStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Storage boundary used by the orchestrator.
///
/// Implementations must be safe to call concurrently; one orchestrator issues
/// many requests at once.
#[async_trait]
pub trait StorageTransport: Send + Sync {
    async fn send(
        &self,
        ctx: &RequestContext,
        request: StorageRequest,
    ) -> Result<StorageResponse, TransportError>;
}

#[async_trait]
impl<T> StorageTransport for Arc<T>
where
    T: StorageTransport + ?Sized,
{
    async fn send(
        &self,
        ctx: &RequestContext,
        request: StorageRequest,
    ) -> Result<StorageResponse, TransportError> {
        (**self).send(ctx, request).await
    }
}
