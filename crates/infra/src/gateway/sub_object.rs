use std::sync::Arc;

use serde_json::{Map, Value as JsonValue};
use tokio::sync::Semaphore;
use tracing::{Level, debug, enabled, error, info, warn};

use acqorders_purchasing::Operation;

use super::r#trait::{
    GatewayError, StorageRequest, StorageResponse, StorageTransport, TransportError,
};
use crate::context::RequestContext;

/// Uniform access to sub-object endpoints.
///
/// Two read modes exist:
/// - [`perform`](Self::perform) tolerates a missing record (404) and an empty
///   body, both yielding an empty document. Used for sub-object calls.
/// - [`fetch`](Self::fetch) treats 404 as an error. Used for the order, line
///   and line-query reads.
///
/// When a limit is configured every call waits for a permit from a shared
/// semaphore before it reaches the transport.
#[derive(Debug)]
pub struct SubObjectGateway<T> {
    transport: T,
    limiter: Option<Arc<Semaphore>>,
}

impl<T> SubObjectGateway<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            limiter: None,
        }
    }

    /// Bound the number of calls in flight; `None` or 0 leaves it unbounded.
    pub fn with_max_in_flight(self, max_in_flight: Option<usize>) -> Self {
        match max_in_flight.filter(|max| *max > 0) {
            Some(max) => self.with_limiter(Arc::new(Semaphore::new(max))),
            None => Self {
                limiter: None,
                ..self
            },
        }
    }

    /// Share an admission limiter with other gateways.
    pub fn with_limiter(mut self, limiter: Arc<Semaphore>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Free permits, or `None` when unbounded.
    pub fn available_permits(&self) -> Option<usize> {
        self.limiter.as_ref().map(|l| l.available_permits())
    }
}

impl<T: StorageTransport> SubObjectGateway<T> {
    /// Execute `operation` against `path`, tolerating missing records.
    ///
    /// A 404 or an empty success body produces an empty document. Any other
    /// non-2xx status fails with [`GatewayError::RemoteStatus`].
    pub async fn perform(
        &self,
        ctx: &RequestContext,
        operation: Operation,
        path: &str,
        body: Option<JsonValue>,
    ) -> Result<Map<String, JsonValue>, GatewayError> {
        let response = self
            .send(ctx, StorageRequest::new(operation, path).with_body(body))
            .await?;

        if response.status == 404 {
            debug!(
                request_id = %ctx.request_id(),
                method = %operation,
                path,
                "sub-object not found, treating as empty"
            );
            return Ok(Map::new());
        }

        into_document(ctx, operation, path, response)
    }

    /// Read `path`; a 404 is an error.
    pub async fn fetch(
        &self,
        ctx: &RequestContext,
        path: &str,
    ) -> Result<Map<String, JsonValue>, GatewayError> {
        let response = self
            .send(ctx, StorageRequest::new(Operation::Read, path))
            .await?;
        into_document(ctx, Operation::Read, path, response)
    }

    async fn send(
        &self,
        ctx: &RequestContext,
        request: StorageRequest,
    ) -> Result<StorageResponse, GatewayError> {
        let _permit = match &self.limiter {
            Some(limiter) => Some(
                limiter
                    .acquire()
                    .await
                    .map_err(|_| TransportError("storage admission limiter closed".into()))?,
            ),
            None => None,
        };

        let operation = request.operation;
        let path = request.path.clone();
        info!(request_id = %ctx.request_id(), method = %operation, path = %path, "calling storage");

        self.transport.send(ctx, request).await.map_err(|err| {
            error!(
                request_id = %ctx.request_id(),
                method = %operation,
                path = %path,
                error = %err,
                "storage call failed without a response"
            );
            GatewayError::from(err)
        })
    }
}

fn into_document(
    ctx: &RequestContext,
    operation: Operation,
    path: &str,
    response: StorageResponse,
) -> Result<Map<String, JsonValue>, GatewayError> {
    if !response.is_success() {
        let message = error_message(response.status, response.body.as_ref());
        error!(
            request_id = %ctx.request_id(),
            method = %operation,
            path,
            status = response.status,
            message = %message,
            "storage call rejected"
        );
        return Err(GatewayError::RemoteStatus {
            status: response.status,
            message,
        });
    }

    match response.body {
        None => {
            warn!(
                request_id = %ctx.request_id(),
                method = %operation,
                path,
                status = response.status,
                "storage returned an empty body"
            );
            Ok(Map::new())
        }
        Some(JsonValue::Object(document)) => {
            if enabled!(Level::DEBUG) {
                debug!(
                    request_id = %ctx.request_id(),
                    method = %operation,
                    path,
                    body = %JsonValue::Object(document.clone()),
                    "storage returned a document"
                );
            }
            Ok(document)
        }
        Some(other) => Err(GatewayError::Decode(format!(
            "{operation} {path} returned a non-object body: {other}"
        ))),
    }
}

/// Best human-readable message of an error response.
///
/// Looks at `errorMessage`, `message` and `errors[0].message` in that order,
/// then falls back to the raw body and finally to the status reason phrase.
pub fn error_message(status: u16, body: Option<&JsonValue>) -> String {
    match body {
        Some(JsonValue::Object(document)) => document
            .get("errorMessage")
            .and_then(JsonValue::as_str)
            .or_else(|| document.get("message").and_then(JsonValue::as_str))
            .or_else(|| {
                document
                    .get("errors")
                    .and_then(|errors| errors.get(0))
                    .and_then(|first| first.get("message"))
                    .and_then(JsonValue::as_str)
            })
            .map(str::to_string)
            .unwrap_or_else(|| JsonValue::Object(document.clone()).to_string()),
        Some(JsonValue::String(text)) if !text.trim().is_empty() => text.clone(),
        Some(JsonValue::Null) | Some(JsonValue::String(_)) | None => reason_phrase(status),
        Some(other) => other.to_string(),
    }
}

fn reason_phrase(status: u16) -> String {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or("Unknown Status")
        .to_string()
}
