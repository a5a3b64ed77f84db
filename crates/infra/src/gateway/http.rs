use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, Method};
use serde_json::Value as JsonValue;
use tracing::debug;

use acqorders_purchasing::Operation;

use super::r#trait::{StorageRequest, StorageResponse, StorageTransport, TransportError};
use crate::config::OrchestratorConfig;
use crate::context::RequestContext;

/// HTTP transport to the storage layer.
///
/// Each request goes to `ctx.base_url() + request.path` with every context
/// header attached.
#[derive(Debug, Clone)]
pub struct HttpStorageTransport {
    client: Client,
}

impl HttpStorageTransport {
    pub fn new(config: &OrchestratorConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TransportError(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Reuse an existing client (connection pool, TLS setup).
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

fn method_of(operation: Operation) -> Method {
    match operation {
        Operation::Read => Method::GET,
        Operation::Create => Method::POST,
        Operation::Update => Method::PUT,
        Operation::Delete => Method::DELETE,
    }
}

fn decode_body(text: String) -> Option<JsonValue> {
    if text.trim().is_empty() {
        return None;
    }
    Some(serde_json::from_str(&text).unwrap_or(JsonValue::String(text)))
}

#[async_trait]
impl StorageTransport for HttpStorageTransport {
    async fn send(
        &self,
        ctx: &RequestContext,
        request: StorageRequest,
    ) -> Result<StorageResponse, TransportError> {
        let url = format!("{}{}", ctx.base_url().trim_end_matches('/'), request.path);

        let mut builder = self
            .client
            .request(method_of(request.operation), &url)
            .header(ACCEPT, "application/json, text/plain");
        for (name, value) in ctx.headers() {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError(format!("{} {url}: {e}", request.operation)))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| TransportError(format!("reading body of {url}: {e}")))?;

        debug!(url = %url, status, "storage responded");
        Ok(StorageResponse::new(status, decode_body(text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn operations_map_to_http_methods() {
        assert_eq!(method_of(Operation::Read), Method::GET);
        assert_eq!(method_of(Operation::Create), Method::POST);
        assert_eq!(method_of(Operation::Update), Method::PUT);
        assert_eq!(method_of(Operation::Delete), Method::DELETE);
    }

    #[test]
    fn bodies_decode_as_json_or_raw_text() {
        assert_eq!(decode_body(String::new()), None);
        assert_eq!(decode_body("  \n".into()), None);
        assert_eq!(decode_body(r#"{"id":"c1"}"#.into()), Some(json!({ "id": "c1" })));
        assert_eq!(
            decode_body("Tenant not found".into()),
            Some(JsonValue::String("Tenant not found".into()))
        );
    }
}
