use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue, json};
use uuid::Uuid;

use acqorders_purchasing::Operation;

use super::r#trait::{StorageRequest, StorageResponse, StorageTransport, TransportError};
use crate::context::RequestContext;

/// A call observed by [`InMemoryStorage`], in execution order.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub operation: Operation,
    pub path: String,
    pub body: Option<JsonValue>,
    pub tenant: Option<String>,
}

#[derive(Debug, Clone)]
enum Fault {
    Status { status: u16, body: Option<JsonValue> },
    Transport(String),
}

/// In-memory storage layer keyed by record path (`/cost/c1`).
///
/// Intended for tests/dev. Understands:
/// - `GET /kind/id`, `PUT /kind/id`, `DELETE /kind/id`;
/// - `POST /kind` (id assigned when the document has none);
/// - `GET /po_line?...&query=purchase_order_id==<id>...` line queries.
///
/// Faults and latency can be injected per operation and path.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    records: RwLock<BTreeMap<String, Map<String, JsonValue>>>,
    faults: RwLock<HashMap<(Operation, String), Fault>>,
    latency: RwLock<Vec<(String, Duration)>>,
    calls: Mutex<Vec<RecordedCall>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `document` at `path`.
    pub fn insert(&self, path: impl Into<String>, document: JsonValue) {
        if let JsonValue::Object(document) = document {
            if let Ok(mut records) = self.records.write() {
                records.insert(path.into(), document);
            }
        }
    }

    pub fn get(&self, path: &str) -> Option<JsonValue> {
        self.records
            .read()
            .ok()
            .and_then(|records| records.get(path).cloned())
            .map(JsonValue::Object)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.records
            .read()
            .map(|records| records.contains_key(path))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Answer `operation` on `path` with `status` and an `errorMessage` body.
    pub fn fail_with(&self, operation: Operation, path: &str, status: u16, message: &str) {
        self.set_fault(
            operation,
            path,
            Fault::Status {
                status,
                body: Some(json!({ "errorMessage": message })),
            },
        );
    }

    /// Answer `operation` on `path` with `status` and an arbitrary body.
    pub fn respond_with(
        &self,
        operation: Operation,
        path: &str,
        status: u16,
        body: Option<JsonValue>,
    ) {
        self.set_fault(operation, path, Fault::Status { status, body });
    }

    /// Make `operation` on `path` fail before any status is produced.
    pub fn fail_transport(&self, operation: Operation, path: &str, reason: &str) {
        self.set_fault(operation, path, Fault::Transport(reason.to_string()));
    }

    pub fn clear_faults(&self) {
        if let Ok(mut faults) = self.faults.write() {
            faults.clear();
        }
    }

    /// Delay every call whose path starts with `prefix`.
    pub fn delay(&self, prefix: impl Into<String>, latency: Duration) {
        if let Ok(mut table) = self.latency.write() {
            table.push((prefix.into(), latency));
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Highest number of calls observed executing at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn set_fault(&self, operation: Operation, path: &str, fault: Fault) {
        if let Ok(mut faults) = self.faults.write() {
            faults.insert((operation, path.to_string()), fault);
        }
    }

    fn latency_for(&self, path: &str) -> Option<Duration> {
        self.latency.read().ok().and_then(|table| {
            table
                .iter()
                .filter(|(prefix, _)| path.starts_with(prefix.as_str()))
                .map(|(_, d)| *d)
                .max()
        })
    }

    fn fault_for(&self, operation: Operation, path: &str) -> Option<Fault> {
        self.faults
            .read()
            .ok()
            .and_then(|faults| faults.get(&(operation, path.to_string())).cloned())
    }

    fn record(&self, ctx: &RequestContext, request: &StorageRequest) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                operation: request.operation,
                path: request.path.clone(),
                body: request.body.clone(),
                tenant: ctx.tenant_id().map(|t| t.to_string()),
            });
        }
    }

    fn execute(&self, request: StorageRequest) -> StorageResponse {
        let (path, query) = match request.path.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (request.path.clone(), None),
        };

        match request.operation {
            Operation::Read => match query.as_deref().and_then(order_filter) {
                Some(order_id) if !path.trim_start_matches('/').contains('/') => {
                    self.query(&path, &order_id)
                }
                _ => match self.get(&path) {
                    Some(document) => StorageResponse::new(200, Some(document)),
                    None => not_found(&path),
                },
            },
            Operation::Delete => {
                let removed = self
                    .records
                    .write()
                    .ok()
                    .and_then(|mut records| records.remove(&path));
                match removed {
                    Some(_) => StorageResponse::new(204, None),
                    None => not_found(&path),
                }
            }
            Operation::Update => {
                let Some(JsonValue::Object(document)) = request.body else {
                    return bad_request("update requires a JSON object body");
                };
                let mut records = match self.records.write() {
                    Ok(records) => records,
                    Err(_) => return StorageResponse::new(500, None),
                };
                match records.get_mut(&path) {
                    Some(existing) => {
                        *existing = document;
                        StorageResponse::new(204, None)
                    }
                    None => not_found(&path),
                }
            }
            Operation::Create => {
                let Some(JsonValue::Object(mut document)) = request.body else {
                    return bad_request("create requires a JSON object body");
                };
                let id = match document.get("id").and_then(JsonValue::as_str) {
                    Some(id) => id.to_string(),
                    None => {
                        let id = Uuid::now_v7().to_string();
                        document.insert("id".into(), JsonValue::String(id.clone()));
                        id
                    }
                };
                let record_path = format!("{}/{id}", path.trim_end_matches('/'));
                if self.contains(&record_path) {
                    return StorageResponse::new(
                        422,
                        Some(json!({ "errors": [{ "message": format!("id {id} already exists") }] })),
                    );
                }
                self.insert(record_path, JsonValue::Object(document.clone()));
                StorageResponse::new(201, Some(JsonValue::Object(document)))
            }
        }
    }

    fn query(&self, collection: &str, order_id: &str) -> StorageResponse {
        let prefix = format!("{collection}/");
        let lines: Vec<JsonValue> = self
            .records
            .read()
            .map(|records| {
                records
                    .iter()
                    .filter(|(path, _)| path.starts_with(&prefix))
                    .filter(|(_, doc)| {
                        doc.get("purchase_order_id").and_then(JsonValue::as_str) == Some(order_id)
                    })
                    .map(|(_, doc)| JsonValue::Object(doc.clone()))
                    .collect()
            })
            .unwrap_or_default();

        let total = lines.len();
        StorageResponse::new(
            200,
            Some(json!({ "po_lines": lines, "total_records": total })),
        )
    }
}

/// `purchase_order_id==<id>` inside the `query` parameter.
fn order_filter(query: &str) -> Option<String> {
    query
        .split('&')
        .filter_map(|pair| pair.strip_prefix("query="))
        .find_map(|expr| expr.strip_prefix("purchase_order_id=="))
        .map(str::to_string)
}

fn not_found(path: &str) -> StorageResponse {
    StorageResponse::new(404, Some(JsonValue::String(format!("{path} not found"))))
}

fn bad_request(message: &str) -> StorageResponse {
    StorageResponse::new(400, Some(json!({ "errorMessage": message })))
}

#[async_trait]
impl StorageTransport for InMemoryStorage {
    async fn send(
        &self,
        ctx: &RequestContext,
        request: StorageRequest,
    ) -> Result<StorageResponse, TransportError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(latency) = self.latency_for(&request.path) {
            tokio::time::sleep(latency).await;
        }

        self.record(ctx, &request);
        let outcome = match self.fault_for(request.operation, &request.path) {
            Some(Fault::Transport(reason)) => Err(TransportError(reason)),
            Some(Fault::Status { status, body }) => Ok(StorageResponse::new(status, body)),
            None => Ok(self.execute(request)),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}
