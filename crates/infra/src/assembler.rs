//! Composite line assembly.
//!
//! Takes one stored line, detaches its sub-object references, runs one
//! storage call per reference concurrently and writes the results back into
//! the line. Deleting a line reuses the same fan-out and removes the line
//! record only once every sub-object delete has settled successfully.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value as JsonValue};
use tracing::{Level, debug, enabled, error, info, warn};

use acqorders_core::{DomainError, DomainResult};
use acqorders_purchasing::{
    CompositeLine, LineStub, Operation, ResolutionWarning, SubObjectCall, SubObjectKind,
    SubObjectRef,
};

use crate::context::RequestContext;
use crate::error::OrchestrationError;
use crate::fanout::join_settled;
use crate::gateway::{StorageTransport, SubObjectGateway};

/// One sub-object call plus the id it was issued for.
struct PendingCall {
    sub_object_id: Option<String>,
    call: SubObjectCall,
}

/// Resolves and deletes single lines through a [`SubObjectGateway`].
#[derive(Debug)]
pub struct CompositeLineAssembler<T> {
    gateway: Arc<SubObjectGateway<T>>,
}

impl<T> Clone for CompositeLineAssembler<T> {
    fn clone(&self) -> Self {
        Self {
            gateway: self.gateway.clone(),
        }
    }
}

impl<T: StorageTransport> CompositeLineAssembler<T> {
    pub fn new(gateway: Arc<SubObjectGateway<T>>) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &SubObjectGateway<T> {
        &self.gateway
    }

    /// Apply `operation` to every sub-object referenced by `stub`.
    ///
    /// Single-valued results are written back when non-empty. Multi-valued
    /// kinds present on the stub are always written back as an array of their
    /// non-empty results. An empty result on anything but delete is recorded
    /// as a [`ResolutionWarning`]. Malformed references fail before any call
    /// is issued.
    pub async fn resolve(
        &self,
        ctx: &RequestContext,
        operation: Operation,
        stub: LineStub,
    ) -> Result<CompositeLine, OrchestrationError> {
        let mut line = stub;
        let line_id = line.id().map(str::to_string);
        let scope = format!("line {}", line_id.as_deref().unwrap_or("<unsaved>"));

        if enabled!(Level::DEBUG) {
            debug!(
                request_id = %ctx.request_id(),
                line_id = ?line_id,
                %operation,
                line = %JsonValue::Object(line.fields().clone()),
                "line before sub-object fan-out"
            );
        }

        let detached = line.detach_references()?;
        let single = detached
            .single
            .into_iter()
            .map(|(kind, reference)| pending_call(kind, &reference, operation))
            .collect::<DomainResult<Vec<_>>>()?;
        let multi = detached
            .multi
            .into_iter()
            .map(|(kind, references)| {
                let calls = references
                    .iter()
                    .map(|reference| pending_call(kind, reference, operation))
                    .collect::<DomainResult<Vec<_>>>()?;
                Ok::<_, DomainError>((kind, calls))
            })
            .collect::<DomainResult<Vec<_>>>()?;

        let all_calls: Vec<&PendingCall> = single
            .iter()
            .chain(multi.iter().flat_map(|(_, calls)| calls.iter()))
            .collect();

        let documents = join_settled(all_calls.iter().map(|pending| {
            self.gateway.perform(
                ctx,
                pending.call.operation,
                &pending.call.path,
                pending.call.body.clone(),
            )
        }))
        .await
        .map_err(|err| {
            error!(
                request_id = %ctx.request_id(),
                line_id = ?line_id,
                %operation,
                error = %err,
                "failed resolving one or more sub-objects of line"
            );
            OrchestrationError::aggregation(scope.clone(), err)
        })?;

        let mut warnings = Vec::new();
        let mut documents = documents.into_iter();

        for pending in &single {
            let Some(document) = documents.next() else { break };
            match non_empty(document) {
                Some(document) => line.insert(pending.call.kind, document),
                None => note_empty(&mut warnings, pending, line_id.as_deref(), operation),
            }
        }

        let mut lists: BTreeMap<SubObjectKind, Vec<JsonValue>> = BTreeMap::new();
        for (kind, calls) in &multi {
            let list = lists.entry(*kind).or_default();
            for pending in calls {
                let Some(document) = documents.next() else { break };
                match non_empty(document) {
                    Some(document) => list.push(document),
                    None => note_empty(&mut warnings, pending, line_id.as_deref(), operation),
                }
            }
        }
        for (kind, list) in lists {
            line.insert(kind, JsonValue::Array(list));
        }

        if enabled!(Level::DEBUG) {
            debug!(
                request_id = %ctx.request_id(),
                line_id = ?line_id,
                %operation,
                line = %JsonValue::Object(line.fields().clone()),
                "line after sub-object fan-out"
            );
        }

        Ok(CompositeLine::new(line.into_fields(), warnings))
    }

    /// Delete every sub-object of `stub`, then the line record itself.
    ///
    /// The line record is only touched after all sub-object deletes
    /// succeeded; if any of them fails the line stays in storage. Returns the
    /// dereferenced line as it was before deletion.
    pub async fn delete_line(
        &self,
        ctx: &RequestContext,
        stub: LineStub,
    ) -> Result<CompositeLine, OrchestrationError> {
        let line_id = stub.line_id()?;
        let dereferenced = self.resolve(ctx, Operation::Delete, stub).await?;

        self.gateway
            .perform(
                ctx,
                Operation::Delete,
                &SubObjectKind::PoLines.record_path(line_id.as_str()),
                None,
            )
            .await
            .map_err(|err| OrchestrationError::aggregation(format!("line {line_id}"), err))?;

        info!(request_id = %ctx.request_id(), line_id = %line_id, "deleted line and its sub-objects");
        Ok(dereferenced)
    }
}

fn pending_call(
    kind: SubObjectKind,
    reference: &SubObjectRef,
    operation: Operation,
) -> DomainResult<PendingCall> {
    Ok(PendingCall {
        sub_object_id: reference.id().map(str::to_string),
        call: reference.to_call(kind, operation)?,
    })
}

fn non_empty(document: Map<String, JsonValue>) -> Option<JsonValue> {
    (!document.is_empty()).then_some(JsonValue::Object(document))
}

fn note_empty(
    warnings: &mut Vec<ResolutionWarning>,
    pending: &PendingCall,
    line_id: Option<&str>,
    operation: Operation,
) {
    if operation.is_delete() {
        return;
    }
    let warning = ResolutionWarning {
        kind: pending.call.kind,
        sub_object_id: pending.sub_object_id.clone(),
        line_id: line_id.map(str::to_string),
        operation,
    };
    warn!(
        kind = %warning.kind,
        sub_object_id = ?warning.sub_object_id,
        line_id = ?warning.line_id,
        %operation,
        "{warning}"
    );
    warnings.push(warning);
}
