//! Order-level fan-out over lines.

use std::sync::Arc;

use serde_json::{Map, Value as JsonValue};
use tracing::{error, info};

use acqorders_core::{DomainError, DomainResult, LineId, OrderId};
use acqorders_purchasing::{
    Adjustment, CompositeLine, LineCollection, LineStub, Operation, SubObjectKind,
    combine_adjustments,
};

use crate::assembler::CompositeLineAssembler;
use crate::config::OrchestratorConfig;
use crate::context::RequestContext;
use crate::error::OrchestrationError;
use crate::fanout::join_settled;
use crate::gateway::{StorageTransport, SubObjectGateway};

const PURCHASE_ORDER_ENDPOINT: &str = "/purchase_order/";

/// Entry point of the orchestration layer.
///
/// Reads an order's lines and runs the per-line workflow of
/// [`CompositeLineAssembler`] for all of them concurrently. Every operation
/// either returns a complete result or the first failure observed; a partial
/// list is never produced.
#[derive(Debug)]
pub struct OrderAggregator<T> {
    gateway: Arc<SubObjectGateway<T>>,
    assembler: CompositeLineAssembler<T>,
    config: OrchestratorConfig,
}

impl<T: StorageTransport> OrderAggregator<T> {
    pub fn new(transport: T, config: OrchestratorConfig) -> Self {
        let gateway =
            Arc::new(SubObjectGateway::new(transport).with_max_in_flight(config.max_in_flight));
        Self::with_gateway(gateway, config)
    }

    pub fn with_gateway(gateway: Arc<SubObjectGateway<T>>, config: OrchestratorConfig) -> Self {
        Self {
            assembler: CompositeLineAssembler::new(gateway.clone()),
            gateway,
            config,
        }
    }

    pub fn assembler(&self) -> &CompositeLineAssembler<T> {
        &self.assembler
    }

    pub fn gateway(&self) -> &SubObjectGateway<T> {
        &self.gateway
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    fn lang<'a>(&'a self, ctx: &'a RequestContext) -> &'a str {
        ctx.lang().unwrap_or(&self.config.default_lang)
    }

    fn lines_query(&self, ctx: &RequestContext, order_id: &OrderId) -> String {
        format!(
            "{}?limit={}&query=purchase_order_id=={}&lang={}",
            SubObjectKind::PoLines.collection_path(),
            self.config.line_query_limit,
            order_id,
            self.lang(ctx)
        )
    }

    /// The order record itself (strict read).
    pub async fn get_purchase_order(
        &self,
        ctx: &RequestContext,
        order_id: &OrderId,
    ) -> Result<Map<String, JsonValue>, OrchestrationError> {
        let path = format!("{PURCHASE_ORDER_ENDPOINT}{order_id}?lang={}", self.lang(ctx));
        Ok(self.gateway.fetch(ctx, &path).await?)
    }

    /// The order's line records as stored (strict read).
    pub async fn get_line_stubs(
        &self,
        ctx: &RequestContext,
        order_id: &OrderId,
    ) -> Result<LineCollection, OrchestrationError> {
        let document = self
            .gateway
            .fetch(ctx, &self.lines_query(ctx, order_id))
            .await?;
        let collection: LineCollection = serde_json::from_value(JsonValue::Object(document))
            .map_err(|e| DomainError::validation(format!("malformed line collection: {e}")))?;
        Ok(collection)
    }

    /// One line record as stored (strict read).
    pub async fn get_line_by_id(
        &self,
        ctx: &RequestContext,
        line_id: &LineId,
    ) -> Result<LineStub, OrchestrationError> {
        let path = format!(
            "{}?lang={}",
            SubObjectKind::PoLines.record_path(line_id.as_str()),
            self.lang(ctx)
        );
        let document = self.gateway.fetch(ctx, &path).await?;
        Ok(LineStub::new(document))
    }

    /// One line with its sub-objects resolved.
    pub async fn get_composite_line_by_id(
        &self,
        ctx: &RequestContext,
        line_id: &LineId,
    ) -> Result<CompositeLine, OrchestrationError> {
        let stub = self.get_line_by_id(ctx, line_id).await?;
        self.resolve_line(ctx, Operation::Read, stub).await
    }

    /// Apply `operation` to the sub-objects of a single line.
    pub async fn resolve_line(
        &self,
        ctx: &RequestContext,
        operation: Operation,
        stub: LineStub,
    ) -> Result<CompositeLine, OrchestrationError> {
        self.assembler.resolve(ctx, operation, stub).await
    }

    /// All lines of an order, resolved, in the order storage returned them.
    pub async fn get_composite_lines(
        &self,
        ctx: &RequestContext,
        order_id: &OrderId,
    ) -> Result<Vec<CompositeLine>, OrchestrationError> {
        let scope = format!("order {order_id}");
        let stubs = self
            .get_line_stubs(ctx, order_id)
            .await
            .and_then(|collection| collection.into_stubs().map_err(OrchestrationError::from))
            .map_err(|err| self.order_failure(ctx, order_id, "reading lines", err))?;

        let lines = join_settled(
            stubs
                .into_iter()
                .map(|stub| self.assembler.resolve(ctx, Operation::Read, stub)),
        )
        .await
        .map_err(|err| {
            let err = OrchestrationError::aggregation(scope, err);
            self.order_failure(ctx, order_id, "resolving lines", err)
        })?;

        info!(
            request_id = %ctx.request_id(),
            order_id = %order_id,
            lines = lines.len(),
            "resolved order lines"
        );
        Ok(lines)
    }

    /// Delete one line with all of its sub-objects.
    pub async fn delete_line(
        &self,
        ctx: &RequestContext,
        stub: LineStub,
    ) -> Result<CompositeLine, OrchestrationError> {
        self.assembler.delete_line(ctx, stub).await
    }

    /// Delete every line of an order, each with its sub-objects.
    ///
    /// Not atomic across lines: on failure some lines may already be gone.
    /// Running it again finishes the job, and on an order without lines it
    /// does nothing.
    pub async fn delete_lines(
        &self,
        ctx: &RequestContext,
        order_id: &OrderId,
    ) -> Result<(), OrchestrationError> {
        let scope = format!("order {order_id}");
        let stubs = self
            .get_line_stubs(ctx, order_id)
            .await
            .and_then(|collection| collection.into_stubs().map_err(OrchestrationError::from))
            .map_err(|err| self.order_failure(ctx, order_id, "reading lines", err))?;

        let deleted = join_settled(
            stubs
                .into_iter()
                .map(|stub| self.assembler.delete_line(ctx, stub)),
        )
        .await
        .map_err(|err| {
            let err = OrchestrationError::aggregation(scope, err);
            self.order_failure(ctx, order_id, "deleting lines", err)
        })?;

        info!(
            request_id = %ctx.request_id(),
            order_id = %order_id,
            lines = deleted.len(),
            "deleted order lines"
        );
        Ok(())
    }

    /// Total adjustment across the order's lines, `None` if no line has one.
    /// A malformed adjustment on any line fails the whole call.
    pub async fn order_adjustment(
        &self,
        ctx: &RequestContext,
        order_id: &OrderId,
    ) -> Result<Option<Adjustment>, OrchestrationError> {
        let lines = self.get_composite_lines(ctx, order_id).await?;
        Self::combine_adjustments(&lines).map_err(|err| {
            let err = OrchestrationError::aggregation(format!("order {order_id}"), err);
            self.order_failure(ctx, order_id, "combining adjustments", err)
        })
    }

    pub fn combine_adjustments(lines: &[CompositeLine]) -> DomainResult<Option<Adjustment>> {
        let adjustments = lines
            .iter()
            .map(CompositeLine::try_adjustment)
            .collect::<DomainResult<Vec<_>>>()?;
        Ok(combine_adjustments(&adjustments))
    }

    fn order_failure(
        &self,
        ctx: &RequestContext,
        order_id: &OrderId,
        stage: &str,
        err: OrchestrationError,
    ) -> OrchestrationError {
        error!(
            request_id = %ctx.request_id(),
            order_id = %order_id,
            stage,
            status = ?err.status_code(),
            error = %err,
            "order operation failed"
        );
        err
    }
}
