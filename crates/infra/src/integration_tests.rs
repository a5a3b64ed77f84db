//! Integration tests for the full orchestration pipeline.
//!
//! Tests: OrderAggregator → CompositeLineAssembler → SubObjectGateway → InMemoryStorage
//!
//! Verifies:
//! - Lines are resolved completely or the whole call fails
//! - Deletes remove sub-objects before the line and can be repeated
//! - Fan-out respects the configured in-flight bound

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;

    use acqorders_core::{DomainError, OrderId, TenantId};
    use acqorders_purchasing::{Operation, SubObjectKind};

    use crate::aggregator::OrderAggregator;
    use crate::config::OrchestratorConfig;
    use crate::context::RequestContext;
    use crate::error::OrchestrationError;
    use crate::gateway::InMemoryStorage;

    fn ctx() -> RequestContext {
        RequestContext::new("http://storage").with_tenant(TenantId::parse("diku").unwrap())
    }

    fn order_id() -> OrderId {
        OrderId::parse("o1").unwrap()
    }

    /// Order o1 with two lines:
    /// - l1: cost, location, adjustment {credit 5, tax1 2}, one alert;
    /// - l2: cost, adjustment {credit 3, discount 1}, three fund distributions.
    fn seed_order(storage: &InMemoryStorage) {
        storage.insert("/purchase_order/o1", json!({ "id": "o1", "po_number": "10001" }));

        storage.insert(
            "/po_line/l1",
            json!({
                "id": "l1",
                "purchase_order_id": "o1",
                "po_line_number": "10001-1",
                "cost": "c1",
                "location": "loc1",
                "adjustment": "adj1",
                "alerts": ["al1"]
            }),
        );
        storage.insert("/cost/c1", json!({ "id": "c1", "list_price": 24.99, "currency": "USD" }));
        storage.insert("/location/loc1", json!({ "id": "loc1", "quantity": 1 }));
        storage.insert("/adjustment/adj1", json!({ "id": "adj1", "credit": 5.0, "tax1": 2.0 }));
        storage.insert("/alert/al1", json!({ "id": "al1", "alert": "Receipt overdue" }));

        storage.insert(
            "/po_line/l2",
            json!({
                "id": "l2",
                "purchase_order_id": "o1",
                "po_line_number": "10001-2",
                "cost": "c2",
                "adjustment": "adj2",
                "fund_distribution": ["f1", "f2", "f3"]
            }),
        );
        storage.insert("/cost/c2", json!({ "id": "c2", "list_price": 10.0, "currency": "USD" }));
        storage.insert("/adjustment/adj2", json!({ "id": "adj2", "credit": 3.0, "discount": 1.0 }));
        for (id, pct) in [("f1", 50), ("f2", 30), ("f3", 20)] {
            storage.insert(
                format!("/fund_distribution/{id}"),
                json!({ "id": id, "code": "HIST", "percentage": pct }),
            );
        }
    }

    fn setup(config: OrchestratorConfig) -> (Arc<InMemoryStorage>, OrderAggregator<Arc<InMemoryStorage>>) {
        let storage = Arc::new(InMemoryStorage::new());
        seed_order(&storage);
        let aggregator = OrderAggregator::new(storage.clone(), config);
        (storage, aggregator)
    }

    #[tokio::test]
    async fn simple_line_resolves_all_sub_objects() {
        let (_storage, aggregator) = setup(OrchestratorConfig::default());

        let lines = aggregator.get_composite_lines(&ctx(), &order_id()).await.unwrap();

        assert_eq!(lines.len(), 2);
        let l1 = &lines[0];
        assert_eq!(l1.id(), Some("l1"));
        assert_eq!(l1.get("cost").unwrap()["list_price"], json!(24.99));
        assert_eq!(l1.get("location").unwrap()["quantity"], json!(1));
        assert_eq!(l1.get("adjustment").unwrap()["credit"], json!(5.0));
        assert_eq!(l1.get("alerts").unwrap()[0]["alert"], json!("Receipt overdue"));
        assert_eq!(l1.get("po_line_number"), Some(&json!("10001-1")));
        assert!(l1.warnings().is_empty());
    }

    #[tokio::test]
    async fn empty_sub_object_on_read_is_a_warning() {
        let (storage, aggregator) = setup(OrchestratorConfig::default());
        storage.insert(
            "/po_line/l1",
            json!({ "id": "l1", "purchase_order_id": "o1", "cost": "c1", "details": "d1" }),
        );

        let lines = aggregator.get_composite_lines(&ctx(), &order_id()).await.unwrap();

        let l1 = &lines[0];
        assert!(l1.get("details").is_none());
        assert!(l1.get("cost").is_some());
        assert_eq!(l1.warnings().len(), 1);
        assert_eq!(l1.warnings()[0].kind, SubObjectKind::Details);
        assert_eq!(l1.warnings()[0].sub_object_id.as_deref(), Some("d1"));
        assert_eq!(l1.warnings()[0].operation, Operation::Read);
    }

    #[tokio::test]
    async fn empty_success_body_on_read_is_a_warning() {
        let (storage, aggregator) = setup(OrchestratorConfig::default());
        storage.insert(
            "/po_line/l1",
            json!({ "id": "l1", "purchase_order_id": "o1", "cost": "c1", "details": "d1" }),
        );
        storage.insert("/details/d1", json!({ "id": "d1" }));
        storage.respond_with(Operation::Read, "/details/d1", 200, Some(json!({})));

        let lines = aggregator.get_composite_lines(&ctx(), &order_id()).await.unwrap();

        let l1 = &lines[0];
        assert!(l1.get("details").is_none());
        assert_eq!(l1.get("cost").unwrap()["id"], json!("c1"));
        assert_eq!(l1.warnings().len(), 1);
        assert_eq!(l1.warnings()[0].kind, SubObjectKind::Details);
        assert_eq!(l1.warnings()[0].sub_object_id.as_deref(), Some("d1"));
    }

    #[tokio::test]
    async fn order_adjustment_sums_line_adjustments() {
        let (_storage, aggregator) = setup(OrchestratorConfig::default());

        let total = aggregator
            .order_adjustment(&ctx(), &order_id())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(total.credit, Some(8.0));
        assert_eq!(total.discount, Some(1.0));
        assert_eq!(total.tax1, Some(2.0));
        assert_eq!(total.components_or_zero()[2..5], [0.0, 0.0, 0.0]);
    }

    #[tokio::test]
    async fn order_without_adjustments_has_none() {
        let storage = Arc::new(InMemoryStorage::new());
        storage.insert("/po_line/l1", json!({ "id": "l1", "purchase_order_id": "o1" }));
        let aggregator = OrderAggregator::new(storage, OrchestratorConfig::default());

        assert_eq!(aggregator.order_adjustment(&ctx(), &order_id()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn one_failing_line_fails_the_whole_order() {
        let (storage, aggregator) = setup(OrchestratorConfig::default());
        storage.delay("/fund_distribution/", Duration::from_millis(20));
        storage.fail_with(Operation::Read, "/cost/c1", 500, "cost table unavailable");

        let err = aggregator
            .get_composite_lines(&ctx(), &order_id())
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), Some(500));
        assert!(err.to_string().starts_with("order o1: line l1:"));
        assert!(err.to_string().contains("cost table unavailable"));

        // Siblings were not cancelled: every sub-object read was still issued.
        let reads = storage
            .calls()
            .into_iter()
            .filter(|c| c.path.starts_with("/fund_distribution/"))
            .count();
        assert_eq!(reads, 3);
    }

    #[tokio::test]
    async fn lines_come_back_in_storage_order() {
        let (storage, aggregator) = setup(OrchestratorConfig::default());
        // l1 is much slower than l2.
        storage.delay("/cost/c1", Duration::from_millis(40));

        let lines = aggregator.get_composite_lines(&ctx(), &order_id()).await.unwrap();

        let ids: Vec<_> = lines.iter().map(|l| l.id().unwrap().to_string()).collect();
        assert_eq!(ids, vec!["l1", "l2"]);
    }

    #[tokio::test]
    async fn multi_valued_round_trip() {
        let (storage, aggregator) = setup(OrchestratorConfig::default());

        let lines = aggregator.get_composite_lines(&ctx(), &order_id()).await.unwrap();
        let funds = lines[1].get("fund_distribution").unwrap().as_array().unwrap();
        assert_eq!(funds.len(), 3);
        let mut ids: Vec<_> = funds.iter().map(|f| f["id"].as_str().unwrap()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec!["f1", "f2", "f3"]);

        aggregator.delete_lines(&ctx(), &order_id()).await.unwrap();
        for id in ["f1", "f2", "f3"] {
            assert!(!storage.contains(&format!("/fund_distribution/{id}")));
        }
    }

    #[tokio::test]
    async fn delete_lines_is_idempotent() {
        let (storage, aggregator) = setup(OrchestratorConfig::default());

        aggregator.delete_lines(&ctx(), &order_id()).await.unwrap();
        // Only the order record itself is left.
        assert_eq!(storage.len(), 1);
        assert!(storage.contains("/purchase_order/o1"));

        aggregator.delete_lines(&ctx(), &order_id()).await.unwrap();
        assert_eq!(storage.len(), 1);
    }

    #[tokio::test]
    async fn retry_finishes_a_partially_failed_delete() {
        let (storage, aggregator) = setup(OrchestratorConfig::default());
        storage.fail_transport(Operation::Delete, "/fund_distribution/f2", "connection reset");

        let err = aggregator.delete_lines(&ctx(), &order_id()).await.unwrap_err();
        assert!(err.is_transport());
        assert!(storage.contains("/po_line/l2"));
        assert!(!storage.contains("/po_line/l1"));

        storage.clear_faults();
        aggregator.delete_lines(&ctx(), &order_id()).await.unwrap();
        assert_eq!(storage.len(), 1);
    }

    #[tokio::test]
    async fn parent_line_is_deleted_after_its_sub_objects() {
        let (storage, aggregator) = setup(OrchestratorConfig::default());
        storage.delay("/cost/", Duration::from_millis(30));
        storage.delay("/fund_distribution/", Duration::from_millis(15));

        aggregator.delete_lines(&ctx(), &order_id()).await.unwrap();

        let deletes: Vec<String> = storage
            .calls()
            .into_iter()
            .filter(|c| c.operation == Operation::Delete)
            .map(|c| c.path)
            .collect();
        let position = |path: &str| deletes.iter().position(|p| p == path).unwrap();

        for (line, children) in [
            ("/po_line/l1", vec!["/cost/c1", "/location/loc1", "/adjustment/adj1", "/alert/al1"]),
            (
                "/po_line/l2",
                vec![
                    "/cost/c2",
                    "/adjustment/adj2",
                    "/fund_distribution/f1",
                    "/fund_distribution/f2",
                    "/fund_distribution/f3",
                ],
            ),
        ] {
            for child in children {
                assert!(position(child) < position(line), "{child} deleted after {line}");
            }
        }
    }

    #[tokio::test]
    async fn failed_sub_object_delete_keeps_the_line() {
        let (storage, aggregator) = setup(OrchestratorConfig::default());
        storage.fail_with(Operation::Delete, "/location/loc1", 500, "locked");

        let err = aggregator.delete_lines(&ctx(), &order_id()).await.unwrap_err();

        assert_eq!(err.status_code(), Some(500));
        assert!(storage.contains("/po_line/l1"));
        assert!(
            !storage
                .calls()
                .iter()
                .any(|c| c.operation == Operation::Delete && c.path == "/po_line/l1")
        );
    }

    #[tokio::test]
    async fn in_flight_calls_respect_the_configured_bound() {
        let storage = Arc::new(InMemoryStorage::new());
        let mut line = serde_json::Map::new();
        line.insert("id".into(), json!("l1"));
        line.insert("purchase_order_id".into(), json!("o1"));
        for kind in SubObjectKind::SUB_OBJECTS {
            let id = format!("{}-1", kind.field_name());
            storage.insert(kind.record_path(&id), json!({ "id": id }));
            let reference = if kind.is_multi_valued() { json!([id]) } else { json!(id) };
            line.insert(kind.field_name().into(), reference);
        }
        storage.insert("/po_line/l1", serde_json::Value::Object(line));
        storage.delay("/", Duration::from_millis(10));

        let bounded = OrderAggregator::new(
            storage.clone(),
            OrchestratorConfig::default().with_max_in_flight(3),
        );
        let lines = bounded.get_composite_lines(&ctx(), &order_id()).await.unwrap();

        assert!(lines[0].warnings().is_empty());
        assert!(storage.peak_in_flight() <= 3);
        assert_eq!(bounded.gateway().available_permits(), Some(3));
    }

    #[tokio::test]
    async fn unbounded_fan_out_issues_everything_at_once() {
        let (storage, aggregator) = setup(OrchestratorConfig::default());
        storage.delay("/", Duration::from_millis(10));

        aggregator.get_composite_lines(&ctx(), &order_id()).await.unwrap();

        // 4 references on l1 + 5 on l2 are in flight together.
        assert!(storage.peak_in_flight() > 3);
        assert_eq!(aggregator.gateway().available_permits(), None);
    }

    #[tokio::test]
    async fn transport_and_status_failures_stay_distinct() {
        let (storage, aggregator) = setup(OrchestratorConfig::default());
        storage.fail_transport(Operation::Read, "/alert/al1", "connection refused");

        let err = aggregator
            .get_composite_lines(&ctx(), &order_id())
            .await
            .unwrap_err();
        assert!(err.is_transport());
        assert_eq!(err.status_code(), None);

        storage.clear_faults();
        storage.fail_with(Operation::Read, "/alert/al1", 403, "forbidden");
        let err = aggregator
            .get_composite_lines(&ctx(), &order_id())
            .await
            .unwrap_err();
        assert!(!err.is_transport());
        assert_eq!(err.status_code(), Some(403));
    }

    #[tokio::test]
    async fn missing_line_query_is_an_error() {
        let (storage, aggregator) = setup(OrchestratorConfig::default());
        storage.respond_with(
            Operation::Read,
            "/po_line?limit=999&query=purchase_order_id==o1&lang=en",
            404,
            None,
        );

        let err = aggregator.delete_lines(&ctx(), &order_id()).await.unwrap_err();
        assert_eq!(err.status_code(), Some(404));
        assert_eq!(storage.len(), 12);
    }

    #[tokio::test]
    async fn line_query_without_lines_field_deletes_nothing() {
        let (storage, aggregator) = setup(OrchestratorConfig::default());
        storage.respond_with(
            Operation::Read,
            "/po_line?limit=999&query=purchase_order_id==o1&lang=en",
            200,
            Some(json!({
                "poLines": [{ "id": "l1", "purchase_order_id": "o1", "cost": "c1" }],
                "totalRecords": 1
            })),
        );

        let err = aggregator.delete_lines(&ctx(), &order_id()).await.unwrap_err();
        assert!(matches!(
            err.root_cause(),
            OrchestrationError::Domain(DomainError::Validation(msg)) if msg.contains("malformed line collection")
        ));
        assert!(storage.contains("/po_line/l1"));
        assert_eq!(storage.len(), 12);
        assert!(storage.calls().iter().all(|c| c.operation == Operation::Read));

        let err = aggregator
            .get_composite_lines(&ctx(), &order_id())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), None);
    }

    #[tokio::test]
    async fn malformed_adjustment_fails_the_order_total() {
        let (storage, aggregator) = setup(OrchestratorConfig::default());
        storage.insert("/adjustment/adj1", json!({ "id": "adj1", "credit": "5" }));

        let err = aggregator
            .order_adjustment(&ctx(), &order_id())
            .await
            .unwrap_err();

        assert!(err.to_string().starts_with("order o1:"));
        assert!(matches!(
            err.root_cause(),
            OrchestrationError::Domain(DomainError::Validation(msg)) if msg.contains("malformed adjustment")
        ));
    }

    #[tokio::test]
    async fn request_context_reaches_every_call() {
        let (storage, aggregator) = setup(OrchestratorConfig::default());

        aggregator.get_composite_lines(&ctx(), &order_id()).await.unwrap();

        let calls = storage.calls();
        assert_eq!(calls.len(), 1 + 4 + 5);
        assert!(calls.iter().all(|c| c.tenant.as_deref() == Some("diku")));
    }

    #[tokio::test]
    async fn composite_line_by_id_resolves_a_single_line() {
        let (_storage, aggregator) = setup(OrchestratorConfig::default());

        let line = aggregator
            .get_composite_line_by_id(&ctx(), &"l2".parse().unwrap())
            .await
            .unwrap();

        assert_eq!(line.purchase_order_id(), Some("o1"));
        assert_eq!(line.get("cost").unwrap()["id"], json!("c2"));
        assert_eq!(line.get("fund_distribution").unwrap().as_array().unwrap().len(), 3);
    }
}
