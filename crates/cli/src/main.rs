use anyhow::{Context, Result, bail};
use serde_json::{Value as JsonValue, json};

use acqorders_core::{LineId, OrderId, TenantId};
use acqorders_infra::{
    HttpStorageTransport, OrchestratorConfig, OrderAggregator, RequestContext, StorageTransport,
};

const USAGE: &str = "usage: acqorders <lines|delete-lines|adjustment> <order-id>\n       acqorders line <line-id>";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Lines(OrderId),
    Line(LineId),
    DeleteLines(OrderId),
    Adjustment(OrderId),
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Command> {
    let mut args = args.into_iter();
    let (Some(command), Some(id), None) = (args.next(), args.next(), args.next()) else {
        bail!("{USAGE}");
    };

    let command = match command.as_str() {
        "lines" => Command::Lines(OrderId::parse(id)?),
        "line" => Command::Line(LineId::parse(id)?),
        "delete-lines" => Command::DeleteLines(OrderId::parse(id)?),
        "adjustment" => Command::Adjustment(OrderId::parse(id)?),
        other => bail!("unknown command '{other}'\n{USAGE}"),
    };
    Ok(command)
}

fn context_from_env() -> Result<RequestContext> {
    let url = std::env::var("OKAPI_URL").context("OKAPI_URL must point at the storage gateway")?;
    let tenant = std::env::var("OKAPI_TENANT").context("OKAPI_TENANT is required")?;

    let mut ctx = RequestContext::new(url).with_tenant(TenantId::parse(tenant)?);
    if let Ok(token) = std::env::var("OKAPI_TOKEN") {
        ctx = ctx.with_token(token);
    }
    Ok(ctx)
}

async fn run<T: StorageTransport>(
    aggregator: &OrderAggregator<T>,
    ctx: &RequestContext,
    command: Command,
) -> Result<JsonValue> {
    match command {
        Command::Lines(order_id) => {
            let lines = aggregator
                .get_composite_lines(ctx, &order_id)
                .await
                .with_context(|| format!("reading lines of order {order_id}"))?;
            for warning in lines.iter().flat_map(|line| line.warnings()) {
                tracing::warn!(%warning, "incomplete line");
            }
            let total_records = lines.len();
            Ok(json!({ "po_lines": lines, "total_records": total_records }))
        }
        Command::Line(line_id) => {
            let line = aggregator
                .get_composite_line_by_id(ctx, &line_id)
                .await
                .with_context(|| format!("reading line {line_id}"))?;
            Ok(serde_json::to_value(line)?)
        }
        Command::DeleteLines(order_id) => {
            aggregator
                .delete_lines(ctx, &order_id)
                .await
                .with_context(|| format!("deleting lines of order {order_id}"))?;
            Ok(json!({ "purchase_order_id": order_id, "deleted": true }))
        }
        Command::Adjustment(order_id) => {
            let total = aggregator
                .order_adjustment(ctx, &order_id)
                .await
                .with_context(|| format!("combining adjustments of order {order_id}"))?;
            Ok(serde_json::to_value(total)?)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    acqorders_observability::init();

    let command = parse_args(std::env::args().skip(1))?;
    let config = OrchestratorConfig::from_env();
    let ctx = context_from_env()?;

    tracing::info!(request_id = %ctx.request_id(), ?command, "starting");

    let transport = HttpStorageTransport::new(&config)?;
    let aggregator = OrderAggregator::new(transport, config);
    let output = run(&aggregator, &ctx, command).await?;

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use acqorders_infra::InMemoryStorage;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_every_command() {
        assert_eq!(
            parse_args(args(&["lines", "o1"])).unwrap(),
            Command::Lines(OrderId::parse("o1").unwrap())
        );
        assert_eq!(
            parse_args(args(&["line", "l1"])).unwrap(),
            Command::Line(LineId::parse("l1").unwrap())
        );
        assert_eq!(
            parse_args(args(&["delete-lines", "o1"])).unwrap(),
            Command::DeleteLines(OrderId::parse("o1").unwrap())
        );
        assert_eq!(
            parse_args(args(&["adjustment", "o1"])).unwrap(),
            Command::Adjustment(OrderId::parse("o1").unwrap())
        );
    }

    #[test]
    fn rejects_bad_invocations() {
        assert!(parse_args(args(&[])).is_err());
        assert!(parse_args(args(&["lines"])).is_err());
        assert!(parse_args(args(&["lines", "o1", "extra"])).is_err());
        assert!(parse_args(args(&["purge", "o1"])).is_err());
        assert!(parse_args(args(&["lines", "o1/../x"])).is_err());
    }

    #[tokio::test]
    async fn adjustment_of_order_without_lines_prints_null() {
        let aggregator = OrderAggregator::new(InMemoryStorage::new(), OrchestratorConfig::default());
        let ctx = RequestContext::new("http://storage");

        let output = run(&aggregator, &ctx, Command::Adjustment(OrderId::parse("o1").unwrap()))
            .await
            .unwrap();

        assert_eq!(output, JsonValue::Null);
    }
}
