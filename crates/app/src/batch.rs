//! Line-oriented command execution.
//!
//! Each non-blank input line is one [`BatchCommand`]. Each produces exactly
//! one output line, so results can be matched to commands by position. A bad
//! line yields a `bad_request` result and the batch carries on.

use serde::Serialize;
use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use minimart_infra::OrderLifecycleService;
use minimart_infra::repository::Repository;

use crate::dto::BatchCommand;
use crate::errors::{json_error, json_ok, order_error_to_json};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub processed: usize,
    pub failed: usize,
}

/// Run one command and render its JSON result.
pub async fn execute<R: Repository>(service: &OrderLifecycleService<R>, command: BatchCommand) -> Value {
    let outcome = match command {
        BatchCommand::Create { customer_id, lines } => service
            .create_order(customer_id, &lines)
            .await
            .map(|order| to_json(&order)),
        BatchCommand::Edit {
            order_id,
            customer_id,
            lines,
        } => service
            .edit_order(order_id, customer_id, &lines)
            .await
            .map(|order| to_json(&order)),
        BatchCommand::Delete { order_id } => service
            .delete_order(order_id)
            .await
            .map(|()| json!({ "deleted": order_id })),
        BatchCommand::Get { order_id } => service
            .get_order(order_id)
            .await
            .map(|details| to_json(&details)),
        BatchCommand::List { page } => service.list_orders(page).await.map(|page| {
            json!({
                "orders": page.orders,
                "total": page.total,
                "page": page.page,
                "page_size": page.page_size,
                "page_count": page.page_count(),
                "has_more": page.has_more(),
            })
        }),
    };

    match outcome {
        Ok(result) => json_ok(result),
        Err(err) => order_error_to_json(&err),
    }
}

/// Parse and run a single input line. Blank lines give `None`.
pub async fn handle_line<R: Repository>(service: &OrderLifecycleService<R>, line: &str) -> Option<Value> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let result = match serde_json::from_str::<BatchCommand>(line) {
        Ok(command) => {
            debug!(?command, "executing command");
            execute(service, command).await
        }
        Err(err) => json_error("bad_request", err.to_string()),
    };
    Some(result)
}

/// Read commands from `input` until EOF, writing one result line per command.
pub async fn run_batch<R, I, O>(
    service: &OrderLifecycleService<R>,
    input: I,
    mut output: O,
) -> anyhow::Result<BatchSummary>
where
    R: Repository,
    I: AsyncBufRead + Unpin,
    O: AsyncWrite + Unpin,
{
    let mut summary = BatchSummary::default();
    let mut lines = input.lines();

    while let Some(line) = lines.next_line().await? {
        let Some(result) = handle_line(service, &line).await else {
            continue;
        };
        summary.processed += 1;
        if result["ok"] == false {
            summary.failed += 1;
        }

        let mut rendered = serde_json::to_vec(&result)?;
        rendered.push(b'\n');
        output.write_all(&rendered).await?;
    }
    output.flush().await?;

    info!(
        processed = summary.processed,
        failed = summary.failed,
        "batch finished"
    );
    Ok(summary)
}

fn to_json<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value)
        .unwrap_or_else(|e| json!({ "serialization_error": e.to_string() }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use minimart_infra::repository::InMemoryRepository;
    use minimart_infra::seed::{seed_catalog, seeded_customer_id, seeded_product_id};

    async fn seeded_service() -> OrderLifecycleService<InMemoryRepository> {
        let repo = InMemoryRepository::new();
        seed_catalog(&repo).await.unwrap();
        OrderLifecycleService::new(repo)
    }

    async fn run(service: &OrderLifecycleService<InMemoryRepository>, input: &str) -> (BatchSummary, Vec<Value>) {
        let mut out = Vec::new();
        let summary = run_batch(service, input.as_bytes(), &mut out).await.unwrap();
        let results = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        (summary, results)
    }

    #[tokio::test]
    async fn create_then_list_then_delete() {
        let service = seeded_service().await;
        let create = format!(
            r#"{{"op":"create","customer_id":"{}","lines":[{{"product_id":"{}","quantity":4}}]}}"#,
            seeded_customer_id(1),
            seeded_product_id(4)
        );

        let (summary, results) = run(&service, &format!("{create}\n\n{{\"op\":\"list\"}}\n")).await;

        assert_eq!(summary, BatchSummary { processed: 2, failed: 0 });
        assert_eq!(results[0]["ok"], true);
        assert_eq!(results[0]["result"]["total"], 6_000);
        assert_eq!(results[1]["result"]["total"], 1);

        let order_id = results[0]["result"]["id"].as_str().unwrap().to_string();
        let (_, results) = run(
            &service,
            &format!(r#"{{"op":"delete","order_id":"{order_id}"}}"#),
        )
        .await;
        assert_eq!(results[0]["result"]["deleted"], order_id);
    }

    #[tokio::test]
    async fn failures_are_reported_with_codes() {
        let service = seeded_service().await;
        let oversell = format!(
            r#"{{"op":"create","customer_id":"{}","lines":[{{"product_id":"{}","quantity":11}}]}}"#,
            seeded_customer_id(2),
            seeded_product_id(1)
        );
        let input = format!("{oversell}\nnot json\n{{\"op\":\"get\",\"order_id\":\"{}\"}}\n", seeded_product_id(9));

        let (summary, results) = run(&service, &input).await;

        assert_eq!(summary, BatchSummary { processed: 3, failed: 3 });
        assert_eq!(results[0]["error"], "insufficient_stock");
        assert_eq!(results[1]["error"], "bad_request");
        assert_eq!(results[2]["error"], "order_not_found");
    }

    #[tokio::test]
    async fn empty_line_list_is_a_validation_error() {
        let service = seeded_service().await;
        let input = format!(
            r#"{{"op":"create","customer_id":"{}","lines":[]}}"#,
            seeded_customer_id(3)
        );

        let (_, results) = run(&service, &input).await;

        assert_eq!(results[0]["error"], "validation_error");
    }
}
