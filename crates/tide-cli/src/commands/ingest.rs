use anyhow::Context;
use serde::Serialize;
use serde_json::Value;
use tide_core::events::DomainEvent;
use tide_engine::ingest::IngestRecord;

use crate::cli::GlobalFlags;
use crate::cli::root_commands::IngestArgs;
use crate::context::AppContext;
use crate::output::output;

#[derive(Debug, Serialize)]
struct IngestSummary {
    records: usize,
    anchors: usize,
    duplicates: usize,
    references: usize,
    events: Vec<DomainEvent>,
}

/// Handle `tide ingest`. Domain events go straight to the recompute queue.
pub async fn handle(
    args: &IngestArgs,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let records = parse_records(&text)
        .with_context(|| format!("failed to parse {}", args.file.display()))?;

    let spinner = flags
        .terminal
        .spinner(&format!("ingesting {} records", records.len()));
    let outcome = match ctx.engine.ingest(&records, &ctx.scheduler).await {
        Ok(outcome) => {
            spinner.succeed("ingested");
            outcome
        }
        Err(error) => {
            spinner.fail("ingest failed");
            return Err(error).context("ingest stopped at the first failing record");
        }
    };

    output(
        &IngestSummary {
            records: records.len(),
            anchors: outcome.anchors.len(),
            duplicates: outcome.duplicates,
            references: outcome.references,
            events: outcome.events,
        },
        flags,
    )
}

/// Accepts one record, an array of records, or a stream of records (JSON lines).
fn parse_records(text: &str) -> anyhow::Result<Vec<IngestRecord>> {
    let mut records = Vec::new();
    for (index, document) in serde_json::Deserializer::from_str(text)
        .into_iter::<Value>()
        .enumerate()
    {
        let document =
            document.with_context(|| format!("document {} is not valid JSON", index + 1))?;
        match document {
            Value::Array(items) => {
                for item in items {
                    records.push(record(item)?);
                }
            }
            other => records.push(record(other)?),
        }
    }
    if records.is_empty() {
        anyhow::bail!("no records found");
    }
    Ok(records)
}

fn record(value: Value) -> anyhow::Result<IngestRecord> {
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or("untyped")
        .to_string();
    serde_json::from_value(value).with_context(|| format!("unrecognized {kind} record"))
}
