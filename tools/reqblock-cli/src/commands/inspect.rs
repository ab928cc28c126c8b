//! Snapshot inspection command.

use anyhow::{Context as _, Result};
use reqblock_cache::{CacheEntry, CacheStore};
use reqblock_core::codec;
use serde::Serialize;
use serde_json::Value as JsonValue;

use super::InspectArgs;
use crate::context::Context;
use crate::output::format_bytes;

#[derive(Serialize)]
struct EntryReport {
    fingerprint: String,
    nodes: usize,
    cyclic: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Run the inspect command.
pub async fn run(args: InspectArgs, ctx: &Context) -> Result<()> {
    let path = ctx.resolve_path(&args.file);
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read snapshot: {}", path.display()))?;

    // Restoring never fails, so decode once up front to report bad input.
    codec::decode(&text).with_context(|| format!("Failed to decode snapshot: {}", path.display()))?;
    let store = CacheStore::from_snapshot(text.as_str(), false);

    let reports: Vec<EntryReport> = store
        .extract()
        .into_iter()
        .filter_map(|(fingerprint, entry)| match entry {
            CacheEntry::Settled(graph) => {
                let (value, error) = match graph.to_json() {
                    Ok(value) => (Some(value), None),
                    Err(e) => (None, Some(e.to_string())),
                };
                Some(EntryReport {
                    fingerprint,
                    nodes: graph.len(),
                    cyclic: graph.is_cyclic(),
                    value,
                    error,
                })
            }
            CacheEntry::Pending(_) => None,
        })
        .collect();

    if ctx.output.is_json() {
        ctx.output.json(&reports);
        return Ok(());
    }

    ctx.output.header(&format!(
        "{} ({}, {} entries)",
        path.display(),
        format_bytes(text.len() as u64),
        reports.len()
    ));
    for report in &reports {
        ctx.output.list_item(&report.fingerprint);
        match &report.value {
            Some(value) => ctx.output.kv("value", &value.to_string()),
            None => ctx.output.kv(
                "value",
                &format!(
                    "{} nodes, not shown: {}",
                    report.nodes,
                    report.error.as_deref().unwrap_or("no JSON form")
                ),
            ),
        }
    }
    Ok(())
}
