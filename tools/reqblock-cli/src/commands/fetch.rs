//! Fetch command: server-render a set of request blocks and emit the cache.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use reqblock_cache::CacheStore;
use reqblock_data::ReqwestFetcher;
use reqblock_fetch::{
    render_to_fixed_point, BlockParams, Phase, RenderPromises, RequestBlock, RequestBlockContext,
    RequestBlockProvider,
};
use serde::Serialize;
use serde_json::Value as JsonValue;

use super::{parse_json_arg, FetchArgs};
use crate::context::Context;
use crate::output::{format_bytes, phase_badge};

#[derive(Debug, Serialize)]
struct Outcome {
    url: String,
    fingerprint: Option<String>,
    phase: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct FetchReport<'a> {
    passes: usize,
    blocks: &'a [Outcome],
    snapshot: &'a str,
}

/// Run the fetch command.
pub async fn run(args: FetchArgs, ctx: &Context) -> Result<()> {
    let options = parse_json_arg("options", args.options.as_deref())?;

    let mut provider = ctx.config.provider.clone();
    if let Some(origin) = args.origin {
        provider.origin = Some(origin);
    }

    let registry = Arc::new(RenderPromises::new());
    let context = RequestBlockProvider::from_config(&provider, Arc::new(ReqwestFetcher::new()))
        .with_cache(Arc::new(CacheStore::server()))
        .with_render_promises(registry.clone())
        .build();

    let (passes, outcomes) = render_to_fixed_point(&registry, provider.max_render_passes, |number| {
        render_urls(&context, &args.urls, options.as_ref(), number)
    })
    .await
    .context("Requests did not settle")?;

    let snapshot = if args.html {
        context.cache.serialize_for_html()
    } else {
        context.cache.serialize()
    }
    .context("Failed to serialize cache")?;

    if ctx.output.is_json() {
        ctx.output.json(&FetchReport {
            passes,
            blocks: &outcomes,
            snapshot: &snapshot,
        });
    } else {
        ctx.output.header(&format!("Fetched {} urls in {} passes", outcomes.len(), passes));
        for outcome in &outcomes {
            ctx.output.list_item(&format!("{} {}", phase_badge(&outcome.phase), outcome.url));
            if let Some(error) = &outcome.error {
                ctx.output.warn(error);
            }
        }
    }

    match args.out {
        Some(out) => {
            let path = ctx.resolve_path(&out);
            std::fs::write(&path, &snapshot)
                .with_context(|| format!("Failed to write snapshot: {}", path.display()))?;
            ctx.output.success(&format!(
                "Wrote {} to {}",
                format_bytes(snapshot.len() as u64),
                path.display()
            ));
        }
        None if !ctx.output.is_json() => println!("{}", snapshot),
        None => {}
    }

    Ok(())
}

async fn render_urls(
    context: &Arc<RequestBlockContext>,
    urls: &[String],
    options: Option<&JsonValue>,
    pass: usize,
) -> (usize, Vec<Outcome>) {
    let mut outcomes = Vec::with_capacity(urls.len());
    for url in urls {
        let mut params = BlockParams::new(url.as_str());
        params.options = options.cloned();

        let mut block: RequestBlock =
            RequestBlock::new(params, Default::default(), Some(Arc::clone(context)));
        block.activate().await;

        let phase = match block.phase() {
            Phase::Success => "success",
            Phase::Error => "error",
            _ => "pending",
        };
        outcomes.push(Outcome {
            url: url.clone(),
            fingerprint: block.fingerprint().map(|key| key.into_string()),
            phase: phase.to_string(),
            error: block.state().error.as_ref().map(ToString::to_string),
        });
    }
    tracing::debug!(pass, blocks = outcomes.len(), "render pass complete");
    (pass + 1, outcomes)
}
