//! Fingerprint command.

use anyhow::Result;
use reqblock_core::{effective_options, fingerprint, Ambient};
use reqblock_data::resolve_url;
use serde_json::json;

use super::{parse_json_arg, FingerprintArgs};
use crate::context::Context;

/// Run the fingerprint command.
pub async fn run(args: FingerprintArgs, ctx: &Context) -> Result<()> {
    let options = parse_json_arg("options", args.options.as_deref())?;
    let context_options = match parse_json_arg("context-options", args.context_options.as_deref())? {
        Some(options) => Some(options),
        None => ctx.config.provider.options.clone(),
    };

    let ambient = Ambient::Present(context_options.as_ref());
    let effective = effective_options(options.as_ref(), ambient, args.ignore_context);
    let Some(key) = fingerprint(&args.url, options.as_ref(), ambient, args.ignore_context) else {
        anyhow::bail!("No fingerprint without a request context");
    };
    let url = resolve_url(&args.url, ctx.config.provider.origin.as_deref());

    if ctx.output.is_json() {
        ctx.output.json(&json!({
            "fingerprint": key,
            "url": url,
            "options": effective,
        }));
        return Ok(());
    }

    println!("{}", key);
    ctx.output.debug(&format!("request url: {}", url));
    Ok(())
}
