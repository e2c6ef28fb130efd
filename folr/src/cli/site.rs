use anyhow::Result;

use crate::cli::{AppContext, SiteArgs, ensure_authenticated};
use crate::fields::build_patch;

/// Shows the about section, or updates it when fields are given.
pub async fn about(ctx: &AppContext, args: &SiteArgs) -> Result<()> {
    let current = ctx.store.snapshot().about.clone();
    if args.fields.is_empty() {
        return ctx.output.emit_json(&current);
    }
    ensure_authenticated(&ctx.client)?;
    let patch = build_patch(&args.fields, &serde_json::to_value(&current)?)?;
    let result = ctx.store.update_about(patch).await;
    ctx.output.emit_mutation(&result)
}

/// Shows site configuration, or updates it when fields are given.
pub async fn configuration(ctx: &AppContext, args: &SiteArgs) -> Result<()> {
    let current = ctx.store.snapshot().configuration.clone();
    if args.fields.is_empty() {
        return ctx.output.emit_json(&current);
    }
    ensure_authenticated(&ctx.client)?;
    let patch = build_patch(&args.fields, &serde_json::to_value(&current)?)?;
    let result = ctx.store.update_configuration(patch).await;
    ctx.output.emit_mutation(&result)
}
