use anyhow::Result;
use folio::error::FolioError;
use folio::prelude::*;
use serde::Serialize;

use crate::cli::{AppContext, ContentArgs, PreviewArgs};
use crate::output::OutputFormat;

#[derive(Debug, Serialize)]
struct PreviewReport<'a> {
    id: &'a str,
    kind: EntityKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    entry: Option<PreviewEntry>,
    preview: PreviewDescriptor,
}

pub async fn handle(ctx: &AppContext, args: ContentArgs) -> Result<()> {
    let snapshot = ctx.store.snapshot();
    let pool = snapshot.entities();
    let entities: Vec<Entity> = match args.kind {
        Some(kind) => pool
            .iter()
            .filter(|entity| entity.kind() == kind.to_kind())
            .cloned()
            .collect(),
        None => pool.clone(),
    };
    let registry = AdapterRegistry::default();
    let previews = PreviewResolver::new(ctx.client.clone(), ctx.client.get_config().preview_freshness);
    if args.previews {
        previews.request_all(&entities, &registry).await;
    }

    let resolver = ctx.store.visibility_resolver();
    let render_ctx = RenderContext::new(
        &resolver,
        &pool,
        PreviewContext::new(previews.snapshot(), ctx.client.capture()),
    );
    let mut list = ListView::new(args.mode.to_mode())
        .facet(args.facet.parse().unwrap_or_default())
        .sort(args.sort.to_sort());

    if let Some(id) = args.expand {
        list.open(id.as_str());
        let modal = list
            .modal(&entities, &registry, &render_ctx)
            .ok_or(FolioError::NotFound {
                obj_type: "Card".to_string(),
                key: id,
            })?;
        return ctx.output.emit_json(&modal);
    }

    let cards = list.cards(&entities, &registry, &render_ctx);
    if ctx.output.format() == OutputFormat::Table {
        return ctx.output.emit_table(&cards);
    }
    ctx.output.emit_json(&cards)
}

/// Resolves a preview for one entity, then renders its descriptor.
pub async fn preview(ctx: &AppContext, args: &PreviewArgs) -> Result<()> {
    let snapshot = ctx.store.snapshot();
    let pool = snapshot.entities();
    let entity = pool
        .iter()
        .find(|entity| entity.id() == args.id)
        .ok_or_else(|| FolioError::NotFound {
            obj_type: "Entity".to_string(),
            key: args.id.clone(),
        })?;
    let registry = AdapterRegistry::default();
    let adapter = registry.for_entity(entity).ok_or_else(|| FolioError::Other {
        message: format!("no adapter for {}", entity.kind()),
    })?;

    let previews = PreviewResolver::new(ctx.client.clone(), ctx.client.get_config().preview_freshness);
    let entry = previews.request_for(entity, &registry).await;
    let preview_ctx = PreviewContext::new(previews.snapshot(), ctx.client.capture());
    let report = PreviewReport {
        id: entity.id(),
        kind: entity.kind(),
        entry,
        preview: adapter.preview_descriptor(entity, &preview_ctx),
    };
    ctx.output.emit_json(&report)
}
