use anyhow::{Context, Result, bail};
use folio::error::FolioError;
use folio::store::Record;
use serde_json::Value;

use crate::cli::{AppContext, RecordArgs, RecordCommands, ensure_authenticated};
use crate::fields::build_patch;
use crate::output::{OutputFormat, TableRow};

/// Project, certificate, and manual skill commands share one implementation.
pub async fn handle<R>(ctx: &AppContext, args: RecordArgs) -> Result<()>
where
    R: Record + TableRow,
{
    match args.command {
        RecordCommands::List => {
            let snapshot = ctx.store.snapshot();
            let items = R::records(&snapshot);
            if ctx.output.format() == OutputFormat::Table {
                return ctx.output.emit_table(items);
            }
            ctx.output.emit_json(items)
        }
        RecordCommands::Get { id } => {
            let item = find::<R>(ctx, &id)?;
            ctx.output.emit_json(&item)
        }
        RecordCommands::Create { json } => {
            ensure_authenticated(&ctx.client)?;
            let record = parse_new::<R>(&json)?;
            let result = ctx.store.create(record).await;
            ctx.output.emit_mutation(&result)
        }
        RecordCommands::Update { id, fields } => {
            ensure_authenticated(&ctx.client)?;
            let current = serde_json::to_value(find::<R>(ctx, &id)?)?;
            let patch = build_patch(&fields, &current)?;
            let result = ctx.store.update::<R>(&id, patch).await;
            ctx.output.emit_mutation(&result)
        }
        RecordCommands::Delete { id } => {
            ensure_authenticated(&ctx.client)?;
            let result = ctx.store.delete::<R>(&id).await;
            ctx.output.emit_mutation(&result)
        }
        RecordCommands::Visible { id, visible } => {
            ensure_authenticated(&ctx.client)?;
            let result = ctx
                .store
                .update::<R>(&id, folio::patch! { "visible": visible })
                .await;
            ctx.output.emit_mutation(&result)
        }
    }
}

fn find<R: Record>(ctx: &AppContext, id: &str) -> Result<R> {
    ctx.store.record::<R>(id).ok_or_else(|| {
        FolioError::NotFound {
            obj_type: R::KIND.singular().to_string(),
            key: id.to_string(),
        }
        .into()
    })
}

/// Parses a new record from a json object. Records are visible unless the input says otherwise.
fn parse_new<R: Record>(json: &str) -> Result<R> {
    let mut value: Value = serde_json::from_str(json).context("record fields are not valid json")?;
    let Some(object) = value.as_object_mut() else {
        bail!("record fields must be a json object");
    };
    object.entry("visible").or_insert(Value::Bool(true));
    let record = serde_json::from_value(value)
        .with_context(|| format!("invalid {} fields", R::KIND.singular()))?;
    Ok(record)
}
