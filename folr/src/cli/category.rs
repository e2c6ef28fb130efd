use anyhow::Result;
use folio::prelude::*;
use folio::visibility::{
    clear_category_override, clear_item_override, hide_all_in_category, set_category_override,
    set_item_override, show_all_in_category,
};
use serde::Serialize;

use crate::cli::{AppContext, CategoryArgs, CategoryCommands};

#[derive(Debug, Serialize)]
struct BulkChange<'a> {
    category: &'a str,
    visible: bool,
    changed: usize,
}

/// Override changes are local to the override file and need no token.
pub fn handle(ctx: &AppContext, args: CategoryArgs) -> Result<()> {
    let store: &dyn VisibilityOverrideStore = ctx.store.overrides().as_ref();
    match args.command {
        CategoryCommands::List => {
            let maps = store.get();
            ctx.output.emit_json(&*maps)
        }
        CategoryCommands::HideAll { category } => {
            let snapshot = ctx.store.snapshot();
            let (entities, skills) = (snapshot.entities(), snapshot.all_skills());
            let changed = hide_all_in_category(store, &category, subjects(&entities, &skills))?;
            ctx.output.emit_json(&BulkChange {
                category: &category,
                visible: false,
                changed,
            })
        }
        CategoryCommands::ShowAll { category } => {
            let snapshot = ctx.store.snapshot();
            let (entities, skills) = (snapshot.entities(), snapshot.all_skills());
            let changed = show_all_in_category(store, &category, subjects(&entities, &skills))?;
            ctx.output.emit_json(&BulkChange {
                category: &category,
                visible: true,
                changed,
            })
        }
        CategoryCommands::Set { category, visible } => {
            set_category_override(store, &category, visible)?;
            ctx.output.emit_json(&*store.get())
        }
        CategoryCommands::Clear { category } => {
            clear_category_override(store, &category)?;
            ctx.output.emit_json(&*store.get())
        }
        CategoryCommands::SetItem { id, visible } => {
            set_item_override(store, &id, visible)?;
            ctx.output.emit_json(&*store.get())
        }
        CategoryCommands::ClearItem { id } => {
            clear_item_override(store, &id)?;
            ctx.output.emit_json(&*store.get())
        }
    }
}

// entities and skills, manual and derived
fn subjects<'a>(
    entities: &'a [Entity],
    skills: &'a [Skill],
) -> impl Iterator<Item = VisibilitySubject<'a>> {
    entities
        .iter()
        .map(VisibilitySubject::from)
        .chain(skills.iter().map(VisibilitySubject::from))
}
