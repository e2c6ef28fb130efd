use anyhow::Result;
use folio::prelude::*;
use serde::Serialize;

use crate::cli::{AppContext, ModeArg, SkillOverrideArgs, SkillOverrideCommands, SkillsArgs, ensure_authenticated};
use crate::output::OutputFormat;

/// Skill with its resolved visibility
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillRow {
    #[serde(flatten)]
    pub skill: Skill,
    /// Visibility after overrides
    pub effective_visible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_action: Option<SourceAction>,
}

pub fn skill_rows(skills: Vec<Skill>, resolver: &VisibilityResolver, mode: ModeArg) -> Vec<SkillRow> {
    skills
        .into_iter()
        .map(|skill| SkillRow {
            effective_visible: resolver.skill_visible(&skill),
            source_action: skill
                .source_key()
                .and_then(|key| resolver.maps().source(&key)),
            skill,
        })
        .filter(|row| mode == ModeArg::Admin || row.effective_visible)
        .collect()
}

pub fn list(ctx: &AppContext, args: &SkillsArgs) -> Result<()> {
    let snapshot = ctx.store.snapshot();
    let resolver = ctx.store.visibility_resolver();
    let rows = skill_rows(snapshot.all_skills(), &resolver, args.mode);
    if ctx.output.format() == OutputFormat::Table {
        return ctx.output.emit_table(&rows);
    }
    ctx.output.emit_json(&rows)
}

pub async fn handle_override(ctx: &AppContext, args: SkillOverrideArgs) -> Result<()> {
    ensure_authenticated(&ctx.client)?;
    let result = match args.command {
        SkillOverrideCommands::Hide(key) => ctx.store.hide_derived_skill(key.to_key()).await,
        SkillOverrideCommands::Show(key) => ctx.store.show_derived_skill(key.to_key()).await,
        SkillOverrideCommands::Restore(key) => ctx.store.restore_derived_skill(key.to_key()).await,
        SkillOverrideCommands::Delete(key) => ctx.store.delete_derived_skill(key.to_key()).await,
    };
    ctx.output.emit_mutation(&result)
}
