/*
 * folr - admin cli for folio portfolio content
 * github.com/stevelr/folio
 *
 * SPDX-FileCopyrightText: 2025-2026 Steve Schoettler
 * SPDX-License-Identifier: Apache-2.0
 */
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use folio::prelude::*;
use tracing::warn;

use crate::output::{Output, OutputFormat};

pub mod category;
pub mod content;
pub mod records;
pub mod site;
pub mod skills;

#[derive(Parser, Debug)]
#[command(name = "folr")]
#[command(author, version, about = "folr: list, render, and edit portfolio content", long_about = None)]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// API endpoint URL. Default: environment `FOLIO_URL` or <http://127.0.0.1:3000>
    #[arg(short = 'u', long, env = "FOLIO_URL")]
    pub url: Option<String>,

    /// Admin bearer token, required for changes
    #[arg(long, env = "FOLIO_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Visibility override file (category and item overrides)
    #[arg(long, value_name = "FILE", env = "FOLIO_OVERRIDES")]
    pub overrides: Option<PathBuf>,

    /// Write output to file (default: stdout)
    #[arg(short = 'o', long, value_name = "FILE", global = true)]
    pub output: Option<PathBuf>,

    /// JSON output (default)
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Table output format
    #[arg(short, long, global = true)]
    pub table: bool,

    /// Quiet mode - suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (repeat for more: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global=true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List content cards
    #[command(alias = "cards")]
    Content(ContentArgs),

    /// Project list and CRUD operations
    #[command(alias = "projects")]
    Project(RecordArgs),

    /// Certificate list and CRUD operations
    #[command(alias = "certificates")]
    Certificate(RecordArgs),

    /// Manual skill list and CRUD operations
    Skill(RecordArgs),

    /// Manual and derived skills with effective visibility
    Skills(SkillsArgs),

    /// Hide, show, restore, or delete a derived skill
    SkillOverride(SkillOverrideArgs),

    /// Category and item visibility overrides
    #[command(alias = "categories")]
    Category(CategoryArgs),

    /// Resolve the preview image for a project or repository
    Preview(PreviewArgs),

    /// Show or update the about section
    About(SiteArgs),

    /// Show or update site configuration
    Config(SiteArgs),
}

#[derive(Args, Debug)]
pub struct ContentArgs {
    /// Rendering mode
    #[arg(long, value_enum, default_value_t = ModeArg::Home)]
    pub mode: ModeArg,

    /// Limit to one entity kind
    #[arg(long, value_enum)]
    pub kind: Option<KindArg>,

    /// Category or subcategory filter ("all" for everything)
    #[arg(long, default_value = "all")]
    pub facet: String,

    /// Sort order
    #[arg(long, value_enum, default_value_t = SortArg::Order)]
    pub sort: SortArg,

    /// Show the detail view (card and linked items) for one id
    #[arg(long, value_name = "ID")]
    pub expand: Option<String>,

    /// Resolve screenshot previews before rendering
    #[arg(long)]
    pub previews: bool,
}

#[derive(Args, Debug)]
pub struct RecordArgs {
    #[command(subcommand)]
    pub command: RecordCommands,
}

#[derive(Subcommand, Debug)]
pub enum RecordCommands {
    List,
    Get {
        /// record id
        id: String,
    },
    Create {
        /// record fields as a json object
        #[arg(value_name = "JSON")]
        json: String,
    },
    Update {
        /// record id
        id: String,

        /// Set field (format: key=value, key+=item, key-=item)
        #[arg(short = 's', long = "set", value_name = "KEY=VALUE", required = true)]
        fields: Vec<String>,
    },
    Delete {
        /// record id
        id: String,
    },
    /// Set stored visibility
    Visible {
        /// record id
        id: String,

        #[arg(action = clap::ArgAction::Set)]
        visible: bool,
    },
}

#[derive(Args, Debug)]
pub struct SkillsArgs {
    /// Rendering mode: home lists visible skills only
    #[arg(long, value_enum, default_value_t = ModeArg::Admin)]
    pub mode: ModeArg,
}

#[derive(Args, Debug)]
pub struct SkillOverrideArgs {
    #[command(subcommand)]
    pub command: SkillOverrideCommands,
}

#[derive(Args, Debug)]
pub struct SourceKeyArgs {
    /// skill name as it appears on the source entity
    pub name: String,

    /// entity kind the skill comes from
    #[arg(long, value_enum)]
    pub source: SourceArg,

    /// id of the project or certificate
    #[arg(long)]
    pub source_id: String,
}

#[derive(Subcommand, Debug)]
pub enum SkillOverrideCommands {
    Hide(SourceKeyArgs),
    Show(SourceKeyArgs),
    /// Remove any override
    Restore(SourceKeyArgs),
    /// Remove the mention from its source entity
    Delete(SourceKeyArgs),
}

#[derive(Args, Debug)]
pub struct CategoryArgs {
    #[command(subcommand)]
    pub command: CategoryCommands,
}

#[derive(Subcommand, Debug)]
pub enum CategoryCommands {
    /// List category and item overrides
    List,
    /// Hide every item in a category (item overrides)
    HideAll { category: String },
    /// Show every item in a category (item overrides)
    ShowAll { category: String },
    /// Set the category override
    Set {
        category: String,

        #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
        visible: bool,
    },
    /// Clear the category override
    Clear { category: String },
    /// Set an item override
    SetItem {
        id: String,

        #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
        visible: bool,
    },
    /// Clear an item override
    ClearItem { id: String },
}

#[derive(Args, Debug)]
pub struct PreviewArgs {
    /// project or repository id
    pub id: String,
}

#[derive(Args, Debug)]
pub struct SiteArgs {
    /// Set field (format: key=value)
    #[arg(short = 's', long = "set", value_name = "KEY=VALUE")]
    pub fields: Vec<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeArg {
    Home,
    Admin,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum KindArg {
    Project,
    Certificate,
    Repository,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortArg {
    Order,
    Title,
    Newest,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceArg {
    Project,
    Certificate,
}

pub struct AppContext {
    pub client: Arc<FolioClient>,
    pub store: ContentStore,
    pub output: Output,
}

pub async fn run(cli: Cli) -> Result<()> {
    let output = Output::new(resolve_output_format(&cli), cli.output.clone());
    let client = Arc::new(build_client(&cli)?);
    let overrides = build_override_store(&cli)?;
    let store = ContentStore::new(client.clone(), overrides)
        .with_limits(client.get_config().get_limits().clone());
    store.refresh().await?;

    let ctx = AppContext {
        client,
        store,
        output,
    };

    match cli.command {
        Commands::Content(args) => content::handle(&ctx, args).await,
        Commands::Project(args) => records::handle::<Project>(&ctx, args).await,
        Commands::Certificate(args) => records::handle::<Certificate>(&ctx, args).await,
        Commands::Skill(args) => records::handle::<Skill>(&ctx, args).await,
        Commands::Skills(args) => skills::list(&ctx, &args),
        Commands::SkillOverride(args) => skills::handle_override(&ctx, args).await,
        Commands::Category(args) => category::handle(&ctx, args),
        Commands::Preview(args) => content::preview(&ctx, &args).await,
        Commands::About(args) => site::about(&ctx, &args).await,
        Commands::Config(args) => site::configuration(&ctx, &args).await,
    }
}

/// Changes need a token; reads do not.
pub fn ensure_authenticated(client: &FolioClient) -> Result<()> {
    if !client.has_token() {
        bail!("this command changes content and needs an admin token. Use --token or set FOLIO_TOKEN");
    }
    Ok(())
}

fn resolve_output_format(cli: &Cli) -> OutputFormat {
    if cli.quiet {
        OutputFormat::Quiet
    } else if cli.pretty {
        if cli.table {
            warn!("--pretty conflicts with --table. Using json pretty format");
        }
        OutputFormat::Pretty
    } else if cli.json {
        if cli.table {
            warn!("--json conflicts with --table. Using json format");
        }
        OutputFormat::Json
    } else if cli.table {
        OutputFormat::Table
    } else {
        OutputFormat::Json
    }
}

fn build_client(cli: &Cli) -> Result<FolioClient> {
    let mut config = ClientConfig::default();
    if let Some(url) = cli.url.as_deref() {
        config = config.base_url(url);
    }
    if let Some(token) = cli.token.as_deref() {
        config = config.token(SecretToken::new(token));
    }
    Ok(FolioClient::with_config(config)?)
}

fn build_override_store(cli: &Cli) -> Result<Arc<dyn VisibilityOverrideStore>> {
    Ok(match &cli.overrides {
        Some(path) => Arc::new(FileOverrideStore::open(path)?),
        None => Arc::new(InMemoryOverrideStore::default()),
    })
}

impl ModeArg {
    pub fn to_mode(self) -> Mode {
        match self {
            Self::Home => Mode::Home,
            Self::Admin => Mode::Admin,
        }
    }
}

impl KindArg {
    pub fn to_kind(self) -> EntityKind {
        match self {
            Self::Project => EntityKind::Project,
            Self::Certificate => EntityKind::Certificate,
            Self::Repository => EntityKind::Repository,
        }
    }
}

impl SortArg {
    pub fn to_sort(self) -> SortKey {
        match self {
            Self::Order => SortKey::Order,
            Self::Title => SortKey::Title,
            Self::Newest => SortKey::Newest,
        }
    }
}

impl SourceArg {
    pub fn to_source(self) -> SkillSource {
        match self {
            Self::Project => SkillSource::Project,
            Self::Certificate => SkillSource::Certificate,
        }
    }
}

impl SourceKeyArgs {
    pub fn to_key(&self) -> SourceKey {
        SourceKey::new(&self.name, self.source.to_source(), &self.source_id)
    }
}
