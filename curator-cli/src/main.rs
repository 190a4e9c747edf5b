//! Curator: ordered course content and site-content editing CLI.
//!
//! # Usage
//!
//! ```text
//! curator init
//! curator add <scope> <id> [field=value ...]
//! curator list <scope> [--json]
//! curator move <scope> <from> <to>
//! curator edit <entity> field=value [field=value ...]
//! curator content show [path]
//! curator content set <path> <value>
//! curator content merge-defaults [--dry-run]
//! curator content diff
//! curator content append <path> <record-json>
//! curator content remove <path> <id>
//! curator status [--json]
//! ```

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use commands::{
    add::AddArgs, content::ContentCommand, edit::EditArgs, init::InitArgs, list::ListArgs,
    reorder::MoveArgs, status::StatusArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "curator",
    version,
    about = "Reorder course content and edit site content against a local store",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create ~/.curator with a default config.
    Init(InitArgs),

    /// Append an entity to a scope.
    Add(AddArgs),

    /// Show a scope's entities in display order.
    List(ListArgs),

    /// Move an entity to a new position and reconcile the order.
    Move(MoveArgs),

    /// Edit an entity's fields through the debounced commit path.
    Edit(EditArgs),

    /// Inspect and edit the site-content document.
    Content {
        #[command(subcommand)]
        command: ContentCommand,
    },

    /// Summarize scopes, the content document and config.
    Status(StatusArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    tracing::debug!(command = ?cli.command, "dispatching");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Add(args) => args.run(),
        Commands::List(args) => args.run(),
        Commands::Move(args) => runtime.block_on(args.run()),
        Commands::Edit(args) => runtime.block_on(args.run()),
        Commands::Content { command } => runtime.block_on(commands::content::run(command)),
        Commands::Status(args) => runtime.block_on(args.run()),
    }
}

/// Logs go to stderr so stdout stays parseable.
fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
