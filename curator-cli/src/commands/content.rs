//! `curator content ...`: inspect and edit the site-content document.

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use serde_json::Value;

use curator_core::{CuratorConfig, FileStore, Persistence};
use curator_sync::{defaults, document_diff, parse_path, ContentStore, DocumentOrigin, Node};

#[derive(Subcommand, Debug)]
pub enum ContentCommand {
    /// Print the document (defaults backfilled), or the node at a path.
    Show(ShowArgs),

    /// Set the value at a dotted path.
    Set(SetArgs),

    /// Backfill every section from the defaults and save.
    MergeDefaults(MergeArgs),

    /// Show what backfilling would change in the stored document.
    Diff,

    /// Append a record to the sequence at a path.
    Append(AppendArgs),

    /// Remove the record with an id from the sequence at a path.
    Remove(RemoveArgs),
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Dotted path, e.g. `faq.faqs`.
    pub path: Option<String>,
}

#[derive(Args, Debug)]
pub struct SetArgs {
    /// Dotted path; sequence entries by index, e.g. `faq.faqs.0.question`.
    pub path: String,

    /// JSON value, or a plain string.
    pub value: String,
}

#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Print the diff without saving.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug)]
pub struct AppendArgs {
    /// Dotted path of the sequence, e.g. `gallery.images`.
    pub path: String,

    /// Record as a JSON object; its `id` is assigned.
    pub record: String,
}

#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Dotted path of the sequence.
    pub path: String,

    /// Record id.
    pub id: u64,
}

pub async fn run(cmd: ContentCommand) -> Result<()> {
    let (persistence, cfg) = super::open_store()?;
    match cmd {
        ContentCommand::Show(args) => show(&persistence, &cfg, args).await,
        ContentCommand::Set(args) => set(&persistence, &cfg, args).await,
        ContentCommand::MergeDefaults(args) => merge(&persistence, &cfg, args).await,
        ContentCommand::Diff => diff(&persistence, &cfg).await,
        ContentCommand::Append(args) => append(&persistence, &cfg, args).await,
        ContentCommand::Remove(args) => remove(&persistence, &cfg, args).await,
    }
}

async fn load(persistence: &FileStore, cfg: &CuratorConfig) -> Result<(ContentStore, DocumentOrigin)> {
    let defaults = defaults::load(cfg.defaults_path.as_deref())
        .context("failed to load default content document")?;
    let (store, origin) = ContentStore::load(persistence, defaults)
        .await
        .context("failed to load content document")?;
    if let DocumentOrigin::Recovered { reason } = &origin {
        eprintln!(
            "{} stored content unreadable ({reason}); using defaults",
            "warning:".yellow().bold()
        );
    }
    Ok((store, origin))
}

/// Load for an edit that will be saved. Never overwrite a stored document
/// that could not be read.
async fn load_for_edit(persistence: &FileStore, cfg: &CuratorConfig) -> Result<ContentStore> {
    let (store, origin) = load(persistence, cfg).await?;
    if let DocumentOrigin::Recovered { reason } = origin {
        bail!("refusing to overwrite unreadable content document: {reason}");
    }
    Ok(store)
}

async fn save(store: &mut ContentStore, persistence: &FileStore, cfg: &CuratorConfig) -> Result<()> {
    store
        .save(persistence, cfg.reconcile_timeout())
        .await
        .context("failed to save content document")
}

async fn show(persistence: &FileStore, cfg: &CuratorConfig, args: ShowArgs) -> Result<()> {
    let (store, _) = load(persistence, cfg).await?;
    let node = match &args.path {
        Some(path) => store
            .document()
            .get_path(&parse_path(path))
            .ok_or_else(|| anyhow!("no content at '{path}'"))?,
        None => store.document(),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&node.to_value()).context("failed to serialize content")?
    );
    Ok(())
}

async fn set(persistence: &FileStore, cfg: &CuratorConfig, args: SetArgs) -> Result<()> {
    let mut store = load_for_edit(persistence, cfg).await?;
    store
        .set_path(&parse_path(&args.path), Node::from(super::parse_value(&args.value)))
        .with_context(|| format!("cannot set '{}'", args.path))?;
    save(&mut store, persistence, cfg).await?;
    println!("✓ Set {}", args.path);
    Ok(())
}

async fn merge(persistence: &FileStore, cfg: &CuratorConfig, args: MergeArgs) -> Result<()> {
    // `load` already backfills; the interesting part is what that changed.
    let mut store = load_for_edit(persistence, cfg).await?;
    if !store.is_dirty() {
        println!("Content already complete.");
        return Ok(());
    }
    if args.dry_run {
        return print_backfill_diff(persistence, &store).await;
    }
    save(&mut store, persistence, cfg).await?;
    println!("✓ Content backfilled from defaults");
    Ok(())
}

async fn diff(persistence: &FileStore, cfg: &CuratorConfig) -> Result<()> {
    let (store, _) = load(persistence, cfg).await?;
    print_backfill_diff(persistence, &store).await
}

async fn print_backfill_diff(persistence: &FileStore, store: &ContentStore) -> Result<()> {
    let stored = persistence
        .load_document()
        .await
        .context("failed to read stored document")?
        .map(Node::from)
        .unwrap_or_else(Node::empty_map);
    match document_diff(&stored, store.document()).context("failed to diff content")? {
        Some(unified) => {
            print!("{unified}");
            if !unified.ends_with('\n') {
                println!();
            }
        }
        None => println!("No differences."),
    }
    Ok(())
}

async fn append(persistence: &FileStore, cfg: &CuratorConfig, args: AppendArgs) -> Result<()> {
    let record: Value = serde_json::from_str(&args.record)
        .with_context(|| format!("record is not valid JSON: {}", args.record))?;
    if !record.is_object() {
        bail!("record must be a JSON object");
    }

    let mut store = load_for_edit(persistence, cfg).await?;
    let id = store
        .append_record(&parse_path(&args.path), |_| Node::from(record))
        .with_context(|| format!("cannot append to '{}'", args.path))?;
    save(&mut store, persistence, cfg).await?;
    println!("✓ Appended record {id} to {}", args.path);
    Ok(())
}

async fn remove(persistence: &FileStore, cfg: &CuratorConfig, args: RemoveArgs) -> Result<()> {
    let mut store = load_for_edit(persistence, cfg).await?;
    let removed = store
        .remove_record(&parse_path(&args.path), args.id)
        .with_context(|| format!("cannot remove from '{}'", args.path))?;
    if !removed {
        bail!("no record with id {} in '{}'", args.id, args.path);
    }
    save(&mut store, persistence, cfg).await?;
    println!("✓ Removed record {} from {}", args.id, args.path);
    Ok(())
}
