//! `curator status`: scopes, content document and config at a glance.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use curator_core::{store, CuratorConfig, Persistence, ScopeFile};
use curator_sync::{defaults, ContentStore, Node};

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct StatusReport {
    scopes: Vec<ScopeStatus>,
    content: ContentStatus,
    debounce_ms: u64,
    reconcile_timeout_ms: u64,
}

#[derive(Debug, Serialize)]
struct ScopeStatus {
    scope: String,
    entities: usize,
    contiguous: bool,
    updated: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
enum ContentStatus {
    NeverSaved,
    Complete,
    NeedsBackfill { sections: Vec<String> },
    Unreadable { reason: String },
}

#[derive(Tabled)]
struct ScopeRow {
    #[tabled(rename = "scope")]
    scope: String,
    #[tabled(rename = "entities")]
    entities: usize,
    #[tabled(rename = "order")]
    order: String,
    #[tabled(rename = "updated")]
    updated: String,
}

impl StatusArgs {
    pub async fn run(self) -> Result<()> {
        let (persistence, cfg) = super::open_store()?;
        let report = build_report(persistence.home(), &*persistence, &cfg).await?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize status JSON")?
            );
            return Ok(());
        }
        print_report(report);
        Ok(())
    }
}

async fn build_report<P: Persistence>(
    home: &Path,
    persistence: &P,
    cfg: &CuratorConfig,
) -> Result<StatusReport> {
    let mut scopes = Vec::new();
    for scope in store::list_scopes_at(home).context("failed to list scopes")? {
        let file = store::load_scope_at(home, &scope)
            .with_context(|| format!("failed to load scope '{scope}'"))?;
        scopes.push(scope_status(&file));
    }

    let defaults = defaults::load(cfg.defaults_path.as_deref())
        .context("failed to load default content document")?;
    let content = match persistence.load_document().await {
        Ok(None) => ContentStatus::NeverSaved,
        Ok(Some(value)) => match ContentStore::new(Node::from(value), defaults) {
            Ok(mut preview) => match preview.merge_all_defaults() {
                sections if sections.is_empty() => ContentStatus::Complete,
                sections => ContentStatus::NeedsBackfill { sections },
            },
            Err(err) => ContentStatus::Unreadable {
                reason: err.to_string(),
            },
        },
        Err(err) => ContentStatus::Unreadable {
            reason: err.reason(),
        },
    };

    Ok(StatusReport {
        scopes,
        content,
        debounce_ms: cfg.debounce_ms,
        reconcile_timeout_ms: cfg.reconcile_timeout_ms,
    })
}

fn scope_status(file: &ScopeFile) -> ScopeStatus {
    let contiguous = file
        .entities
        .iter()
        .enumerate()
        .all(|(i, e)| e.order as usize == i + 1);
    ScopeStatus {
        scope: file.scope.to_string(),
        entities: file.entities.len(),
        contiguous,
        updated: format_age(file.updated_at),
    }
}

fn print_report(report: StatusReport) {
    println!(
        "Curator v{} | {} scopes | debounce {}ms | timeout {}ms",
        env!("CARGO_PKG_VERSION"),
        report.scopes.len(),
        report.debounce_ms,
        report.reconcile_timeout_ms,
    );

    if report.scopes.is_empty() {
        println!("No scopes yet. Run: curator add <scope> <id>");
    } else {
        let rows: Vec<ScopeRow> = report
            .scopes
            .into_iter()
            .map(|s| ScopeRow {
                scope: s.scope,
                entities: s.entities,
                order: if s.contiguous { "ok" } else { "gaps" }.to_string(),
                updated: s.updated,
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
    }

    match report.content {
        ContentStatus::NeverSaved => {
            println!("Content: {}", "never saved (defaults in use)".bright_black());
        }
        ContentStatus::Complete => println!("Content: {}", "complete".green()),
        ContentStatus::NeedsBackfill { sections } => {
            println!(
                "Content: {} {}",
                "needs backfill:".yellow(),
                sections.join(", ")
            );
            println!("Run 'curator content merge-defaults' to fill them in.");
        }
        ContentStatus::Unreadable { reason } => {
            println!("Content: {} {}", "unreadable:".red().bold(), reason);
        }
    }
}

fn format_age(timestamp: DateTime<Utc>) -> String {
    let seconds = Utc::now()
        .signed_duration_since(timestamp)
        .num_seconds()
        .max(0) as u64;
    if seconds < 60 {
        return format!("{seconds}s ago");
    }
    if seconds < 60 * 60 {
        return format!("{}m ago", seconds / 60);
    }
    if seconds < 60 * 60 * 24 {
        return format!("{}h ago", seconds / (60 * 60));
    }
    format!("{}d ago", seconds / (60 * 60 * 24))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use curator_core::{OrderableEntity, ScopeId};

    #[test]
    fn age_buckets() {
        assert_eq!(format_age(Utc::now()), "0s ago");
        assert_eq!(format_age(Utc::now() - Duration::minutes(5)), "5m ago");
        assert_eq!(format_age(Utc::now() - Duration::hours(3)), "3h ago");
        assert_eq!(format_age(Utc::now() - Duration::days(2)), "2d ago");
    }

    #[test]
    fn gaps_are_flagged() {
        let mut file = ScopeFile::empty(ScopeId::from("c"));
        file.entities = vec![OrderableEntity::new("a", "c", 1), OrderableEntity::new("b", "c", 3)];
        assert!(!scope_status(&file).contiguous);
        file.entities[1].order = 2;
        assert!(scope_status(&file).contiguous);
    }
}
