//! `curator edit <entity> field=value ...`
//!
//! Each field is applied like a form field losing focus; the scheduler
//! coalesces them into a single `update` after the debounce delay.

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use serde_json::Value;

use curator_core::{store, EntityId};
use curator_sync::{BlurOutcome, CommitScheduler};

#[derive(Args, Debug)]
pub struct EditArgs {
    /// Entity id, in any scope.
    pub entity: String,

    /// Field values as key=value.
    #[arg(required = true, value_parser = super::parse_field)]
    pub fields: Vec<(String, Value)>,
}

impl EditArgs {
    pub async fn run(self) -> Result<()> {
        let (persistence, cfg) = super::open_store()?;
        let id = EntityId::from(self.entity);
        let entity = store::find_entity_at(persistence.home(), &id)
            .with_context(|| format!("failed to load entity '{id}'"))?;

        let mut form = entity.fields.clone();
        let mut scheduler =
            CommitScheduler::new(id.clone(), entity.fields, persistence, cfg.debounce());
        let mut outcome = BlurOutcome::Unchanged;
        for (key, value) in self.fields {
            form.insert(key, value);
            outcome = scheduler.on_field_blur(&form);
        }

        if outcome == BlurOutcome::Unchanged {
            println!("No changes for '{id}'.");
            return Ok(());
        }

        let reports = scheduler.settle().await;
        if let Some(error) = reports.iter().find_map(|r| r.result.as_ref().err()) {
            println!("{} Update rejected: {}", "✗".red(), error);
            bail!("update of '{id}' failed: {error}");
        }
        let Some(report) = reports.last() else {
            bail!("commit for '{id}' did not run");
        };
        println!(
            "{} Updated '{}' ({} fields)",
            "✓".green(),
            report.entity,
            report.snapshot.len()
        );
        Ok(())
    }
}
