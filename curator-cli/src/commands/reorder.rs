//! `curator move <scope> <from> <to>`

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use curator_core::ScopeId;
use curator_sync::{OrderedCollection, ReconcileOutcome};

/// Positions are 1-based, as shown by `curator list`.
#[derive(Args, Debug)]
pub struct MoveArgs {
    pub scope: String,

    /// Current position of the entity.
    pub from: usize,

    /// Position to move it to.
    pub to: usize,
}

impl MoveArgs {
    pub async fn run(self) -> Result<()> {
        let (persistence, cfg) = super::open_store()?;
        let scope = ScopeId::from(self.scope);
        let from = super::position_index(self.from)?;
        let to = super::position_index(self.to)?;

        let collection =
            OrderedCollection::open(persistence, scope.clone(), cfg.reconcile_timeout())
                .await
                .with_context(|| format!("failed to load scope '{scope}'"))?;

        let len = collection.sequence().len();
        if from >= len || to >= len {
            bail!("positions must be between 1 and {len} for scope '{scope}'");
        }

        let Some(pending) = collection.move_entity(from, Some(to)) else {
            println!("Nothing to move.");
            return Ok(());
        };

        match pending.outcome().await {
            ReconcileOutcome::Confirmed { .. } => {
                println!("{} Moved {} → {} in '{}'", "✓".green(), self.from, self.to, scope);
                for entity in collection.sequence() {
                    println!("  {}. {}", entity.order, entity.id);
                }
                Ok(())
            }
            ReconcileOutcome::Reverted { error, .. } | ReconcileOutcome::Discarded { error, .. } => {
                println!("{} Move reverted: {}", "✗".red(), error);
                bail!("reorder of '{scope}' failed: {error}")
            }
            ReconcileOutcome::Superseded { .. } => bail!("move superseded by an earlier failure"),
        }
    }
}
