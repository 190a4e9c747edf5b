//! `curator add <scope> <id> [field=value ...]`

use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;

use curator_core::{store, EntityId, ScopeId};

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Parent scope (course or chapter id). Created when missing.
    pub scope: String,

    /// New entity id, unique within the scope.
    pub id: String,

    /// Initial fields as key=value.
    #[arg(value_parser = super::parse_field)]
    pub fields: Vec<(String, Value)>,
}

impl AddArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home()?;
        let scope = ScopeId::from(self.scope);
        let entity = store::add_entity_at(
            &home,
            &scope,
            EntityId::from(self.id),
            super::into_snapshot(self.fields),
        )
        .with_context(|| format!("failed to add entity to '{scope}'"))?;

        println!(
            "✓ Added '{}' to '{}' at position {}",
            entity.id, scope, entity.order
        );
        Ok(())
    }
}
