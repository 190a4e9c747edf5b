//! `curator list <scope>`

use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;
use tabled::{settings::Style, Table, Tabled};

use curator_core::{store, OrderableEntity, ScopeId};

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Scope to list.
    pub scope: String,

    /// Emit the entities as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct EntityRow {
    #[tabled(rename = "#")]
    order: u32,
    #[tabled(rename = "id")]
    id: String,
    #[tabled(rename = "title")]
    title: String,
    #[tabled(rename = "fields")]
    fields: usize,
}

impl ListArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home()?;
        let scope = ScopeId::from(self.scope);
        let file = store::load_scope_at(&home, &scope)
            .with_context(|| format!("failed to load scope '{scope}'"))?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&file.entities)
                    .context("failed to serialize entities")?
            );
            return Ok(());
        }

        if file.entities.is_empty() {
            println!("Scope '{scope}' is empty.");
            return Ok(());
        }

        let rows: Vec<EntityRow> = file.entities.iter().map(row).collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        Ok(())
    }
}

fn row(entity: &OrderableEntity) -> EntityRow {
    let title = match entity.fields.get("title") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    };
    EntityRow {
        order: entity.order,
        id: entity.id.to_string(),
        title,
        fields: entity.fields.len(),
    }
}
