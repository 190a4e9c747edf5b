//! `curator init`

use anyhow::{Context, Result};
use clap::Args;

use curator_core::{config, store};

/// Create ~/.curator and a default config.yaml.
#[derive(Args, Debug)]
pub struct InitArgs {}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home()?;
        let written = config::init_at(&home).context("failed to write config")?;
        std::fs::create_dir_all(store::scopes_dir(&home)).with_context(|| {
            format!("failed to create {}", store::scopes_dir(&home).display())
        })?;

        if written {
            println!("✓ Initialized {}", store::curator_root(&home).display());
            println!("  Config: {}", config::config_path_at(&home).display());
        } else {
            println!(
                "Already initialized: {}",
                config::config_path_at(&home).display()
            );
        }
        Ok(())
    }
}
