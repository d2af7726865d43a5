use std::fs;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::config::{self, CONFIG_TOML, SquadConfig};
use crate::error::ExitError;

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Write to ~/.config/clawe/clawe.toml instead of ./clawe.toml
    #[arg(long)]
    pub global: bool,
    /// Overwrite an existing file without asking
    #[arg(long)]
    pub force: bool,
    /// Directory to write into (default: current directory)
    #[arg(long, conflicts_with = "global")]
    pub dir: Option<PathBuf>,
}

impl InitArgs {
    pub fn execute(&self) -> Result<()> {
        let path = self.target()?;

        if path.exists() && !self.force {
            let overwrite = std::io::stdin().is_terminal()
                && dialoguer::Confirm::new()
                    .with_prompt(format!("{} exists. Overwrite?", path.display()))
                    .default(false)
                    .interact()
                    .context("reading user confirmation")?;
            if !overwrite {
                return Err(ExitError::new(
                    1,
                    format!("{} already exists (use --force to overwrite)", path.display()),
                )
                .into());
            }
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let contents = SquadConfig::default().to_toml()?;
        fs::write(&path, contents).with_context(|| format!("writing {}", path.display()))?;

        tracing::info!(path = %path.display(), "wrote squad config");
        println!("✅ Wrote {}", path.display());
        Ok(())
    }

    fn target(&self) -> Result<PathBuf> {
        if self.global {
            return config::global_config_path()
                .ok_or_else(|| ExitError::Config("no config directory on this platform".into()).into());
        }
        let dir = match &self.dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()?,
        };
        Ok(dir.join(CONFIG_TOML))
    }
}
