use std::path::PathBuf;

use clap::Args;

use super::interrupt_flag;
use crate::config::{self, SquadConfig};
use crate::watcher;

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Path to clawe.toml
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl WatchArgs {
    /// Run the notification watcher until interrupted.
    pub fn execute(&self) -> anyhow::Result<()> {
        // Endpoints first: a misconfigured environment must fail before
        // anything else happens.
        config::Endpoints::for_watcher()?;

        let cwd = std::env::current_dir()?;
        let path = config::find_config(self.config.as_deref(), &cwd)?;
        match &path {
            Some(p) => tracing::info!(path = %p.display(), "loaded squad config"),
            None => tracing::info!("no clawe.toml found; using the default squad"),
        }
        let squad = SquadConfig::load_or_default(path.as_deref())?;

        let shutdown = interrupt_flag()?;
        watcher::run(&squad, &shutdown)
    }
}
