mod open;
mod targets;

use std::sync::Arc;

use tracing::debug;
use webshell::SessionDirectory;

use crate::cli::{Cli, Commands};
use crate::config::{ConfigPath, WebshellConfig};
use crate::error::Result;

pub use open::{OpenOutcome, run_open};
pub use targets::{TargetRow, target_rows};

pub async fn dispatch(cli: Cli) -> Result<()> {
	let config = match ConfigPath::resolve(cli.config.as_deref()) {
		Some(path) => WebshellConfig::load(&path)?,
		None => {
			debug!(target = "webshell.config", "no config location, using defaults");
			WebshellConfig::default()
		}
	};

	match cli.command {
		Commands::Targets => targets::run(&config),
		Commands::Open(args) => {
			let directory = SessionDirectory::new(Arc::new(config.catalog()?), Arc::new(config.settings_store()));
			run_open(&directory, &args, tokio::io::stdin(), tokio::io::stdout()).await?;
			Ok(())
		}
	}
}
