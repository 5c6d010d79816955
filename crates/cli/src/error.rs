use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
	#[error("failed to read config {path}")]
	ConfigRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("invalid config {path}")]
	ConfigParse {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},

	#[error("unsupported config schema {found} (this build reads up to {supported})")]
	UnsupportedSchema { found: u32, supported: u32 },

	#[error("resource '{name}' needs an endpoint or a discoveryUrl")]
	ResourceWithoutEndpoint { name: String },

	#[error("no targets configured")]
	NoTargets,

	#[error(transparent)]
	Webshell(#[from] webshell::Error),

	#[error(transparent)]
	Io(#[from] std::io::Error),
}
