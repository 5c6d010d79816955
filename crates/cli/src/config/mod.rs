//! JSON configuration: known targets, the default selection, and display settings.
//!
//! Looked up in order: `--config`, `$WEBSHELL_CONFIG`, then
//! `$XDG_CONFIG_HOME/webshell/config.json` (falling back to `~/.config`).
//! A missing default file is an empty config; a missing explicit file is an error.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;
use webshell::{EndpointSource, ResourceCatalog, ResourceDescriptor, SettingsStore, Theme};

use crate::error::{CliError, Result};

#[cfg(test)]
mod tests;

pub const SCHEMA_VERSION: u32 = 1;
pub const CONFIG_ENV: &str = "WEBSHELL_CONFIG";
const CONFIG_FILE: &str = "webshell/config.json";

/// Where a config path came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigPath {
	/// Named on the command line or in the environment; must exist.
	Explicit(PathBuf),
	/// The per-user default; may be absent.
	Default(PathBuf),
}

impl ConfigPath {
	pub fn path(&self) -> &Path {
		match self {
			ConfigPath::Explicit(path) | ConfigPath::Default(path) => path,
		}
	}

	/// Resolves from the flag, the environment, and the user's config directory.
	pub fn resolve(flag: Option<&Path>) -> Option<Self> {
		let config_home = std::env::var_os("XDG_CONFIG_HOME")
			.map(PathBuf::from)
			.or_else(|| dirs::home_dir().map(|h| h.join(".config")));
		Self::resolve_from(flag, std::env::var_os(CONFIG_ENV), config_home)
	}

	pub fn resolve_from(flag: Option<&Path>, env: Option<OsString>, config_home: Option<PathBuf>) -> Option<Self> {
		if let Some(path) = flag {
			return Some(ConfigPath::Explicit(path.to_path_buf()));
		}
		if let Some(path) = env.filter(|p| !p.is_empty()) {
			return Some(ConfigPath::Explicit(PathBuf::from(path)));
		}
		config_home.map(|home| ConfigPath::Default(home.join(CONFIG_FILE)))
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebshellConfig {
	pub schema: u32,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub selected: Option<String>,
	pub resources: Vec<ResourceConfig>,
	pub settings: SettingsConfig,
}

impl Default for WebshellConfig {
	fn default() -> Self {
		Self {
			schema: SCHEMA_VERSION,
			selected: None,
			resources: Vec::new(),
			settings: SettingsConfig::default(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceConfig {
	pub name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub endpoint: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub discovery_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsConfig {
	pub theme: Theme,
	pub font_size: u16,
}

impl Default for SettingsConfig {
	fn default() -> Self {
		Self {
			theme: Theme::default(),
			font_size: webshell::DEFAULT_FONT_SIZE,
		}
	}
}

impl WebshellConfig {
	/// Loads the config at `path`, treating an absent default file as empty.
	pub fn load(path: &ConfigPath) -> Result<Self> {
		let file = path.path();
		let contents = match fs::read_to_string(file) {
			Ok(contents) => contents,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound && matches!(path, ConfigPath::Default(_)) => {
				debug!(target = "webshell.config", path = %file.display(), "no config file, using defaults");
				return Ok(Self::default());
			}
			Err(source) => {
				return Err(CliError::ConfigRead {
					path: file.to_path_buf(),
					source,
				});
			}
		};

		let config = Self::parse(&contents).map_err(|e| match e {
			CliError::ConfigParse { source, .. } => CliError::ConfigParse {
				path: file.to_path_buf(),
				source,
			},
			other => other,
		})?;
		debug!(target = "webshell.config", path = %file.display(), resources = config.resources.len(), "config loaded");
		Ok(config)
	}

	pub fn parse(contents: &str) -> Result<Self> {
		let config: Self = serde_json::from_str(contents).map_err(|source| CliError::ConfigParse {
			path: PathBuf::new(),
			source,
		})?;
		config.validate()?;
		Ok(config)
	}

	fn validate(&self) -> Result<()> {
		if self.schema > SCHEMA_VERSION {
			return Err(CliError::UnsupportedSchema {
				found: self.schema,
				supported: SCHEMA_VERSION,
			});
		}
		if let Some(resource) = self.resources.iter().find(|r| r.endpoint.is_none() && r.discovery_url.is_none()) {
			return Err(CliError::ResourceWithoutEndpoint {
				name: resource.name.clone(),
			});
		}
		Ok(())
	}

	/// Builds the catalog, applying the configured selection.
	pub fn catalog(&self) -> Result<ResourceCatalog> {
		let catalog = ResourceCatalog::new();
		for resource in &self.resources {
			catalog.insert(resource.descriptor());
		}
		if let Some(selected) = &self.selected {
			catalog.select(selected)?;
		}
		Ok(catalog)
	}

	pub fn settings_store(&self) -> SettingsStore {
		SettingsStore::new(self.settings.theme.clone(), self.settings.font_size)
	}
}

impl ResourceConfig {
	/// A known endpoint is used as-is; discovery only runs without one.
	pub fn descriptor(&self) -> ResourceDescriptor {
		let source = match &self.discovery_url {
			Some(url) => EndpointSource::Discovery { url: url.clone() },
			None => EndpointSource::Fixed,
		};
		ResourceDescriptor::new(self.name.clone(), source, self.endpoint.clone())
	}
}
