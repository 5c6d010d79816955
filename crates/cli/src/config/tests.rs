use std::path::{Path, PathBuf};

use tempfile::TempDir;

use super::*;

const SAMPLE: &str = r##"{
  "schema": 1,
  "selected": "host-a",
  "resources": [
    { "name": "host-a", "endpoint": "wss://host-a/shell" },
    { "name": "host-b", "discoveryUrl": "https://api.example/host-b/shell" }
  ],
  "settings": { "theme": { "name": "dark", "background": "#101010" }, "fontSize": 16 }
}"##;

#[test]
fn flag_wins_over_env_and_default() {
	let resolved = ConfigPath::resolve_from(
		Some(Path::new("/tmp/flag.json")),
		Some("/tmp/env.json".into()),
		Some(PathBuf::from("/home/u/.config")),
	);
	assert_eq!(resolved, Some(ConfigPath::Explicit(PathBuf::from("/tmp/flag.json"))));
}

#[test]
fn env_wins_over_default() {
	let resolved = ConfigPath::resolve_from(None, Some("/tmp/env.json".into()), Some(PathBuf::from("/home/u/.config")));
	assert_eq!(resolved, Some(ConfigPath::Explicit(PathBuf::from("/tmp/env.json"))));
}

#[test]
fn empty_env_falls_through_to_default() {
	let resolved = ConfigPath::resolve_from(None, Some("".into()), Some(PathBuf::from("/home/u/.config")));
	assert_eq!(
		resolved,
		Some(ConfigPath::Default(PathBuf::from("/home/u/.config/webshell/config.json")))
	);
}

#[test]
fn parses_sample_config() {
	let config = WebshellConfig::parse(SAMPLE).unwrap();

	assert_eq!(config.selected.as_deref(), Some("host-a"));
	assert_eq!(config.resources.len(), 2);
	assert_eq!(config.resources[1].discovery_url.as_deref(), Some("https://api.example/host-b/shell"));
	assert_eq!(config.settings.theme.name, "dark");
	assert_eq!(config.settings.theme.background.as_deref(), Some("#101010"));
	assert_eq!(config.settings.font_size, 16);
}

#[test]
fn missing_fields_take_defaults() {
	let config = WebshellConfig::parse("{}").unwrap();
	assert_eq!(config, WebshellConfig::default());
	assert_eq!(config.settings.font_size, webshell::DEFAULT_FONT_SIZE);
}

#[test]
fn newer_schema_is_rejected() {
	let err = WebshellConfig::parse(r#"{"schema": 99}"#).unwrap_err();
	assert!(matches!(err, CliError::UnsupportedSchema { found: 99, .. }));
}

#[test]
fn resource_needs_a_way_to_find_its_endpoint() {
	let err = WebshellConfig::parse(r#"{"resources": [{"name": "bare"}]}"#).unwrap_err();
	assert!(matches!(err, CliError::ResourceWithoutEndpoint { ref name } if name == "bare"));
}

#[test]
fn catalog_applies_selection_and_sources() {
	let config = WebshellConfig::parse(SAMPLE).unwrap();
	let catalog = config.catalog().unwrap();

	assert_eq!(catalog.names(), vec!["host-a", "host-b"]);
	assert_eq!(catalog.selected().unwrap().name(), "host-a");
	assert_eq!(catalog.find("host-a").unwrap().cached_endpoint().as_deref(), Some("wss://host-a/shell"));
	let host_b = catalog.find("host-b").unwrap();
	assert_eq!(host_b.cached_endpoint(), None);
	assert!(matches!(host_b.source(), EndpointSource::Discovery { url } if url == "https://api.example/host-b/shell"));
}

#[test]
fn unknown_selection_is_an_error() {
	let config = WebshellConfig::parse(r#"{"selected": "ghost", "resources": [{"name": "a", "endpoint": "tcp://a:1"}]}"#).unwrap();
	let err = config.catalog().unwrap_err();
	assert!(matches!(err, CliError::Webshell(webshell::Error::UnknownTarget(ref n)) if n == "ghost"));
}

#[test]
fn settings_store_reflects_config() {
	let config = WebshellConfig::parse(SAMPLE).unwrap();
	let settings = config.settings_store();
	assert_eq!(settings.font_size(), 16);
	assert_eq!(settings.theme().name, "dark");
}

#[test]
fn load_missing_default_is_empty() {
	let dir = TempDir::new().unwrap();
	let path = ConfigPath::Default(dir.path().join("webshell/config.json"));
	assert_eq!(WebshellConfig::load(&path).unwrap(), WebshellConfig::default());
}

#[test]
fn load_missing_explicit_fails() {
	let dir = TempDir::new().unwrap();
	let path = ConfigPath::Explicit(dir.path().join("nope.json"));
	assert!(matches!(WebshellConfig::load(&path), Err(CliError::ConfigRead { .. })));
}

#[test]
fn load_reports_parse_errors_with_path() {
	let dir = TempDir::new().unwrap();
	let file = dir.path().join("config.json");
	std::fs::write(&file, "{ not json").unwrap();

	let err = WebshellConfig::load(&ConfigPath::Explicit(file.clone())).unwrap_err();
	assert!(matches!(err, CliError::ConfigParse { ref path, .. } if *path == file));
}

#[test]
fn load_reads_file() {
	let dir = TempDir::new().unwrap();
	let file = dir.path().join("config.json");
	std::fs::write(&file, SAMPLE).unwrap();

	let config = WebshellConfig::load(&ConfigPath::Default(file)).unwrap();
	assert_eq!(config.resources[0].name, "host-a");
}
