//! `webshell targets`: list configured targets.

use colored::Colorize;
use webshell::{EndpointSource, ResourceCatalog};

use crate::config::WebshellConfig;
use crate::error::Result;

/// One line of `targets` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetRow {
	pub name: String,
	pub selected: bool,
	pub location: String,
}

pub fn target_rows(catalog: &ResourceCatalog) -> Vec<TargetRow> {
	let selected = catalog.selected();
	catalog
		.resources()
		.iter()
		.map(|resource| {
			let location = match (resource.cached_endpoint(), resource.source()) {
				(Some(endpoint), _) => endpoint,
				(None, EndpointSource::Discovery { url }) => format!("discover via {url}"),
				(None, _) => "unresolved".to_string(),
			};
			TargetRow {
				name: resource.name().to_string(),
				selected: selected.as_ref().is_some_and(|s| s.name() == resource.name()),
				location,
			}
		})
		.collect()
}

pub(super) fn run(config: &WebshellConfig) -> Result<()> {
	let catalog = config.catalog()?;
	let rows = target_rows(&catalog);
	if rows.is_empty() {
		eprintln!("{}", "no targets configured".yellow());
		return Ok(());
	}

	let width = rows.iter().map(|r| r.name.len()).max().unwrap_or(0);
	for row in rows {
		let marker = if row.selected { "*".green().bold() } else { " ".normal() };
		let name = format!("{:<width$}", row.name);
		println!("{marker} {}  {}", name.bold(), row.location.dimmed());
	}
	Ok(())
}
