//! Registry of known shell targets and the current selection.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::resource::ResourceDescriptor;

#[derive(Debug, Default)]
struct CatalogState {
	resources: Vec<Arc<ResourceDescriptor>>,
	selected: Option<Arc<ResourceDescriptor>>,
}

/// Known resources, in insertion order, plus an optional selection.
#[derive(Debug, Default)]
pub struct ResourceCatalog {
	state: RwLock<CatalogState>,
}

impl ResourceCatalog {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds `resource`, replacing any resource with the same name.
	///
	/// A replaced resource that was selected stays selected under its new
	/// descriptor.
	pub fn insert(&self, resource: ResourceDescriptor) -> Arc<ResourceDescriptor> {
		let resource = Arc::new(resource);
		let mut state = self.state.write();
		match state.resources.iter().position(|r| r.name() == resource.name()) {
			Some(index) => state.resources[index] = Arc::clone(&resource),
			None => state.resources.push(Arc::clone(&resource)),
		}
		if state.selected.as_ref().is_some_and(|s| s.name() == resource.name()) {
			state.selected = Some(Arc::clone(&resource));
		}
		resource
	}

	pub fn find(&self, name: &str) -> Option<Arc<ResourceDescriptor>> {
		self.state.read().resources.iter().find(|r| r.name() == name).cloned()
	}

	/// The resource used when `add` is called without a target.
	pub fn selected(&self) -> Option<Arc<ResourceDescriptor>> {
		self.state.read().selected.clone()
	}

	pub fn select(&self, name: &str) -> Result<Arc<ResourceDescriptor>> {
		let mut state = self.state.write();
		let resource = state
			.resources
			.iter()
			.find(|r| r.name() == name)
			.cloned()
			.ok_or_else(|| Error::UnknownTarget(name.to_string()))?;
		state.selected = Some(Arc::clone(&resource));
		Ok(resource)
	}

	pub fn clear_selection(&self) {
		self.state.write().selected = None;
	}

	pub fn resources(&self) -> Vec<Arc<ResourceDescriptor>> {
		self.state.read().resources.clone()
	}

	pub fn names(&self) -> Vec<String> {
		self.state.read().resources.iter().map(|r| r.name().to_string()).collect()
	}

	pub fn len(&self) -> usize {
		self.state.read().resources.len()
	}

	pub fn is_empty(&self) -> bool {
		self.state.read().resources.is_empty()
	}
}
