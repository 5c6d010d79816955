//! The ordered collection of open sessions and the orchestration around it.
//!
//! [`SessionDirectory::add`] picks a target, reuses or creates that target's
//! [`ConnectionManager`], attaches a fresh [`Term`], records the session in the
//! [`SessionRegistry`], binds focus tracking and settings watchers, and only
//! then makes the session visible. [`SessionDirectory::remove`] splices the
//! session out first and tears its transport channel down afterwards, finding
//! the owning manager through the registry rather than storing it here.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use webshell_runtime::{ConnectionManager, Connector, EndpointConnector, SessionRegistry, Term};

use crate::catalog::ResourceCatalog;
use crate::error::{Error, Result};
use crate::resource::ResourceDescriptor;
use crate::settings::SettingsStore;

/// Which target `add` should open a session against.
#[derive(Debug, Clone, Default)]
pub enum TargetRef {
	/// The catalog's current selection.
	#[default]
	Selected,
	/// A catalog entry by name.
	Name(String),
	/// An explicit resource, catalogued or not.
	Resource(Arc<ResourceDescriptor>),
}

impl From<()> for TargetRef {
	fn from((): ()) -> Self {
		TargetRef::Selected
	}
}

impl From<&str> for TargetRef {
	fn from(name: &str) -> Self {
		TargetRef::Name(name.to_string())
	}
}

impl From<String> for TargetRef {
	fn from(name: String) -> Self {
		TargetRef::Name(name)
	}
}

impl From<Arc<ResourceDescriptor>> for TargetRef {
	fn from(resource: Arc<ResourceDescriptor>) -> Self {
		TargetRef::Resource(resource)
	}
}

impl From<Option<&str>> for TargetRef {
	fn from(name: Option<&str>) -> Self {
		name.map_or(TargetRef::Selected, TargetRef::from)
	}
}

/// Which session `remove` should tear down.
#[derive(Debug, Clone)]
pub enum SessionRef {
	Index(usize),
	Handle(Arc<Term>),
}

impl From<usize> for SessionRef {
	fn from(index: usize) -> Self {
		SessionRef::Index(index)
	}
}

impl From<Arc<Term>> for SessionRef {
	fn from(term: Arc<Term>) -> Self {
		SessionRef::Handle(term)
	}
}

impl From<&Arc<Term>> for SessionRef {
	fn from(term: &Arc<Term>) -> Self {
		SessionRef::Handle(Arc::clone(term))
	}
}

/// Aborts a session's settings watchers when dropped.
struct WatcherGuard(Vec<JoinHandle<()>>);

impl Drop for WatcherGuard {
	fn drop(&mut self) {
		for task in self.0.drain(..) {
			task.abort();
		}
	}
}

struct Entry {
	term: Arc<Term>,
	_watchers: WatcherGuard,
}

#[derive(Default)]
struct DirectoryState {
	entries: Vec<Entry>,
	last_focused: Option<Arc<Term>>,
}

impl DirectoryState {
	fn position(&self, term: &Term) -> Option<usize> {
		self.entries.iter().position(|e| std::ptr::eq(Arc::as_ptr(&e.term), term))
	}
}

/// Open sessions in tab order, plus focus state.
pub struct SessionDirectory {
	catalog: Arc<ResourceCatalog>,
	settings: Arc<SettingsStore>,
	connector: Arc<dyn Connector>,
	registry: Arc<SessionRegistry>,
	state: Arc<Mutex<DirectoryState>>,
}

impl SessionDirectory {
	/// Creates a directory using the default connector and the global registry.
	pub fn new(catalog: Arc<ResourceCatalog>, settings: Arc<SettingsStore>) -> Self {
		Self {
			catalog,
			settings,
			connector: Arc::new(EndpointConnector),
			registry: SessionRegistry::global(),
			state: Arc::new(Mutex::new(DirectoryState::default())),
		}
	}

	pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
		self.connector = connector;
		self
	}

	pub fn with_registry(mut self, registry: Arc<SessionRegistry>) -> Self {
		self.registry = registry;
		self
	}

	pub fn catalog(&self) -> &Arc<ResourceCatalog> {
		&self.catalog
	}

	pub fn settings(&self) -> &Arc<SettingsStore> {
		&self.settings
	}

	pub fn registry(&self) -> &Arc<SessionRegistry> {
		&self.registry
	}

	/// Opens a new session against `target` and appends it to the directory.
	///
	/// On failure nothing is created and the directory is unchanged.
	pub async fn add(&self, target: impl Into<TargetRef>) -> Result<Arc<Term>> {
		let resource = self.resolve_target(target.into())?;
		let manager = resource.manager_or_connect(self.connector.as_ref()).await?;

		let term = Arc::new(Term::new());
		let channel = match manager.shell().add_session(&term) {
			Ok(channel) => channel,
			Err(e) => {
				term.dispose();
				return Err(e.into());
			}
		};
		self.registry.register(term.id(), &manager);

		self.bind_focus(&term);
		let watchers = self.bind_settings(&term);

		let index = {
			let mut state = self.state.lock();
			state.entries.push(Entry {
				term: Arc::clone(&term),
				_watchers: watchers,
			});
			state.entries.len() - 1
		};

		info!(
			target = "webshell.directory",
			resource = resource.name(),
			session = %term.id(),
			%channel,
			index,
			"session added"
		);
		Ok(term)
	}

	fn resolve_target(&self, target: TargetRef) -> Result<Arc<ResourceDescriptor>> {
		match target {
			TargetRef::Selected => self.catalog.selected().ok_or(Error::NoTargetSelected),
			TargetRef::Name(name) => self.catalog.find(&name).ok_or(Error::UnknownTarget(name)),
			TargetRef::Resource(resource) => Ok(resource),
		}
	}

	fn bind_focus(&self, term: &Arc<Term>) {
		let state: Weak<Mutex<DirectoryState>> = Arc::downgrade(&self.state);
		let weak_term = Arc::downgrade(term);
		term.container().on_focus_in(move || {
			let (Some(state), Some(term)) = (state.upgrade(), weak_term.upgrade()) else {
				return;
			};
			debug!(target = "webshell.directory", session = %term.id(), "focus in");
			state.lock().last_focused = Some(term);
		});
	}

	/// Applies the current theme and font size now and on every later change.
	fn bind_settings(&self, term: &Arc<Term>) -> WatcherGuard {
		let mut theme_rx = self.settings.subscribe_theme();
		term.set_theme(theme_rx.borrow_and_update().clone());
		let weak_term = Arc::downgrade(term);
		let theme_task = tokio::spawn(async move {
			while theme_rx.changed().await.is_ok() {
				let Some(term) = weak_term.upgrade() else { break };
				term.set_theme(theme_rx.borrow_and_update().clone());
			}
		});

		let mut font_rx = self.settings.subscribe_font_size();
		term.set_font_size(*font_rx.borrow_and_update());
		let weak_term = Arc::downgrade(term);
		let font_task = tokio::spawn(async move {
			while font_rx.changed().await.is_ok() {
				let Some(term) = weak_term.upgrade() else { break };
				term.set_font_size(*font_rx.borrow_and_update());
			}
		});

		WatcherGuard(vec![theme_task, font_task])
	}

	/// Removes a session by index or handle and releases it.
	///
	/// Out-of-range indices and unknown handles are no-ops returning `None`.
	pub fn remove(&self, target: impl Into<SessionRef>) -> Option<Arc<Term>> {
		let entry = {
			let mut state = self.state.lock();
			let index = match target.into() {
				SessionRef::Index(index) => (index < state.entries.len()).then_some(index),
				SessionRef::Handle(term) => state.position(&term),
			}?;
			let entry = state.entries.remove(index);
			if state.last_focused.as_ref().is_some_and(|t| Arc::ptr_eq(t, &entry.term)) {
				state.last_focused = None;
			}
			entry
		};

		let term = Arc::clone(&entry.term);
		self.detach(&term);
		drop(entry);
		term.dispose();

		info!(target = "webshell.directory", session = %term.id(), "session removed");
		Some(term)
	}

	fn detach(&self, term: &Term) {
		let session = term.id();
		match self.registry.get_manager(session) {
			Some(manager) => {
				if !manager.shell().remove_session(term) {
					debug!(target = "webshell.directory", %session, "session was not attached");
				}
			}
			None => debug!(target = "webshell.directory", %session, "no owning manager for session"),
		}
		self.registry.unregister(session);
	}

	/// Removes every session, first to last. Returns how many were removed.
	pub fn clear(&self) -> usize {
		let mut removed = 0;
		while self.remove(0).is_some() {
			removed += 1;
		}
		removed
	}

	/// Snapshot of the open sessions in order.
	pub fn sessions(&self) -> Vec<Arc<Term>> {
		self.state.lock().entries.iter().map(|e| Arc::clone(&e.term)).collect()
	}

	pub fn get(&self, index: usize) -> Option<Arc<Term>> {
		self.state.lock().entries.get(index).map(|e| Arc::clone(&e.term))
	}

	pub fn position(&self, term: &Term) -> Option<usize> {
		self.state.lock().position(term)
	}

	pub fn len(&self) -> usize {
		self.state.lock().entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.state.lock().entries.is_empty()
	}

	/// The session whose container most recently reported focus.
	pub fn last_focused(&self) -> Option<Arc<Term>> {
		self.state.lock().last_focused.clone()
	}

	/// The manager transporting `term`, if it is still attached.
	pub fn manager_of(&self, term: &Term) -> Option<Arc<ConnectionManager>> {
		self.registry.get_manager(term.id())
	}
}
