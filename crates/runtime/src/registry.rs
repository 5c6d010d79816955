//! Process-wide lookup from a live session to the manager that transports it.
//!
//! Sessions are presented by a directory and transported by a
//! [`ConnectionManager`]; neither side stores the other. This side-table keeps
//! the link, keyed by [`SessionId`] and holding only weak manager references,
//! so teardown can find the owning manager without coupling the directory to
//! connection internals.

use std::sync::{Arc, LazyLock, Weak};

use dashmap::DashMap;

use crate::manager::ConnectionManager;
use crate::term::SessionId;

static GLOBAL: LazyLock<Arc<SessionRegistry>> = LazyLock::new(|| Arc::new(SessionRegistry::new()));

/// Identity-keyed weak mapping `session -> manager`.
#[derive(Default)]
pub struct SessionRegistry {
	entries: DashMap<SessionId, Weak<ConnectionManager>>,
}

impl SessionRegistry {
	pub fn new() -> Self {
		Self {
			entries: DashMap::new(),
		}
	}

	/// The registry shared by the whole process.
	pub fn global() -> Arc<SessionRegistry> {
		Arc::clone(&GLOBAL)
	}

	/// Records `session -> manager`, replacing any previous entry.
	pub fn register(&self, session: SessionId, manager: &Arc<ConnectionManager>) {
		self.entries.insert(session, Arc::downgrade(manager));
	}

	/// Owning manager, if recorded and still alive.
	pub fn get_manager(&self, session: SessionId) -> Option<Arc<ConnectionManager>> {
		self.entries.get(&session).and_then(|entry| entry.value().upgrade())
	}

	/// Drops the entry. Returns whether one existed.
	pub fn unregister(&self, session: SessionId) -> bool {
		self.entries.remove(&session).is_some()
	}

	pub fn contains(&self, session: SessionId) -> bool {
		self.entries.contains_key(&session)
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::term::Term;
	use crate::testing::pipe_pair;

	#[tokio::test]
	async fn register_lookup_unregister() {
		let registry = SessionRegistry::new();
		let (parts, _shell) = pipe_pair();
		let manager = ConnectionManager::start("tcp://test:1", "test", parts);
		let term = Term::new();

		assert!(registry.get_manager(term.id()).is_none());

		registry.register(term.id(), &manager);
		let found = registry.get_manager(term.id()).unwrap();
		assert!(Arc::ptr_eq(&found, &manager));
		assert_eq!(registry.len(), 1);

		assert!(registry.unregister(term.id()));
		assert!(!registry.unregister(term.id()));
		assert!(registry.is_empty());
	}

	#[tokio::test]
	async fn register_overwrites_existing_entry() {
		let registry = SessionRegistry::new();
		let (parts_a, _shell_a) = pipe_pair();
		let (parts_b, _shell_b) = pipe_pair();
		let first = ConnectionManager::start("tcp://a:1", "a", parts_a);
		let second = ConnectionManager::start("tcp://b:1", "b", parts_b);
		let term = Term::new();

		registry.register(term.id(), &first);
		registry.register(term.id(), &second);

		assert!(Arc::ptr_eq(&registry.get_manager(term.id()).unwrap(), &second));
		assert_eq!(registry.len(), 1);
	}

	#[test]
	fn global_registry_is_shared() {
		assert!(Arc::ptr_eq(&SessionRegistry::global(), &SessionRegistry::global()));
	}

	#[tokio::test]
	async fn dropped_manager_is_absent() {
		let registry = SessionRegistry::new();
		let (parts, _shell) = pipe_pair();
		let manager = ConnectionManager::start("tcp://test:1", "test", parts);
		let term = Term::new();

		registry.register(term.id(), &manager);
		drop(manager);

		assert!(registry.get_manager(term.id()).is_none());
		assert!(registry.contains(term.id()));
	}
}
