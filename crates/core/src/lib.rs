//! webshell - multiplexed remote shell sessions
//!
//! Opens many interactive terminal sessions against named remote targets,
//! sharing one transport connection per target.
//!
//! - [`ResourceCatalog`] / [`ResourceDescriptor`]: known targets and lazy,
//!   cached endpoint resolution
//! - [`SettingsStore`]: theme and font size every session follows
//! - [`SessionDirectory`]: ordered open sessions, focus state, and the
//!   add/remove orchestration over [`webshell_runtime`]
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use webshell::{ResourceCatalog, ResourceDescriptor, SessionDirectory, SettingsStore};
//!
//! let catalog = Arc::new(ResourceCatalog::new());
//! catalog.insert(ResourceDescriptor::with_endpoint("host-a", "wss://host-a/shell"));
//! catalog.select("host-a")?;
//!
//! let directory = SessionDirectory::new(catalog, Arc::new(SettingsStore::default()));
//! let term = directory.add(()).await?;
//! term.input("uname -a\n");
//! directory.remove(&term);
//! ```

pub mod catalog;
pub mod directory;
pub mod error;
pub mod resource;
pub mod settings;

pub use catalog::ResourceCatalog;
pub use directory::{SessionDirectory, SessionRef, TargetRef};
pub use error::{Error, Result};
pub use resource::{EndpointSource, FetchEndpoint, ResourceDescriptor};
pub use settings::{DEFAULT_FONT_SIZE, SettingsStore};
pub use webshell_runtime::{ConnectionManager, SessionId, SessionRegistry, Term, TermInput, Theme};
