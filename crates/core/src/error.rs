//! Error types for session orchestration.

use thiserror::Error;

/// Result type alias for directory operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by resources, the catalog, and the session directory.
#[derive(Debug, Error)]
pub enum Error {
	/// `add` was called without a target and nothing is selected.
	#[error("No resource selected")]
	NoTargetSelected,

	/// The named target is not in the catalog.
	#[error("Unknown resource: {0}")]
	UnknownTarget(String),

	/// The resource has no endpoint and no way to fetch one.
	#[error("Resource '{0}' has no endpoint")]
	EndpointUnavailable(String),

	/// Fetching the endpoint failed; the cache stays empty.
	#[error("Failed to resolve endpoint for '{name}'")]
	EndpointResolution {
		name: String,
		#[source]
		source: anyhow::Error,
	},

	#[error(transparent)]
	Runtime(#[from] webshell_runtime::Error),
}
