//! Error types for the webshell runtime.

use thiserror::Error;

use crate::term::SessionId;

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the webshell runtime.
#[derive(Debug, Error)]
pub enum Error {
	/// Failed to establish the transport to an endpoint.
	#[error("Failed to connect to {endpoint}: {reason}")]
	ConnectionFailed { endpoint: String, reason: String },

	/// No transport is known for the endpoint's scheme.
	#[error("Unsupported endpoint: {0}")]
	UnsupportedEndpoint(String),

	/// Transport-level error (framing, socket I/O).
	#[error("Transport error: {0}")]
	TransportError(String),

	/// The connection manager's transport is gone.
	#[error("Connection to {endpoint} is closed")]
	ManagerClosed { endpoint: String },

	/// The session already owns a channel on this manager.
	#[error("Session {session} is already attached")]
	AlreadyAttached { session: SessionId },

	/// Every channel id on this connection has been handed out.
	#[error("No channel ids left on {endpoint}")]
	ChannelsExhausted { endpoint: String },

	/// Channel closed unexpectedly.
	#[error("Channel closed unexpectedly")]
	ChannelClosed,

	/// I/O error.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// JSON serialization/deserialization error.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

impl Error {
	/// Returns true if the error means the connection can no longer be used.
	pub fn is_closed(&self) -> bool {
		matches!(self, Error::ManagerClosed { .. } | Error::ChannelClosed)
	}
}
