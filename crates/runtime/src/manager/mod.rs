//! Connection manager: one multiplexed transport per shell target.
//!
//! A [`ConnectionManager`] is started from an already-connected transport and
//! owns three tasks for its lifetime:
//!
//! 1. **reader**: runs the transport receiver, pushing raw JSON values
//! 2. **writer**: drains the outbound queue into the transport sender
//! 3. **dispatcher**: parses inbound values into [`Frame`]s and routes them to
//!    the [`ShellService`]
//!
//! When the transport ends, in either direction, the manager is marked closed
//! and every attached session is marked exited. A closed manager rejects new
//! sessions and must not be reused.

mod shell_service;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use webshell_protocol::Frame;

pub use self::shell_service::ShellService;
use crate::transport::TransportParts;

/// Upper bound on flushing queued frames in [`ConnectionManager::close_gracefully`].
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Owns the transport to one target and the sessions multiplexed over it.
pub struct ConnectionManager {
	endpoint: Arc<str>,
	resource: String,
	shell: ShellService,
	closed: Arc<AtomicBool>,
	tasks: Mutex<Vec<JoinHandle<()>>>,
	writer: Mutex<Option<JoinHandle<()>>>,
	drain_tx: Mutex<Option<oneshot::Sender<()>>>,
}

impl ConnectionManager {
	/// Starts a manager over a connected transport.
	///
	/// Must be called from within a tokio runtime.
	pub fn start(endpoint: impl Into<String>, resource: impl Into<String>, parts: TransportParts) -> Arc<Self> {
		let TransportParts {
			mut sender,
			receiver,
			mut message_rx,
		} = parts;
		let endpoint: Arc<str> = Arc::from(endpoint.into());
		let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Value>();
		let (drain_tx, mut drain_rx) = oneshot::channel::<()>();
		let closed = Arc::new(AtomicBool::new(false));

		let manager = Arc::new(Self {
			endpoint: Arc::clone(&endpoint),
			resource: resource.into(),
			shell: ShellService::new(Arc::clone(&endpoint), outbound_tx, Arc::clone(&closed)),
			closed,
			tasks: Mutex::new(Vec::new()),
			writer: Mutex::new(None),
			drain_tx: Mutex::new(Some(drain_tx)),
		});

		let reader = tokio::spawn({
			let endpoint = Arc::clone(&endpoint);
			async move {
				if let Err(e) = receiver.run().await {
					debug!(target = "webshell.transport", %endpoint, error = %e, "transport reader stopped");
				}
			}
		});

		let writer = tokio::spawn({
			let endpoint = Arc::clone(&endpoint);
			let weak = Arc::downgrade(&manager);
			async move {
				let mut draining = false;
				loop {
					tokio::select! {
						message = outbound_rx.recv() => {
							let Some(message) = message else { break };
							if let Err(e) = sender.send(message).await {
								error!(target = "webshell.transport", %endpoint, error = %e, "transport write error");
								if let Some(manager) = weak.upgrade() {
									manager.mark_closed();
								}
								return;
							}
						}
						_ = &mut drain_rx, if !draining => {
							// Queued frames are still delivered; new sends fail.
							draining = true;
							outbound_rx.close();
						}
					}
				}
				let _ = sender.close().await;
			}
		});

		let weak = Arc::downgrade(&manager);
		let dispatcher = tokio::spawn(async move {
			while let Some(value) = message_rx.recv().await {
				let Some(manager) = weak.upgrade() else {
					return;
				};
				manager.dispatch_value(value);
			}
			if let Some(manager) = weak.upgrade() {
				manager.mark_closed();
			}
		});

		manager.tasks.lock().extend([reader, dispatcher]);
		*manager.writer.lock() = Some(writer);
		info!(target = "webshell.manager", %endpoint, resource = %manager.resource, "connection manager started");
		manager
	}

	pub fn endpoint(&self) -> &str {
		&self.endpoint
	}

	/// Name of the resource this manager was created for.
	pub fn resource(&self) -> &str {
		&self.resource
	}

	/// The session multiplexing service.
	pub fn shell(&self) -> &ShellService {
		&self.shell
	}

	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}

	/// Shuts the manager down; attached sessions are marked exited.
	///
	/// Frames still queued are discarded; see [`close_gracefully`](Self::close_gracefully).
	pub fn close(&self) {
		self.mark_closed();
		self.abort_tasks();
	}

	/// Flushes frames already queued (such as `close` frames from removed
	/// sessions), closes the transport, then shuts down like [`close`](Self::close).
	///
	/// New frames are rejected once draining starts. Waits at most [`DRAIN_TIMEOUT`].
	pub async fn close_gracefully(&self) {
		if let Some(drain_tx) = self.drain_tx.lock().take() {
			let _ = drain_tx.send(());
		}
		let writer = self.writer.lock().take();
		if let Some(writer) = writer {
			let abort = writer.abort_handle();
			if tokio::time::timeout(DRAIN_TIMEOUT, writer).await.is_err() {
				warn!(target = "webshell.manager", endpoint = %self.endpoint, "outbound queue not drained in time");
				abort.abort();
			}
		}
		self.close();
	}

	fn abort_tasks(&self) {
		for task in self.tasks.lock().drain(..) {
			task.abort();
		}
		if let Some(writer) = self.writer.lock().take() {
			writer.abort();
		}
	}

	fn mark_closed(&self) {
		if !self.closed.swap(true, Ordering::SeqCst) {
			info!(target = "webshell.manager", endpoint = %self.endpoint, "connection closed");
		}
		self.shell.shutdown();
	}

	fn dispatch_value(&self, value: Value) {
		match serde_json::from_value::<Frame>(value) {
			Ok(frame) => self.shell.dispatch(frame),
			Err(e) => error!(target = "webshell.manager", endpoint = %self.endpoint, error = %e, "Failed to parse frame"),
		}
	}
}

impl Drop for ConnectionManager {
	fn drop(&mut self) {
		self.abort_tasks();
		self.shell.shutdown();
	}
}

impl fmt::Debug for ConnectionManager {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ConnectionManager")
			.field("endpoint", &self.endpoint)
			.field("resource", &self.resource)
			.field("closed", &self.is_closed())
			.field("sessions", &self.shell.session_count())
			.finish()
	}
}

#[cfg(test)]
mod tests;
