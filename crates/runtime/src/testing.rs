//! Test doubles for exercising connection managers without a network.
//!
//! [`pipe_pair`] wires a client [`TransportParts`] to a [`FakeShell`] over
//! in-memory duplex pipes. [`DuplexConnector`] hands out such pairs through the
//! [`Connector`] seam and passes each fake shell to the test.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::io::{DuplexStream, ReadHalf, WriteHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use webshell_protocol::{ChannelId, Frame};

use crate::connector::Connector;
use crate::error::{Error, Result};
use crate::transport::{PipeTransport, PipeTransportSender, TransportParts, TransportReceiver};

const PIPE_CAPACITY: usize = 64 * 1024;
const FRAME_TIMEOUT: Duration = Duration::from_secs(5);

/// Server side of an in-memory shell transport.
pub struct FakeShell {
	sender: Option<PipeTransportSender<WriteHalf<DuplexStream>>>,
	frames_rx: mpsc::UnboundedReceiver<Value>,
	reader: JoinHandle<()>,
}

/// Connects a client transport to a fresh [`FakeShell`].
pub fn pipe_pair() -> (TransportParts, FakeShell) {
	let (client, server) = tokio::io::duplex(PIPE_CAPACITY);

	let (client_read, client_write) = tokio::io::split(client);
	let (client_transport, client_rx) = PipeTransport::new(client_write, client_read);
	let parts = client_transport.into_transport_parts(client_rx);

	let (server_read, server_write): (ReadHalf<DuplexStream>, WriteHalf<DuplexStream>) = tokio::io::split(server);
	let (server_transport, frames_rx) = PipeTransport::new(server_write, server_read);
	let (sender, receiver) = server_transport.into_parts();
	let reader = tokio::spawn(async move {
		let _ = Box::new(receiver).run().await;
	});

	(
		parts,
		FakeShell {
			sender: Some(sender),
			frames_rx,
			reader,
		},
	)
}

impl FakeShell {
	/// Next frame sent by the client, or `None` after a timeout or hang-up.
	pub async fn next_frame(&mut self) -> Option<Frame> {
		let value = tokio::time::timeout(FRAME_TIMEOUT, self.frames_rx.recv()).await.ok()??;
		serde_json::from_value(value).ok()
	}

	/// Next frame if one arrives within `wait`.
	pub async fn try_next_frame(&mut self, wait: Duration) -> Option<Frame> {
		let value = tokio::time::timeout(wait, self.frames_rx.recv()).await.ok()??;
		serde_json::from_value(value).ok()
	}

	/// Sends a frame to the client.
	pub async fn send(&mut self, frame: Frame) -> Result<()> {
		let sender = self.sender.as_mut().ok_or(Error::ChannelClosed)?;
		sender.send(serde_json::to_value(&frame)?).await
	}

	/// Sends raw JSON to the client.
	pub async fn send_raw(&mut self, value: Value) -> Result<()> {
		let sender = self.sender.as_mut().ok_or(Error::ChannelClosed)?;
		sender.send(value).await
	}

	/// Sends shell output on `channel`.
	pub async fn write(&mut self, channel: ChannelId, bytes: &[u8]) -> Result<()> {
		self.send(Frame::data(channel, bytes)).await
	}

	/// Closes the server side; the client observes end of stream.
	pub fn hang_up(&mut self) {
		self.sender.take();
		self.reader.abort();
	}
}

impl Drop for FakeShell {
	fn drop(&mut self) {
		self.reader.abort();
	}
}

/// [`Connector`] that serves every endpoint from an in-memory [`FakeShell`].
pub struct DuplexConnector {
	shells_tx: mpsc::UnboundedSender<(String, FakeShell)>,
	connects: AtomicUsize,
	refused: Mutex<Vec<String>>,
}

impl DuplexConnector {
	/// Returns the connector and the stream of `(endpoint, shell)` pairs it creates.
	pub fn new() -> (Self, mpsc::UnboundedReceiver<(String, FakeShell)>) {
		let (shells_tx, shells_rx) = mpsc::unbounded_channel();
		(
			Self {
				shells_tx,
				connects: AtomicUsize::new(0),
				refused: Mutex::new(Vec::new()),
			},
			shells_rx,
		)
	}

	/// Makes connections to `endpoint` fail.
	pub fn refuse(&self, endpoint: impl Into<String>) {
		self.refused.lock().push(endpoint.into());
	}

	/// Number of successful connections made.
	pub fn connects(&self) -> usize {
		self.connects.load(Ordering::SeqCst)
	}
}

impl Connector for DuplexConnector {
	fn connect<'a>(&'a self, endpoint: &'a str) -> Pin<Box<dyn Future<Output = Result<TransportParts>> + Send + 'a>> {
		Box::pin(async move {
			if self.refused.lock().iter().any(|e| e == endpoint) {
				return Err(Error::ConnectionFailed {
					endpoint: endpoint.to_string(),
					reason: "refused".to_string(),
				});
			}
			let (parts, shell) = pipe_pair();
			self.connects.fetch_add(1, Ordering::SeqCst);
			let _ = self.shells_tx.send((endpoint.to_string(), shell));
			Ok(parts)
		})
	}
}
