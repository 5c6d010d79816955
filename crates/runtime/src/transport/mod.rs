//! Transport layer: moves JSON frames over a byte stream or WebSocket.
//!
//! A transport is split into a sending half ([`Transport`]) and a receiving half
//! ([`TransportReceiver`]). The receiver's `run` loop pushes every decoded JSON
//! value into an unbounded channel; the connection manager owns the other end.
//!
//! Two implementations are provided:
//!
//! - [`PipeTransport`]: length-prefixed JSON (4-byte little-endian length, then
//!   the payload) over any `AsyncRead`/`AsyncWrite` pair. Used for `tcp://`
//!   endpoints and in-process pipes.
//! - [`WebSocketTransport`]: one JSON frame per text message, for `ws://` and
//!   `wss://` endpoints.

use std::future::Future;
use std::pin::Pin;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Upper bound on a single length-prefixed frame.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Sending half of a transport.
pub trait Transport: Send {
	/// Serializes and writes one message.
	fn send(&mut self, message: Value) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

	/// Flushes and closes the outbound direction.
	fn close(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Receiving half of a transport.
pub trait TransportReceiver: Send {
	/// Reads messages until the peer goes away, forwarding each one.
	///
	/// Returns `Ok(())` when the consumer hangs up, an error when the stream
	/// ends or breaks.
	fn run(self: Box<Self>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>>;
}

/// A connected transport, ready to be handed to a connection manager.
pub struct TransportParts {
	pub sender: Box<dyn Transport>,
	pub receiver: Box<dyn TransportReceiver>,
	pub message_rx: mpsc::UnboundedReceiver<Value>,
}

/// Length-prefixed JSON transport over a reader/writer pair.
pub struct PipeTransport<W, R> {
	writer: W,
	reader: R,
	message_tx: mpsc::UnboundedSender<Value>,
}

/// Writer half of a [`PipeTransport`].
pub struct PipeTransportSender<W> {
	writer: W,
}

/// Reader half of a [`PipeTransport`].
pub struct PipeTransportReceiver<R> {
	reader: R,
	message_tx: mpsc::UnboundedSender<Value>,
}

impl<W, R> PipeTransport<W, R>
where
	W: AsyncWrite + Unpin + Send + 'static,
	R: AsyncRead + Unpin + Send + 'static,
{
	/// Creates a transport and the receiver that `run` feeds.
	pub fn new(writer: W, reader: R) -> (Self, mpsc::UnboundedReceiver<Value>) {
		let (message_tx, message_rx) = mpsc::unbounded_channel();
		(
			Self {
				writer,
				reader,
				message_tx,
			},
			message_rx,
		)
	}

	/// Writes one framed message.
	pub async fn send(&mut self, message: &Value) -> Result<()> {
		write_frame(&mut self.writer, message).await
	}

	/// Reads framed messages until EOF or until the consumer hangs up.
	pub async fn run(&mut self) -> Result<()> {
		read_loop(&mut self.reader, &self.message_tx).await
	}

	/// Splits into independently owned halves.
	pub fn into_parts(self) -> (PipeTransportSender<W>, PipeTransportReceiver<R>) {
		(
			PipeTransportSender { writer: self.writer },
			PipeTransportReceiver {
				reader: self.reader,
				message_tx: self.message_tx,
			},
		)
	}

	/// Boxes both halves together with the message receiver from [`PipeTransport::new`].
	pub fn into_transport_parts(self, message_rx: mpsc::UnboundedReceiver<Value>) -> TransportParts {
		let (sender, receiver) = self.into_parts();
		TransportParts {
			sender: Box::new(sender),
			receiver: Box::new(receiver),
			message_rx,
		}
	}
}

impl<W> PipeTransportSender<W>
where
	W: AsyncWrite + Unpin + Send,
{
	pub async fn send(&mut self, message: Value) -> Result<()> {
		write_frame(&mut self.writer, &message).await
	}
}

impl<W> Transport for PipeTransportSender<W>
where
	W: AsyncWrite + Unpin + Send,
{
	fn send(&mut self, message: Value) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
		Box::pin(async move { write_frame(&mut self.writer, &message).await })
	}

	fn close(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
		Box::pin(async move {
			self.writer.shutdown().await?;
			Ok(())
		})
	}
}

impl<R> TransportReceiver for PipeTransportReceiver<R>
where
	R: AsyncRead + Unpin + Send + 'static,
{
	fn run(self: Box<Self>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> {
		let PipeTransportReceiver { mut reader, message_tx } = *self;
		Box::pin(async move { read_loop(&mut reader, &message_tx).await })
	}
}

async fn write_frame<W>(writer: &mut W, message: &Value) -> Result<()>
where
	W: AsyncWrite + Unpin,
{
	let bytes = serde_json::to_vec(message)?;
	let length = u32::try_from(bytes.len())
		.ok()
		.filter(|len| *len as usize <= MAX_FRAME_LEN)
		.ok_or_else(|| Error::TransportError(format!("Frame too large: {} bytes", bytes.len())))?;

	writer.write_all(&length.to_le_bytes()).await?;
	writer.write_all(&bytes).await?;
	writer.flush().await?;
	Ok(())
}

async fn read_loop<R>(reader: &mut R, message_tx: &mpsc::UnboundedSender<Value>) -> Result<()>
where
	R: AsyncRead + Unpin,
{
	loop {
		let mut len_buf = [0u8; 4];
		reader
			.read_exact(&mut len_buf)
			.await
			.map_err(|e| Error::TransportError(format!("Failed to read length prefix: {e}")))?;

		let length = u32::from_le_bytes(len_buf) as usize;
		if length > MAX_FRAME_LEN {
			return Err(Error::TransportError(format!("Frame too large: {length} bytes")));
		}

		let mut payload = vec![0u8; length];
		reader
			.read_exact(&mut payload)
			.await
			.map_err(|e| Error::TransportError(format!("Failed to read frame payload: {e}")))?;

		let message: Value = match serde_json::from_slice(&payload) {
			Ok(value) => value,
			Err(e) => {
				warn!(target = "webshell.transport", error = %e, "dropping non-JSON frame");
				continue;
			}
		};

		if message_tx.send(message).is_err() {
			debug!(target = "webshell.transport", "message receiver dropped, stopping reader");
			return Ok(());
		}
	}
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket transport carrying one JSON frame per text message.
pub struct WebSocketTransport;

/// Writer half of a [`WebSocketTransport`].
pub struct WebSocketTransportSender {
	sink: SplitSink<WsStream, WsMessage>,
}

/// Reader half of a [`WebSocketTransport`].
pub struct WebSocketTransportReceiver {
	stream: SplitStream<WsStream>,
	message_tx: mpsc::UnboundedSender<Value>,
}

impl WebSocketTransport {
	/// Performs the WebSocket handshake against `url`.
	pub async fn connect(url: &str) -> Result<TransportParts> {
		let (socket, response) = connect_async(url).await.map_err(|e| Error::ConnectionFailed {
			endpoint: url.to_string(),
			reason: e.to_string(),
		})?;
		debug!(target = "webshell.transport", url, status = %response.status(), "websocket connected");

		let (sink, stream) = socket.split();
		let (message_tx, message_rx) = mpsc::unbounded_channel();

		Ok(TransportParts {
			sender: Box::new(WebSocketTransportSender { sink }),
			receiver: Box::new(WebSocketTransportReceiver { stream, message_tx }),
			message_rx,
		})
	}
}

impl Transport for WebSocketTransportSender {
	fn send(&mut self, message: Value) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
		Box::pin(async move {
			let text = serde_json::to_string(&message)?;
			self.sink
				.send(WsMessage::Text(text))
				.await
				.map_err(|e| Error::TransportError(e.to_string()))
		})
	}

	fn close(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
		Box::pin(async move { self.sink.close().await.map_err(|e| Error::TransportError(e.to_string())) })
	}
}

impl TransportReceiver for WebSocketTransportReceiver {
	fn run(self: Box<Self>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> {
		let WebSocketTransportReceiver { mut stream, message_tx } = *self;
		Box::pin(async move {
			while let Some(message) = stream.next().await {
				let message = message.map_err(|e| Error::TransportError(e.to_string()))?;
				let parsed = match message {
					WsMessage::Text(text) => serde_json::from_str::<Value>(&text),
					WsMessage::Binary(bytes) => serde_json::from_slice::<Value>(&bytes),
					WsMessage::Close(frame) => {
						debug!(target = "webshell.transport", ?frame, "websocket closed by peer");
						return Ok(());
					}
					_ => continue,
				};

				match parsed {
					Ok(value) => {
						if message_tx.send(value).is_err() {
							return Ok(());
						}
					}
					Err(e) => warn!(target = "webshell.transport", error = %e, "dropping non-JSON message"),
				}
			}
			Err(Error::TransportError("WebSocket stream ended".to_string()))
		})
	}
}
