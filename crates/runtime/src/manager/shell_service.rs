//! Per-session channel multiplexing over a manager's transport.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use webshell_protocol::{ChannelId, Frame};

use crate::error::{Error, Result};
use crate::term::{SessionId, Term, TermInput};

struct ChannelSlot {
	session: SessionId,
	term: Weak<Term>,
	forward: JoinHandle<()>,
}

struct Channels {
	slots: HashMap<ChannelId, ChannelSlot>,
	sessions: HashMap<SessionId, ChannelId>,
	/// Next unused channel id; `None` once `u32::MAX` has been handed out.
	next: Option<u32>,
}

impl Channels {
	fn new() -> Self {
		Self {
			slots: HashMap::new(),
			sessions: HashMap::new(),
			next: Some(1),
		}
	}

	/// Ids are never reused within a manager.
	fn allocate(&mut self) -> Option<ChannelId> {
		let id = self.next?;
		self.next = id.checked_add(1);
		Some(ChannelId(id))
	}

	fn release(&mut self, channel: ChannelId) -> Option<ChannelSlot> {
		let slot = self.slots.remove(&channel)?;
		self.sessions.remove(&slot.session);
		slot.forward.abort();
		Some(slot)
	}
}

/// Attaches terminal sessions to logical channels of one shared transport.
///
/// Every attached session owns exactly one [`ChannelId`]. Outbound frames go
/// through the manager's writer queue; inbound frames are routed here by the
/// manager's dispatch loop.
pub struct ShellService {
	endpoint: Arc<str>,
	outbound_tx: mpsc::UnboundedSender<Value>,
	closed: Arc<AtomicBool>,
	channels: Mutex<Channels>,
}

impl ShellService {
	pub(crate) fn new(endpoint: Arc<str>, outbound_tx: mpsc::UnboundedSender<Value>, closed: Arc<AtomicBool>) -> Self {
		Self {
			endpoint,
			outbound_tx,
			closed,
			channels: Mutex::new(Channels::new()),
		}
	}

	/// Opens a channel for `term` and starts forwarding its input.
	///
	/// # Errors
	///
	/// [`Error::ManagerClosed`] once the transport is gone,
	/// [`Error::AlreadyAttached`] if `term` already owns a channel here,
	/// [`Error::ChannelsExhausted`] once every channel id has been used.
	pub fn add_session(&self, term: &Arc<Term>) -> Result<ChannelId> {
		if self.closed.load(Ordering::SeqCst) {
			return Err(self.closed_error());
		}

		let mut channels = self.channels.lock();
		if channels.sessions.contains_key(&term.id()) {
			return Err(Error::AlreadyAttached { session: term.id() });
		}

		let Some(channel) = channels.allocate() else {
			warn!(target = "webshell.manager", endpoint = %self.endpoint, "channel ids exhausted");
			return Err(Error::ChannelsExhausted {
				endpoint: self.endpoint.to_string(),
			});
		};
		let options = term.options();
		self.queue(&Frame::Open {
			channel,
			cols: options.cols,
			rows: options.rows,
		})?;

		let forward = tokio::spawn(forward_input(channel, term.subscribe_input(), self.outbound_tx.clone()));
		channels.slots.insert(
			channel,
			ChannelSlot {
				session: term.id(),
				term: Arc::downgrade(term),
				forward,
			},
		);
		channels.sessions.insert(term.id(), channel);

		debug!(
			target = "webshell.manager",
			endpoint = %self.endpoint,
			session = %term.id(),
			%channel,
			"session attached"
		);
		Ok(channel)
	}

	/// Closes the channel owned by `term`. No-op if it owns none.
	pub fn remove_session(&self, term: &Term) -> bool {
		let released = {
			let mut channels = self.channels.lock();
			channels
				.sessions
				.get(&term.id())
				.copied()
				.and_then(|channel| channels.release(channel).map(|_| channel))
		};

		let Some(channel) = released else {
			return false;
		};

		if let Err(e) = self.queue(&Frame::Close { channel }) {
			debug!(target = "webshell.manager", %channel, error = %e, "close frame not sent");
		}
		debug!(
			target = "webshell.manager",
			endpoint = %self.endpoint,
			session = %term.id(),
			%channel,
			"session detached"
		);
		true
	}

	/// Channel currently owned by `session`.
	pub fn channel_of(&self, session: SessionId) -> Option<ChannelId> {
		self.channels.lock().sessions.get(&session).copied()
	}

	/// Sessions currently attached, ordered by channel.
	pub fn sessions(&self) -> Vec<SessionId> {
		let channels = self.channels.lock();
		let mut attached: Vec<(ChannelId, SessionId)> = channels.slots.iter().map(|(channel, slot)| (*channel, slot.session)).collect();
		attached.sort();
		attached.into_iter().map(|(_, session)| session).collect()
	}

	pub fn session_count(&self) -> usize {
		self.channels.lock().slots.len()
	}

	pub(crate) fn dispatch(&self, frame: Frame) {
		match frame {
			Frame::Data { channel, .. } => {
				let term = self.channels.lock().slots.get(&channel).and_then(|slot| slot.term.upgrade());
				let Some(term) = term else {
					debug!(target = "webshell.manager", %channel, "data for unknown channel (ignored)");
					return;
				};
				match frame.payload() {
					Some(Ok(bytes)) => term.write(&bytes),
					Some(Err(e)) => warn!(target = "webshell.manager", %channel, error = %e, "undecodable data frame"),
					None => {}
				}
			}
			Frame::Exit { channel, code } => self.finish(channel, code),
			Frame::Close { channel } => self.finish(channel, None),
			other => {
				debug!(
					target = "webshell.manager",
					kind = other.kind(),
					channel = %other.channel(),
					"unexpected client-bound frame (ignored)"
				);
			}
		}
	}

	fn finish(&self, channel: ChannelId, code: Option<i32>) {
		let slot = self.channels.lock().release(channel);
		match slot.and_then(|slot| slot.term.upgrade()) {
			Some(term) => {
				term.mark_exited(code);
				debug!(target = "webshell.manager", session = %term.id(), %channel, ?code, "remote shell exited");
			}
			None => debug!(target = "webshell.manager", %channel, "exit for unknown channel (ignored)"),
		}
	}

	/// Releases every channel after the transport went away.
	pub(crate) fn shutdown(&self) {
		let slots: Vec<ChannelSlot> = {
			let mut channels = self.channels.lock();
			channels.sessions.clear();
			channels.slots.drain().map(|(_, slot)| slot).collect()
		};
		for slot in slots {
			slot.forward.abort();
			if let Some(term) = slot.term.upgrade() {
				term.mark_exited(None);
			}
		}
	}

	#[cfg(test)]
	pub(crate) fn set_next_channel(&self, next: u32) {
		self.channels.lock().next = Some(next);
	}

	fn queue(&self, frame: &Frame) -> Result<()> {
		let value = serde_json::to_value(frame)?;
		self.outbound_tx.send(value).map_err(|_| self.closed_error())
	}

	fn closed_error(&self) -> Error {
		Error::ManagerClosed {
			endpoint: self.endpoint.to_string(),
		}
	}
}

async fn forward_input(channel: ChannelId, mut input_rx: mpsc::UnboundedReceiver<TermInput>, outbound_tx: mpsc::UnboundedSender<Value>) {
	while let Some(input) = input_rx.recv().await {
		let frame = match input {
			TermInput::Data(bytes) => Frame::data(channel, &bytes),
			TermInput::Resize { cols, rows } => Frame::Resize { channel, cols, rows },
		};
		let value = match serde_json::to_value(&frame) {
			Ok(value) => value,
			Err(e) => {
				warn!(target = "webshell.manager", %channel, error = %e, "failed to encode input frame");
				continue;
			}
		};
		if outbound_tx.send(value).is_err() {
			break;
		}
	}
}
