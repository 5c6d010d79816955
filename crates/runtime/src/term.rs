//! Terminal widget handle.
//!
//! [`Term`] is the session object shared between the UI side (which renders it
//! and feeds it keystrokes) and the connection side (which writes remote output
//! into it and forwards its input). Rendering is not modelled here: output is
//! kept in a bounded scrollback and broadcast to any subscriber.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

/// Bytes of remote output retained per terminal.
pub const SCROLLBACK_LIMIT: usize = 64 * 1024;

const OUTPUT_CHANNEL_CAPACITY: usize = 256;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a terminal session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
	fn next() -> Self {
		SessionId(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
	}

	pub fn as_u64(self) -> u64 {
		self.0
	}
}

impl fmt::Display for SessionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "term#{}", self.0)
	}
}

/// Color theme applied to a terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
	pub name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub foreground: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub background: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub cursor: Option<String>,
}

impl Theme {
	pub fn named(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			foreground: None,
			background: None,
			cursor: None,
		}
	}
}

impl Default for Theme {
	fn default() -> Self {
		Self::named("default")
	}
}

/// Mutable presentation options of a terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermOptions {
	pub theme: Theme,
	pub font_size: u16,
	pub cols: u16,
	pub rows: u16,
}

impl Default for TermOptions {
	fn default() -> Self {
		Self {
			theme: Theme::default(),
			font_size: 14,
			cols: 80,
			rows: 24,
		}
	}
}

/// User-side event produced by a terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TermInput {
	Data(Vec<u8>),
	Resize { cols: u16, rows: u16 },
}

/// How the remote side of a terminal ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus {
	pub code: Option<i32>,
}

type FocusObserver = Arc<dyn Fn() + Send + Sync>;

/// UI attachment point of a terminal.
///
/// Focus observers live exactly as long as the container stays attached.
pub struct Container {
	attached: AtomicBool,
	observers: Mutex<Vec<FocusObserver>>,
}

impl Container {
	fn new() -> Self {
		Self {
			attached: AtomicBool::new(true),
			observers: Mutex::new(Vec::new()),
		}
	}

	/// Binds `observer` to focus-in events. Returns false once detached.
	pub fn on_focus_in(&self, observer: impl Fn() + Send + Sync + 'static) -> bool {
		let mut observers = self.observers.lock();
		if !self.is_attached() {
			return false;
		}
		observers.push(Arc::new(observer));
		true
	}

	/// Reports a focus-in event to every bound observer.
	pub fn focus_in(&self) {
		let observers: Vec<FocusObserver> = self.observers.lock().clone();
		for observer in observers {
			observer();
		}
	}

	/// Detaches the container, dropping its observers.
	pub fn detach(&self) {
		let mut observers = self.observers.lock();
		self.attached.store(false, Ordering::SeqCst);
		observers.clear();
	}

	pub fn is_attached(&self) -> bool {
		self.attached.load(Ordering::SeqCst)
	}

	pub fn observer_count(&self) -> usize {
		self.observers.lock().len()
	}
}

/// A terminal session handle.
pub struct Term {
	id: SessionId,
	options: Mutex<TermOptions>,
	container: Container,
	input_tx: Mutex<Option<mpsc::UnboundedSender<TermInput>>>,
	output_tx: broadcast::Sender<Vec<u8>>,
	scrollback: Mutex<VecDeque<u8>>,
	exit: Mutex<Option<ExitStatus>>,
	disposed: AtomicBool,
}

impl Term {
	pub fn new() -> Self {
		let (output_tx, _) = broadcast::channel(OUTPUT_CHANNEL_CAPACITY);
		Self {
			id: SessionId::next(),
			options: Mutex::new(TermOptions::default()),
			container: Container::new(),
			input_tx: Mutex::new(None),
			output_tx,
			scrollback: Mutex::new(VecDeque::new()),
			exit: Mutex::new(None),
			disposed: AtomicBool::new(false),
		}
	}

	pub fn id(&self) -> SessionId {
		self.id
	}

	pub fn container(&self) -> &Container {
		&self.container
	}

	/// Snapshot of the current options.
	pub fn options(&self) -> TermOptions {
		self.options.lock().clone()
	}

	pub fn set_theme(&self, theme: Theme) {
		self.options.lock().theme = theme;
	}

	pub fn set_font_size(&self, font_size: u16) {
		self.options.lock().font_size = font_size;
	}

	/// Changes the terminal size and notifies the input subscriber.
	pub fn resize(&self, cols: u16, rows: u16) {
		{
			let mut options = self.options.lock();
			if options.cols == cols && options.rows == rows {
				return;
			}
			options.cols = cols;
			options.rows = rows;
		}
		self.emit(TermInput::Resize { cols, rows });
	}

	/// Feeds user keystrokes to the input subscriber.
	pub fn input(&self, data: impl Into<Vec<u8>>) {
		self.emit(TermInput::Data(data.into()));
	}

	fn emit(&self, event: TermInput) {
		let delivered = match self.input_tx.lock().as_ref() {
			Some(tx) => tx.send(event).is_ok(),
			None => false,
		};
		if !delivered {
			debug!(target = "webshell.term", session = %self.id, "input dropped, no subscriber");
		}
	}

	/// Takes over the terminal's input stream, replacing any previous subscriber.
	pub fn subscribe_input(&self) -> mpsc::UnboundedReceiver<TermInput> {
		let (tx, rx) = mpsc::unbounded_channel();
		*self.input_tx.lock() = Some(tx);
		rx
	}

	/// Drops the input subscriber, ending its stream.
	pub fn unsubscribe_input(&self) {
		self.input_tx.lock().take();
	}

	/// Writes remote output into the terminal.
	pub fn write(&self, data: &[u8]) {
		if self.is_disposed() {
			return;
		}
		{
			let mut scrollback = self.scrollback.lock();
			scrollback.extend(data.iter().copied());
			let excess = scrollback.len().saturating_sub(SCROLLBACK_LIMIT);
			scrollback.drain(..excess);
		}
		let _ = self.output_tx.send(data.to_vec());
	}

	/// Live stream of remote output written after this call.
	pub fn subscribe_output(&self) -> broadcast::Receiver<Vec<u8>> {
		self.output_tx.subscribe()
	}

	/// Retained remote output.
	pub fn contents(&self) -> Vec<u8> {
		self.scrollback.lock().iter().copied().collect()
	}

	pub fn mark_exited(&self, code: Option<i32>) {
		let mut exit = self.exit.lock();
		if exit.is_none() {
			*exit = Some(ExitStatus { code });
		}
	}

	pub fn exit_status(&self) -> Option<ExitStatus> {
		*self.exit.lock()
	}

	/// Releases the terminal: detaches its container, ends its input stream,
	/// and frees the scrollback. Idempotent.
	pub fn dispose(&self) {
		if self.disposed.swap(true, Ordering::SeqCst) {
			return;
		}
		self.container.detach();
		self.unsubscribe_input();
		self.scrollback.lock().clear();
		debug!(target = "webshell.term", session = %self.id, "disposed");
	}

	pub fn is_disposed(&self) -> bool {
		self.disposed.load(Ordering::SeqCst)
	}
}

impl Default for Term {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Debug for Term {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Term")
			.field("id", &self.id)
			.field("options", &*self.options.lock())
			.field("disposed", &self.is_disposed())
			.finish()
	}
}
