use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use webshell_protocol::ChannelId;

use super::*;
use crate::error::{Error, Result};
use crate::term::{ExitStatus, Term};
use crate::testing::pipe_pair;
use crate::transport::{Transport, TransportReceiver};

/// Sender whose every write fails, as on a reset socket.
struct BrokenSender;

impl Transport for BrokenSender {
	fn send(&mut self, _message: Value) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
		Box::pin(async { Err(Error::TransportError("connection reset".to_string())) })
	}

	fn close(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
		Box::pin(async { Ok(()) })
	}
}

/// Receiver that never yields and keeps the inbound channel open.
struct SilentReceiver {
	_message_tx: mpsc::UnboundedSender<Value>,
}

impl TransportReceiver for SilentReceiver {
	fn run(self: Box<Self>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> {
		Box::pin(async move {
			let _keep_open = self;
			std::future::pending::<()>().await;
			Ok(())
		})
	}
}

fn write_broken_parts() -> TransportParts {
	let (message_tx, message_rx) = mpsc::unbounded_channel();
	TransportParts {
		sender: Box::new(BrokenSender),
		receiver: Box::new(SilentReceiver { _message_tx: message_tx }),
		message_rx,
	}
}

async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
	for _ in 0..200 {
		if condition() {
			return true;
		}
		tokio::time::sleep(Duration::from_millis(5)).await;
	}
	condition()
}

#[tokio::test]
async fn test_add_session_sends_open_with_term_size() {
	let (parts, mut shell) = pipe_pair();
	let manager = ConnectionManager::start("tcp://host-a:22", "host-a", parts);
	let term = Arc::new(Term::new());
	term.resize(100, 30);

	let channel = manager.shell().add_session(&term).unwrap();

	assert_eq!(channel, ChannelId(1));
	assert_eq!(
		shell.next_frame().await,
		Some(Frame::Open {
			channel,
			cols: 100,
			rows: 30
		})
	);
	assert_eq!(manager.shell().channel_of(term.id()), Some(channel));
}

#[tokio::test]
async fn test_sessions_share_one_transport_on_distinct_channels() {
	let (parts, mut shell) = pipe_pair();
	let manager = ConnectionManager::start("tcp://host-a:22", "host-a", parts);
	let a = Arc::new(Term::new());
	let b = Arc::new(Term::new());

	let ch_a = manager.shell().add_session(&a).unwrap();
	let ch_b = manager.shell().add_session(&b).unwrap();
	assert_ne!(ch_a, ch_b);
	assert_eq!(manager.shell().sessions(), vec![a.id(), b.id()]);

	assert_eq!(shell.next_frame().await.map(|f| f.channel()), Some(ch_a));
	assert_eq!(shell.next_frame().await.map(|f| f.channel()), Some(ch_b));

	shell.write(ch_b, b"only b").await.unwrap();
	assert!(eventually(|| b.contents() == b"only b").await);
	assert!(a.contents().is_empty());
}

#[tokio::test]
async fn test_add_same_session_twice_is_rejected() {
	let (parts, _shell) = pipe_pair();
	let manager = ConnectionManager::start("tcp://host-a:22", "host-a", parts);
	let term = Arc::new(Term::new());

	manager.shell().add_session(&term).unwrap();
	let err = manager.shell().add_session(&term).unwrap_err();
	assert!(matches!(err, Error::AlreadyAttached { session } if session == term.id()));
	assert_eq!(manager.shell().session_count(), 1);
}

#[tokio::test]
async fn test_input_is_forwarded_after_open() {
	let (parts, mut shell) = pipe_pair();
	let manager = ConnectionManager::start("tcp://host-a:22", "host-a", parts);
	let term = Arc::new(Term::new());

	let channel = manager.shell().add_session(&term).unwrap();
	term.input("uptime\n");
	term.resize(132, 43);

	assert!(matches!(shell.next_frame().await, Some(Frame::Open { .. })));
	assert_eq!(shell.next_frame().await, Some(Frame::data(channel, b"uptime\n")));
	assert_eq!(
		shell.next_frame().await,
		Some(Frame::Resize {
			channel,
			cols: 132,
			rows: 43
		})
	);
}

#[tokio::test]
async fn test_remove_session_sends_close_once() {
	let (parts, mut shell) = pipe_pair();
	let manager = ConnectionManager::start("tcp://host-a:22", "host-a", parts);
	let term = Arc::new(Term::new());

	let channel = manager.shell().add_session(&term).unwrap();
	assert!(manager.shell().remove_session(&term));
	assert!(!manager.shell().remove_session(&term));

	assert!(matches!(shell.next_frame().await, Some(Frame::Open { .. })));
	assert_eq!(shell.next_frame().await, Some(Frame::Close { channel }));
	assert_eq!(shell.try_next_frame(Duration::from_millis(50)).await, None);
	assert_eq!(manager.shell().session_count(), 0);
	assert_eq!(manager.shell().channel_of(term.id()), None);
}

#[tokio::test]
async fn test_remove_unattached_session_is_noop() {
	let (parts, mut shell) = pipe_pair();
	let manager = ConnectionManager::start("tcp://host-a:22", "host-a", parts);
	let stranger = Term::new();

	assert!(!manager.shell().remove_session(&stranger));
	assert_eq!(shell.try_next_frame(Duration::from_millis(50)).await, None);
}

#[tokio::test]
async fn test_input_stops_after_remove() {
	let (parts, mut shell) = pipe_pair();
	let manager = ConnectionManager::start("tcp://host-a:22", "host-a", parts);
	let term = Arc::new(Term::new());

	let channel = manager.shell().add_session(&term).unwrap();
	manager.shell().remove_session(&term);
	tokio::task::yield_now().await;
	term.input("ignored");

	assert!(matches!(shell.next_frame().await, Some(Frame::Open { .. })));
	assert_eq!(shell.next_frame().await, Some(Frame::Close { channel }));
	assert_eq!(shell.try_next_frame(Duration::from_millis(50)).await, None);
}

#[tokio::test]
async fn test_exit_frame_marks_term_and_releases_channel() {
	let (parts, mut shell) = pipe_pair();
	let manager = ConnectionManager::start("tcp://host-a:22", "host-a", parts);
	let term = Arc::new(Term::new());

	let channel = manager.shell().add_session(&term).unwrap();
	shell.send(Frame::Exit { channel, code: Some(130) }).await.unwrap();

	assert!(eventually(|| term.exit_status().is_some()).await);
	assert_eq!(term.exit_status(), Some(ExitStatus { code: Some(130) }));
	assert_eq!(manager.shell().session_count(), 0);

	assert!(!manager.shell().remove_session(&term));
	assert!(matches!(shell.next_frame().await, Some(Frame::Open { .. })));
	assert_eq!(shell.try_next_frame(Duration::from_millis(50)).await, None);
}

#[tokio::test]
async fn test_unknown_and_malformed_frames_are_ignored() {
	let (parts, mut shell) = pipe_pair();
	let manager = ConnectionManager::start("tcp://host-a:22", "host-a", parts);
	let term = Arc::new(Term::new());
	let channel = manager.shell().add_session(&term).unwrap();

	shell.write(ChannelId(99), b"nobody").await.unwrap();
	shell.send_raw(serde_json::json!({"type": "teleport"})).await.unwrap();
	shell
		.send(Frame::Data {
			channel,
			data: "%%%".to_string(),
		})
		.await
		.unwrap();
	shell.write(channel, b"ok").await.unwrap();

	assert!(eventually(|| term.contents() == b"ok").await);
	assert!(!manager.is_closed());
}

#[tokio::test]
async fn test_transport_loss_closes_manager() {
	let (parts, mut shell) = pipe_pair();
	let manager = ConnectionManager::start("tcp://host-a:22", "host-a", parts);
	let term = Arc::new(Term::new());
	manager.shell().add_session(&term).unwrap();

	shell.hang_up();

	assert!(eventually(|| manager.is_closed()).await);
	assert_eq!(term.exit_status(), Some(ExitStatus { code: None }));

	let late = Arc::new(Term::new());
	let err = manager.shell().add_session(&late).unwrap_err();
	assert!(matches!(err, Error::ManagerClosed { ref endpoint } if endpoint == "tcp://host-a:22"));
	assert!(err.is_closed());
}

#[tokio::test]
async fn test_explicit_close() {
	let (parts, _shell) = pipe_pair();
	let manager = ConnectionManager::start("tcp://host-a:22", "host-a", parts);
	let term = Arc::new(Term::new());
	manager.shell().add_session(&term).unwrap();

	manager.close();

	assert!(manager.is_closed());
	assert_eq!(manager.shell().session_count(), 0);
	assert!(manager.shell().add_session(&Arc::new(Term::new())).is_err());
	assert_eq!(manager.endpoint(), "tcp://host-a:22");
	assert_eq!(manager.resource(), "host-a");
}

#[tokio::test]
async fn test_write_failure_closes_manager_and_exits_sessions() {
	let manager = ConnectionManager::start("tcp://host-a:22", "host-a", write_broken_parts());
	let term = Arc::new(Term::new());

	// The open frame is the first write, and it fails.
	manager.shell().add_session(&term).unwrap();

	assert!(eventually(|| manager.is_closed()).await);
	assert!(eventually(|| manager.shell().session_count() == 0).await);
	assert_eq!(term.exit_status(), Some(ExitStatus { code: None }));
	assert!(manager.shell().add_session(&Arc::new(Term::new())).unwrap_err().is_closed());
}

#[tokio::test]
async fn test_dropping_manager_exits_sessions() {
	let (parts, _shell) = pipe_pair();
	let manager = ConnectionManager::start("tcp://host-a:22", "host-a", parts);
	let term = Arc::new(Term::new());
	manager.shell().add_session(&term).unwrap();
	assert_eq!(term.exit_status(), None);

	drop(manager);

	assert_eq!(term.exit_status(), Some(ExitStatus { code: None }));
}

#[tokio::test]
async fn test_close_gracefully_flushes_queued_frames() {
	let (parts, mut shell) = pipe_pair();
	let manager = ConnectionManager::start("tcp://host-a:22", "host-a", parts);
	let term = Arc::new(Term::new());
	let channel = manager.shell().add_session(&term).unwrap();
	assert!(manager.shell().remove_session(&term));

	manager.close_gracefully().await;

	assert!(manager.is_closed());
	assert!(matches!(shell.next_frame().await, Some(Frame::Open { channel: c, .. }) if c == channel));
	assert_eq!(shell.next_frame().await, Some(Frame::Close { channel }));
	// The transport was shut down after the flush.
	assert_eq!(shell.next_frame().await, None);
	assert!(manager.shell().add_session(&Arc::new(Term::new())).is_err());

	// A second call is harmless.
	manager.close_gracefully().await;
}

#[tokio::test]
async fn test_channel_ids_do_not_wrap() {
	let (parts, mut shell) = pipe_pair();
	let manager = ConnectionManager::start("tcp://host-a:22", "host-a", parts);
	manager.shell().set_next_channel(u32::MAX);
	let last = Arc::new(Term::new());
	let extra = Arc::new(Term::new());

	assert_eq!(manager.shell().add_session(&last).unwrap(), ChannelId(u32::MAX));
	let err = manager.shell().add_session(&extra).unwrap_err();

	assert!(matches!(err, Error::ChannelsExhausted { ref endpoint } if endpoint == "tcp://host-a:22"));
	assert!(!err.is_closed());
	assert_eq!(manager.shell().channel_of(last.id()), Some(ChannelId(u32::MAX)));
	assert_eq!(manager.shell().channel_of(extra.id()), None);
	assert_eq!(manager.shell().session_count(), 1);

	shell.next_frame().await;
	shell.write(ChannelId(u32::MAX), b"still here").await.unwrap();
	assert!(eventually(|| last.contents() == b"still here").await);
}
