//! `webshell open`: attach the terminal to one or more remote sessions.
//!
//! Every opened session's output is copied to `output`. Input from `input`
//! goes to the focused session (the last one opened). The command ends on
//! input EOF, Ctrl-C, or when every session has exited, and then removes all
//! sessions through the directory and flushes their connections.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use webshell::{ConnectionManager, SessionDirectory, TargetRef, Term};

use crate::cli::OpenArgs;
use crate::error::{CliError, Result};

const INPUT_CHUNK: usize = 4096;
const EXIT_POLL: Duration = Duration::from_millis(200);

/// Why an `open` run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
	InputClosed,
	AllExited,
	Interrupted,
}

pub async fn run_open<R, W>(directory: &SessionDirectory, args: &OpenArgs, input: R, output: W) -> Result<OpenOutcome>
where
	R: AsyncRead + Unpin,
	W: AsyncWrite + Unpin + Send + 'static,
{
	if directory.catalog().is_empty() {
		return Err(CliError::NoTargets);
	}

	let targets: Vec<TargetRef> = if args.targets.is_empty() {
		vec![TargetRef::Selected]
	} else {
		args.targets.iter().cloned().map(TargetRef::from).collect()
	};

	let output = Arc::new(Mutex::new(output));
	let mut pumps = Vec::with_capacity(targets.len());
	let mut opened = Vec::with_capacity(targets.len());
	for target in targets {
		let term = match directory.add(target).await {
			Ok(term) => term,
			Err(e) => {
				stop(&pumps);
				close_all(directory).await;
				return Err(e.into());
			}
		};
		let options = term.options();
		term.resize(args.cols.unwrap_or(options.cols), args.rows.unwrap_or(options.rows));
		pumps.push(spawn_output_pump(&term, Arc::clone(&output)));
		opened.push(term);
	}

	if let Some(last) = opened.last() {
		last.container().focus_in();
	}

	let outcome = forward_input(directory, input, &opened).await;

	stop(&pumps);
	let removed = close_all(directory).await;
	let _ = output.lock().await.flush().await;
	info!(target = "webshell.cli", removed, ?outcome, "sessions closed");
	outcome
}

/// Removes every session, then waits for each connection to deliver its close
/// frames and shut down.
async fn close_all(directory: &SessionDirectory) -> usize {
	let mut managers: Vec<Arc<ConnectionManager>> = Vec::new();
	for manager in directory.sessions().iter().filter_map(|term| directory.manager_of(term)) {
		if !managers.iter().any(|m| Arc::ptr_eq(m, &manager)) {
			managers.push(manager);
		}
	}

	let removed = directory.clear();
	for manager in managers {
		manager.close_gracefully().await;
	}
	removed
}

fn stop(pumps: &[JoinHandle<()>]) {
	for pump in pumps {
		pump.abort();
	}
}

fn spawn_output_pump<W>(term: &Arc<Term>, output: Arc<Mutex<W>>) -> JoinHandle<()>
where
	W: AsyncWrite + Unpin + Send + 'static,
{
	let mut rx = term.subscribe_output();
	let session = term.id();
	tokio::spawn(async move {
		loop {
			match rx.recv().await {
				Ok(bytes) => {
					let mut out = output.lock().await;
					if out.write_all(&bytes).await.is_err() || out.flush().await.is_err() {
						debug!(target = "webshell.cli", %session, "output closed");
						return;
					}
				}
				Err(RecvError::Lagged(skipped)) => {
					warn!(target = "webshell.cli", %session, skipped, "output lagged, chunks dropped");
				}
				Err(RecvError::Closed) => return,
			}
		}
	})
}

async fn forward_input<R>(directory: &SessionDirectory, mut input: R, sessions: &[Arc<Term>]) -> Result<OpenOutcome>
where
	R: AsyncRead + Unpin,
{
	let mut buf = vec![0u8; INPUT_CHUNK];
	let mut poll = tokio::time::interval(EXIT_POLL);

	loop {
		tokio::select! {
			read = input.read(&mut buf) => {
				let n = read?;
				if n == 0 {
					debug!(target = "webshell.cli", "input closed");
					return Ok(OpenOutcome::InputClosed);
				}
				match directory.last_focused().or_else(|| sessions.last().cloned()) {
					Some(term) => term.input(buf[..n].to_vec()),
					None => debug!(target = "webshell.cli", bytes = n, "no session to receive input"),
				}
			}
			_ = poll.tick() => {
				if sessions.iter().all(|t| t.exit_status().is_some()) {
					info!(target = "webshell.cli", "all sessions exited");
					return Ok(OpenOutcome::AllExited);
				}
			}
			_ = tokio::signal::ctrl_c() => {
				return Ok(OpenOutcome::Interrupted);
			}
		}
	}
}
