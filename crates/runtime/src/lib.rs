//! webshell runtime - transports, connection managers, and the session registry
//!
//! This crate provides the connection-side machinery behind multiplexed shell
//! sessions:
//!
//! - **Transport**: JSON frames over WebSocket or length-prefixed byte streams
//! - **Connector**: opening a transport from an opaque endpoint string
//! - **ConnectionManager**: one transport per target, demultiplexed into
//!   per-session channels by its [`ShellService`]
//! - **SessionRegistry**: side-table from a live session to its manager
//! - **Term**: the terminal widget handle shared with the UI side
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐
//! │   webshell   │  Session directory, resources, settings
//! └──────┬───────┘
//!        │ add / remove sessions
//! ┌──────▼───────┐
//! │   runtime    │  This crate
//! │  ┌────────┐  │
//! │  │Manager │  │  Channel multiplexing
//! │  └────────┘  │
//! │  ┌────────┐  │
//! │  │Registry│  │  session -> manager
//! │  └────────┘  │
//! │  ┌────────┐  │
//! │  │ Trans  │  │  WebSocket / pipe transport
//! │  └────────┘  │
//! └──────────────┘
//! ```

pub mod connector;
pub mod error;
pub mod manager;
pub mod registry;
pub mod term;
pub mod testing;
pub mod transport;

pub use connector::{Connector, EndpointConnector};
pub use error::{Error, Result};
pub use manager::{ConnectionManager, ShellService};
pub use registry::SessionRegistry;
pub use term::{Container, ExitStatus, SessionId, Term, TermInput, TermOptions, Theme};
pub use transport::{
	PipeTransport, PipeTransportReceiver, PipeTransportSender, Transport, TransportParts, TransportReceiver, WebSocketTransport,
	WebSocketTransportReceiver, WebSocketTransportSender,
};
pub use webshell_protocol::{ChannelId, Frame};
