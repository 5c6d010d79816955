//! Wire types for the webshell multiplexing protocol.
//!
//! A single transport to a shell target carries many logical channels. Every
//! message on the wire is one [`Frame`], a JSON object tagged by `"type"`:
//!
//! 1. Client sends [`Frame::Open`] to start a shell on a fresh channel
//! 2. Both sides exchange [`Frame::Data`] (base64 payloads) on that channel
//! 3. Client sends [`Frame::Resize`] whenever the terminal changes size
//! 4. Client sends [`Frame::Close`] to tear the channel down, or the server
//!    sends [`Frame::Exit`] when the remote shell terminates
//!
//! Types in this crate are pure data; the runtime crate owns all behavior.

pub mod frame;

pub use frame::*;
