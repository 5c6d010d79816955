//! Frame definitions and payload encoding.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

/// Logical channel within one transport.
///
/// Channel `0` is reserved; allocators start at `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub u32);

impl ChannelId {
	pub const RESERVED: ChannelId = ChannelId(0);
}

impl fmt::Display for ChannelId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "ch{}", self.0)
	}
}

/// One message on a multiplexed shell transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Frame {
	/// Opens a shell on `channel` with the initial terminal size.
	Open { channel: ChannelId, cols: u16, rows: u16 },
	/// Terminal bytes for `channel`, base64 encoded on the wire.
	Data { channel: ChannelId, data: String },
	/// Terminal size change for `channel`.
	Resize { channel: ChannelId, cols: u16, rows: u16 },
	/// Client-initiated teardown of `channel`.
	Close { channel: ChannelId },
	/// Server-side shell on `channel` terminated.
	Exit {
		channel: ChannelId,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		code: Option<i32>,
	},
}

impl Frame {
	/// Builds a [`Frame::Data`] carrying `bytes`.
	pub fn data(channel: ChannelId, bytes: &[u8]) -> Self {
		Frame::Data {
			channel,
			data: STANDARD.encode(bytes),
		}
	}

	/// Channel this frame addresses.
	pub fn channel(&self) -> ChannelId {
		match self {
			Frame::Open { channel, .. }
			| Frame::Data { channel, .. }
			| Frame::Resize { channel, .. }
			| Frame::Close { channel }
			| Frame::Exit { channel, .. } => *channel,
		}
	}

	/// Decodes the payload of a [`Frame::Data`]; `None` for other frames.
	pub fn payload(&self) -> Option<Result<Vec<u8>, base64::DecodeError>> {
		match self {
			Frame::Data { data, .. } => Some(STANDARD.decode(data)),
			_ => None,
		}
	}

	/// Short frame kind, used in log fields.
	pub fn kind(&self) -> &'static str {
		match self {
			Frame::Open { .. } => "open",
			Frame::Data { .. } => "data",
			Frame::Resize { .. } => "resize",
			Frame::Close { .. } => "close",
			Frame::Exit { .. } => "exit",
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn open_frame_wire_shape() {
		let frame = Frame::Open {
			channel: ChannelId(3),
			cols: 80,
			rows: 24,
		};
		let value = serde_json::to_value(&frame).unwrap();
		assert_eq!(value, serde_json::json!({"type": "open", "channel": 3, "cols": 80, "rows": 24}));
	}

	#[test]
	fn data_payload_is_base64() {
		let frame = Frame::data(ChannelId(1), b"ls -la\n");
		let value = serde_json::to_value(&frame).unwrap();
		assert_eq!(value["data"], "bHMgLWxhCg==");
		assert_eq!(frame.payload().unwrap().unwrap(), b"ls -la\n");
	}

	#[test]
	fn exit_code_is_optional() {
		let frame: Frame = serde_json::from_str(r#"{"type": "exit", "channel": 2}"#).unwrap();
		assert_eq!(frame, Frame::Exit { channel: ChannelId(2), code: None });
		assert_eq!(frame.channel(), ChannelId(2));
		assert!(frame.payload().is_none());
	}

	#[test]
	fn unknown_frame_type_is_rejected() {
		let result = serde_json::from_str::<Frame>(r#"{"type": "bogus", "channel": 1}"#);
		assert!(result.is_err());
	}

	#[test]
	fn invalid_payload_reports_decode_error() {
		let frame = Frame::Data {
			channel: ChannelId(1),
			data: "not base64!".to_string(),
		};
		assert!(frame.payload().unwrap().is_err());
	}
}
