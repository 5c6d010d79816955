//! Opening transports from endpoint strings.

use std::future::Future;
use std::pin::Pin;

use tokio::net::TcpStream;
use tracing::debug;

use crate::error::{Error, Result};
use crate::transport::{PipeTransport, TransportParts, WebSocketTransport};

/// Opens a transport for an endpoint.
///
/// The session directory goes through this seam so embedders can supply their
/// own transports.
pub trait Connector: Send + Sync {
	fn connect<'a>(&'a self, endpoint: &'a str) -> Pin<Box<dyn Future<Output = Result<TransportParts>> + Send + 'a>>;
}

/// Default connector keyed on the endpoint scheme.
///
/// - `ws://` and `wss://`: [`WebSocketTransport`]
/// - `tcp://host:port`: length-prefixed [`PipeTransport`] over TCP
#[derive(Debug, Default, Clone, Copy)]
pub struct EndpointConnector;

impl EndpointConnector {
	async fn connect_tcp(endpoint: &str, addr: &str) -> Result<TransportParts> {
		let stream = TcpStream::connect(addr).await.map_err(|e| Error::ConnectionFailed {
			endpoint: endpoint.to_string(),
			reason: e.to_string(),
		})?;
		stream.set_nodelay(true)?;
		let (read_half, write_half) = stream.into_split();
		let (transport, message_rx) = PipeTransport::new(write_half, read_half);
		Ok(transport.into_transport_parts(message_rx))
	}
}

impl Connector for EndpointConnector {
	fn connect<'a>(&'a self, endpoint: &'a str) -> Pin<Box<dyn Future<Output = Result<TransportParts>> + Send + 'a>> {
		Box::pin(async move {
			debug!(target = "webshell.transport", endpoint, "connecting");
			if endpoint.starts_with("ws://") || endpoint.starts_with("wss://") {
				WebSocketTransport::connect(endpoint).await
			} else if let Some(addr) = endpoint.strip_prefix("tcp://") {
				let addr = addr.trim_end_matches('/');
				Self::connect_tcp(endpoint, addr).await
			} else {
				Err(Error::UnsupportedEndpoint(endpoint.to_string()))
			}
		})
	}
}
