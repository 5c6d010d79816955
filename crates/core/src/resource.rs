//! Shell targets and lazy endpoint resolution.
//!
//! A [`ResourceDescriptor`] names one remote shell target. Its endpoint is
//! resolved at most once through its [`EndpointSource`] and cached; a failed
//! fetch leaves the cache empty so the next call retries. The descriptor also
//! holds the target's [`ConnectionManager`] once one exists.

use std::fmt;
use std::sync::{Arc, LazyLock};

use anyhow::Context;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::sync::Mutex as TokioMutex;
use tracing::{debug, info};
use webshell_runtime::{ConnectionManager, Connector};

use crate::error::{Error, Result};

static HTTP: LazyLock<reqwest::Client> = LazyLock::new(|| {
	reqwest::Client::builder()
		.user_agent(concat!("webshell/", env!("CARGO_PKG_VERSION")))
		.build()
		.unwrap_or_default()
});

/// Capability to fetch an endpoint for a named target.
#[async_trait]
pub trait FetchEndpoint: Send + Sync {
	async fn fetch_endpoint(&self, name: &str) -> anyhow::Result<String>;
}

/// How a resource obtains its endpoint.
#[derive(Clone)]
pub enum EndpointSource {
	/// The endpoint is known up front.
	Fixed,
	/// `GET url` returns `{"wsUrl": "..."}`.
	Discovery { url: String },
	/// Resolved by an embedder-supplied fetcher.
	Custom(Arc<dyn FetchEndpoint>),
}

impl fmt::Debug for EndpointSource {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			EndpointSource::Fixed => f.write_str("Fixed"),
			EndpointSource::Discovery { url } => f.debug_struct("Discovery").field("url", url).finish(),
			EndpointSource::Custom(_) => f.write_str("Custom"),
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiscoveryResponse {
	ws_url: String,
}

/// A named remote shell target.
pub struct ResourceDescriptor {
	name: String,
	source: EndpointSource,
	endpoint: Mutex<Option<String>>,
	manager: TokioMutex<Option<Arc<ConnectionManager>>>,
}

impl ResourceDescriptor {
	pub fn new(name: impl Into<String>, source: EndpointSource, endpoint: Option<String>) -> Self {
		Self {
			name: name.into(),
			source,
			endpoint: Mutex::new(endpoint),
			manager: TokioMutex::new(None),
		}
	}

	/// A resource whose endpoint is already known.
	pub fn with_endpoint(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
		Self::new(name, EndpointSource::Fixed, Some(endpoint.into()))
	}

	/// A resource whose endpoint is discovered over HTTP.
	pub fn discovered(name: impl Into<String>, url: impl Into<String>) -> Self {
		Self::new(name, EndpointSource::Discovery { url: url.into() }, None)
	}

	/// A resource resolved by `fetcher`.
	pub fn custom(name: impl Into<String>, fetcher: Arc<dyn FetchEndpoint>) -> Self {
		Self::new(name, EndpointSource::Custom(fetcher), None)
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn source(&self) -> &EndpointSource {
		&self.source
	}

	/// The endpoint, if already resolved.
	pub fn cached_endpoint(&self) -> Option<String> {
		self.endpoint.lock().clone()
	}

	/// Returns the cached endpoint, fetching and caching it on first use.
	///
	/// Concurrent first callers may each fetch; manager creation is where
	/// duplicate work is avoided.
	pub async fn get_endpoint(&self) -> Result<String> {
		if let Some(endpoint) = self.cached_endpoint() {
			return Ok(endpoint);
		}

		let endpoint = self.fetch_endpoint().await?;
		debug!(target = "webshell.resource", resource = %self.name, %endpoint, "endpoint resolved");
		*self.endpoint.lock() = Some(endpoint.clone());
		Ok(endpoint)
	}

	async fn fetch_endpoint(&self) -> Result<String> {
		let fetched = match &self.source {
			EndpointSource::Fixed => return Err(Error::EndpointUnavailable(self.name.clone())),
			EndpointSource::Discovery { url } => discover(url).await,
			EndpointSource::Custom(fetcher) => fetcher.fetch_endpoint(&self.name).await,
		};
		fetched.map_err(|source| Error::EndpointResolution {
			name: self.name.clone(),
			source,
		})
	}

	/// The live manager, unless none exists or one is being created.
	pub fn manager(&self) -> Option<Arc<ConnectionManager>> {
		self.manager.try_lock().ok().and_then(|slot| slot.clone())
	}

	/// Returns the cached manager, or resolves the endpoint and starts one.
	///
	/// Creation is serialized per resource: concurrent callers wait for the
	/// first one and then share its manager. A closed manager is replaced.
	pub(crate) async fn manager_or_connect(&self, connector: &dyn Connector) -> Result<Arc<ConnectionManager>> {
		let mut slot = self.manager.lock().await;
		if let Some(manager) = slot.as_ref() {
			if !manager.is_closed() {
				return Ok(Arc::clone(manager));
			}
			debug!(target = "webshell.resource", resource = %self.name, "replacing closed connection manager");
		}

		let endpoint = self.get_endpoint().await?;
		let parts = connector.connect(&endpoint).await?;
		let manager = ConnectionManager::start(endpoint, self.name.clone(), parts);
		*slot = Some(Arc::clone(&manager));
		info!(target = "webshell.resource", resource = %self.name, endpoint = manager.endpoint(), "connection manager created");
		Ok(manager)
	}
}

impl fmt::Debug for ResourceDescriptor {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ResourceDescriptor")
			.field("name", &self.name)
			.field("source", &self.source)
			.field("endpoint", &self.cached_endpoint())
			.finish()
	}
}

async fn discover(url: &str) -> anyhow::Result<String> {
	let response = HTTP
		.get(url)
		.send()
		.await
		.with_context(|| format!("GET {url}"))?
		.error_for_status()?;
	let body: DiscoveryResponse = response.json().await.context("invalid discovery response")?;
	Ok(body.ws_url)
}
