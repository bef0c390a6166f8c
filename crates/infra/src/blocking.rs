//! Blocking facade over [`RestClient`]
//!
//! Calls are driven to completion on a runtime owned by the facade. They go
//! through the same async client and coordinator, so blocking and async
//! callers of one client share a single handshake.
//!
//! Do not call these methods from inside an async runtime; tokio refuses to
//! block a worker thread.

use std::sync::Arc;

use bytes::Bytes;
use senserest_core::AuthState;
use senserest_domain::{RestError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::runtime::{Builder as RuntimeBuilder, Runtime};

use crate::api::{RawContent, RestClient};

/// Synchronous handle to a configured client
#[derive(Debug, Clone)]
pub struct BlockingRestClient {
    client: Arc<RestClient>,
    runtime: Arc<Runtime>,
}

impl BlockingRestClient {
    /// # Errors
    ///
    /// [`RestError::Config`] when the runtime cannot be started.
    pub fn new(client: RestClient) -> Result<Self> {
        Self::from_shared(Arc::new(client))
    }

    /// Facade over a client that async code keeps using as well
    ///
    /// # Errors
    ///
    /// [`RestError::Config`] when the runtime cannot be started.
    pub fn from_shared(client: Arc<RestClient>) -> Result<Self> {
        let runtime = RuntimeBuilder::new_multi_thread()
            .worker_threads(1)
            .thread_name("senserest-blocking")
            .enable_all()
            .build()
            .map_err(|e| RestError::Config(format!("Failed to start runtime: {e}")))?;
        Ok(Self { client, runtime: Arc::new(runtime) })
    }

    /// The async client behind this facade
    #[must_use]
    pub fn client(&self) -> &Arc<RestClient> {
        &self.client
    }

    #[must_use]
    pub fn auth_state(&self) -> AuthState {
        self.client.auth_state()
    }

    pub fn authenticate(&self) -> Result<()> {
        self.runtime.block_on(self.client.authenticate())
    }

    pub fn get(&self, endpoint: &str) -> Result<String> {
        self.runtime.block_on(self.client.get(endpoint))
    }

    pub fn get_bytes(&self, endpoint: &str) -> Result<Bytes> {
        self.runtime.block_on(self.client.get_bytes(endpoint))
    }

    pub fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        self.runtime.block_on(self.client.get_json(endpoint))
    }

    pub fn post(&self, endpoint: &str, body: impl Into<String>) -> Result<String> {
        self.runtime.block_on(self.client.post(endpoint, body))
    }

    pub fn post_bytes(&self, endpoint: &str, body: impl Into<Bytes>) -> Result<String> {
        self.runtime.block_on(self.client.post_bytes(endpoint, body))
    }

    pub fn post_raw(&self, endpoint: &str, content: RawContent) -> Result<String> {
        self.runtime.block_on(self.client.post_raw(endpoint, content))
    }

    pub fn post_json<B, R>(&self, endpoint: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.runtime.block_on(self.client.post_json(endpoint, body))
    }

    pub fn put(&self, endpoint: &str, body: impl Into<String>) -> Result<String> {
        self.runtime.block_on(self.client.put(endpoint, body))
    }

    pub fn put_bytes(&self, endpoint: &str, body: impl Into<Bytes>) -> Result<String> {
        self.runtime.block_on(self.client.put_bytes(endpoint, body))
    }

    pub fn put_raw(&self, endpoint: &str, content: RawContent) -> Result<String> {
        self.runtime.block_on(self.client.put_raw(endpoint, content))
    }

    pub fn put_json<B, R>(&self, endpoint: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.runtime.block_on(self.client.put_json(endpoint, body))
    }

    pub fn delete(&self, endpoint: &str) -> Result<String> {
        self.runtime.block_on(self.client.delete(endpoint))
    }

    pub fn fetch_all<T: DeserializeOwned>(&self, endpoint: &str) -> Result<Vec<T>> {
        self.runtime.block_on(self.client.fetch_all(endpoint))
    }

    pub fn fetch_all_items(
        &self,
        resource_type: Option<&str>,
        page_size: u32,
    ) -> Result<Vec<serde_json::Value>> {
        self.runtime.block_on(self.client.fetch_all_items(resource_type, page_size))
    }
}
