//! Remote store adapter.
//!
//! The remote store reads a key with `GET <base><key>` and writes it with
//! `POST <base><key>`. The actual HTTP client is abstracted via the
//! [`HttpClient`] trait so any library (reqwest, hyper, a test double) can
//! carry the requests.

use crate::config::{RemoteConfig, SyncConfig};
use crate::error::{SyncError, SyncResult};
use crate::local::{decode_local, encode_local};
use crate::state::{sync, SyncedState};
use crate::store::{Awaitable, StateStore};
use crate::value::StateValue;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// Read a value.
    Get,
    /// Write a value.
    Post,
}

impl HttpMethod {
    /// Returns the method name as sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Method.
    pub method: HttpMethod,
    /// Full URL.
    pub url: String,
    /// Headers, in the order they were configured.
    pub headers: Vec<(String, String)>,
    /// Body; `None` for reads.
    pub body: Option<String>,
}

/// A received response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Body text.
    pub body: String,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// A `200` response with the given body.
    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }
}

/// Future returned by [`HttpClient::send`].
pub type HttpFuture = Pin<Box<dyn Future<Output = Result<HttpResponse, String>> + Send>>;

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport. Errors are
/// plain messages; they surface as [`SyncError::Transport`].
pub trait HttpClient: Send + Sync + 'static {
    /// Sends a request.
    fn send(&self, request: HttpRequest) -> HttpFuture;
}

impl<C: HttpClient + ?Sized> HttpClient for Arc<C> {
    fn send(&self, request: HttpRequest) -> HttpFuture {
        (**self).send(request)
    }
}

/// Registry scope of every [`RemoteStore`].
pub const REMOTE_SCOPE: &str = "remote";

/// A store backed by a server.
pub struct RemoteStore<C: ?Sized> {
    client: Arc<C>,
    config: RemoteConfig,
}

impl<C: HttpClient> RemoteStore<C> {
    /// Creates a remote store.
    pub fn new(client: C, config: RemoteConfig) -> Self {
        Self::from_shared(Arc::new(client), config)
    }
}

impl<C: HttpClient + ?Sized> RemoteStore<C> {
    /// Creates a remote store over a shared client.
    pub fn from_shared(client: Arc<C>, config: RemoteConfig) -> Self {
        Self { client, config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    fn request(&self, method: HttpMethod, key: &str, body: Option<String>) -> HttpRequest {
        HttpRequest {
            method,
            url: self.config.url_for(key),
            headers: self.config.headers.clone(),
            body,
        }
    }
}

/// Sends `request` and checks the status.
async fn exchange<C>(client: Arc<C>, request: HttpRequest, config: &RemoteConfig) -> SyncResult<HttpResponse>
where
    C: HttpClient + ?Sized,
{
    let method = request.method;
    let url = request.url.clone();
    tracing::debug!(method = %method, url = %url, "sending request");

    let response = client.send(request).await.map_err(SyncError::Transport)?;
    if !config.accepts(response.status) {
        return Err(SyncError::HttpStatus {
            method: method.as_str(),
            url,
            status: response.status,
        });
    }

    Ok(response)
}

impl<C, V> StateStore<V> for RemoteStore<C>
where
    C: HttpClient + ?Sized,
    V: StateValue,
{
    fn read(&self, key: &str) -> Awaitable<Option<V>> {
        let client = Arc::clone(&self.client);
        let config = self.config.clone();
        let request = self.request(HttpMethod::Get, key, None);

        Awaitable::pending(async move {
            let response = exchange(client, request, &config).await?;
            // A non-JSON body is taken as text, like the local encoding.
            decode_local(&response.body)
        })
    }

    fn write(&self, key: &str, value: V) -> Awaitable<V> {
        let body = match encode_local(&value) {
            Ok(body) => body,
            Err(err) => return Awaitable::Ready(Err(err)),
        };
        let client = Arc::clone(&self.client);
        let config = self.config.clone();
        let request = self.request(HttpMethod::Post, key, Some(body));

        Awaitable::pending(async move {
            exchange(client, request, &config).await?;
            Ok(value)
        })
    }

    fn registry_scope(&self) -> &str {
        REMOTE_SCOPE
    }
}

impl<C: ?Sized> Clone for RemoteStore<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            config: self.config.clone(),
        }
    }
}

/// Mounts a cell synchronized with a server.
///
/// Requests are spawned on the ambient tokio runtime.
pub fn remote_state<V, C>(
    key: impl Into<String>,
    initial: V,
    client: Arc<C>,
    remote: RemoteConfig,
    config: SyncConfig,
) -> SyncedState<V>
where
    V: StateValue,
    C: HttpClient + ?Sized,
{
    sync(key, initial, RemoteStore::from_shared(client, remote), config)
}
