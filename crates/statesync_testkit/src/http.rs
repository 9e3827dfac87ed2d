//! A scripted HTTP client.
//!
//! Routes are registered per `(method, url)`. Unrouted requests fail with a
//! transport error, and every request is recorded.

use parking_lot::Mutex;
use statesync_engine::{HttpClient, HttpFuture, HttpMethod, HttpRequest, HttpResponse};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
enum Reply {
    Respond(HttpResponse),
    Fail(String),
}

#[derive(Default)]
struct Script {
    routes: HashMap<(HttpMethod, String), Reply>,
    requests: Vec<HttpRequest>,
}

/// An [`HttpClient`] answering from a script.
///
/// Clones share the script and the request log.
#[derive(Clone, Default)]
pub struct ScriptedHttpClient {
    script: Arc<Mutex<Script>>,
    delay: Option<Duration>,
}

impl ScriptedHttpClient {
    /// Creates a client with no routes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every response by `delay` on the tokio runtime.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Answers `GET url` with a 200 and `body`.
    pub fn on_get(self, url: &str, body: &str) -> Self {
        self.respond(HttpMethod::Get, url, HttpResponse::ok(body))
    }

    /// Answers `POST url` with a 200 and an empty body.
    pub fn accept_posts(self, url: &str) -> Self {
        self.respond(HttpMethod::Post, url, HttpResponse::ok(""))
    }

    /// Answers `method url` with `response`.
    pub fn respond(self, method: HttpMethod, url: &str, response: HttpResponse) -> Self {
        self.route(method, url, Reply::Respond(response));
        self
    }

    /// Fails `method url` at the transport level.
    pub fn fail(self, method: HttpMethod, url: &str, message: &str) -> Self {
        self.route(method, url, Reply::Fail(message.to_string()));
        self
    }

    fn route(&self, method: HttpMethod, url: &str, reply: Reply) {
        self.script.lock().routes.insert((method, url.to_string()), reply);
    }

    /// Returns every request sent so far.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.script.lock().requests.clone()
    }

    /// Returns the requests sent with `method`.
    pub fn requests_with(&self, method: HttpMethod) -> Vec<HttpRequest> {
        self.script
            .lock()
            .requests
            .iter()
            .filter(|request| request.method == method)
            .cloned()
            .collect()
    }
}

impl HttpClient for ScriptedHttpClient {
    fn send(&self, request: HttpRequest) -> HttpFuture {
        let reply = {
            let mut script = self.script.lock();
            let reply = script.routes.get(&(request.method, request.url.clone())).cloned();
            script.requests.push(request.clone());
            reply
        };

        tracing::trace!(method = %request.method, url = %request.url, "scripted request");
        let result = match reply {
            Some(Reply::Respond(response)) => Ok(response),
            Some(Reply::Fail(message)) => Err(message),
            None => Err(format!("no route for {} {}", request.method, request.url)),
        };

        let delay = self.delay;
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            result
        })
    }
}
