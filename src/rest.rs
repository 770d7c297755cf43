use crate::client::{ClientConfig, ClientOptions};
use crate::error::{Result, TumblrError};
use crate::oauth::sign_request;
use crate::request::{build_request, HttpMethod, LogicalRequest, Params, WireRequest};
use crate::response::{normalize, Outcome};
use crate::transport::{Transport, TransportResponse};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Completion callback: the unwrapped response (or error) and the raw
/// transport response when one was received.
pub type Callback = Box<dyn FnOnce(Result<Value>, Option<TransportResponse>) + Send + 'static>;

/// Deferred result of a call made without a callback
pub type Deferred = Pin<Box<dyn Future<Output = Result<Value>> + Send + 'static>>;

/// Box a closure as a [`Callback`]
pub fn callback<F>(f: F) -> Callback
where
    F: FnOnce(Result<Value>, Option<TransportResponse>) + Send + 'static,
{
    Box::new(f)
}

/// What a dispatched call hands back to its caller
#[must_use = "a deferred call does nothing unless awaited"]
pub enum Dispatch {
    /// No callback was given; await this for the result
    Deferred(Deferred),
    /// The callback owns the result; nothing is returned
    Callback,
}

impl Dispatch {
    /// The deferred value, if the call was not made with a callback
    pub fn into_deferred(self) -> Option<Deferred> {
        match self {
            Dispatch::Deferred(deferred) => Some(deferred),
            Dispatch::Callback => None,
        }
    }

    pub fn is_callback(&self) -> bool {
        matches!(self, Dispatch::Callback)
    }
}

impl std::fmt::Debug for Dispatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dispatch::Deferred(_) => f.write_str("Dispatch::Deferred(..)"),
            Dispatch::Callback => f.write_str("Dispatch::Callback"),
        }
    }
}

/// Parameters plus an optional trailing callback, as resolved at the
/// public-method boundary.
#[derive(Default)]
pub struct CallArgs {
    pub params: Params,
    pub callback: Option<Callback>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(params: Params) -> Self {
        CallArgs {
            params,
            callback: None,
        }
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<crate::request::ParamValue>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn callback<F>(mut self, f: F) -> Self
    where
        F: FnOnce(Result<Value>, Option<TransportResponse>) + Send + 'static,
    {
        self.callback = Some(Box::new(f));
        self
    }
}

impl std::fmt::Debug for CallArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallArgs")
            .field("params", &self.params)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

/// Tumblr API client.
///
/// Clones share the configuration and the promise-mode toggle.
#[derive(Clone)]
pub struct Client {
    config: Arc<ClientConfig>,
    promise_mode: Arc<AtomicBool>,
}

impl Client {
    /// Create a client from options with the default transport
    pub fn new(options: ClientOptions) -> Result<Self> {
        Ok(Self::with_config(ClientConfig::from_options(&options)?))
    }

    /// Create a client from options with an injected transport
    pub fn with_transport(options: ClientOptions, transport: Arc<dyn Transport>) -> Result<Self> {
        Ok(Self::with_config(ClientConfig::from_options_with_transport(
            &options, transport,
        )?))
    }

    /// Create a client from a prepared configuration
    pub fn with_config(config: ClientConfig) -> Self {
        let promise_mode = Arc::new(AtomicBool::new(config.return_promises));
        Client {
            config: Arc::new(config),
            promise_mode,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Make endpoint methods always return deferred values.
    ///
    /// Must not be flipped while calls relying on the other mode are in flight.
    pub fn return_promises(&self) {
        self.set_promise_mode(true);
    }

    pub fn set_promise_mode(&self, enabled: bool) {
        self.promise_mode.store(enabled, Ordering::SeqCst);
    }

    pub fn promise_mode(&self) -> bool {
        self.promise_mode.load(Ordering::SeqCst)
    }

    /// Build and sign the wire request for `request`
    pub fn prepare(&self, request: &LogicalRequest) -> Result<WireRequest> {
        prepare_wire(&self.config, request)
    }

    /// Run one request to a terminal state
    pub async fn send(&self, request: LogicalRequest) -> Result<Value> {
        round_trip(Arc::clone(&self.config), request).await.0
    }

    /// Run a request, invoking `callback` if given or returning a deferred value otherwise
    pub fn execute(&self, request: LogicalRequest, callback: Option<Callback>) -> Dispatch {
        let config = Arc::clone(&self.config);
        match callback {
            None => Dispatch::Deferred(Box::pin(async move { round_trip(config, request).await.0 })),
            Some(callback) => {
                match tokio::runtime::Handle::try_current() {
                    Ok(handle) => {
                        handle.spawn(async move {
                            let (result, raw) = round_trip(config, request).await;
                            callback(result, raw);
                        });
                    }
                    Err(e) => callback(
                        Err(TumblrError::Config(format!("no async runtime to run the request: {e}"))),
                        None,
                    ),
                }
                Dispatch::Callback
            }
        }
    }

    /// GET `path` with query parameters
    pub async fn get_request(&self, path: &str, params: Params) -> Result<Value> {
        self.send(LogicalRequest::new(HttpMethod::Get, path).with_params(params))
            .await
    }

    /// POST `path` with a JSON or multipart body
    pub async fn post_request(&self, path: &str, params: Params) -> Result<Value> {
        self.send(LogicalRequest::new(HttpMethod::Post, path).with_params(params))
            .await
    }

    /// PUT `path` with a JSON or multipart body
    pub async fn put_request(&self, path: &str, params: Params) -> Result<Value> {
        self.send(LogicalRequest::new(HttpMethod::Put, path).with_params(params))
            .await
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("promise_mode", &self.promise_mode())
            .finish()
    }
}

fn prepare_wire(config: &ClientConfig, request: &LogicalRequest) -> Result<WireRequest> {
    let mut wire = build_request(request, &config.base_url, &config.user_agent)?;
    sign_request(&mut wire, &config.credentials)?;
    Ok(wire)
}

// Build, sign, send once and normalize. Never retries.
async fn round_trip(
    config: Arc<ClientConfig>,
    request: LogicalRequest,
) -> (Result<Value>, Option<TransportResponse>) {
    let wire = match prepare_wire(&config, &request) {
        Ok(wire) => wire,
        Err(e) => return (Err(e), None),
    };

    let method = wire.method;
    let endpoint = wire.base_url();
    debug!(%method, url = %endpoint, body = wire.body.kind(), bytes = wire.body.len(), "sending request");

    let start = Instant::now();
    let raw = match config.transport.send(wire).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(%method, url = %endpoint, error = %e, "transport failed");
            return (Err(TumblrError::Transport(e)), None);
        }
    };

    let result = normalize(method, &raw);
    debug!(
        %method,
        url = %endpoint,
        status = raw.status,
        outcome = ?Outcome::of(&result),
        elapsed = ?start.elapsed(),
        "request finished"
    );
    (result, Some(raw))
}
