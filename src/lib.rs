//! # tumblr-rest - Tumblr REST API client for Rust
//!
//! An async client for the Tumblr v2 API. It turns logical API calls into
//! signed HTTP requests, validates the `{meta, response}` envelope every
//! response is wrapped in, and hands back the unwrapped `response` value.
//!
//! ## Features
//!
//! - Three authentication modes, picked from the supplied credentials:
//!   - none
//!   - API key (`api_key` query parameter)
//!   - OAuth1 HMAC-SHA1 signed `Authorization` header
//! - JSON bodies for plain parameters, `multipart/form-data` when binary
//!   attachments are present
//! - Typed errors for configuration, signing, transport, HTTP and envelope failures
//! - Callback or deferred (`Future`) calling conventions
//! - Injectable HTTP transport
//!
//! ## Basic Usage
//!
//! ```no_run
//! use tumblr_rest::{Client, ClientOptions, LogicalRequest};
//!
//! # async fn run() -> Result<(), tumblr_rest::TumblrError> {
//! let client = Client::new(ClientOptions::api_key("consumer-key"))?;
//!
//! let info = client
//!     .send(LogicalRequest::get("/v2/blog/staff.tumblr.com/info"))
//!     .await?;
//! println!("{}", info["blog"]["title"]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Endpoints and callbacks
//!
//! ```no_run
//! use tumblr_rest::{endpoints, CallArgs, Client, ClientOptions};
//!
//! # fn run() -> Result<(), tumblr_rest::TumblrError> {
//! let client = Client::new(ClientOptions::oauth1("ck", "cs", "token", "token-secret"))?;
//!
//! let dispatch = client.call(
//!     &endpoints::USER_DASHBOARD,
//!     &[],
//!     CallArgs::new().param("limit", 5).callback(|result, _raw| match result {
//!         Ok(dashboard) => println!("{dashboard}"),
//!         Err(e) => eprintln!("{e}"),
//!     }),
//! );
//! assert!(dispatch.is_callback());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod credentials;
pub mod endpoints;
pub mod error;
pub mod multipart;
pub mod oauth;
pub mod request;
pub mod response;
pub mod rest;
pub mod transport;

// Re-export main types for convenience
pub use client::{ClientConfig, ClientOptions};
pub use credentials::{Credentials, OAuth1Credentials};
pub use endpoints::Endpoint;
pub use error::{ApiErrorDetail, Result, TumblrError};
pub use request::{Attachment, Body, HttpMethod, LogicalRequest, ParamValue, Params, WireRequest};
pub use response::{normalize, Envelope, Meta, Outcome};
pub use rest::{callback, CallArgs, Callback, Client, Deferred, Dispatch};
pub use transport::{ReqwestTransport, Transport, TransportError, TransportResponse};

// Re-export serde_json for convenience
pub use serde_json::json;
