// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! # sessionjar - Persistent HTTP Client Sessions
//!
//! A session keeps request defaults (headers, cookies, credentials,
//! proxies, query parameters, config) and merges them into every request
//! it makes, while reusing pooled connections between requests.
//!
//! ## Features
//!
//! - Key-wise merging of per-call options over session defaults, with an
//!   explicit [`Override::Unset`] to drop a default for one call
//! - Per-call cookie jars reconciled with the session jar; the session jar
//!   only learns cookies from `Set-Cookie` responses
//! - Hook chains for the `args`, `pre_request` and `response` events
//! - Connection pools per origin, bounded in count and size
//! - Safe mode: transport failures returned as inspectable responses
//! - Snapshot and restore of the session's tracked attributes
//!
//! ## Example
//!
//! ```rust,no_run
//! use sessionjar::{RequestOptions, Session};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = Session::builder()
//!         .header("X-Api-Key", "secret")
//!         .cookie("locale", "en")
//!         .build()?;
//!
//!     // Drop the API key for this call only
//!     let response = session
//!         .get(
//!             "https://example.com/public",
//!             RequestOptions::new().unset_header("X-Api-Key"),
//!         )
//!         .await?
//!         .response()?;
//!
//!     println!("{:?} {}", response.status_code(), response.text_lossy());
//!     session.close();
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod http;
pub mod session;

// Re-exports for convenience

// Errors
pub use error::{Error, ErrorContext, Result};

// HTTP
pub use http::{
    Auth, AuthHandler, Body, ClientCert, Cookie, CookieInput, CookieJar, FileField,
    HeaderElement, HeaderInput, HeaderKey, ParamValue, PoolManager, PoolStats, Request,
    ReqwestTransport, Response, Transport, Verify,
};

// Session
pub use session::{
    dispatch_hook, events, merge, normalize, Hook, HookPayload, KeyValues, OrderedMap, Override,
    Overrides, RequestArgs, RequestOptions, RequestOutcome, Session, SessionBuilder, SessionGuard,
    SessionSnapshot,
};

/// Create a session with default settings
pub fn session() -> Result<Session> {
    Session::new()
}

/// sessionjar version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
