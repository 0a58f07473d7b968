// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! HTTP layer under the session
//!
//! Cookie storage, header handling, the request descriptor, responses, the
//! connection pool manager and the transport that sends requests.

mod cookie;
mod headers;
mod pool;
mod request;
mod response;
mod transport;

pub use cookie::{Cookie, CookieInput, CookieJar, SameSite};
pub use headers::{HeaderElement, HeaderInput, HeaderKey};
pub use pool::{
    ClientSettings, ConnectionPool, PoolKey, PoolManager, PoolStats, PooledConnection,
    DEFAULT_POOLSIZE,
};
pub use request::{
    Auth, AuthHandler, Body, ClientCert, FileField, ParamValue, Query, Request, Verify,
};
pub use response::{DeferredBody, Response};
pub use transport::{ReqwestTransport, Transport, DEFAULT_MAX_REDIRECTS};

/// Default user agent string
pub const DEFAULT_USER_AGENT: &str = concat!("sessionjar/", env!("CARGO_PKG_VERSION"));

/// Common HTTP header names
pub mod header_names {
    pub const ACCEPT: &str = "accept";
    pub const AUTHORIZATION: &str = "authorization";
    pub const CONTENT_TYPE: &str = "content-type";
    pub const COOKIE: &str = "cookie";
    pub const SET_COOKIE: &str = "set-cookie";
    pub const USER_AGENT: &str = "user-agent";
}
