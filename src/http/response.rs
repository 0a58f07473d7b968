// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! HTTP response types

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use url::Url;

use super::cookie::CookieJar;
use super::header_names;
use super::pool::PooledConnection;
use crate::error::{Error, Result};

/// Body left on the wire when the request was sent without prefetch.
///
/// Holds the pooled connection it arrived on; the slot is released once the
/// body is read or the last handle is dropped.
#[derive(Clone)]
pub struct DeferredBody(Arc<tokio::sync::Mutex<Option<(reqwest::Response, PooledConnection)>>>);

impl DeferredBody {
    /// Wrap an unread response and the connection it holds
    pub fn new(response: reqwest::Response, connection: PooledConnection) -> Self {
        Self(Arc::new(tokio::sync::Mutex::new(Some((response, connection)))))
    }

    async fn read(&self) -> Result<Bytes> {
        match self.0.lock().await.take() {
            Some((response, _connection)) => Ok(response.bytes().await?),
            None => Ok(Bytes::new()),
        }
    }
}

impl fmt::Debug for DeferredBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DeferredBody(..)")
    }
}

/// HTTP response representation
#[derive(Debug, Clone)]
pub struct Response {
    /// Response status code; absent when the response carries an error
    pub status: Option<StatusCode>,
    /// Response headers
    pub headers: HeaderMap,
    /// Response body (empty until loaded when sent without prefetch)
    pub body: Bytes,
    /// Final URL (after redirects)
    pub url: Url,
    /// Whether this was a redirect
    pub redirected: bool,
    /// Response time in milliseconds
    pub response_time_ms: u64,
    /// Cookies set by this response
    pub cookies: CookieJar,
    /// Transport error caught in safe mode
    pub error: Option<Arc<Error>>,
    deferred: Option<DeferredBody>,
}

impl Response {
    /// Create a new response with its body already read
    pub fn new(
        status: StatusCode,
        headers: HeaderMap,
        body: Bytes,
        url: Url,
        redirected: bool,
        response_time_ms: u64,
    ) -> Self {
        Self {
            status: Some(status),
            headers,
            body,
            url,
            redirected,
            response_time_ms,
            cookies: CookieJar::new(),
            error: None,
            deferred: None,
        }
    }

    /// Create a response whose body is read by [`Response::load`]
    pub fn deferred(
        status: StatusCode,
        headers: HeaderMap,
        body: DeferredBody,
        url: Url,
        redirected: bool,
        response_time_ms: u64,
    ) -> Self {
        let mut response = Self::new(status, headers, Bytes::new(), url, redirected, response_time_ms);
        response.deferred = Some(body);
        response
    }

    /// Degraded response standing in for a failed send
    pub fn from_error(url: Url, error: Error) -> Self {
        Self {
            status: None,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            url,
            redirected: false,
            response_time_ms: 0,
            cookies: CookieJar::new(),
            error: Some(Arc::new(error)),
            deferred: None,
        }
    }

    /// Whether the body has been read
    pub fn is_loaded(&self) -> bool {
        self.deferred.is_none()
    }

    /// Read a deferred body, if any, and return it
    pub async fn load(&mut self) -> Result<&Bytes> {
        if let Some(deferred) = self.deferred.take() {
            self.body = deferred.read().await?;
        }
        Ok(&self.body)
    }

    /// Error carried by a degraded response
    pub fn error(&self) -> Option<&Error> {
        self.error.as_deref()
    }

    /// Fail on a carried error or a 4xx/5xx status
    pub fn raise_for_status(&self) -> Result<()> {
        if let Some(err) = &self.error {
            return Err(Error::transport(self.url.as_str(), err.to_string()));
        }
        match self.status {
            Some(status) if status.is_client_error() || status.is_server_error() => Err(
                Error::other(format!("{} for url: {}", status, self.url)),
            ),
            _ => Ok(()),
        }
    }

    /// Check if status is success (2xx)
    pub fn is_success(&self) -> bool {
        self.status.map_or(false, |s| s.is_success())
    }

    /// Check if status is redirect (3xx)
    pub fn is_redirect(&self) -> bool {
        self.status.map_or(false, |s| s.is_redirection())
    }

    /// Get status code as u16
    pub fn status_code(&self) -> Option<u16> {
        self.status.map(|s| s.as_u16())
    }

    /// Get body as text
    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body.to_vec()).map_err(|e| Error::Other(e.to_string()))
    }

    /// Get body as text, lossy conversion
    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Parse body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(Error::from)
    }

    /// Get a header value
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Get all values for a header
    pub fn header_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect()
    }

    /// Get content type
    pub fn content_type(&self) -> Option<&str> {
        self.header(header_names::CONTENT_TYPE)
    }

    /// Get Set-Cookie headers
    pub fn set_cookies(&self) -> Vec<&str> {
        self.header_all(header_names::SET_COOKIE)
    }

    /// Get body length
    pub fn body_len(&self) -> usize {
        self.body.len()
    }
}
