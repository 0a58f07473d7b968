// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Request descriptor and the values it carries

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde_json::Value;
use url::Url;

use super::cookie::CookieJar;
use super::headers::HeaderKey;
use super::pool::PoolManager;
use crate::error::{Error, Result};
use crate::session::{normalize_json, resolve, Hook, KeyValues, OrderedMap, RequestArgs, SessionId};

/// Request body
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Body {
    /// No body
    #[default]
    Empty,
    /// Raw bytes
    Bytes(Bytes),
    /// UTF-8 text
    Text(String),
    /// `application/x-www-form-urlencoded` fields
    Form(Vec<(String, String)>),
    /// JSON document
    Json(Value),
}

impl Body {
    /// Whether there is nothing to send
    pub fn is_empty(&self) -> bool {
        match self {
            Body::Empty => true,
            Body::Bytes(b) => b.is_empty(),
            Body::Text(s) => s.is_empty(),
            Body::Form(f) => f.is_empty(),
            Body::Json(_) => false,
        }
    }
}

impl From<&str> for Body {
    fn from(s: &str) -> Self {
        Body::Text(s.to_string())
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Body::Text(s)
    }
}

impl From<Bytes> for Body {
    fn from(b: Bytes) -> Self {
        Body::Bytes(b)
    }
}

impl From<Vec<u8>> for Body {
    fn from(b: Vec<u8>) -> Self {
        Body::Bytes(Bytes::from(b))
    }
}

impl From<Value> for Body {
    fn from(v: Value) -> Self {
        Body::Json(v)
    }
}

/// Query parameter value; lists repeat the key on the wire
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// `key=value`
    One(String),
    /// `key=a&key=b`
    Many(Vec<String>),
}

impl ParamValue {
    /// All values, in order
    pub fn values(&self) -> Vec<&str> {
        match self {
            ParamValue::One(v) => vec![v.as_str()],
            ParamValue::Many(vs) => vs.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::One(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::One(s)
    }
}

impl From<Vec<&str>> for ParamValue {
    fn from(vs: Vec<&str>) -> Self {
        ParamValue::Many(vs.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(vs: Vec<String>) -> Self {
        ParamValue::Many(vs)
    }
}

/// Resolved query string
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Pre-encoded query string, appended verbatim
    Raw(String),
    /// Parameters to encode
    Params(OrderedMap<String, ParamValue>),
}

impl Default for Query {
    fn default() -> Self {
        Query::Params(OrderedMap::new())
    }
}

/// TLS certificate verification
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Verify {
    /// Verify against the built-in roots
    #[default]
    Enabled,
    /// Accept any certificate
    Disabled,
    /// Verify against the PEM bundle at this path
    CaBundle(PathBuf),
}

impl From<bool> for Verify {
    fn from(verify: bool) -> Self {
        if verify {
            Verify::Enabled
        } else {
            Verify::Disabled
        }
    }
}

impl From<PathBuf> for Verify {
    fn from(path: PathBuf) -> Self {
        Verify::CaBundle(path)
    }
}

/// TLS client certificate
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ClientCert {
    /// Single PEM file holding certificate and private key
    Pem(PathBuf),
    /// Separate certificate and key files
    Pair { cert: PathBuf, key: PathBuf },
}

impl From<PathBuf> for ClientCert {
    fn from(path: PathBuf) -> Self {
        ClientCert::Pem(path)
    }
}

impl From<(PathBuf, PathBuf)> for ClientCert {
    fn from((cert, key): (PathBuf, PathBuf)) -> Self {
        ClientCert::Pair { cert, key }
    }
}

/// File part for a multipart upload
#[derive(Debug, Clone, PartialEq)]
pub struct FileField {
    /// Form field name
    pub field: String,
    /// File name sent to the server
    pub file_name: String,
    /// File contents
    pub content: Bytes,
    /// MIME type, if known
    pub mime: Option<String>,
}

impl FileField {
    /// Create a file part
    pub fn new(
        field: impl Into<String>,
        file_name: impl Into<String>,
        content: impl Into<Bytes>,
    ) -> Self {
        Self {
            field: field.into(),
            file_name: file_name.into(),
            content: content.into(),
            mime: None,
        }
    }

    /// Set the MIME type
    pub fn mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }
}

/// Callable authentication, applied to the outgoing headers
pub trait AuthHandler: Send + Sync {
    /// Add credentials for a request to `url`
    fn apply(&self, url: &Url, headers: &mut HeaderMap) -> Result<()>;
}

/// Credentials attached to a request
#[derive(Clone)]
pub enum Auth {
    /// HTTP Basic
    Basic { username: String, password: String },
    /// `Authorization: Bearer <token>`
    Bearer(String),
    /// Caller-supplied handler
    Custom(Arc<dyn AuthHandler>),
}

impl Auth {
    /// Basic credentials
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Auth::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Bearer token
    pub fn bearer(token: impl Into<String>) -> Self {
        Auth::Bearer(token.into())
    }

    /// Custom handler
    pub fn custom<H: AuthHandler + 'static>(handler: H) -> Self {
        Auth::Custom(Arc::new(handler))
    }

    /// Write credentials into `headers`
    pub fn apply(&self, url: &Url, headers: &mut HeaderMap) -> Result<()> {
        let value = match self {
            Auth::Basic { username, password } => {
                let encoded = base64::Engine::encode(
                    &base64::engine::general_purpose::STANDARD,
                    format!("{}:{}", username, password),
                );
                format!("Basic {}", encoded)
            }
            Auth::Bearer(token) => format!("Bearer {}", token),
            Auth::Custom(handler) => return handler.apply(url, headers),
        };
        let value = HeaderValue::from_str(&value)
            .map_err(|_| Error::type_error("credentials are not a valid header value"))?;
        headers.insert(reqwest::header::AUTHORIZATION, value);
        Ok(())
    }
}

impl PartialEq for Auth {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Auth::Basic { username, password },
                Auth::Basic {
                    username: u,
                    password: p,
                },
            ) => username == u && password == p,
            (Auth::Bearer(a), Auth::Bearer(b)) => a == b,
            (Auth::Custom(a), Auth::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Auth::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .finish_non_exhaustive(),
            Auth::Bearer(_) => f.write_str("Bearer(..)"),
            Auth::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Fully resolved request, produced by [`Session::request`](crate::Session::request).
///
/// Immutable once built. It is consumed by the send step, or handed back
/// unsent when the call asked for no response.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: Url,
    query: Query,
    headers: OrderedMap<HeaderKey, String>,
    cookies: CookieJar,
    body: Body,
    files: Vec<FileField>,
    auth: Option<Auth>,
    timeout: Option<Duration>,
    allow_redirects: bool,
    proxies: OrderedMap<String, String>,
    hooks: OrderedMap<String, Vec<Hook>>,
    config: OrderedMap<String, Value>,
    prefetch: bool,
    verify: Verify,
    cert: Option<ClientCert>,
    return_response: bool,
    session: SessionId,
    pool: PoolManager,
}

impl Request {
    /// Build the descriptor from merged arguments
    pub(crate) fn from_args(args: RequestArgs, session: SessionId, pool: PoolManager) -> Result<Self> {
        let url = Url::parse(&args.url)?;
        let query = match args.params {
            Some(KeyValues::Text(raw)) => Query::Raw(raw),
            other => Query::Params(resolve(other)?),
        };

        Ok(Self {
            method: args.method,
            url,
            query,
            headers: resolve(args.headers)?,
            cookies: args.cookies,
            body: args.data,
            files: args.files,
            auth: args.auth,
            timeout: args.timeout,
            allow_redirects: args.allow_redirects,
            proxies: resolve(args.proxies)?,
            hooks: resolve(args.hooks)?,
            config: resolve(args.config)?,
            prefetch: args.prefetch,
            verify: args.verify.unwrap_or_default(),
            cert: args.cert,
            return_response: args.return_response,
            session,
            pool,
        })
    }

    /// Request method
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// URL without the resolved query parameters
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// URL with the resolved query parameters appended
    pub fn full_url(&self) -> Url {
        let mut url = self.url.clone();
        match &self.query {
            Query::Raw(raw) if !raw.is_empty() => {
                let raw = raw.trim_start_matches('?');
                let joined = match url.query() {
                    Some(existing) if !existing.is_empty() => format!("{}&{}", existing, raw),
                    _ => raw.to_string(),
                };
                url.set_query(Some(&joined));
            }
            Query::Params(params) if !params.is_empty() => {
                let mut pairs = url.query_pairs_mut();
                for (key, value) in params {
                    for v in value.values() {
                        pairs.append_pair(key, v);
                    }
                }
            }
            _ => {}
        }
        url
    }

    /// Resolved query
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Resolved per-request headers (without `base_headers`)
    pub fn headers(&self) -> &OrderedMap<HeaderKey, String> {
        &self.headers
    }

    /// Header value by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&HeaderKey::from(name)).map(String::as_str)
    }

    /// This request with a header set, for `pre_request` hooks
    pub fn with_header(mut self, name: impl Into<HeaderKey>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Headers to send: `config.base_headers` overlaid with the request's own
    pub fn effective_headers(&self) -> Result<OrderedMap<HeaderKey, String>> {
        let mut merged = OrderedMap::new();
        if let Some(base) = self.config.get("base_headers") {
            for (name, value) in normalize_json(base.clone())? {
                match value {
                    Value::String(s) => {
                        merged.insert(HeaderKey::from(name), s);
                    }
                    Value::Null => {}
                    other => {
                        return Err(Error::type_error(format!(
                            "base header {} must be a string, got {}",
                            name, other
                        )))
                    }
                }
            }
        }
        for (name, value) in &self.headers {
            merged.insert(name.clone(), value.clone());
        }
        Ok(merged)
    }

    /// [`Request::effective_headers`] as a wire header map
    pub fn header_map(&self) -> Result<HeaderMap> {
        let mut map = HeaderMap::new();
        for (name, value) in self.effective_headers()? {
            let header_name = HeaderName::from_bytes(name.as_str().as_bytes())
                .map_err(|_| Error::type_error(format!("invalid header name: {}", name)))?;
            let header_value = HeaderValue::from_str(&value)
                .map_err(|_| Error::type_error(format!("invalid value for header {}", name)))?;
            map.insert(header_name, header_value);
        }
        Ok(map)
    }

    /// Cookie jar for this request only
    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    /// Request body
    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Multipart file parts
    pub fn files(&self) -> &[FileField] {
        &self.files
    }

    /// Credentials
    pub fn auth(&self) -> Option<&Auth> {
        self.auth.as_ref()
    }

    /// Timeout for the send step
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Whether redirects are followed
    pub fn allow_redirects(&self) -> bool {
        self.allow_redirects
    }

    /// Scheme to proxy URL
    pub fn proxies(&self) -> &OrderedMap<String, String> {
        &self.proxies
    }

    /// Event name to hook chain
    pub fn hooks(&self) -> &OrderedMap<String, Vec<Hook>> {
        &self.hooks
    }

    /// Resolved configuration
    pub fn config(&self) -> &OrderedMap<String, Value> {
        &self.config
    }

    /// Integer config option
    pub fn config_u64(&self, key: &str) -> Option<u64> {
        self.config.get(key).and_then(Value::as_u64)
    }

    /// Boolean config option
    pub fn config_bool(&self, key: &str) -> Option<bool> {
        self.config.get(key).and_then(Value::as_bool)
    }

    /// Whether the body is read eagerly
    pub fn prefetch(&self) -> bool {
        self.prefetch
    }

    /// TLS verification
    pub fn verify(&self) -> &Verify {
        &self.verify
    }

    /// TLS client certificate
    pub fn cert(&self) -> Option<&ClientCert> {
        self.cert.as_ref()
    }

    /// Whether the caller asked for the request to be sent
    pub fn return_response(&self) -> bool {
        self.return_response
    }

    /// Session that built this request
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Connection pool handle used to send it
    pub fn pool(&self) -> &PoolManager {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Override;
    use serde_json::json;

    fn args(url: &str) -> RequestArgs {
        RequestArgs::new(Method::GET, url)
    }

    fn build(args: RequestArgs) -> Request {
        Request::from_args(args, SessionId::new(), PoolManager::new(1, 1)).unwrap()
    }

    #[test]
    fn test_full_url_with_multivalued_params() {
        let mut a = args("https://example.com/search?lang=en");
        a.params = Some(KeyValues::Pairs(vec![
            ("q".to_string(), Override::Set(ParamValue::from("rust"))),
            ("tag".to_string(), Override::Set(ParamValue::from(vec!["a", "b"]))),
            ("drop".to_string(), Override::Unset),
        ]));
        let req = build(a);

        assert_eq!(
            req.full_url().as_str(),
            "https://example.com/search?lang=en&q=rust&tag=a&tag=b"
        );
    }

    #[test]
    fn test_full_url_with_raw_query() {
        let mut a = args("https://example.com/p?x=1");
        a.params = Some(KeyValues::Text("y=2&z=3".to_string()));
        let req = build(a);
        assert_eq!(req.full_url().as_str(), "https://example.com/p?x=1&y=2&z=3");
    }

    #[test]
    fn test_effective_headers_overlay_base_headers() {
        let mut a = args("https://example.com");
        a.config = Some(KeyValues::Pairs(vec![(
            "base_headers".to_string(),
            Override::Set(json!({"User-Agent": "base", "Accept": "*/*"})),
        )]));
        a.headers = Some(KeyValues::Pairs(vec![(
            HeaderKey::from("user-agent"),
            Override::Set("custom".to_string()),
        )]));
        let req = build(a);

        let headers = req.effective_headers().unwrap();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[&HeaderKey::from("User-Agent")], "custom");

        let wire = req.header_map().unwrap();
        assert_eq!(wire.get("accept").unwrap(), "*/*");
    }

    #[test]
    fn test_invalid_header_value_is_rejected() {
        let mut a = args("https://example.com");
        a.headers = Some(KeyValues::Pairs(vec![(
            HeaderKey::from("x-bad"),
            Override::Set("line\nbreak".to_string()),
        )]));
        let req = build(a);
        assert!(matches!(req.header_map(), Err(Error::Type(_))));
    }

    #[test]
    fn test_basic_auth_header() {
        let url = Url::parse("https://example.com").unwrap();
        let mut headers = HeaderMap::new();
        Auth::basic("user", "pass").apply(&url, &mut headers).unwrap();
        assert_eq!(headers.get("authorization").unwrap(), "Basic dXNlcjpwYXNz");
    }

    #[test]
    fn test_invalid_url() {
        let res = Request::from_args(args("not a url"), SessionId::new(), PoolManager::new(1, 1));
        assert!(matches!(res, Err(Error::Url(_))));
    }
}
