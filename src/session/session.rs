// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Session: long-lived request defaults, cookies and pooled connections

use std::fmt;
use std::hash::Hash;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde_json::Value;

use super::args::{RequestArgs, RequestOptions};
use super::config::{
    pool_from_config, seed_defaults, SessionBuilder, POOL_BLOCK, POOL_CONNECTIONS, POOL_MAXSIZE,
    STORE_COOKIES,
};
use super::hooks::{dispatch_hook, events, Hook, HookPayload};
use super::merge::{as_overrides, merge, merge_scalar, resolve, Override, Overrides};
use super::normalize::{normalize, KeyValues, OrderedMap};
use crate::error::{Error, Result};
use crate::http::{
    Auth, Body, ClientCert, CookieJar, HeaderInput, HeaderKey, ParamValue, PoolManager,
    Request, ReqwestTransport, Response, Transport, Verify,
};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique session identifier, carried by every request a session builds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(u64);

impl SessionId {
    /// Allocate a fresh identifier
    pub fn new() -> Self {
        SessionId(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Numeric value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Result of [`Session::request`]
#[derive(Debug)]
pub enum RequestOutcome {
    /// The request was sent
    Response(Response),
    /// The request was built but not sent (`return_response(false)`)
    Request(Request),
}

impl RequestOutcome {
    /// The response, if the request was sent
    pub fn into_response(self) -> Option<Response> {
        match self {
            RequestOutcome::Response(r) => Some(r),
            RequestOutcome::Request(_) => None,
        }
    }

    /// The unsent request, if sending was suppressed
    pub fn into_request(self) -> Option<Request> {
        match self {
            RequestOutcome::Request(r) => Some(r),
            RequestOutcome::Response(_) => None,
        }
    }

    /// The response, or an error if the request was not sent
    pub fn response(self) -> Result<Response> {
        self.into_response()
            .ok_or_else(|| Error::other("request was built but not sent"))
    }
}

/// Tracked session attributes, as exported by [`Session::snapshot`]
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub headers: OrderedMap<HeaderKey, String>,
    pub cookies: CookieJar,
    pub auth: Option<Auth>,
    pub timeout: Option<Duration>,
    pub proxies: OrderedMap<String, String>,
    pub hooks: OrderedMap<String, Vec<Hook>>,
    pub params: OrderedMap<String, ParamValue>,
    pub config: OrderedMap<String, Value>,
    pub verify: Verify,
    pub cert: Option<ClientCert>,
    pub prefetch: bool,
    pub safe_mode: bool,
}

/// A persistent HTTP client session.
///
/// Holds default headers, cookies, credentials and connection pools, and
/// merges them into every request it makes. Requests take `&self`, so a
/// session can serve concurrent requests; changing its defaults takes
/// `&mut self`.
///
/// # Example
///
/// ```rust,no_run
/// use sessionjar::{RequestOptions, Session};
///
/// #[tokio::main]
/// async fn main() -> sessionjar::Result<()> {
///     let session = Session::builder()
///         .header("Authorization", "Bearer token")
///         .build()?;
///
///     let response = session
///         .get("https://example.com/api", RequestOptions::new().param("page", "1"))
///         .await?
///         .response()?;
///
///     println!("{}", response.text_lossy());
///     Ok(())
/// }
/// ```
pub struct Session {
    id: SessionId,
    headers: OrderedMap<HeaderKey, String>,
    cookies: CookieJar,
    auth: Option<Auth>,
    timeout: Option<Duration>,
    proxies: OrderedMap<String, String>,
    hooks: OrderedMap<String, Vec<Hook>>,
    params: OrderedMap<String, ParamValue>,
    config: OrderedMap<String, Value>,
    verify: Verify,
    cert: Option<ClientCert>,
    prefetch: bool,
    safe_mode: bool,
    pool: PoolManager,
    transport: Arc<dyn Transport>,
}

fn parse_method(method: &str) -> Result<Method> {
    let upper = method.to_ascii_uppercase();
    if upper.is_empty() {
        return Err(Error::InvalidMethod(method.to_string()));
    }
    Method::from_bytes(upper.as_bytes()).map_err(|_| Error::InvalidMethod(method.to_string()))
}

/// Normalize a mapping input, leaving a plain string for the merge to handle
fn normalized<K, V>(input: Option<KeyValues<K, V>>) -> Result<Option<KeyValues<K, V>>>
where
    K: Hash + Eq,
{
    Ok(match input {
        None => None,
        Some(KeyValues::Text(s)) => Some(KeyValues::Text(s)),
        Some(kv) => Some(KeyValues::Map(kv.into_map()?)),
    })
}

/// Fill in session hook chains for events the call does not mention
fn seed_hooks(
    call: Option<Overrides<String, Vec<Hook>>>,
    session: &OrderedMap<String, Vec<Hook>>,
) -> Result<Option<Overrides<String, Vec<Hook>>>> {
    if let Some(KeyValues::Text(s)) = call {
        return Ok(Some(KeyValues::Text(s)));
    }
    let mut hooks = normalize(call)?;
    for (event, chain) in session {
        hooks
            .entry(event.clone())
            .or_insert_with(|| Override::Set(chain.clone()));
    }
    Ok(Some(KeyValues::Map(hooks)))
}

/// Turn list-valued headers into their wire form
fn expand_headers(
    headers: Option<Overrides<HeaderKey, HeaderInput>>,
) -> Result<Option<Overrides<HeaderKey, String>>> {
    Ok(match headers {
        None => None,
        Some(KeyValues::Text(s)) => Some(KeyValues::Text(s)),
        Some(kv) => Some(KeyValues::Map(
            kv.into_map()?
                .into_iter()
                .map(|(name, value)| (name, value.map(HeaderInput::expand)))
                .collect(),
        )),
    })
}

fn with_redirect_default(mut opts: RequestOptions, allow: bool) -> RequestOptions {
    opts.allow_redirects.get_or_insert(allow);
    opts
}

impl Session {
    /// Session with default settings
    pub fn new() -> Result<Self> {
        SessionBuilder::new().build()
    }

    /// Start building a session
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    pub(crate) fn from_builder(
        builder: SessionBuilder,
        pool: PoolManager,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            id: SessionId::new(),
            headers: builder.headers,
            cookies: builder.cookies,
            auth: builder.auth,
            timeout: builder.timeout,
            proxies: builder.proxies,
            hooks: builder.hooks,
            params: builder.params,
            config: builder.config,
            verify: builder.verify,
            cert: builder.cert,
            prefetch: builder.prefetch,
            safe_mode: builder.safe_mode,
            pool,
            transport,
        }
    }

    /// Build a request from the call options and the session defaults and,
    /// unless the call asked otherwise, send it.
    ///
    /// The method is case-insensitive. Mapping options (`params`,
    /// `headers`, `hooks`, `proxies`, `config`) are merged key by key with
    /// the session's; scalar options replace the session value when given.
    /// Cookies go into a fresh jar for this call: the call's cookies, then
    /// every session cookie, minus the names the call unset. The session
    /// jar itself is only written by `Set-Cookie` responses.
    pub async fn request(
        &self,
        method: &str,
        url: &str,
        opts: RequestOptions,
    ) -> Result<RequestOutcome> {
        let method = parse_method(method)?;
        let RequestOptions {
            params,
            data,
            headers,
            cookies,
            files,
            auth,
            timeout,
            allow_redirects,
            proxies,
            hooks,
            config,
            prefetch,
            verify,
            cert,
            return_response,
        } = opts;

        let hooks = seed_hooks(hooks, &self.hooks)?;
        let headers = expand_headers(headers)?;
        let cookies = self.reconcile_cookies(cookies)?;

        let mut args = RequestArgs::new(method, url);
        args.data = data.unwrap_or_default();
        args.files = files.unwrap_or_default();
        args.cookies = cookies;
        args.prefetch = prefetch.unwrap_or(self.prefetch);
        args.allow_redirects = allow_redirects.unwrap_or(true);
        args.return_response = return_response.unwrap_or(true);

        args.params = merge(normalized(params)?, Some(as_overrides(&self.params)))?;
        args.headers = merge(headers, Some(as_overrides(&self.headers)))?;
        args.hooks = merge(hooks, Some(as_overrides(&self.hooks)))?;
        args.proxies = merge(normalized(proxies)?, Some(as_overrides(&self.proxies)))?;
        args.config = merge(normalized(config)?, Some(as_overrides(&self.config)))?;

        args.auth = merge_scalar(auth, self.auth.clone());
        args.timeout = merge_scalar(timeout, self.timeout);
        args.verify = merge_scalar(verify, Some(self.verify.clone()));
        args.cert = merge_scalar(cert, self.cert.clone());

        let chain = resolve(args.hooks.clone())?;
        let args = dispatch_hook(events::ARGS, &chain, HookPayload::Args(Box::new(args)))?
            .into_args(events::ARGS)?;

        let request = Request::from_args(args, self.id, self.pool.clone())?;
        tracing::debug!(
            session = %self.id,
            method = %request.method(),
            url = %request.url(),
            cookies = request.cookies().len(),
            "Built request"
        );

        if !request.return_response() {
            return Ok(RequestOutcome::Request(request));
        }

        self.send_request(request).await.map(RequestOutcome::Response)
    }

    /// Fresh per-call jar: call cookies, then session cookies, minus unset names
    fn reconcile_cookies(&self, cookies: Option<crate::http::CookieInput>) -> Result<CookieJar> {
        let (jar, dead) = match cookies {
            Some(input) => input.into_jar()?,
            None => (CookieJar::new(), Vec::new()),
        };

        jar.update_from(&self.cookies);

        for name in &dead {
            let removed = jar.remove_by_name(name);
            tracing::debug!(name = %name, removed, "Dropped unset cookie for this call");
        }

        Ok(jar)
    }

    /// Send a request built with `return_response(false)`
    pub async fn send(&self, request: Request) -> Result<Response> {
        self.send_request(request).await
    }

    async fn send_request(&self, request: Request) -> Result<Response> {
        let hooks = request.hooks().clone();
        let request = dispatch_hook(
            events::PRE_REQUEST,
            &hooks,
            HookPayload::Request(Box::new(request)),
        )?
        .into_request(events::PRE_REQUEST)?;

        match self.transport.send(&request, request.prefetch()).await {
            Ok(mut response) => {
                if request.config_bool(STORE_COOKIES).unwrap_or(true) {
                    self.store_cookies(&request, &mut response);
                }

                let response = dispatch_hook(
                    events::RESPONSE,
                    request.hooks(),
                    HookPayload::Response(Box::new(response)),
                )?
                .into_response(events::RESPONSE)?;

                tracing::info!(
                    method = %request.method(),
                    url = %response.url,
                    status = ?response.status_code(),
                    time_ms = response.response_time_ms,
                    "Request completed"
                );
                Ok(response)
            }
            Err(err) if self.safe_mode && err.is_transport() => {
                tracing::warn!(
                    method = %request.method(),
                    url = %request.url(),
                    error = %err,
                    "Transport error returned as response"
                );
                Ok(Response::from_error(request.full_url(), err))
            }
            Err(err) => Err(err),
        }
    }

    /// Store `Set-Cookie` values in the request, response and session jars
    fn store_cookies(&self, request: &Request, response: &mut Response) {
        let url = response.url.clone();
        let headers: Vec<String> = response.set_cookies().into_iter().map(str::to_string).collect();

        for header in &headers {
            if let Some(cookie) = self.cookies.add_from_header(header, &url) {
                tracing::debug!(name = %cookie.name, domain = %cookie.domain, "Storing response cookie");
                request.cookies().set(cookie.clone());
                response.cookies.set(cookie);
            }
        }
    }

    /// GET; follows redirects unless told otherwise
    pub async fn get(&self, url: &str, opts: RequestOptions) -> Result<RequestOutcome> {
        self.request("GET", url, with_redirect_default(opts, true)).await
    }

    /// OPTIONS; follows redirects unless told otherwise
    pub async fn options(&self, url: &str, opts: RequestOptions) -> Result<RequestOutcome> {
        self.request("OPTIONS", url, with_redirect_default(opts, true)).await
    }

    /// HEAD; does not follow redirects unless told otherwise
    pub async fn head(&self, url: &str, opts: RequestOptions) -> Result<RequestOutcome> {
        self.request("HEAD", url, with_redirect_default(opts, false)).await
    }

    /// POST with a body
    pub async fn post(
        &self,
        url: &str,
        data: impl Into<Body>,
        opts: RequestOptions,
    ) -> Result<RequestOutcome> {
        self.request("POST", url, opts.data(data)).await
    }

    /// PUT with a body
    pub async fn put(
        &self,
        url: &str,
        data: impl Into<Body>,
        opts: RequestOptions,
    ) -> Result<RequestOutcome> {
        self.request("PUT", url, opts.data(data)).await
    }

    /// PATCH with a body
    pub async fn patch(
        &self,
        url: &str,
        data: impl Into<Body>,
        opts: RequestOptions,
    ) -> Result<RequestOutcome> {
        self.request("PATCH", url, opts.data(data)).await
    }

    /// DELETE
    pub async fn delete(&self, url: &str, opts: RequestOptions) -> Result<RequestOutcome> {
        self.request("DELETE", url, opts).await
    }

    /// Release pooled connections. Safe to call repeatedly; the session
    /// stays usable and opens new connections on demand.
    pub fn close(&self) {
        self.pool.clear();
        tracing::debug!(session = %self.id, "Session closed");
    }

    /// Scoped use: the returned guard closes the session when dropped,
    /// on every exit path
    pub fn enter(self) -> SessionGuard {
        SessionGuard {
            session: Some(self),
        }
    }

    /// Export the tracked attributes. The cookie jar is copied.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            headers: self.headers.clone(),
            cookies: self.cookies.deep_copy(),
            auth: self.auth.clone(),
            timeout: self.timeout,
            proxies: self.proxies.clone(),
            hooks: self.hooks.clone(),
            params: self.params.clone(),
            config: self.config.clone(),
            verify: self.verify.clone(),
            cert: self.cert.clone(),
            prefetch: self.prefetch,
            safe_mode: self.safe_mode,
        }
    }

    /// Rebuild a session from a snapshot with a fresh pool and the reqwest transport
    pub fn restore(snapshot: SessionSnapshot) -> Result<Self> {
        Self::restore_with(snapshot, Arc::new(ReqwestTransport::new()))
    }

    /// Rebuild a session from a snapshot with a fresh pool and the given transport
    pub fn restore_with(snapshot: SessionSnapshot, transport: Arc<dyn Transport>) -> Result<Self> {
        let mut config = snapshot.config;
        seed_defaults(&mut config);
        let pool = pool_from_config(&config)?;

        Ok(Self {
            id: SessionId::new(),
            headers: snapshot.headers,
            cookies: snapshot.cookies.deep_copy(),
            auth: snapshot.auth,
            timeout: snapshot.timeout,
            proxies: snapshot.proxies,
            hooks: snapshot.hooks,
            params: snapshot.params,
            config,
            verify: snapshot.verify,
            cert: snapshot.cert,
            prefetch: snapshot.prefetch,
            safe_mode: snapshot.safe_mode,
            pool,
            transport,
        })
    }

    /// Set a config option; pool options rebuild the pool
    pub fn set_config(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        let key = key.into();
        let previous = self.config.insert(key.clone(), value.into());
        if is_pool_option(&key) {
            if let Err(e) = self.rebuild_pool() {
                match previous {
                    Some(old) => self.config.insert(key, old),
                    None => self.config.shift_remove(&key),
                };
                return Err(e);
            }
        }
        Ok(())
    }

    /// Remove a config option; pool options fall back to their default size
    pub fn remove_config(&mut self, key: &str) -> Result<Option<Value>> {
        let removed = self.config.shift_remove(key);
        if removed.is_some() && is_pool_option(key) {
            self.rebuild_pool()?;
        }
        Ok(removed)
    }

    fn rebuild_pool(&mut self) -> Result<()> {
        let pool = pool_from_config(&self.config)?;
        self.pool.clear();
        self.pool = pool;
        Ok(())
    }

    /// Session identifier
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Default headers
    pub fn headers(&self) -> &OrderedMap<HeaderKey, String> {
        &self.headers
    }

    /// Default headers, for editing
    pub fn headers_mut(&mut self) -> &mut OrderedMap<HeaderKey, String> {
        &mut self.headers
    }

    /// Session cookie jar
    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    /// Replace the session cookie jar
    pub fn set_cookies(&mut self, jar: CookieJar) {
        self.cookies = jar;
    }

    /// Default credentials
    pub fn auth(&self) -> Option<&Auth> {
        self.auth.as_ref()
    }

    /// Set default credentials
    pub fn set_auth(&mut self, auth: Option<Auth>) {
        self.auth = auth;
    }

    /// Default timeout
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Set default timeout
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    /// Default proxies
    pub fn proxies(&self) -> &OrderedMap<String, String> {
        &self.proxies
    }

    /// Default proxies, for editing
    pub fn proxies_mut(&mut self) -> &mut OrderedMap<String, String> {
        &mut self.proxies
    }

    /// Session hooks
    pub fn hooks(&self) -> &OrderedMap<String, Vec<Hook>> {
        &self.hooks
    }

    /// Append a session hook for `event`
    pub fn add_hook(&mut self, event: impl Into<String>, hook: Hook) {
        self.hooks.entry(event.into()).or_default().push(hook);
    }

    /// Session hooks, for editing
    pub fn hooks_mut(&mut self) -> &mut OrderedMap<String, Vec<Hook>> {
        &mut self.hooks
    }

    /// Default query parameters
    pub fn params(&self) -> &OrderedMap<String, ParamValue> {
        &self.params
    }

    /// Default query parameters, for editing
    pub fn params_mut(&mut self) -> &mut OrderedMap<String, ParamValue> {
        &mut self.params
    }

    /// Config options
    pub fn config(&self) -> &OrderedMap<String, Value> {
        &self.config
    }

    /// TLS verification
    pub fn verify(&self) -> &Verify {
        &self.verify
    }

    /// Set TLS verification
    pub fn set_verify(&mut self, verify: impl Into<Verify>) {
        self.verify = verify.into();
    }

    /// TLS client certificate
    pub fn cert(&self) -> Option<&ClientCert> {
        self.cert.as_ref()
    }

    /// Set TLS client certificate
    pub fn set_cert(&mut self, cert: Option<ClientCert>) {
        self.cert = cert;
    }

    /// Whether bodies are read eagerly
    pub fn prefetch(&self) -> bool {
        self.prefetch
    }

    /// Set eager body reads
    pub fn set_prefetch(&mut self, prefetch: bool) {
        self.prefetch = prefetch;
    }

    /// Whether transport errors become degraded responses
    pub fn safe_mode(&self) -> bool {
        self.safe_mode
    }

    /// Set safe mode
    pub fn set_safe_mode(&mut self, safe_mode: bool) {
        self.safe_mode = safe_mode;
    }

    /// Connection pool handle
    pub fn pool(&self) -> &PoolManager {
        &self.pool
    }
}

fn is_pool_option(key: &str) -> bool {
    matches!(key, POOL_CONNECTIONS | POOL_MAXSIZE | POOL_BLOCK)
}

impl Default for Session {
    fn default() -> Self {
        Self::new().expect("default session configuration is valid")
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("headers", &self.headers)
            .field("cookies", &self.cookies.len())
            .field("auth", &self.auth)
            .field("timeout", &self.timeout)
            .field("proxies", &self.proxies)
            .field("params", &self.params)
            .field("verify", &self.verify)
            .field("prefetch", &self.prefetch)
            .field("safe_mode", &self.safe_mode)
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<sessionjar session {}>", self.id)
    }
}

/// Session in scoped use; closes it on drop
pub struct SessionGuard {
    session: Option<Session>,
}

impl Deref for SessionGuard {
    type Target = Session;

    fn deref(&self) -> &Session {
        match &self.session {
            Some(session) => session,
            None => unreachable!("session is only taken in drop"),
        }
    }
}

impl DerefMut for SessionGuard {
    fn deref_mut(&mut self) -> &mut Session {
        match &mut self.session {
            Some(session) => session,
            None => unreachable!("session is only taken in drop"),
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            session.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Cookie;
    use async_trait::async_trait;
    use bytes::Bytes;
    use parking_lot::Mutex;
    use reqwest::header::{HeaderMap, HeaderValue, SET_COOKIE};
    use reqwest::StatusCode;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    /// Records what it was asked to send and answers from a script
    #[derive(Default)]
    struct MockTransport {
        sent: Mutex<Vec<Request>>,
        set_cookie: Option<&'static str>,
        fail: bool,
    }

    impl MockTransport {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        fn setting_cookie(value: &'static str) -> Self {
            Self {
                set_cookie: Some(value),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&self, request: &Request, _prefetch: bool) -> Result<Response> {
            let url = request.full_url();
            self.sent.lock().push(request.clone());
            if self.fail {
                return Err(Error::transport(url.as_str(), "connection refused"));
            }
            let mut headers = HeaderMap::new();
            if let Some(cookie) = self.set_cookie {
                headers.insert(SET_COOKIE, HeaderValue::from_static(cookie));
            }
            Ok(Response::new(StatusCode::OK, headers, Bytes::from("ok"), url, false, 1))
        }
    }

    fn session_with(transport: Arc<MockTransport>) -> SessionBuilder {
        Session::builder().shared_transport(transport)
    }

    async fn build(session: &Session, opts: RequestOptions) -> Request {
        session
            .get("https://example.com/", opts.return_response(false))
            .await
            .unwrap()
            .into_request()
            .unwrap()
    }

    #[tokio::test]
    async fn test_cookie_reconciliation() {
        let session = Session::builder()
            .cookie("a", "1")
            .cookie("b", "2")
            .build()
            .unwrap();

        let request = build(
            &session,
            RequestOptions::new().unset_cookie("b").cookie("c", "3"),
        )
        .await;

        let call = request.cookies().to_map();
        assert_eq!(call.len(), 2);
        assert_eq!(call["a"], "1");
        assert_eq!(call["c"], "3");

        let own = session.cookies().to_map();
        assert_eq!(own.len(), 2);
        assert_eq!(own["a"], "1");
        assert_eq!(own["b"], "2");
        assert!(!request.cookies().ptr_eq(session.cookies()));
    }

    #[tokio::test]
    async fn test_session_cookie_overwrites_call_cookie() {
        let session = Session::builder().cookie("a", "session").build().unwrap();
        let request = build(&session, RequestOptions::new().cookie("a", "call")).await;
        assert_eq!(request.cookies().get("a").as_deref(), Some("session"));
    }

    #[tokio::test]
    async fn test_passed_jar_is_used_as_is() {
        let session = Session::builder().cookie("s", "1").build().unwrap();
        let jar = CookieJar::from_mapping([("mine", "x")]);

        let request = build(&session, RequestOptions::new().cookies(jar.clone())).await;

        assert!(request.cookies().ptr_eq(&jar));
        assert_eq!(jar.get("s").as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_headers_merge_and_unset() {
        let session = Session::builder()
            .header("X-Keep", "1")
            .header("X-Drop", "2")
            .header("Accept", "text/html")
            .build()
            .unwrap();

        let request = build(
            &session,
            RequestOptions::new()
                .unset_header("x-drop")
                .header("accept", vec!["application/json", "text/plain"]),
        )
        .await;

        assert_eq!(request.header("x-keep"), Some("1"));
        assert_eq!(request.header("X-Drop"), None);
        assert_eq!(request.header("Accept"), Some("application/json, text/plain"));
        assert_eq!(session.headers().len(), 3);
    }

    #[tokio::test]
    async fn test_string_headers_are_rejected() {
        let session = Session::builder().header("X-A", "1").build().unwrap();
        let mut opts = RequestOptions::new();
        opts.headers = Some(KeyValues::Text("X-B: 2".to_string()));

        let err = session.get("https://example.com/", opts).await.unwrap_err();
        assert!(matches!(err, Error::Type(_)));
    }

    #[tokio::test]
    async fn test_raw_query_is_not_merged() {
        let session = Session::builder().param("page", "1").build().unwrap();

        let merged = build(&session, RequestOptions::new().param("q", "x")).await;
        assert_eq!(merged.full_url().query(), Some("page=1&q=x"));

        let raw = build(&session, RequestOptions::new().query("q=raw")).await;
        assert_eq!(raw.full_url().query(), Some("q=raw"));
    }

    #[tokio::test]
    async fn test_scalar_overrides() {
        let session = Session::builder()
            .timeout(Duration::from_secs(30))
            .auth(Auth::bearer("session"))
            .verify(false)
            .build()
            .unwrap();

        let inherited = build(&session, RequestOptions::new()).await;
        assert_eq!(inherited.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(inherited.auth(), Some(&Auth::bearer("session")));
        assert_eq!(inherited.verify(), &Verify::Disabled);

        let overridden = build(
            &session,
            RequestOptions::new()
                .timeout(Duration::from_secs(1))
                .auth(Auth::basic("u", "p"))
                .verify(true),
        )
        .await;
        assert_eq!(overridden.timeout(), Some(Duration::from_secs(1)));
        assert_eq!(overridden.auth(), Some(&Auth::basic("u", "p")));
        assert_eq!(overridden.verify(), &Verify::Enabled);
    }

    #[tokio::test]
    async fn test_verb_redirect_defaults() {
        let session = Session::new().unwrap();
        let url = "https://example.com/";
        let opts = || RequestOptions::new().return_response(false);

        let get = session.get(url, opts()).await.unwrap().into_request().unwrap();
        let options = session.options(url, opts()).await.unwrap().into_request().unwrap();
        let head = session.head(url, opts()).await.unwrap().into_request().unwrap();
        let head_follow = session
            .head(url, opts().allow_redirects(true))
            .await
            .unwrap()
            .into_request()
            .unwrap();
        let get_stay = session
            .get(url, opts().allow_redirects(false))
            .await
            .unwrap()
            .into_request()
            .unwrap();

        assert!(get.allow_redirects());
        assert!(options.allow_redirects());
        assert!(!head.allow_redirects());
        assert!(head_follow.allow_redirects());
        assert!(!get_stay.allow_redirects());
        assert_eq!(head.method(), Method::HEAD);
    }

    #[tokio::test]
    async fn test_body_verbs() {
        let transport = Arc::new(MockTransport::default());
        let session = session_with(Arc::clone(&transport)).build().unwrap();
        let url = "https://example.com/";

        session.post(url, "a=1", RequestOptions::new()).await.unwrap();
        session.put(url, json!({"b": 2}), RequestOptions::new()).await.unwrap();
        session.patch(url, vec![1u8, 2], RequestOptions::new()).await.unwrap();
        session.delete(url, RequestOptions::new()).await.unwrap();

        let sent = transport.sent.lock();
        let methods: Vec<_> = sent.iter().map(|r| r.method().as_str().to_string()).collect();
        assert_eq!(methods, vec!["POST", "PUT", "PATCH", "DELETE"]);
        assert_eq!(sent[0].body(), &Body::from("a=1"));
        assert_eq!(sent[1].body(), &Body::Json(json!({"b": 2})));
        assert!(sent[3].body().is_empty());
    }

    #[tokio::test]
    async fn test_method_is_case_insensitive() {
        let session = Session::new().unwrap();
        let outcome = session
            .request("pAtCh", "https://example.com/", RequestOptions::new().return_response(false))
            .await
            .unwrap();
        assert_eq!(outcome.into_request().unwrap().method(), Method::PATCH);

        let err = session
            .request("", "https://example.com/", RequestOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidMethod(_)));
    }

    #[tokio::test]
    async fn test_session_hooks_seed_call_hooks() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let session = Session::builder()
            .hook(
                "args",
                Hook::args(|a| {
                    let mut a = a.clone();
                    a.timeout = Some(Duration::from_secs(9));
                    Some(a)
                }),
            )
            .hook(
                "pre_request",
                Hook::inspect(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .build()
            .unwrap();

        let seeded = build(&session, RequestOptions::new()).await;
        assert_eq!(seeded.timeout(), Some(Duration::from_secs(9)));
        assert_eq!(seeded.hooks().len(), 2);

        let replaced = build(
            &session,
            RequestOptions::new().hook("args", Hook::args(|_| None)),
        )
        .await;
        assert_eq!(replaced.timeout(), None);
        assert_eq!(replaced.hooks()["pre_request"].len(), 1);

        let disabled = build(&session, RequestOptions::new().unset_hooks("args")).await;
        assert_eq!(disabled.timeout(), None);
        assert!(!disabled.hooks().contains_key("args"));
    }

    #[tokio::test]
    async fn test_pre_request_and_response_hooks() {
        let transport = Arc::new(MockTransport::default());
        let session = session_with(Arc::clone(&transport))
            .hook(
                "pre_request",
                Hook::request(|r| Some(r.clone().with_header("X-Signed", "yes"))),
            )
            .hook(
                "response",
                Hook::response(|r| {
                    let mut r = r.clone();
                    r.body = Bytes::from("rewritten");
                    Some(r)
                }),
            )
            .build()
            .unwrap();

        let response = session
            .get("https://example.com/", RequestOptions::new())
            .await
            .unwrap()
            .response()
            .unwrap();

        assert_eq!(response.text().unwrap(), "rewritten");
        assert_eq!(transport.sent.lock()[0].header("x-signed"), Some("yes"));
    }

    #[tokio::test]
    async fn test_set_cookie_goes_to_session_only_when_stored() {
        let transport = Arc::new(MockTransport::setting_cookie("token=abc; Path=/"));
        let session = session_with(Arc::clone(&transport))
            .cookie("keep", "1")
            .build()
            .unwrap();

        let response = session
            .get("https://example.com/", RequestOptions::new().cookie("call_only", "x"))
            .await
            .unwrap()
            .response()
            .unwrap();

        assert_eq!(response.cookies.get("token").as_deref(), Some("abc"));
        assert_eq!(session.cookies().get("token").as_deref(), Some("abc"));
        assert_eq!(session.cookies().get("call_only"), None);

        session.cookies().clear();
        session
            .get("https://example.com/", RequestOptions::new().config("store_cookies", false))
            .await
            .unwrap();
        assert!(session.cookies().is_empty());
    }

    #[tokio::test]
    async fn test_safe_mode_returns_degraded_response() {
        let transport = Arc::new(MockTransport::failing());
        let session = session_with(Arc::clone(&transport))
            .safe_mode(true)
            .build()
            .unwrap();

        let response = session
            .get("https://example.com/", RequestOptions::new())
            .await
            .unwrap()
            .response()
            .unwrap();

        assert_eq!(response.status, None);
        assert!(response.error().unwrap().is_transport());
    }

    #[tokio::test]
    async fn test_without_safe_mode_transport_error_propagates() {
        let transport = Arc::new(MockTransport::failing());
        let session = session_with(transport).build().unwrap();

        let err = session
            .get("https://example.com/", RequestOptions::new())
            .await
            .unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_safe_mode_does_not_hide_input_errors() {
        let session = session_with(Arc::new(MockTransport::failing()))
            .safe_mode(true)
            .build()
            .unwrap();

        let err = session
            .get("not a url", RequestOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Url(_)));
    }

    #[tokio::test]
    async fn test_send_unsent_request() {
        let transport = Arc::new(MockTransport::default());
        let session = session_with(Arc::clone(&transport)).build().unwrap();

        let request = build(&session, RequestOptions::new().header("X-Late", "1")).await;
        assert!(transport.sent.lock().is_empty());

        let response = session.send(request).await.unwrap();
        assert!(response.is_success());
        assert_eq!(transport.sent.lock()[0].header("X-Late"), Some("1"));
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let hook = Hook::inspect(|_| {});
        let session = Session::builder()
            .header("X-A", "1")
            .cookie("c", "v")
            .auth(Auth::basic("u", "p"))
            .timeout(Duration::from_secs(3))
            .proxy("https", "http://proxy:3128")
            .hook("response", hook)
            .param("q", vec!["a", "b"])
            .config("pool_maxsize", 2)
            .verify(false)
            .prefetch(false)
            .safe_mode(true)
            .build()
            .unwrap();

        let snapshot = session.snapshot();
        let restored = Session::restore(snapshot.clone()).unwrap();

        assert_eq!(restored.snapshot(), snapshot);
        assert_ne!(restored.id(), session.id());
        assert!(!restored.pool().ptr_eq(session.pool()));
        assert_eq!(restored.pool().maxsize(), 2);
        assert!(!restored.cookies().ptr_eq(session.cookies()));
    }

    #[test]
    fn test_restored_sessions_do_not_share_cookies() {
        let session = Session::builder().cookie("c", "v").build().unwrap();
        let snapshot = session.snapshot();

        let one = Session::restore(snapshot.clone()).unwrap();
        let two = Session::restore(snapshot.clone()).unwrap();
        one.cookies().set(Cookie::new("secret", "s3"));

        assert_eq!(one.cookies().get("secret").as_deref(), Some("s3"));
        assert_eq!(two.cookies().get("secret"), None);
        assert_eq!(snapshot.cookies.get("secret"), None);
        assert!(!one.cookies().ptr_eq(two.cookies()));
        assert_eq!(two.cookies().get("c").as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let session = Session::new().unwrap();
        session.close();
        session.close();
        assert_eq!(session.pool().pool_count(), 0);
        assert_eq!(session.pool().stats().clears, 2);
    }

    #[tokio::test]
    async fn test_guard_closes_once_on_failure() {
        async fn failing_body(session: &Session) -> Result<()> {
            session
                .request("GET", "::bad::", RequestOptions::new())
                .await
                .map(|_| ())
        }

        let session = Session::new().unwrap();
        let pool = session.pool().clone();

        let result = {
            let guard = session.enter();
            failing_body(&guard).await
        };

        assert!(result.is_err());
        assert_eq!(pool.stats().clears, 1);
    }

    #[tokio::test]
    async fn test_pool_config_rebuilds_pool() {
        let mut session = Session::new().unwrap();
        let before = session.pool().clone();

        session.set_config("pool_maxsize", 3).unwrap();
        assert!(!session.pool().ptr_eq(&before));
        assert_eq!(session.pool().maxsize(), 3);
        assert_eq!(before.stats().clears, 1);

        let err = session.set_config("pool_connections", "lots").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(session.config()["pool_connections"], json!(10));

        session.set_config("verbose", true).unwrap();
        assert_eq!(session.pool().maxsize(), 3);

        session.remove_config("pool_maxsize").unwrap();
        assert_eq!(session.pool().maxsize(), 10);
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_session() {
        let transport = Arc::new(MockTransport::setting_cookie("seen=1"));
        let session = Arc::new(session_with(Arc::clone(&transport)).build().unwrap());

        let tasks = (0..8).map(|i| {
            let session = Arc::clone(&session);
            async move {
                session
                    .get(
                        &format!("https://example.com/{}", i),
                        RequestOptions::new().cookie("n", i.to_string()),
                    )
                    .await
            }
        });
        let results = futures::future::join_all(tasks).await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(transport.sent.lock().len(), 8);
        assert_eq!(session.cookies().to_map().len(), 1);
    }

    #[test]
    fn test_build_request_on_blocking_caller() {
        let session = Session::builder().param("lang", "en").build().unwrap();
        let request = tokio_test::block_on(build(&session, RequestOptions::new().param("q", "x")));
        assert_eq!(request.full_url().as_str(), "https://example.com/?lang=en&q=x");
        assert_eq!(request.session(), session.id());
    }

    #[test]
    fn test_display() {
        let session = Session::new().unwrap();
        assert!(session.to_string().starts_with("<sessionjar session #"));
    }
}
