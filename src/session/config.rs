// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Session configuration: default `config` options and the session builder

use std::sync::Arc;
use std::time::Duration;

use lazy_static::lazy_static;
use serde_json::{json, Value};

use super::hooks::Hook;
use super::normalize::{normalize_json, KeyValues, OrderedMap};
use super::session::Session;
use crate::error::{Error, Result};
use crate::http::{
    Auth, ClientCert, CookieJar, HeaderInput, HeaderKey, ParamValue, PoolManager, ReqwestTransport,
    Transport, Verify, DEFAULT_POOLSIZE, DEFAULT_USER_AGENT,
};

/// Config key: maximum number of connection pools
pub const POOL_CONNECTIONS: &str = "pool_connections";
/// Config key: maximum reused connections per pool
pub const POOL_MAXSIZE: &str = "pool_maxsize";
/// Config key: make requests wait for a free pooled connection
pub const POOL_BLOCK: &str = "pool_block";
/// Config key: store `Set-Cookie` values in the session jar
pub const STORE_COOKIES: &str = "store_cookies";

lazy_static! {
    /// Defaults seeded into every session's `config` for keys it omits
    pub static ref DEFAULTS: OrderedMap<String, Value> = {
        let mut defaults = OrderedMap::new();
        defaults.insert(
            "base_headers".to_string(),
            json!({
                "User-Agent": DEFAULT_USER_AGENT,
                "Accept": "*/*",
            }),
        );
        defaults.insert("verbose".to_string(), Value::Null);
        defaults.insert("max_redirects".to_string(), json!(30));
        defaults.insert("decode_unicode".to_string(), json!(true));
        defaults.insert(POOL_CONNECTIONS.to_string(), json!(DEFAULT_POOLSIZE));
        defaults.insert(POOL_MAXSIZE.to_string(), json!(DEFAULT_POOLSIZE));
        defaults.insert("max_retries".to_string(), json!(0));
        defaults.insert("trust_env".to_string(), json!(true));
        defaults.insert("encode_uri".to_string(), json!(true));
        defaults.insert("keep_alive".to_string(), json!(true));
        defaults.insert(STORE_COOKIES.to_string(), json!(true));
        defaults
    };
}

/// Fill in every default option missing from `config`
pub fn seed_defaults(config: &mut OrderedMap<String, Value>) {
    for (key, value) in DEFAULTS.iter() {
        config
            .entry(key.clone())
            .or_insert_with(|| value.clone());
    }
}

fn pool_size(config: &OrderedMap<String, Value>, key: &str) -> Result<usize> {
    match config.get(key) {
        None | Some(Value::Null) => Ok(DEFAULT_POOLSIZE),
        Some(value) => value
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| Error::config(format!("{} must be a non-negative integer, got {}", key, value))),
    }
}

/// Pool manager sized by `pool_connections` and `pool_maxsize`
pub fn pool_from_config(config: &OrderedMap<String, Value>) -> Result<PoolManager> {
    let num_pools = pool_size(config, POOL_CONNECTIONS)?;
    let maxsize = pool_size(config, POOL_MAXSIZE)?;
    let block = config.get(POOL_BLOCK).and_then(Value::as_bool).unwrap_or(false);
    tracing::debug!(num_pools, maxsize, block, "Building pool manager");
    Ok(PoolManager::with_blocking(num_pools, maxsize, block))
}

/// Builder for [`Session`]
///
/// ```rust,no_run
/// use std::time::Duration;
/// use sessionjar::Session;
///
/// let session = Session::builder()
///     .header("Accept", "application/json")
///     .cookie("theme", "dark")
///     .timeout(Duration::from_secs(10))
///     .config("pool_maxsize", 4)
///     .safe_mode(true)
///     .build()
///     .unwrap();
/// ```
pub struct SessionBuilder {
    pub(crate) headers: OrderedMap<HeaderKey, String>,
    pub(crate) cookies: CookieJar,
    pub(crate) auth: Option<Auth>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) proxies: OrderedMap<String, String>,
    pub(crate) hooks: OrderedMap<String, Vec<Hook>>,
    pub(crate) params: OrderedMap<String, ParamValue>,
    pub(crate) config: OrderedMap<String, Value>,
    pub(crate) verify: Verify,
    pub(crate) cert: Option<ClientCert>,
    pub(crate) prefetch: bool,
    pub(crate) safe_mode: bool,
    pub(crate) transport: Option<Arc<dyn Transport>>,
    error: Option<Error>,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self {
            headers: OrderedMap::new(),
            cookies: CookieJar::new(),
            auth: None,
            timeout: None,
            proxies: OrderedMap::new(),
            hooks: OrderedMap::new(),
            params: OrderedMap::new(),
            config: OrderedMap::new(),
            verify: Verify::Enabled,
            cert: None,
            prefetch: true,
            safe_mode: false,
            transport: None,
            error: None,
        }
    }
}

impl SessionBuilder {
    /// Create a builder with nothing set
    pub fn new() -> Self {
        Self::default()
    }

    fn absorb<K, V>(&mut self, input: KeyValues<K, V>) -> Option<OrderedMap<K, V>>
    where
        K: std::hash::Hash + Eq,
    {
        match input.into_map() {
            Ok(map) => Some(map),
            Err(e) => {
                self.error.get_or_insert(e);
                None
            }
        }
    }

    /// Add a default header; list values are expanded to wire form
    pub fn header(mut self, name: impl Into<HeaderKey>, value: impl Into<HeaderInput>) -> Self {
        self.headers.insert(name.into(), value.into().expand());
        self
    }

    /// Add default headers from any accepted shape
    pub fn headers(mut self, headers: impl Into<KeyValues<HeaderKey, String>>) -> Self {
        if let Some(map) = self.absorb(headers.into()) {
            self.headers.extend(map);
        }
        self
    }

    /// Add a session cookie with the default domain and path
    pub fn cookie(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.set(crate::http::Cookie::new(name, value));
        self
    }

    /// Use this jar as the session jar
    pub fn cookies(mut self, jar: CookieJar) -> Self {
        self.cookies = jar;
        self
    }

    /// Default credentials
    pub fn auth(mut self, auth: Auth) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Default timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Default proxy for a scheme
    pub fn proxy(mut self, scheme: impl Into<String>, url: impl Into<String>) -> Self {
        self.proxies.insert(scheme.into(), url.into());
        self
    }

    /// Add default proxies from any accepted shape
    pub fn proxies(mut self, proxies: impl Into<KeyValues<String, String>>) -> Self {
        if let Some(map) = self.absorb(proxies.into()) {
            self.proxies.extend(map);
        }
        self
    }

    /// Register a session hook
    pub fn hook(mut self, event: impl Into<String>, hook: Hook) -> Self {
        self.hooks.entry(event.into()).or_default().push(hook);
        self
    }

    /// Default query parameter
    pub fn param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Add default query parameters from any accepted shape
    pub fn params(mut self, params: impl Into<KeyValues<String, ParamValue>>) -> Self {
        if let Some(map) = self.absorb(params.into()) {
            self.params.extend(map);
        }
        self
    }

    /// Set a config option
    pub fn config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    /// Set config options from a JSON object or `[key, value]` array
    pub fn config_json(mut self, config: Value) -> Self {
        match normalize_json(config) {
            Ok(map) => self.config.extend(map),
            Err(e) => {
                self.error.get_or_insert(e);
            }
        }
        self
    }

    /// TLS verification
    pub fn verify(mut self, verify: impl Into<Verify>) -> Self {
        self.verify = verify.into();
        self
    }

    /// TLS client certificate
    pub fn cert(mut self, cert: impl Into<ClientCert>) -> Self {
        self.cert = Some(cert.into());
        self
    }

    /// Read response bodies eagerly (default true)
    pub fn prefetch(mut self, prefetch: bool) -> Self {
        self.prefetch = prefetch;
        self
    }

    /// Return transport failures as degraded responses instead of errors
    pub fn safe_mode(mut self, safe_mode: bool) -> Self {
        self.safe_mode = safe_mode;
        self
    }

    /// Send through this transport instead of reqwest
    pub fn transport<T: Transport + 'static>(mut self, transport: T) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Send through a shared transport
    pub fn shared_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the session. Fails on malformed inputs or pool sizes.
    pub fn build(mut self) -> Result<Session> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        seed_defaults(&mut self.config);
        let pool = pool_from_config(&self.config)?;
        let transport = self
            .transport
            .take()
            .unwrap_or_else(|| Arc::new(ReqwestTransport::new()));
        Ok(Session::from_builder(self, pool, transport))
    }
}

impl std::fmt::Debug for SessionBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionBuilder")
            .field("headers", &self.headers)
            .field("cookies", &self.cookies.len())
            .field("config", &self.config)
            .field("safe_mode", &self.safe_mode)
            .finish_non_exhaustive()
    }
}
