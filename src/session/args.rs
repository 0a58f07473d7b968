// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Per-call request options and the provisional argument set

use std::hash::Hash;
use std::time::Duration;

use reqwest::Method;
use serde_json::Value;

use super::hooks::Hook;
use super::merge::{Override, Overrides};
use super::normalize::{KeyValues, OrderedMap};
use crate::http::{
    Auth, Body, ClientCert, CookieInput, CookieJar, FileField, HeaderInput, HeaderKey, ParamValue,
    Verify,
};

/// Request arguments after merging with the session.
///
/// This is the payload of the `args` hook. Mapping attributes may still
/// hold [`Override::Unset`] entries; they are dropped when the request is
/// built.
#[derive(Debug, Clone)]
pub struct RequestArgs {
    pub method: Method,
    pub url: String,
    /// Query parameters, or a raw query string
    pub params: Option<Overrides<String, ParamValue>>,
    pub data: Body,
    pub headers: Option<Overrides<HeaderKey, String>>,
    /// The call's own jar, already reconciled with the session jar
    pub cookies: CookieJar,
    pub files: Vec<FileField>,
    pub auth: Option<Auth>,
    pub timeout: Option<Duration>,
    pub allow_redirects: bool,
    pub proxies: Option<Overrides<String, String>>,
    pub hooks: Option<Overrides<String, Vec<Hook>>>,
    pub config: Option<Overrides<String, Value>>,
    pub prefetch: bool,
    pub verify: Option<Verify>,
    pub cert: Option<ClientCert>,
    pub return_response: bool,
}

impl RequestArgs {
    /// Arguments with nothing set beyond method and URL
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            params: None,
            data: Body::Empty,
            headers: None,
            cookies: CookieJar::new(),
            files: Vec::new(),
            auth: None,
            timeout: None,
            allow_redirects: true,
            proxies: None,
            hooks: None,
            config: None,
            prefetch: true,
            verify: None,
            cert: None,
            return_response: true,
        }
    }
}

/// Options for a single call.
///
/// Anything left as `None` falls back to the session. Mapping options are
/// merged key by key with the session's mapping; use the `unset_*` methods
/// to drop a session value for this call only.
///
/// ```rust
/// use sessionjar::RequestOptions;
///
/// let opts = RequestOptions::new()
///     .header("Accept", "application/json")
///     .unset_header("X-Session-Token")
///     .param("page", "2")
///     .cookie("theme", "dark");
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub params: Option<Overrides<String, ParamValue>>,
    pub data: Option<Body>,
    pub headers: Option<Overrides<HeaderKey, HeaderInput>>,
    pub cookies: Option<CookieInput>,
    pub files: Option<Vec<FileField>>,
    pub auth: Option<Auth>,
    pub timeout: Option<Duration>,
    pub allow_redirects: Option<bool>,
    pub proxies: Option<Overrides<String, String>>,
    pub hooks: Option<Overrides<String, Vec<Hook>>>,
    pub config: Option<Overrides<String, Value>>,
    pub prefetch: Option<bool>,
    pub verify: Option<Verify>,
    pub cert: Option<ClientCert>,
    pub return_response: Option<bool>,
}

/// Edit a mapping option in place, converting other shapes to a mapping.
/// A raw string is discarded.
fn edit_map<K, V, F>(slot: &mut Option<Overrides<K, V>>, f: F)
where
    K: Hash + Eq,
    F: FnOnce(&mut OrderedMap<K, Override<V>>),
{
    let mut map = match slot.take() {
        Some(KeyValues::Text(_)) | None => OrderedMap::new(),
        Some(other) => other.into_map().unwrap_or_default(),
    };
    f(&mut map);
    *slot = Some(KeyValues::Map(map));
}

impl RequestOptions {
    /// Empty options: everything inherited from the session
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a header for this call
    pub fn header(mut self, name: impl Into<HeaderKey>, value: impl Into<HeaderInput>) -> Self {
        let (name, value) = (name.into(), value.into());
        edit_map(&mut self.headers, |m| {
            m.insert(name, Override::Set(value));
        });
        self
    }

    /// Drop a session header for this call
    pub fn unset_header(mut self, name: impl Into<HeaderKey>) -> Self {
        let name = name.into();
        edit_map(&mut self.headers, |m| {
            m.insert(name, Override::Unset);
        });
        self
    }

    /// Replace all call headers
    pub fn headers(mut self, headers: impl Into<Overrides<HeaderKey, HeaderInput>>) -> Self {
        self.headers = Some(headers.into());
        self
    }

    /// Add a query parameter
    pub fn param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        let (key, value) = (key.into(), value.into());
        edit_map(&mut self.params, |m| {
            m.insert(key, Override::Set(value));
        });
        self
    }

    /// Drop a session query parameter for this call
    pub fn unset_param(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        edit_map(&mut self.params, |m| {
            m.insert(key, Override::Unset);
        });
        self
    }

    /// Replace all call parameters
    pub fn params(mut self, params: impl Into<Overrides<String, ParamValue>>) -> Self {
        self.params = Some(params.into());
        self
    }

    /// Use a pre-encoded query string; session parameters are not merged in
    pub fn query(mut self, raw: impl Into<String>) -> Self {
        self.params = Some(KeyValues::Text(raw.into()));
        self
    }

    /// Add a cookie for this call.
    ///
    /// Turns a previously supplied jar into a mapping.
    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let (name, value) = (name.into(), value.into());
        self.edit_cookies(|m| {
            m.insert(name, Override::Set(value));
        });
        self
    }

    /// Keep a session cookie out of this call
    pub fn unset_cookie(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.edit_cookies(|m| {
            m.insert(name, Override::Unset);
        });
        self
    }

    fn edit_cookies<F>(&mut self, f: F)
    where
        F: FnOnce(&mut OrderedMap<String, Override<String>>),
    {
        let mut values = match self.cookies.take() {
            Some(CookieInput::Values(values)) => Some(values),
            Some(CookieInput::Jar(jar)) => Some(KeyValues::Map(
                jar.to_map()
                    .into_iter()
                    .map(|(k, v)| (k, Override::Set(v)))
                    .collect(),
            )),
            None => None,
        };
        edit_map(&mut values, f);
        self.cookies = values.map(CookieInput::Values);
    }

    /// Replace the call cookies with a mapping or a jar
    pub fn cookies(mut self, cookies: impl Into<CookieInput>) -> Self {
        self.cookies = Some(cookies.into());
        self
    }

    /// Append a hook to this call's chain for `event`
    pub fn hook(mut self, event: impl Into<String>, hook: Hook) -> Self {
        let event = event.into();
        edit_map(&mut self.hooks, |m| match m.get_mut(&event) {
            Some(Override::Set(chain)) => chain.push(hook),
            _ => {
                m.insert(event, Override::Set(vec![hook]));
            }
        });
        self
    }

    /// Disable the session's hooks for `event` on this call
    pub fn unset_hooks(mut self, event: impl Into<String>) -> Self {
        let event = event.into();
        edit_map(&mut self.hooks, |m| {
            m.insert(event, Override::Unset);
        });
        self
    }

    /// Set a proxy for a scheme (`http`, `https` or `all`)
    pub fn proxy(mut self, scheme: impl Into<String>, url: impl Into<String>) -> Self {
        let (scheme, url) = (scheme.into(), url.into());
        edit_map(&mut self.proxies, |m| {
            m.insert(scheme, Override::Set(url));
        });
        self
    }

    /// Bypass the session proxy for a scheme
    pub fn unset_proxy(mut self, scheme: impl Into<String>) -> Self {
        let scheme = scheme.into();
        edit_map(&mut self.proxies, |m| {
            m.insert(scheme, Override::Unset);
        });
        self
    }

    /// Set a config option for this call
    pub fn config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let (key, value) = (key.into(), value.into());
        edit_map(&mut self.config, |m| {
            m.insert(key, Override::Set(value));
        });
        self
    }

    /// Drop a session config option for this call
    pub fn unset_config(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        edit_map(&mut self.config, |m| {
            m.insert(key, Override::Unset);
        });
        self
    }

    /// Set the request body
    pub fn data(mut self, data: impl Into<Body>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Add a multipart file part
    pub fn file(mut self, file: FileField) -> Self {
        self.files.get_or_insert_with(Vec::new).push(file);
        self
    }

    /// Set credentials
    pub fn auth(mut self, auth: Auth) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Set timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Follow redirects or not
    pub fn allow_redirects(mut self, allow: bool) -> Self {
        self.allow_redirects = Some(allow);
        self
    }

    /// Set TLS verification
    pub fn verify(mut self, verify: impl Into<Verify>) -> Self {
        self.verify = Some(verify.into());
        self
    }

    /// Set client certificate
    pub fn cert(mut self, cert: impl Into<ClientCert>) -> Self {
        self.cert = Some(cert.into());
        self
    }

    /// Read the body eagerly or not
    pub fn prefetch(mut self, prefetch: bool) -> Self {
        self.prefetch = Some(prefetch);
        self
    }

    /// With `false`, the built request is returned without sending it
    pub fn return_response(mut self, send: bool) -> Self {
        self.return_response = Some(send);
        self
    }
}
