// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Cookie jar implementation for persistent cookie storage

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Result;
use crate::session::{KeyValues, OrderedMap, Override, Overrides};

/// A single HTTP cookie
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cookie {
    /// Cookie name
    pub name: String,
    /// Cookie value
    pub value: String,
    /// Domain the cookie belongs to (empty = any host)
    pub domain: String,
    /// Path the cookie is valid for
    pub path: String,
    /// Expiration time (None = session cookie)
    pub expires: Option<DateTime<Utc>>,
    /// Secure flag (HTTPS only)
    pub secure: bool,
    /// HttpOnly flag
    pub http_only: bool,
    /// SameSite attribute
    pub same_site: SameSite,
}

/// SameSite cookie attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SameSite {
    /// Cookie sent with all requests
    #[default]
    None,
    /// Cookie sent with same-site and top-level navigations
    Lax,
    /// Cookie only sent with same-site requests
    Strict,
}

impl Cookie {
    /// Create a new cookie with the default domain and path
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: String::new(),
            path: "/".to_string(),
            expires: None,
            secure: false,
            http_only: false,
            same_site: SameSite::default(),
        }
    }

    /// Set the domain
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    /// Set the path
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set secure flag
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Set expiration time
    pub fn expires(mut self, expires: DateTime<Utc>) -> Self {
        self.expires = Some(expires);
        self
    }

    /// Jar identity: two cookies with the same key replace each other
    pub fn same_key(&self, other: &Cookie) -> bool {
        self.name == other.name && self.domain == other.domain && self.path == other.path
    }

    /// Check if the cookie is expired
    pub fn is_expired(&self) -> bool {
        self.expires.map_or(false, |exp| exp < Utc::now())
    }

    /// Check if the cookie should be sent to the given URL
    pub fn matches(&self, url: &Url) -> bool {
        let host = url.host_str().unwrap_or("");
        if !self.domain_matches(host) {
            return false;
        }

        if !url.path().starts_with(&self.path) {
            return false;
        }

        if self.secure && url.scheme() != "https" {
            return false;
        }

        !self.is_expired()
    }

    fn domain_matches(&self, host: &str) -> bool {
        if self.domain.is_empty() {
            return true;
        }

        let domain = self.domain.trim_start_matches('.');
        host == domain || host.ends_with(&format!(".{}", domain))
    }

    /// Parse a Set-Cookie header value received from `url`
    pub fn parse(header: &str, url: &Url) -> Option<Self> {
        let mut parts = header.split(';');
        let first = parts.next()?.trim();

        let (name, value) = first.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let mut cookie = Cookie::new(name, value.trim());

        // Default domain to request host
        cookie.domain = url.host_str().unwrap_or("").to_string();

        for part in parts {
            let part = part.trim();
            if let Some((attr, val)) = part.split_once('=') {
                let attr = attr.trim().to_lowercase();
                let val = val.trim();
                match attr.as_str() {
                    "domain" => cookie.domain = val.trim_start_matches('.').to_string(),
                    "path" => cookie.path = val.to_string(),
                    "expires" => {
                        if let Ok(dt) = DateTime::parse_from_rfc2822(val) {
                            cookie.expires = Some(dt.with_timezone(&Utc));
                        }
                    }
                    "max-age" => {
                        if let Ok(secs) = val.parse::<i64>() {
                            cookie.expires = Some(Utc::now() + chrono::Duration::seconds(secs));
                        }
                    }
                    "samesite" => {
                        cookie.same_site = match val.to_lowercase().as_str() {
                            "strict" => SameSite::Strict,
                            "lax" => SameSite::Lax,
                            _ => SameSite::None,
                        };
                    }
                    _ => {}
                }
            } else {
                match part.to_lowercase().as_str() {
                    "secure" => cookie.secure = true,
                    "httponly" => cookie.http_only = true,
                    _ => {}
                }
            }
        }

        Some(cookie)
    }

    /// Convert to cookie header format
    pub fn to_header_value(&self) -> String {
        format!("{}={}", self.name, self.value)
    }
}

/// Thread-safe cookie storage.
///
/// Cookies are keyed by (name, domain, path) and iterate in insertion
/// order. Clones share storage; use [`CookieJar::deep_copy`] for an
/// independent jar. Every operation takes the jar's single lock, so a jar
/// shared between concurrent requests never observes a half-applied update.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    cookies: Arc<Mutex<Vec<Cookie>>>,
}

impl CookieJar {
    /// Create a new empty cookie jar
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a jar with one default-domain cookie per entry
    pub fn from_mapping<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let jar = CookieJar::new();
        for (name, value) in entries {
            jar.set(Cookie::new(name, value));
        }
        jar
    }

    /// Build a jar holding the given cookies
    pub fn from_cookies(cookies: impl IntoIterator<Item = Cookie>) -> Self {
        let jar = CookieJar::new();
        for cookie in cookies {
            jar.set(cookie);
        }
        jar
    }

    /// Independent copy with the same contents
    pub fn deep_copy(&self) -> Self {
        Self {
            cookies: Arc::new(Mutex::new(self.cookies())),
        }
    }

    /// Whether both handles point at the same storage
    pub fn ptr_eq(&self, other: &CookieJar) -> bool {
        Arc::ptr_eq(&self.cookies, &other.cookies)
    }

    /// Insert a cookie, replacing any cookie with the same key in place
    pub fn set(&self, cookie: Cookie) {
        let mut cookies = self.cookies.lock();
        match cookies.iter_mut().find(|c| c.same_key(&cookie)) {
            Some(existing) => *existing = cookie,
            None => cookies.push(cookie),
        }
    }

    /// Upsert every cookie of `other` into this jar
    pub fn update_from(&self, other: &CookieJar) {
        // Snapshot first so a jar updated from itself does not self-deadlock
        for cookie in other.cookies() {
            self.set(cookie);
        }
    }

    /// Add a cookie from a Set-Cookie header, returning what was stored
    pub fn add_from_header(&self, header: &str, url: &Url) -> Option<Cookie> {
        let cookie = Cookie::parse(header, url)?;
        self.set(cookie.clone());
        Some(cookie)
    }

    /// Remove every cookie with this name, whatever its domain or path.
    ///
    /// Returns how many cookies were removed.
    pub fn remove_by_name(&self, name: &str) -> usize {
        let mut cookies = self.cookies.lock();
        let before = cookies.len();
        cookies.retain(|c| c.name != name);
        before - cookies.len()
    }

    /// Value of the first cookie with this name
    pub fn get(&self, name: &str) -> Option<String> {
        self.cookies
            .lock()
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.value.clone())
    }

    /// Snapshot of all cookies in insertion order
    pub fn cookies(&self) -> Vec<Cookie> {
        self.cookies.lock().clone()
    }

    /// Name to value view, first cookie per name wins
    pub fn to_map(&self) -> OrderedMap<String, String> {
        let mut map = OrderedMap::new();
        for cookie in self.cookies.lock().iter() {
            map.entry(cookie.name.clone())
                .or_insert_with(|| cookie.value.clone());
        }
        map
    }

    /// Get all cookies for a URL
    pub fn get_cookies(&self, url: &Url) -> Vec<Cookie> {
        self.remove_expired();
        self.cookies
            .lock()
            .iter()
            .filter(|c| c.matches(url))
            .cloned()
            .collect()
    }

    /// Get Cookie header value for a URL
    pub fn get_cookie_header(&self, url: &Url) -> Option<String> {
        let cookies = self.get_cookies(url);
        if cookies.is_empty() {
            return None;
        }

        Some(
            cookies
                .iter()
                .map(|c| c.to_header_value())
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Clear all cookies
    pub fn clear(&self) {
        self.cookies.lock().clear();
    }

    fn remove_expired(&self) {
        self.cookies.lock().retain(|c| !c.is_expired());
    }

    /// Get total cookie count
    pub fn len(&self) -> usize {
        self.cookies.lock().len()
    }

    /// Check if jar is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Export all cookies as JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.cookies())
    }

    /// Import cookies from JSON
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let cookies: Vec<Cookie> = serde_json::from_str(json)?;
        Ok(CookieJar::from_cookies(cookies))
    }
}

impl PartialEq for CookieJar {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.cookies() == other.cookies()
    }
}

impl<'a> IntoIterator for &'a CookieJar {
    type Item = Cookie;
    type IntoIter = std::vec::IntoIter<Cookie>;

    fn into_iter(self) -> Self::IntoIter {
        self.cookies().into_iter()
    }
}

/// Cookies supplied to a single call
#[derive(Debug, Clone)]
pub enum CookieInput {
    /// Name to value mapping; `Unset` names are dropped from the call's jar
    Values(Overrides<String, String>),
    /// A ready jar, used as-is without copying
    Jar(CookieJar),
}

impl CookieInput {
    /// Build the call's jar and collect the names explicitly unset.
    ///
    /// A mapping always yields a fresh jar. A jar passes through untouched
    /// and never has dead names: to drop cookies from a real jar, remove
    /// them from it directly.
    pub fn into_jar(self) -> Result<(CookieJar, Vec<String>)> {
        match self {
            CookieInput::Jar(jar) => Ok((jar, Vec::new())),
            CookieInput::Values(values) => {
                let jar = CookieJar::new();
                let mut dead = Vec::new();
                for (name, value) in values.into_map()? {
                    match value {
                        Override::Set(value) => jar.set(Cookie::new(name, value)),
                        Override::Unset => dead.push(name),
                    }
                }
                Ok((jar, dead))
            }
        }
    }
}

impl From<CookieJar> for CookieInput {
    fn from(jar: CookieJar) -> Self {
        CookieInput::Jar(jar)
    }
}

impl From<Overrides<String, String>> for CookieInput {
    fn from(values: Overrides<String, String>) -> Self {
        CookieInput::Values(values)
    }
}

impl From<OrderedMap<String, String>> for CookieInput {
    fn from(values: OrderedMap<String, String>) -> Self {
        CookieInput::Values(KeyValues::Map(
            values
                .into_iter()
                .map(|(k, v)| (k, Override::Set(v)))
                .collect(),
        ))
    }
}
