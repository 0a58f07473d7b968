// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Header names and values as the session layer sees them

use std::fmt;
use std::hash::{Hash, Hasher};

use reqwest::header::HeaderMap;

use crate::error::{Error, Result};
use crate::session::{ItemsView, Override};

/// Header name compared and hashed without regard to ASCII case.
///
/// The spelling first given is kept for sending.
#[derive(Debug, Clone, Eq)]
pub struct HeaderKey(String);

impl HeaderKey {
    /// Create a header key
    pub fn new(name: impl Into<String>) -> Self {
        HeaderKey(name.into())
    }

    /// The name as originally spelled
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl PartialEq for HeaderKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Hash for HeaderKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for b in self.0.bytes() {
            state.write_u8(b.to_ascii_lowercase());
        }
        state.write_u8(0xff);
    }
}

impl fmt::Display for HeaderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HeaderKey {
    fn from(s: &str) -> Self {
        HeaderKey(s.to_string())
    }
}

impl From<String> for HeaderKey {
    fn from(s: String) -> Self {
        HeaderKey(s)
    }
}

/// One element of a list-valued header, e.g. `text/html; q=0.9`
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderElement {
    /// Main token
    pub value: String,
    /// `key=value` parameters, in order
    pub params: Vec<(String, String)>,
}

impl HeaderElement {
    /// Element without parameters
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            params: Vec::new(),
        }
    }

    /// Add a parameter
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }
}

/// Header value supplied to a call: a scalar or a list to expand
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderInput {
    /// Sent as-is
    Text(String),
    /// Joined into wire form by [`HeaderInput::expand`]
    List(Vec<HeaderElement>),
}

impl HeaderInput {
    /// Wire form: elements joined by `, `, parameters by `; `.
    ///
    /// `[text/x-dvi (q=.8, mxb=100000), text/x-c]` becomes
    /// `text/x-dvi; q=.8; mxb=100000, text/x-c`.
    pub fn expand(self) -> String {
        match self {
            HeaderInput::Text(s) => s,
            HeaderInput::List(elements) => elements
                .into_iter()
                .map(|el| {
                    let mut out = el.value;
                    for (k, v) in el.params {
                        out.push_str("; ");
                        out.push_str(&k);
                        out.push('=');
                        out.push_str(&v);
                    }
                    out
                })
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

impl From<&str> for HeaderInput {
    fn from(s: &str) -> Self {
        HeaderInput::Text(s.to_string())
    }
}

impl From<String> for HeaderInput {
    fn from(s: String) -> Self {
        HeaderInput::Text(s)
    }
}

impl From<Vec<HeaderElement>> for HeaderInput {
    fn from(elements: Vec<HeaderElement>) -> Self {
        HeaderInput::List(elements)
    }
}

impl From<Vec<&str>> for HeaderInput {
    fn from(values: Vec<&str>) -> Self {
        HeaderInput::List(values.into_iter().map(HeaderElement::new).collect())
    }
}

impl ItemsView<HeaderKey, Override<HeaderInput>> for HeaderMap {
    fn items(&self) -> Result<Vec<(HeaderKey, Override<HeaderInput>)>> {
        self.iter()
            .map(|(name, value)| {
                let value = value.to_str().map_err(|_| {
                    Error::type_error(format!("header {} is not valid UTF-8 text", name))
                })?;
                Ok((
                    HeaderKey::new(name.as_str()),
                    Override::Set(HeaderInput::from(value)),
                ))
            })
            .collect()
    }
}
