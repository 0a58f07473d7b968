// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Hook chains
//!
//! A hook is a transform registered under an event name. The chain for an
//! event runs in order, each hook seeing the previous hook's output. A hook
//! returning `None` leaves the payload as it was.
//!
//! # Example
//!
//! ```rust,no_run
//! use sessionjar::{Hook, Session};
//!
//! let session = Session::builder()
//!     .hook("args", Hook::args(|args| {
//!         let mut args = args.clone();
//!         args.timeout = Some(std::time::Duration::from_secs(5));
//!         Some(args)
//!     }))
//!     .build()
//!     .unwrap();
//! ```

use std::fmt;
use std::sync::Arc;

use super::args::RequestArgs;
use super::normalize::OrderedMap;
use crate::error::{Error, Result};
use crate::http::{Request, Response};

/// Event names dispatched by a session
pub mod events {
    /// Provisional request arguments, after merging with the session
    pub const ARGS: &str = "args";
    /// Built request, immediately before it is sent
    pub const PRE_REQUEST: &str = "pre_request";
    /// Response, after cookies have been stored
    pub const RESPONSE: &str = "response";

    /// All events, in dispatch order
    pub const ALL: [&str; 3] = [ARGS, PRE_REQUEST, RESPONSE];
}

/// Value passed through a hook chain
#[derive(Debug, Clone)]
pub enum HookPayload {
    Args(Box<RequestArgs>),
    Request(Box<Request>),
    Response(Box<Response>),
}

impl HookPayload {
    /// Payload kind, for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            HookPayload::Args(_) => "args",
            HookPayload::Request(_) => "request",
            HookPayload::Response(_) => "response",
        }
    }

    /// Unwrap request arguments
    pub fn into_args(self, event: &str) -> Result<RequestArgs> {
        match self {
            HookPayload::Args(args) => Ok(*args),
            other => Err(Error::hook(event, format!("expected args, got {}", other.kind()))),
        }
    }

    /// Unwrap a request
    pub fn into_request(self, event: &str) -> Result<Request> {
        match self {
            HookPayload::Request(request) => Ok(*request),
            other => Err(Error::hook(event, format!("expected request, got {}", other.kind()))),
        }
    }

    /// Unwrap a response
    pub fn into_response(self, event: &str) -> Result<Response> {
        match self {
            HookPayload::Response(response) => Ok(*response),
            other => Err(Error::hook(event, format!("expected response, got {}", other.kind()))),
        }
    }
}

type HookFn = dyn Fn(&HookPayload) -> Option<HookPayload> + Send + Sync;

/// A registered transform
#[derive(Clone)]
pub struct Hook(Arc<HookFn>);

impl Hook {
    /// Hook over any payload
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&HookPayload) -> Option<HookPayload> + Send + Sync + 'static,
    {
        Hook(Arc::new(f))
    }

    /// Hook over request arguments; ignores other payloads
    pub fn args<F>(f: F) -> Self
    where
        F: Fn(&RequestArgs) -> Option<RequestArgs> + Send + Sync + 'static,
    {
        Self::new(move |payload| match payload {
            HookPayload::Args(args) => f(args).map(|a| HookPayload::Args(Box::new(a))),
            _ => None,
        })
    }

    /// Hook over built requests; ignores other payloads
    pub fn request<F>(f: F) -> Self
    where
        F: Fn(&Request) -> Option<Request> + Send + Sync + 'static,
    {
        Self::new(move |payload| match payload {
            HookPayload::Request(request) => f(request).map(|r| HookPayload::Request(Box::new(r))),
            _ => None,
        })
    }

    /// Hook over responses; ignores other payloads
    pub fn response<F>(f: F) -> Self
    where
        F: Fn(&Response) -> Option<Response> + Send + Sync + 'static,
    {
        Self::new(move |payload| match payload {
            HookPayload::Response(response) => f(response).map(|r| HookPayload::Response(Box::new(r))),
            _ => None,
        })
    }

    /// Observe a payload without replacing it
    pub fn inspect<F>(f: F) -> Self
    where
        F: Fn(&HookPayload) + Send + Sync + 'static,
    {
        Self::new(move |payload| {
            f(payload);
            None
        })
    }

    /// Run the hook
    pub fn call(&self, payload: &HookPayload) -> Option<HookPayload> {
        (self.0)(payload)
    }
}

impl PartialEq for Hook {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hook({:p})", Arc::as_ptr(&self.0) as *const ())
    }
}

/// Run the chain registered for `event` over `payload`.
///
/// Events without a chain return the payload unchanged. A hook that
/// answers with a different payload kind fails the dispatch.
pub fn dispatch_hook(
    event: &str,
    hooks: &OrderedMap<String, Vec<Hook>>,
    payload: HookPayload,
) -> Result<HookPayload> {
    let chain = match hooks.get(event) {
        Some(chain) if !chain.is_empty() => chain,
        _ => return Ok(payload),
    };

    let kind = payload.kind();
    let mut payload = payload;
    let mut replaced = 0usize;

    for hook in chain {
        if let Some(next) = hook.call(&payload) {
            if next.kind() != kind {
                return Err(Error::hook(
                    event,
                    format!("hook returned a {} payload, expected {}", next.kind(), kind),
                ));
            }
            payload = next;
            replaced += 1;
        }
    }

    tracing::debug!(event, hooks = chain.len(), replaced, "Dispatched hook chain");
    Ok(payload)
}
