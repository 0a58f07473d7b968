// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Session layer
//!
//! Normalizes dict-like inputs, merges per-call options with session
//! defaults, reconciles cookies and dispatches hooks before handing the
//! built request to the transport.

mod args;
mod config;
mod hooks;
mod merge;
mod normalize;
#[allow(clippy::module_inception)]
mod session;

pub use args::{RequestArgs, RequestOptions};
pub use config::{
    pool_from_config, seed_defaults, SessionBuilder, DEFAULTS, POOL_BLOCK, POOL_CONNECTIONS,
    POOL_MAXSIZE, STORE_COOKIES,
};
pub use hooks::{dispatch_hook, events, Hook, HookPayload};
pub use merge::{as_overrides, merge, merge_scalar, resolve, Override, Overrides};
pub use normalize::{normalize, normalize_json, ItemsView, KeyValues, OrderedMap};
pub use session::{RequestOutcome, Session, SessionGuard, SessionId, SessionSnapshot};
