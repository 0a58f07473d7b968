// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Connection pool manager
//!
//! One pool per origin, at most `num_pools` pools (least recently used is
//! evicted), each pool reusing at most `maxsize` connections. Handles are
//! cheap to clone and safe to share between concurrent requests.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use url::Url;

use super::request::{ClientCert, Verify};
use crate::error::{Error, Result};
use crate::session::OrderedMap;

/// Default pool count and per-pool size
pub const DEFAULT_POOLSIZE: usize = 10;

/// Origin a pool serves
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolKey {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl PoolKey {
    /// Pool key for a URL
    pub fn from_url(url: &Url) -> Result<Self> {
        let host = url
            .host_str()
            .ok_or_else(|| Error::transport(url.as_str(), "URL has no host"))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| Error::transport(url.as_str(), "URL has no port"))?;
        Ok(Self {
            scheme: url.scheme().to_string(),
            host: host.to_string(),
            port,
        })
    }
}

/// Settings that require a distinct underlying client
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientSettings {
    pub verify: Verify,
    pub cert: Option<ClientCert>,
    pub proxies: Vec<(String, String)>,
    /// `None` disables redirects
    pub max_redirects: Option<usize>,
}

/// Pool statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoolStats {
    /// Pools created
    pub pools_created: u64,
    /// Pools dropped to stay under the pool cap
    pub pools_evicted: u64,
    /// Connections handed out
    pub connections_acquired: u64,
    /// Connections returned
    pub connections_released: u64,
    /// Connections currently out
    pub active_connections: u64,
    /// Peak concurrent connections
    pub peak_concurrent: u64,
    /// Connections handed out beyond a full non-blocking pool
    pub overflow: u64,
    /// Calls to `clear`
    pub clears: u64,
}

/// Pool of connections to one origin
pub struct ConnectionPool {
    key: PoolKey,
    maxsize: usize,
    slots: Arc<Semaphore>,
    clients: Mutex<HashMap<ClientSettings, reqwest::Client>>,
}

impl ConnectionPool {
    fn new(key: PoolKey, maxsize: usize) -> Self {
        Self {
            key,
            maxsize,
            slots: Arc::new(Semaphore::new(maxsize)),
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Origin served
    pub fn key(&self) -> &PoolKey {
        &self.key
    }

    /// Maximum reused connections
    pub fn maxsize(&self) -> usize {
        self.maxsize
    }

    fn close(&self) {
        self.slots.close();
        self.clients.lock().clear();
    }
}

struct Inner {
    num_pools: usize,
    maxsize: usize,
    block: bool,
    pools: Mutex<OrderedMap<PoolKey, Arc<ConnectionPool>>>,
    stats: RwLock<PoolStats>,
}

/// Handle to the pooled-connection manager
#[derive(Clone)]
pub struct PoolManager {
    inner: Arc<Inner>,
}

/// A connection slot checked out of a pool; released on drop
pub struct PooledConnection {
    pool: Arc<ConnectionPool>,
    manager: Arc<Inner>,
    _permit: Option<OwnedSemaphorePermit>,
}

impl PooledConnection {
    /// Pool this connection belongs to
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Client for these settings, built once per pool
    pub fn client_for<F>(&self, settings: &ClientSettings, build: F) -> Result<reqwest::Client>
    where
        F: FnOnce(&ClientSettings, usize) -> Result<reqwest::Client>,
    {
        let mut clients = self.pool.clients.lock();
        if let Some(client) = clients.get(settings) {
            return Ok(client.clone());
        }
        let client = build(settings, self.pool.maxsize)?;
        clients.insert(settings.clone(), client.clone());
        Ok(client)
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let mut stats = self.manager.stats.write();
        stats.connections_released += 1;
        stats.active_connections = stats.active_connections.saturating_sub(1);
    }
}

impl PoolManager {
    /// Create a manager. Sizes of zero fall back to [`DEFAULT_POOLSIZE`].
    ///
    /// Acquisition never waits: a full pool hands out an overflow
    /// connection that is not kept for reuse.
    pub fn new(num_pools: usize, maxsize: usize) -> Self {
        Self::with_blocking(num_pools, maxsize, false)
    }

    /// Create a manager whose pools make callers wait for a free slot
    pub fn with_blocking(num_pools: usize, maxsize: usize, block: bool) -> Self {
        let num_pools = if num_pools == 0 { DEFAULT_POOLSIZE } else { num_pools };
        let maxsize = if maxsize == 0 { DEFAULT_POOLSIZE } else { maxsize };
        Self {
            inner: Arc::new(Inner {
                num_pools,
                maxsize,
                block,
                pools: Mutex::new(OrderedMap::new()),
                stats: RwLock::new(PoolStats::default()),
            }),
        }
    }

    /// Maximum number of pools
    pub fn num_pools(&self) -> usize {
        self.inner.num_pools
    }

    /// Maximum connections per pool
    pub fn maxsize(&self) -> usize {
        self.inner.maxsize
    }

    /// Whether acquisition waits on a full pool
    pub fn is_blocking(&self) -> bool {
        self.inner.block
    }

    /// Whether both handles manage the same pools
    pub fn ptr_eq(&self, other: &PoolManager) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of live pools
    pub fn pool_count(&self) -> usize {
        self.inner.pools.lock().len()
    }

    /// Pool for an origin, marking it most recently used
    fn pool_for(&self, key: PoolKey) -> Arc<ConnectionPool> {
        let mut pools = self.inner.pools.lock();

        if let Some(pool) = pools.shift_remove(&key) {
            pools.insert(key, Arc::clone(&pool));
            return pool;
        }

        let pool = Arc::new(ConnectionPool::new(key.clone(), self.inner.maxsize));
        pools.insert(key, Arc::clone(&pool));

        let mut stats = self.inner.stats.write();
        stats.pools_created += 1;

        while pools.len() > self.inner.num_pools {
            if let Some((evicted, old)) = pools.shift_remove_index(0) {
                tracing::debug!(host = %evicted.host, port = evicted.port, "Evicting connection pool");
                old.close();
                stats.pools_evicted += 1;
            }
        }

        pool
    }

    /// Check out a connection for the URL's origin
    pub async fn acquire(&self, url: &Url) -> Result<PooledConnection> {
        let key = PoolKey::from_url(url)?;
        let pool = self.pool_for(key);

        let permit = if self.inner.block {
            let permit = Arc::clone(&pool.slots)
                .acquire_owned()
                .await
                .map_err(|_| Error::transport(url.as_str(), "connection pool closed"))?;
            Some(permit)
        } else {
            Arc::clone(&pool.slots).try_acquire_owned().ok()
        };

        {
            let mut stats = self.inner.stats.write();
            stats.connections_acquired += 1;
            stats.active_connections += 1;
            if permit.is_none() {
                stats.overflow += 1;
            }
            if stats.active_connections > stats.peak_concurrent {
                stats.peak_concurrent = stats.active_connections;
            }
        }

        Ok(PooledConnection {
            pool,
            manager: Arc::clone(&self.inner),
            _permit: permit,
        })
    }

    /// Close every pool and drop their idle connections. Idempotent.
    pub fn clear(&self) {
        let drained: Vec<_> = self.inner.pools.lock().drain(..).collect();
        for (_, pool) in &drained {
            pool.close();
        }
        self.inner.stats.write().clears += 1;
        tracing::debug!(pools = drained.len(), "Cleared connection pools");
    }

    /// Get pool statistics
    pub fn stats(&self) -> PoolStats {
        self.inner.stats.read().clone()
    }
}

impl std::fmt::Debug for PoolManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolManager")
            .field("num_pools", &self.inner.num_pools)
            .field("maxsize", &self.inner.maxsize)
            .field("block", &self.inner.block)
            .field("pools", &self.pool_count())
            .finish()
    }
}
