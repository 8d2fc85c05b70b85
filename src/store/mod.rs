pub mod memory;

use log::info;
use redis::{AsyncCommands, SetExpiry, SetOptions};
use std::time::Duration;
use thiserror::Error;

pub use memory::MemoryStore;

/// Lifetime assigned to a key when it is first created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyExpiry {
    /// Key lives for a fixed duration from now.
    After(Duration),
    /// Key dies at an absolute deadline, milliseconds since the Unix epoch.
    /// Used for counters that reset on calendar boundaries.
    AtMillis(i64),
    /// Key never expires on its own.
    Never,
}

/// What the store knows about a marker key's remaining lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerState {
    Absent,
    Permanent,
    Expires(Duration),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis command failed: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Shared counter store backing both the rate limiter and the revocation
/// list. The Redis variant is the production backend so that every gate
/// instance behind a load balancer sees the same counters; the memory
/// variant covers single-process deployments and tests.
///
/// Handles are cheap to clone and are passed into each component that
/// needs one, so two components built from the same handle always observe
/// each other's writes.
#[derive(Clone)]
pub enum CounterStore {
    Memory(MemoryStore),
    Redis {
        connection_manager: redis::aio::ConnectionManager,
    },
}

impl CounterStore {
    pub fn memory() -> Self {
        CounterStore::Memory(MemoryStore::new())
    }

    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url)?;
        let connection_manager = redis::aio::ConnectionManager::new(client).await?;

        info!("Connected admission gate counter store to Redis at {}", redis_url);

        Ok(CounterStore::Redis { connection_manager })
    }

    /// Atomically increments a counter and returns the post-increment
    /// value. The expiry is applied only when the increment created the
    /// key, so concurrent callers racing on a fresh key still leave it
    /// with a single deadline and no increment is ever lost.
    pub async fn increment(&self, key: &str, expiry: KeyExpiry) -> Result<i64, StoreError> {
        match self {
            CounterStore::Memory(store) => Ok(store.increment(key, expiry)),
            CounterStore::Redis { connection_manager } => {
                let mut conn = connection_manager.clone();

                let count: i64 = conn.incr(key, 1).await?;

                if count == 1 {
                    // Set expiration only on first increment
                    match expiry {
                        KeyExpiry::After(window) => {
                            let _: () = conn.pexpire(key, window.as_millis() as i64).await?;
                        }
                        KeyExpiry::AtMillis(deadline_ms) => {
                            let _: () = conn.pexpire_at(key, deadline_ms).await?;
                        }
                        KeyExpiry::Never => {}
                    }
                }

                Ok(count)
            }
        }
    }

    /// Current counter value without touching it. Missing or expired keys
    /// read as zero.
    pub async fn count(&self, key: &str) -> Result<i64, StoreError> {
        match self {
            CounterStore::Memory(store) => Ok(store.count(key)),
            CounterStore::Redis { connection_manager } => {
                let mut conn = connection_manager.clone();
                let value: Option<i64> = conn.get(key).await?;
                Ok(value.unwrap_or(0))
            }
        }
    }

    pub async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        match self {
            CounterStore::Memory(store) => Ok(store.exists(key)),
            CounterStore::Redis { connection_manager } => {
                let mut conn = connection_manager.clone();
                Ok(conn.exists(key).await?)
            }
        }
    }

    /// Writes a presence marker. Overwrites any previous marker and its
    /// lifetime. The value and its expiry travel in a single command, so
    /// a marker is never observable without the deadline it was given.
    pub async fn set_marker(&self, key: &str, expiry: KeyExpiry) -> Result<(), StoreError> {
        match self {
            CounterStore::Memory(store) => {
                store.set_marker(key, expiry);
                Ok(())
            }
            CounterStore::Redis { connection_manager } => {
                let mut conn = connection_manager.clone();
                match expiry {
                    KeyExpiry::After(window) => {
                        let _: () = conn.pset_ex(key, 1, window.as_millis() as u64).await?;
                    }
                    KeyExpiry::AtMillis(deadline_ms) => {
                        let options = SetOptions::default()
                            .with_expiration(SetExpiry::PXAT(deadline_ms as u64));
                        let _: () = conn.set_options(key, 1, options).await?;
                    }
                    KeyExpiry::Never => {
                        // A plain SET clears any leftover TTL, which is what
                        // a permanent marker needs.
                        let _: () = conn.set(key, 1).await?;
                    }
                }
                Ok(())
            }
        }
    }

    /// Classifies a marker by its remaining lifetime, mirroring the PTTL
    /// contract: missing keys are `Absent`, keys without a deadline are
    /// `Permanent` and everything else reports the time left.
    pub async fn marker_ttl(&self, key: &str) -> Result<MarkerState, StoreError> {
        match self {
            CounterStore::Memory(store) => Ok(store.marker_ttl(key)),
            CounterStore::Redis { connection_manager } => {
                let mut conn = connection_manager.clone();
                let pttl: i64 = conn.pttl(key).await?;
                Ok(match pttl {
                    -2 => MarkerState::Absent,
                    -1 => MarkerState::Permanent,
                    ms if ms > 0 => MarkerState::Expires(Duration::from_millis(ms as u64)),
                    _ => MarkerState::Absent,
                })
            }
        }
    }

    pub async fn remove(&self, key: &str) -> Result<(), StoreError> {
        match self {
            CounterStore::Memory(store) => {
                store.remove(key);
                Ok(())
            }
            CounterStore::Redis { connection_manager } => {
                let mut conn = connection_manager.clone();
                let _: () = conn.del(key).await?;
                Ok(())
            }
        }
    }
}
