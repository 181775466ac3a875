use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

pub const DEFAULT_MAX_REQUESTS: usize = 10;
pub const DEFAULT_WINDOW_SECS: i64 = 60;
pub const DEFAULT_IDLE_TIMEOUT_SECS: i64 = 600;

/// Backing table for per-client request windows.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Record a request for `key` at `now` unless `limit` requests already
    /// fall inside the trailing `window`. Returns whether it was recorded.
    async fn try_acquire(
        &self,
        key: &str,
        now: DateTime<Utc>,
        window: TimeDelta,
        limit: usize,
    ) -> Result<bool>;

    /// Drop every client not seen for `idle`. Returns how many were removed.
    async fn evict_idle(&self, now: DateTime<Utc>, idle: TimeDelta) -> Result<usize>;
}

#[derive(Debug)]
struct ClientWindow {
    requests: VecDeque<DateTime<Utc>>,
    last_seen: DateTime<Utc>,
}

/// Single-process table; state is lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryRateLimitStore {
    clients: Mutex<HashMap<String, ClientWindow>>,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn client_count(&self) -> usize {
        self.clients.lock().await.len()
    }
}

#[async_trait]
impl RateLimitStore for InMemoryRateLimitStore {
    async fn try_acquire(
        &self,
        key: &str,
        now: DateTime<Utc>,
        window: TimeDelta,
        limit: usize,
    ) -> Result<bool> {
        let mut clients = self.clients.lock().await;
        let entry = clients
            .entry(key.to_string())
            .or_insert_with(|| ClientWindow {
                requests: VecDeque::new(),
                last_seen: now,
            });

        while entry
            .requests
            .front()
            .is_some_and(|first| now - *first >= window)
        {
            entry.requests.pop_front();
        }

        if entry.requests.len() >= limit {
            return Ok(false);
        }

        entry.requests.push_back(now);
        entry.last_seen = now;
        Ok(true)
    }

    async fn evict_idle(&self, now: DateTime<Utc>, idle: TimeDelta) -> Result<usize> {
        let mut clients = self.clients.lock().await;
        let before = clients.len();
        clients.retain(|_, client| now - client.last_seen <= idle);
        Ok(before - clients.len())
    }
}

/// Sliding-window limiter keyed by client identifier.
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    max_requests: usize,
    window: TimeDelta,
    idle_timeout: TimeDelta,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>) -> Self {
        Self {
            store,
            max_requests: DEFAULT_MAX_REQUESTS,
            window: TimeDelta::seconds(DEFAULT_WINDOW_SECS),
            idle_timeout: TimeDelta::seconds(DEFAULT_IDLE_TIMEOUT_SECS),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryRateLimitStore::new()))
    }

    pub fn with_limits(mut self, max_requests: usize, window: TimeDelta) -> Self {
        self.max_requests = max_requests;
        self.window = window;
        self
    }

    /// Whether `key` may make another request at `now`. A failing store lets
    /// the request through.
    pub async fn allow(&self, key: &str, now: DateTime<Utc>) -> bool {
        match self
            .store
            .try_acquire(key, now, self.window, self.max_requests)
            .await
        {
            Ok(allowed) => {
                if !allowed {
                    tracing::info!(client = key, "Rate limit exceeded");
                }
                allowed
            }
            Err(e) => {
                tracing::error!(client = key, "Rate limit store failed: {}", e);
                true
            }
        }
    }

    pub async fn sweep(&self, now: DateTime<Utc>) -> usize {
        match self.store.evict_idle(now, self.idle_timeout).await {
            Ok(removed) => {
                if removed > 0 {
                    tracing::debug!(removed, "Evicted idle rate limit entries");
                }
                removed
            }
            Err(e) => {
                tracing::error!("Rate limit sweep failed: {}", e);
                0
            }
        }
    }

    /// Periodically evict idle clients for the lifetime of the process.
    pub fn spawn_housekeeping(self: Arc<Self>) -> JoinHandle<()> {
        let period = self
            .idle_timeout
            .to_std()
            .unwrap_or(std::time::Duration::from_secs(600));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                self.sweep(Utc::now()).await;
            }
        })
    }
}
