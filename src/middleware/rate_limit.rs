//! Fixed-window rate limiting with a pluggable counter store.
//!
//! `PgHitStore` keeps counters in Postgres so every server instance sees the
//! same budget.
use anyhow::Result;
use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

#[async_trait]
pub trait HitStore: Send + Sync {
    /// Counts one hit for `key` in the current window and returns the total so far.
    async fn record_hit(&self, key: &str, window: Duration) -> Result<u32>;

    /// Drops counters whose window has ended; returns how many were removed.
    async fn purge_expired(&self) -> Result<u64>;
}

/// Start and end of the fixed window containing `now`.
fn window_bounds(now: DateTime<Utc>, window: Duration) -> (DateTime<Utc>, DateTime<Utc>) {
    let secs = window.as_secs().max(1) as i64;
    let start_ts = now.timestamp() - now.timestamp().rem_euclid(secs);
    let start = DateTime::from_timestamp(start_ts, 0).unwrap_or(now);
    (start, start + chrono::Duration::seconds(secs))
}

#[derive(Clone)]
pub struct PgHitStore {
    pool: PgPool,
}

impl PgHitStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HitStore for PgHitStore {
    async fn record_hit(&self, key: &str, window: Duration) -> Result<u32> {
        let (window_start, expires_at) = window_bounds(Utc::now(), window);
        let hits = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO rate_limit_hits (key, window_start, hits, expires_at)
            VALUES ($1, $2, 1, $3)
            ON CONFLICT (key, window_start)
            DO UPDATE SET hits = rate_limit_hits.hits + 1
            RETURNING hits
            "#,
        )
        .bind(key)
        .bind(window_start)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(hits.max(0) as u32)
    }

    async fn purge_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM rate_limit_hits WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn HitStore>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn HitStore>, max_requests: u32, window_secs: u64) -> Self {
        Self {
            store,
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }

    /// Check if request is allowed for given identifier (IP, user_id, etc.)
    pub async fn check(&self, identifier: &str) -> bool {
        match self.store.record_hit(identifier, self.window).await {
            Ok(hits) => hits <= self.max_requests,
            Err(e) => {
                // Counter store down: let the request through
                tracing::warn!("Rate limit store error for {}: {}", identifier, e);
                true
            }
        }
    }

    pub async fn cleanup(&self) {
        match self.store.purge_expired().await {
            Ok(removed) => tracing::debug!("Rate limiter cleanup: {} expired windows", removed),
            Err(e) => tracing::error!("Rate limiter cleanup failed: {}", e),
        }
    }
}

/// Middleware for IP-based rate limiting
pub async fn rate_limit_middleware(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(limiter): State<RateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let ip = addr.ip().to_string();

    if !limiter.check(&ip).await {
        tracing::warn!("Rate limit exceeded for IP: {}", ip);
        return (
            StatusCode::TOO_MANY_REQUESTS,
            "Too many requests. Please try again later.",
        )
            .into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use chrono::TimeZone;
    use std::collections::HashMap;
    use tokio::sync::RwLock;

    #[derive(Clone, Default)]
    struct MemoryHitStore {
        counters: Arc<RwLock<HashMap<String, (DateTime<Utc>, u32)>>>,
    }

    impl MemoryHitStore {
        fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl HitStore for MemoryHitStore {
        async fn record_hit(&self, key: &str, window: Duration) -> Result<u32> {
            let now = Utc::now();
            let (_, expires_at) = window_bounds(now, window);
            let mut counters = self.counters.write().await;

            let entry = counters.entry(key.to_string()).or_insert((expires_at, 0));
            if entry.0 <= now {
                *entry = (expires_at, 0);
            }
            entry.1 += 1;
            Ok(entry.1)
        }

        async fn purge_expired(&self) -> Result<u64> {
            let now = Utc::now();
            let mut counters = self.counters.write().await;
            let before = counters.len();
            counters.retain(|_, (expires_at, _)| *expires_at > now);
            Ok((before - counters.len()) as u64)
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl HitStore for BrokenStore {
        async fn record_hit(&self, _key: &str, _window: Duration) -> Result<u32> {
            Err(anyhow!("connection refused"))
        }

        async fn purge_expired(&self) -> Result<u64> {
            Err(anyhow!("connection refused"))
        }
    }

    #[test]
    fn test_window_bounds_align() {
        let now = Utc.with_ymd_and_hms(2024, 5, 4, 13, 42, 7).unwrap();
        let (start, end) = window_bounds(now, Duration::from_secs(3600));
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 5, 4, 13, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 5, 4, 14, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn test_rate_limiter() {
        let limiter = RateLimiter::new(Arc::new(MemoryHitStore::new()), 3, 3600);

        assert!(limiter.check("test_ip").await);
        assert!(limiter.check("test_ip").await);
        assert!(limiter.check("test_ip").await);

        // 4th request should be blocked
        assert!(!limiter.check("test_ip").await);

        // Different IP should work
        assert!(limiter.check("other_ip").await);
    }

    #[tokio::test]
    async fn test_cleanup() {
        let store = MemoryHitStore::new();
        let limiter = RateLimiter::new(Arc::new(store.clone()), 5, 1);

        limiter.check("ip1").await;
        limiter.check("ip2").await;

        tokio::time::sleep(std::time::Duration::from_secs(2)).await;
        limiter.cleanup().await;

        let counters = store.counters.read().await;
        assert_eq!(counters.len(), 0);
    }

    #[tokio::test]
    async fn test_fails_open_when_store_errors() {
        let limiter = RateLimiter::new(Arc::new(BrokenStore), 1, 60);
        assert!(limiter.check("ip").await);
        assert!(limiter.check("ip").await);
        limiter.cleanup().await;
    }
}
