//! Per-client request throttling.
//!
//! Fixed-window counters kept in process memory. The client is identified by the
//! first `X-Forwarded-For` hop, then `X-Real-IP`; requests carrying neither share
//! one anonymous bucket.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

use crate::app::AppState;
use crate::errors::AppError;

const ANONYMOUS_CLIENT: &str = "anonymous";
const DEFAULT_WINDOW_SECS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

impl RateLimitConfig {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self { max_requests, window }
    }

    /// `Ok(None)` when `RATE_LIMIT_REQUESTS` is unset or zero.
    pub fn from_env() -> Result<Option<Self>, AppError> {
        let max_requests = match std::env::var("RATE_LIMIT_REQUESTS") {
            Ok(value) => value
                .parse::<u32>()
                .map_err(|_| AppError::configuration("RATE_LIMIT_REQUESTS must be a valid integer"))?,
            Err(_) => return Ok(None),
        };
        if max_requests == 0 {
            return Ok(None);
        }

        let window_secs = std::env::var("RATE_LIMIT_WINDOW_SECS")
            .map(|val| val.parse::<u64>())
            .unwrap_or(Ok(DEFAULT_WINDOW_SECS))
            .map_err(|_| AppError::configuration("RATE_LIMIT_WINDOW_SECS must be a valid integer"))?;

        Ok(Some(Self::new(max_requests, Duration::from_secs(window_secs.max(1)))))
    }
}

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u32,
}

#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Counts one request for `client`. On refusal returns the seconds until the
    /// client's window resets.
    pub fn check(&self, client: &str) -> Result<(), u64> {
        let now = Instant::now();
        let window_len = self.config.window;
        let mut windows = self.windows.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        windows.retain(|_, window| now.duration_since(window.started) < window_len);

        let window = windows.entry(client.to_string()).or_insert(Window { started: now, count: 0 });
        if window.count >= self.config.max_requests {
            let remaining = window_len.saturating_sub(now.duration_since(window.started));
            return Err(remaining.as_secs().max(1));
        }

        window.count += 1;
        Ok(())
    }
}

pub fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
        .unwrap_or_else(|| ANONYMOUS_CLIENT.to_string())
}

pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Result<Response, AppError> {
    let Some(limiter) = state.rate_limiter.as_ref() else {
        return Ok(next.run(request).await);
    };

    let client = client_key(request.headers());
    if let Err(retry_after_secs) = limiter.check(&client) {
        tracing::warn!(%client, retry_after_secs, "rate limit exceeded");
        return Err(AppError::RateLimited { retry_after_secs });
    }

    Ok(next.run(request).await)
}
