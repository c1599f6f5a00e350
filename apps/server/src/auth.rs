//! # Device Authentication
//!
//! Bearer-token authentication with per-client abuse throttling.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    authenticate(client, token)                          │
//! │                                                                         │
//! │  client key = first hop of x-forwarded-for, else "unknown"             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  blocked? ──yes──► 429 (no store lookup)                               │
//! │       │no                                                               │
//! │       ▼                                                                 │
//! │  token missing? ──yes──► count failure, 400                            │
//! │       │no                                                               │
//! │       ▼                                                                 │
//! │  sleep 1-10 ms (random)   ← blunts timing-based token enumeration      │
//! │       ▼                                                                 │
//! │  store lookup by token                                                  │
//! │    miss / store error ──► count failure, 401                           │
//! │    hit  ──► clear bucket, write last_ping_at, return Device            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The throttle key is the client identity, not the token, so wrong-token
//! guesses from one source accumulate against a single bucket. 5 failures
//! within a 5-minute window block the client for 15 minutes; any success
//! clears the bucket entirely. Buckets live in memory only and are swept
//! lazily (at most once per sweep interval, on the way into a check).

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::http::HeaderMap;
use rand::Rng;
use tracing::{debug, warn};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use barkeep_core::Device;

/// Failures tolerated inside the attempt window before a block.
pub const MAX_ATTEMPTS: u32 = 5;

/// Rolling window for counting failures.
pub const ATTEMPT_WINDOW: Duration = Duration::from_secs(5 * 60);

/// How long a blocked client stays blocked.
pub const BLOCK_DURATION: Duration = Duration::from_secs(15 * 60);

/// Minimum gap between lazy sweeps of expired buckets.
const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

// =============================================================================
// Throttle Table
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct Bucket {
    count: u32,
    last_attempt: Instant,
    blocked_until: Option<Instant>,
}

struct ThrottleInner {
    buckets: HashMap<String, Bucket>,
    last_sweep: Instant,
}

/// Per-client failed-attempt accounting.
///
/// One instance per process, shared by all handlers. The mutex is only held
/// for map operations, never across an await.
pub struct AuthThrottle {
    inner: Mutex<ThrottleInner>,
}

impl AuthThrottle {
    pub fn new() -> Self {
        AuthThrottle {
            inner: Mutex::new(ThrottleInner {
                buckets: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }

    /// Whether the client is currently blocked. Runs the lazy sweep first
    /// when one is due.
    pub fn is_blocked(&self, client: &str) -> bool {
        self.is_blocked_at(client, Instant::now())
    }

    pub fn is_blocked_at(&self, client: &str, now: Instant) -> bool {
        let mut inner = lock(&self.inner);

        if now.duration_since(inner.last_sweep) >= SWEEP_INTERVAL {
            inner.buckets.retain(|_, bucket| {
                let block_live = bucket.blocked_until.is_some_and(|until| until > now);
                let attempts_live = now.duration_since(bucket.last_attempt) <= ATTEMPT_WINDOW;
                block_live || attempts_live
            });
            inner.last_sweep = now;
        }

        inner
            .buckets
            .get(client)
            .and_then(|bucket| bucket.blocked_until)
            .is_some_and(|until| until > now)
    }

    /// Records one failed attempt, starting a block on the fifth failure
    /// inside the window.
    pub fn record_failure(&self, client: &str) {
        self.record_failure_at(client, Instant::now());
    }

    pub fn record_failure_at(&self, client: &str, now: Instant) {
        let mut inner = lock(&self.inner);
        let bucket = inner.buckets.entry(client.to_string()).or_insert(Bucket {
            count: 0,
            last_attempt: now,
            blocked_until: None,
        });

        // A quiet client starts counting from scratch
        if now.duration_since(bucket.last_attempt) > ATTEMPT_WINDOW {
            bucket.count = 0;
        }

        bucket.count += 1;
        bucket.last_attempt = now;

        if bucket.count >= MAX_ATTEMPTS {
            bucket.blocked_until = Some(now + BLOCK_DURATION);
            warn!(client = %client, failures = bucket.count, "Client blocked");
        }
    }

    /// Drops the client's bucket entirely (successful authentication).
    pub fn clear(&self, client: &str) {
        lock(&self.inner).buckets.remove(client);
    }
}

impl Default for AuthThrottle {
    fn default() -> Self {
        Self::new()
    }
}

fn lock(mutex: &Mutex<ThrottleInner>) -> std::sync::MutexGuard<'_, ThrottleInner> {
    // Lossy accounting; a poisoned bucket map is still usable
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

// =============================================================================
// Authentication
// =============================================================================

/// Derives the throttling key from the request's originating address.
///
/// Behind the reverse proxy the first `x-forwarded-for` hop is the real
/// client; absent the header everything shares the "unknown" bucket.
pub fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|hop| hop.trim().to_string())
        .filter(|hop| !hop.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Authenticates a device call: throttle check, token lookup, liveness touch.
///
/// A store outage degrades to an authentication failure (counted against the
/// client) rather than a crash; devices retry on their own cadence.
pub async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
    token: Option<&str>,
) -> ApiResult<Device> {
    let client = client_key(headers);

    if state.throttle.is_blocked(&client) {
        return Err(ApiError::Throttled);
    }

    let token = match token.filter(|t| !t.is_empty()) {
        Some(token) => token,
        None => {
            state.throttle.record_failure(&client);
            return Err(ApiError::MissingToken);
        }
    };

    // Random delay so response timing leaks nothing about token validity
    let jitter_ms = rand::thread_rng().gen_range(1..=10);
    tokio::time::sleep(Duration::from_millis(jitter_ms)).await;

    let device = match state.db.devices().get_by_token(token).await {
        Ok(Some(device)) => device,
        Ok(None) => {
            state.throttle.record_failure(&client);
            return Err(ApiError::InvalidToken);
        }
        Err(err) => {
            warn!(client = %client, error = %err, "Token lookup failed, treating as invalid");
            state.throttle.record_failure(&client);
            return Err(ApiError::InvalidToken);
        }
    };

    state.throttle.clear(&client);

    if let Err(err) = state
        .db
        .devices()
        .touch_ping(&device.id, chrono::Utc::now())
        .await
    {
        // Liveness is best-effort; the authenticated call still proceeds
        warn!(device = %device.id, error = %err, "Failed to record ping");
    }

    debug!(device = %device.id, "Device authenticated");
    Ok(device)
}

// =============================================================================
// Unit Tests
// =============================================================================
