//! Per-region session cache
//!
//! Each region holds at most one bootstrap payload. A payload younger than the
//! freshness window is served from memory; an older one is replaced wholesale
//! by a new bootstrap call. Every region has its own lock, so a slow refresh
//! in one region never blocks callers of another, and concurrent callers for
//! the same region share a single in-flight bootstrap.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use log::{info, warn};
use serde_json::Value;

use crate::error::{GuideError, Result};
use crate::upstream::Upstream;

pub const SESSION_FRESHNESS_HOURS: i64 = 4;

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

#[derive(Debug, Clone)]
pub struct Session {
    pub region: String,
    /// Opaque bootstrap response
    pub payload: Value,
    pub fetched_at: DateTime<Utc>,
}

impl Session {
    pub fn token(&self) -> Option<&str> {
        self.payload.get("sessionToken").and_then(Value::as_str)
    }

    pub fn stitcher_params(&self) -> Option<&str> {
        self.payload.get("stitcherParams").and_then(Value::as_str)
    }

    /// Token for authenticated calls
    pub fn bearer(&self) -> Result<&str> {
        self.token().ok_or_else(|| GuideError::NotReady {
            region: self.region.clone(),
        })
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now - self.fetched_at < window
    }
}

type Slot = Arc<Mutex<Option<Arc<Session>>>>;

pub struct SessionCache {
    upstream: Arc<Upstream>,
    freshness: Duration,
    clock: Clock,
    slots: Mutex<HashMap<String, Slot>>,
}

impl SessionCache {
    pub fn new(upstream: Arc<Upstream>) -> Self {
        Self {
            upstream,
            freshness: Duration::hours(SESSION_FRESHNESS_HOURS),
            clock: system_clock(),
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    fn slot(&self, region: &str) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(region.to_string()).or_default())
    }

    /// Cached session for `region`, bootstrapping a new one when the cached
    /// entry is missing or older than the freshness window.
    ///
    /// A failed refresh falls back to the stale entry when there is one.
    /// Without a prior entry the bootstrap error is returned unchanged.
    pub fn get_session(&self, region: &str) -> Result<Arc<Session>> {
        let slot = self.slot(region);
        let mut cached = slot.lock().unwrap_or_else(PoisonError::into_inner);

        let now = (self.clock)();
        if let Some(session) = cached.as_ref() {
            if session.is_fresh(now, self.freshness) {
                return Ok(Arc::clone(session));
            }
        }

        match self.upstream.start_session(region) {
            Ok(payload) => {
                let session = Arc::new(Session {
                    region: region.to_string(),
                    payload,
                    fetched_at: now,
                });
                info!(
                    "New token for {} generated at {}",
                    region,
                    now.format("%Y-%m-%d %H:%M.%S %z")
                );
                *cached = Some(Arc::clone(&session));
                Ok(session)
            }
            Err(e) => match cached.as_ref() {
                Some(stale) => {
                    warn!(
                        "Session refresh for {} failed, reusing token from {}: {}",
                        region,
                        stale.fetched_at.format("%Y-%m-%d %H:%M.%S %z"),
                        e
                    );
                    Ok(Arc::clone(stale))
                }
                None => Err(e),
            },
        }
    }

    /// Cached session without triggering a bootstrap
    pub fn peek(&self, region: &str) -> Option<Arc<Session>> {
        let slot = self.slot(region);
        let cached = slot.lock().unwrap_or_else(PoisonError::into_inner);
        cached.clone()
    }
}
