//! Scoped cache of the resolver's pre-filter stage.
//!
//! Entries hold the generated candidates and conflict index of one query;
//! filtering against `now` always runs fresh. Entries expire after the TTL
//! and are dropped per host whenever that host's rules, overrides, event
//! types or bookings are written.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::trace;

use crate::resolver::{AvailabilityRequest, PreparedQuery};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub user_id: String,
    pub event_type_id: String,
    pub range_start: DateTime<Utc>,
    pub range_end: DateTime<Utc>,
    pub timezone: Option<String>,
    pub company_profile_id: Option<String>,
}

impl From<&AvailabilityRequest> for CacheKey {
    fn from(req: &AvailabilityRequest) -> Self {
        Self {
            user_id: req.user_id.clone(),
            event_type_id: req.event_type_id.clone(),
            range_start: req.range_start,
            range_end: req.range_end,
            timezone: req.timezone.clone(),
            company_profile_id: req.company_profile_id.clone(),
        }
    }
}

/// Write count of one host as seen by the cache, taken before preparing a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation {
    epoch: u64,
    user: u64,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<CacheKey, (Instant, Arc<PreparedQuery>)>,
    /// Bumped per host on invalidation.
    generations: HashMap<String, u64>,
    /// Bumped on `clear`.
    epoch: u64,
}

impl Inner {
    fn generation(&self, user_id: &str) -> Generation {
        Generation {
            epoch: self.epoch,
            user: self.generations.get(user_id).copied().unwrap_or(0),
        }
    }

    fn bump(&mut self, user_id: &str) {
        *self.generations.entry(user_id.to_string()).or_insert(0) += 1;
    }
}

#[derive(Debug)]
pub struct AvailabilityCache {
    ttl: Duration,
    inner: Mutex<Inner>,
}

impl AvailabilityCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Mutex::new(Inner::default()),
        }
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<PreparedQuery>> {
        let mut inner = self.inner();
        match inner.entries.get(key) {
            Some((stored, prepared)) if stored.elapsed() < self.ttl => Some(Arc::clone(prepared)),
            Some(_) => {
                inner.entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Current generation of `user_id`; pass it back to [`insert`](Self::insert).
    pub fn generation(&self, user_id: &str) -> Generation {
        self.inner().generation(user_id)
    }

    /// Store `prepared` unless the host was invalidated since `seen` was taken.
    ///
    /// Expired entries of every key are swept first. The prepared query is
    /// returned either way.
    pub fn insert(
        &self,
        key: CacheKey,
        prepared: PreparedQuery,
        seen: Generation,
    ) -> Arc<PreparedQuery> {
        let prepared = Arc::new(prepared);
        let mut inner = self.inner();
        let ttl = self.ttl;
        inner.entries.retain(|_, (stored, _)| stored.elapsed() < ttl);
        if inner.generation(&key.user_id) == seen {
            inner.entries.insert(key, (Instant::now(), Arc::clone(&prepared)));
        } else {
            trace!(user_id = %key.user_id, "host written while preparing, not caching");
        }
        prepared
    }

    /// Drop every entry of `user_id`.
    pub fn invalidate_user(&self, user_id: &str) {
        let mut inner = self.inner();
        inner.bump(user_id);
        let before = inner.entries.len();
        inner.entries.retain(|k, _| k.user_id != user_id);
        trace!(user_id, dropped = before - inner.entries.len(), "invalidated cache entries");
    }

    /// Drop the entries of one event type of `user_id`.
    pub fn invalidate_event_type(&self, user_id: &str, event_type_id: &str) {
        let mut inner = self.inner();
        inner.bump(user_id);
        inner
            .entries
            .retain(|k, _| !(k.user_id == user_id && k.event_type_id == event_type_id));
    }

    pub fn clear(&self) {
        let mut inner = self.inner();
        inner.epoch += 1;
        inner.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.inner().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
