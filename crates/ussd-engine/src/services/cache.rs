//! TTL memo in front of a geography source.
//!
//! Entries expire after the configured TTL. A cache miss always asks the
//! wrapped source, so stale data can only be as old as the TTL.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::debug;

use ussd_core::types::{GeoLevel, GeoUnit};

use super::GeographyService;
use crate::error::ServiceError;

type Key = (GeoLevel, Option<i64>);

pub struct CachedGeography<G> {
    inner: G,
    ttl: Duration,
    entries: Mutex<HashMap<Key, (Instant, Vec<GeoUnit>)>>,
}

impl<G: GeographyService> CachedGeography<G> {
    /// Wrap `inner`. A zero TTL disables caching.
    pub fn new(inner: G, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn get(&self, key: &Key) -> Option<Vec<GeoUnit>> {
        let entries = self.entries.lock().ok()?;
        let (stored_at, units) = entries.get(key)?;
        (stored_at.elapsed() < self.ttl).then(|| units.clone())
    }

    fn put(&self, key: Key, units: Vec<GeoUnit>) {
        if self.ttl.is_zero() {
            return;
        }
        if let Ok(mut entries) = self.entries.lock() {
            entries.retain(|_, (stored_at, _)| stored_at.elapsed() < self.ttl);
            entries.insert(key, (Instant::now(), units));
        }
    }

    /// Drop every cached entry.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

#[async_trait]
impl<G: GeographyService> GeographyService for CachedGeography<G> {
    async fn children(
        &self,
        level: GeoLevel,
        parent_id: Option<i64>,
    ) -> Result<Vec<GeoUnit>, ServiceError> {
        let key = (level, parent_id);
        if let Some(units) = self.get(&key) {
            debug!(%level, ?parent_id, "Geography cache hit");
            return Ok(units);
        }
        let units = self.inner.children(level, parent_id).await?;
        self.put(key, units.clone());
        Ok(units)
    }
}
