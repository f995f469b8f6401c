//! In-process profile cache.
//!
//! Entries are only dropped by TTL, capacity or explicit invalidation from
//! writers. Readers that need strong consistency bypass it.
//!
//! Readers take a [`Generation`] before going to storage and hand it back
//! when filling the cache. A fill racing an invalidation is dropped, so a
//! stale read never outlives the invalidation that followed it.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::sync::Cache;

use crate::config;
use crate::model::User;
use crate::telemetry::{CACHE_HITS, CACHE_INVALIDATIONS, CACHE_MISSES};

const CHANNEL_PROFILES: &str = "channel_profiles";
const PROFILE_BY_ID: &str = "profile_by_id";

/// Profiles of one channel, keyed by user id.
pub type ChannelProfiles = Arc<HashMap<String, User>>;

/// Invalidation count observed by a reader before it hit storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Generation(u64);

/// Channel and per-user profile caches.
#[derive(Clone)]
pub struct ProfileCache {
    channel_profiles: Cache<String, ChannelProfiles>,
    profile_by_id: Cache<String, User>,
    generation: Arc<AtomicU64>,
}

impl ProfileCache {
    /// Create a new [`ProfileCache`].
    pub fn new(ttl: Duration, capacity: u64) -> Self {
        Self {
            channel_profiles: Cache::builder()
                .time_to_live(ttl)
                .max_capacity(capacity)
                .build(),
            profile_by_id: Cache::builder()
                .time_to_live(ttl)
                .max_capacity(capacity)
                .build(),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn from_config(config: &config::Cache) -> Self {
        Self::new(Duration::from_secs(config.ttl_seconds), config.capacity)
    }

    /// Take before reading storage; pass to the matching `insert_*`.
    pub fn generation(&self) -> Generation {
        Generation(self.generation.load(Ordering::SeqCst))
    }

    pub fn channel_profiles(&self, channel_id: &str) -> Option<ChannelProfiles> {
        record(CHANNEL_PROFILES, self.channel_profiles.get(channel_id))
    }

    /// Cache the member map of `channel_id` read at `seen`.
    ///
    /// Returns `false` when an invalidation ran since `seen` and nothing
    /// was kept.
    pub fn insert_channel_profiles(
        &self,
        channel_id: &str,
        profiles: ChannelProfiles,
        seen: Generation,
    ) -> bool {
        self.fill(&self.channel_profiles, channel_id.to_owned(), profiles, seen)
    }

    pub fn profile(&self, user_id: &str) -> Option<User> {
        record(PROFILE_BY_ID, self.profile_by_id.get(user_id))
    }

    /// Cache `profile` read at `seen`. See [`ProfileCache::insert_channel_profiles`].
    pub fn insert_profile(&self, profile: User, seen: Generation) -> bool {
        self.fill(&self.profile_by_id, profile.id.clone(), profile, seen)
    }

    fn fill<V>(&self, cache: &Cache<String, V>, key: String, value: V, seen: Generation) -> bool
    where
        V: Clone + Send + Sync + 'static,
    {
        if self.generation() != seen {
            return false;
        }

        cache.insert(key.clone(), value);

        // an invalidation may have landed between the check and the insert.
        if self.generation() != seen {
            cache.invalidate(&key);
            return false;
        }
        true
    }

    fn bump(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Drop the cached member map of `channel_id`.
    pub fn invalidate_channel(&self, channel_id: &str) {
        tracing::debug!(%channel_id, "invalidate channel profiles");
        metrics::counter!(CACHE_INVALIDATIONS, "cache" => CHANNEL_PROFILES).increment(1);
        self.bump();
        self.channel_profiles.invalidate(channel_id);
    }

    /// Drop every cached channel map containing `user_id`.
    pub fn invalidate_channels_of_user(&self, user_id: &str) {
        self.bump();
        let stale: Vec<Arc<String>> = self
            .channel_profiles
            .iter()
            .filter(|(_, profiles)| profiles.contains_key(user_id))
            .map(|(channel_id, _)| channel_id)
            .collect();

        for channel_id in stale {
            self.invalidate_channel(channel_id.as_str());
        }
    }

    pub fn invalidate_profile(&self, user_id: &str) {
        tracing::debug!(%user_id, "invalidate profile");
        metrics::counter!(CACHE_INVALIDATIONS, "cache" => PROFILE_BY_ID).increment(1);
        self.bump();
        self.profile_by_id.invalidate(user_id);
    }

    /// Forget everything known about `user_id`.
    pub fn invalidate_user(&self, user_id: &str) {
        self.invalidate_profile(user_id);
        self.invalidate_channels_of_user(user_id);
    }

    pub fn clear(&self) {
        self.bump();
        self.channel_profiles.invalidate_all();
        self.profile_by_id.invalidate_all();
    }
}

impl Default for ProfileCache {
    fn default() -> Self {
        Self::from_config(&config::Cache::default())
    }
}

fn record<T>(cache: &'static str, entry: Option<T>) -> Option<T> {
    if entry.is_some() {
        metrics::counter!(CACHE_HITS, "cache" => cache).increment(1);
    } else {
        metrics::counter!(CACHE_MISSES, "cache" => cache).increment(1);
    }
    entry
}
