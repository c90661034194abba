//! Cache Entry Module
//!
//! A packed value held by the in-memory backend together with its expiry.

use chrono::{DateTime, Duration, Utc};

// == Cache Entry ==
/// A single stored value with creation and expiry timestamps.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The packed value
    pub value: String,
    /// When the entry was written
    pub created_at: DateTime<Utc>,
    /// When the entry stops being served, None = never
    pub expires_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates an entry expiring `ttl_seconds` from now.
    ///
    /// A TTL of zero means the entry never expires, as does a TTL too large to
    /// represent as a timestamp.
    pub fn new(value: String, ttl_seconds: u64) -> Self {
        let now = Utc::now();
        let expires_at = match ttl_seconds {
            0 => None,
            secs => i64::try_from(secs)
                .ok()
                .and_then(Duration::try_seconds)
                .and_then(|ttl| now.checked_add_signed(ttl)),
        };

        Self {
            value,
            created_at: now,
            expires_at,
        }
    }

    // == Is Expired ==
    /// Checks expiry against a given instant.
    ///
    /// An entry is expired once `now` reaches `expires_at`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires| now >= expires)
    }

    /// Checks expiry against the current time.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    // == Time To Live ==
    /// Remaining lifetime in whole seconds; `Some(0)` once expired, None if the
    /// entry never expires.
    pub fn ttl_remaining(&self) -> Option<u64> {
        self.expires_at.map(|expires| {
            let remaining = expires - Utc::now();
            u64::try_from(remaining.num_seconds()).unwrap_or(0)
        })
    }
}
