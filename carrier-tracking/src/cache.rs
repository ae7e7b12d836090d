//! Carrier access token cache.
//!
//! The cache is injected rather than held as ambient state so a deployment
//! can swap the process-local slot for a shared one without touching call
//! sites. In a multi-instance deployment each process re-authenticating
//! independently is wasteful but correct: the carrier accepts multiple live
//! tokens.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

/// A bearer token together with its computed expiry instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Single-slot store for the carrier access token.
#[async_trait]
pub trait TokenCache: Send + Sync {
    async fn get(&self) -> Option<CachedToken>;

    async fn put(&self, token: CachedToken);

    /// Drop the cached token, forcing the next caller to re-authenticate.
    async fn invalidate(&self);
}

/// Process-local [`TokenCache`].
#[derive(Default)]
pub struct InMemoryTokenCache {
    slot: RwLock<Option<CachedToken>>,
}

impl InMemoryTokenCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenCache for InMemoryTokenCache {
    async fn get(&self) -> Option<CachedToken> {
        self.slot.read().await.clone()
    }

    async fn put(&self, token: CachedToken) {
        *self.slot.write().await = Some(token);
    }

    async fn invalidate(&self) {
        *self.slot.write().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn put_get_invalidate_round_trip() {
        let cache = InMemoryTokenCache::new();
        assert_eq!(cache.get().await, None);

        let token = CachedToken {
            access_token: "abc".to_string(),
            expires_at: Utc::now() + Duration::hours(4),
        };
        cache.put(token.clone()).await;
        assert_eq!(cache.get().await, Some(token));

        cache.invalidate().await;
        assert_eq!(cache.get().await, None);
    }
}
