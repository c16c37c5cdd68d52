//! Cache of tenant connection pools.

use std::collections::HashMap;
use std::sync::Arc;

use database::Database;
use indexmap::IndexMap;
use rag_core::UserSession;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::Result;
use crate::provisioner::ConnectionResolver;

/// Default maximum number of tenant pools kept open.
pub const DEFAULT_MAX_TENANTS: usize = 256;

/// Holds one lazily-connected pool per tenant.
///
/// Pools are evicted least recently used first once `max_tenants` is
/// exceeded. Misses for the same owner are resolved one at a time, so two
/// concurrent first requests in this process provision the tenant only once.
/// Different owners provision independently.
pub struct TenantRegistry {
    resolver: Arc<dyn ConnectionResolver>,
    /// Insertion order doubles as recency order.
    pools: Mutex<IndexMap<String, Database>>,
    /// One lock per owner with a miss in flight.
    provisioning: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    max_tenants: usize,
}

impl TenantRegistry {
    pub fn new(resolver: Arc<dyn ConnectionResolver>, max_tenants: usize) -> Self {
        Self {
            resolver,
            pools: Mutex::new(IndexMap::new()),
            provisioning: Mutex::new(HashMap::new()),
            max_tenants: max_tenants.max(1),
        }
    }

    /// Get the database of the session's owner, provisioning it on first use.
    pub async fn database(&self, session: &UserSession) -> Result<Database> {
        let owner = session.owner_id()?;

        if let Some(db) = self.cached(owner).await {
            return Ok(db);
        }

        let lock = self
            .provisioning
            .lock()
            .await
            .entry(owner.to_string())
            .or_default()
            .clone();

        let result = {
            let _guard = lock.lock().await;
            self.provision(owner).await
        };

        self.release(owner, lock).await;
        result
    }

    async fn provision(&self, owner: &str) -> Result<Database> {
        // Another request may have provisioned while we waited.
        if let Some(db) = self.cached(owner).await {
            return Ok(db);
        }

        let uri = self.resolver.resolve(owner).await?;
        let db = Database::connect_lazy(&uri)?;

        let mut pools = self.pools.lock().await;
        pools.insert(owner.to_string(), db.clone());
        while pools.len() > self.max_tenants {
            if let Some((evicted, pool)) = pools.shift_remove_index(0) {
                debug!(tenant = %evicted, "Evicting tenant pool");
                // Closing waits for checked-out connections to return.
                tokio::spawn(async move { pool.close().await });
            }
        }
        info!(tenants = pools.len(), "Registered tenant pool");

        Ok(db)
    }

    /// Drop the owner's lock once no other request is waiting on it.
    async fn release(&self, owner: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.provisioning.lock().await;
        let idle = locks
            .get(owner)
            .is_some_and(|held| Arc::ptr_eq(held, &lock) && Arc::strong_count(&lock) == 2);
        if idle {
            locks.remove(owner);
        }
    }

    /// Number of pools currently cached.
    pub async fn len(&self) -> usize {
        self.pools.lock().await.len()
    }

    /// Whether no pools are cached.
    pub async fn is_empty(&self) -> bool {
        self.pools.lock().await.is_empty()
    }

    /// Drop a tenant's pool from the cache.
    pub async fn forget(&self, owner_id: &str) -> bool {
        self.pools.lock().await.shift_remove(owner_id).is_some()
    }

    async fn cached(&self, owner: &str) -> Option<Database> {
        let mut pools = self.pools.lock().await;
        let db = pools.shift_remove(owner)?;
        pools.insert(owner.to_string(), db.clone());
        Some(db)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TenantError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct CountingResolver {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ConnectionResolver for CountingResolver {
        async fn resolve(&self, user_id: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok(format!("postgres://user:pw@127.0.0.1:1/{}", user_id))
        }
    }

    #[tokio::test]
    async fn test_anonymous_session_is_unauthorized() {
        let resolver = Arc::new(CountingResolver::default());
        let registry = TenantRegistry::new(resolver.clone(), 4);

        let err = registry
            .database(&UserSession::anonymous())
            .await
            .err()
            .unwrap();

        assert!(matches!(err, TenantError::Unauthorized(_)));
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_pool_is_cached() {
        let resolver = Arc::new(CountingResolver::default());
        let registry = TenantRegistry::new(resolver.clone(), 4);
        let session = UserSession::user("alice");

        registry.database(&session).await.unwrap();
        registry.database(&session).await.unwrap();

        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_first_access_resolves_once() {
        let resolver = Arc::new(CountingResolver::default());
        let registry = Arc::new(TenantRegistry::new(resolver.clone(), 4));

        let handles: Vec<_> = (0..5)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.database(&UserSession::user("bob")).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
    }

    struct GatedResolver {
        gate: tokio::sync::Notify,
    }

    #[async_trait]
    impl ConnectionResolver for GatedResolver {
        async fn resolve(&self, user_id: &str) -> Result<String> {
            if user_id == "slow" {
                self.gate.notified().await;
            }
            Ok(format!("postgres://user:pw@127.0.0.1:1/{}", user_id))
        }
    }

    #[tokio::test]
    async fn test_owners_provision_independently() {
        let resolver = Arc::new(GatedResolver {
            gate: tokio::sync::Notify::new(),
        });
        let registry = Arc::new(TenantRegistry::new(resolver.clone(), 4));

        let slow = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.database(&UserSession::user("slow")).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        // slow is still provisioning; fast must not queue behind it
        tokio::time::timeout(
            Duration::from_secs(1),
            registry.database(&UserSession::user("fast")),
        )
        .await
        .expect("fast owner blocked by another owner's provisioning")
        .unwrap();

        resolver.gate.notify_one();
        slow.await.unwrap().unwrap();

        assert_eq!(registry.len().await, 2);
        assert!(registry.provisioning.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_provisioning_releases_owner_lock() {
        struct FailingResolver;

        #[async_trait]
        impl ConnectionResolver for FailingResolver {
            async fn resolve(&self, _user_id: &str) -> Result<String> {
                Err(TenantError::InvalidResponse("no uri".to_string()))
            }
        }

        let registry = TenantRegistry::new(Arc::new(FailingResolver), 4);

        assert!(registry.database(&UserSession::user("carol")).await.is_err());
        assert!(registry.is_empty().await);
        assert!(registry.provisioning.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_least_recently_used_is_evicted() {
        let resolver = Arc::new(CountingResolver::default());
        let registry = TenantRegistry::new(resolver.clone(), 2);

        registry.database(&UserSession::user("a")).await.unwrap();
        registry.database(&UserSession::user("b")).await.unwrap();
        // touch a so b becomes the oldest
        registry.database(&UserSession::user("a")).await.unwrap();
        registry.database(&UserSession::user("c")).await.unwrap();

        assert_eq!(registry.len().await, 2);
        assert!(!registry.forget("b").await);
        assert!(registry.forget("a").await);
        assert!(registry.forget("c").await);
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 3);
    }
}
