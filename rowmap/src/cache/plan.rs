//! The concurrent plan cache.
//!
//! A bounded concurrent map from [`QueryIdentity`] to a shared, mutable
//! [`PlanEntry`]. Entries are created empty on first sight and then
//! check-and-rebuilt in place: the stored transform is reused while the live
//! schema fingerprint matches the one it was compiled against, and replaced
//! atomically when it does not. Unrelated identities never contend; racing
//! rebuilds of the same identity are redundant but safe (last writer wins,
//! readers always observe a fully-built transform).

use std::{
    any::Any,
    sync::{Arc, RwLock},
};

use moka::future::Cache as MokaCache;
use tracing::{debug, trace};

use crate::{
    cache::identity::QueryIdentity,
    error::MapResult,
    params::{BindRequest, Params},
    schema::fingerprint::Fingerprint,
};

/// A cached outbound parameter binder.
pub type Binder = Arc<dyn Fn(&dyn Params, &mut BindRequest) + Send + Sync>;

struct StoredPlan {
    fingerprint: Fingerprint,
    /// The type-erased transform (a `RowFn<T>` or a multi-map transform
    /// tuple, depending on the identity's shape).
    plan: Box<dyn Any + Send + Sync>,
}

/// The shared cache slot for one identity.
#[derive(Default)]
pub struct PlanEntry {
    plan: RwLock<Option<StoredPlan>>,
    binder: RwLock<Option<Binder>>,
}

impl PlanEntry {
    /// Returns the stored transform when the live fingerprint still matches
    /// the one it was compiled against; otherwise invokes `build`, stores
    /// the fresh transform with the live fingerprint, and returns it.
    pub fn plan_for<P, F>(&self, live: Fingerprint, build: F) -> MapResult<P>
    where
        P: Clone + Send + Sync + 'static,
        F: FnOnce() -> MapResult<P>,
    {
        {
            let guard = self.plan.read().expect("plan lock poisoned");
            if let Some(stored) = guard.as_ref() {
                if stored.fingerprint == live {
                    if let Some(plan) = stored.plan.downcast_ref::<P>() {
                        trace!(fingerprint = %live, "plan cache hit");
                        return Ok(plan.clone());
                    }
                }
            }
        }

        // Build outside any lock; a concurrent racer may do the same, which
        // costs a redundant compilation, never a torn read.
        let built = build()?;
        let mut guard = self.plan.write().expect("plan lock poisoned");
        debug!(fingerprint = %live, "plan rebuilt");
        *guard = Some(StoredPlan {
            fingerprint: live,
            plan: Box::new(built.clone()),
        });
        Ok(built)
    }

    /// The cached parameter binder, created on first use.
    pub fn binder(&self, init: impl FnOnce() -> Binder) -> Binder {
        {
            let guard = self.binder.read().expect("binder lock poisoned");
            if let Some(binder) = guard.as_ref() {
                return Arc::clone(binder);
            }
        }
        let built = init();
        let mut guard = self.binder.write().expect("binder lock poisoned");
        *guard = Some(Arc::clone(&built));
        built
    }
}

/// The process-wide (per-[`Mapper`](crate::db::Mapper)) plan cache.
pub struct PlanCache {
    inner: MokaCache<QueryIdentity, Arc<PlanEntry>>,
}

impl PlanCache {
    pub fn new(capacity: u64) -> PlanCache {
        let inner = MokaCache::builder().max_capacity(capacity).build();
        PlanCache { inner }
    }

    /// The shared entry for the given identity, created empty on first
    /// sight.
    pub async fn entry(&self, identity: QueryIdentity) -> Arc<PlanEntry> {
        self.inner
            .get_with(identity, async { Arc::new(PlanEntry::default()) })
            .await
    }

    /// Evicts the entry for the given identity.
    pub async fn evict(&self, identity: &QueryIdentity) {
        self.inner.invalidate(identity).await;
    }

    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;

    fn fp(n: u64) -> Fingerprint {
        Fingerprint(n)
    }

    fn identity(sql: &str) -> QueryIdentity {
        QueryIdentity::single::<i32>(&Command::text(sql), "db://test", None, 0)
    }

    #[tokio::test]
    async fn entry_is_shared_per_identity() {
        let cache = PlanCache::new(16);
        let a = cache.entry(identity("select 1")).await;
        let b = cache.entry(identity("select 1")).await;
        assert!(Arc::ptr_eq(&a, &b));

        let c = cache.entry(identity("select 2")).await;
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[tokio::test]
    async fn plan_is_reused_while_fingerprint_matches() {
        let cache = PlanCache::new(16);
        let entry = cache.entry(identity("select 1")).await;

        let first: i32 = entry.plan_for(fp(1), || Ok(41)).unwrap();
        assert_eq!(first, 41);

        let second: i32 = entry
            .plan_for(fp(1), || panic!("must not rebuild on matching fingerprint"))
            .unwrap();
        assert_eq!(second, 41);
    }

    #[tokio::test]
    async fn fingerprint_mismatch_triggers_rebuild() {
        let cache = PlanCache::new(16);
        let entry = cache.entry(identity("select 1")).await;

        let _: i32 = entry.plan_for(fp(1), || Ok(1)).unwrap();
        let rebuilt: i32 = entry.plan_for(fp(2), || Ok(2)).unwrap();
        assert_eq!(rebuilt, 2);

        // And the new fingerprint now hits.
        let hit: i32 = entry.plan_for(fp(2), || panic!("should hit")).unwrap();
        assert_eq!(hit, 2);
    }

    #[tokio::test]
    async fn build_failure_leaves_the_entry_untouched() {
        let cache = PlanCache::new(16);
        let entry = cache.entry(identity("select 1")).await;

        let _: i32 = entry.plan_for(fp(1), || Ok(7)).unwrap();
        let err = entry.plan_for::<i32, _>(fp(2), || Err(crate::error::Error::NoRows));
        assert!(err.is_err());

        // The previously stored plan (old fingerprint) is still there.
        let old: i32 = entry.plan_for(fp(1), || panic!("should hit")).unwrap();
        assert_eq!(old, 7);
    }

    #[tokio::test]
    async fn racing_rebuilds_are_safe() {
        let cache = Arc::new(PlanCache::new(16));
        let entry = cache.entry(identity("select 1")).await;

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let entry = Arc::clone(&entry);
                tokio::spawn(async move {
                    entry.plan_for(fp(9), move || Ok(i)).unwrap()
                })
            })
            .collect();
        for task in tasks {
            // Every racer observes some fully-built value.
            let got: i32 = task.await.unwrap();
            assert!((0..8).contains(&got));
        }
    }
}
