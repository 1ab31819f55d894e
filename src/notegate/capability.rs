//! Remembers that the executor is installed.
//!
//! A successful probe is cached until [`CapabilityCache::invalidate`]. Failed
//! probes are returned but never stored, so the next check probes again.

use crate::error::Result;
use crate::executor::{ExecutorInfo, QueryExecutor};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct CapabilityCache {
    info: RwLock<Option<ExecutorInfo>>,
}

impl CapabilityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn check<E: QueryExecutor + ?Sized>(&self, executor: &E) -> Result<ExecutorInfo> {
        if let Some(info) = self.info.read().await.as_ref() {
            return Ok(info.clone());
        }

        let mut slot = self.info.write().await;
        if let Some(info) = slot.as_ref() {
            return Ok(info.clone());
        }
        let info = executor.probe().await?;
        tracing::debug!(name = %info.name, version = %info.version, "executor available");
        *slot = Some(info.clone());
        Ok(info)
    }

    pub async fn cached(&self) -> Option<ExecutorInfo> {
        self.info.read().await.clone()
    }

    pub async fn invalidate(&self) {
        *self.info.write().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::memory::InMemoryExecutor;

    #[tokio::test]
    async fn caches_success() {
        let exec = InMemoryExecutor::new();
        let cache = CapabilityCache::new();
        cache.check(&exec).await.unwrap();
        cache.check(&exec).await.unwrap();
        assert_eq!(exec.probe_count(), 1);
        assert_eq!(cache.cached().await.unwrap().name, "memory");
    }

    #[tokio::test]
    async fn failure_is_not_cached() {
        let exec = InMemoryExecutor::new().fail_probes(1);
        let cache = CapabilityCache::new();
        assert!(cache.check(&exec).await.is_err());
        assert!(cache.cached().await.is_none());
        assert!(cache.check(&exec).await.is_ok());
        assert_eq!(exec.probe_count(), 2);
    }

    #[tokio::test]
    async fn invalidate_forces_a_new_probe() {
        let exec = InMemoryExecutor::new();
        let cache = CapabilityCache::new();
        cache.check(&exec).await.unwrap();
        cache.invalidate().await;
        cache.check(&exec).await.unwrap();
        assert_eq!(exec.probe_count(), 2);
    }
}
