//! Evicting stale collections before a re-run.
//!
//! Re-generating a corpus assigns new row identifiers. Vectors left in a
//! collection from an earlier run would then point at rows that no longer
//! exist, so the collection is dropped before the evaluator starts writing.

use super::{VectorStoreConnection, VectorStoreConnector};
use crate::config::VectorStoreConfig;
use crate::error::Result;
use crate::identity::CollectionIdentity;
use tracing::{info, warn};

/// Where an eviction ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvictionState {
    /// Nothing existed under the identity.
    AlreadyAbsent,
    /// The listed collections existed and are gone now.
    Deleted { names: Vec<String> },
    /// Absence could not be confirmed; the run proceeds regardless.
    /// `deleted` lists what was removed before things went wrong.
    Degraded { reason: String, deleted: Vec<String> },
}

impl EvictionState {
    pub fn is_absent(&self) -> bool {
        !matches!(self, EvictionState::Degraded { .. })
    }

    /// Collections removed by this eviction, whatever its final state.
    pub fn deleted(&self) -> &[String] {
        match self {
            EvictionState::AlreadyAbsent => &[],
            EvictionState::Deleted { names } => names.as_slice(),
            EvictionState::Degraded { deleted, .. } => deleted.as_slice(),
        }
    }
}

/// Drops the collection of an identity on one configured backend.
///
/// Failures never propagate: they are logged and reported as
/// [`EvictionState::Degraded`]. Retries are left to the caller.
pub struct CollectionLifecycleManager<C> {
    connector: C,
}

impl<C: VectorStoreConnector> CollectionLifecycleManager<C> {
    pub fn new(connector: C) -> Self {
        Self { connector }
    }

    /// Delete whatever exists under `identity`. `true` if anything was deleted,
    /// even when a later request failed.
    pub async fn evict_if_present(
        &self,
        identity: &CollectionIdentity,
        config: &VectorStoreConfig,
    ) -> bool {
        !self.evict(identity, config).await.deleted().is_empty()
    }

    /// Run the eviction and report the final state.
    pub async fn evict(
        &self,
        identity: &CollectionIdentity,
        config: &VectorStoreConfig,
    ) -> EvictionState {
        let mut connection = match self.connector.connect(config).await {
            Ok(connection) => connection,
            Err(err) => {
                warn!(
                    backend = %config.backend,
                    collection = %identity,
                    error = %err,
                    "Could not connect to vector store; continuing without eviction"
                );
                return EvictionState::Degraded {
                    reason: err.to_string(),
                    deleted: Vec::new(),
                };
            }
        };

        let mut deleted = Vec::new();
        let outcome = evict_with(connection.as_mut(), identity.as_str(), &mut deleted).await;

        if let Err(err) = connection.close().await {
            warn!(backend = %config.backend, error = %err, "Failed to close vector store connection");
        }

        let state = match outcome {
            Ok(None) if deleted.is_empty() => EvictionState::AlreadyAbsent,
            Ok(None) => EvictionState::Deleted { names: deleted },
            Ok(Some(reason)) => EvictionState::Degraded { reason, deleted },
            Err(err) => EvictionState::Degraded {
                reason: err.to_string(),
                deleted,
            },
        };

        match &state {
            EvictionState::AlreadyAbsent => {
                info!(backend = %config.backend, collection = %identity, "No stale collection to evict");
            }
            EvictionState::Deleted { names } => {
                info!(backend = %config.backend, collections = ?names, "Evicted stale collection");
            }
            EvictionState::Degraded { reason, deleted } => {
                warn!(
                    backend = %config.backend,
                    collection = %identity,
                    reason = %reason,
                    deleted = ?deleted,
                    "Stale collection eviction failed; continuing"
                );
            }
        }

        state
    }
}

/// Check the canonical name, then the literal one; delete each that exists and confirm.
///
/// Deleted names are pushed to `deleted` as they go, so they survive a later
/// failed request. `Ok(Some(reason))` means a delete did not take; those
/// names are taken back out of `deleted`.
async fn evict_with(
    connection: &mut dyn VectorStoreConnection,
    identity: &str,
    deleted: &mut Vec<String>,
) -> Result<Option<String>> {
    let canonical = connection.canonical_name(identity);
    let mut candidates = vec![canonical];
    if candidates[0] != identity {
        candidates.push(identity.to_string());
    }

    for name in candidates {
        if connection.collection_exists(&name).await? {
            connection.delete_collection(&name).await?;
            deleted.push(name);
        }
    }

    let mut still_present = Vec::new();
    for name in deleted.iter() {
        if connection.collection_exists(name).await? {
            still_present.push(name.clone());
        }
    }
    if still_present.is_empty() {
        return Ok(None);
    }

    deleted.retain(|name| !still_present.contains(name));
    Ok(Some(format!(
        "collection '{}' still present after delete",
        still_present.join("', '")
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Backend;
    use crate::vector_store::fake::FakeStore;

    fn identity() -> CollectionIdentity {
        CollectionIdentity::derive("인사규정", "rag")
    }

    fn config(backend: Backend) -> VectorStoreConfig {
        VectorStoreConfig::new(backend, "localhost")
    }

    #[tokio::test]
    async fn test_absent_collection_is_noop() {
        let store = FakeStore::new(Backend::Qdrant);
        let manager = CollectionLifecycleManager::new(store.clone());

        assert!(!manager.evict_if_present(&identity(), &config(Backend::Qdrant)).await);
        assert_eq!(store.deletes(), 0);
        assert_eq!(store.closes(), 1);
        assert_eq!(store.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_present_collection_is_deleted() {
        let store = FakeStore::new(Backend::Qdrant).with_collection("rag_insa");
        let manager = CollectionLifecycleManager::new(store.clone());

        assert!(manager.evict_if_present(&identity(), &config(Backend::Qdrant)).await);
        assert!(!store.contains("rag_insa"));
        assert_eq!(store.deletes(), 1);
        assert_eq!(store.closes(), 1);
    }

    #[tokio::test]
    async fn test_backend_casing_is_respected() {
        let store = FakeStore::new(Backend::Weaviate).with_collection("Rag_insa");
        let manager = CollectionLifecycleManager::new(store.clone());

        let state = manager.evict(&identity(), &config(Backend::Weaviate)).await;
        assert_eq!(
            state,
            EvictionState::Deleted {
                names: vec!["Rag_insa".to_string()]
            }
        );
        assert!(store.collections().is_empty());
    }

    #[tokio::test]
    async fn test_literal_name_checked_when_casing_differs() {
        let store = FakeStore::new(Backend::Weaviate).with_collection("rag_insa");
        let manager = CollectionLifecycleManager::new(store.clone());

        assert!(manager.evict_if_present(&identity(), &config(Backend::Weaviate)).await);
        assert!(store.collections().is_empty());
    }

    #[tokio::test]
    async fn test_connect_failure_is_degraded() {
        let store = FakeStore::new(Backend::Milvus).failing_connect();
        let manager = CollectionLifecycleManager::new(store.clone());

        let state = manager.evict(&identity(), &config(Backend::Milvus)).await;
        assert!(matches!(state, EvictionState::Degraded { .. }));
        assert!(!state.is_absent());
        assert_eq!(store.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_request_failure_still_closes_connection() {
        let store = FakeStore::new(Backend::Chroma)
            .with_collection("rag_insa")
            .failing_requests();
        let manager = CollectionLifecycleManager::new(store.clone());

        assert!(!manager.evict_if_present(&identity(), &config(Backend::Chroma)).await);
        assert_eq!(store.closes(), 1);
        assert_eq!(store.open_connections(), 0);
        assert!(store.contains("rag_insa"));
    }

    #[tokio::test]
    async fn test_failure_after_delete_keeps_deleted_names() {
        // Canonical exists check and its delete succeed; the literal-name check fails.
        let store = FakeStore::new(Backend::Weaviate)
            .with_collection("Rag_insa")
            .failing_requests_after(2);
        let manager = CollectionLifecycleManager::new(store.clone());

        let state = manager.evict(&identity(), &config(Backend::Weaviate)).await;
        match &state {
            EvictionState::Degraded { reason, deleted } => {
                assert!(reason.contains("request timed out"));
                assert_eq!(deleted, &vec!["Rag_insa".to_string()]);
            }
            other => panic!("expected Degraded, got {:?}", other),
        }
        assert_eq!(state.deleted(), ["Rag_insa".to_string()]);
        assert!(!store.contains("Rag_insa"));
        assert_eq!(store.deletes(), 1);
        assert_eq!(store.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_evict_if_present_reports_partial_delete() {
        let store = FakeStore::new(Backend::Weaviate)
            .with_collection("Rag_insa")
            .failing_requests_after(2);
        let manager = CollectionLifecycleManager::new(store.clone());

        assert!(manager.evict_if_present(&identity(), &config(Backend::Weaviate)).await);
        assert!(store.collections().is_empty());
    }

    #[tokio::test]
    async fn test_ineffective_delete_is_degraded() {
        let store = FakeStore::new(Backend::Qdrant)
            .with_collection("rag_insa")
            .ignoring_deletes();
        let manager = CollectionLifecycleManager::new(store.clone());

        let state = manager.evict(&identity(), &config(Backend::Qdrant)).await;
        assert!(matches!(state, EvictionState::Degraded { .. }));
        assert!(state.deleted().is_empty());
        assert_eq!(store.deletes(), 1);
        assert!(!manager.evict_if_present(&identity(), &config(Backend::Qdrant)).await);
    }
}
