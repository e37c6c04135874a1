//! External vector-store access for collection lifecycle management.
//!
//! A connection is opened per eviction, used for existence checks and
//! deletes, and closed before the eviction returns. Backends sit behind
//! [`VectorStoreConnector`] so tests can substitute an in-memory store.

mod http;
mod lifecycle;

#[cfg(test)]
pub(crate) mod fake;

pub use http::HttpConnector;
pub use lifecycle::{CollectionLifecycleManager, EvictionState};

use crate::config::{Backend, VectorStoreConfig};
use crate::error::Result;
use async_trait::async_trait;

/// Opens connections to one kind of vector store.
#[async_trait]
pub trait VectorStoreConnector: Send + Sync {
    async fn connect(&self, config: &VectorStoreConfig) -> Result<Box<dyn VectorStoreConnection>>;
}

/// A live connection scoped to a single eviction.
#[async_trait]
pub trait VectorStoreConnection: Send {
    fn backend(&self) -> Backend;

    /// The name the backend stores `identity` under.
    fn canonical_name(&self, identity: &str) -> String {
        canonical_name(self.backend(), identity)
    }

    async fn collection_exists(&mut self, name: &str) -> Result<bool>;

    async fn delete_collection(&mut self, name: &str) -> Result<()>;

    /// Release the connection. Called on every exit path.
    async fn close(&mut self) -> Result<()>;
}

/// Apply a backend's collection-name casing rules.
///
/// Weaviate capitalizes the first letter of class names on creation; the
/// other supported backends store names verbatim.
pub fn canonical_name(backend: Backend, identity: &str) -> String {
    match backend {
        Backend::Weaviate => {
            let mut chars = identity.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        }
        Backend::Qdrant | Backend::Chroma | Backend::Milvus => identity.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_names() {
        assert_eq!(canonical_name(Backend::Weaviate, "rag_insa"), "Rag_insa");
        assert_eq!(canonical_name(Backend::Weaviate, ""), "");
        assert_eq!(canonical_name(Backend::Qdrant, "rag_insa"), "rag_insa");
        assert_eq!(canonical_name(Backend::Milvus, "rag_insa"), "rag_insa");
        assert_eq!(canonical_name(Backend::Chroma, "rag_insa"), "rag_insa");
    }
}
