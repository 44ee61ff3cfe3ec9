//! Repository specialization for edge collections.

use std::ops::Deref;
use std::sync::Arc;

use serde_json::Value;

use crate::entity::{ArangoEdgeEntity, Edge};
use crate::error::RepositoryResult;
use crate::options::EdgesOptions;
use crate::ports::{ArangoConnection, EdgeDirection};
use crate::repository::Repository;
use crate::transaction::run_scoped;

/// Repository over an edge collection.
///
/// Derefs to [`Repository`], so every document operation applies to edges
/// unchanged; the edge body carries `_from`/`_to` itself. On top of that it
/// reads edges incident to a vertex, in either or both directions.
pub struct EdgeRepository<T: ArangoEdgeEntity> {
    repository: Repository<T>,
}

impl<T: ArangoEdgeEntity> Clone for EdgeRepository<T> {
    fn clone(&self) -> Self {
        Self {
            repository: self.repository.clone(),
        }
    }
}

impl<T: ArangoEdgeEntity> Deref for EdgeRepository<T> {
    type Target = Repository<T>;

    fn deref(&self) -> &Self::Target {
        &self.repository
    }
}

impl<T: ArangoEdgeEntity> EdgeRepository<T> {
    pub fn new(database: Arc<dyn ArangoConnection>) -> RepositoryResult<Self> {
        Ok(Self {
            repository: Repository::new(database)?,
        })
    }

    /// Edges incident to `vertex` in either direction.
    pub async fn edges(
        &self,
        vertex: &str,
        options: EdgesOptions,
    ) -> RepositoryResult<Vec<Edge<T>>> {
        self.edges_directed(vertex, EdgeDirection::Any, options).await
    }

    /// Edges pointing at `vertex`.
    pub async fn in_edges(
        &self,
        vertex: &str,
        options: EdgesOptions,
    ) -> RepositoryResult<Vec<Edge<T>>> {
        self.edges_directed(vertex, EdgeDirection::In, options).await
    }

    /// Edges originating at `vertex`.
    pub async fn out_edges(
        &self,
        vertex: &str,
        options: EdgesOptions,
    ) -> RepositoryResult<Vec<Edge<T>>> {
        self.edges_directed(vertex, EdgeDirection::Out, options).await
    }

    async fn edges_directed(
        &self,
        vertex: &str,
        direction: EdgeDirection,
        options: EdgesOptions,
    ) -> RepositoryResult<Vec<Edge<T>>> {
        let values = run_scoped(options.transaction.as_ref(), |txn| async move {
            self.repository
                .database()
                .edges(self.repository.collection_name(), vertex, direction, txn)
                .await
        })
        .await?;
        values
            .into_iter()
            .map(|value: Value| Ok(serde_json::from_value(value)?))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    use crate::entity::ArangoEntity;
    use crate::metadata::register_entity;
    use crate::ports::MockArangoConnection;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Knows {
        since: u32,
    }

    impl ArangoEntity for Knows {
        fn entity_name() -> &'static str {
            "EdgeTestKnows"
        }
    }

    impl ArangoEdgeEntity for Knows {}

    fn edge_row(key: &str, from: &str, to: &str) -> Value {
        json!({
            "_key": key,
            "_id": format!("Knows/{key}"),
            "_rev": "1",
            "_from": from,
            "_to": to,
            "since": 2019,
        })
    }

    #[tokio::test]
    async fn incident_edges_are_read_in_the_requested_direction() {
        register_entity::<Knows>("Knows");
        let mut mock = MockArangoConnection::new();
        mock.expect_edges()
            .withf(|collection, vertex, direction, _| {
                collection == "Knows"
                    && vertex == "People/a"
                    && *direction == EdgeDirection::Out
            })
            .returning(|_, _, _, _| Ok(vec![edge_row("e1", "People/a", "People/b")]));

        let repo = EdgeRepository::<Knows>::new(Arc::new(mock)).expect("registered");
        let edges = repo
            .out_edges("People/a", EdgesOptions::default())
            .await
            .expect("edge read");
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].from, "People/a");
        assert_eq!(edges[0].to, "People/b");
        assert_eq!(edges[0].document.since, 2019);
    }

    #[tokio::test]
    async fn undirected_reads_ask_for_both_directions() {
        register_entity::<Knows>("Knows");
        let mut mock = MockArangoConnection::new();
        mock.expect_edges()
            .withf(|_, _, direction, _| *direction == EdgeDirection::Any)
            .returning(|_, _, _, _| {
                Ok(vec![
                    edge_row("e1", "People/a", "People/b"),
                    edge_row("e2", "People/c", "People/a"),
                ])
            });

        let repo = EdgeRepository::<Knows>::new(Arc::new(mock)).expect("registered");
        let edges = repo
            .edges("People/a", EdgesOptions::default())
            .await
            .expect("edge read");
        assert_eq!(edges.len(), 2);
    }

    #[tokio::test]
    async fn document_operations_are_available_through_deref() {
        register_entity::<Knows>("Knows");
        let repo = EdgeRepository::<Knows>::new(Arc::new(MockArangoConnection::new()))
            .expect("registered");
        assert_eq!(repo.collection_name(), "Knows");
        assert_eq!(repo.id_for("e1"), "Knows/e1");
    }
}
