//! Query-only client over a secondary index.

use crate::{
    backend::Backend,
    common::{
        condition::SortKeyCondition,
        key::{KeyAttribute, NoSortKey, PrimaryKeyDefinition, SortKeyAttribute},
        projection::Projection,
    },
    config::TableConfig,
    error::{Partial, Result},
    table::{Page, QueryOptions, TableClient},
};

use serde::{Serialize, de::DeserializeOwned};
use std::sync::Arc;

/// Typed queries over a secondary index keyed by `P` (and `S`).
///
/// Indexes cannot be written or read by key, so only the query operations of
/// [`TableClient`] are available.
///
/// A resume key read from an index carries the base table key as well, so the client is
/// built with both key shapes and accepts cursors holding either.
///
/// ```rust
/// use dynamodb_table::{
///     backend::memory::{KeySchema, MemoryBackend},
///     common::key::PrimaryKeyDefinition,
///     index::IndexClient,
/// };
/// use serde::{Deserialize, Serialize};
/// use std::sync::Arc;
///
/// #[derive(Deserialize, Serialize)]
/// struct Event {
///     tenant: String,
///     seq: i64,
///     kind: String,
/// }
///
/// let backend = MemoryBackend::new()
///     .with_table("events", KeySchema::new("tenant").with_sort_key("seq"))
///     .with_index("events", "by_kind", KeySchema::new("kind").with_sort_key("seq"));
/// let table_key = PrimaryKeyDefinition::<String, i64>::new("tenant", "seq");
/// let by_kind: IndexClient<Event, String, i64> = IndexClient::new(
///     Arc::new(backend),
///     "events",
///     "by_kind",
///     PrimaryKeyDefinition::new("kind", "seq"),
///     &table_key,
/// );
/// assert_eq!(by_kind.index_name(), "by_kind");
/// ```
pub struct IndexClient<E, P, S = NoSortKey> {
    table: TableClient<E, P, S>,
}

impl<E, P: KeyAttribute, S: SortKeyAttribute> Clone for IndexClient<E, P, S> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
        }
    }
}

impl<E, P, S> std::fmt::Debug for IndexClient<E, P, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexClient")
            .field("table", &self.table)
            .finish()
    }
}

impl<E, P, S> IndexClient<E, P, S>
where
    E: Serialize + DeserializeOwned,
    P: KeyAttribute,
    S: SortKeyAttribute,
{
    /// Client over `index_name` of `table_name`, whose own key is `table_key`.
    pub fn new<TP, TS>(
        backend: Arc<dyn Backend>,
        table_name: impl Into<String>,
        index_name: impl Into<String>,
        definition: PrimaryKeyDefinition<P, S>,
        table_key: &PrimaryKeyDefinition<TP, TS>,
    ) -> Self
    where
        TP: KeyAttribute,
        TS: SortKeyAttribute,
    {
        let mut table =
            TableClient::new(backend, table_name, definition).with_index_name(index_name.into());
        table.merge_prototype(table_key.prototype());
        Self { table }
    }

    /// Replace the client configuration.
    pub fn with_config(mut self, config: TableConfig) -> Self {
        self.table = self.table.with_config(config);
        self
    }

    /// Replace the attributes fetched by queries. An empty projection fetches all of them.
    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.table = self.table.with_projection(projection);
        self
    }

    /// The key shape of the index.
    pub fn definition(&self) -> &PrimaryKeyDefinition<P, S> {
        self.table.definition()
    }

    /// The index name.
    pub fn index_name(&self) -> &str {
        self.table.index_name().unwrap_or_default()
    }

    /// Read every item of an index partition; see [`TableClient::query`].
    pub async fn query(
        &self,
        partition: P,
        sort: Option<SortKeyCondition<S>>,
        options: QueryOptions,
    ) -> std::result::Result<Vec<E>, Partial<E>> {
        self.table.query(partition, sort, options).await
    }

    /// Read one page of an index partition; see [`TableClient::query_page`].
    pub async fn query_page(
        &self,
        partition: P,
        sort: Option<SortKeyCondition<S>>,
        cursor: Option<&str>,
        limit: i32,
        options: QueryOptions,
    ) -> Result<Page<E>> {
        self.table
            .query_page(partition, sort, cursor, limit, options)
            .await
    }

    /// The item with the smallest index sort key.
    pub async fn query_first_one(
        &self,
        partition: P,
        sort: Option<SortKeyCondition<S>>,
    ) -> Result<E> {
        self.table.query_first_one(partition, sort).await
    }

    /// The item with the largest index sort key.
    pub async fn query_last_one(
        &self,
        partition: P,
        sort: Option<SortKeyCondition<S>>,
    ) -> Result<E> {
        self.table.query_last_one(partition, sort).await
    }
}
