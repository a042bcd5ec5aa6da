//! Typed client over one table.

use crate::{
    backend::Backend,
    common::{
        self,
        condition::{self, SortKeyCondition},
        cursor,
        key::{KeyAttribute, NoSortKey, PrimaryKeyDefinition, Prototype, SortKeyAttribute},
        projection::Projection,
    },
    config::TableConfig,
    error::{Error, Partial, Result},
    read, write,
};

use aws_sdk_dynamodb::{
    operation::{
        batch_get_item::BatchGetItemInput, batch_write_item::BatchWriteItemInput,
        delete_item::DeleteItemInput, get_item::GetItemInput, put_item::PutItemInput,
        query::QueryInput, transact_write_items::TransactWriteItemsInput,
    },
    types,
};
use serde::{Serialize, de::DeserializeOwned};
use std::{fmt, marker, sync::Arc, time::Instant};

const BATCH_GET_ITEM: &str = "batch get item";
const BATCH_WRITE_ITEM: &str = "batch write item";
const DELETE_ITEM: &str = "delete item";
const GET_ITEM: &str = "get item";
const PUT_ITEM: &str = "put item";
const QUERY: &str = "query";
const TRANSACT_WRITE_ITEMS: &str = "transact write items";

/// Per-call query settings.
///
/// Fields left `None` fall back to the client's [`TableConfig`] or to the backend default.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryOptions {
    /// `true` for a strongly consistent read.
    pub consistent_read: Option<bool>,
    /// `false` to read in descending sort key order.
    pub scan_forward: Option<bool>,
    /// Items requested per backend call by [`TableClient::query`].
    pub limit: Option<i32>,
    /// Give up between two pages once this instant has passed.
    pub deadline: Option<Instant>,
}

/// One page of query results.
#[derive(Clone, Debug, PartialEq)]
pub struct Page<E> {
    /// Items of the page, in query order.
    pub items: Vec<E>,
    /// Cursor resuming after the last item, `None` once the query is exhausted.
    pub next_cursor: Option<String>,
}

/// Typed operations over the items `E` of one table keyed by `P` (and `S`).
///
/// Holds no per-call state: clones share the backend and can be used concurrently.
///
/// ```rust
/// use dynamodb_table::{
///     backend::memory::{KeySchema, MemoryBackend},
///     common::key::PrimaryKeyDefinition,
///     table::TableClient,
/// };
/// use serde::{Deserialize, Serialize};
/// use std::sync::Arc;
///
/// #[derive(Debug, Deserialize, PartialEq, Serialize)]
/// struct Event {
///     tenant: String,
///     seq: i64,
///     body: String,
/// }
///
/// # #[tokio::main]
/// # async fn main() -> dynamodb_table::error::Result<()> {
/// let backend = MemoryBackend::new()
///     .with_table("events", KeySchema::new("tenant").with_sort_key("seq"));
/// let events: TableClient<Event, String, i64> = TableClient::new(
///     Arc::new(backend),
///     "events",
///     PrimaryKeyDefinition::new("tenant", "seq"),
/// );
///
/// let event = Event { tenant: "t1".to_string(), seq: 1, body: "created".to_string() };
/// events.insert(&event).await?;
/// assert!(events.insert(&event).await.unwrap_err().is_conditional_check_failed());
/// assert_eq!(events.get("t1".to_string(), 1).await?, event);
/// # Ok(())
/// # }
/// ```
pub struct TableClient<E, P, S = NoSortKey> {
    backend: Arc<dyn Backend>,
    config: TableConfig,
    definition: PrimaryKeyDefinition<P, S>,
    index_name: Option<String>,
    projection: Projection,
    prototype: Prototype,
    table_name: String,
    _item: marker::PhantomData<fn() -> E>,
}

impl<E, P: KeyAttribute, S: SortKeyAttribute> Clone for TableClient<E, P, S> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            config: self.config.clone(),
            definition: self.definition.clone(),
            index_name: self.index_name.clone(),
            projection: self.projection.clone(),
            prototype: self.prototype.clone(),
            table_name: self.table_name.clone(),
            _item: marker::PhantomData,
        }
    }
}

impl<E, P, S> fmt::Debug for TableClient<E, P, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableClient")
            .field("table_name", &self.table_name)
            .field("index_name", &self.index_name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Not-found results and conditional failures are expected outcomes, anything else is not.
#[cfg(feature = "tracing")]
fn trace_outcome<T>(operation: &'static str, result: &Result<T>) {
    match result {
        Err(error) if error.is_not_exist() || error.is_conditional_check_failed() => {
            tracing::debug!(operation, %error);
        }
        Err(error) => tracing::error!(operation, %error),
        Ok(_) => {}
    }
}

/// Other failures are already recorded by the `query_page` span.
#[cfg(feature = "tracing")]
fn trace_not_exist<T>(operation: &'static str, result: &Result<T>) {
    if let Err(error @ Error::NotExist) = result {
        tracing::debug!(operation, %error);
    }
}

impl<E, P, S> TableClient<E, P, S>
where
    E: Serialize + DeserializeOwned,
    P: KeyAttribute,
    S: SortKeyAttribute,
{
    /// Client over `table_name`, fetching the attributes `E` declares.
    pub fn new(
        backend: Arc<dyn Backend>,
        table_name: impl Into<String>,
        definition: PrimaryKeyDefinition<P, S>,
    ) -> Self {
        let prototype = definition.prototype().clone();
        Self {
            backend,
            config: TableConfig::default(),
            definition,
            index_name: None,
            projection: Projection::of::<E>(),
            prototype,
            table_name: table_name.into(),
            _item: marker::PhantomData,
        }
    }

    /// Replace the client configuration.
    pub fn with_config(mut self, config: TableConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the attributes fetched by queries. An empty projection fetches all of them.
    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    pub(crate) fn with_index_name(mut self, index_name: String) -> Self {
        self.index_name = Some(index_name);
        self
    }

    pub(crate) fn merge_prototype(&mut self, other: &Prototype) {
        self.prototype.merge(other);
    }

    /// The key shape of the table.
    pub fn definition(&self) -> &PrimaryKeyDefinition<P, S> {
        &self.definition
    }

    /// The table name.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub(crate) fn index_name(&self) -> Option<&str> {
        self.index_name.as_deref()
    }

    fn to_item(&self, operation: &'static str, item: &E) -> Result<common::Item> {
        serde_dynamo::to_item(item).map_err(Error::serialization(operation))
    }

    fn write_args(&self, condition: Option<&common::ExpressionInput>) -> write::common::WriteArgs {
        write::common::WriteArgs {
            condition: condition.cloned(),
            table_name: self.table_name.clone(),
        }
    }

    async fn put_conditionally(
        &self,
        item: &E,
        condition: Option<&common::ExpressionInput>,
    ) -> Result<()> {
        let input: PutItemInput = write::put_item::PutItem {
            item: self.to_item(PUT_ITEM, item)?,
            write_args: self.write_args(condition),
        }
        .try_into()
        .map_err(Error::build(PUT_ITEM))?;
        self.backend
            .put_item(input)
            .await
            .map_err(|source| Error::backend(PUT_ITEM, source))?;
        Ok(())
    }

    /// Create or replace an item.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_table.put", skip_all, fields(table = %self.table_name), err)
    )]
    pub async fn put(&self, item: &E) -> Result<()> {
        self.put_conditionally(item, None).await
    }

    /// Create an item whose key does not exist yet.
    ///
    /// Fails with [`Error::ConditionalCheckFailed`] and leaves the stored item untouched when
    /// the key already exists.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_table.insert", skip_all, fields(table = %self.table_name))
    )]
    pub async fn insert(&self, item: &E) -> Result<()> {
        let result = self
            .put_conditionally(item, Some(self.definition.keys_absent_condition()))
            .await;
        #[cfg(feature = "tracing")]
        trace_outcome(PUT_ITEM, &result);
        result
    }

    /// Replace an item whose key already exists.
    ///
    /// Fails with [`Error::ConditionalCheckFailed`] without creating anything when the key
    /// does not exist.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_table.update", skip_all, fields(table = %self.table_name))
    )]
    pub async fn update(&self, item: &E) -> Result<()> {
        let result = self
            .put_conditionally(item, Some(self.definition.keys_present_condition()))
            .await;
        #[cfg(feature = "tracing")]
        trace_outcome(PUT_ITEM, &result);
        result
    }

    /// Read one item, [`Error::NotExist`] when it is absent.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_table.get", skip_all, fields(table = %self.table_name))
    )]
    pub async fn get(&self, partition: P, sort: S) -> Result<E> {
        let result = self.get_item(partition, sort).await;
        #[cfg(feature = "tracing")]
        trace_outcome(GET_ITEM, &result);
        result
    }

    async fn get_item(&self, partition: P, sort: S) -> Result<E> {
        let input: GetItemInput = read::get_item::GetItem {
            key: self.definition.new_key(partition, sort).attribute_value(),
            read_args: read::common::ReadArgs::new(
                &self.table_name,
                None,
                self.config.consistent_read,
            ),
        }
        .try_into()
        .map_err(Error::build(GET_ITEM))?;
        let output = self
            .backend
            .get_item(input)
            .await
            .map_err(|source| Error::backend(GET_ITEM, source))?;
        let item = output.item.ok_or(Error::NotExist)?;
        serde_dynamo::from_item(item).map_err(Error::serialization(GET_ITEM))
    }

    /// Delete one item. Deleting an absent item succeeds.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_table.delete", skip_all, fields(table = %self.table_name), err)
    )]
    pub async fn delete(&self, partition: P, sort: S) -> Result<()> {
        let input: DeleteItemInput = write::delete_item::DeleteItem {
            key: self.definition.new_key(partition, sort).attribute_value(),
            table_name: self.table_name.clone(),
        }
        .try_into()
        .map_err(Error::build(DELETE_ITEM))?;
        self.backend
            .delete_item(input)
            .await
            .map_err(|source| Error::backend(DELETE_ITEM, source))?;
        Ok(())
    }

    /// Read many items in one backend call.
    ///
    /// Missing items are skipped, so the result may be shorter than the key list and its
    /// order is the backend's.
    ///
    /// # Panics
    ///
    /// Panics when `sorts` is given with a length different from `partitions`.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_table.batch_get", skip_all, fields(table = %self.table_name), err)
    )]
    pub async fn batch_get(&self, partitions: Vec<P>, sorts: Option<Vec<S>>) -> Result<Vec<E>> {
        let keys: Vec<common::Item> = self
            .definition
            .new_keys(partitions, sorts)
            .iter()
            .map(common::key::PrimaryKey::attribute_value)
            .collect();
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let input: BatchGetItemInput = read::batch_get_item::BatchGetItem {
            keys,
            read_args: read::common::ReadArgs::new(
                &self.table_name,
                None,
                self.config.consistent_read,
            ),
        }
        .try_into()
        .map_err(Error::build(BATCH_GET_ITEM))?;
        let output = self
            .backend
            .batch_get_item(input)
            .await
            .map_err(|source| Error::backend(BATCH_GET_ITEM, source))?;
        let items = output
            .responses
            .and_then(|mut responses| responses.remove(&self.table_name))
            .unwrap_or_default();
        serde_dynamo::from_items(items).map_err(Error::serialization(BATCH_GET_ITEM))
    }

    async fn batch_write(&self, requests: Vec<write::batch_write_item::BatchWriteRequest>) -> Result<()> {
        if requests.is_empty() {
            return Ok(());
        }
        let input: BatchWriteItemInput = write::batch_write_item::BatchWriteItem {
            requests,
            table_name: self.table_name.clone(),
        }
        .try_into()
        .map_err(Error::build(BATCH_WRITE_ITEM))?;
        let output = self
            .backend
            .batch_write_item(input)
            .await
            .map_err(|source| Error::backend(BATCH_WRITE_ITEM, source))?;
        let count: usize = output
            .unprocessed_items
            .iter()
            .flat_map(|unprocessed| unprocessed.values())
            .map(Vec::len)
            .sum();
        if count > 0 {
            return Err(Error::Unprocessed {
                operation: BATCH_WRITE_ITEM,
                count,
            });
        }
        Ok(())
    }

    /// Create or replace many items in one backend call, without conditions.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_table.batch_put", skip_all, fields(table = %self.table_name), err)
    )]
    pub async fn batch_put(&self, items: &[E]) -> Result<()> {
        let requests = items
            .iter()
            .map(|item| {
                self.to_item(BATCH_WRITE_ITEM, item)
                    .map(write::batch_write_item::BatchWriteRequest::Put)
            })
            .collect::<Result<Vec<_>>>()?;
        self.batch_write(requests).await
    }

    /// Delete many items in one backend call.
    ///
    /// # Panics
    ///
    /// Panics when `sorts` is given with a length different from `partitions`.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_table.batch_delete", skip_all, fields(table = %self.table_name), err)
    )]
    pub async fn batch_delete(&self, partitions: Vec<P>, sorts: Option<Vec<S>>) -> Result<()> {
        let requests = self
            .definition
            .new_keys(partitions, sorts)
            .iter()
            .map(|key| write::batch_write_item::BatchWriteRequest::Delete(key.attribute_value()))
            .collect();
        self.batch_write(requests).await
    }

    /// Delete the items with the given sort keys from one partition.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_table.batch_delete_in_partition", skip_all, fields(table = %self.table_name), err)
    )]
    pub async fn batch_delete_in_partition(&self, partition: P, sorts: Vec<S>) -> Result<()> {
        let requests = sorts
            .into_iter()
            .map(|sort| {
                let key = self.definition.new_key(partition.clone(), sort);
                write::batch_write_item::BatchWriteRequest::Delete(key.attribute_value())
            })
            .collect();
        self.batch_write(requests).await
    }

    fn prepare_puts(
        &self,
        items: &[E],
        condition: Option<&common::ExpressionInput>,
    ) -> Result<Vec<types::TransactWriteItem>> {
        items
            .iter()
            .map(|item| {
                types::TransactWriteItem::try_from(write::put_item::PutItem {
                    item: self.to_item(TRANSACT_WRITE_ITEMS, item)?,
                    write_args: self.write_args(condition),
                })
                .map_err(Error::build(TRANSACT_WRITE_ITEMS))
            })
            .collect()
    }

    /// Unconditional put directives for [`TableClient::transact_write`].
    pub fn prepare_transact_put(&self, items: &[E]) -> Result<Vec<types::TransactWriteItem>> {
        self.prepare_puts(items, None)
    }

    /// Put directives that cancel the transaction when a key already exists.
    pub fn prepare_transact_insert(&self, items: &[E]) -> Result<Vec<types::TransactWriteItem>> {
        self.prepare_puts(items, Some(self.definition.keys_absent_condition()))
    }

    /// Put directives that cancel the transaction when a key does not exist.
    pub fn prepare_transact_update(&self, items: &[E]) -> Result<Vec<types::TransactWriteItem>> {
        self.prepare_puts(items, Some(self.definition.keys_present_condition()))
    }

    /// Delete directives for [`TableClient::transact_write`].
    ///
    /// # Panics
    ///
    /// Panics when `sorts` is given with a length different from `partitions`.
    pub fn prepare_transact_delete(
        &self,
        partitions: Vec<P>,
        sorts: Option<Vec<S>>,
    ) -> Result<Vec<types::TransactWriteItem>> {
        self.definition
            .new_keys(partitions, sorts)
            .iter()
            .map(|key| {
                types::TransactWriteItem::try_from(write::delete_item::DeleteItem {
                    key: key.attribute_value(),
                    table_name: self.table_name.clone(),
                })
                .map_err(Error::build(TRANSACT_WRITE_ITEMS))
            })
            .collect()
    }

    /// Apply prepared directives atomically, possibly gathered from several tables.
    ///
    /// A directive whose condition does not hold cancels the whole transaction with
    /// [`Error::ConditionalCheckFailed`].
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_table.transact_write", skip_all, fields(table = %self.table_name, count = items.len()))
    )]
    pub async fn transact_write(&self, items: Vec<types::TransactWriteItem>) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        let input: TransactWriteItemsInput = write::transact::TransactWriteItems { items }
            .try_into()
            .map_err(Error::build(TRANSACT_WRITE_ITEMS))?;
        let result = self
            .backend
            .transact_write_items(input)
            .await
            .map(|_| ())
            .map_err(|source| Error::backend(TRANSACT_WRITE_ITEMS, source));
        #[cfg(feature = "tracing")]
        trace_outcome(TRANSACT_WRITE_ITEMS, &result);
        result
    }

    fn query_input(
        &self,
        partition: &P,
        sort: Option<&SortKeyCondition<S>>,
        exclusive_start_key: Option<common::Item>,
        limit: i32,
        options: &QueryOptions,
    ) -> Result<QueryInput> {
        read::query::Query {
            exclusive_start_key,
            key_condition: condition::key_condition(&self.definition, partition, sort),
            limit: Some(limit),
            projection: self.projection.to_expression(),
            read_args: read::common::ReadArgs::new(
                &self.table_name,
                self.index_name.as_deref(),
                options.consistent_read.or(self.config.consistent_read),
            ),
            scan_index_forward: options.scan_forward,
        }
        .try_into()
        .map_err(Error::build(QUERY))
    }

    async fn fetch_page(
        &self,
        partition: &P,
        sort: Option<&SortKeyCondition<S>>,
        exclusive_start_key: Option<common::Item>,
        limit: i32,
        options: &QueryOptions,
    ) -> Result<(Vec<E>, Option<common::Item>)> {
        if limit < 1 {
            return Err(Error::InvalidLimit { limit });
        }
        let input = self.query_input(partition, sort, exclusive_start_key, limit, options)?;
        let output = self
            .backend
            .query(input)
            .await
            .map_err(|source| Error::backend(QUERY, source))?;
        let items = serde_dynamo::from_items(output.items.unwrap_or_default())
            .map_err(Error::serialization(QUERY))?;
        let last_evaluated_key = output.last_evaluated_key.filter(|key| !key.is_empty());
        Ok((items, last_evaluated_key))
    }

    /// Read every item of a partition, optionally narrowed by the sort key.
    ///
    /// Pages through the backend [`TableConfig::query_page_size`] items at a time (or
    /// [`QueryOptions::limit`]). Between pages the deadline and
    /// [`TableConfig::max_query_pages`] are checked; when either stops the query, or a
    /// page fails, the items already read are returned in the [`Partial`].
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_table.query", skip_all, fields(table = %self.table_name, index = ?self.index_name), err)
    )]
    pub async fn query(
        &self,
        partition: P,
        sort: Option<SortKeyCondition<S>>,
        options: QueryOptions,
    ) -> std::result::Result<Vec<E>, Partial<E>> {
        let limit = options.limit.unwrap_or(self.config.query_page_size);
        let mut items = Vec::new();
        let mut exclusive_start_key = None;
        let mut pages = 0;
        loop {
            if options.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                return Err(Partial {
                    items,
                    error: Error::DeadlineExceeded,
                });
            }
            let page = self
                .fetch_page(&partition, sort.as_ref(), exclusive_start_key, limit, &options)
                .await;
            let (page_items, last_evaluated_key) = match page {
                Ok(page) => page,
                Err(error) => return Err(Partial { items, error }),
            };
            items.extend(page_items);
            pages += 1;
            exclusive_start_key = match last_evaluated_key {
                Some(key) => Some(key),
                None => return Ok(items),
            };
            if let Some(max_pages) = self.config.max_query_pages {
                if pages >= max_pages {
                    return Err(Partial {
                        items,
                        error: Error::PageLimitExceeded { pages: max_pages },
                    });
                }
            }
        }
    }

    /// Read one page of a partition, resuming after `cursor`.
    ///
    /// `None` or an empty cursor starts from the beginning. A cursor that was not produced
    /// for this key shape fails with [`Error::BadRequest`], and a `limit` below 1 with
    /// [`Error::InvalidLimit`], before the backend is called.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(name = "dynamodb_table.query_page", skip_all, fields(table = %self.table_name, index = ?self.index_name, limit = limit), err)
    )]
    pub async fn query_page(
        &self,
        partition: P,
        sort: Option<SortKeyCondition<S>>,
        cursor: Option<&str>,
        limit: i32,
        options: QueryOptions,
    ) -> Result<Page<E>> {
        let exclusive_start_key = match cursor.filter(|cursor| !cursor.is_empty()) {
            Some(cursor) => Some(cursor::decode(&self.prototype, cursor)?),
            None => None,
        };
        let (items, last_evaluated_key) = self
            .fetch_page(&partition, sort.as_ref(), exclusive_start_key, limit, &options)
            .await?;
        let next_cursor = last_evaluated_key
            .map(|key| cursor::encode(&key))
            .transpose()?;
        Ok(Page { items, next_cursor })
    }

    async fn query_one(
        &self,
        partition: P,
        sort: Option<SortKeyCondition<S>>,
        scan_forward: bool,
    ) -> Result<E> {
        let options = QueryOptions {
            scan_forward: Some(scan_forward),
            ..Default::default()
        };
        let result = self
            .query_page(partition, sort, None, 1, options)
            .await
            .and_then(|page| page.items.into_iter().next().ok_or(Error::NotExist));
        #[cfg(feature = "tracing")]
        trace_not_exist(QUERY, &result);
        result
    }

    /// The item with the smallest sort key, [`Error::NotExist`] for an empty partition.
    pub async fn query_first_one(
        &self,
        partition: P,
        sort: Option<SortKeyCondition<S>>,
    ) -> Result<E> {
        self.query_one(partition, sort, true).await
    }

    /// The item with the largest sort key, [`Error::NotExist`] for an empty partition.
    pub async fn query_last_one(
        &self,
        partition: P,
        sort: Option<SortKeyCondition<S>>,
    ) -> Result<E> {
        self.query_one(partition, sort, false).await
    }
}
