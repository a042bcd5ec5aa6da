use dynamodb_table::{
    backend::{
        Backend, BackendError,
        memory::{KeySchema, MemoryBackend},
    },
    common::{condition::SortKeyCondition, key::PrimaryKeyDefinition},
    config::TableConfig,
    error::Error,
    table::{QueryOptions, TableClient},
};

use async_trait::async_trait;
use aws_sdk_dynamodb::operation::{
    batch_get_item::{BatchGetItemInput, BatchGetItemOutput},
    batch_write_item::{BatchWriteItemInput, BatchWriteItemOutput},
    delete_item::{DeleteItemInput, DeleteItemOutput},
    get_item::{GetItemInput, GetItemOutput},
    put_item::{PutItemInput, PutItemOutput},
    query::{QueryInput, QueryOutput},
    transact_write_items::{TransactWriteItemsInput, TransactWriteItemsOutput},
};
use rstest::rstest;
use serde::{Deserialize, Serialize};
use std::{
    collections,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
struct Event {
    tenant: String,
    seq: i64,
    body: String,
}

fn event(tenant: &str, seq: i64) -> Event {
    Event {
        tenant: tenant.to_string(),
        seq,
        body: format!("{tenant}/{seq}"),
    }
}

fn backend() -> MemoryBackend {
    MemoryBackend::new().with_table("events", KeySchema::new("tenant").with_sort_key("seq"))
}

fn client_on(backend: Arc<dyn Backend>) -> TableClient<Event, String, i64> {
    TableClient::new(backend, "events", PrimaryKeyDefinition::new("tenant", "seq"))
}

fn client() -> TableClient<Event, String, i64> {
    client_on(Arc::new(backend()))
}

async fn seeded(tenant: &str, count: i64) -> TableClient<Event, String, i64> {
    let client = client();
    let events: Vec<Event> = (1..=count).map(|seq| event(tenant, seq)).collect();
    client.batch_put(&events).await.unwrap();
    client
}

fn seqs(events: &[Event]) -> Vec<i64> {
    events.iter().map(|event| event.seq).collect()
}

#[tokio::test]
async fn test_insert_never_overwrites() {
    let client = client();
    client.insert(&event("t1", 1)).await.unwrap();
    let mut changed = event("t1", 1);
    changed.body = "changed".to_string();

    let error = client.insert(&changed).await.unwrap_err();

    assert!(error.is_conditional_check_failed());
    assert_eq!(client.get("t1".to_string(), 1).await.unwrap(), event("t1", 1));
}

#[tokio::test]
async fn test_update_requires_existing_key() {
    let client = client();

    let error = client.update(&event("t1", 1)).await.unwrap_err();
    assert!(error.is_conditional_check_failed());
    assert!(client.get("t1".to_string(), 1).await.unwrap_err().is_not_exist());

    client.put(&event("t1", 1)).await.unwrap();
    let mut changed = event("t1", 1);
    changed.body = "changed".to_string();
    client.update(&changed).await.unwrap();
    assert_eq!(client.get("t1".to_string(), 1).await.unwrap(), changed);
}

#[tokio::test]
async fn test_put_replaces() {
    let client = client();
    client.put(&event("t1", 1)).await.unwrap();
    let mut changed = event("t1", 1);
    changed.body = "changed".to_string();

    client.put(&changed).await.unwrap();

    assert_eq!(client.get("t1".to_string(), 1).await.unwrap(), changed);
}

#[tokio::test]
async fn test_delete() {
    let client = seeded("t1", 2).await;

    client.delete("t1".to_string(), 1).await.unwrap();
    client.delete("t1".to_string(), 9).await.unwrap();

    assert!(client.get("t1".to_string(), 1).await.unwrap_err().is_not_exist());
    assert_eq!(client.get("t1".to_string(), 2).await.unwrap(), event("t1", 2));
}

#[tokio::test]
async fn test_batch_get_skips_missing_items() {
    let client = seeded("t1", 3).await;

    let mut items = client
        .batch_get(
            vec!["t1".to_string(), "t1".to_string(), "t2".to_string()],
            Some(vec![1, 3, 1]),
        )
        .await
        .unwrap();
    items.sort_by_key(|item| item.seq);

    assert_eq!(items, vec![event("t1", 1), event("t1", 3)]);
}

#[tokio::test]
async fn test_batch_calls_with_no_keys_are_noops() {
    let client = client();
    assert!(client.batch_get(vec![], None).await.unwrap().is_empty());
    client.batch_put(&[]).await.unwrap();
    client.batch_delete(vec![], None).await.unwrap();
}

#[tokio::test]
async fn test_batch_delete_in_partition_removes_exactly_those_items() {
    let client = seeded("t1", 5).await;
    client.put(&event("t2", 2)).await.unwrap();

    client
        .batch_delete_in_partition("t1".to_string(), vec![2, 4])
        .await
        .unwrap();

    let remaining = client
        .query("t1".to_string(), None, QueryOptions::default())
        .await
        .unwrap();
    assert_eq!(seqs(&remaining), vec![1, 3, 5]);
    assert_eq!(client.get("t2".to_string(), 2).await.unwrap(), event("t2", 2));
}

#[tokio::test]
async fn test_batch_delete_across_partitions() {
    let client = seeded("t1", 2).await;
    client.put(&event("t2", 1)).await.unwrap();

    client
        .batch_delete(vec!["t1".to_string(), "t2".to_string()], Some(vec![1, 1]))
        .await
        .unwrap();

    assert!(client.get("t1".to_string(), 1).await.unwrap_err().is_not_exist());
    assert!(client.get("t2".to_string(), 1).await.unwrap_err().is_not_exist());
    assert_eq!(client.get("t1".to_string(), 2).await.unwrap(), event("t1", 2));
}

#[tokio::test]
async fn test_transaction_applies_all_directives() {
    let client = seeded("t1", 2).await;
    let mut directives = client.prepare_transact_insert(&[event("t1", 3)]).unwrap();
    let mut changed = event("t1", 1);
    changed.body = "changed".to_string();
    directives.extend(client.prepare_transact_update(&[changed.clone()]).unwrap());
    directives.extend(
        client
            .prepare_transact_delete(vec!["t1".to_string()], Some(vec![2]))
            .unwrap(),
    );

    client.transact_write(directives).await.unwrap();

    let items = client
        .query("t1".to_string(), None, QueryOptions::default())
        .await
        .unwrap();
    assert_eq!(items, vec![changed, event("t1", 3)]);
}

#[tokio::test]
async fn test_transaction_with_failed_condition_applies_nothing() {
    let client = seeded("t1", 1).await;
    let mut directives = client.prepare_transact_put(&[event("t1", 2)]).unwrap();
    directives.extend(client.prepare_transact_insert(&[event("t1", 1)]).unwrap());

    let error = client.transact_write(directives).await.unwrap_err();

    assert!(error.is_conditional_check_failed());
    assert!(client.get("t1".to_string(), 2).await.unwrap_err().is_not_exist());
}

#[rstest]
#[case::one(1)]
#[case::two(2)]
#[case::three(3)]
#[case::exact(7)]
#[case::larger(10)]
#[tokio::test]
async fn test_query_page_visits_every_item_once(#[case] limit: i32) {
    let client = seeded("t1", 7).await;
    let mut visited = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = client
            .query_page(
                "t1".to_string(),
                None,
                cursor.as_deref(),
                limit,
                QueryOptions::default(),
            )
            .await
            .unwrap();
        visited.extend(page.items);
        cursor = page.next_cursor;
        if cursor.is_none() {
            break;
        }
    }
    assert_eq!(seqs(&visited), (1..=7).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_query_page_in_pairs() {
    let client = seeded("t1", 5).await;
    let page = |cursor: Option<String>| {
        let client = client.clone();
        async move {
            client
                .query_page(
                    "t1".to_string(),
                    None,
                    cursor.as_deref(),
                    2,
                    QueryOptions::default(),
                )
                .await
                .unwrap()
        }
    };

    let first = page(None).await;
    assert_eq!(seqs(&first.items), vec![1, 2]);
    assert!(first.next_cursor.is_some());

    let second = page(first.next_cursor).await;
    assert_eq!(seqs(&second.items), vec![3, 4]);
    assert!(second.next_cursor.is_some());

    let third = page(second.next_cursor).await;
    assert_eq!(seqs(&third.items), vec![5]);
    assert_eq!(third.next_cursor, None);
}

#[tokio::test]
async fn test_query_page_empty_cursor_starts_over() {
    let client = seeded("t1", 3).await;
    let page = client
        .query_page("t1".to_string(), None, Some(""), 2, QueryOptions::default())
        .await
        .unwrap();
    assert_eq!(seqs(&page.items), vec![1, 2]);
}

#[rstest]
#[case::not_base64("%%%")]
#[case::unknown_attribute("eyJ0ZW5hbnRzIjoidDEifQ==")]
#[case::wrong_kind("eyJzZXEiOiJ0aHJlZSJ9")]
#[case::missing_sort_key("eyJ0ZW5hbnQiOiJ0MSJ9")]
#[tokio::test]
async fn test_query_page_rejects_foreign_cursor(#[case] cursor: &str) {
    let client = seeded("t1", 3).await;
    let error = client
        .query_page("t1".to_string(), None, Some(cursor), 2, QueryOptions::default())
        .await
        .unwrap_err();
    assert!(error.is_bad_request());
}

#[rstest]
#[case::zero(0)]
#[case::negative(-1)]
#[tokio::test]
async fn test_query_rejects_limit_below_one(#[case] limit: i32) {
    let backend = Arc::new(FlakyBackend {
        healthy: 0,
        inner: backend(),
        queries: AtomicUsize::new(0),
    });
    let client = client_on(backend.clone());

    let error = client
        .query_page("t1".to_string(), None, None, limit, QueryOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(error, Error::InvalidLimit { limit: rejected } if rejected == limit));

    let partial = client
        .query(
            "t1".to_string(),
            None,
            QueryOptions {
                limit: Some(limit),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(partial.items.is_empty());
    assert!(partial.error.is_bad_request());
    assert_eq!(backend.queries.load(Ordering::SeqCst), 0);
}

#[rstest]
#[case::equals(SortKeyCondition::Equals(3), vec![3])]
#[case::greater_than(SortKeyCondition::GreaterThan(3), vec![4, 5])]
#[case::greater_than_or_equal(SortKeyCondition::GreaterThanOrEqual(3), vec![3, 4, 5])]
#[case::less_than(SortKeyCondition::LessThan(3), vec![1, 2])]
#[case::less_than_or_equal(SortKeyCondition::LessThanOrEqual(3), vec![1, 2, 3])]
#[case::between(SortKeyCondition::Between(2, 4), vec![2, 3, 4])]
#[tokio::test]
async fn test_query_narrowed_by_sort_key(
    #[case] condition: SortKeyCondition<i64>,
    #[case] expected: Vec<i64>,
) {
    let client = seeded("t1", 5).await;
    let items = client
        .query("t1".to_string(), Some(condition), QueryOptions::default())
        .await
        .unwrap();
    assert_eq!(seqs(&items), expected);
}

#[tokio::test]
async fn test_query_sorts_numerically_and_reverses() {
    let client = seeded("t1", 12).await;
    let items = client
        .query(
            "t1".to_string(),
            None,
            QueryOptions {
                scan_forward: Some(false),
                limit: Some(5),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(seqs(&items), (1..=12).rev().collect::<Vec<_>>());
}

#[tokio::test]
async fn test_query_first_and_last_one() {
    let client = seeded("t1", 5).await;
    client.put(&event("t2", 100)).await.unwrap();

    let first = client.query_first_one("t1".to_string(), None).await.unwrap();
    let last = client.query_last_one("t1".to_string(), None).await.unwrap();
    let last_below = client
        .query_last_one("t1".to_string(), Some(SortKeyCondition::LessThan(4)))
        .await
        .unwrap();

    assert_eq!(first, event("t1", 1));
    assert_eq!(last, event("t1", 5));
    assert_eq!(last_below, event("t1", 3));
}

#[tokio::test]
async fn test_query_first_one_on_empty_partition() {
    let client = seeded("t1", 5).await;
    assert!(matches!(
        client.query_first_one("t2".to_string(), None).await,
        Err(Error::NotExist)
    ));
    assert!(matches!(
        client
            .query_last_one("t1".to_string(), Some(SortKeyCondition::GreaterThan(5)))
            .await,
        Err(Error::NotExist)
    ));
}

#[tokio::test]
async fn test_query_stops_at_page_limit_with_partial_items() {
    let client = seeded("t1", 5).await.with_config(TableConfig {
        query_page_size: 2,
        max_query_pages: Some(2),
        ..Default::default()
    });

    let partial = client
        .query("t1".to_string(), None, QueryOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(partial.error, Error::PageLimitExceeded { pages: 2 }));
    assert_eq!(seqs(&partial.items), vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn test_query_within_page_limit() {
    let client = seeded("t1", 4).await.with_config(TableConfig {
        query_page_size: 2,
        max_query_pages: Some(3),
        ..Default::default()
    });

    let items = client
        .query("t1".to_string(), None, QueryOptions::default())
        .await
        .unwrap();

    assert_eq!(seqs(&items), vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn test_query_past_deadline() {
    let client = seeded("t1", 3).await;
    let deadline = Instant::now()
        .checked_sub(Duration::from_millis(1))
        .unwrap_or_else(Instant::now);

    let partial = client
        .query(
            "t1".to_string(),
            None,
            QueryOptions {
                deadline: Some(deadline),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(partial.error, Error::DeadlineExceeded));
    assert!(partial.items.is_empty());
}

/// Delegates to a [`MemoryBackend`] but fails every query after the first `healthy` ones.
struct FlakyBackend {
    healthy: usize,
    inner: MemoryBackend,
    queries: AtomicUsize,
}

#[async_trait]
impl Backend for FlakyBackend {
    async fn get_item(&self, input: GetItemInput) -> Result<GetItemOutput, BackendError> {
        self.inner.get_item(input).await
    }

    async fn put_item(&self, input: PutItemInput) -> Result<PutItemOutput, BackendError> {
        self.inner.put_item(input).await
    }

    async fn delete_item(&self, input: DeleteItemInput) -> Result<DeleteItemOutput, BackendError> {
        self.inner.delete_item(input).await
    }

    async fn batch_get_item(
        &self,
        input: BatchGetItemInput,
    ) -> Result<BatchGetItemOutput, BackendError> {
        self.inner.batch_get_item(input).await
    }

    async fn batch_write_item(
        &self,
        input: BatchWriteItemInput,
    ) -> Result<BatchWriteItemOutput, BackendError> {
        self.inner.batch_write_item(input).await
    }

    async fn query(&self, input: QueryInput) -> Result<QueryOutput, BackendError> {
        if self.queries.fetch_add(1, Ordering::SeqCst) >= self.healthy {
            return Err(BackendError::service("throttled"));
        }
        self.inner.query(input).await
    }

    async fn transact_write_items(
        &self,
        input: TransactWriteItemsInput,
    ) -> Result<TransactWriteItemsOutput, BackendError> {
        self.inner.transact_write_items(input).await
    }
}

#[tokio::test]
async fn test_query_keeps_items_read_before_a_failure() {
    let backend = Arc::new(FlakyBackend {
        healthy: 2,
        inner: backend(),
        queries: AtomicUsize::new(0),
    });
    let client = client_on(backend).with_config(TableConfig {
        query_page_size: 2,
        ..Default::default()
    });
    let events: Vec<Event> = (1..=5).map(|seq| event("t1", seq)).collect();
    client.batch_put(&events).await.unwrap();

    let partial = client
        .query("t1".to_string(), None, QueryOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(partial.error, Error::Backend { operation: "query", .. }));
    assert_eq!(seqs(&partial.items), vec![1, 2, 3, 4]);
    assert!(Error::from(partial).to_string().starts_with("query: "));
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
struct Tenant {
    id: String,
    plan: String,
}

#[tokio::test]
async fn test_partition_only_table() {
    let backend = MemoryBackend::new().with_table("tenants", KeySchema::new("id"));
    let client: TableClient<Tenant, String> = TableClient::new(
        Arc::new(backend),
        "tenants",
        PrimaryKeyDefinition::partition_only("id"),
    );
    let tenant = Tenant {
        id: "t1".to_string(),
        plan: "free".to_string(),
    };

    client.insert(&tenant).await.unwrap();
    assert!(client.insert(&tenant).await.unwrap_err().is_conditional_check_failed());
    assert!(!client.definition().has_sort_key());
    assert_eq!(
        client.get("t1".to_string(), Default::default()).await.unwrap(),
        tenant
    );
    assert_eq!(
        client
            .query_first_one("t1".to_string(), None)
            .await
            .unwrap(),
        tenant
    );
}

#[tokio::test]
async fn test_projection_limits_fetched_attributes() {
    #[derive(Debug, Deserialize, PartialEq, Serialize)]
    struct Summary {
        tenant: String,
        seq: i64,
    }

    let backend = Arc::new(backend());
    client_on(backend.clone()).put(&event("t1", 1)).await.unwrap();
    let summaries: TableClient<collections::HashMap<String, serde_json::Value>, String, i64> =
        TableClient::new(backend, "events", PrimaryKeyDefinition::new("tenant", "seq"))
            .with_projection(dynamodb_table::common::projection::Projection::of::<Summary>());

    let items = summaries
        .query("t1".to_string(), None, QueryOptions::default())
        .await
        .unwrap();

    assert_eq!(items.len(), 1);
    let mut keys: Vec<&str> = items[0].keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(keys, vec!["seq", "tenant"]);
}
