//! In-process [`Backend`] for tests and local development.
//!
//! Understands the expressions the table and index clients generate: key conditions
//! (`=`, `<`, `<=`, `>`, `>=`, `BETWEEN`, `begins_with`), `attribute_exists` /
//! `attribute_not_exists` write conditions, and plain projections. Pagination follows
//! DynamoDB: a page that reaches its limit reports a last evaluated key, even when no item
//! follows it.
//!
//! ```rust
//! use dynamodb_table::backend::memory::{KeySchema, MemoryBackend};
//!
//! let backend = MemoryBackend::new()
//!     .with_table("events", KeySchema::new("tenant").with_sort_key("seq"))
//!     .with_index("events", "by_kind", KeySchema::new("kind").with_sort_key("seq"));
//! assert_eq!(backend.item_count("events"), 0);
//! ```

use crate::{
    backend::{Backend, BackendError},
    common,
};

use async_trait::async_trait;
use aws_sdk_dynamodb::{
    operation::{
        batch_get_item::{BatchGetItemInput, BatchGetItemOutput},
        batch_write_item::{BatchWriteItemInput, BatchWriteItemOutput},
        delete_item::{DeleteItemInput, DeleteItemOutput},
        get_item::{GetItemInput, GetItemOutput},
        put_item::{PutItemInput, PutItemOutput},
        query::{QueryInput, QueryOutput},
        transact_write_items::{TransactWriteItemsInput, TransactWriteItemsOutput},
    },
    types,
};
use parking_lot::RwLock;
use std::{cmp, collections};

/// Key attribute names of a table or index.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct KeySchema {
    partition_key: String,
    sort_key: Option<String>,
}

impl KeySchema {
    /// Schema with only a partition key.
    pub fn new(partition_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            sort_key: None,
        }
    }

    /// Add a sort key.
    pub fn with_sort_key(mut self, sort_key: impl Into<String>) -> Self {
        self.sort_key = Some(sort_key.into());
        self
    }

    fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.partition_key.as_str()).chain(self.sort_key.as_deref())
    }

    fn key_of(&self, item: &common::Item) -> Option<common::Item> {
        self.names()
            .map(|name| Some((name.to_string(), item.get(name)?.clone())))
            .collect()
    }
}

/// Storage identity of an item within a table.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
enum Scalar {
    S(String),
    N(String),
}

impl Scalar {
    fn of(value: &types::AttributeValue) -> Option<Self> {
        match value {
            types::AttributeValue::S(value) => Some(Self::S(value.clone())),
            types::AttributeValue::N(value) => Some(Self::N(
                value
                    .parse::<i128>()
                    .map(|number| number.to_string())
                    .unwrap_or_else(|_| value.clone()),
            )),
            _ => None,
        }
    }
}

type StoredKey = (Scalar, Option<Scalar>);

#[derive(Debug)]
struct Table {
    indexes: collections::HashMap<String, KeySchema>,
    items: collections::HashMap<StoredKey, common::Item>,
    schema: KeySchema,
}

impl Table {
    fn stored_key(&self, key: &common::Item) -> Result<StoredKey, BackendError> {
        let scalar = |name: &str| {
            key.get(name)
                .and_then(Scalar::of)
                .ok_or_else(|| validation(format!("missing key attribute {name:?}")))
        };
        let partition = scalar(&self.schema.partition_key)?;
        let sort = self.schema.sort_key.as_deref().map(scalar).transpose()?;
        Ok((partition, sort))
    }

    fn check(&self, key: &StoredKey, condition: &WriteCondition) -> Result<(), BackendError> {
        if condition.holds(self.items.get(key)) {
            Ok(())
        } else {
            Err(BackendError::ConditionalCheckFailed)
        }
    }
}

/// In-process backend holding every table in memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: RwLock<collections::HashMap<String, Table>>,
}

impl MemoryBackend {
    /// Backend without tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an empty table.
    pub fn with_table(self, table_name: impl Into<String>, schema: KeySchema) -> Self {
        self.tables.write().insert(
            table_name.into(),
            Table {
                indexes: collections::HashMap::new(),
                items: collections::HashMap::new(),
                schema,
            },
        );
        self
    }

    /// Add a secondary index to a table added before.
    ///
    /// Items lacking any of the index key attributes are left out of the index.
    pub fn with_index(
        self,
        table_name: &str,
        index_name: impl Into<String>,
        schema: KeySchema,
    ) -> Self {
        if let Some(table) = self.tables.write().get_mut(table_name) {
            table.indexes.insert(index_name.into(), schema);
        }
        self
    }

    /// Number of items stored in a table, 0 for unknown tables.
    pub fn item_count(&self, table_name: &str) -> usize {
        self.tables
            .read()
            .get(table_name)
            .map_or(0, |table| table.items.len())
    }
}

fn validation(message: impl Into<String>) -> BackendError {
    BackendError::service(format!("ValidationException: {}", message.into()))
}

fn not_found(table_name: &str) -> BackendError {
    BackendError::service(format!(
        "ResourceNotFoundException: table {table_name:?} not found"
    ))
}

fn resolve<'a>(
    token: &'a str,
    names: Option<&'a collections::HashMap<String, String>>,
) -> Result<&'a str, BackendError> {
    if token.starts_with('#') {
        names
            .and_then(|names| names.get(token))
            .map(String::as_str)
            .ok_or_else(|| validation(format!("undefined attribute name {token}")))
    } else {
        Ok(token)
    }
}

fn value<'a>(
    token: &str,
    values: Option<&'a common::Item>,
) -> Result<&'a types::AttributeValue, BackendError> {
    values
        .and_then(|values| values.get(token))
        .ok_or_else(|| validation(format!("undefined attribute value {token}")))
}

/// Conjunction of `attribute_exists` / `attribute_not_exists` terms.
#[derive(Debug, Default)]
struct WriteCondition {
    terms: Vec<(String, bool)>,
}

impl WriteCondition {
    fn parse(
        expression: Option<&str>,
        names: Option<&collections::HashMap<String, String>>,
    ) -> Result<Self, BackendError> {
        let Some(expression) = expression else {
            return Ok(Self::default());
        };
        let mut terms = Vec::new();
        for term in expression.split(" AND ") {
            let term = term.trim();
            let (argument, exists) =
                if let Some(rest) = term.strip_prefix("attribute_not_exists(") {
                    (rest, false)
                } else if let Some(rest) = term.strip_prefix("attribute_exists(") {
                    (rest, true)
                } else {
                    return Err(validation(format!("unsupported condition {term:?}")));
                };
            let argument = argument
                .strip_suffix(')')
                .ok_or_else(|| validation(format!("unsupported condition {term:?}")))?;
            terms.push((resolve(argument.trim(), names)?.to_string(), exists));
        }
        Ok(Self { terms })
    }

    fn holds(&self, existing: Option<&common::Item>) -> bool {
        self.terms.iter().all(|(name, exists)| {
            existing.is_some_and(|item| item.contains_key(name)) == *exists
        })
    }
}

#[derive(Debug)]
enum KeyOperator {
    BeginsWith,
    Between,
    Compare(&'static str),
}

#[derive(Debug)]
struct KeyPredicate {
    name: String,
    operator: KeyOperator,
    operands: Vec<types::AttributeValue>,
}

impl KeyPredicate {
    fn matches(&self, item: &common::Item) -> bool {
        let Some(actual) = item.get(&self.name) else {
            return false;
        };
        match (&self.operator, self.operands.as_slice()) {
            (KeyOperator::BeginsWith, [types::AttributeValue::S(prefix)]) => {
                matches!(actual, types::AttributeValue::S(actual) if actual.starts_with(prefix.as_str()))
            }
            (KeyOperator::Between, [low, high]) => {
                compare(actual, low) != cmp::Ordering::Less
                    && compare(actual, high) != cmp::Ordering::Greater
            }
            (KeyOperator::Compare(operator), [operand]) => {
                let ordering = compare(actual, operand);
                match *operator {
                    "=" => ordering == cmp::Ordering::Equal,
                    "<" => ordering == cmp::Ordering::Less,
                    "<=" => ordering != cmp::Ordering::Greater,
                    ">" => ordering == cmp::Ordering::Greater,
                    ">=" => ordering != cmp::Ordering::Less,
                    _ => false,
                }
            }
            _ => false,
        }
    }
}

fn parse_key_condition(
    expression: &str,
    names: Option<&collections::HashMap<String, String>>,
    values: Option<&common::Item>,
) -> Result<Vec<KeyPredicate>, BackendError> {
    let mut predicates = Vec::new();
    let mut terms = expression.split(" AND ").map(str::trim);
    while let Some(term) = terms.next() {
        let unsupported = || validation(format!("unsupported key condition {term:?}"));
        let predicate = if let Some(arguments) = term
            .strip_prefix("begins_with(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let (name, operand) = arguments.split_once(',').ok_or_else(unsupported)?;
            KeyPredicate {
                name: resolve(name.trim(), names)?.to_string(),
                operator: KeyOperator::BeginsWith,
                operands: vec![value(operand.trim(), values)?.clone()],
            }
        } else if let Some((name, low)) = term.split_once(" BETWEEN ") {
            let high = terms.next().ok_or_else(unsupported)?;
            KeyPredicate {
                name: resolve(name.trim(), names)?.to_string(),
                operator: KeyOperator::Between,
                operands: vec![
                    value(low.trim(), values)?.clone(),
                    value(high, values)?.clone(),
                ],
            }
        } else {
            let parts: Vec<&str> = term.split_whitespace().collect();
            let [name, operator, operand] = parts.as_slice() else {
                return Err(unsupported());
            };
            let operator = ["=", "<", "<=", ">", ">="]
                .into_iter()
                .find(|candidate| candidate == operator)
                .ok_or_else(unsupported)?;
            KeyPredicate {
                name: resolve(name, names)?.to_string(),
                operator: KeyOperator::Compare(operator),
                operands: vec![value(operand, values)?.clone()],
            }
        };
        predicates.push(predicate);
    }
    Ok(predicates)
}

fn compare(left: &types::AttributeValue, right: &types::AttributeValue) -> cmp::Ordering {
    match (left, right) {
        (types::AttributeValue::N(left), types::AttributeValue::N(right)) => {
            match (left.parse::<i128>(), right.parse::<i128>()) {
                (Ok(left), Ok(right)) => left.cmp(&right),
                _ => {
                    let left = left.parse::<f64>().unwrap_or(f64::NAN);
                    let right = right.parse::<f64>().unwrap_or(f64::NAN);
                    left.partial_cmp(&right).unwrap_or(cmp::Ordering::Equal)
                }
            }
        }
        (types::AttributeValue::S(left), types::AttributeValue::S(right)) => left.cmp(right),
        _ => cmp::Ordering::Equal,
    }
}

fn compare_positions(
    left: &[Option<types::AttributeValue>],
    right: &[Option<types::AttributeValue>],
) -> cmp::Ordering {
    for (left, right) in left.iter().zip(right) {
        let ordering = match (left, right) {
            (Some(left), Some(right)) => compare(left, right),
            (None, Some(_)) => cmp::Ordering::Less,
            (Some(_), None) => cmp::Ordering::Greater,
            (None, None) => cmp::Ordering::Equal,
        };
        if ordering != cmp::Ordering::Equal {
            return ordering;
        }
    }
    cmp::Ordering::Equal
}

fn project(
    item: &common::Item,
    projection: Option<&str>,
    names: Option<&collections::HashMap<String, String>>,
) -> Result<common::Item, BackendError> {
    let Some(projection) = projection else {
        return Ok(item.clone());
    };
    let mut projected = common::Item::new();
    for token in projection.split(',') {
        let name = resolve(token.trim(), names)?;
        if let Some(value) = item.get(name) {
            projected.insert(name.to_string(), value.clone());
        }
    }
    Ok(projected)
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn get_item(&self, input: GetItemInput) -> Result<GetItemOutput, BackendError> {
        let table_name = input.table_name().unwrap_or_default();
        let tables = self.tables.read();
        let table = tables.get(table_name).ok_or_else(|| not_found(table_name))?;
        let key = table.stored_key(input.key().unwrap_or(&common::Item::new()))?;
        let item = match table.items.get(&key) {
            Some(item) => Some(project(
                item,
                input.projection_expression(),
                input.expression_attribute_names(),
            )?),
            None => None,
        };
        Ok(GetItemOutput::builder().set_item(item).build())
    }

    async fn put_item(&self, input: PutItemInput) -> Result<PutItemOutput, BackendError> {
        let table_name = input.table_name().unwrap_or_default();
        let mut tables = self.tables.write();
        let table = tables
            .get_mut(table_name)
            .ok_or_else(|| not_found(table_name))?;
        let item = input
            .item()
            .cloned()
            .ok_or_else(|| validation("missing item"))?;
        let key = table.stored_key(&item)?;
        let condition = WriteCondition::parse(
            input.condition_expression(),
            input.expression_attribute_names(),
        )?;
        table.check(&key, &condition)?;
        table.items.insert(key, item);
        Ok(PutItemOutput::builder().build())
    }

    async fn delete_item(&self, input: DeleteItemInput) -> Result<DeleteItemOutput, BackendError> {
        let table_name = input.table_name().unwrap_or_default();
        let mut tables = self.tables.write();
        let table = tables
            .get_mut(table_name)
            .ok_or_else(|| not_found(table_name))?;
        let key = table.stored_key(input.key().unwrap_or(&common::Item::new()))?;
        let condition = WriteCondition::parse(
            input.condition_expression(),
            input.expression_attribute_names(),
        )?;
        table.check(&key, &condition)?;
        table.items.remove(&key);
        Ok(DeleteItemOutput::builder().build())
    }

    async fn batch_get_item(
        &self,
        input: BatchGetItemInput,
    ) -> Result<BatchGetItemOutput, BackendError> {
        let tables = self.tables.read();
        let mut responses = collections::HashMap::new();
        for (table_name, keys_and_attributes) in input.request_items().into_iter().flatten() {
            let table = tables.get(table_name).ok_or_else(|| not_found(table_name))?;
            let mut items = Vec::new();
            for key in keys_and_attributes.keys() {
                let key = table.stored_key(key)?;
                if let Some(item) = table.items.get(&key) {
                    items.push(item.clone());
                }
            }
            responses.insert(table_name.clone(), items);
        }
        Ok(BatchGetItemOutput::builder()
            .set_responses(Some(responses))
            .build())
    }

    async fn batch_write_item(
        &self,
        input: BatchWriteItemInput,
    ) -> Result<BatchWriteItemOutput, BackendError> {
        let mut tables = self.tables.write();
        for (table_name, requests) in input.request_items().into_iter().flatten() {
            let table = tables
                .get_mut(table_name)
                .ok_or_else(|| not_found(table_name))?;
            for request in requests {
                if let Some(put_request) = request.put_request() {
                    let key = table.stored_key(put_request.item())?;
                    table.items.insert(key, put_request.item().clone());
                }
                if let Some(delete_request) = request.delete_request() {
                    let key = table.stored_key(delete_request.key())?;
                    table.items.remove(&key);
                }
            }
        }
        Ok(BatchWriteItemOutput::builder().build())
    }

    async fn query(&self, input: QueryInput) -> Result<QueryOutput, BackendError> {
        let table_name = input.table_name().unwrap_or_default();
        let tables = self.tables.read();
        let table = tables.get(table_name).ok_or_else(|| not_found(table_name))?;
        let schema = match input.index_name() {
            Some(index_name) => table
                .indexes
                .get(index_name)
                .ok_or_else(|| validation(format!("index {index_name:?} not found")))?,
            None => &table.schema,
        };
        let names = input.expression_attribute_names();
        let predicates = parse_key_condition(
            input.key_condition_expression().unwrap_or_default(),
            names,
            input.expression_attribute_values(),
        )?;
        if !predicates
            .iter()
            .any(|predicate| predicate.name == schema.partition_key)
        {
            return Err(validation("key condition must select the partition key"));
        }

        // index sort key, then the table key to break ties
        let position_names: Vec<&str> = schema
            .sort_key
            .as_deref()
            .into_iter()
            .chain(table.schema.names())
            .collect();
        let position = |item: &common::Item| -> Vec<Option<types::AttributeValue>> {
            position_names
                .iter()
                .map(|name| item.get(*name).cloned())
                .collect()
        };
        let mut matched: Vec<(Vec<Option<types::AttributeValue>>, &common::Item)> = table
            .items
            .values()
            .filter(|item| schema.names().all(|name| item.contains_key(name)))
            .filter(|item| predicates.iter().all(|predicate| predicate.matches(item)))
            .map(|item| (position(item), item))
            .collect();
        matched.sort_by(|(left, _), (right, _)| compare_positions(left, right));
        let forward = input.scan_index_forward().unwrap_or(true);
        if !forward {
            matched.reverse();
        }
        if let Some(start) = input.exclusive_start_key() {
            let start = position(start);
            let after = if forward {
                cmp::Ordering::Greater
            } else {
                cmp::Ordering::Less
            };
            matched.retain(|(position, _)| compare_positions(position, &start) == after);
        }
        let limit = input
            .limit()
            .map_or(usize::MAX, |limit| usize::try_from(limit).unwrap_or(0));
        matched.truncate(limit);

        let last_evaluated_key = match matched.last() {
            Some((_, last)) if matched.len() == limit => {
                let mut key = table
                    .schema
                    .key_of(last)
                    .ok_or_else(|| validation("stored item lost its key"))?;
                key.extend(schema.key_of(last).unwrap_or_default());
                Some(key)
            }
            _ => None,
        };
        let items = matched
            .iter()
            .map(|(_, item)| project(item, input.projection_expression(), names))
            .collect::<Result<Vec<_>, _>>()?;
        let count = i32::try_from(items.len()).unwrap_or(i32::MAX);
        Ok(QueryOutput::builder()
            .count(count)
            .set_items(Some(items))
            .set_last_evaluated_key(last_evaluated_key)
            .scanned_count(count)
            .build())
    }

    async fn transact_write_items(
        &self,
        input: TransactWriteItemsInput,
    ) -> Result<TransactWriteItemsOutput, BackendError> {
        let mut tables = self.tables.write();
        let mut writes = Vec::new();
        for transact_item in input.transact_items() {
            if let Some(put) = transact_item.put() {
                let table = tables
                    .get(put.table_name())
                    .ok_or_else(|| not_found(put.table_name()))?;
                let key = table.stored_key(put.item())?;
                let condition = WriteCondition::parse(
                    put.condition_expression(),
                    put.expression_attribute_names(),
                )?;
                table.check(&key, &condition)?;
                writes.push((put.table_name(), key, Some(put.item().clone())));
            } else if let Some(delete) = transact_item.delete() {
                let table = tables
                    .get(delete.table_name())
                    .ok_or_else(|| not_found(delete.table_name()))?;
                let key = table.stored_key(delete.key())?;
                let condition = WriteCondition::parse(
                    delete.condition_expression(),
                    delete.expression_attribute_names(),
                )?;
                table.check(&key, &condition)?;
                writes.push((delete.table_name(), key, None));
            } else {
                return Err(validation("only put and delete are supported in transactions"));
            }
        }
        for (table_name, key, item) in writes {
            if let Some(table) = tables.get_mut(table_name) {
                match item {
                    Some(item) => {
                        table.items.insert(key, item);
                    }
                    None => {
                        table.items.remove(&key);
                    }
                }
            }
        }
        Ok(TransactWriteItemsOutput::builder().build())
    }
}
