//! The storage backend a table client talks to.
//!
//! [`Backend`] mirrors the subset of the DynamoDB API the clients need, taking and returning
//! the SDK's own input and output structs. It is implemented for
//! [`aws_sdk_dynamodb::Client`] and by the in-process [`memory::MemoryBackend`].

/// In-process backend.
pub mod memory;

use async_trait::async_trait;
use aws_sdk_dynamodb::{
    Client,
    error::{ProvideErrorMetadata, SdkError},
    operation::{
        batch_get_item::{BatchGetItemInput, BatchGetItemOutput},
        batch_write_item::{BatchWriteItemInput, BatchWriteItemOutput},
        delete_item::{DeleteItemInput, DeleteItemOutput},
        get_item::{GetItemInput, GetItemOutput},
        put_item::{PutItemInput, PutItemOutput},
        query::{QueryInput, QueryOutput},
        transact_write_items::{
            TransactWriteItemsError, TransactWriteItemsInput, TransactWriteItemsOutput,
        },
    },
};
use std::{error, fmt};

/// Failure reported by a [`Backend`].
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// A conditional write, or a transaction containing one, was rejected.
    #[error("conditional check failed")]
    ConditionalCheckFailed,
    /// Any other failure: service errors, transport errors, throttling.
    #[error(transparent)]
    Service(Box<dyn error::Error + Send + Sync>),
}

impl BackendError {
    /// Wrap any other failure.
    pub fn service(source: impl Into<Box<dyn error::Error + Send + Sync>>) -> Self {
        Self::Service(source.into())
    }
}

/// Backend operations used by table and index clients.
///
/// Implementations must be safe for concurrent use; clients add no locking of their own.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Read a single item.
    async fn get_item(&self, input: GetItemInput) -> Result<GetItemOutput, BackendError>;

    /// Create or replace a single item, honouring its condition expression.
    async fn put_item(&self, input: PutItemInput) -> Result<PutItemOutput, BackendError>;

    /// Delete a single item.
    async fn delete_item(&self, input: DeleteItemInput) -> Result<DeleteItemOutput, BackendError>;

    /// Read many items in one round trip.
    async fn batch_get_item(
        &self,
        input: BatchGetItemInput,
    ) -> Result<BatchGetItemOutput, BackendError>;

    /// Put and delete many items in one round trip.
    async fn batch_write_item(
        &self,
        input: BatchWriteItemInput,
    ) -> Result<BatchWriteItemOutput, BackendError>;

    /// Read one page of a partition.
    async fn query(&self, input: QueryInput) -> Result<QueryOutput, BackendError>;

    /// Apply many writes atomically.
    async fn transact_write_items(
        &self,
        input: TransactWriteItemsInput,
    ) -> Result<TransactWriteItemsOutput, BackendError>;
}

fn service_error<E, R>(error: SdkError<E, R>) -> BackendError
where
    E: ProvideErrorMetadata + error::Error + Send + Sync + 'static,
    R: fmt::Debug + Send + Sync + 'static,
{
    if error.code() == Some("ConditionalCheckFailedException") {
        BackendError::ConditionalCheckFailed
    } else {
        BackendError::service(error)
    }
}

fn transact_error<R>(error: SdkError<TransactWriteItemsError, R>) -> BackendError
where
    R: fmt::Debug + Send + Sync + 'static,
{
    if let Some(TransactWriteItemsError::TransactionCanceledException(canceled)) =
        error.as_service_error()
    {
        let conditional = canceled
            .cancellation_reasons()
            .iter()
            .any(|reason| reason.code() == Some("ConditionalCheckFailed"));
        if conditional {
            return BackendError::ConditionalCheckFailed;
        }
    }
    BackendError::service(error)
}

#[async_trait]
impl Backend for Client {
    async fn get_item(&self, input: GetItemInput) -> Result<GetItemOutput, BackendError> {
        Client::get_item(self)
            .set_consistent_read(input.consistent_read)
            .set_expression_attribute_names(input.expression_attribute_names)
            .set_key(input.key)
            .set_projection_expression(input.projection_expression)
            .set_return_consumed_capacity(input.return_consumed_capacity)
            .set_table_name(input.table_name)
            .send()
            .await
            .map_err(service_error)
    }

    async fn put_item(&self, input: PutItemInput) -> Result<PutItemOutput, BackendError> {
        Client::put_item(self)
            .set_condition_expression(input.condition_expression)
            .set_expression_attribute_names(input.expression_attribute_names)
            .set_expression_attribute_values(input.expression_attribute_values)
            .set_item(input.item)
            .set_return_consumed_capacity(input.return_consumed_capacity)
            .set_return_values(input.return_values)
            .set_table_name(input.table_name)
            .send()
            .await
            .map_err(service_error)
    }

    async fn delete_item(&self, input: DeleteItemInput) -> Result<DeleteItemOutput, BackendError> {
        Client::delete_item(self)
            .set_condition_expression(input.condition_expression)
            .set_expression_attribute_names(input.expression_attribute_names)
            .set_expression_attribute_values(input.expression_attribute_values)
            .set_key(input.key)
            .set_return_consumed_capacity(input.return_consumed_capacity)
            .set_return_values(input.return_values)
            .set_table_name(input.table_name)
            .send()
            .await
            .map_err(service_error)
    }

    async fn batch_get_item(
        &self,
        input: BatchGetItemInput,
    ) -> Result<BatchGetItemOutput, BackendError> {
        Client::batch_get_item(self)
            .set_request_items(input.request_items)
            .set_return_consumed_capacity(input.return_consumed_capacity)
            .send()
            .await
            .map_err(service_error)
    }

    async fn batch_write_item(
        &self,
        input: BatchWriteItemInput,
    ) -> Result<BatchWriteItemOutput, BackendError> {
        Client::batch_write_item(self)
            .set_request_items(input.request_items)
            .set_return_consumed_capacity(input.return_consumed_capacity)
            .set_return_item_collection_metrics(input.return_item_collection_metrics)
            .send()
            .await
            .map_err(service_error)
    }

    async fn query(&self, input: QueryInput) -> Result<QueryOutput, BackendError> {
        Client::query(self)
            .set_consistent_read(input.consistent_read)
            .set_exclusive_start_key(input.exclusive_start_key)
            .set_expression_attribute_names(input.expression_attribute_names)
            .set_expression_attribute_values(input.expression_attribute_values)
            .set_filter_expression(input.filter_expression)
            .set_index_name(input.index_name)
            .set_key_condition_expression(input.key_condition_expression)
            .set_limit(input.limit)
            .set_projection_expression(input.projection_expression)
            .set_return_consumed_capacity(input.return_consumed_capacity)
            .set_scan_index_forward(input.scan_index_forward)
            .set_select(input.select)
            .set_table_name(input.table_name)
            .send()
            .await
            .map_err(service_error)
    }

    async fn transact_write_items(
        &self,
        input: TransactWriteItemsInput,
    ) -> Result<TransactWriteItemsOutput, BackendError> {
        Client::transact_write_items(self)
            .set_client_request_token(input.client_request_token)
            .set_return_consumed_capacity(input.return_consumed_capacity)
            .set_return_item_collection_metrics(input.return_item_collection_metrics)
            .set_transact_items(input.transact_items)
            .send()
            .await
            .map_err(transact_error)
    }
}
