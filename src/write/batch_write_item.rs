use crate::common;

use aws_sdk_dynamodb::{
    error::BuildError, operation::batch_write_item::BatchWriteItemInput, types,
};
use std::collections;

/// A single request within a batch write.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum BatchWriteRequest {
    /// Remove the item with this key.
    Delete(common::Item),
    /// Create or replace this item.
    Put(common::Item),
}

impl TryFrom<BatchWriteRequest> for types::WriteRequest {
    type Error = BuildError;

    fn try_from(request: BatchWriteRequest) -> Result<Self, BuildError> {
        let builder = match request {
            BatchWriteRequest::Delete(key) => {
                let delete_request = types::DeleteRequest::builder().set_key(Some(key)).build()?;
                Self::builder().delete_request(delete_request)
            }
            BatchWriteRequest::Put(item) => {
                let put_request = types::PutRequest::builder().set_item(Some(item)).build()?;
                Self::builder().put_request(put_request)
            }
        };
        Ok(builder.build())
    }
}

/// batch write item request, all requests against one table
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct BatchWriteItem {
    pub(crate) requests: Vec<BatchWriteRequest>,
    pub(crate) table_name: String,
}

impl TryFrom<BatchWriteItem> for BatchWriteItemInput {
    type Error = BuildError;

    fn try_from(batch_write_item: BatchWriteItem) -> Result<Self, BuildError> {
        let requests = batch_write_item
            .requests
            .into_iter()
            .map(types::WriteRequest::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Self::builder()
            .set_request_items(Some(collections::HashMap::from([(
                batch_write_item.table_name,
                requests,
            )])))
            .build()
    }
}
