use crate::{common, read};

use aws_sdk_dynamodb::{error::BuildError, operation::batch_get_item::BatchGetItemInput, types};
use std::collections;

/// batch get item request, all keys from one table
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct BatchGetItem {
    pub(crate) keys: Vec<common::Item>,
    pub(crate) read_args: read::common::ReadArgs,
}

impl TryFrom<BatchGetItem> for BatchGetItemInput {
    type Error = BuildError;

    fn try_from(batch_get_item: BatchGetItem) -> Result<Self, BuildError> {
        let keys_and_attributes = types::KeysAndAttributes::builder()
            .set_consistent_read(batch_get_item.read_args.consistent_read)
            .set_keys(Some(batch_get_item.keys))
            .build()?;
        Self::builder()
            .set_request_items(Some(collections::HashMap::from([(
                batch_get_item.read_args.table_name,
                keys_and_attributes,
            )])))
            .build()
    }
}
