use crate::common;

use aws_sdk_dynamodb::{error::BuildError, operation::delete_item::DeleteItemInput};

/// delete item request
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct DeleteItem {
    pub(crate) key: common::Item,
    pub(crate) table_name: String,
}

impl TryFrom<DeleteItem> for DeleteItemInput {
    type Error = BuildError;

    fn try_from(delete_item: DeleteItem) -> Result<Self, BuildError> {
        Self::builder()
            .set_key(Some(delete_item.key))
            .table_name(delete_item.table_name)
            .build()
    }
}
