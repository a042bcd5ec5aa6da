use crate::{common, read};

use aws_sdk_dynamodb::{error::BuildError, operation::get_item::GetItemInput};

/// get item request
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct GetItem {
    pub(crate) key: common::Item,
    pub(crate) read_args: read::common::ReadArgs,
}

impl TryFrom<GetItem> for GetItemInput {
    type Error = BuildError;

    fn try_from(get_item: GetItem) -> Result<Self, BuildError> {
        Self::builder()
            .set_consistent_read(get_item.read_args.consistent_read)
            .set_key(Some(get_item.key))
            .table_name(get_item.read_args.table_name)
            .build()
    }
}
