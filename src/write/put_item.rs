use crate::{common, write};

use aws_sdk_dynamodb::{error::BuildError, operation::put_item::PutItemInput};

/// put item request
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct PutItem {
    pub(crate) item: common::Item,
    pub(crate) write_args: write::common::WriteArgs,
}

impl TryFrom<PutItem> for PutItemInput {
    type Error = BuildError;

    fn try_from(put_item: PutItem) -> Result<Self, BuildError> {
        let write_input: write::common::WriteInput = put_item.write_args.into();
        let builder = Self::builder().set_item(Some(put_item.item));
        write::common::apply_write_input!(builder, write_input).build()
    }
}
