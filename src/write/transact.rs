use crate::write;

use aws_sdk_dynamodb::{
    error::BuildError, operation::transact_write_items::TransactWriteItemsInput, types,
};

impl TryFrom<write::put_item::PutItem> for types::TransactWriteItem {
    type Error = BuildError;

    fn try_from(put_item: write::put_item::PutItem) -> Result<Self, BuildError> {
        let write_input: write::common::WriteInput = put_item.write_args.into();
        let builder = types::Put::builder().set_item(Some(put_item.item));
        let put = write::common::apply_write_input!(builder, write_input).build()?;
        Ok(Self::builder().put(put).build())
    }
}

impl TryFrom<write::delete_item::DeleteItem> for types::TransactWriteItem {
    type Error = BuildError;

    fn try_from(delete_item: write::delete_item::DeleteItem) -> Result<Self, BuildError> {
        let delete = types::Delete::builder()
            .set_key(Some(delete_item.key))
            .table_name(delete_item.table_name)
            .build()?;
        Ok(Self::builder().delete(delete).build())
    }
}

/// Submission of prepared transactional write directives.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct TransactWriteItems {
    pub(crate) items: Vec<types::TransactWriteItem>,
}

impl TryFrom<TransactWriteItems> for TransactWriteItemsInput {
    type Error = BuildError;

    fn try_from(transact_write_items: TransactWriteItems) -> Result<Self, BuildError> {
        Self::builder()
            .set_transact_items(Some(transact_write_items.items))
            .build()
    }
}
