use crate::{common, read};

use aws_sdk_dynamodb::{error::BuildError, operation::query::QueryInput};

/// query request for a single page
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Query {
    pub(crate) exclusive_start_key: Option<common::Item>,
    pub(crate) key_condition: common::ExpressionInput,
    pub(crate) limit: Option<i32>,
    pub(crate) projection: Option<common::ExpressionInput>,
    pub(crate) read_args: read::common::ReadArgs,
    /// `false` to read the partition in descending sort key order.
    pub(crate) scan_index_forward: Option<bool>,
}

impl TryFrom<Query> for QueryInput {
    type Error = BuildError;

    fn try_from(query: Query) -> Result<Self, BuildError> {
        let mut expression_attribute_names = None;
        let mut expression_attribute_values = None;
        let key_condition_expression = query.key_condition.merge_into(
            &mut expression_attribute_names,
            &mut expression_attribute_values,
        );
        let projection_expression = query.projection.map(|projection| {
            projection.merge_into(
                &mut expression_attribute_names,
                &mut expression_attribute_values,
            )
        });
        Self::builder()
            .set_consistent_read(query.read_args.consistent_read)
            .set_exclusive_start_key(query.exclusive_start_key)
            .set_expression_attribute_names(expression_attribute_names)
            .set_expression_attribute_values(expression_attribute_values)
            .set_index_name(query.read_args.index_name)
            .key_condition_expression(key_condition_expression)
            .set_limit(query.limit)
            .set_projection_expression(projection_expression)
            .set_scan_index_forward(query.scan_index_forward)
            .table_name(query.read_args.table_name)
            .build()
    }
}
