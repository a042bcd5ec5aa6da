use crate::common;

/// Arguments shared by write requests.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct WriteArgs {
    /// Condition that must hold for the write to be applied.
    pub(crate) condition: Option<common::ExpressionInput>,
    pub(crate) table_name: String,
}

/// Resolved condition fields of a write request.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct WriteInput {
    pub(crate) condition_expression: Option<String>,
    pub(crate) expression_attribute_names: Option<std::collections::HashMap<String, String>>,
    pub(crate) expression_attribute_values: Option<common::Item>,
    pub(crate) table_name: String,
}

impl From<WriteArgs> for WriteInput {
    fn from(write_args: WriteArgs) -> Self {
        let mut expression_attribute_names = None;
        let mut expression_attribute_values = None;
        let condition_expression = write_args.condition.map(|condition| {
            condition.merge_into(
                &mut expression_attribute_names,
                &mut expression_attribute_values,
            )
        });
        Self {
            condition_expression,
            expression_attribute_names,
            expression_attribute_values,
            table_name: write_args.table_name,
        }
    }
}

/// apply resolved write condition fields to a builder
macro_rules! apply_write_input {
    ($builder:expr, $write_input:expr) => {
        $builder
            .set_condition_expression($write_input.condition_expression)
            .set_expression_attribute_names($write_input.expression_attribute_names)
            .set_expression_attribute_values($write_input.expression_attribute_values)
            .table_name($write_input.table_name)
    };
}

pub(crate) use apply_write_input;
