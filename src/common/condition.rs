use crate::common::{
    self,
    key::{KeyAttribute, PrimaryKeyDefinition, SortKeyAttribute},
};

use aws_sdk_dynamodb::types;
use std::collections;

/// Condition on the sort key of a query.
///
/// ```rust
/// use dynamodb_table::common::condition;
///
/// let recent: condition::SortKeyCondition<i64> = condition::SortKeyCondition::GreaterThan(100);
/// let range = condition::SortKeyCondition::Between(1, 10);
/// let prefix = condition::SortKeyCondition::BeginsWith("2024-".to_string());
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum SortKeyCondition<S> {
    /// Sort key begins with the given prefix (string sort keys only).
    BeginsWith(S),
    /// Sort key lies between two values, inclusive.
    Between(S, S),
    /// Sort key equals the value.
    Equals(S),
    /// Sort key is greater than the value.
    GreaterThan(S),
    /// Sort key is greater than or equal to the value.
    GreaterThanOrEqual(S),
    /// Sort key is less than the value.
    LessThan(S),
    /// Sort key is less than or equal to the value.
    LessThanOrEqual(S),
}

fn comparison(
    name: &str,
    operator: &str,
    suffix: &str,
    value: types::AttributeValue,
    index: &mut usize,
) -> common::ExpressionInput {
    let placeholder = common::placeholder(name);
    let value_placeholder = format!(":{name}_{suffix}{index}");
    *index += 1;
    common::ExpressionInput {
        expression: format!("{placeholder} {operator} {value_placeholder}"),
        expression_attribute_names: collections::HashMap::from([(placeholder, name.to_string())]),
        expression_attribute_values: collections::HashMap::from([(value_placeholder, value)]),
    }
}

impl<S: SortKeyAttribute> SortKeyCondition<S> {
    /// Build the sort key part of a key condition expression.
    ///
    /// `None` when the key shape has no sort key type ([`crate::common::key::NoSortKey`]).
    ///
    /// # Panics
    ///
    /// Panics when a real sort value is given but the definition has no sort key.
    pub(crate) fn to_expression<P: KeyAttribute>(
        &self,
        definition: &PrimaryKeyDefinition<P, S>,
        index: &mut usize,
    ) -> Option<common::ExpressionInput> {
        let operation = match self {
            Self::BeginsWith(prefix) => {
                let (name, value) = definition.sort_attribute(prefix)?;
                let placeholder = common::placeholder(name);
                let value_placeholder = format!(":{name}_begins_with{index}");
                *index += 1;
                common::ExpressionInput {
                    expression: format!("begins_with({placeholder}, {value_placeholder})"),
                    expression_attribute_names: collections::HashMap::from([(
                        placeholder,
                        name.to_string(),
                    )]),
                    expression_attribute_values: collections::HashMap::from([(
                        value_placeholder,
                        value,
                    )]),
                }
            }
            Self::Between(low, high) => {
                let (name, low) = definition.sort_attribute(low)?;
                let (_, high) = definition.sort_attribute(high)?;
                let placeholder = common::placeholder(name);
                let low_placeholder = format!(":{name}_between{index}");
                *index += 1;
                let high_placeholder = format!(":{name}_between{index}");
                *index += 1;
                common::ExpressionInput {
                    expression: format!(
                        "{placeholder} BETWEEN {low_placeholder} AND {high_placeholder}"
                    ),
                    expression_attribute_names: collections::HashMap::from([(
                        placeholder,
                        name.to_string(),
                    )]),
                    expression_attribute_values: collections::HashMap::from([
                        (low_placeholder, low),
                        (high_placeholder, high),
                    ]),
                }
            }
            Self::Equals(value) => {
                let (name, value) = definition.sort_attribute(value)?;
                comparison(name, "=", "eq", value, index)
            }
            Self::GreaterThan(value) => {
                let (name, value) = definition.sort_attribute(value)?;
                comparison(name, ">", "gt", value, index)
            }
            Self::GreaterThanOrEqual(value) => {
                let (name, value) = definition.sort_attribute(value)?;
                comparison(name, ">=", "gte", value, index)
            }
            Self::LessThan(value) => {
                let (name, value) = definition.sort_attribute(value)?;
                comparison(name, "<", "lt", value, index)
            }
            Self::LessThanOrEqual(value) => {
                let (name, value) = definition.sort_attribute(value)?;
                comparison(name, "<=", "lte", value, index)
            }
        };
        Some(operation)
    }
}

/// Key condition selecting one partition, optionally narrowed by the sort key.
pub(crate) fn key_condition<P: KeyAttribute, S: SortKeyAttribute>(
    definition: &PrimaryKeyDefinition<P, S>,
    partition: &P,
    sort: Option<&SortKeyCondition<S>>,
) -> common::ExpressionInput {
    let mut index = 0;
    let mut conditions = vec![comparison(
        definition.partition_key_name(),
        "=",
        "eq",
        partition.to_attribute_value(),
        &mut index,
    )];
    if let Some(condition) = sort.and_then(|sort| sort.to_expression(definition, &mut index)) {
        conditions.push(condition);
    }
    common::ExpressionInput::join(" AND ", conditions)
}
