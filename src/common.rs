//! Common building blocks shared by table and index operations.
//!
//! This module holds the typed primary key model, the continuation cursor codec,
//! key conditions for queries, and the projection derived from an item type.

/// Key conditions for queries.
pub mod condition;

/// Continuation cursor codec.
pub mod cursor;

/// Typed primary key model.
pub mod key;

/// Attribute projection derived from the item type.
pub mod projection;

use aws_sdk_dynamodb::types;
use std::collections;

/// A backend item or key: attribute name to attribute value.
pub type Item = collections::HashMap<String, types::AttributeValue>;

pub(crate) fn placeholder(name: &str) -> String {
    format!("#{name}")
}

/// An expression together with the attribute names and values it references.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExpressionInput {
    pub(crate) expression: String,
    pub(crate) expression_attribute_names: collections::HashMap<String, String>,
    pub(crate) expression_attribute_values: collections::HashMap<String, types::AttributeValue>,
}

impl ExpressionInput {
    /// The expression text.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Placeholder to attribute name substitutions used by the expression.
    pub fn expression_attribute_names(&self) -> &collections::HashMap<String, String> {
        &self.expression_attribute_names
    }

    pub(crate) fn join(operator: &str, items: Vec<Self>) -> Self {
        let mut joined = Self::default();
        let mut expressions = Vec::with_capacity(items.len());
        for item in items {
            joined
                .expression_attribute_names
                .extend(item.expression_attribute_names);
            joined
                .expression_attribute_values
                .extend(item.expression_attribute_values);
            if !item.expression.is_empty() {
                expressions.push(item.expression);
            }
        }
        joined.expression = expressions.join(operator);
        joined
    }

    pub(crate) fn merge_into(
        self,
        names: &mut Option<collections::HashMap<String, String>>,
        values: &mut Option<collections::HashMap<String, types::AttributeValue>>,
    ) -> String {
        if !self.expression_attribute_names.is_empty() {
            names
                .get_or_insert_with(collections::HashMap::new)
                .extend(self.expression_attribute_names);
        }
        if !self.expression_attribute_values.is_empty() {
            values
                .get_or_insert_with(collections::HashMap::new)
                .extend(self.expression_attribute_values);
        }
        self.expression
    }
}
