use crate::common;

use indexmap::IndexSet;
use serde::de::{self, Deserializer, Visitor};
use std::collections;

/// Attributes fetched by queries.
///
/// Derived from the item type with [`Projection::of`], so that a query fetches exactly the
/// attributes the item declares. An empty projection fetches every attribute.
///
/// ```rust
/// use dynamodb_table::common::projection;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Event {
///     tenant: String,
///     seq: i64,
///     #[serde(rename = "body")]
///     payload: String,
/// }
///
/// let projection = projection::Projection::of::<Event>();
/// assert_eq!(
///     projection.attributes().collect::<Vec<_>>(),
///     vec!["tenant", "seq", "body"],
/// );
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Projection {
    attributes: IndexSet<String>,
}

impl Projection {
    /// Projection over the given attribute names, in order, without duplicates.
    pub fn new<I, T>(attributes: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            attributes: attributes.into_iter().map(Into::into).collect(),
        }
    }

    /// Projection over the serialized field names of a struct item type.
    ///
    /// Empty when `E` does not deserialize from a plain struct (maps, flattened fields).
    pub fn of<E: de::DeserializeOwned>() -> Self {
        let mut fields: &'static [&'static str] = &[];
        // always fails: only the field list is of interest
        let _ = E::deserialize(FieldNames(&mut fields));
        Self::new(fields.iter().copied())
    }

    /// The projected attribute names.
    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(String::as_str)
    }

    /// Whether every attribute is fetched.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub(crate) fn to_expression(&self) -> Option<common::ExpressionInput> {
        if self.attributes.is_empty() {
            return None;
        }
        let mut expression_attribute_names = collections::HashMap::with_capacity(self.attributes.len());
        let mut placeholders = Vec::with_capacity(self.attributes.len());
        for attribute in &self.attributes {
            let placeholder = common::placeholder(attribute);
            placeholders.push(placeholder.clone());
            expression_attribute_names.insert(placeholder, attribute.clone());
        }
        Some(common::ExpressionInput {
            expression: placeholders.join(", "),
            expression_attribute_names,
            ..Default::default()
        })
    }
}

/// Deserializer that records the field list of the struct asked for, then fails.
struct FieldNames<'a>(&'a mut &'static [&'static str]);

impl<'de> Deserializer<'de> for FieldNames<'_> {
    type Error = de::value::Error;

    fn deserialize_any<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Self::Error> {
        Err(de::Error::custom("not a struct"))
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        _visitor: V,
    ) -> Result<V::Value, Self::Error> {
        *self.0 = fields;
        Err(de::Error::custom("field names recorded"))
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf option unit unit_struct newtype_struct seq tuple
        tuple_struct map enum identifier ignored_any
    }
}
