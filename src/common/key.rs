use crate::common::{self, cursor};

use aws_sdk_dynamodb::types;
use std::{collections, fmt, marker};

/// Backend attribute variant of a key attribute.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum KeyKind {
    /// String attribute (`S`).
    String,
    /// Number attribute (`N`), carried as a decimal string.
    Number,
}

mod sealed {
    pub trait Sealed {}
}

/// A type usable as a partition or sort key value: `String` or any integer primitive.
///
/// This trait is sealed.
pub trait KeyAttribute: sealed::Sealed + Clone + Default + fmt::Debug + Send + Sync + 'static {
    /// The attribute variant values of this type encode to.
    const KIND: KeyKind;

    /// Encode the value as a backend attribute value.
    fn to_attribute_value(&self) -> types::AttributeValue;
}

impl sealed::Sealed for String {}

impl KeyAttribute for String {
    const KIND: KeyKind = KeyKind::String;

    fn to_attribute_value(&self) -> types::AttributeValue {
        types::AttributeValue::S(self.clone())
    }
}

macro_rules! number_key_attribute {
    ($($ty:ty),* $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}

            impl KeyAttribute for $ty {
                const KIND: KeyKind = KeyKind::Number;

                fn to_attribute_value(&self) -> types::AttributeValue {
                    types::AttributeValue::N(self.to_string())
                }
            }
        )*
    };
}

number_key_attribute!(
    i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize,
);

/// A type usable as a sort key value: any [`KeyAttribute`], or [`NoSortKey`].
pub trait SortKeyAttribute: Clone + Default + fmt::Debug + Send + Sync + 'static {
    /// The attribute variant values of this type encode to, `None` for [`NoSortKey`].
    const KIND: Option<KeyKind>;

    /// Encode the value as a backend attribute value, `None` for [`NoSortKey`].
    fn to_sort_attribute_value(&self) -> Option<types::AttributeValue>;
}

impl<T: KeyAttribute> SortKeyAttribute for T {
    const KIND: Option<KeyKind> = Some(T::KIND);

    fn to_sort_attribute_value(&self) -> Option<types::AttributeValue> {
        Some(self.to_attribute_value())
    }
}

/// Sort key type of tables and indexes that have no sort key.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct NoSortKey;

impl SortKeyAttribute for NoSortKey {
    const KIND: Option<KeyKind> = None;

    fn to_sort_attribute_value(&self) -> Option<types::AttributeValue> {
        None
    }
}

/// Attribute name to attribute kind table of a key shape.
///
/// Used to restore attribute variants when decoding a continuation cursor.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Prototype(collections::HashMap<String, KeyKind>);

impl Prototype {
    /// The kind of the named attribute, if it belongs to the key shape.
    pub fn get(&self, name: &str) -> Option<KeyKind> {
        self.0.get(name).copied()
    }

    /// Names of the key attributes, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Number of key attributes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the prototype has no attributes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Add the attributes of `other` that are not already present.
    pub fn merge(&mut self, other: &Prototype) {
        for (name, kind) in &other.0 {
            self.0.entry(name.clone()).or_insert(*kind);
        }
    }

    fn insert(&mut self, name: String, kind: KeyKind) {
        self.0.insert(name, kind);
    }
}

/// Shape of a table or index primary key.
///
/// ```rust
/// use dynamodb_table::common::key;
///
/// let definition = key::PrimaryKeyDefinition::<String, i64>::new("tenant", "seq");
/// assert!(definition.has_sort_key());
///
/// let users = key::PrimaryKeyDefinition::<String>::partition_only("id");
/// assert!(!users.has_sort_key());
/// ```
#[derive(Clone, Debug)]
pub struct PrimaryKeyDefinition<P, S = NoSortKey> {
    partition_key_name: String,
    sort_key_name: String,
    prototype: Prototype,
    keys_absent: common::ExpressionInput,
    keys_present: common::ExpressionInput,
    _marker: marker::PhantomData<fn() -> (P, S)>,
}

impl<P: KeyAttribute> PrimaryKeyDefinition<P, NoSortKey> {
    /// Definition of a key without sort key.
    pub fn partition_only(partition_key_name: impl Into<String>) -> Self {
        Self::new(partition_key_name, String::new())
    }
}

impl<P: KeyAttribute, S: SortKeyAttribute> PrimaryKeyDefinition<P, S> {
    /// Create a definition. An empty `sort_key_name` means the key has no sort key.
    pub fn new(partition_key_name: impl Into<String>, sort_key_name: impl Into<String>) -> Self {
        let partition_key_name = partition_key_name.into();
        let sort_key_name = sort_key_name.into();
        let mut prototype = Prototype::default();
        prototype.insert(partition_key_name.clone(), P::KIND);
        let mut key_names = vec![partition_key_name.as_str()];
        if let Some(kind) = S::KIND.filter(|_| !sort_key_name.is_empty()) {
            prototype.insert(sort_key_name.clone(), kind);
            key_names.push(sort_key_name.as_str());
        }
        let keys_absent = Self::key_condition(&key_names, "attribute_not_exists");
        let keys_present = Self::key_condition(&key_names, "attribute_exists");
        Self {
            partition_key_name,
            sort_key_name,
            prototype,
            keys_absent,
            keys_present,
            _marker: marker::PhantomData,
        }
    }

    fn key_condition(key_names: &[&str], function: &str) -> common::ExpressionInput {
        let conditions = key_names
            .iter()
            .map(|name| {
                let placeholder = common::placeholder(name);
                common::ExpressionInput {
                    expression: format!("{function}({placeholder})"),
                    expression_attribute_names: collections::HashMap::from([(
                        placeholder,
                        name.to_string(),
                    )]),
                    ..Default::default()
                }
            })
            .collect();
        common::ExpressionInput::join(" AND ", conditions)
    }

    /// Name of the partition key attribute.
    pub fn partition_key_name(&self) -> &str {
        &self.partition_key_name
    }

    /// Name of the sort key attribute, empty when there is none.
    pub fn sort_key_name(&self) -> &str {
        &self.sort_key_name
    }

    /// Whether the key has a sort key.
    pub fn has_sort_key(&self) -> bool {
        !self.sort_key_name.is_empty() && S::KIND.is_some()
    }

    /// Attribute kinds of the key shape.
    pub fn prototype(&self) -> &Prototype {
        &self.prototype
    }

    /// Condition holding only when no item with the written key exists.
    pub fn keys_absent_condition(&self) -> &common::ExpressionInput {
        &self.keys_absent
    }

    /// Condition holding only when an item with the written key exists.
    pub fn keys_present_condition(&self) -> &common::ExpressionInput {
        &self.keys_present
    }

    /// Bind a key value to this definition.
    pub fn new_key(&self, partition: P, sort: S) -> PrimaryKey<'_, P, S> {
        PrimaryKey {
            partition,
            sort,
            definition: self,
        }
    }

    /// Bind parallel lists of key values to this definition.
    ///
    /// Without `sorts` every key gets the zero sort value.
    ///
    /// # Panics
    ///
    /// Panics when `sorts` is given with a length different from `partitions`.
    pub fn new_keys(&self, partitions: Vec<P>, sorts: Option<Vec<S>>) -> Vec<PrimaryKey<'_, P, S>> {
        match sorts {
            Some(sorts) => {
                assert_eq!(
                    partitions.len(),
                    sorts.len(),
                    "partition and sort key lists differ in length"
                );
                partitions
                    .into_iter()
                    .zip(sorts)
                    .map(|(partition, sort)| self.new_key(partition, sort))
                    .collect()
            }
            None => partitions
                .into_iter()
                .map(|partition| self.new_key(partition, S::default()))
                .collect(),
        }
    }

    /// Encode a sort value as `(attribute name, attribute value)`.
    ///
    /// # Panics
    ///
    /// Panics with `sort key is not defined` when a real sort value is given but the
    /// definition has no sort key.
    pub(crate) fn sort_attribute(&self, sort: &S) -> Option<(&str, types::AttributeValue)> {
        let value = sort.to_sort_attribute_value()?;
        assert!(self.has_sort_key(), "sort key is not defined");
        Some((self.sort_key_name.as_str(), value))
    }

    /// Encode a resume key as an opaque continuation cursor.
    pub fn encode_cursor(&self, key: &common::Item) -> Result<String, cursor::CursorError> {
        cursor::encode(key)
    }

    /// Decode a continuation cursor produced for this key shape.
    pub fn decode_cursor(&self, token: &str) -> Result<common::Item, cursor::CursorError> {
        cursor::decode(&self.prototype, token)
    }
}

/// A concrete key value bound to its [`PrimaryKeyDefinition`].
#[derive(Clone, Debug)]
pub struct PrimaryKey<'a, P, S> {
    /// Partition key value.
    pub partition: P,
    /// Sort key value.
    pub sort: S,
    definition: &'a PrimaryKeyDefinition<P, S>,
}

impl<P: KeyAttribute, S: SortKeyAttribute> PrimaryKey<'_, P, S> {
    /// The backend key map.
    ///
    /// # Panics
    ///
    /// Panics with `sort key is not defined` when a real sort value is bound to a
    /// definition without sort key.
    pub fn attribute_value(&self) -> common::Item {
        let mut attributes = common::Item::with_capacity(2);
        attributes.insert(
            self.definition.partition_key_name.clone(),
            self.partition.to_attribute_value(),
        );
        if let Some((name, value)) = self.definition.sort_attribute(&self.sort) {
            attributes.insert(name.to_string(), value);
        }
        attributes
    }
}
