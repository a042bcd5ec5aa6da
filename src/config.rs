//! Client configuration.

use serde::Deserialize;

/// Tuning applied to a [`crate::table::TableClient`] with
/// [`crate::table::TableClient::with_config`].
///
/// Deserializable so it can live next to the rest of an application's settings; missing
/// fields take their defaults.
///
/// ```rust
/// use dynamodb_table::config::TableConfig;
///
/// let config: TableConfig = serde_json::from_str(r#"{"max_query_pages": 8}"#).unwrap();
/// assert_eq!(config.query_page_size, 1024);
/// assert_eq!(config.max_query_pages, Some(8));
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct TableConfig {
    /// Read consistency used when a call does not choose one, `None` for the backend default.
    pub consistent_read: Option<bool>,
    /// Items requested per backend call by [`crate::table::TableClient::query`].
    pub query_page_size: i32,
    /// Upper bound on backend calls made by one `query`, `None` for unbounded.
    pub max_query_pages: Option<usize>,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            consistent_read: None,
            query_page_size: 1024,
            max_query_pages: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    #[rstest]
    #[case::empty("{}", TableConfig::default())]
    #[case::partial(
        r#"{"consistent_read": true}"#,
        TableConfig {
            consistent_read: Some(true),
            ..Default::default()
        }
    )]
    #[case::full(
        r#"{"consistent_read": false, "query_page_size": 10, "max_query_pages": 3}"#,
        TableConfig {
            consistent_read: Some(false),
            query_page_size: 10,
            max_query_pages: Some(3),
        }
    )]
    fn test_deserialize(#[case] input: &str, #[case] expected: TableConfig) {
        let actual: TableConfig = serde_json::from_str(input).unwrap();
        assert_eq!(actual, expected);
    }
}
