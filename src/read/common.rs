/// Arguments shared by read requests.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct ReadArgs {
    /// `true` for strongly consistent reads, `None` for the backend default.
    pub(crate) consistent_read: Option<bool>,
    /// Secondary index to read from, `None` for the base table.
    pub(crate) index_name: Option<String>,
    pub(crate) table_name: String,
}

impl ReadArgs {
    pub(crate) fn new(table_name: &str, index_name: Option<&str>, consistent_read: Option<bool>) -> Self {
        Self {
            consistent_read,
            index_name: index_name.map(str::to_string),
            table_name: table_name.to_string(),
        }
    }
}
