//! Read requests built by table and index clients.
//!
//! Each request type converts into the backend's input struct; the conversion is the only
//! place request fields are assembled, so it is what the tests pin down.

/// Batch get item request.
pub(crate) mod batch_get_item;

/// Arguments shared by read requests.
pub(crate) mod common;

/// Get item request.
pub(crate) mod get_item;

/// Query request.
pub(crate) mod query;
