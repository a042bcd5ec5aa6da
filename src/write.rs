//! Write requests built by the table client.
//!
//! Puts, deletes, batch writes, and the transactional write directives handed back to
//! callers by the `prepare_transact_*` operations.

/// Batch write item request.
pub(crate) mod batch_write_item;

/// Arguments shared by write requests.
pub(crate) mod common;

/// Delete item request.
pub(crate) mod delete_item;

/// Put item request.
pub(crate) mod put_item;

/// Transactional write directives.
pub(crate) mod transact;
