#![deny(missing_docs)]

//! # DynamoDB Table
//!
//! Typed table and index clients for Amazon DynamoDB.
//!
//! ## Overview
//!
//! A [`table::TableClient`] binds a backend, a table name and a
//! [`common::key::PrimaryKeyDefinition`] to an item type, and provides:
//! - Point reads and writes, with `insert` / `update` guarded by key absence / presence
//! - Batch reads, writes and deletes in a single backend round trip
//! - Transactional write directives that can be combined across tables
//! - Queries that either fetch a whole partition or page through it with opaque cursors
//!
//! An [`index::IndexClient`] offers the query operations over a secondary index.
//!
//! ## Quick Example
//!
//! ```no_run
//! use aws_sdk_dynamodb::Client;
//! use dynamodb_table::{
//!     common::{condition::SortKeyCondition, key::PrimaryKeyDefinition},
//!     table::{QueryOptions, TableClient},
//! };
//! use serde::{Deserialize, Serialize};
//! use std::sync::Arc;
//!
//! #[derive(Deserialize, Serialize)]
//! struct Event {
//!     tenant: String,
//!     seq: i64,
//!     body: String,
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! # let client = Client::from_conf(aws_sdk_dynamodb::config::Config::builder().build());
//! let events: TableClient<Event, String, i64> =
//!     TableClient::new(Arc::new(client), "events", PrimaryKeyDefinition::new("tenant", "seq"));
//!
//! // fails with a conditional check error when the key is taken
//! events
//!     .insert(&Event { tenant: "t1".to_string(), seq: 1, body: "created".to_string() })
//!     .await?;
//!
//! // one page at a time, resuming with the returned cursor
//! let mut cursor = None;
//! loop {
//!     let page = events
//!         .query_page(
//!             "t1".to_string(),
//!             Some(SortKeyCondition::GreaterThan(0)),
//!             cursor.as_deref(),
//!             100,
//!             QueryOptions::default(),
//!         )
//!         .await?;
//!     cursor = page.next_cursor;
//!     if cursor.is_none() {
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`mod@backend`] - The storage backend seam and an in-process implementation
//! - [`mod@common`] - Keys, cursors, key conditions and projections
//! - [`mod@config`] - Client configuration
//! - [`mod@error`] - Error kinds returned by every operation
//! - [`mod@index`] - Query-only client over a secondary index
//! - [`mod@table`] - Typed client over a table

pub mod backend;

/// Keys, cursors, key conditions and projections.
pub mod common;

pub mod config;

pub mod error;

pub mod index;

/// Internal request builders for read operations.
pub(crate) mod read;

pub mod table;

/// Internal request builders for write operations.
pub(crate) mod write;
