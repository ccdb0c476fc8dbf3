//! CouchDB document store client.
//!
//! This crate wraps the CouchDB HTTP API behind two handles:
//!
//! - [`CouchClient`] — one per server; owns the shared [`reqwest::Client`]
//!   and the provisioning operations (database creation, Mango indexes,
//!   design-document synchronization).
//! - [`Database`] — a typed handle for one named database, providing CRUD
//!   with revision-based optimistic concurrency, Mango `_find` queries and
//!   map/reduce view queries.
//!
//! Conflicts (`409`) and missing documents (`404`) are surfaced as typed
//! errors for the caller to decide on; nothing in this crate retries
//! automatically.

pub mod client;
pub mod design;
pub mod document;
pub mod error;
pub mod options;

pub use client::{CouchClient, Database, ServerInfo, ViewResponse, ViewRow};
pub use design::{DesignDocument, ViewDefinition};
pub use document::CouchDocument;
pub use error::CouchError;
pub use options::{FindQuery, ViewOptions};
