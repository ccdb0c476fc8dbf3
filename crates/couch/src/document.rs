//! Document metadata contract.

use serde::Deserialize;

/// Access to the reserved CouchDB `_id`/`_rev` fields of a persisted type.
///
/// Write operations strip the metadata before sending (the target id and
/// revision travel in the URL) and merge the server-assigned values back
/// into the returned document, mirroring CouchDB's own write responses.
pub trait CouchDocument {
    /// The document's database id, if it has been persisted.
    fn document_id(&self) -> Option<&str>;

    /// The document's current revision token, if known.
    fn revision(&self) -> Option<&str>;

    /// Replace the id/revision pair after a successful write.
    fn set_document_meta(&mut self, id: String, rev: String);

    /// Drop the id/revision pair before a write body is serialized.
    fn clear_document_meta(&mut self);
}

/// Envelope CouchDB returns from document writes.
///
/// Write requests do not echo the document itself, only the assigned id
/// and the fresh revision.
#[derive(Debug, Deserialize)]
pub struct WriteResponse {
    /// Whether the write was accepted.
    #[serde(default)]
    pub ok: bool,
    /// Id of the written document.
    pub id: String,
    /// Revision assigned by this write.
    pub rev: String,
}
