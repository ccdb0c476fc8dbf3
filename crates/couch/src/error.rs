//! Error taxonomy for the document store.

use reqwest::StatusCode;

/// Errors surfaced by the CouchDB client.
///
/// `NotFound` and `Conflict` are decisions for the immediate caller;
/// everything else means the store itself misbehaved.
#[derive(Debug, thiserror::Error)]
pub enum CouchError {
    /// No document with that id exists in the database.
    #[error("document {id} not found in {database}")]
    NotFound {
        /// Database the lookup ran against.
        database: String,
        /// Document id that was requested.
        id: String,
    },

    /// The supplied revision does not match the stored revision.
    ///
    /// Writers that read-then-write should re-fetch and decide whether
    /// retrying is safe; the client never retries on its own.
    #[error("revision conflict writing {id} in {database}")]
    Conflict {
        /// Database the write ran against.
        database: String,
        /// Document id the write targeted.
        id: String,
    },

    /// The store could not be reached, or answered with a 5xx.
    #[error("document store unavailable: {0}")]
    Unavailable(String),

    /// CouchDB answered with a status this client has no mapping for.
    #[error("unexpected CouchDB response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// A response body could not be decoded into the expected shape.
    #[error("failed to decode CouchDB response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<reqwest::Error> for CouchError {
    fn from(e: reqwest::Error) -> Self {
        CouchError::Unavailable(e.to_string())
    }
}

/// Map a non-success CouchDB status to the matching [`CouchError`].
///
/// `404` maps to [`CouchError::NotFound`] and `409` to
/// [`CouchError::Conflict`]; any 5xx is [`CouchError::Unavailable`].
pub(crate) fn classify_status(
    status: StatusCode,
    database: &str,
    id: &str,
    body: String,
) -> CouchError {
    match status {
        StatusCode::NOT_FOUND => CouchError::NotFound {
            database: database.to_string(),
            id: id.to_string(),
        },
        StatusCode::CONFLICT => CouchError::Conflict {
            database: database.to_string(),
            id: id.to_string(),
        },
        s if s.is_server_error() => {
            CouchError::Unavailable(format!("{database}: {} {body}", s.as_u16()))
        }
        s => CouchError::UnexpectedStatus {
            status: s.as_u16(),
            body,
        },
    }
}
