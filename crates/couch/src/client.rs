//! Server and database handles for the CouchDB HTTP API.
//!
//! [`CouchClient`] holds the base URL and the shared connection pool for
//! one CouchDB server and provides the provisioning operations. Typed
//! per-database handles are created with [`CouchClient::database`].

use std::marker::PhantomData;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::document::{CouchDocument, WriteResponse};
use crate::error::{classify_status, CouchError};
use crate::options::{FindQuery, ViewOptions};

// ---------------------------------------------------------------------------
// CouchClient
// ---------------------------------------------------------------------------

/// Handle for one CouchDB server.
///
/// Cheap to clone; all clones share the same underlying connection pool.
#[derive(Clone)]
pub struct CouchClient {
    pub(crate) client: reqwest::Client,
    pub(crate) base_url: String,
}

/// Subset of the CouchDB server greeting (`GET /`).
#[derive(Debug, Deserialize)]
pub struct ServerInfo {
    /// Server version string, e.g. `"3.3.2"`.
    pub version: String,
}

impl ServerInfo {
    /// The leading component of the version string, when parseable.
    pub fn major_version(&self) -> Option<u32> {
        self.version.split('.').next()?.parse().ok()
    }
}

impl CouchClient {
    /// Create a client for the server at `base_url`.
    ///
    /// * `base_url` - e.g. `http://localhost:5984`; a trailing slash is
    ///   stripped so URL building stays uniform.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    /// Create a client reusing an existing [`reqwest::Client`]
    /// (useful for sharing one connection pool across services).
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { client, base_url }
    }

    /// Base URL of the server this client talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the server greeting.
    ///
    /// Callers use the reported version to warn when the server predates
    /// CouchDB 2.0 (Mango queries and `_find` need 2.x or later).
    pub async fn ping(&self) -> Result<ServerInfo, CouchError> {
        let response = self.client.get(&self.base_url).send().await?;
        let (status, body) = read_response(response).await?;

        if !status.is_success() {
            return Err(classify_status(status, "/", "", body));
        }

        Ok(serde_json::from_str(&body)?)
    }

    /// Create a database if it does not already exist.
    ///
    /// CouchDB answers `412 Precondition Failed` when the database is
    /// already there; that is success for provisioning purposes.
    pub async fn ensure_database(&self, name: &str) -> Result<(), CouchError> {
        let url = format!("{}/{}", self.base_url, name);
        let response = self.client.put(&url).send().await?;
        let (status, body) = read_response(response).await?;

        match database_created(status) {
            Some(true) => {
                tracing::info!(database = name, "Created database");
                Ok(())
            }
            Some(false) => {
                tracing::debug!(database = name, "Database already exists");
                Ok(())
            }
            None => Err(classify_status(status, name, "", body)),
        }
    }

    /// Create a Mango index over the given fields.
    ///
    /// CouchDB reports `"exists"` for an index that is already present;
    /// both outcomes are success here.
    pub async fn create_index(
        &self,
        database: &str,
        fields: &[&str],
        name: &str,
    ) -> Result<(), CouchError> {
        let url = format!("{}/{}/_index", self.base_url, database);
        let body = serde_json::json!({
            "index": { "fields": fields },
            "name": name,
        });

        let response = self.client.post(&url).json(&body).send().await?;
        let (status, body) = read_response(response).await?;

        if !status.is_success() {
            return Err(classify_status(status, database, name, body));
        }

        tracing::debug!(database, index = name, "Mango index ensured");
        Ok(())
    }

    /// Create a typed handle for one named database.
    pub fn database<T>(&self, name: &str) -> Database<T> {
        Database {
            client: self.client.clone(),
            url: format!("{}/{}", self.base_url, name),
            name: name.to_string(),
            _marker: PhantomData,
        }
    }
}

// ---------------------------------------------------------------------------
// Database
// ---------------------------------------------------------------------------

/// Typed handle for one CouchDB database.
///
/// All operations target the database the handle was created for. Writes
/// use revision-based optimistic concurrency: an `update` or `delete`
/// with a stale revision fails with [`CouchError::Conflict`] and is never
/// retried here.
pub struct Database<T> {
    client: reqwest::Client,
    url: String,
    name: String,
    _marker: PhantomData<T>,
}

/// Response to a view query.
#[derive(Debug, Deserialize)]
pub struct ViewResponse {
    /// Total emitted rows in the view (absent on reduced queries).
    #[serde(default)]
    pub total_rows: Option<u64>,
    /// Offset of the first returned row (absent on reduced queries).
    #[serde(default)]
    pub offset: Option<u64>,
    /// The returned rows.
    #[serde(default)]
    pub rows: Vec<ViewRow>,
}

/// One row of a view query result.
#[derive(Debug, Deserialize)]
pub struct ViewRow {
    /// Source document id (absent on reduced rows).
    #[serde(default)]
    pub id: Option<String>,
    /// Emitted key, or the group key on reduced rows (null when ungrouped).
    #[serde(default)]
    pub key: serde_json::Value,
    /// Emitted value, or the reduction result.
    pub value: serde_json::Value,
}

/// Response body of a `_find` query.
#[derive(Debug, Deserialize)]
struct FindResponse<T> {
    docs: Vec<T>,
    #[serde(default)]
    warning: Option<String>,
}

impl<T> Database<T>
where
    T: CouchDocument + Serialize + DeserializeOwned,
{
    /// Name of the database this handle targets.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn document_url(&self, id: &str) -> String {
        format!("{}/{}", self.url, id)
    }

    /// Fetch a document by id at its current revision.
    pub async fn get(&self, id: &str) -> Result<T, CouchError> {
        let response = self.client.get(self.document_url(id)).send().await?;
        self.parse_document(id, response).await
    }

    /// Fetch a specific revision of a document.
    ///
    /// The revision is advisory; CouchDB only keeps old revisions until
    /// the next compaction.
    pub async fn get_rev(&self, id: &str, rev: &str) -> Result<T, CouchError> {
        let response = self
            .client
            .get(self.document_url(id))
            .query(&[("rev", rev)])
            .send()
            .await?;
        self.parse_document(id, response).await
    }

    /// Create a document, letting the server assign the id when absent.
    ///
    /// Returns the document with the assigned `_id`/`_rev` merged in.
    /// Supplying an id that already exists fails with
    /// [`CouchError::Conflict`].
    pub async fn create(&self, mut doc: T) -> Result<T, CouchError> {
        let response = self.client.post(&self.url).json(&doc).send().await?;
        let (status, body) = read_response(response).await?;

        if !status.is_success() {
            let id = doc.document_id().unwrap_or("").to_string();
            return Err(classify_status(status, &self.name, &id, body));
        }

        let written: WriteResponse = serde_json::from_str(&body)?;
        doc.set_document_meta(written.id, written.rev);
        Ok(doc)
    }

    /// Replace a document, guarded by its expected current revision.
    ///
    /// Fails with [`CouchError::Conflict`] when `expected_rev` is stale
    /// (lost-update prevention); the caller decides whether re-fetching
    /// and retrying is safe.
    pub async fn update(&self, id: &str, mut doc: T, expected_rev: &str) -> Result<T, CouchError> {
        // The target id and revision travel in the URL; stale metadata in
        // the body would shadow them.
        doc.clear_document_meta();

        let response = self
            .client
            .put(self.document_url(id))
            .query(&[("rev", expected_rev)])
            .json(&doc)
            .send()
            .await?;
        let (status, body) = read_response(response).await?;

        if !status.is_success() {
            return Err(classify_status(status, &self.name, id, body));
        }

        let written: WriteResponse = serde_json::from_str(&body)?;
        doc.set_document_meta(written.id, written.rev);
        Ok(doc)
    }

    /// Delete a document, guarded by its expected current revision.
    pub async fn delete(&self, id: &str, expected_rev: &str) -> Result<(), CouchError> {
        let response = self
            .client
            .delete(self.document_url(id))
            .query(&[("rev", expected_rev)])
            .send()
            .await?;
        let (status, body) = read_response(response).await?;

        if !status.is_success() {
            return Err(classify_status(status, &self.name, id, body));
        }

        Ok(())
    }

    /// Whether a document with the given id exists.
    pub async fn exists(&self, id: &str) -> Result<bool, CouchError> {
        let response = self.client.head(self.document_url(id)).send().await?;
        let status = response.status();

        match status {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s => Err(classify_status(s, &self.name, id, String::new())),
        }
    }

    /// Run a Mango `_find` query and return the matching documents.
    pub async fn find(&self, query: &FindQuery) -> Result<Vec<T>, CouchError> {
        let url = format!("{}/_find", self.url);
        let response = self.client.post(&url).json(query).send().await?;
        let (status, body) = read_response(response).await?;

        if !status.is_success() {
            return Err(classify_status(status, &self.name, "_find", body));
        }

        let found: FindResponse<T> = serde_json::from_str(&body)?;
        if let Some(warning) = found.warning {
            tracing::warn!(database = %self.name, warning = %warning, "CouchDB _find warning");
        }

        Ok(found.docs)
    }

    /// Query a view for its raw emitted rows (`reduce=false`).
    pub async fn view_rows(
        &self,
        design_doc: &str,
        view: &str,
        options: ViewOptions,
    ) -> Result<ViewResponse, CouchError> {
        self.query_view(design_doc, view, options, false).await
    }

    /// Query a view through its reduce function (`reduce=true`).
    ///
    /// Without `group`/`group_level` the result collapses to a single
    /// aggregate row across all keys; callers wanting per-key totals must
    /// request grouping explicitly, so the ungrouped form is flagged.
    pub async fn reduced_view(
        &self,
        design_doc: &str,
        view: &str,
        options: ViewOptions,
    ) -> Result<ViewResponse, CouchError> {
        if !options.is_grouped() {
            tracing::debug!(
                database = %self.name,
                view,
                "Reduced view query without grouping collapses to a single aggregate"
            );
        }

        self.query_view(design_doc, view, options, true).await
    }

    async fn query_view(
        &self,
        design_doc: &str,
        view: &str,
        options: ViewOptions,
        reduce: bool,
    ) -> Result<ViewResponse, CouchError> {
        let url = format!("{}/_design/{}/_view/{}", self.url, design_doc, view);
        let response = self
            .client
            .get(&url)
            .query(&options.to_query_pairs(reduce))
            .send()
            .await?;
        let (status, body) = read_response(response).await?;

        if !status.is_success() {
            return Err(classify_status(status, &self.name, view, body));
        }

        Ok(serde_json::from_str(&body)?)
    }

    async fn parse_document(&self, id: &str, response: reqwest::Response) -> Result<T, CouchError> {
        let (status, body) = read_response(response).await?;

        if !status.is_success() {
            return Err(classify_status(status, &self.name, id, body));
        }

        Ok(serde_json::from_str(&body)?)
    }
}

/// Drain a response into its status and body text.
pub(crate) async fn read_response(
    response: reqwest::Response,
) -> Result<(StatusCode, String), CouchError> {
    let status = response.status();
    let body = response.text().await?;
    Ok((status, body))
}

/// Interpret a database-creation status.
///
/// `Some(true)` means freshly created, `Some(false)` means it already
/// existed (also success), `None` means the request failed.
fn database_created(status: StatusCode) -> Option<bool> {
    if status.is_success() {
        Some(true)
    } else if status == StatusCode::PRECONDITION_FAILED {
        Some(false)
    } else {
        None
    }
}
