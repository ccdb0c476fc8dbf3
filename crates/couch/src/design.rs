//! Design documents and the aggregation-view synchronizer.
//!
//! Views are declared in code as [`ViewDefinition`] constants and pushed
//! into the store by [`CouchClient::ensure_views`]. Each definition
//! carries a structural version tag (a digest of its whitespace-normalized
//! sources) that is stored alongside the view; synchronization compares
//! tags instead of raw source strings, so reformatting a function body
//! does not force a rewrite.
//!
//! Synchronization is best-effort by design: log ingestion must never fail
//! because an aggregation view is out of date, so failures here are logged
//! and absorbed rather than returned to the caller.

use std::collections::BTreeMap;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use geodirect_core::hashing::sha256_hex;

use crate::client::{read_response, CouchClient};
use crate::error::{classify_status, CouchError};

// ---------------------------------------------------------------------------
// ViewDefinition
// ---------------------------------------------------------------------------

/// A code-declared map/reduce view.
///
/// The source strings are JavaScript function bodies executed by CouchDB;
/// they are compiled into the binary as constants so the declared and
/// deployed definitions can never drift silently.
#[derive(Debug, Clone, Copy)]
pub struct ViewDefinition {
    /// Design document that contains the view.
    pub design_doc: &'static str,
    /// View name within the design document.
    pub name: &'static str,
    /// Map function source.
    pub map: &'static str,
    /// Reduce function source, when the view aggregates.
    pub reduce: Option<&'static str>,
}

impl ViewDefinition {
    /// Structural version tag for this definition.
    ///
    /// A SHA-256 digest of the whitespace-normalized map and reduce
    /// sources. Two definitions that differ only in formatting share a
    /// tag; any semantic edit produces a new one.
    pub fn version_tag(&self) -> String {
        let mut normalized = normalize_source(self.map);
        if let Some(reduce) = self.reduce {
            normalized.push('\n');
            normalized.push_str(&normalize_source(reduce));
        }
        sha256_hex(normalized.as_bytes())
    }
}

/// Collapse every whitespace run to a single space and trim the ends.
fn normalize_source(source: &str) -> String {
    source.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// DesignDocument
// ---------------------------------------------------------------------------

/// Stored view source pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewSource {
    /// Map function source.
    pub map: String,
    /// Reduce function source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reduce: Option<String>,
}

/// The store's container for server-side aggregation definitions.
///
/// Matches CouchDB's design-document shape, extended with a `versions`
/// map recording the structural tag each view was written with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesignDocument {
    /// Reserved id, always `_design/{name}`.
    #[serde(rename = "_id")]
    pub id: String,

    /// Current revision, absent until first written.
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,

    /// View language; CouchDB defaults to JavaScript.
    pub language: String,

    /// Views keyed by name.
    #[serde(default)]
    pub views: BTreeMap<String, ViewSource>,

    /// Structural version tag per view.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub versions: BTreeMap<String, String>,
}

impl DesignDocument {
    /// A fresh, empty container for the named design document.
    ///
    /// Used when the stored document does not exist yet; absence is part
    /// of the normal synchronization flow, not an error.
    pub fn empty(name: &str) -> Self {
        Self {
            id: format!("_design/{name}"),
            rev: None,
            language: "javascript".to_string(),
            views: BTreeMap::new(),
            versions: BTreeMap::new(),
        }
    }
}

/// Merge one declared view into a design document.
///
/// Returns `true` when the document changed: the view is new, was written
/// without a version tag, or its tag no longer matches the declaration.
pub fn apply_view(doc: &mut DesignDocument, definition: &ViewDefinition) -> bool {
    let tag = definition.version_tag();

    let up_to_date =
        doc.views.contains_key(definition.name) && doc.versions.get(definition.name) == Some(&tag);
    if up_to_date {
        return false;
    }

    doc.views.insert(
        definition.name.to_string(),
        ViewSource {
            map: definition.map.to_string(),
            reduce: definition.reduce.map(str::to_string),
        },
    );
    doc.versions.insert(definition.name.to_string(), tag);
    true
}

// ---------------------------------------------------------------------------
// Synchronizer
// ---------------------------------------------------------------------------

impl CouchClient {
    /// Ensure the declared views exist in `database` and match their
    /// declarations.
    ///
    /// Definitions are grouped by design document; each group is fetched,
    /// merged and written back only when something changed, so repeated
    /// calls with unchanged definitions perform zero writes. A failure on
    /// one design document is logged and does not abort the others, nor
    /// the caller's primary operation; the aggregation layer degrades to
    /// stale counts rather than blocking writes.
    ///
    /// Returns the number of design documents written.
    pub async fn ensure_views(&self, database: &str, definitions: &[ViewDefinition]) -> usize {
        let mut groups: Vec<(&str, Vec<&ViewDefinition>)> = Vec::new();
        for definition in definitions {
            match groups.iter().position(|(name, _)| *name == definition.design_doc) {
                Some(i) => groups[i].1.push(definition),
                None => groups.push((definition.design_doc, vec![definition])),
            }
        }

        let mut writes = 0;
        for (design_doc, group) in groups {
            match self.sync_design_doc(database, design_doc, &group).await {
                Ok(true) => {
                    tracing::info!(database, design_doc, "Synchronized aggregation views");
                    writes += 1;
                }
                Ok(false) => {
                    tracing::debug!(database, design_doc, "Aggregation views already current");
                }
                Err(e) => {
                    tracing::error!(
                        database,
                        design_doc,
                        error = %e,
                        "Failed to synchronize aggregation views"
                    );
                }
            }
        }
        writes
    }

    /// Fetch, merge and (when changed) write back one design document.
    async fn sync_design_doc(
        &self,
        database: &str,
        design_doc: &str,
        definitions: &[&ViewDefinition],
    ) -> Result<bool, CouchError> {
        let url = format!("{}/{}/_design/{}", self.base_url, database, design_doc);

        let response = self.client.get(&url).send().await?;
        let (status, body) = read_response(response).await?;

        let mut doc = match status {
            s if s.is_success() => serde_json::from_str(&body)?,
            StatusCode::NOT_FOUND => DesignDocument::empty(design_doc),
            s => return Err(classify_status(s, database, design_doc, body)),
        };

        let mut changed = false;
        for definition in definitions.iter().copied() {
            changed |= apply_view(&mut doc, definition);
        }
        if !changed {
            return Ok(false);
        }

        let response = self.client.put(&url).json(&doc).send().await?;
        let (status, body) = read_response(response).await?;

        if !status.is_success() {
            return Err(classify_status(status, database, design_doc, body));
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COUNTING_VIEW: ViewDefinition = ViewDefinition {
        design_doc: "list",
        name: "count-by-timestamp",
        map: "function (doc) { emit(doc.timestamp); }",
        reduce: Some(
            "function (keys, values, rereduce) { if (rereduce) { return sum(values); } return values.length; }",
        ),
    };

    #[test]
    fn version_tag_ignores_formatting() {
        let reformatted = ViewDefinition {
            map: "function (doc) {\n    emit(doc.timestamp);\n}",
            ..COUNTING_VIEW
        };
        assert_eq!(COUNTING_VIEW.version_tag(), reformatted.version_tag());
    }

    #[test]
    fn version_tag_tracks_semantic_edits() {
        let edited = ViewDefinition {
            map: "function (doc) { emit(doc.geodirect_id); }",
            ..COUNTING_VIEW
        };
        assert_ne!(COUNTING_VIEW.version_tag(), edited.version_tag());
    }

    #[test]
    fn fresh_design_doc_uses_reserved_id_and_javascript() {
        let doc = DesignDocument::empty("list");
        assert_eq!(doc.id, "_design/list");
        assert_eq!(doc.language, "javascript");
        assert!(doc.rev.is_none());
        assert!(doc.views.is_empty());
    }

    #[test]
    fn apply_view_writes_once_then_settles() {
        let mut doc = DesignDocument::empty("list");

        assert!(apply_view(&mut doc, &COUNTING_VIEW));
        assert!(!apply_view(&mut doc, &COUNTING_VIEW));

        let stored = &doc.views["count-by-timestamp"];
        assert_eq!(stored.map, COUNTING_VIEW.map);
        assert_eq!(stored.reduce.as_deref(), COUNTING_VIEW.reduce);
    }

    #[test]
    fn apply_view_rewrites_untagged_views() {
        let mut doc = DesignDocument::empty("list");
        apply_view(&mut doc, &COUNTING_VIEW);

        // A document written before version tagging existed.
        doc.versions.clear();

        assert!(apply_view(&mut doc, &COUNTING_VIEW));
    }

    #[test]
    fn design_doc_round_trips_through_json() {
        let mut doc = DesignDocument::empty("list");
        apply_view(&mut doc, &COUNTING_VIEW);

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["_id"], "_design/list");
        assert!(json.get("_rev").is_none());

        let mut parsed: DesignDocument = serde_json::from_value(json).unwrap();
        assert!(!apply_view(&mut parsed, &COUNTING_VIEW));
    }
}
