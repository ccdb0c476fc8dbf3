//! Query option types for `_find` and view requests.

use serde::Serialize;
use serde_json::Value;

// ---------------------------------------------------------------------------
// FindQuery
// ---------------------------------------------------------------------------

/// A Mango `_find` request body.
///
/// Built with [`FindQuery::selector`] plus the `with_*` methods:
///
/// ```rust
/// use geodirect_couch::FindQuery;
///
/// let query = FindQuery::selector(serde_json::json!({ "shop_id": 42 })).with_limit(50);
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct FindQuery {
    /// Mango selector predicate over indexed fields.
    pub selector: Value,

    /// Restrict returned documents to these fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,

    /// Sort specification, e.g. `[{"timestamp": "desc"}]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<Vec<Value>>,

    /// Maximum number of documents to return. CouchDB applies its own
    /// default when absent; there is no implicit pagination beyond this.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,

    /// Number of documents to skip.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<u64>,

    /// Name of the index to use instead of letting CouchDB choose.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_index: Option<String>,
}

impl FindQuery {
    /// Create a query with only the required selector.
    pub fn selector(selector: Value) -> Self {
        Self {
            selector,
            fields: None,
            sort: None,
            limit: None,
            skip: None,
            use_index: None,
        }
    }

    /// Cap the number of returned documents.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skip the first `skip` matching documents.
    pub fn with_skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Set the sort specification.
    pub fn with_sort(mut self, sort: Vec<Value>) -> Self {
        self.sort = Some(sort);
        self
    }
}

// ---------------------------------------------------------------------------
// ViewOptions
// ---------------------------------------------------------------------------

/// Options for a map/reduce view query.
///
/// Key bounds are JSON-encoded into the query string the way CouchDB
/// expects (`start_key=1488369600000`, `start_key="abc"`). Whether the
/// query runs reduced is decided by the calling operation, not here, so
/// the same options value can serve both forms.
#[derive(Debug, Default, Clone)]
pub struct ViewOptions {
    start_key: Option<Value>,
    end_key: Option<Value>,
    group: bool,
    group_level: Option<u32>,
    descending: bool,
    limit: Option<u64>,
    skip: Option<u64>,
}

impl ViewOptions {
    /// Lower key bound (inclusive).
    pub fn start_key(mut self, key: impl Into<Value>) -> Self {
        self.start_key = Some(key.into());
        self
    }

    /// Upper key bound (inclusive by CouchDB default).
    pub fn end_key(mut self, key: impl Into<Value>) -> Self {
        self.end_key = Some(key.into());
        self
    }

    /// Group reduced results by exact key.
    pub fn group(mut self) -> Self {
        self.group = true;
        self
    }

    /// Group reduced results by key prefix of the given length.
    pub fn group_level(mut self, level: u32) -> Self {
        self.group_level = Some(level);
        self
    }

    /// Return rows in descending key order.
    pub fn descending(mut self) -> Self {
        self.descending = true;
        self
    }

    /// Cap the number of returned rows.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skip the first `skip` rows.
    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Whether any grouping was requested.
    pub(crate) fn is_grouped(&self) -> bool {
        self.group || self.group_level.is_some()
    }

    /// Render the query-string pairs for this request.
    ///
    /// `reduce` is always emitted explicitly so a view with a reduce
    /// function cannot silently run in the wrong mode.
    pub(crate) fn to_query_pairs(&self, reduce: bool) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("reduce", reduce.to_string())];

        if let Some(key) = &self.start_key {
            pairs.push(("start_key", key.to_string()));
        }
        if let Some(key) = &self.end_key {
            pairs.push(("end_key", key.to_string()));
        }
        if self.group {
            pairs.push(("group", "true".to_string()));
        }
        if let Some(level) = self.group_level {
            pairs.push(("group_level", level.to_string()));
        }
        if self.descending {
            pairs.push(("descending", "true".to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(skip) = self.skip {
            pairs.push(("skip", skip.to_string()));
        }

        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_keys_are_rendered_as_bare_json() {
        let pairs = ViewOptions::default()
            .start_key(1_488_369_600_000_i64)
            .to_query_pairs(true);
        assert_eq!(
            pairs,
            vec![
                ("reduce", "true".to_string()),
                ("start_key", "1488369600000".to_string()),
            ]
        );
    }

    #[test]
    fn string_keys_keep_their_json_quotes() {
        let pairs = ViewOptions::default()
            .start_key("geo-123")
            .to_query_pairs(false);
        assert!(pairs.contains(&("start_key", "\"geo-123\"".to_string())));
    }

    #[test]
    fn reduce_flag_is_always_explicit() {
        assert_eq!(
            ViewOptions::default().to_query_pairs(false),
            vec![("reduce", "false".to_string())]
        );
    }

    #[test]
    fn grouping_is_detected_for_either_form() {
        assert!(ViewOptions::default().group().is_grouped());
        assert!(ViewOptions::default().group_level(1).is_grouped());
        assert!(!ViewOptions::default().is_grouped());
    }

    #[test]
    fn find_query_serializes_without_absent_fields() {
        let query = FindQuery::selector(json!({ "shop_id": 42 }));
        let body = serde_json::to_value(&query).unwrap();
        assert_eq!(body, json!({ "selector": { "shop_id": 42 } }));
    }

    #[test]
    fn find_query_builders_compose() {
        let query = FindQuery::selector(json!({ "shop_id": 42 }))
            .with_limit(25)
            .with_skip(50);
        assert_eq!(query.limit, Some(25));
        assert_eq!(query.skip, Some(50));
    }
}
