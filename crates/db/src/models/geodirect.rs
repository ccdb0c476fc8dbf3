//! Geodirect rule document.

use geodirect_core::types::ShopId;
use geodirect_couch::CouchDocument;
use serde::{Deserialize, Serialize};

/// A shop's geo-targeting redirect rule.
///
/// When a visitor's country matches `country`, the storefront tag shows
/// `message` and offers to redirect to `url`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geodirect {
    /// Database id, assigned on first write.
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Current revision token, required for conflict-safe writes.
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,

    /// Owning shop.
    pub shop_id: ShopId,

    /// Two-letter ISO country code the rule targets.
    pub country: String,

    /// Destination URL offered to matching visitors.
    pub url: String,

    /// Prompt message shown to matching visitors.
    pub message: String,

    /// Denormalized hit counter, advisory only. Authoritative counts come
    /// from the prompt-log aggregation views, not this field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hits: Option<u64>,
}

impl CouchDocument for Geodirect {
    fn document_id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn revision(&self) -> Option<&str> {
        self.rev.as_deref()
    }

    fn set_document_meta(&mut self, id: String, rev: String) {
        self.id = Some(id);
        self.rev = Some(rev);
    }

    fn clear_document_meta(&mut self) {
        self.id = None;
        self.rev = None;
    }
}
