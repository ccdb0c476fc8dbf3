//! Prompt log documents.

use geodirect_core::types::{EpochMillis, ShopId};
use geodirect_couch::CouchDocument;
use serde::{Deserialize, Serialize};

/// One append-only record of a geodirect prompt being shown.
///
/// Immutable after creation; never updated or deleted by normal
/// operation. The referenced rule's revision is captured at trigger time
/// for auditability, since the rule itself may change or disappear later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedPrompt {
    /// Database id, assigned on append.
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Revision token, assigned on append.
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,

    /// The rule that triggered (reference, not ownership).
    pub geodirect_id: String,

    /// The rule's revision at trigger time.
    pub geodirect_rev: String,

    /// Owning shop.
    pub shop_id: ShopId,

    /// When the prompt was logged, epoch milliseconds.
    pub timestamp: EpochMillis,
}

impl CouchDocument for LoggedPrompt {
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

/// The append-boundary input: what the storefront tag reports.
///
/// The timestamp is stamped server-side at receipt time, not trusted
/// from the client.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptEvent {
    /// The rule that triggered.
    pub geodirect_id: String,

    /// The rule's revision at trigger time.
    pub geodirect_rev: String,

    /// Owning shop.
    pub shop_id: ShopId,
}

impl PromptEvent {
    /// Stamp the event into a [`LoggedPrompt`] ready for append.
    pub fn stamped(self, timestamp: EpochMillis) -> LoggedPrompt {
        LoggedPrompt {
            id: None,
            rev: None,
            geodirect_id: self.geodirect_id,
            geodirect_rev: self.geodirect_rev,
            shop_id: self.shop_id,
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamping_preserves_the_reported_fields() {
        let event = PromptEvent {
            geodirect_id: "geo-1".to_string(),
            geodirect_rev: "3-abc".to_string(),
            shop_id: 42,
        };

        let logged = event.stamped(1_488_369_600_000);

        assert_eq!(logged.geodirect_id, "geo-1");
        assert_eq!(logged.geodirect_rev, "3-abc");
        assert_eq!(logged.shop_id, 42);
        assert_eq!(logged.timestamp, 1_488_369_600_000);
        assert!(logged.id.is_none());
    }

    #[test]
    fn append_body_has_no_reserved_fields() {
        let event = PromptEvent {
            geodirect_id: "geo-1".to_string(),
            geodirect_rev: "3-abc".to_string(),
            shop_id: 42,
        };

        let body = serde_json::to_value(event.stamped(0)).unwrap();
        assert!(body.get("_id").is_none());
        assert!(body.get("_rev").is_none());
    }
}
