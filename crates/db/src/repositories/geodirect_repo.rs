//! Repository for the global `geodirect_geodirections` database.

use geodirect_core::types::ShopId;
use geodirect_couch::{CouchClient, CouchError, Database, FindQuery};

use crate::models::Geodirect;

/// Database holding every shop's geodirect rules.
pub const GEODIRECT_DATABASE: &str = "geodirect_geodirections";

/// Mango index name for the `shop_id` selector queries.
const SHOP_ID_INDEX: &str = "geodirect_geodirections-indexes";

/// Provides CRUD operations for geodirect rules.
///
/// Read-then-write callers (rule edits, hit counting) must carry the
/// revision they read and treat [`CouchError::Conflict`] as a
/// legitimate, retryable outcome; nothing here retries for them.
pub struct GeodirectRepo;

impl GeodirectRepo {
    fn database(couch: &CouchClient) -> Database<Geodirect> {
        couch.database(GEODIRECT_DATABASE)
    }

    /// Provision the rules database and its `shop_id` index.
    ///
    /// An index failure is logged and absorbed: `_find` still answers
    /// without it, just slower.
    pub async fn provision(couch: &CouchClient) -> Result<(), CouchError> {
        couch.ensure_database(GEODIRECT_DATABASE).await?;

        if let Err(e) = couch
            .create_index(GEODIRECT_DATABASE, &["shop_id"], SHOP_ID_INDEX)
            .await
        {
            tracing::warn!(
                error = %e,
                "Failed to ensure shop_id index; selector queries will scan"
            );
        }

        Ok(())
    }

    /// List every rule owned by a shop.
    pub async fn list_for_shop(
        couch: &CouchClient,
        shop_id: ShopId,
    ) -> Result<Vec<Geodirect>, CouchError> {
        let query = FindQuery::selector(serde_json::json!({ "shop_id": shop_id }));
        Self::database(couch).find(&query).await
    }

    /// Fetch a rule by id.
    pub async fn get(couch: &CouchClient, id: &str) -> Result<Geodirect, CouchError> {
        Self::database(couch).get(id).await
    }

    /// Whether a rule with the given id exists.
    pub async fn exists(couch: &CouchClient, id: &str) -> Result<bool, CouchError> {
        Self::database(couch).exists(id).await
    }

    /// Create a rule, returning it with its assigned id and revision.
    pub async fn create(couch: &CouchClient, rule: Geodirect) -> Result<Geodirect, CouchError> {
        Self::database(couch).create(rule).await
    }

    /// Replace a rule, guarded by the revision the caller read earlier.
    pub async fn update(
        couch: &CouchClient,
        id: &str,
        rule: Geodirect,
        expected_rev: &str,
    ) -> Result<Geodirect, CouchError> {
        Self::database(couch).update(id, rule, expected_rev).await
    }

    /// Delete a rule, guarded by the revision the caller read earlier.
    pub async fn delete(
        couch: &CouchClient,
        id: &str,
        expected_rev: &str,
    ) -> Result<(), CouchError> {
        Self::database(couch).delete(id, expected_rev).await
    }

    /// Bump the rule's advisory hit counter by one.
    ///
    /// Read-then-write on the current revision; a concurrent edit
    /// surfaces as [`CouchError::Conflict`] and the caller may re-read
    /// or simply drop the hit. Authoritative counts come from the
    /// prompt-log views, not this field.
    pub async fn record_hit(couch: &CouchClient, id: &str) -> Result<Geodirect, CouchError> {
        let database = Self::database(couch);

        let mut rule = database.get(id).await?;
        let rev = rule.rev.clone().unwrap_or_default();
        rule.hits = Some(rule.hits.unwrap_or(0) + 1);

        database.update(id, rule, &rev).await
    }
}
