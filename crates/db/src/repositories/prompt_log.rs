//! Per-shop prompt log databases.
//!
//! Every shop gets its own log database, named deterministically from
//! its id and provisioned lazily the first time the shop needs it.
//! Appends are durable document writes; counts come from the
//! aggregation views in [`crate::views`], which the store maintains
//! incrementally and eventually-consistently. A count read immediately
//! after an append may not include it yet.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;

use geodirect_core::types::{epoch_millis, EpochMillis, ShopId};
use geodirect_couch::{CouchClient, CouchError, Database, ViewOptions};

use crate::models::{LoggedPrompt, PromptEvent};
use crate::views::{COUNT_BY_GEODIRECT, COUNT_BY_TIMESTAMP, LIST_DESIGN_DOC, PROMPT_LOG_VIEWS};

/// The name of a shop's log database. Pure; no I/O.
pub fn log_database_name(shop_id: ShopId) -> String {
    format!("geodirect_shop_{shop_id}_logs")
}

/// Tenant-scoped prompt log operations.
///
/// The trait is the seam between the metering layer and the store; the
/// production implementation is [`PromptLogDatabase`].
#[async_trait]
pub trait PromptLog: Send + Sync {
    /// Provision the shop's log database and synchronize its views.
    ///
    /// Safe to call repeatedly; an already-existing database is success.
    async fn prepare(&self, shop_id: ShopId) -> Result<(), CouchError>;

    /// Append one prompt event, stamping its timestamp at receipt time.
    ///
    /// Does not synchronously update any cached counter; counts are
    /// recomputed from the views on demand.
    async fn append(&self, event: PromptEvent) -> Result<LoggedPrompt, CouchError>;

    /// Count the shop's prompts logged at or after `since`.
    async fn count_since(&self, shop_id: ShopId, since: EpochMillis) -> Result<u64, CouchError>;

    /// Count the shop's prompts, keyed by the rule that triggered them.
    async fn count_by_geodirect(
        &self,
        shop_id: ShopId,
    ) -> Result<HashMap<String, u64>, CouchError>;
}

/// CouchDB-backed [`PromptLog`].
#[derive(Clone)]
pub struct PromptLogDatabase {
    couch: CouchClient,
}

impl PromptLogDatabase {
    /// Create the log manager on top of a server handle.
    pub fn new(couch: CouchClient) -> Self {
        Self { couch }
    }

    fn database(&self, shop_id: ShopId) -> Database<LoggedPrompt> {
        self.couch.database(&log_database_name(shop_id))
    }
}

#[async_trait]
impl PromptLog for PromptLogDatabase {
    async fn prepare(&self, shop_id: ShopId) -> Result<(), CouchError> {
        let name = log_database_name(shop_id);

        self.couch.ensure_database(&name).await?;
        // View sync is best-effort; failures are logged inside and must
        // not block log ingestion.
        self.couch.ensure_views(&name, &PROMPT_LOG_VIEWS).await;

        Ok(())
    }

    async fn append(&self, event: PromptEvent) -> Result<LoggedPrompt, CouchError> {
        let shop_id = event.shop_id;
        let logged = event.stamped(epoch_millis(Utc::now()));

        let logged = self.database(shop_id).create(logged).await?;
        tracing::debug!(
            shop_id,
            geodirect_id = %logged.geodirect_id,
            "Logged prompt"
        );

        Ok(logged)
    }

    async fn count_since(&self, shop_id: ShopId, since: EpochMillis) -> Result<u64, CouchError> {
        let response = self
            .database(shop_id)
            .reduced_view(
                LIST_DESIGN_DOC,
                COUNT_BY_TIMESTAMP.name,
                ViewOptions::default().start_key(since),
            )
            .await?;

        // Ungrouped reduce collapses to at most one row; none means the
        // view has no matching entries yet.
        let count = response
            .rows
            .first()
            .and_then(|row| row.value.as_u64())
            .unwrap_or(0);

        Ok(count)
    }

    async fn count_by_geodirect(
        &self,
        shop_id: ShopId,
    ) -> Result<HashMap<String, u64>, CouchError> {
        let response = self
            .database(shop_id)
            .reduced_view(
                LIST_DESIGN_DOC,
                COUNT_BY_GEODIRECT.name,
                ViewOptions::default().group(),
            )
            .await?;

        let mut totals: HashMap<String, u64> = HashMap::new();
        for row in response.rows {
            let Some(counts) = row.value.as_object() else {
                continue;
            };
            for (geodirect_id, count) in counts {
                *totals.entry(geodirect_id.clone()).or_insert(0) +=
                    count.as_u64().unwrap_or(0);
            }
        }

        Ok(totals)
    }
}
