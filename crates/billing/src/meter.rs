//! The usage meter on the prompt-append path.

use chrono::Duration;

use geodirect_core::types::{epoch_millis, EpochMillis, Timestamp};
use geodirect_couch::CouchError;
use geodirect_db::models::{LoggedPrompt, PromptEvent};
use geodirect_db::PromptLog;

use crate::gateway::{BillingError, BillingGateway, ShopCredentials};
use crate::plans::{Plan, USAGE_BATCH_SIZE};

/// Length of one billing cycle. The platform reports the cycle's end
/// (`billing_on`); the window counted starts this many days earlier.
const BILLING_CYCLE_DAYS: i64 = 30;

/// Start of the current metered-usage window, epoch milliseconds.
pub fn cycle_window_start(anchor: Timestamp) -> EpochMillis {
    epoch_millis(anchor - Duration::days(BILLING_CYCLE_DAYS))
}

/// Whether the shop's current-cycle count has just crossed a batch
/// threshold beyond its free tier.
///
/// Each append increments the count by exactly one, so the exact-multiple
/// check fires once per crossing as long as the count read reflects the
/// append that triggered it.
pub fn usage_charge_due(count: u64, plan: &Plan) -> bool {
    count > plan.free_prompts && count % USAGE_BATCH_SIZE == 0
}

/// Failures on the settlement path, absorbed by the meter.
#[derive(Debug, thiserror::Error)]
enum SettleError {
    #[error(transparent)]
    Store(#[from] CouchError),
    #[error(transparent)]
    Billing(#[from] BillingError),
}

// ---------------------------------------------------------------------------
// UsageMeter
// ---------------------------------------------------------------------------

/// Appends prompt events and converts batch-threshold crossings into
/// usage charges.
///
/// The trigger is evaluated against an aggregation-view read taken right
/// after the append. That read is eventually consistent with the append:
/// if the view lags, a crossing can be observed by zero or by two
/// appends. Treat the charge stream as an at-least-once signal and
/// reconcile billing gaps out of band; this is not an exactly-once
/// ledger.
pub struct UsageMeter<L, G> {
    log: L,
    gateway: G,
}

impl<L, G> UsageMeter<L, G>
where
    L: PromptLog,
    G: BillingGateway,
{
    /// Create a meter over a prompt log and a billing gateway.
    pub fn new(log: L, gateway: G) -> Self {
        Self { log, gateway }
    }

    /// The underlying prompt log.
    pub fn log(&self) -> &L {
        &self.log
    }

    /// Append one prompt event and settle any usage charge it triggers.
    ///
    /// The append is the primary write and its failure propagates.
    /// Everything after it (anchor fetch, count, charge creation) is
    /// best-effort: failures are logged and swallowed so billing trouble
    /// can never lose log events.
    pub async fn record_prompt(
        &self,
        shop: &ShopCredentials,
        plan: &Plan,
        event: PromptEvent,
    ) -> Result<LoggedPrompt, CouchError> {
        let logged = self.log.append(event).await?;

        if let Err(e) = self.settle_usage(shop, plan).await {
            tracing::warn!(
                shop_id = shop.shop_id,
                error = %e,
                "Usage settlement failed; reconciling out of band"
            );
        }

        Ok(logged)
    }

    /// Recompute the current-cycle count and charge on a threshold
    /// crossing.
    async fn settle_usage(&self, shop: &ShopCredentials, plan: &Plan) -> Result<(), SettleError> {
        let anchor = self.gateway.billing_cycle_anchor(shop).await?;
        let window_start = cycle_window_start(anchor);

        let count = self.log.count_since(shop.shop_id, window_start).await?;
        if !usage_charge_due(count, plan) {
            return Ok(());
        }

        let description = format!(
            "{} usage charge for prompts {}-{}",
            plan.name,
            count - USAGE_BATCH_SIZE + 1,
            count
        );
        let charge_id = self
            .gateway
            .create_usage_charge(shop, plan.price_per_batch, &description)
            .await?;

        tracing::info!(
            shop_id = shop.shop_id,
            charge_id,
            count,
            price = plan.price_per_batch,
            "Created usage charge"
        );

        Ok(())
    }
}
