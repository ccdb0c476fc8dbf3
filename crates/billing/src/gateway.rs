//! Commerce platform billing contract.
//!
//! The platform's OAuth and transport live outside this workspace; the
//! metering layer only needs the two capabilities below, so they are
//! consumed through a narrow trait and mocked in tests.

use async_trait::async_trait;

use geodirect_core::types::{ShopId, Timestamp};

/// Charge id assigned by the commerce platform.
pub type ChargeId = i64;

/// What the platform client needs to act on behalf of one shop.
#[derive(Debug, Clone)]
pub struct ShopCredentials {
    /// The platform's numeric shop id.
    pub shop_id: ShopId,

    /// The shop's domain, e.g. `example.myshopify.com`.
    pub shop_domain: String,

    /// OAuth access token for the shop.
    pub access_token: String,
}

/// Errors from the billing boundary.
#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    /// The platform could not be reached.
    #[error("billing request failed: {0}")]
    Request(String),

    /// The platform answered with a non-success status.
    #[error("billing API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The shop has no accepted recurring charge to anchor a cycle on.
    #[error("shop has no active billing cycle")]
    NoActiveCycle,
}

/// Billing capabilities of the commerce platform client.
#[async_trait]
pub trait BillingGateway: Send + Sync {
    /// The anchor date of the shop's current billing cycle (the
    /// platform's next `billing_on` date for its recurring charge).
    async fn billing_cycle_anchor(&self, shop: &ShopCredentials)
        -> Result<Timestamp, BillingError>;

    /// Create one usage charge against the shop's recurring charge.
    async fn create_usage_charge(
        &self,
        shop: &ShopCredentials,
        price: f64,
        description: &str,
    ) -> Result<ChargeId, BillingError>;
}
