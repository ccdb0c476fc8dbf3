//! Plans, usage metering and the billing trigger.
//!
//! [`UsageMeter`] sits on the prompt-append path: every logged prompt
//! recomputes the shop's current-cycle count and, on crossing a batch
//! threshold, creates one usage charge through the commerce platform's
//! [`BillingGateway`]. The charge signal is best-effort and at-least-once;
//! see the [`meter`] module for the consistency caveat.

pub mod gateway;
pub mod meter;
pub mod plans;

pub use gateway::{BillingError, BillingGateway, ChargeId, ShopCredentials};
pub use meter::UsageMeter;
pub use plans::{find_plan, Plan, USAGE_BATCH_SIZE};
