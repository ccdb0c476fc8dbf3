//! Subscription plan catalog.

use uuid::{uuid, Uuid};

/// Usage charges are issued per batch of this many prompts.
pub const USAGE_BATCH_SIZE: u64 = 100;

/// A subscription plan a shop can be on.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    /// The plan's unique id.
    pub id: Uuid,

    /// Display name.
    pub name: &'static str,

    /// Price in USD per [`USAGE_BATCH_SIZE`] prompts beyond the free tier.
    pub price_per_batch: f64,

    /// Prompts included each cycle before usage charges start to accrue.
    pub free_prompts: u64,

    /// The maximum charged per cycle, enforced by the commerce platform's
    /// capped-amount mechanism.
    pub price_cap: f64,
}

/// Plans a new shop can subscribe to, or a current shop can switch to.
/// Every plan in this list appears on the pricing page.
pub static PLANS: [Plan; 1] = [Plan {
    id: uuid!("0696abc9-43e2-4915-822a-895de5ede035"),
    name: "Basic",
    price_per_batch: 1.00,
    free_prompts: 100,
    price_cap: 25.00,
}];

/// Plans that were previously available and possibly still in use by one
/// or more shops. Never shown on the pricing page.
pub static RETIRED_PLANS: [Plan; 0] = [];

/// Find a plan by id, whether current or retired.
pub fn find_plan(id: Uuid) -> Option<&'static Plan> {
    PLANS
        .iter()
        .chain(RETIRED_PLANS.iter())
        .find(|plan| plan.id == id)
}

/// Plan summary for the pricing page, e.g.
/// `100 free prompts each month, then $1.00 USD per 100 prompts.`
pub fn plan_description(plan: &Plan) -> String {
    format!(
        "{} free prompts each month, then ${:.2} USD per {} prompts.",
        plan.free_prompts, plan.price_per_batch, USAGE_BATCH_SIZE
    )
}

/// Terms string for the commerce platform's usage charge API.
pub fn usage_terms(plan: &Plan) -> String {
    format!(
        "Your first {} prompts each month are free, then your shop will be charged ${:.2} USD per {} prompts",
        plan.free_prompts, plan.price_per_batch, USAGE_BATCH_SIZE
    )
}
