//! Metering scenarios over in-memory fakes.
//!
//! The fakes stand in for the per-shop log database and the commerce
//! platform client: the log is read-after-write consistent here, so
//! these scenarios pin the intended trigger behavior (the production
//! store's view lag can only widen it to at-least-once).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::{Duration, Utc};

use geodirect_billing::plans::PLANS;
use geodirect_billing::{BillingError, BillingGateway, ChargeId, ShopCredentials, UsageMeter};
use geodirect_core::types::{epoch_millis, EpochMillis, ShopId, Timestamp};
use geodirect_couch::{CouchDocument, CouchError};
use geodirect_db::models::{LoggedPrompt, PromptEvent};
use geodirect_db::PromptLog;

const SHOP_ID: ShopId = 42;

fn shop() -> ShopCredentials {
    ShopCredentials {
        shop_id: SHOP_ID,
        shop_domain: "example.myshopify.com".to_string(),
        access_token: "token".to_string(),
    }
}

fn event() -> PromptEvent {
    PromptEvent {
        geodirect_id: "geo-1".to_string(),
        geodirect_rev: "3-abc".to_string(),
        shop_id: SHOP_ID,
    }
}

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Read-after-write consistent prompt log held in memory.
#[derive(Clone, Default)]
struct MemoryPromptLog {
    prompts: Arc<Mutex<Vec<LoggedPrompt>>>,
}

impl MemoryPromptLog {
    /// Pre-load prompts with a fixed timestamp, bypassing the clock.
    fn seed(&self, shop_id: ShopId, timestamp: EpochMillis, count: usize) {
        let mut prompts = self.prompts.lock().unwrap();
        for _ in 0..count {
            let mut logged = PromptEvent {
                geodirect_id: "geo-old".to_string(),
                geodirect_rev: "1-old".to_string(),
                shop_id,
            }
            .stamped(timestamp);
            logged.set_document_meta(format!("prompt-{}", prompts.len() + 1), "1-mem".to_string());
            prompts.push(logged);
        }
    }

    fn len(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl PromptLog for MemoryPromptLog {
    async fn prepare(&self, _shop_id: ShopId) -> Result<(), CouchError> {
        Ok(())
    }

    async fn append(&self, event: PromptEvent) -> Result<LoggedPrompt, CouchError> {
        let mut logged = event.stamped(epoch_millis(Utc::now()));
        let mut prompts = self.prompts.lock().unwrap();
        logged.set_document_meta(format!("prompt-{}", prompts.len() + 1), "1-mem".to_string());
        prompts.push(logged.clone());
        Ok(logged)
    }

    async fn count_since(&self, shop_id: ShopId, since: EpochMillis) -> Result<u64, CouchError> {
        let count = self
            .prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.shop_id == shop_id && p.timestamp >= since)
            .count();
        Ok(count as u64)
    }

    async fn count_by_geodirect(
        &self,
        shop_id: ShopId,
    ) -> Result<HashMap<String, u64>, CouchError> {
        let mut totals = HashMap::new();
        for prompt in self.prompts.lock().unwrap().iter() {
            if prompt.shop_id == shop_id {
                *totals.entry(prompt.geodirect_id.clone()).or_insert(0) += 1;
            }
        }
        Ok(totals)
    }
}

/// Gateway that records every created charge.
#[derive(Clone)]
struct RecordingGateway {
    anchor: Timestamp,
    charges: Arc<Mutex<Vec<(f64, String)>>>,
}

impl RecordingGateway {
    fn new(anchor: Timestamp) -> Self {
        Self {
            anchor,
            charges: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn charges(&self) -> Vec<(f64, String)> {
        self.charges.lock().unwrap().clone()
    }
}

#[async_trait]
impl BillingGateway for RecordingGateway {
    async fn billing_cycle_anchor(
        &self,
        _shop: &ShopCredentials,
    ) -> Result<Timestamp, BillingError> {
        Ok(self.anchor)
    }

    async fn create_usage_charge(
        &self,
        _shop: &ShopCredentials,
        price: f64,
        description: &str,
    ) -> Result<ChargeId, BillingError> {
        let mut charges = self.charges.lock().unwrap();
        charges.push((price, description.to_string()));
        Ok(charges.len() as ChargeId)
    }
}

/// Gateway whose every call fails.
struct FailingGateway;

#[async_trait]
impl BillingGateway for FailingGateway {
    async fn billing_cycle_anchor(
        &self,
        _shop: &ShopCredentials,
    ) -> Result<Timestamp, BillingError> {
        Err(BillingError::NoActiveCycle)
    }

    async fn create_usage_charge(
        &self,
        _shop: &ShopCredentials,
        _price: f64,
        _description: &str,
    ) -> Result<ChargeId, BillingError> {
        Err(BillingError::Request("billing API unreachable".to_string()))
    }
}

/// Prompt log whose appends fail.
struct FailingPromptLog;

#[async_trait]
impl PromptLog for FailingPromptLog {
    async fn prepare(&self, _shop_id: ShopId) -> Result<(), CouchError> {
        Ok(())
    }

    async fn append(&self, _event: PromptEvent) -> Result<LoggedPrompt, CouchError> {
        Err(CouchError::Unavailable("log database down".to_string()))
    }

    async fn count_since(&self, _shop_id: ShopId, _since: EpochMillis) -> Result<u64, CouchError> {
        Ok(0)
    }

    async fn count_by_geodirect(
        &self,
        _shop_id: ShopId,
    ) -> Result<HashMap<String, u64>, CouchError> {
        Ok(HashMap::new())
    }
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn one_charge_fires_per_batch_beyond_the_free_tier() {
    let plan = &PLANS[0];
    let log = MemoryPromptLog::default();
    let gateway = RecordingGateway::new(Utc::now());
    let meter = UsageMeter::new(log, gateway.clone());

    for appended in 1..=250_u64 {
        meter.record_prompt(&shop(), plan, event()).await.unwrap();

        match appended {
            100 => assert!(gateway.charges().is_empty(), "free tier fully consumed"),
            101 => assert!(gateway.charges().is_empty(), "101 is not a batch multiple"),
            200 => assert_eq!(gateway.charges().len(), 1, "second batch completed"),
            _ => {}
        }
    }

    let charges = gateway.charges();
    assert_eq!(charges.len(), 1);

    let (price, description) = &charges[0];
    assert_eq!(*price, plan.price_per_batch);
    assert!(description.contains("prompts 101-200"), "{description}");
}

#[tokio::test]
async fn prompts_outside_the_cycle_window_do_not_count() {
    let plan = &PLANS[0];
    let anchor = Utc::now();
    let log = MemoryPromptLog::default();

    // A previous cycle's worth of prompts, 40 days before the anchor.
    log.seed(SHOP_ID, epoch_millis(anchor - Duration::days(40)), 150);

    let gateway = RecordingGateway::new(anchor);
    let meter = UsageMeter::new(log, gateway.clone());

    for _ in 0..100 {
        meter.record_prompt(&shop(), plan, event()).await.unwrap();
    }

    // 100 prompts in the current window never leave the free tier.
    assert!(gateway.charges().is_empty());
}

#[tokio::test]
async fn gateway_failure_never_fails_the_append() {
    let plan = &PLANS[0];
    let log = MemoryPromptLog::default();
    let meter = UsageMeter::new(log.clone(), FailingGateway);

    let logged = meter.record_prompt(&shop(), plan, event()).await.unwrap();

    assert_eq!(logged.shop_id, SHOP_ID);
    assert_eq!(log.len(), 1);
}

#[tokio::test]
async fn append_failure_propagates_and_skips_settlement() {
    let plan = &PLANS[0];
    let gateway = RecordingGateway::new(Utc::now());
    let meter = UsageMeter::new(FailingPromptLog, gateway.clone());

    let result = meter.record_prompt(&shop(), plan, event()).await;

    assert_matches!(result, Err(CouchError::Unavailable(_)));
    assert!(gateway.charges().is_empty());
}

#[tokio::test]
async fn counts_group_by_triggering_rule() {
    let log = MemoryPromptLog::default();
    log.seed(SHOP_ID, 0, 2);

    log.append(event()).await.unwrap();
    log.append(event()).await.unwrap();

    let totals = log.count_by_geodirect(SHOP_ID).await.unwrap();
    assert_eq!(totals["geo-old"], 2);
    assert_eq!(totals["geo-1"], 2);
}
