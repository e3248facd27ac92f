use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arbscan::config::{ConcurrencyConfig, DetectionConfig};
use arbscan::credentials::CredentialPool;
use arbscan::data;
use arbscan::engine::Pipeline;
use arbscan::error::{FetchError, ReasonerError};
use arbscan::llm::{Dispatcher, RetryPolicy};
use arbscan::types::{
    OpportunityReport, OpportunityType, ProfitPotential, Source, ValidationStatus,
};

use crate::mocks::{MockReasoner, MockSource, PromptKind};

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Harness {
    root: PathBuf,
    pool: Arc<CredentialPool>,
    pipeline: Pipeline,
}

impl Harness {
    fn new(reasoner: Arc<MockReasoner>, source: Arc<MockSource>, keys: &[&str]) -> Self {
        let root = std::env::temp_dir().join(format!("arbscan_it_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&root).unwrap();

        let pool = Arc::new(CredentialPool::from_tokens(
            keys.iter().map(|k| k.to_string()).collect(),
        ));
        let policy = RetryPolicy {
            max_attempts: 3,
            rate_limit_backoff: Duration::ZERO,
            retry_backoff: Duration::ZERO,
        };
        let dispatcher = Arc::new(Dispatcher::new(reasoner, Arc::clone(&pool), policy, 5));
        let pipeline = Pipeline::new(
            &DetectionConfig::default(),
            ConcurrencyConfig::default(),
            dispatcher,
            source,
        );

        Self { root, pool, pipeline }
    }

    fn snapshot(&self, name: &str, files: &[(&str, Value)]) -> PathBuf {
        let dir = self.root.join("data").join(name);
        std::fs::create_dir_all(&dir).unwrap();
        for (file, body) in files {
            std::fs::write(dir.join(file), body.to_string()).unwrap();
        }
        dir
    }

    fn results_root(&self) -> PathBuf {
        self.root.join("results")
    }

    fn read_report(path: &Path) -> OpportunityReport {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.root).ok();
    }
}

/// One binary market whose Yes + No prices sum to 0.93.
fn underpriced_event(id: &str) -> Value {
    json!({
        "id": id,
        "title": "Mayoral election",
        "markets": [{
            "question": "Will Smith win?",
            "outcomes": "[\"Yes\", \"No\"]",
            "outcomePrices": "[\"0.45\", \"0.48\"]"
        }]
    })
}

fn fairly_priced_event(id: &str) -> Value {
    json!({
        "id": id,
        "title": "Rate decision",
        "markets": [{
            "question": "Will the Fed cut?",
            "outcomes": ["Yes", "No"],
            "outcomePrices": ["0.50", "0.50"]
        }]
    })
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_underpriced_market_is_confirmed_and_written() {
    let reasoner = Arc::new(MockReasoner::confirming());
    let source = Arc::new(MockSource::default().with_event("1", underpriced_event("1")));
    let h = Harness::new(reasoner.clone(), source.clone(), &["k1"]);

    let snap = h.snapshot(
        "20250301_090000",
        &[("politics.json", json!([underpriced_event("1")]))],
    );
    let report = h.pipeline.run(&snap, &h.results_root()).await.unwrap();

    assert_eq!(report.total_confirmed(), 1);
    let written = report.files[0].written.clone().unwrap();
    assert!(written.ends_with("results_20250301_090000/politics.json"));

    let out = Harness::read_report(&written);
    assert_eq!(out.opportunities.len(), 1);
    let opp = &out.opportunities[0];
    assert_eq!(opp.validation_status, ValidationStatus::Confirmed);
    assert_eq!(opp.candidate.kind, OpportunityType::Real);
    assert_eq!(opp.candidate.source, Source::Algorithm);
    assert_eq!(opp.candidate.profit_pct, Some(dec!(7.00)));
    assert_eq!(opp.candidate.profit_potential, ProfitPotential::High);
    assert_eq!(opp.candidate.event_id.as_deref(), Some("1"));

    assert_eq!(source.fetched(), vec!["1".to_string()]);
    assert_eq!(reasoner.count(PromptKind::Detection), 1);
    assert_eq!(reasoner.count(PromptKind::Validation), 1);
}

#[tokio::test]
async fn test_fetch_error_leaves_candidate_out_of_results() {
    let reasoner = Arc::new(MockReasoner::confirming());
    let source = Arc::new(MockSource::default().with_event("1", underpriced_event("1")));
    source.set_error(FetchError::Http { status: 500 });
    let h = Harness::new(reasoner.clone(), source, &["k1"]);

    let snap = h.snapshot("snap", &[("politics.json", json!([underpriced_event("1")]))]);
    let report = h.pipeline.run(&snap, &h.results_root()).await.unwrap();

    assert_eq!(report.files[0].algorithmic, 1);
    assert_eq!(report.files[0].inconclusive, 1);
    assert_eq!(report.total_confirmed(), 0);
    assert!(!report.results_dir.join("politics.json").exists());
    assert_eq!(reasoner.count(PromptKind::Validation), 0);
}

#[tokio::test]
async fn test_rejected_candidate_is_not_written() {
    let reasoner = Arc::new(MockReasoner::new(
        r#"{"opportunities": []}"#,
        r#"{"validation_status": -1, "reason": "prices moved"}"#,
    ));
    let source = Arc::new(MockSource::default().with_event("1", fairly_priced_event("1")));
    let h = Harness::new(reasoner, source, &["k1"]);

    let snap = h.snapshot("snap", &[("politics.json", json!([underpriced_event("1")]))]);
    let report = h.pipeline.run(&snap, &h.results_root()).await.unwrap();

    assert_eq!(report.files[0].rejected, 1);
    assert_eq!(report.files_written(), 0);
}

#[tokio::test]
async fn test_reasoning_outage_does_not_abort_run() {
    let reasoner = Arc::new(MockReasoner::failing(ReasonerError::Unauthorized("revoked".into())));
    let source = Arc::new(MockSource::default().with_event("1", underpriced_event("1")));
    let h = Harness::new(reasoner, source, &["k1", "k2"]);

    let snap = h.snapshot(
        "snap",
        &[
            ("politics.json", json!([underpriced_event("1")])),
            ("sports.json", json!([fairly_priced_event("2")])),
        ],
    );
    let report = h.pipeline.run(&snap, &h.results_root()).await.unwrap();

    assert_eq!(report.files.len(), 2);
    assert_eq!(report.total_confirmed(), 0);
    assert_eq!(report.files_written(), 0);
    assert_eq!(h.pool.working_count(), 0);
}

#[tokio::test]
async fn test_semantic_candidate_is_merged_and_validated() {
    let detection = json!({
        "opportunities": [{
            "market_title": "Will the Fed cut?",
            "type": "Value",
            "description": "Futures imply 80%",
            "profit_potential": "Medium",
            "confidence": 0.7,
            "event_id": "2"
        }]
    });
    let reasoner = Arc::new(MockReasoner::new(
        &detection.to_string(),
        r#"{"validation_status": 1, "reason": "gap persists"}"#,
    ));
    let source = Arc::new(MockSource::default().with_event("2", fairly_priced_event("2")));
    let h = Harness::new(reasoner, source.clone(), &["k1"]);

    let snap = h.snapshot("snap", &[("economy.json", json!([fairly_priced_event("2")]))]);
    let report = h.pipeline.run(&snap, &h.results_root()).await.unwrap();

    assert_eq!(report.files[0].algorithmic, 0);
    assert_eq!(report.files[0].semantic, 1);

    let out = Harness::read_report(report.files[0].written.as_ref().unwrap());
    assert_eq!(out.opportunities[0].candidate.source, Source::Llm);
    assert_eq!(out.opportunities[0].candidate.kind, OpportunityType::Value);
    assert_eq!(out.opportunities[0].reason, "gap persists");
    assert_eq!(source.fetched(), vec!["2".to_string()]);
}

#[tokio::test]
async fn test_garbage_semantic_response_is_kept_on_disk() {
    let reasoner = Arc::new(MockReasoner::new(
        "I could not find anything interesting.",
        r#"{"validation_status": 1}"#,
    ));
    let source = Arc::new(MockSource::default().with_event("1", underpriced_event("1")));
    let h = Harness::new(reasoner, source, &["k1"]);

    let snap = h.snapshot("snap", &[("politics.json", json!([underpriced_event("1")]))]);
    let report = h.pipeline.run(&snap, &h.results_root()).await.unwrap();

    let raw = std::fs::read_to_string(report.results_dir.join("politics_error.txt")).unwrap();
    assert_eq!(raw, "I could not find anything interesting.");
    // The rule-based candidate still goes through.
    assert_eq!(report.total_confirmed(), 1);
}

#[tokio::test]
async fn test_latest_snapshot_and_aggregate_file_excluded() {
    let reasoner = Arc::new(MockReasoner::confirming());
    let source = Arc::new(MockSource::default());
    let h = Harness::new(reasoner, source, &["k1"]);

    h.snapshot("20250101_000000", &[("politics.json", json!([]))]);
    h.snapshot(
        "20250301_090000",
        &[
            ("crypto.json", json!([])),
            (data::AGGREGATE_FILE, json!([fairly_priced_event("9")])),
        ],
    );

    let latest = data::latest_snapshot(&h.root.join("data")).unwrap();
    assert!(latest.ends_with("20250301_090000"));

    let report = h.pipeline.run(&latest, &h.results_root()).await.unwrap();
    assert_eq!(report.files.len(), 1);
    assert_eq!(report.files[0].category, "crypto");
    assert!(report.results_dir.ends_with("results_20250301_090000"));
}

#[test]
fn test_missing_data_dir_is_fatal() {
    let missing = std::env::temp_dir().join(format!("arbscan_none_{}", uuid::Uuid::new_v4()));
    assert!(data::latest_snapshot(&missing).is_err());
}

#[test]
fn test_credential_validation_writes_cache() {
    let dir = std::env::temp_dir().join(format!("arbscan_keys_{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    let keys = dir.join("openai_keys.txt");
    let cache = dir.join("working_keys.txt");
    std::fs::write(&keys, "sk-one\n\nsk-two\n").unwrap();

    let pool = CredentialPool::load(&keys, &cache).unwrap();
    assert_eq!(pool.loaded_from(), arbscan::credentials::LoadedFrom::RawList);

    let working = tokio_test::block_on(pool.validate_all(&MockReasoner::confirming()));
    assert_eq!(working, 2);
    assert_eq!(std::fs::read_to_string(&cache).unwrap(), "sk-one\nsk-two\n");

    let reloaded = CredentialPool::load(&keys, &cache).unwrap();
    assert_eq!(reloaded.loaded_from(), arbscan::credentials::LoadedFrom::Cache);

    std::fs::remove_dir_all(&dir).ok();
}
