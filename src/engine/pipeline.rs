//! Snapshot processing pipeline.
//!
//! For every category file: ingest → rule-based + semantic detection →
//! merge → validate → write the confirmed. Files run concurrently up to
//! `concurrency.files`; validations inside a file up to
//! `concurrency.validations`. All reasoning-service calls additionally
//! share the dispatcher's global limit.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{ConcurrencyConfig, DetectionConfig};
use crate::data;
use crate::detect::{merge, RuleDetector, SemanticDetector, SemanticOutcome};
use crate::engine::validator::Validator;
use crate::llm::Dispatcher;
use crate::platforms::EventSource;
use crate::storage::ResultsStore;
use crate::types::ValidationStatus;

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// What happened to one category file.
#[derive(Debug, Clone, Default)]
pub struct FileReport {
    pub category: String,
    pub records: usize,
    pub skipped: usize,
    pub algorithmic: usize,
    pub semantic: usize,
    pub confirmed: usize,
    pub rejected: usize,
    pub inconclusive: usize,
    pub written: Option<PathBuf>,
    /// Set when the file itself could not be read.
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub snapshot: PathBuf,
    pub results_dir: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub files: Vec<FileReport>,
}

impl RunReport {
    pub fn total_confirmed(&self) -> usize {
        self.files.iter().map(|f| f.confirmed).sum()
    }

    pub fn total_candidates(&self) -> usize {
        self.files.iter().map(|f| f.algorithmic + f.semantic).sum()
    }

    pub fn files_written(&self) -> usize {
        self.files.iter().filter(|f| f.written.is_some()).count()
    }

    pub fn files_failed(&self) -> usize {
        self.files.iter().filter(|f| f.error.is_some()).count()
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Explicit run context shared by every file task.
pub struct Pipeline {
    rules: RuleDetector,
    semantic: SemanticDetector,
    validator: Validator,
    concurrency: ConcurrencyConfig,
}

impl Pipeline {
    pub fn new(
        detection: &DetectionConfig,
        concurrency: ConcurrencyConfig,
        dispatcher: Arc<Dispatcher>,
        source: Arc<dyn EventSource>,
    ) -> Self {
        Self {
            rules: RuleDetector::new(detection.threshold),
            semantic: SemanticDetector::new(Arc::clone(&dispatcher), detection.semantic_max_records),
            validator: Validator::new(source, dispatcher),
            concurrency,
        }
    }

    /// Process every category file of `snapshot`, writing results under
    /// `results_root`. Fails only if the snapshot cannot be listed or the
    /// results directory cannot be created.
    pub async fn run(&self, snapshot: &Path, results_root: &Path) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        let files = data::category_files(snapshot).context("Failed to list category files")?;
        let store = ResultsStore::create(results_root, &data::snapshot_name(snapshot))?;

        info!(
            %run_id,
            snapshot = %snapshot.display(),
            files = files.len(),
            concurrency = self.concurrency.files,
            "Starting analysis run"
        );

        let files: Vec<FileReport> = stream::iter(files)
            .map(|path| {
                let store = &store;
                async move { self.process_file(&path, store).await }
            })
            .buffer_unordered(self.concurrency.files.max(1))
            .collect()
            .await;

        let report = RunReport {
            run_id,
            snapshot: snapshot.to_path_buf(),
            results_dir: store.dir().to_path_buf(),
            started_at,
            finished_at: Utc::now(),
            files,
        };

        info!(
            %run_id,
            files = report.files.len(),
            failed = report.files_failed(),
            candidates = report.total_candidates(),
            confirmed = report.total_confirmed(),
            written = report.files_written(),
            elapsed_ms = (report.finished_at - report.started_at).num_milliseconds(),
            "Analysis run complete"
        );
        Ok(report)
    }

    /// Run one category file end to end. Never fails; problems are
    /// recorded on the report.
    pub async fn process_file(&self, path: &Path, store: &ResultsStore) -> FileReport {
        let category = data::category_name(path);
        let mut report = FileReport {
            category: category.clone(),
            ..FileReport::default()
        };

        let records = match data::load_category(path) {
            Ok(records) => records,
            Err(e) => {
                error!(category = %category, error = %format!("{e:#}"), "Skipping unreadable category file");
                report.error = Some(format!("{e:#}"));
                return report;
            }
        };
        report.records = records.len();

        let ingested = data::ingest_records(&records);
        let detection = self.rules.detect(&ingested.events);

        let skipped: Vec<_> = ingested.skipped.iter().chain(detection.skipped.iter()).collect();
        report.skipped = skipped.len();
        if !skipped.is_empty() {
            info!(category = %category, skipped = skipped.len(), "Records skipped");
            for s in &skipped {
                debug!(category = %category, skipped = %s, "Skip reason");
            }
        }

        report.algorithmic = detection.candidates.len();
        if report.algorithmic > 0 {
            info!(category = %category, count = report.algorithmic, "Found algorithmic opportunities");
        }

        let semantic = match self.semantic.detect(&category, &ingested.events).await {
            SemanticOutcome::Unparseable { raw, .. } => {
                if let Err(e) = store.write_parse_error(&category, &raw) {
                    warn!(category = %category, error = %e, "Failed to save unparseable response");
                }
                Vec::new()
            }
            outcome => outcome.into_candidates(),
        };
        report.semantic = semantic.len();

        let candidates = merge(detection.candidates, semantic);
        if candidates.is_empty() {
            debug!(category = %category, "No candidates to validate");
            return report;
        }

        info!(category = %category, count = candidates.len(), "Validating opportunities");
        let validated = self
            .validator
            .validate_batch(candidates, self.concurrency.validations)
            .await;

        for v in &validated {
            match v.validation_status {
                ValidationStatus::Confirmed => report.confirmed += 1,
                ValidationStatus::Rejected => report.rejected += 1,
                ValidationStatus::Inconclusive => report.inconclusive += 1,
            }
        }

        match store.write_opportunities(&category, &validated) {
            Ok(written) => report.written = written,
            Err(e) => warn!(category = %category, error = %e, "Failed to write results"),
        }
        report
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::CredentialPool;
    use crate::llm::dispatch::RetryPolicy;
    use crate::llm::scripted::ScriptedReasoner;
    use crate::platforms::MockEventSource;
    use serde_json::json;
    use std::time::Duration;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("arbscan_{tag}_{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn pipeline(reasoner: ScriptedReasoner, source: MockEventSource) -> Pipeline {
        let pool = Arc::new(CredentialPool::from_tokens(vec!["k1".into()]));
        let policy = RetryPolicy {
            max_attempts: 1,
            rate_limit_backoff: Duration::ZERO,
            retry_backoff: Duration::ZERO,
        };
        let dispatcher = Arc::new(Dispatcher::new(Arc::new(reasoner), pool, policy, 5));
        Pipeline::new(
            &DetectionConfig::default(),
            ConcurrencyConfig::default(),
            dispatcher,
            Arc::new(source),
        )
    }

    #[tokio::test]
    async fn test_unreadable_file_is_reported_not_fatal() {
        let snap = temp_dir("snap");
        let results = temp_dir("results");
        std::fs::write(snap.join("broken.json"), "{\"not\": \"an array\"}").unwrap();
        std::fs::write(snap.join("empty.json"), "[]").unwrap();

        let p = pipeline(ScriptedReasoner::always("{}"), MockEventSource::new());
        let report = p.run(&snap, &results).await.unwrap();

        assert_eq!(report.files.len(), 2);
        assert_eq!(report.files_failed(), 1);
        assert_eq!(report.files_written(), 0);

        std::fs::remove_dir_all(&snap).ok();
        std::fs::remove_dir_all(&results).ok();
    }

    #[tokio::test]
    async fn test_unparseable_semantic_response_is_saved() {
        let snap = temp_dir("snap");
        let results = temp_dir("results");
        let record = json!([{
            "id": "1", "title": "Fed decision", "markets": [
                {"question": "Cut?", "outcomePrices": "[\"0.4\", \"0.6\"]"}
            ]
        }]);
        std::fs::write(snap.join("economy.json"), record.to_string()).unwrap();

        let p = pipeline(ScriptedReasoner::always("no json today"), MockEventSource::new());
        let report = p.run(&snap, &results).await.unwrap();

        let error_file = report.results_dir.join("economy_error.txt");
        assert_eq!(std::fs::read_to_string(error_file).unwrap(), "no json today");
        assert_eq!(report.files[0].algorithmic, 0);

        std::fs::remove_dir_all(&snap).ok();
        std::fs::remove_dir_all(&results).ok();
    }
}
