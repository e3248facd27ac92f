//! Results persistence.
//!
//! One directory per run, named after the snapshot it analysed:
//! `<results_root>/results_<snapshot>/<category>.json`. A category with
//! nothing confirmed gets no file at all.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::types::{OpportunityReport, ValidatedOpportunity};

pub struct ResultsStore {
    dir: PathBuf,
}

impl ResultsStore {
    /// Create (or reuse) the results directory for `snapshot_name`.
    pub fn create(results_root: &Path, snapshot_name: &str) -> Result<Self> {
        let dir = results_root.join(format!("results_{snapshot_name}"));
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create results directory {}", dir.display()))?;
        info!(path = %dir.display(), "Results directory ready");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write the confirmed opportunities of one category.
    ///
    /// Anything not confirmed is filtered out here. Returns the written
    /// path, or `None` when there was nothing to write.
    pub fn write_opportunities(
        &self,
        category: &str,
        opportunities: &[ValidatedOpportunity],
    ) -> Result<Option<PathBuf>> {
        let confirmed: Vec<ValidatedOpportunity> = opportunities
            .iter()
            .filter(|o| o.is_confirmed())
            .cloned()
            .collect();
        if confirmed.is_empty() {
            debug!(category, "No confirmed opportunities, nothing written");
            return Ok(None);
        }

        let count = confirmed.len();
        let report = OpportunityReport {
            opportunities: confirmed,
        };
        let json = serde_json::to_string_pretty(&report)
            .context("Failed to serialise opportunity report")?;

        let path = self.dir.join(format!("{category}.json"));
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        info!(category, count, path = %path.display(), "Saved validated opportunities");
        Ok(Some(path))
    }

    /// Keep an unparseable semantic response for later inspection.
    pub fn write_parse_error(&self, category: &str, raw: &str) -> Result<PathBuf> {
        let path = self.dir.join(format!("{category}_error.txt"));
        std::fs::write(&path, raw)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        debug!(category, path = %path.display(), "Saved unparseable response");
        Ok(path)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
