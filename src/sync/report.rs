// ABOUTME: BatchResult and SyncReport - the orchestrator's per-batch outcomes
// ABOUTME: Serializable for report files, renders a human-readable summary

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Verified row count equals the inserted count
    Succeeded,
    /// Rows were written but the counts disagree
    Mismatched,
    /// The batch could not be written (schema, source, or batch-fatal error)
    Failed,
}

impl BatchStatus {
    fn tag(self) -> &'static str {
        match self {
            Self::Succeeded => "OK",
            Self::Mismatched => "MISMATCH",
            Self::Failed => "FAILED",
        }
    }
}

/// Outcome of one table/batch on one destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    /// Batch name: the table for migrations, the listing for scrapes
    pub batch: String,
    pub table: String,
    pub destination: String,
    pub source_count: u64,
    pub inserted_count: u64,
    pub skipped_count: u64,
    pub failed_count: u64,
    /// Rows attributable to this batch after commit
    pub verified_count: i64,
    pub status: BatchStatus,
    pub dropped_columns: BTreeMap<String, usize>,
    pub error: Option<String>,
}

impl BatchResult {
    /// A batch that never reached verification.
    pub fn failed(
        batch: &str,
        table: &str,
        destination: &str,
        source_count: u64,
        error: impl Into<String>,
    ) -> Self {
        Self {
            batch: batch.to_string(),
            table: table.to_string(),
            destination: destination.to_string(),
            source_count,
            inserted_count: 0,
            skipped_count: 0,
            failed_count: 0,
            verified_count: 0,
            status: BatchStatus::Failed,
            dropped_columns: BTreeMap::new(),
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == BatchStatus::Succeeded
    }

    fn summary_line(&self) -> String {
        let mut line = format!(
            "[{}] {} -> {}.{}: {} source, {} inserted",
            self.status.tag(),
            self.batch,
            self.destination,
            self.table,
            self.source_count,
            self.inserted_count
        );
        if self.skipped_count > 0 {
            let _ = write!(line, ", {} skipped", self.skipped_count);
        }
        if self.failed_count > 0 {
            let _ = write!(line, ", {} failed", self.failed_count);
        }
        if self.status != BatchStatus::Failed {
            let _ = write!(line, ", {} verified", self.verified_count);
        }
        if let Some(error) = &self.error {
            let _ = write!(line, " ({})", error);
        }
        line
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReportTotals {
    pub batches: usize,
    pub succeeded: usize,
    pub mismatched: usize,
    pub failed: usize,
    pub source_records: u64,
    pub inserted_records: u64,
    pub skipped_records: u64,
    pub failed_records: u64,
}

/// Ordered batch results of one run plus aggregate totals.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    results: Vec<BatchResult>,
    totals: ReportTotals,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl Default for SyncReport {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncReport {
    pub fn new() -> Self {
        Self {
            results: Vec::new(),
            totals: ReportTotals::default(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn push(&mut self, result: BatchResult) {
        let totals = &mut self.totals;
        totals.batches += 1;
        match result.status {
            BatchStatus::Succeeded => totals.succeeded += 1,
            BatchStatus::Mismatched => totals.mismatched += 1,
            BatchStatus::Failed => totals.failed += 1,
        }
        totals.source_records += result.source_count;
        totals.inserted_records += result.inserted_count;
        totals.skipped_records += result.skipped_count;
        totals.failed_records += result.failed_count;
        self.results.push(result);
    }

    /// Append every result of `other`, keeping order.
    pub fn extend(&mut self, other: SyncReport) {
        for result in other.results {
            self.push(result);
        }
    }

    pub fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self
    }

    pub fn results(&self) -> &[BatchResult] {
        &self.results
    }

    pub fn totals(&self) -> &ReportTotals {
        &self.totals
    }

    /// True when every batch succeeded.
    pub fn is_success(&self) -> bool {
        self.results.iter().all(BatchResult::is_success)
    }

    pub fn problem_batches(&self) -> Vec<&BatchResult> {
        self.results.iter().filter(|r| !r.is_success()).collect()
    }

    /// Per-batch outcome lines followed by the pass/fail tally.
    pub fn render_summary(&self) -> String {
        let rule = "=".repeat(70);
        let mut out = String::new();
        let _ = writeln!(out, "{}", rule);
        let _ = writeln!(out, "SYNC REPORT");
        let _ = writeln!(out, "{}", rule);
        for result in &self.results {
            let _ = writeln!(out, "  {}", result.summary_line());
        }
        let _ = writeln!(out, "{}", "-".repeat(70));
        let _ = writeln!(
            out,
            "Succeeded: {}/{} batches ({} mismatched, {} failed)",
            self.totals.succeeded, self.totals.batches, self.totals.mismatched, self.totals.failed
        );
        let _ = writeln!(
            out,
            "Records: {} from sources, {} inserted, {} skipped, {} failed",
            self.totals.source_records,
            self.totals.inserted_records,
            self.totals.skipped_records,
            self.totals.failed_records
        );

        let problems = self.problem_batches();
        if problems.is_empty() {
            let _ = writeln!(out, "All batches completed successfully");
        } else {
            let names: Vec<String> = problems
                .iter()
                .map(|r| format!("{}@{}", r.batch, r.destination))
                .collect();
            let _ = writeln!(out, "Batches with problems: {}", names.join(", "));
        }
        out
    }

    /// Write the report as pretty JSON.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self).context("Failed to serialize sync report")?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write sync report to {:?}", path))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(batch: &str, status: BatchStatus, inserted: u64, verified: i64) -> BatchResult {
        BatchResult {
            batch: batch.to_string(),
            table: batch.to_string(),
            destination: "postgres".to_string(),
            source_count: 10,
            inserted_count: inserted,
            skipped_count: 0,
            failed_count: 10 - inserted,
            verified_count: verified,
            status,
            dropped_columns: BTreeMap::new(),
            error: None,
        }
    }

    #[test]
    fn test_totals_accumulate() {
        let mut report = SyncReport::new();
        report.push(result("cursos", BatchStatus::Succeeded, 10, 10));
        report.push(result("turmas", BatchStatus::Mismatched, 9, 8));
        report.push(BatchResult::failed("aulas", "aulas", "postgres", 0, "schema unavailable"));

        let totals = report.totals();
        assert_eq!(totals.batches, 3);
        assert_eq!(totals.succeeded, 1);
        assert_eq!(totals.mismatched, 1);
        assert_eq!(totals.failed, 1);
        assert_eq!(totals.source_records, 20);
        assert_eq!(totals.inserted_records, 19);
        assert!(!report.is_success());
        assert_eq!(report.problem_batches().len(), 2);
    }

    #[test]
    fn test_render_summary_lists_every_batch() {
        let mut report = SyncReport::new();
        report.push(result("cursos", BatchStatus::Succeeded, 10, 10));
        report.push(BatchResult::failed("aulas", "aulas", "postgres", 0, "schema unavailable"));

        let summary = report.render_summary();
        assert!(summary.contains("[OK] cursos -> postgres.cursos: 10 source, 10 inserted, 10 verified"));
        assert!(summary.contains("[FAILED] aulas -> postgres.aulas"));
        assert!(summary.contains("(schema unavailable)"));
        assert!(summary.contains("Succeeded: 1/2 batches"));
        assert!(summary.contains("Batches with problems: aulas@postgres"));
    }

    #[test]
    fn test_empty_report_is_success() {
        let report = SyncReport::new().finish();
        assert!(report.is_success());
        assert!(report.render_summary().contains("All batches completed successfully"));
    }

    #[tokio::test]
    async fn test_save_writes_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let mut report = SyncReport::new();
        report.push(result("cursos", BatchStatus::Succeeded, 10, 10));

        report.finish().save(&path).await.unwrap();

        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved["results"][0]["status"], "succeeded");
        assert_eq!(saved["totals"]["succeeded"], 1);
    }
}
