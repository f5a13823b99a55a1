//! Per-run status reporting
//!
//! Every source descriptor ends the run with exactly one [`SourceOutcome`].
//! The aggregated [`RunReport`] drives the end-of-run summary and the
//! process exit code: zero only when every source succeeded.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info, warn};

/// Terminal state of one source acquisition
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum OutcomeStatus {
    /// Fetched, extracted, and post-processed
    Succeeded {
        /// Regular files now in the destination
        files: u64,
        /// Uncompressed bytes extracted
        bytes: u64,
        /// Files rewritten by the encoding pass
        converted: usize,
    },
    /// Acquisition failed; other sources were unaffected
    Failed { error: String },
    /// Never attempted because the run aborted on a fatal error
    Skipped { reason: String },
}

/// Outcome of one source descriptor
#[derive(Debug, Clone, Serialize)]
pub struct SourceOutcome {
    pub name: String,

    #[serde(flatten)]
    pub status: OutcomeStatus,

    /// Wall-clock seconds spent on this source
    pub duration_secs: f64,
}

impl SourceOutcome {
    pub fn succeeded(
        name: impl Into<String>,
        files: u64,
        bytes: u64,
        converted: usize,
        duration: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            status: OutcomeStatus::Succeeded {
                files,
                bytes,
                converted,
            },
            duration_secs: duration.as_secs_f64(),
        }
    }

    pub fn failed(name: impl Into<String>, error: impl ToString, duration: Duration) -> Self {
        Self {
            name: name.into(),
            status: OutcomeStatus::Failed {
                error: error.to_string(),
            },
            duration_secs: duration.as_secs_f64(),
        }
    }

    pub fn skipped(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: OutcomeStatus::Skipped {
                reason: reason.into(),
            },
            duration_secs: 0.0,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, OutcomeStatus::Succeeded { .. })
    }
}

/// Aggregated result of one pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    outcomes: Vec<SourceOutcome>,
}

impl RunReport {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            outcomes: Vec::new(),
        }
    }

    pub fn record(&mut self, outcome: SourceOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn outcomes(&self) -> &[SourceOutcome] {
        &self.outcomes
    }

    /// Names of sources that did not succeed (failed or skipped)
    pub fn failed_names(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| !o.is_success())
            .map(|o| o.name.as_str())
            .collect()
    }

    /// Process exit code: 0 only if every source succeeded
    pub fn exit_code(&self) -> i32 {
        if self.outcomes.iter().all(|o| o.is_success()) {
            0
        } else {
            1
        }
    }

    /// Log the per-source summary at the end of a run
    pub fn log_summary(&self) {
        let succeeded = self.outcomes.iter().filter(|o| o.is_success()).count();
        info!("Run summary: {}/{} sources succeeded", succeeded, self.outcomes.len());

        for outcome in &self.outcomes {
            match &outcome.status {
                OutcomeStatus::Succeeded {
                    files,
                    bytes,
                    converted,
                } => {
                    info!(
                        source = outcome.name.as_str(),
                        files,
                        bytes,
                        converted,
                        duration_secs = format!("{:.1}", outcome.duration_secs).as_str(),
                        "ok"
                    );
                },
                OutcomeStatus::Failed { error } => {
                    error!(source = outcome.name.as_str(), error = error.as_str(), "failed");
                },
                OutcomeStatus::Skipped { reason } => {
                    warn!(source = outcome.name.as_str(), reason = reason.as_str(), "skipped");
                },
            }
        }
    }
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_zero_when_all_succeed() {
        let mut report = RunReport::new();
        report.record(SourceOutcome::succeeded("mesh", 1, 10, 0, Duration::from_secs(1)));
        report.record(SourceOutcome::succeeded("eol", 3, 30, 0, Duration::from_secs(2)));
        assert_eq!(report.exit_code(), 0);
        assert!(report.failed_names().is_empty());
    }

    #[test]
    fn test_exit_code_nonzero_on_any_failure() {
        let mut report = RunReport::new();
        report.record(SourceOutcome::succeeded("mesh", 1, 10, 0, Duration::from_secs(1)));
        report.record(SourceOutcome::failed("ecotox", "boom", Duration::from_secs(1)));
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.failed_names(), vec!["ecotox"]);
    }

    #[test]
    fn test_skipped_counts_as_not_succeeded() {
        let mut report = RunReport::new();
        report.record(SourceOutcome::skipped("chembl", "run aborted"));
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let outcome = SourceOutcome::failed("mesh", "timeout", Duration::from_secs(3));
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"], "timeout");
    }
}
