//! Per-unit and per-run ingestion reports.

use serde::Serialize;
use std::path::PathBuf;

use shotvault_common::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    File,
    Sequence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitStatus {
    /// Every copy and requested artifact succeeded.
    Completed,
    /// Some copies or artifacts failed, at least one plate is in place.
    Partial,
    /// Not attempted: missing frames without `force`, or missing metadata.
    Skipped,
    Failed,
    /// The run was cancelled before the unit finished.
    Cancelled,
    /// Dry run: destinations resolved, nothing copied.
    Planned,
}

/// A copy the unit would perform, recorded in dry runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedCopy {
    pub src: PathBuf,
    pub dst: PathBuf,
}

/// Outcome of one unit of work (one file or one sequence).
#[derive(Debug, Clone, Serialize)]
pub struct UnitReport {
    pub kind: UnitKind,
    pub label: String,
    pub status: UnitStatus,
    /// Plates copied in this run.
    pub copied: usize,
    /// Plates already materialised and left untouched.
    pub skipped_existing: usize,
    pub failed: usize,
    pub proxies: usize,
    pub movie: Option<PathBuf>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub planned: Vec<PlannedCopy>,
}

impl UnitReport {
    pub fn new(kind: UnitKind, label: impl Into<String>) -> Self {
        Self {
            kind,
            label: label.into(),
            status: UnitStatus::Completed,
            copied: 0,
            skipped_existing: 0,
            failed: 0,
            proxies: 0,
            movie: None,
            errors: Vec::new(),
            warnings: Vec::new(),
            planned: Vec::new(),
        }
    }

    /// A unit that was not attempted, with the reason.
    pub fn skipped(kind: UnitKind, label: impl Into<String>, reason: &Error) -> Self {
        let mut report = Self::new(kind, label);
        report.status = UnitStatus::Skipped;
        report.errors.push(reason.to_string());
        report
    }

    /// A unit that never started because the run was cancelled.
    pub fn cancelled(kind: UnitKind, label: impl Into<String>) -> Self {
        let label = label.into();
        let mut report = Self::new(kind, label.clone());
        report.status = UnitStatus::Cancelled;
        report.errors.push(Error::cancelled(label).to_string());
        report
    }

    pub fn failed(kind: UnitKind, label: impl Into<String>, error: &Error) -> Self {
        let mut report = Self::new(kind, label);
        report.status = UnitStatus::Failed;
        report.errors.push(error.to_string());
        report
    }

    pub fn record_error(&mut self, error: &Error) {
        self.errors.push(error.to_string());
    }

    /// Plates in place after the run, copied now or earlier.
    pub fn materialised(&self) -> usize {
        self.copied + self.skipped_existing
    }
}

/// A sequence or file that was not ingested, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedUnit {
    pub label: String,
    pub reason: String,
}

/// Aggregated outcome of a run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub discovery_errors: Vec<String>,
    pub units: Vec<UnitReport>,
}

impl IngestReport {
    pub fn count(&self, status: UnitStatus) -> usize {
        self.units.iter().filter(|u| u.status == status).count()
    }

    pub fn succeeded(&self) -> usize {
        self.count(UnitStatus::Completed)
    }

    /// Units that failed outright or only partly succeeded.
    pub fn failed(&self) -> usize {
        self.count(UnitStatus::Failed) + self.count(UnitStatus::Partial)
    }

    pub fn skipped(&self) -> Vec<SkippedUnit> {
        self.units
            .iter()
            .filter(|u| u.status == UnitStatus::Skipped)
            .map(|u| SkippedUnit {
                label: u.label.clone(),
                reason: u.errors.join("; "),
            })
            .collect()
    }

    pub fn total_copied(&self) -> usize {
        self.units.iter().map(|u| u.copied).sum()
    }

    pub fn was_cancelled(&self) -> bool {
        self.units.iter().any(|u| u.status == UnitStatus::Cancelled)
    }

    /// Whether the CLI should exit non-zero.
    pub fn has_failures(&self) -> bool {
        self.failed() > 0 || self.was_cancelled()
    }
}
