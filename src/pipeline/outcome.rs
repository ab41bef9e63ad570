//! Per-device outcomes and the typed failure each stage returns.

use std::fmt;

use serde::Serialize;

/// What happened to one hardware identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineOutcome {
    Installed,
    /// The catalog has no entry for the identifier.
    NotFound,
    ResolutionFailed,
    FetchFailed,
    ExtractFailed,
    InstallFailed,
}

impl PipelineOutcome {
    /// All outcomes, in pipeline order.
    pub const ALL: [PipelineOutcome; 6] = [
        PipelineOutcome::Installed,
        PipelineOutcome::NotFound,
        PipelineOutcome::ResolutionFailed,
        PipelineOutcome::FetchFailed,
        PipelineOutcome::ExtractFailed,
        PipelineOutcome::InstallFailed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineOutcome::Installed => "installed",
            PipelineOutcome::NotFound => "not found",
            PipelineOutcome::ResolutionFailed => "resolution failed",
            PipelineOutcome::FetchFailed => "fetch failed",
            PipelineOutcome::ExtractFailed => "extract failed",
            PipelineOutcome::InstallFailed => "install failed",
        }
    }
}

impl fmt::Display for PipelineOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stage stopped the pipeline for the current identifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StageFailure {
    pub outcome: PipelineOutcome,
    pub detail: String,
}

impl StageFailure {
    fn new(outcome: PipelineOutcome, detail: impl Into<String>) -> Self {
        Self {
            outcome,
            detail: detail.into(),
        }
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(PipelineOutcome::NotFound, detail)
    }

    pub fn resolution(detail: impl Into<String>) -> Self {
        Self::new(PipelineOutcome::ResolutionFailed, detail)
    }

    pub fn fetch(detail: impl Into<String>) -> Self {
        Self::new(PipelineOutcome::FetchFailed, detail)
    }

    pub fn extract(detail: impl Into<String>) -> Self {
        Self::new(PipelineOutcome::ExtractFailed, detail)
    }

    pub fn install(detail: impl Into<String>) -> Self {
        Self::new(PipelineOutcome::InstallFailed, detail)
    }
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.outcome, self.detail)
    }
}
