//! Shared types for the classification-and-extraction pipeline.

use crate::export::ExportSummary;

/// Placeholder for a field the extractor could not determine.
pub const UNKNOWN: &str = "Unknown";

// ── Normalized email ────────────────────────────────────────────────

/// The fields the pipeline needs from one raw message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedEmail {
    pub subject: String,
    pub from: String,
    pub body: String,
    pub timestamp_ms: i64,
}

// ── Classification ──────────────────────────────────────────────────

/// Classifier decision. Binary; the reason is informational.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject(RejectReason),
}

impl Verdict {
    pub fn is_accept(&self) -> bool {
        matches!(self, Self::Accept)
    }

    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Reject(RejectReason::NoPositiveSignal) => "reject_no_positive",
            Self::Reject(RejectReason::NegativeSignal { .. }) => "reject_negative",
        }
    }
}

/// Why a message was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// No confirmation phrase found.
    NoPositiveSignal,
    /// A false-positive phrase vetoed the match.
    NegativeSignal { pattern: String },
}

// ── Extraction ──────────────────────────────────────────────────────

/// Company and position pulled from a confirmation body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionResult {
    pub company: String,
    pub position: String,
}

impl ExtractionResult {
    /// Both fields set to [`UNKNOWN`].
    pub fn unknown() -> Self {
        Self {
            company: UNKNOWN.into(),
            position: UNKNOWN.into(),
        }
    }
}

impl Default for ExtractionResult {
    fn default() -> Self {
        Self::unknown()
    }
}

// ── Rows ────────────────────────────────────────────────────────────

/// An accepted message, with its timestamp kept as the sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRow {
    pub company: String,
    pub position: String,
    pub date: String,
    pub from: String,
    pub subject: String,
    pub timestamp_ms: i64,
}

impl ResultRow {
    /// Drop the sort key.
    pub fn into_export_row(self) -> ExportRow {
        ExportRow {
            company: self.company,
            position: self.position,
            date: self.date,
            from: self.from,
            subject: self.subject,
        }
    }
}

/// A row as handed to the exporter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRow {
    pub company: String,
    pub position: String,
    pub date: String,
    pub from: String,
    pub subject: String,
}

// ── Run results ─────────────────────────────────────────────────────

/// Counters for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Stubs returned by the drained listing.
    pub candidates: usize,
    /// Full messages fetched.
    pub fetched: usize,
    /// Skipped: the source could not parse the message.
    pub malformed: usize,
    /// Skipped: the source reported no timestamp.
    pub missing_timestamp: usize,
    /// Skipped: received before the boundary.
    pub before_boundary: usize,
    /// Skipped: subject already seen this run.
    pub duplicates: usize,
    /// Skipped: classifier rejected.
    pub rejected: usize,
    /// Rows produced.
    pub accepted: usize,
    /// Body parts that could not be decoded (across all messages).
    pub body_decode_failures: usize,
    /// Accepted rows whose extraction fell back to the sentinel.
    pub extraction_failures: usize,
}

/// How a run ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// The mail source returned no candidates at all.
    NoCandidates,
    /// Candidates existed but none survived filtering. Exporter not called.
    NoMatches { stats: RunStats },
    /// Rows were exported.
    Exported {
        stats: RunStats,
        summary: ExportSummary,
    },
}

impl RunOutcome {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::NoCandidates => "no_candidates",
            Self::NoMatches { .. } => "no_matches",
            Self::Exported { .. } => "exported",
        }
    }
}
