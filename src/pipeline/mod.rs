//! Classification-and-extraction pipeline.
//!
//! Every candidate message flows through:
//! 1. `resolve_boundary()` then a hard timestamp filter
//! 2. `SeenSubjects::admit()` for exact-subject dedup
//! 3. `normalize_body()` for one plain-text body
//! 4. `Classifier::classify()` for fast pattern matching (no LLM)
//! 5. `StructuredExtractor::extract()` for company and position
//!
//! `JobPipeline` owns the run and hands sorted rows to an `Exporter`.

pub mod body;
pub mod dedup;
pub mod extractor;
pub mod processor;
pub mod rules;
pub mod types;

pub use processor::{CollectedRows, JobPipeline, PipelineSettings};
pub use rules::{Classifier, RuleSet};
pub use types::{ExportRow, ExtractionResult, ResultRow, RunOutcome, RunStats, Verdict};
