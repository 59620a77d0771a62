//! Pipeline orchestrator: mailbox in, ordered confirmation rows out.
//!
//! Flow per run:
//! 1. Resolve the date boundary once
//! 2. Drain every candidate stub from the mail source
//! 3. Per message, in retrieval order: timestamp filter → subject dedup →
//!    body normalization → classifier → LLM extraction → row
//! 4. Stable sort by timestamp, then one exporter call
//!
//! The server-side search is only a pre-filter. The timestamp check here
//! is the one that counts.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, warn};

use crate::boundary::{Boundary, format_display_date, resolve_boundary};
use crate::config::Config;
use crate::error::{MailError, PipelineError};
use crate::export::Exporter;
use crate::mail::source::{MailSource, drain_candidates, search_query};
use crate::mail::types::RawMessage;
use crate::pipeline::body::normalize_body;
use crate::pipeline::dedup::SeenSubjects;
use crate::pipeline::extractor::{Extraction, StructuredExtractor};
use crate::pipeline::rules::Classifier;
use crate::pipeline::types::{ExportRow, NormalizedEmail, ResultRow, RunOutcome, RunStats};

/// The slice of configuration the orchestrator needs.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Raw lower-bound date string. Absent or malformed means "today".
    pub search_after: Option<String>,
    pub timezone: Tz,
    pub search_predicate: String,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            search_after: config.search_after.clone(),
            timezone: config.timezone,
            search_predicate: config.search_predicate.clone(),
        }
    }
}

/// Rows from one pass, sorted, plus what happened along the way.
#[derive(Debug, Clone, Default)]
pub struct CollectedRows {
    pub rows: Vec<ResultRow>,
    pub stats: RunStats,
}

/// Drives one run end to end.
pub struct JobPipeline {
    settings: PipelineSettings,
    source: Arc<dyn MailSource>,
    classifier: Classifier,
    extractor: StructuredExtractor,
    exporter: Arc<dyn Exporter>,
}

impl JobPipeline {
    pub fn new(
        settings: PipelineSettings,
        source: Arc<dyn MailSource>,
        classifier: Classifier,
        extractor: StructuredExtractor,
        exporter: Arc<dyn Exporter>,
    ) -> Self {
        Self {
            settings,
            source,
            classifier,
            extractor,
            exporter,
        }
    }

    /// Run against the current clock.
    pub async fn run(&self) -> Result<RunOutcome, PipelineError> {
        self.run_at(Utc::now()).await
    }

    /// Run with an explicit "now" (used for the boundary fallback).
    ///
    /// The exporter is called at most once, and only with a complete,
    /// sorted, non-empty row set.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<RunOutcome, PipelineError> {
        let CollectedRows { rows, stats } = self.collect_rows(now).await?;

        if stats.candidates == 0 {
            info!("No candidate messages found");
            return Ok(RunOutcome::NoCandidates);
        }
        if rows.is_empty() {
            info!(candidates = stats.candidates, "No confirmations survived filtering");
            return Ok(RunOutcome::NoMatches { stats });
        }

        let export_rows: Vec<ExportRow> = rows.into_iter().map(ResultRow::into_export_row).collect();
        let summary = self.exporter.export(&export_rows)?;

        info!(
            rows = summary.rows,
            path = %summary.output_path.display(),
            "Export complete"
        );
        Ok(RunOutcome::Exported { stats, summary })
    }

    /// Everything up to (not including) the export.
    ///
    /// Mail source failures abort the run, except a single malformed
    /// message, which is skipped. Decode and extraction problems degrade in
    /// place and are only counted.
    pub async fn collect_rows(&self, now: DateTime<Utc>) -> Result<CollectedRows, PipelineError> {
        let tz = self.settings.timezone;
        let boundary = resolve_boundary(self.settings.search_after.as_deref(), now, tz);
        if boundary.fell_back {
            warn!(
                input = ?self.settings.search_after,
                date = %boundary.date,
                "Search date missing or unparseable, using today"
            );
        }

        let query = search_query(&self.settings.search_predicate, &boundary);
        info!(
            source = self.source.name(),
            boundary_ms = boundary.epoch_ms,
            date = %boundary.date,
            "Searching mailbox"
        );

        let stubs = drain_candidates(self.source.as_ref(), &query)
            .await
            .map_err(PipelineError::Listing)?;

        let mut stats = RunStats {
            candidates: stubs.len(),
            ..RunStats::default()
        };
        info!(candidates = stats.candidates, "Candidate listing drained");

        let mut seen = SeenSubjects::new();
        let mut rows = Vec::new();

        for stub in &stubs {
            let raw = match self.source.fetch(&stub.id).await {
                Ok(raw) => raw,
                Err(MailError::Malformed { id, reason }) => {
                    warn!(id = %id, reason = %reason, "Message could not be parsed, skipping");
                    stats.malformed += 1;
                    continue;
                }
                Err(source) => {
                    return Err(PipelineError::Fetch {
                        id: stub.id.clone(),
                        source,
                    });
                }
            };
            stats.fetched += 1;

            if let Some(row) = self
                .process_message(&raw, &boundary, &mut seen, &mut stats)
                .await
            {
                rows.push(row);
            }
        }

        // Stable: equal timestamps keep retrieval order.
        rows.sort_by_key(|row| row.timestamp_ms);

        info!(
            candidates = stats.candidates,
            accepted = stats.accepted,
            duplicates = stats.duplicates,
            rejected = stats.rejected,
            before_boundary = stats.before_boundary,
            malformed = stats.malformed,
            "Filtering complete"
        );
        Ok(CollectedRows { rows, stats })
    }

    async fn process_message(
        &self,
        raw: &RawMessage,
        boundary: &Boundary,
        seen: &mut SeenSubjects,
        stats: &mut RunStats,
    ) -> Option<ResultRow> {
        let Some(timestamp_ms) = raw.timestamp_ms else {
            debug!(id = %raw.id, "No receipt timestamp, skipping");
            stats.missing_timestamp += 1;
            return None;
        };

        if timestamp_ms < boundary.epoch_ms {
            debug!(id = %raw.id, timestamp_ms, "Before boundary, skipping");
            stats.before_boundary += 1;
            return None;
        }

        let subject = raw.subject();
        if !seen.admit(subject) {
            debug!(id = %raw.id, subject, "Duplicate subject, skipping");
            stats.duplicates += 1;
            return None;
        }

        let body = normalize_body(raw.body.as_ref());
        if body.decode_failures > 0 {
            warn!(
                id = %raw.id,
                failures = body.decode_failures,
                "Body parts could not be decoded"
            );
            stats.body_decode_failures += body.decode_failures;
        }

        let email = NormalizedEmail {
            subject: subject.to_string(),
            from: raw.sender().to_string(),
            body: body.text,
            timestamp_ms,
        };

        let verdict = self.classifier.classify(&email.subject, &email.body);
        if !verdict.is_accept() {
            debug!(id = %raw.id, verdict = verdict.label(), "Not a confirmation");
            stats.rejected += 1;
            return None;
        }

        let Extraction {
            result: extraction,
            failure,
        } = self.extractor.extract(&email.body).await;
        if let Some(e) = failure {
            warn!(id = %raw.id, error = %e, "Extraction failed, using placeholder fields");
            stats.extraction_failures += 1;
        }

        stats.accepted += 1;
        debug!(
            id = %raw.id,
            company = %extraction.company,
            position = %extraction.position,
            "Confirmation accepted"
        );

        Some(ResultRow {
            company: extraction.company,
            position: extraction.position,
            date: format_display_date(email.timestamp_ms, self.settings.timezone),
            from: email.from,
            subject: email.subject,
            timestamp_ms: email.timestamp_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::TimeZone;

    use super::*;
    use crate::error::{ExportError, LlmError, MailError};
    use crate::export::ExportSummary;
    use crate::llm::provider::{CompletionRequest, CompletionService, RawCompletion};
    use crate::mail::types::{BodyEncoding, Header, MessageStub, MimeNode, StubPage};

    /// 2025-03-01 00:00 America/Chicago.
    const BOUNDARY_MS: i64 = 1_740_808_800_000;
    const HOUR_MS: i64 = 3_600_000;

    // ── Stubs ───────────────────────────────────────────────────────

    struct MemorySource {
        messages: Vec<RawMessage>,
        queries: Mutex<Vec<String>>,
    }

    impl MemorySource {
        fn new(messages: Vec<RawMessage>) -> Self {
            Self {
                messages,
                queries: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl MailSource for MemorySource {
        fn name(&self) -> &str {
            "memory"
        }

        async fn list_page(
            &self,
            query: &str,
            _page_token: Option<&str>,
        ) -> Result<StubPage, MailError> {
            self.queries.lock().unwrap().push(query.to_string());
            Ok(StubPage {
                stubs: self
                    .messages
                    .iter()
                    .map(|m| MessageStub { id: m.id.clone() })
                    .collect(),
                next_page_token: None,
            })
        }

        async fn fetch(&self, id: &str) -> Result<RawMessage, MailError> {
            self.messages
                .iter()
                .find(|m| m.id == id)
                .cloned()
                .ok_or_else(|| MailError::NotFound { id: id.into() })
        }
    }

    /// Always answers with the same generated text.
    struct FixedLlm {
        content: String,
        calls: Mutex<usize>,
    }

    impl FixedLlm {
        fn new(content: &str) -> Self {
            Self {
                content: content.into(),
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl CompletionService for FixedLlm {
        fn model_name(&self) -> &str {
            "fixed"
        }

        async fn complete(&self, _request: CompletionRequest) -> Result<RawCompletion, LlmError> {
            *self.calls.lock().unwrap() += 1;
            let body = serde_json::json!({
                "choices": [{ "message": { "content": self.content } }]
            });
            Ok(RawCompletion {
                status: 200,
                body: body.to_string(),
            })
        }
    }

    #[derive(Default)]
    struct RecordingExporter {
        calls: Mutex<Vec<Vec<ExportRow>>>,
    }

    impl Exporter for RecordingExporter {
        fn export(&self, rows: &[ExportRow]) -> Result<ExportSummary, ExportError> {
            self.calls.lock().unwrap().push(rows.to_vec());
            Ok(ExportSummary {
                rows: rows.len(),
                output_path: "memory.xlsx".into(),
            })
        }
    }

    // ── Helpers ─────────────────────────────────────────────────────

    fn message(id: &str, timestamp_ms: Option<i64>, subject: &str, body: &str) -> RawMessage {
        RawMessage {
            id: id.into(),
            timestamp_ms,
            headers: vec![
                Header::new("Subject", subject),
                Header::new("From", "Talent <talent@example.com>"),
            ],
            body: Some(MimeNode::text("text/plain", body)),
        }
    }

    fn confirmation(id: &str, timestamp_ms: i64, subject: &str) -> RawMessage {
        message(
            id,
            Some(timestamp_ms),
            subject,
            "Thanks for applying. We have received your application.",
        )
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
    }

    struct Harness {
        pipeline: JobPipeline,
        source: Arc<MemorySource>,
        llm: Arc<FixedLlm>,
        exporter: Arc<RecordingExporter>,
    }

    fn harness(messages: Vec<RawMessage>) -> Harness {
        harness_with(messages, r#"{"company": "Acme", "position": "Engineer"}"#)
    }

    fn harness_with(messages: Vec<RawMessage>, llm_content: &str) -> Harness {
        let source = Arc::new(MemorySource::new(messages));
        let llm = Arc::new(FixedLlm::new(llm_content));
        let exporter = Arc::new(RecordingExporter::default());
        let settings = PipelineSettings {
            search_after: Some("2025/03/01".into()),
            timezone: chrono_tz::America::Chicago,
            search_predicate: "application".into(),
        };
        let pipeline = JobPipeline::new(
            settings,
            source.clone(),
            Classifier::default(),
            StructuredExtractor::new(llm.clone()),
            exporter.clone(),
        );
        Harness {
            pipeline,
            source,
            llm,
            exporter,
        }
    }

    // ── Tests ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn query_carries_predicate_and_date_hint() {
        let h = harness(vec![]);
        h.pipeline.collect_rows(now()).await.unwrap();
        let queries = h.source.queries.lock().unwrap();
        assert_eq!(queries.as_slice(), ["(application) after:2025/03/01"]);
    }

    #[tokio::test]
    async fn rows_sorted_by_timestamp_stable_on_ties() {
        let h = harness(vec![
            confirmation("m1", BOUNDARY_MS + 5 * HOUR_MS, "Late"),
            confirmation("m2", BOUNDARY_MS + HOUR_MS, "Tie first"),
            confirmation("m3", BOUNDARY_MS + HOUR_MS, "Tie second"),
            confirmation("m4", BOUNDARY_MS, "At boundary"),
        ]);

        let collected = h.pipeline.collect_rows(now()).await.unwrap();
        let subjects: Vec<&str> = collected.rows.iter().map(|r| r.subject.as_str()).collect();
        assert_eq!(subjects, ["At boundary", "Tie first", "Tie second", "Late"]);
        assert!(
            collected
                .rows
                .windows(2)
                .all(|w| w[0].timestamp_ms <= w[1].timestamp_ms)
        );
    }

    #[tokio::test]
    async fn row_fields_are_assembled() {
        let h = harness(vec![confirmation("m1", BOUNDARY_MS + HOUR_MS, "Thanks for applying")]);
        let collected = h.pipeline.collect_rows(now()).await.unwrap();
        let row = &collected.rows[0];
        assert_eq!(row.company, "Acme");
        assert_eq!(row.position, "Engineer");
        assert_eq!(row.date, "2025-03-01");
        assert_eq!(row.from, "Talent <talent@example.com>");
        assert_eq!(row.subject, "Thanks for applying");
    }

    #[tokio::test]
    async fn stats_count_each_skip_reason() {
        let h = harness(vec![
            confirmation("ok", BOUNDARY_MS + HOUR_MS, "Accepted"),
            confirmation("old", BOUNDARY_MS - 1, "Too old"),
            message("nots", None, "No timestamp", "Thanks for applying"),
            confirmation("dup", BOUNDARY_MS + 2 * HOUR_MS, "Accepted"),
            message("rej", Some(BOUNDARY_MS + HOUR_MS), "Newsletter", "weekly digest"),
        ]);

        let stats = h.pipeline.collect_rows(now()).await.unwrap().stats;
        assert_eq!(stats.candidates, 5);
        assert_eq!(stats.fetched, 5);
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.before_boundary, 1);
        assert_eq!(stats.missing_timestamp, 1);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.extraction_failures, 0);
    }

    #[tokio::test]
    async fn extractor_only_called_for_accepted_messages() {
        let h = harness(vec![
            confirmation("a", BOUNDARY_MS + HOUR_MS, "One"),
            message("b", Some(BOUNDARY_MS + HOUR_MS), "Two", "nothing relevant"),
            confirmation("c", BOUNDARY_MS - HOUR_MS, "Three"),
        ]);
        h.pipeline.collect_rows(now()).await.unwrap();
        assert_eq!(*h.llm.calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn duplicate_rejected_by_classifier_still_consumes_subject() {
        let h = harness(vec![
            message("a", Some(BOUNDARY_MS + HOUR_MS), "Update", "nothing relevant"),
            message("b", Some(BOUNDARY_MS + 2 * HOUR_MS), "Update", "Thanks for applying"),
        ]);
        let collected = h.pipeline.collect_rows(now()).await.unwrap();
        assert!(collected.rows.is_empty());
        assert_eq!(collected.stats.duplicates, 1);
        assert_eq!(collected.stats.rejected, 1);
    }

    #[tokio::test]
    async fn html_only_body_is_classified() {
        let mut raw = message("h", Some(BOUNDARY_MS + HOUR_MS), "Hello", "");
        raw.body = Some(MimeNode::multipart(
            "multipart/alternative",
            vec![MimeNode::text("text/html", "<p>Thanks&nbsp;for applying!</p>")],
        ));
        let h = harness(vec![raw]);
        assert_eq!(h.pipeline.collect_rows(now()).await.unwrap().rows.len(), 1);
    }

    #[tokio::test]
    async fn undecodable_parts_are_counted_not_fatal() {
        let mut raw = message("x", Some(BOUNDARY_MS + HOUR_MS), "Thanks for applying", "");
        raw.body = Some(MimeNode::Leaf {
            media_type: "text/plain".into(),
            encoding: BodyEncoding::Base64Url,
            data: b"%%%".to_vec(),
        });
        let h = harness(vec![raw]);
        let collected = h.pipeline.collect_rows(now()).await.unwrap();
        assert_eq!(collected.stats.body_decode_failures, 1);
        // Subject alone still carries the positive phrase.
        assert_eq!(collected.rows.len(), 1);
    }

    #[tokio::test]
    async fn bad_extraction_degrades_to_unknown() {
        let h = harness_with(
            vec![confirmation("m", BOUNDARY_MS + HOUR_MS, "Thanks for applying")],
            "not json at all",
        );
        let collected = h.pipeline.collect_rows(now()).await.unwrap();
        assert_eq!(collected.rows[0].company, "Unknown");
        assert_eq!(collected.rows[0].position, "Unknown");
        assert_eq!(collected.stats.extraction_failures, 1);
    }

    #[tokio::test]
    async fn run_with_no_candidates_skips_exporter() {
        let h = harness(vec![]);
        let outcome = h.pipeline.run_at(now()).await.unwrap();
        assert!(matches!(outcome, RunOutcome::NoCandidates));
        assert!(h.exporter.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn run_with_no_matches_skips_exporter() {
        let h = harness(vec![confirmation("old", BOUNDARY_MS - HOUR_MS, "Old")]);
        let stats = match h.pipeline.run_at(now()).await.unwrap() {
            RunOutcome::NoMatches { stats } => stats,
            other => panic!("Expected NoMatches, got {}", other.label()),
        };
        assert_eq!(stats.before_boundary, 1);
        assert!(h.exporter.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn run_exports_once_with_sorted_rows() {
        let h = harness(vec![
            confirmation("b", BOUNDARY_MS + 2 * HOUR_MS, "Second"),
            confirmation("a", BOUNDARY_MS + HOUR_MS, "First"),
        ]);
        let outcome = h.pipeline.run_at(now()).await.unwrap();
        assert!(matches!(outcome, RunOutcome::Exported { ref summary, .. } if summary.rows == 2));

        let calls = h.exporter.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        let subjects: Vec<&str> = calls[0].iter().map(|r| r.subject.as_str()).collect();
        assert_eq!(subjects, ["First", "Second"]);
    }

    #[tokio::test]
    async fn fetch_failure_aborts_run() {
        struct BrokenFetch;

        #[async_trait::async_trait]
        impl MailSource for BrokenFetch {
            fn name(&self) -> &str {
                "broken"
            }
            async fn list_page(
                &self,
                _query: &str,
                _page_token: Option<&str>,
            ) -> Result<StubPage, MailError> {
                Ok(StubPage {
                    stubs: vec![MessageStub { id: "gone".into() }],
                    next_page_token: None,
                })
            }
            async fn fetch(&self, id: &str) -> Result<RawMessage, MailError> {
                Err(MailError::NotFound { id: id.into() })
            }
        }

        let exporter = Arc::new(RecordingExporter::default());
        let pipeline = JobPipeline::new(
            PipelineSettings {
                search_after: None,
                timezone: chrono_tz::America::Chicago,
                search_predicate: "application".into(),
            },
            Arc::new(BrokenFetch),
            Classifier::default(),
            StructuredExtractor::new(Arc::new(FixedLlm::new("{}"))),
            exporter.clone(),
        );

        let err = pipeline.run_at(now()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Fetch { ref id, .. } if id == "gone"));
        assert!(exporter.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_message_is_skipped_and_counted() {
        /// Lists two messages; the first cannot be parsed.
        struct OneBadMessage;

        #[async_trait::async_trait]
        impl MailSource for OneBadMessage {
            fn name(&self) -> &str {
                "one-bad"
            }
            async fn list_page(
                &self,
                _query: &str,
                _page_token: Option<&str>,
            ) -> Result<StubPage, MailError> {
                Ok(StubPage {
                    stubs: vec![
                        MessageStub { id: "deep".into() },
                        MessageStub { id: "good".into() },
                    ],
                    next_page_token: None,
                })
            }
            async fn fetch(&self, id: &str) -> Result<RawMessage, MailError> {
                match id {
                    "good" => Ok(confirmation("good", BOUNDARY_MS + HOUR_MS, "Thanks for applying")),
                    _ => Err(MailError::Malformed {
                        id: id.into(),
                        reason: "recursion limit exceeded".into(),
                    }),
                }
            }
        }

        let exporter = Arc::new(RecordingExporter::default());
        let pipeline = JobPipeline::new(
            PipelineSettings {
                search_after: Some("2025/03/01".into()),
                timezone: chrono_tz::America::Chicago,
                search_predicate: "application".into(),
            },
            Arc::new(OneBadMessage),
            Classifier::default(),
            StructuredExtractor::new(Arc::new(FixedLlm::new(
                r#"{"company": "Acme", "position": "Engineer"}"#,
            ))),
            exporter.clone(),
        );

        let stats = match pipeline.run_at(now()).await.unwrap() {
            RunOutcome::Exported { stats, .. } => stats,
            other => panic!("Expected Exported, got {}", other.label()),
        };
        assert_eq!(stats.candidates, 2);
        assert_eq!(stats.malformed, 1);
        assert_eq!(stats.fetched, 1);
        assert_eq!(stats.accepted, 1);

        let calls = exporter.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0][0].subject, "Thanks for applying");
    }

    #[tokio::test]
    async fn malformed_boundary_falls_back_to_today() {
        let mut h = harness(vec![
            confirmation("y", BOUNDARY_MS + HOUR_MS, "Earlier this month"),
        ]);
        h.pipeline.settings.search_after = Some("not-a-date".into());
        let collected = h.pipeline.collect_rows(now()).await.unwrap();
        // "now" is 2025-03-10, so a 2025-03-01 message predates today's start.
        assert!(collected.rows.is_empty());
        assert_eq!(collected.stats.before_boundary, 1);
    }
}
