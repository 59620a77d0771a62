//! Heuristic classifier for job-application confirmations.
//!
//! Rule-based, no LLM. Subject and body are scanned together:
//! - no positive pattern matches → reject
//! - any negative pattern matches → reject
//! - otherwise → accept
//!
//! Rule tables are plain values handed to `Classifier::new`, so tests can
//! substitute their own without touching shared state.

use regex::Regex;
use tracing::debug;

use crate::pipeline::types::{RejectReason, Verdict};

/// A single phrase pattern with a compiled regex.
#[derive(Debug, Clone)]
pub struct PatternRule {
    /// Human-readable label, used in logs and reject reasons.
    pub label: String,
    /// Compiled, unanchored regex.
    pub regex: Regex,
}

impl PatternRule {
    pub fn new(label: &str, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            label: label.into(),
            regex: Regex::new(pattern)?,
        })
    }

    fn builtin(label: &str, pattern: &str) -> Self {
        Self::new(label, pattern).expect("built-in pattern compiles")
    }
}

/// Positive and negative phrase tables.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    pub positive: Vec<PatternRule>,
    pub negative: Vec<PatternRule>,
}

impl RuleSet {
    /// Phrases seen in real application confirmations, and the usual
    /// false positives that also say "application" or "statement".
    pub fn default_rules() -> Self {
        let positive = vec![
            PatternRule::builtin("thanks for applying", r"(?i)\bthanks for applying\b"),
            PatternRule::builtin(
                "received your application",
                r"(?i)\bwe( have)? received your application\b",
            ),
            PatternRule::builtin("your application for/to", r"(?i)\byour application (for|to)\b"),
            PatternRule::builtin(
                "application for ... position/role",
                r"(?i)\bapplication for (the )?.+\b(position|role)\b",
            ),
            PatternRule::builtin(
                "reviewing your application",
                r"(?i)\bwe('?re| are) reviewing your application\b",
            ),
            PatternRule::builtin("you applied to", r"(?i)\byou applied to\b"),
            PatternRule::builtin(
                "for the ... position/role",
                r"(?i)\bfor the (.+?) (position|role)\b",
            ),
        ];

        let negative = vec![
            PatternRule::builtin("credit card", r"(?i)\bcredit card\b"),
            PatternRule::builtin("statement", r"(?i)\bstatements?\b"),
            PatternRule::builtin("newsletter", r"(?i)\bnewsletters?\b"),
            PatternRule::builtin("mobile application", r"(?i)\bmobile application\b"),
            PatternRule::builtin("app store", r"(?i)\bapp store\b"),
            PatternRule::builtin("program application", r"(?i)\bprogram application\b"),
            PatternRule::builtin("visiting students", r"(?i)\bvisiting students\b"),
            PatternRule::builtin("financial aid", r"(?i)\bfinancial aid\b"),
            PatternRule::builtin("billing", r"(?i)\bbilling\b"),
        ];

        Self { positive, negative }
    }

    /// No rules at all. Rejects everything (nothing positive can match).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Add a custom positive pattern.
    pub fn add_positive(&mut self, label: &str, pattern: &str) -> Result<(), regex::Error> {
        self.positive.push(PatternRule::new(label, pattern)?);
        Ok(())
    }

    /// Add a custom negative pattern.
    pub fn add_negative(&mut self, label: &str, pattern: &str) -> Result<(), regex::Error> {
        self.negative.push(PatternRule::new(label, pattern)?);
        Ok(())
    }
}

/// Accept/reject gate over `(subject, body)`.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: RuleSet,
}

impl Classifier {
    pub fn new(rules: RuleSet) -> Self {
        Self { rules }
    }

    /// Classify a message. Either field may be empty.
    pub fn classify(&self, subject: &str, body: &str) -> Verdict {
        let text = format!("{subject}\n{body}");

        let Some(hit) = self.rules.positive.iter().find(|r| r.regex.is_match(&text)) else {
            return Verdict::Reject(RejectReason::NoPositiveSignal);
        };

        if let Some(veto) = self.rules.negative.iter().find(|r| r.regex.is_match(&text)) {
            debug!(
                positive = %hit.label,
                negative = %veto.label,
                "Negative pattern vetoed match"
            );
            return Verdict::Reject(RejectReason::NegativeSignal {
                pattern: veto.label.clone(),
            });
        }

        Verdict::Accept
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(RuleSet::default_rules())
    }
}
