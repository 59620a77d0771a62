//! Error types for the job tracker.

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Mail source errors. All but `Malformed` abort the run.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("HTTP request to {source_name} failed: {reason}")]
    Http { source_name: String, reason: String },

    #[error("{source_name} returned status {status}: {body}")]
    Status {
        source_name: String,
        status: u16,
        body: String,
    },

    #[error("Malformed response from {source_name}: {reason}")]
    InvalidResponse { source_name: String, reason: String },

    #[error("Message {id} not found")]
    NotFound { id: String },

    /// One message could not be parsed. Skipped, not fatal.
    #[error("Message {id} is malformed: {reason}")]
    Malformed { id: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Completion-service transport errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },
}

/// Why structured extraction fell back to the sentinel result.
///
/// Never propagated past the extractor's caller; it exists so the
/// orchestrator can log and count degraded rows.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("completion request failed: {0}")]
    Transport(#[from] LlmError),

    #[error("response envelope has no generated content: {0}")]
    MissingContent(String),

    #[error("generated text is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("generated JSON is not an object")]
    NotAnObject,
}

/// Spreadsheet export errors.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Spreadsheet error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Pipeline-related errors.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Candidate listing failed: {0}")]
    Listing(MailError),

    #[error("Fetching message {id} failed: {source}")]
    Fetch {
        id: String,
        #[source]
        source: MailError,
    },

    #[error("Export failed: {0}")]
    Export(#[from] ExportError),
}
