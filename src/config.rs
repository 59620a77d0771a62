//! Process configuration, resolved once at startup.
//!
//! `Config::from_env()` is the only code path that reads the environment.
//! Everything downstream receives the resolved value by parameter.

use std::path::PathBuf;

use chrono_tz::Tz;
use secrecy::SecretString;

use crate::error::ConfigError;

/// Default reference zone for the date boundary and display dates.
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::America::Chicago;

/// Default completion model.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Default OpenAI-compatible API base.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default Gmail REST API base.
pub const DEFAULT_GMAIL_BASE_URL: &str = "https://gmail.googleapis.com/gmail/v1";

/// Default output spreadsheet.
pub const DEFAULT_OUTPUT_PATH: &str = "job_applications.xlsx";

/// Broad server-side predicate. Only an optimization; every message is
/// still hard-filtered by timestamp and content.
pub const DEFAULT_SEARCH_PREDICATE: &str = "\"thanks for applying\" OR \
     \"received your application\" OR \
     \"your application for\" OR \
     \"application for the\" OR \
     \"we're reviewing your application\" OR \
     application";

/// Completion-service settings.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub api_key: SecretString,
    pub base_url: String,
    pub model: String,
}

/// Where candidate messages come from.
#[derive(Debug, Clone)]
pub enum MailSourceConfig {
    /// Gmail REST API with an already-authorized bearer token.
    Gmail {
        access_token: SecretString,
        user_id: String,
        base_url: String,
    },
    /// A local directory of `.eml` files.
    EmlDir { path: PathBuf },
}

/// Fully resolved configuration for one run.
#[derive(Debug, Clone)]
pub struct Config {
    pub completion: CompletionConfig,
    pub mail: MailSourceConfig,
    /// Raw lower-bound date string, if provided.
    pub search_after: Option<String>,
    pub timezone: Tz,
    pub search_predicate: String,
    pub output_path: PathBuf,
}

impl Config {
    /// Build config from environment variables.
    ///
    /// Fails if the completion credential is missing, or if the selected
    /// mail source lacks its own required setting.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    ///
    /// Blank values are treated as absent.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = get("OPENAI_API_KEY")
            .ok_or_else(|| ConfigError::MissingEnvVar("OPENAI_API_KEY".into()))?;

        let completion = CompletionConfig {
            api_key: SecretString::from(api_key),
            base_url: get("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.into()),
            model: get("JOB_TRACKER_MODEL").unwrap_or_else(|| DEFAULT_MODEL.into()),
        };

        let mail = match get("JOB_TRACKER_SOURCE").as_deref() {
            None | Some("gmail") => {
                let token = get("GMAIL_ACCESS_TOKEN")
                    .ok_or_else(|| ConfigError::MissingEnvVar("GMAIL_ACCESS_TOKEN".into()))?;
                MailSourceConfig::Gmail {
                    access_token: SecretString::from(token),
                    user_id: get("GMAIL_USER").unwrap_or_else(|| "me".into()),
                    base_url: get("GMAIL_BASE_URL")
                        .unwrap_or_else(|| DEFAULT_GMAIL_BASE_URL.into()),
                }
            }
            Some("eml") => {
                let dir = get("JOB_TRACKER_EML_DIR")
                    .ok_or_else(|| ConfigError::MissingEnvVar("JOB_TRACKER_EML_DIR".into()))?;
                MailSourceConfig::EmlDir {
                    path: PathBuf::from(dir),
                }
            }
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "JOB_TRACKER_SOURCE".into(),
                    message: format!("expected 'gmail' or 'eml', got '{other}'"),
                });
            }
        };

        let timezone = match get("JOB_TRACKER_TZ") {
            Some(name) => name.parse::<Tz>().map_err(|e| ConfigError::InvalidValue {
                key: "JOB_TRACKER_TZ".into(),
                message: e.to_string(),
            })?,
            None => DEFAULT_TIMEZONE,
        };

        Ok(Self {
            completion,
            mail,
            search_after: get("SEARCH_AFTER"),
            timezone,
            search_predicate: get("JOB_TRACKER_QUERY")
                .unwrap_or_else(|| DEFAULT_SEARCH_PREDICATE.into()),
            output_path: get("JOB_TRACKER_OUTPUT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_PATH)),
        })
    }
}
