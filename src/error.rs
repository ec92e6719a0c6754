//! Error types for gander, one enum per domain. There is no crate-wide
//! aggregate: each service handles or logs its own domain's failures, and
//! the entry point wraps startup errors in `anyhow`.

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors from the LINE messaging channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Messaging API returned {status}: {body}")]
    Api { status: u16, body: String },
}

/// Errors from the text-generation provider.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Provider returned an empty response")]
    EmptyResponse,
}

/// Errors from the attendance scrape.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("Failed to start browser session: {0}")]
    Session(String),

    #[error("WebDriver command failed: {0}")]
    WebDriver(#[from] fantoccini::error::CmdError),

    #[error("Date filter did not take: expected {expected}, field shows {actual}")]
    FilterMismatch { expected: String, actual: String },

    #[error("Result page never showed {date} after {attempts} attempts")]
    VerificationFailed { date: String, attempts: usize },

    #[error("Attendance table not found in result page")]
    TableNotFound,

    #[error("Failed to parse result page: {0}")]
    Parse(String),
}

/// Errors from the dispatch loop.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("Invalid cron expression {expr:?}: {source}")]
    InvalidCron {
        expr: String,
        #[source]
        source: cron::error::Error,
    },
}
