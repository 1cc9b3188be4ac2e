use serde_json::Value;
use thiserror::Error;

pub const RATE_LIMIT_USER_MESSAGE: &str =
    "API rate limit reached. Please wait a moment and try again.";

const RESOURCE_EXHAUSTED: &str = "RESOURCE_EXHAUSTED";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    MissingInput(String),
    #[error("{0}")]
    MissingCredential(String),
    #[error("Upstream request failed{}: {message}", status_suffix(.status))]
    UpstreamError {
        status: Option<u16>,
        message: String,
        details: Option<Value>,
    },
    #[error("Upstream rate limit reached: {message}")]
    RateLimited {
        message: String,
        details: Option<Value>,
    },
    #[error("Model output could not be parsed: {message}")]
    MalformedModelOutput { message: String, raw: String },
}

fn status_suffix(status: &Option<u16>) -> String {
    status
        .map(|status| format!(" with status {status}"))
        .unwrap_or_default()
}

impl PipelineError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingInput(_) => "MissingInput",
            Self::MissingCredential(_) => "MissingCredential",
            Self::UpstreamError { .. } => "UpstreamError",
            Self::RateLimited { .. } => "RateLimited",
            Self::MalformedModelOutput { .. } => "MalformedModelOutput",
        }
    }

    /// Text meant to be shown to the end user as-is.
    pub fn user_message(&self) -> String {
        match self {
            Self::MissingInput(message) | Self::MissingCredential(message) => message.clone(),
            Self::UpstreamError { message, .. } => message.clone(),
            Self::RateLimited { .. } => RATE_LIMIT_USER_MESSAGE.to_string(),
            Self::MalformedModelOutput { message, .. } => message.clone(),
        }
    }

    /// Builds the error for a non-success upstream response, promoting quota
    /// exhaustion to `RateLimited`.
    pub fn from_upstream(status: u16, message: String, details: Option<Value>) -> Self {
        let envelope_limited = details.as_ref().is_some_and(is_rate_limit_envelope);
        if status == 429 || envelope_limited || is_rate_limit_text(&message) {
            return Self::RateLimited { message, details };
        }
        Self::UpstreamError {
            status: Some(status),
            message,
            details,
        }
    }

    /// Raw upstream payload, when one was received.
    pub fn details(&self) -> Option<&Value> {
        match self {
            Self::UpstreamError { details, .. } | Self::RateLimited { details, .. } => {
                details.as_ref()
            }
            _ => None,
        }
    }

    pub fn transport(message: String) -> Self {
        Self::UpstreamError {
            status: None,
            message,
            details: None,
        }
    }
}

/// Quota markers in a human-readable message. `429` only counts as a
/// standalone number.
pub fn is_rate_limit_text(text: &str) -> bool {
    text.contains(RESOURCE_EXHAUSTED)
        || text.to_ascii_lowercase().contains("quota")
        || text
            .split(|ch: char| !ch.is_ascii_alphanumeric())
            .any(|word| word == "429")
}

// Google-style envelopes carry `code`/`status` under `error` or at the top level.
fn is_rate_limit_envelope(details: &Value) -> bool {
    [details.get("error"), Some(details)]
        .into_iter()
        .flatten()
        .any(|envelope| {
            envelope.get("code").and_then(Value::as_u64) == Some(429)
                || envelope.get("status").and_then(Value::as_str) == Some(RESOURCE_EXHAUSTED)
        })
}
