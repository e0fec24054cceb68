//! Error types for the dispatch engine
//!
//! Per-call failures are recovered locally and turned into structured results;
//! only configuration inconsistencies surface as errors from construction.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Maximum length of an error message handed back to a dispatch caller
const MAX_ERROR_MESSAGE_LEN: usize = 500;

static SECRET_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?i)(password|token|key|secret)[=:]\s*\S+").ok());

static SENSITIVE_PATH_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"/[a-zA-Z0-9._/-]+/(secrets?|\.ssh|\.aws|\.config)/[a-zA-Z0-9._/-]+").ok()
});

/// Failure raised at an agent boundary (execution or health check)
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AgentError {
    #[error("Agent execution failed: {message}")]
    ExecutionFailed { message: String },

    #[error("Agent panicked: {message}")]
    Panicked { message: String },

    #[error("Agent timed out after {timeout_ms}ms")]
    TimedOut { timeout_ms: u64 },

    #[error("Agent unavailable: {message}")]
    Unavailable { message: String },
}

impl AgentError {
    /// Create execution failure error
    pub fn execution_failed<S: Into<String>>(message: S) -> Self {
        Self::ExecutionFailed {
            message: message.into(),
        }
    }

    /// Create unavailable error
    pub fn unavailable<S: Into<String>>(message: S) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Build an error from a caught panic payload
    pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::Panicked { message }
    }

    /// Message suitable for returning to a dispatch caller
    pub fn to_public_message(&self) -> String {
        sanitize_error_message(&self.to_string())
    }
}

/// Errors returned by the dispatcher's fallible surface
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("No agent matched the input")]
    NoAgentMatched,

    #[error("Agent not found: {0}")]
    AgentNotFound(String),
}

/// Result type for agent operations
pub type AgentResult<T> = Result<T, AgentError>;

/// Mask secrets and sensitive paths and cap the length of an error message
pub fn sanitize_error_message(message: &str) -> String {
    let mut sanitized = message.to_string();

    if let Some(re) = SECRET_PATTERN.as_ref() {
        sanitized = re.replace_all(&sanitized, "${1}=***").to_string();
    }

    if let Some(re) = SENSITIVE_PATH_PATTERN.as_ref() {
        sanitized = re.replace_all(&sanitized, "/***REDACTED***/").to_string();
    }

    if sanitized.len() > MAX_ERROR_MESSAGE_LEN {
        let suffix = "...[truncated]";
        let mut cut = MAX_ERROR_MESSAGE_LEN - suffix.len();
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized = format!("{}{}", &sanitized[..cut], suffix);
    }

    sanitized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_error_display() {
        let err = AgentError::execution_failed("smtp refused");
        assert_eq!(err.to_string(), "Agent execution failed: smtp refused");

        let err = AgentError::TimedOut { timeout_ms: 250 };
        assert_eq!(err.to_string(), "Agent timed out after 250ms");
    }

    #[test]
    fn test_from_panic_payloads() {
        let err = AgentError::from_panic(Box::new("boom"));
        assert_eq!(
            err,
            AgentError::Panicked {
                message: "boom".to_string()
            }
        );

        let err = AgentError::from_panic(Box::new(String::from("owned boom")));
        assert!(err.to_string().contains("owned boom"));

        let err = AgentError::from_panic(Box::new(42_u32));
        assert!(err.to_string().contains("non-string panic payload"));
    }

    #[test]
    fn test_sanitize_masks_secrets() {
        let sanitized = sanitize_error_message("login failed: password=hunter2 for user");
        assert!(!sanitized.contains("hunter2"));
        assert!(sanitized.contains("password=***"));

        let sanitized = sanitize_error_message("bad token: abc123");
        assert!(!sanitized.contains("abc123"));
    }

    #[test]
    fn test_sanitize_redacts_paths() {
        let sanitized = sanitize_error_message("cannot read /home/user/.ssh/id_rsa");
        assert!(sanitized.contains("/***REDACTED***/"));
        assert!(!sanitized.contains("id_rsa"));
    }

    #[test]
    fn test_sanitize_truncates_long_messages() {
        let long = "x".repeat(1000);
        let sanitized = sanitize_error_message(&long);
        assert!(sanitized.len() <= MAX_ERROR_MESSAGE_LEN);
        assert!(sanitized.ends_with("...[truncated]"));
    }

    #[test]
    fn test_sanitize_truncates_on_char_boundary() {
        let long = "š".repeat(600);
        let sanitized = sanitize_error_message(&long);
        assert!(sanitized.len() <= MAX_ERROR_MESSAGE_LEN);
        assert!(sanitized.ends_with("...[truncated]"));
    }

    #[test]
    fn test_public_message_is_sanitized() {
        let err = AgentError::execution_failed("api key=sk-live-123 rejected");
        let public = err.to_public_message();
        assert!(!public.contains("sk-live-123"));
    }
}
