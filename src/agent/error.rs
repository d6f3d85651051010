//! Error types for the conversational query pipeline

use thiserror::Error;

/// Result type for agent operations
pub type AgentResult<T> = Result<T, AgentError>;

/// Errors raised by pipeline steps and the model gateway
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Error classifying intent: {0}")]
    Classification(Box<AgentError>),

    #[error("Error generating SQL: {0}")]
    Generation(String),

    #[error("Error executing SQL: {0}")]
    Execution(String),

    #[error("Error formatting results: {0}")]
    Formatting(#[from] crate::format::FormatError),

    #[error("Model provider error: {0}")]
    Provider(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error: {status_code} - {message}")]
    Api { status_code: u16, message: String },

    #[error("Timeout error: operation took longer than {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
}

impl AgentError {
    /// Wrap a gateway failure raised while generating SQL
    pub fn generation(source: impl std::fmt::Display) -> Self {
        AgentError::Generation(source.to_string())
    }

    /// Wrap a database failure raised while running generated SQL
    pub fn execution(source: impl std::fmt::Display) -> Self {
        AgentError::Execution(source.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_prefixes() {
        let classification = AgentError::Classification(Box::new(AgentError::Network(
            "connection reset".to_string(),
        )));
        assert_eq!(
            classification.to_string(),
            "Error classifying intent: Network error: connection reset"
        );

        let generation = AgentError::generation("model returned no text");
        assert_eq!(
            generation.to_string(),
            "Error generating SQL: model returned no text"
        );

        let execution = AgentError::execution("no such table: widgets");
        assert_eq!(
            execution.to_string(),
            "Error executing SQL: no such table: widgets"
        );
    }
}
