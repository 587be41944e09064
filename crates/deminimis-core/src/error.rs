use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeMinimisError {
    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Navigation failure: {0}")]
    Navigation(String),

    #[error("Timeout after {seconds}s while {operation}")]
    Timeout { operation: String, seconds: u64 },

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Associate lookup failed: {0}")]
    AssociateLookup(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl DeMinimisError {
    /// Whether this failure points at a broken page contract (selectors,
    /// timeouts) and should be forwarded to the alerting collaborator.
    pub fn is_alertable(&self) -> bool {
        match self {
            DeMinimisError::Timeout { .. } | DeMinimisError::ElementNotFound(_) => true,
            DeMinimisError::Navigation(msg) => {
                let lower = msg.to_lowercase();
                ["timeout", "selector", "element", "not found"]
                    .iter()
                    .any(|k| lower.contains(k))
            }
            _ => false,
        }
    }

    /// Short machine-readable tag, used in alert context maps.
    pub fn kind(&self) -> &'static str {
        match self {
            DeMinimisError::InvalidInput { .. } => "invalid_input",
            DeMinimisError::Parse(_) => "parse",
            DeMinimisError::Navigation(_) => "navigation",
            DeMinimisError::Timeout { .. } => "timeout",
            DeMinimisError::ElementNotFound(_) => "element_not_found",
            DeMinimisError::AssociateLookup(_) => "associate_lookup",
            DeMinimisError::Storage(_) => "storage",
            DeMinimisError::Serialization(_) => "serialization",
            DeMinimisError::Io(_) => "io",
        }
    }
}

impl From<serde_json::Error> for DeMinimisError {
    fn from(e: serde_json::Error) -> Self {
        DeMinimisError::Serialization(e.to_string())
    }
}

impl From<std::io::Error> for DeMinimisError {
    fn from(e: std::io::Error) -> Self {
        DeMinimisError::Io(e.to_string())
    }
}

#[cfg(feature = "csv_export")]
impl From<csv::Error> for DeMinimisError {
    fn from(e: csv::Error) -> Self {
        DeMinimisError::Parse(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_and_missing_element_are_alertable() {
        let t = DeMinimisError::Timeout {
            operation: "waiting for results table".into(),
            seconds: 60,
        };
        assert!(t.is_alertable());
        assert!(DeMinimisError::ElementNotFound("input[name='cfBen']".into()).is_alertable());
    }

    #[test]
    fn test_navigation_alertable_by_message() {
        assert!(DeMinimisError::Navigation("Selector did not match".into()).is_alertable());
        assert!(DeMinimisError::Navigation("page.goto: Timeout 60000ms exceeded".into()).is_alertable());
        assert!(!DeMinimisError::Navigation("connection refused".into()).is_alertable());
    }

    #[test]
    fn test_non_navigation_errors_not_alertable() {
        assert!(!DeMinimisError::Storage("disk full".into()).is_alertable());
        assert!(!DeMinimisError::AssociateLookup("login failed".into()).is_alertable());
    }
}
