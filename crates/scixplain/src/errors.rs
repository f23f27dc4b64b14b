use thiserror::Error;

/// Everything that can abort a single ask-retrieve-answer flow.
///
/// There is no local recovery: each variant ends the request and is surfaced
/// to the caller as-is.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ExplainError {
    #[error("Could not extract search terms: {0}")]
    TermExtraction(String),

    #[error("No page found for: {0}")]
    NotFound(String),

    #[error("Title is ambiguous (disambiguation page): {0}")]
    AmbiguousTitle(String),

    #[error("Too many tokens in system prompt, try reducing pages: {tokens} (limit {limit})")]
    PromptTooLarge { tokens: usize, limit: usize },

    #[error("Page not found among fetched pages: {0}")]
    PageNotFound(String),

    #[error("Section '{section}' not found in page '{title}'")]
    SectionNotFound { title: String, section: String },

    #[error("Invalid tool call: {0}")]
    InvalidToolCall(String),

    #[error("Model kept requesting tools after {0} rounds")]
    ToolLoopExceeded(usize),

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Upstream error: {0}")]
    Upstream(#[from] anyhow::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExplainError {
    /// Stable snake_case name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            ExplainError::TermExtraction(_) => "term_extraction",
            ExplainError::NotFound(_) => "not_found",
            ExplainError::AmbiguousTitle(_) => "ambiguous_title",
            ExplainError::PromptTooLarge { .. } => "prompt_too_large",
            ExplainError::PageNotFound(_) => "page_not_found",
            ExplainError::SectionNotFound { .. } => "section_not_found",
            ExplainError::InvalidToolCall(_) => "invalid_tool_call",
            ExplainError::ToolLoopExceeded(_) => "tool_loop_exceeded",
            ExplainError::Template(_) => "template",
            ExplainError::Serialization(_) => "serialization",
            ExplainError::Upstream(_) => "upstream",
            ExplainError::Io(_) => "io",
        }
    }
}

pub type ExplainResult<T> = Result<T, ExplainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_too_large_message() {
        let err = ExplainError::PromptTooLarge {
            tokens: 51_234,
            limit: 50_000,
        };
        assert_eq!(err.kind(), "prompt_too_large");
        assert_eq!(
            err.to_string(),
            "Too many tokens in system prompt, try reducing pages: 51234 (limit 50000)"
        );
    }

    #[test]
    fn test_upstream_from_anyhow() {
        let err: ExplainError = anyhow::anyhow!("Server error: 503").into();
        assert_eq!(err.kind(), "upstream");
        assert!(err.to_string().contains("503"));
    }
}
