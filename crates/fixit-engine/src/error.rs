use thiserror::Error;

/// Failures the core lets escape to its caller.
///
/// Auxiliary operations never return these; they absorb them into a
/// documented default and report the cause as a `fallback_reason`.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Missing or unusable credential for a capability tier.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Structured output that is not valid JSON or violates the schema.
    #[error("model response error: {0}")]
    ModelResponse(String),

    /// Network, timeout, quota or non-success HTTP status.
    #[error("transport error: {0}")]
    Transport(String),

    /// Caller-supplied image text that could not be decoded.
    #[error("invalid image payload: {0}")]
    InvalidImage(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

pub(crate) fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut parts = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if parts
            .last()
            .map(|existing: &String| existing == trimmed)
            .unwrap_or(false)
        {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        return truncate_text(&err.to_string(), max_chars);
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
