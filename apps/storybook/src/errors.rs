use thiserror::Error;

/// Application-level error type for book generation.
///
/// `is_transient` drives `RetryPolicy`: only transient variants are retried.
#[derive(Debug, Error)]
pub enum BookError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Transient network error: {0}")]
    TransientNetwork(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Upstream error (code {code:?}): {message}")]
    Upstream { code: Option<i64>, message: String },

    #[error("{operation} failed after {attempts} attempts: {last}")]
    GenerationFailed {
        operation: String,
        attempts: u32,
        #[source]
        last: Box<BookError>,
    },

    #[error("Story generation failed: {0}")]
    StoryGenerationFailed(#[source] Box<BookError>),

    #[error("Page {page} generation failed: {source}")]
    PageGenerationFailed {
        page: u32,
        #[source]
        source: Box<BookError>,
    },

    #[error("Generation cancelled after {saved_pages} saved pages")]
    Cancelled { saved_pages: usize },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl BookError {
    pub fn upstream(message: impl Into<String>) -> Self {
        BookError::Upstream {
            code: None,
            message: message.into(),
        }
    }

    /// Whether a retry could plausibly succeed (network, timeout, 429/5xx, unparseable body).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BookError::TransientNetwork(_) | BookError::MalformedResponse(_)
        )
    }

    /// Stable machine-readable code, logged alongside user-facing failures.
    pub fn code(&self) -> &'static str {
        match self {
            BookError::Configuration(_) => "CONFIGURATION_ERROR",
            BookError::Validation(_) => "VALIDATION_ERROR",
            BookError::TransientNetwork(_) => "TRANSIENT_NETWORK_ERROR",
            BookError::MalformedResponse(_) => "MALFORMED_RESPONSE",
            BookError::Upstream { .. } => "UPSTREAM_ERROR",
            BookError::GenerationFailed { .. } => "GENERATION_FAILED",
            BookError::StoryGenerationFailed(_) => "STORY_GENERATION_FAILED",
            BookError::PageGenerationFailed { .. } => "PAGE_GENERATION_FAILED",
            BookError::Cancelled { .. } => "CANCELLED",
            BookError::NotFound(_) => "NOT_FOUND",
            BookError::Io(_) => "IO_ERROR",
            BookError::Image(_) => "IMAGE_ERROR",
            BookError::Pdf(_) => "PDF_ERROR",
            BookError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message shown to the person running the CLI. Local failures are not echoed verbatim.
    pub fn user_message(&self) -> String {
        match self {
            BookError::Configuration(msg) => format!("Configuration problem: {msg}"),
            BookError::Validation(msg) => format!("Invalid request: {msg}"),
            BookError::StoryGenerationFailed(_) => {
                "The story could not be generated. No book was produced; please retry.".to_string()
            }
            BookError::Cancelled { saved_pages } => {
                format!("Generation cancelled. {saved_pages} page(s) were already saved.")
            }
            BookError::NotFound(msg) => format!("Not found: {msg}"),
            BookError::Io(_) | BookError::Image(_) | BookError::Pdf(_) | BookError::Internal(_) => {
                tracing::error!("Internal error: {self:?}");
                "An internal error occurred while writing the book".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for BookError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            return BookError::MalformedResponse(e.to_string());
        }
        match e.status() {
            Some(status) if is_transient_status(status) => {
                BookError::TransientNetwork(format!("HTTP {status}"))
            }
            Some(status) => BookError::Upstream {
                code: Some(i64::from(status.as_u16())),
                message: e.to_string(),
            },
            // timeouts, connection refusals and other transport failures
            None => BookError::TransientNetwork(e.to_string()),
        }
    }
}

/// 408, 429 and 5xx are worth retrying; any other 4xx means the request itself is wrong.
fn is_transient_status(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 408 | 429) || status.is_server_error()
}

/// Maps a non-success HTTP status into the retry taxonomy.
pub fn classify_status(status: reqwest::StatusCode, body: String) -> BookError {
    if is_transient_status(status) {
        BookError::TransientNetwork(format!("HTTP {status}: {body}"))
    } else {
        BookError::Upstream {
            code: Some(i64::from(status.as_u16())),
            message: body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_network_and_parse_errors_are_transient() {
        assert!(BookError::TransientNetwork("timeout".into()).is_transient());
        assert!(BookError::MalformedResponse("eof".into()).is_transient());
        assert!(!BookError::Validation("page_count".into()).is_transient());
        assert!(!BookError::Configuration("key".into()).is_transient());
        assert!(!BookError::upstream("bad prompt").is_transient());
    }

    #[test]
    fn test_exhausted_retries_are_not_retried_again() {
        let err = BookError::GenerationFailed {
            operation: "image generation".into(),
            attempts: 3,
            last: Box::new(BookError::TransientNetwork("timeout".into())),
        };
        assert!(!err.is_transient());
        assert_eq!(err.code(), "GENERATION_FAILED");
        assert!(err.to_string().contains("3 attempts"));
    }

    #[test]
    fn test_classify_status_server_error_is_transient() {
        let err = classify_status(reqwest::StatusCode::BAD_GATEWAY, "oops".into());
        assert!(err.is_transient());
        let err = classify_status(reqwest::StatusCode::TOO_MANY_REQUESTS, String::new());
        assert!(err.is_transient());
    }

    fn reqwest_error_with_status(code: u16) -> reqwest::Error {
        let response = http::Response::builder().status(code).body("").unwrap();
        reqwest::Response::from(response).error_for_status().unwrap_err()
    }

    #[test]
    fn test_request_timeout_is_transient_on_both_paths() {
        let err = classify_status(reqwest::StatusCode::REQUEST_TIMEOUT, String::new());
        assert!(err.is_transient());
        assert!(BookError::from(reqwest_error_with_status(408)).is_transient());
        assert!(BookError::from(reqwest_error_with_status(429)).is_transient());
        assert!(BookError::from(reqwest_error_with_status(503)).is_transient());
        assert!(matches!(
            BookError::from(reqwest_error_with_status(404)),
            BookError::Upstream { code: Some(404), .. }
        ));
    }

    #[test]
    fn test_classify_status_client_error_is_upstream() {
        let err = classify_status(reqwest::StatusCode::BAD_REQUEST, "bad width".into());
        match err {
            BookError::Upstream { code, message } => {
                assert_eq!(code, Some(400));
                assert_eq!(message, "bad width");
            }
            other => panic!("expected Upstream, got {other:?}"),
        }
    }

    #[test]
    fn test_story_failure_user_message_mentions_no_book() {
        let err = BookError::StoryGenerationFailed(Box::new(BookError::upstream("empty")));
        assert!(err.user_message().contains("No book was produced"));
    }
}
