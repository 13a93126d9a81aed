use serde::{Deserialize, Serialize};

use crate::errors::BookError;

/// Drawing style used when the request leaves it blank ("cartoon").
pub const DEFAULT_STYLE: &str = "卡通";
/// Upper bound on pages per book.
pub const MAX_PAGE_COUNT: u32 = 100;
/// Most filesystems cap a single path component at 255 bytes.
pub const MAX_THEME_BYTES: usize = 255;
/// Text used for pages the story model did not produce.
pub const PLACEHOLDER_PAGE: &str = "（本页内容待补充）";

/// What the caller asked for. Validate before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryRequest {
    pub theme: String,
    #[serde(default)]
    pub style: String,
    pub page_count: u32,
}

impl StoryRequest {
    pub fn new(theme: impl Into<String>, style: impl Into<String>, page_count: u32) -> Self {
        Self {
            theme: theme.into(),
            style: style.into(),
            page_count,
        }
    }

    /// Rejects empty themes, zero page counts, and themes that cannot name a
    /// single directory (the theme keys the book's directory on disk).
    pub fn validate(&self) -> Result<(), BookError> {
        let theme = self.theme.trim();
        if theme.is_empty() {
            return Err(BookError::Validation("theme cannot be empty".to_string()));
        }
        if self.page_count == 0 {
            return Err(BookError::Validation(
                "page_count must be positive".to_string(),
            ));
        }
        if self.page_count > MAX_PAGE_COUNT {
            return Err(BookError::Validation(format!(
                "page_count must be at most {MAX_PAGE_COUNT}"
            )));
        }
        if theme.len() > MAX_THEME_BYTES {
            return Err(BookError::Validation(format!(
                "theme is {} bytes; at most {MAX_THEME_BYTES} fit in a directory name",
                theme.len()
            )));
        }
        if theme == "."
            || theme == ".."
            || theme.chars().any(|c| c == '/' || c == '\\' || c.is_control())
        {
            return Err(BookError::Validation(format!(
                "theme {theme:?} cannot be used as a book directory name"
            )));
        }
        Ok(())
    }

    pub fn effective_style(&self) -> &str {
        let style = self.style.trim();
        if style.is_empty() {
            DEFAULT_STYLE
        } else {
            style
        }
    }
}

/// Structured hints trailing the generated story, used to steer image prompts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualTags {
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub objects: Vec<String>,
}

/// Output of the story collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryResult {
    pub pages: Vec<String>,
    pub visual_tags: VisualTags,
    /// Untouched upstream response, persisted for auditing.
    pub raw_response: serde_json::Value,
}

impl StoryResult {
    /// Pads with `PLACEHOLDER_PAGE` or truncates so exactly `page_count` pages remain.
    pub fn normalize_page_count(mut self, page_count: u32) -> Self {
        self.pages = fit_pages(self.pages, page_count as usize);
        self
    }
}

pub fn fit_pages(mut pages: Vec<String>, page_count: usize) -> Vec<String> {
    pages.truncate(page_count);
    pages.resize(page_count, PLACEHOLDER_PAGE.to_string());
    pages
}
