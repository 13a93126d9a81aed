//! Story generation — the injectable collaborator the pipeline calls first.

use async_trait::async_trait;
use tracing::info;

use crate::errors::BookError;
use crate::llm_client::prompts::CHILDREN_AUTHOR_SYSTEM;
use crate::llm_client::LlmClient;
use crate::models::story::{StoryRequest, StoryResult};
use crate::retry::RetryPolicy;
use crate::story::parser::parse_story_text;
use crate::story::prompts::build_story_prompt;

/// Produces the story text for a book. Swap implementations for tests or other backends.
#[async_trait]
pub trait StoryGenerator: Send + Sync {
    async fn generate_story(&self, request: &StoryRequest) -> Result<StoryResult, BookError>;
}

/// Writes the story with a chat-completion model.
pub struct LlmStoryGenerator {
    llm: LlmClient,
    retry: RetryPolicy,
}

impl LlmStoryGenerator {
    pub fn new(llm: LlmClient) -> Self {
        Self {
            llm,
            retry: RetryPolicy::story(),
        }
    }
}

#[async_trait]
impl StoryGenerator for LlmStoryGenerator {
    async fn generate_story(&self, request: &StoryRequest) -> Result<StoryResult, BookError> {
        let prompt = build_story_prompt(
            request.theme.trim(),
            request.effective_style(),
            request.page_count,
        );

        info!(
            "Requesting {}-page story for theme {:?} (model: {})",
            request.page_count,
            request.theme,
            self.llm.model()
        );
        let completion = self
            .retry
            .run("story generation", |_| {
                self.llm.chat(CHILDREN_AUTHOR_SYSTEM, &prompt)
            })
            .await?;

        let parsed = parse_story_text(&completion.content, request.page_count);
        info!(
            "Story parsed: {} pages, visual tags {}",
            parsed.pages.len(),
            if parsed.visual_tags.is_some() { "present" } else { "omitted" }
        );

        Ok(StoryResult {
            pages: parsed.pages,
            visual_tags: parsed.visual_tags.unwrap_or_default(),
            raw_response: completion.raw,
        })
    }
}
