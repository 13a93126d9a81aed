// Story generation: prompt construction, the chat call, and parsing the reply
// into pages and visual tags. All LLM calls go through llm_client.

pub mod generator;
pub mod parser;
pub mod prompts;

pub use generator::{LlmStoryGenerator, StoryGenerator};
