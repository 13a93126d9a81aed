// Shared prompt fragments. The story prompt itself lives in story/prompts.rs.

/// Persona shared by every story-writing call.
pub const CHILDREN_AUTHOR_SYSTEM: &str =
    "你是一位专业的儿童文学作家，擅长创作适合绘本的短篇故事。请严格按照以下要求创作：";
