pub mod book;
pub mod story;

pub use story::StoryRequest;
