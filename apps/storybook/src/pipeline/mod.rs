// Book orchestration: page planning, on-disk storage, and the end-to-end pipeline.

pub mod book;
pub mod page_plan;
pub mod storage;

pub use book::StoryPipeline;
pub use storage::BookStore;
