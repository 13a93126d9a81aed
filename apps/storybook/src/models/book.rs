use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::story::{StoryRequest, VisualTags};

/// A saved page illustration. The file on disk is the success signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageArtifact {
    pub page_number: u32,
    pub file_path: PathBuf,
    pub overlay_applied: bool,
}

/// Terminal state of one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PageStatus {
    Done { artifact: PageArtifact },
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageOutcome {
    pub page_number: u32,
    pub text: String,
    #[serde(flatten)]
    pub status: PageStatus,
}

impl PageOutcome {
    pub fn artifact(&self) -> Option<&PageArtifact> {
        match &self.status {
            PageStatus::Done { artifact } => Some(artifact),
            PageStatus::Skipped { .. } => None,
        }
    }
}

/// Persisted as `metadata.json` before any page is generated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookMetadata {
    pub book_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub params: StoryRequest,
    pub visual_tags: VisualTags,
    pub pages: Vec<String>,
    pub raw_data: serde_json::Value,
}

/// Returned by the pipeline. Pages are ordered by page number regardless of completion order.
#[derive(Debug, Clone, Serialize)]
pub struct BookManifest {
    pub book_id: Uuid,
    pub theme: String,
    pub directory: PathBuf,
    pub pages: Vec<PageOutcome>,
    pub pdf_path: Option<PathBuf>,
}

impl BookManifest {
    pub fn saved_pages(&self) -> impl Iterator<Item = &PageArtifact> {
        self.pages.iter().filter_map(PageOutcome::artifact)
    }

    pub fn skipped_pages(&self) -> Vec<u32> {
        self.pages
            .iter()
            .filter(|p| p.artifact().is_none())
            .map(|p| p.page_number)
            .collect()
    }
}
