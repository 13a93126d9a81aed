//! On-disk book layout:
//!
//! ```text
//! {root}/{theme}/metadata.json
//! {root}/{theme}/page_001.png …
//! {root}/{theme}/book.pdf
//! ```

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::errors::BookError;
use crate::models::book::BookMetadata;
use crate::models::story::StoryRequest;

pub const METADATA_FILE: &str = "metadata.json";
pub const PDF_FILE: &str = "book.pdf";

/// One entry of `BookStore::list_books`.
#[derive(Debug, Clone, Serialize)]
pub struct BookSummary {
    pub theme: String,
    /// Sorted `page_*.png` file names.
    pub images: Vec<String>,
    /// `None` when `metadata.json` exists but cannot be parsed.
    pub metadata: Option<BookMetadata>,
    pub has_pdf: bool,
}

#[derive(Debug, Clone)]
pub struct BookStore {
    root: PathBuf,
}

impl BookStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for a theme. The theme must be a single safe path component.
    pub fn book_dir(&self, theme: &str) -> Result<PathBuf, BookError> {
        StoryRequest::new(theme, "", 1).validate()?;
        Ok(self.root.join(theme.trim()))
    }

    /// Creates the book directory and writes `metadata.json` (pretty, UTF-8).
    pub async fn write_metadata(
        &self,
        theme: &str,
        metadata: &BookMetadata,
    ) -> Result<PathBuf, BookError> {
        let dir = self.book_dir(theme)?;
        tokio::fs::create_dir_all(&dir).await?;
        let json = serde_json::to_vec_pretty(metadata)
            .map_err(|e| BookError::Internal(anyhow::anyhow!("metadata serialization: {e}")))?;
        let path = dir.join(METADATA_FILE);
        tokio::fs::write(&path, json).await?;
        info!("Metadata written: {}", path.display());
        Ok(path)
    }

    /// Removes page images and the PDF, keeping `metadata.json`.
    pub async fn clear_artifacts(&self, theme: &str) -> Result<(), BookError> {
        let dir = self.book_dir(theme)?;
        let mut stale = match tokio::fs::try_exists(&dir).await? {
            true => page_images(&dir).await?,
            false => return Ok(()),
        };
        stale.push(PDF_FILE.to_string());
        for name in stale {
            match tokio::fs::remove_file(dir.join(&name)).await {
                Ok(()) => debug!("Removed stale {name} from book {theme:?}"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    pub async fn read_metadata(&self, theme: &str) -> Result<BookMetadata, BookError> {
        let path = self.book_dir(theme)?.join(METADATA_FILE);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(BookError::NotFound(format!("book {theme:?}")));
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&bytes)
            .map_err(|e| BookError::MalformedResponse(format!("{}: {e}", path.display())))
    }

    /// Every directory under the root that holds a `metadata.json`, sorted by theme.
    /// A missing root is an empty library.
    pub async fn list_books(&self) -> Result<Vec<BookSummary>, BookError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut books = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let dir = entry.path();
            if !tokio::fs::try_exists(dir.join(METADATA_FILE)).await? {
                continue;
            }
            let theme = entry.file_name().to_string_lossy().into_owned();
            let metadata = match self.read_metadata(&theme).await {
                Ok(metadata) => Some(metadata),
                Err(e) => {
                    warn!("Unreadable metadata for book {theme:?}: {e}");
                    None
                }
            };
            books.push(BookSummary {
                images: page_images(&dir).await?,
                has_pdf: tokio::fs::try_exists(dir.join(PDF_FILE)).await?,
                theme,
                metadata,
            });
        }
        books.sort_by(|a, b| a.theme.cmp(&b.theme));
        Ok(books)
    }

    pub async fn delete_book(&self, theme: &str) -> Result<(), BookError> {
        let dir = self.book_dir(theme)?;
        match tokio::fs::metadata(&dir).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(BookError::NotFound(format!("book {theme:?}"))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(BookError::NotFound(format!("book {theme:?}")));
            }
            Err(e) => return Err(e.into()),
        }
        tokio::fs::remove_dir_all(&dir).await?;
        info!("Deleted book {theme:?}");
        Ok(())
    }
}

async fn page_images(dir: &Path) -> Result<Vec<String>, BookError> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut images = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with("page_") && name.ends_with(".png") {
            images.push(name);
        }
    }
    images.sort();
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::story::VisualTags;
    use chrono::Utc;
    use uuid::Uuid;

    fn metadata(theme: &str) -> BookMetadata {
        BookMetadata {
            book_id: Uuid::new_v4(),
            created_at: Utc::now(),
            params: StoryRequest::new(theme, "水彩", 2),
            visual_tags: VisualTags::default(),
            pages: vec!["一".to_string(), "二".to_string()],
            raw_data: serde_json::json!({"id": "chat-1"}),
        }
    }

    #[test]
    fn test_book_dir_rejects_unsafe_themes() {
        let store = BookStore::new("/tmp/books");
        assert_eq!(
            store.book_dir("森林").unwrap(),
            PathBuf::from("/tmp/books/森林")
        );
        assert!(store.book_dir("../etc").is_err());
        assert!(store.book_dir("").is_err());
    }

    #[tokio::test]
    async fn test_metadata_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = BookStore::new(dir.path());
        let written = metadata("森林");

        let path = store.write_metadata("森林", &written).await.unwrap();
        assert!(path.ends_with("森林/metadata.json"));

        let read = store.read_metadata("森林").await.unwrap();
        assert_eq!(read.book_id, written.book_id);
        assert_eq!(read.params, written.params);

        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.contains("水彩"), "metadata keeps non-ASCII text readable");
    }

    #[tokio::test]
    async fn test_list_books_reports_sorted_pages_and_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let store = BookStore::new(dir.path());
        store.write_metadata("海洋", &metadata("海洋")).await.unwrap();
        store.write_metadata("森林", &metadata("森林")).await.unwrap();

        let ocean = dir.path().join("海洋");
        for name in ["page_010.png", "page_002.png", "page_001.png", "notes.txt"] {
            std::fs::write(ocean.join(name), b"x").unwrap();
        }
        std::fs::write(ocean.join(PDF_FILE), b"%PDF").unwrap();
        // no metadata: not a book
        std::fs::create_dir(dir.path().join("scratch")).unwrap();

        let books = store.list_books().await.unwrap();
        assert_eq!(books.len(), 2);

        let ocean = books.iter().find(|b| b.theme == "海洋").unwrap();
        assert_eq!(ocean.images, vec!["page_001.png", "page_002.png", "page_010.png"]);
        assert!(ocean.has_pdf);
        assert!(ocean.metadata.is_some());

        let forest = books.iter().find(|b| b.theme == "森林").unwrap();
        assert!(forest.images.is_empty());
        assert!(!forest.has_pdf);
    }

    #[tokio::test]
    async fn test_list_books_on_missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = BookStore::new(dir.path().join("missing"));
        assert!(store.list_books().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_books_tolerates_corrupt_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let book = dir.path().join("坏书");
        std::fs::create_dir_all(&book).unwrap();
        std::fs::write(book.join(METADATA_FILE), b"{not json").unwrap();

        let books = BookStore::new(dir.path()).list_books().await.unwrap();
        assert_eq!(books.len(), 1);
        assert!(books[0].metadata.is_none());
    }

    #[tokio::test]
    async fn test_clear_artifacts_keeps_metadata_and_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = BookStore::new(dir.path());
        store.write_metadata("森林", &metadata("森林")).await.unwrap();
        let book = dir.path().join("森林");
        for name in ["page_001.png", "page_003.png", PDF_FILE, "notes.txt"] {
            std::fs::write(book.join(name), b"x").unwrap();
        }

        store.clear_artifacts("森林").await.unwrap();

        assert!(book.join(METADATA_FILE).exists());
        assert!(book.join("notes.txt").exists());
        assert!(!book.join("page_001.png").exists());
        assert!(!book.join("page_003.png").exists());
        assert!(!book.join(PDF_FILE).exists());
        // nothing to clear is fine
        store.clear_artifacts("不存在").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_book_removes_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = BookStore::new(dir.path());
        store.write_metadata("森林", &metadata("森林")).await.unwrap();

        store.delete_book("森林").await.unwrap();
        assert!(!dir.path().join("森林").exists());
    }

    #[tokio::test]
    async fn test_delete_missing_book_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = BookStore::new(dir.path()).delete_book("不存在").await.unwrap_err();
        assert!(matches!(err, BookError::NotFound(_)));
    }
}
