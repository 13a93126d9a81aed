use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "storybook")]
#[command(about = "Generate illustrated children's storybooks")]
#[command(long_about = "\
Generate illustrated children's storybooks

A story is written by a chat model, split into pages, and each page is
illustrated by the visual generation service. Books are stored by theme:

  books/
  └── 海洋星球大冒险/
      ├── metadata.json   # request, visual tags, page text, raw model output
      ├── page_001.png    # one illustration per page, dialogue overlaid
      ├── page_002.png
      └── book.pdf        # assembled from the saved pages

Credentials are read from the environment or a .env file
(VOLC_ACCESS_KEY, VOLC_SECRET_KEY, ARK_API_KEY, ARK_MODEL).")]
#[command(version)]
pub struct Cli {
    /// Book library directory (overrides BOOKS_DIR)
    #[arg(long, global = true)]
    pub books_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Write and illustrate a new book. Re-using a theme overwrites that book
    Generate {
        /// Story theme; also the book's directory name
        #[arg(long)]
        theme: String,

        /// Drawing style, e.g. 卡通, 水彩, 3D
        #[arg(long, default_value = "卡通")]
        style: String,

        /// Number of pages (1-100)
        #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u32).range(1..=100))]
        pages: u32,

        /// Pages generated at once (overrides PAGE_CONCURRENCY)
        #[arg(long)]
        concurrency: Option<usize>,

        /// Skip assembling book.pdf
        #[arg(long)]
        no_pdf: bool,
    },
    /// List generated books
    List,
    /// Delete a book and all of its files
    Delete {
        /// Theme of the book to delete
        theme: String,
    },
}
