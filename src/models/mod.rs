//! Data models for larder.

mod crawl;
mod recipe;

pub use crawl::{CrawlSummary, CrawlTask, PageKind};
pub use recipe::{Recipe, RecipePatch};
