//! Crawl run types.

use serde::Serialize;

/// A URL waiting to be fetched, with its distance from the seed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlTask {
    pub url: String,
    pub depth: usize,
}

impl CrawlTask {
    pub fn new(url: impl Into<String>, depth: usize) -> Self {
        Self {
            url: url.into(),
            depth,
        }
    }

    pub fn seed(url: impl Into<String>) -> Self {
        Self::new(url, 0)
    }

    /// Task for a link discovered on this task's page.
    pub fn child(&self, url: impl Into<String>) -> Self {
        Self::new(url, self.depth + 1)
    }
}

/// How a fetched page is processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageKind {
    /// Category or index page: follow links only.
    Listing,
    /// Single recipe page: extract and store, then follow links.
    Detail,
}

impl PageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Listing => "listing",
            Self::Detail => "detail",
        }
    }
}

/// Counters reported at the end of a crawl run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlSummary {
    /// Unique URLs admitted to the queue.
    pub visited: usize,
    pub fetched: usize,
    pub listings: usize,
    pub created: usize,
    pub updated: usize,
    pub duplicates: usize,
    pub rejected: usize,
    /// Pages that could not be fetched, or whose record could not be written.
    pub failed: usize,
    /// Links dropped because they were beyond the depth limit.
    pub skipped_depth: usize,
    pub timed_out: bool,
}
