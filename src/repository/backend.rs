//! Pluggable search backend trait.
//!
//! The recipe repository only needs document get/insert/replace, an exact
//! URL lookup, text search, and index administration. Elasticsearch is the
//! production backend; the in-memory one serves dry runs and tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::Recipe;

/// Result type for backend operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from search backend operations.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
    /// Optimistic concurrency check failed, or the id already exists.
    #[error("Version conflict on {0}")]
    Conflict(String),
    #[error("Document not found: {0}")]
    NotFound(String),
    #[error("Backend error: {0}")]
    Backend(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Document version for optimistic concurrency (sequence number and
/// primary term, as Elasticsearch reports them).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DocVersion {
    pub seq_no: i64,
    pub primary_term: i64,
}

/// A recipe as read back from the backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredRecipe {
    pub recipe: Recipe,
    pub version: DocVersion,
    /// Relevance score, when returned from a search.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// Which fields a text query runs against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueryScope {
    /// Boosted multi-field match over title, name, description and body.
    #[default]
    AllFields,
    /// Phrase-boosted fuzzy match on the title only (dedup candidates).
    Title,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Relevance,
    CrawlDateDesc,
}

/// A search request. No text means match-all.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub text: Option<String>,
    pub scope: QueryScope,
    /// Matches `categories` or `source_site`.
    pub category: Option<String>,
    /// Only records crawled at or after this instant.
    pub since: Option<DateTime<Utc>>,
    pub from: usize,
    pub size: usize,
    pub sort: SortOrder,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            text: None,
            scope: QueryScope::AllFields,
            category: None,
            since: None,
            from: 0,
            size: 10,
            sort: SortOrder::Relevance,
        }
    }
}

impl SearchQuery {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    /// Candidates for fuzzy title dedup.
    pub fn title_candidates(title: impl Into<String>, size: usize) -> Self {
        Self {
            text: Some(title.into()),
            scope: QueryScope::Title,
            size,
            ..Default::default()
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn page(mut self, from: usize, size: usize) -> Self {
        self.from = from;
        self.size = size;
        self
    }

    pub fn sorted(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }
}

/// Search results with the total hit count.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchHits {
    pub total: u64,
    pub hits: Vec<StoredRecipe>,
}

/// Storage and search operations for recipe records. Every write is
/// visible to reads issued after it returns.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Check the backend is reachable.
    async fn ping(&self) -> StoreResult<()>;

    async fn index_exists(&self) -> StoreResult<bool>;

    async fn create_index(&self) -> StoreResult<()>;

    /// Returns `false` if there was no index to delete.
    async fn delete_index(&self) -> StoreResult<bool>;

    /// Create the index if it does not exist yet.
    async fn ensure_index(&self) -> StoreResult<()> {
        if !self.index_exists().await? {
            self.create_index().await?;
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> StoreResult<Option<StoredRecipe>>;

    /// Insert a new record. Fails with `Conflict` if the id exists.
    async fn insert(&self, recipe: &Recipe) -> StoreResult<DocVersion>;

    /// Replace a record if it is still at `expected`. Fails with
    /// `Conflict` if another writer got there first.
    async fn replace(&self, recipe: &Recipe, expected: DocVersion) -> StoreResult<DocVersion>;

    /// Exact match on the stored URL.
    async fn find_by_url(&self, url: &str) -> StoreResult<Option<StoredRecipe>>;

    async fn search(&self, query: &SearchQuery) -> StoreResult<SearchHits>;
}
