//! Dedup and upsert gate for recipe records.
//!
//! Every write goes through here. `create` refuses records whose URL is
//! already stored or whose title fuzzily matches a stored title; `update`
//! merges a patch with an optimistic, bounded retry on version conflicts.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, warn};

use super::backend::{SearchBackend, SearchQuery, StoreError, StoredRecipe};
use super::similarity::title_similarity;
use crate::models::{Recipe, RecipePatch};

/// Default similarity at or above which two titles are the same recipe.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.8;

/// Candidates fetched from the backend for fuzzy title comparison.
const TITLE_CANDIDATES: usize = 5;

/// Errors from the recipe repository.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("URL already stored as {existing_id}: {url}")]
    DuplicateUrl { url: String, existing_id: String },
    #[error("title {title:?} matches stored recipe {existing_id} ({similarity:.2})")]
    DuplicateTitle {
        title: String,
        existing_id: String,
        similarity: f64,
    },
    #[error("recipe not found: {0}")]
    NotFound(String),
    #[error("gave up on {id} after {attempts} conflicting writes")]
    ConflictRetriesExhausted { id: String, attempts: u32 },
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Result of a `create` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CreateOutcome {
    Created(Recipe),
    /// A record with the same URL exists.
    DuplicateUrl(StoredRecipe),
    /// A record with a fuzzily matching title exists.
    DuplicateTitle {
        existing: StoredRecipe,
        similarity: f64,
    },
}

impl CreateOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, CreateOutcome::Created(_))
    }

    /// The stored record this one duplicates.
    pub fn existing(&self) -> Option<&StoredRecipe> {
        match self {
            CreateOutcome::Created(_) => None,
            CreateOutcome::DuplicateUrl(existing) => Some(existing),
            CreateOutcome::DuplicateTitle { existing, .. } => Some(existing),
        }
    }
}

/// Dedup and retry settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RepositoryConfig {
    pub similarity_threshold: f64,
    /// Write attempts made by `update` before giving up on conflicts.
    pub conflict_retries: u32,
    /// First backoff after a conflict; doubles on each retry.
    pub conflict_backoff: Duration,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            conflict_retries: 3,
            conflict_backoff: Duration::from_millis(50),
        }
    }
}

/// Recipe storage with URL and fuzzy-title dedup.
pub struct RecipeRepository {
    backend: Arc<dyn SearchBackend>,
    config: RepositoryConfig,
}

impl RecipeRepository {
    pub fn new(backend: Arc<dyn SearchBackend>) -> Self {
        Self::with_config(backend, RepositoryConfig::default())
    }

    pub fn with_config(backend: Arc<dyn SearchBackend>, config: RepositoryConfig) -> Self {
        Self { backend, config }
    }

    pub fn backend(&self) -> &Arc<dyn SearchBackend> {
        &self.backend
    }

    pub fn config(&self) -> RepositoryConfig {
        self.config
    }

    /// Exact lookup by stored URL.
    pub async fn find_by_url(&self, url: &str) -> RepositoryResult<Option<StoredRecipe>> {
        Ok(self.backend.find_by_url(url).await?)
    }

    pub async fn get(&self, id: &str) -> RepositoryResult<Option<StoredRecipe>> {
        Ok(self.backend.get(id).await?)
    }

    /// Best stored match for a title, if its similarity reaches the
    /// threshold.
    pub async fn find_existing(&self, title: &str) -> RepositoryResult<Option<(StoredRecipe, f64)>> {
        self.find_similar_title(title, None).await
    }

    async fn find_similar_title(
        &self,
        title: &str,
        exclude_id: Option<&str>,
    ) -> RepositoryResult<Option<(StoredRecipe, f64)>> {
        if title.trim().is_empty() {
            return Ok(None);
        }
        let candidates = self
            .backend
            .search(&SearchQuery::title_candidates(title, TITLE_CANDIDATES))
            .await?;

        let best = candidates
            .hits
            .into_iter()
            .filter(|c| exclude_id != Some(c.recipe.id.as_str()))
            .map(|c| {
                let similarity = title_similarity(title, &c.recipe.title);
                (c, similarity)
            })
            .filter(|(_, similarity)| *similarity >= self.config.similarity_threshold)
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        Ok(best)
    }

    /// Store a new record unless its URL or title is already known.
    pub async fn create(&self, recipe: &Recipe) -> RepositoryResult<CreateOutcome> {
        if let Some(existing) = self.backend.find_by_url(&recipe.url).await? {
            debug!("URL already stored: {}", recipe.url);
            return Ok(CreateOutcome::DuplicateUrl(existing));
        }

        if let Some((existing, similarity)) = self.find_existing(&recipe.title).await? {
            debug!(
                "Title {:?} matches {:?} ({:.2})",
                recipe.title, existing.recipe.title, similarity
            );
            return Ok(CreateOutcome::DuplicateTitle {
                existing,
                similarity,
            });
        }

        match self.backend.insert(recipe).await {
            Ok(_) => Ok(CreateOutcome::Created(recipe.clone())),
            Err(StoreError::Conflict(_)) => {
                // Lost a race with another writer on the same URL.
                match self.backend.find_by_url(&recipe.url).await? {
                    Some(existing) => Ok(CreateOutcome::DuplicateUrl(existing)),
                    None => Err(StoreError::Conflict(recipe.id.clone()).into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Merge a patch into a stored record and refresh its crawl date.
    ///
    /// Changed URLs and titles are re-checked against other records; an
    /// unchanged value is not. Version conflicts are retried with
    /// exponential backoff up to the configured attempt count.
    pub async fn update(&self, id: &str, patch: &RecipePatch) -> RepositoryResult<Recipe> {
        let attempts = self.config.conflict_retries.max(1);
        let mut backoff = self.config.conflict_backoff;

        for attempt in 1..=attempts {
            let current = self
                .backend
                .get(id)
                .await?
                .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;

            self.check_changed_fields(&current.recipe, patch).await?;

            let mut updated = current.recipe.clone();
            patch.apply(&mut updated);
            updated.id = current.recipe.id.clone();
            updated.crawl_date = Utc::now();

            match self.backend.replace(&updated, current.version).await {
                Ok(_) => return Ok(updated),
                Err(StoreError::Conflict(_)) if attempt < attempts => {
                    warn!(
                        "Version conflict updating {} (attempt {}/{}), retrying in {:?}",
                        id, attempt, attempts, backoff
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(StoreError::Conflict(_)) => break,
                Err(e) => return Err(e.into()),
            }
        }

        Err(RepositoryError::ConflictRetriesExhausted {
            id: id.to_string(),
            attempts,
        })
    }

    async fn check_changed_fields(&self, current: &Recipe, patch: &RecipePatch) -> RepositoryResult<()> {
        if let Some(url) = patch.url.as_deref().filter(|u| *u != current.url) {
            if let Some(other) = self.backend.find_by_url(url).await? {
                if other.recipe.id != current.id {
                    return Err(RepositoryError::DuplicateUrl {
                        url: url.to_string(),
                        existing_id: other.recipe.id,
                    });
                }
            }
        }

        if let Some(title) = patch.title.as_deref().filter(|t| *t != current.title) {
            if let Some((other, similarity)) = self.find_similar_title(title, Some(&current.id)).await? {
                return Err(RepositoryError::DuplicateTitle {
                    title: title.to_string(),
                    existing_id: other.recipe.id,
                    similarity,
                });
            }
        }

        Ok(())
    }
}
