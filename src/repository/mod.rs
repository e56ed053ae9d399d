//! Repository layer for recipe persistence.
//!
//! Storage goes through the `SearchBackend` trait, with Elasticsearch for
//! real runs and an in-memory index for dry runs and tests.

pub mod backend;
pub mod elasticsearch;
mod memory;
pub mod recipe;
pub mod similarity;
pub mod validation;

pub use backend::{
    DocVersion, QueryScope, SearchBackend, SearchHits, SearchQuery, SortOrder, StoreError,
    StoreResult, StoredRecipe,
};
pub use elasticsearch::{EsBackend, EsConfig};
pub use memory::MemoryBackend;
pub use recipe::{
    CreateOutcome, RecipeRepository, RepositoryConfig, RepositoryError, RepositoryResult,
    DEFAULT_SIMILARITY_THRESHOLD,
};
pub use similarity::{normalize_title, title_similarity};
pub use validation::{validate, DataChecks, Rejection};
