//! In-memory search backend for dry runs and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::backend::{
    DocVersion, QueryScope, SearchBackend, SearchHits, SearchQuery, SortOrder, StoreError,
    StoreResult, StoredRecipe,
};
use super::similarity::title_similarity;
use crate::models::Recipe;

const PRIMARY_TERM: i64 = 1;

#[derive(Debug, Default)]
struct Index {
    docs: HashMap<String, (Recipe, DocVersion)>,
    next_seq_no: i64,
}

impl Index {
    fn bump(&mut self) -> DocVersion {
        let version = DocVersion {
            seq_no: self.next_seq_no,
            primary_term: PRIMARY_TERM,
        };
        self.next_seq_no += 1;
        version
    }
}

/// `SearchBackend` held in process memory. Writes are visible immediately.
/// Unlike Elasticsearch it also rejects a second record with the same URL
/// at insert time.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    index: RwLock<Option<Index>>,
}

impl MemoryBackend {
    /// Backend with the index already created.
    pub fn new() -> Self {
        Self {
            index: RwLock::new(Some(Index::default())),
        }
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.index.read().await.as_ref().map_or(0, |i| i.docs.len())
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Every stored record, in no particular order.
    pub async fn all(&self) -> Vec<Recipe> {
        self.index
            .read()
            .await
            .as_ref()
            .map(|i| i.docs.values().map(|(r, _)| r.clone()).collect())
            .unwrap_or_default()
    }
}

fn missing_index() -> StoreError {
    StoreError::Backend("index does not exist".to_string())
}

fn stored(recipe: &Recipe, version: DocVersion, score: Option<f64>) -> StoredRecipe {
    StoredRecipe {
        recipe: recipe.clone(),
        version,
        score,
    }
}

fn tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Token-overlap score with field boosts roughly following the index
/// mapping used in Elasticsearch.
fn relevance(recipe: &Recipe, query: &[String]) -> f64 {
    let ingredients = recipe.ingredients.join(" ");
    let instructions = recipe.instructions.join(" ");
    let fields: [(&str, f64); 6] = [
        (recipe.title.as_str(), 3.0),
        (recipe.name.as_str(), 3.0),
        (recipe.description.as_deref().unwrap_or_default(), 2.0),
        (ingredients.as_str(), 1.0),
        (instructions.as_str(), 1.0),
        (recipe.body.as_str(), 1.0),
    ];
    fields
        .iter()
        .map(|(text, boost)| {
            let field = tokens(text);
            query.iter().filter(|q| field.contains(q)).count() as f64 * boost
        })
        .sum()
}

fn title_score(recipe: &Recipe, text: &str, query: &[String]) -> Option<f64> {
    let title = tokens(&recipe.title);
    let shared = query.iter().any(|q| title.contains(q));
    let similarity = title_similarity(text, &recipe.title);
    (shared || similarity >= 0.5).then_some(similarity)
}

fn matches_category(recipe: &Recipe, category: &str) -> bool {
    let category = category.to_lowercase();
    recipe.source_site.to_lowercase() == category
        || recipe.categories.iter().any(|c| c.to_lowercase() == category)
}

#[async_trait]
impl SearchBackend for MemoryBackend {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn index_exists(&self) -> StoreResult<bool> {
        Ok(self.index.read().await.is_some())
    }

    async fn create_index(&self) -> StoreResult<()> {
        let mut index = self.index.write().await;
        if index.is_none() {
            *index = Some(Index::default());
        }
        Ok(())
    }

    async fn delete_index(&self) -> StoreResult<bool> {
        Ok(self.index.write().await.take().is_some())
    }

    async fn get(&self, id: &str) -> StoreResult<Option<StoredRecipe>> {
        let index = self.index.read().await;
        let index = index.as_ref().ok_or_else(missing_index)?;
        Ok(index.docs.get(id).map(|(r, v)| stored(r, *v, None)))
    }

    async fn insert(&self, recipe: &Recipe) -> StoreResult<DocVersion> {
        let mut index = self.index.write().await;
        let index = index.as_mut().ok_or_else(missing_index)?;
        if index.docs.contains_key(&recipe.id)
            || index.docs.values().any(|(r, _)| r.url == recipe.url)
        {
            return Err(StoreError::Conflict(recipe.id.clone()));
        }
        let version = index.bump();
        index
            .docs
            .insert(recipe.id.clone(), (recipe.clone(), version));
        Ok(version)
    }

    async fn replace(&self, recipe: &Recipe, expected: DocVersion) -> StoreResult<DocVersion> {
        let mut index = self.index.write().await;
        let index = index.as_mut().ok_or_else(missing_index)?;
        match index.docs.get(&recipe.id) {
            None => return Err(StoreError::NotFound(recipe.id.clone())),
            Some((_, current)) if *current != expected => {
                return Err(StoreError::Conflict(recipe.id.clone()))
            }
            Some(_) => {}
        }
        let version = index.bump();
        index
            .docs
            .insert(recipe.id.clone(), (recipe.clone(), version));
        Ok(version)
    }

    async fn find_by_url(&self, url: &str) -> StoreResult<Option<StoredRecipe>> {
        let index = self.index.read().await;
        let index = index.as_ref().ok_or_else(missing_index)?;
        Ok(index
            .docs
            .values()
            .find(|(r, _)| r.url == url)
            .map(|(r, v)| stored(r, *v, None)))
    }

    async fn search(&self, query: &SearchQuery) -> StoreResult<SearchHits> {
        let index = self.index.read().await;
        let index = index.as_ref().ok_or_else(missing_index)?;

        let text = query.text.as_deref().map(str::trim).filter(|t| !t.is_empty());
        let query_tokens = text.map(tokens).unwrap_or_default();

        let mut hits: Vec<StoredRecipe> = index
            .docs
            .values()
            .filter(|(r, _)| {
                query
                    .category
                    .as_deref()
                    .map_or(true, |c| matches_category(r, c))
            })
            .filter(|(r, _)| query.since.map_or(true, |since| r.crawl_date >= since))
            .filter_map(|(r, v)| {
                let score = match (text, query.scope) {
                    (None, _) => 1.0,
                    (Some(t), QueryScope::Title) => title_score(r, t, &query_tokens)?,
                    (Some(_), QueryScope::AllFields) => {
                        let score = relevance(r, &query_tokens);
                        if score == 0.0 {
                            return None;
                        }
                        score
                    }
                };
                Some(stored(r, *v, Some(score)))
            })
            .collect();

        match query.sort {
            SortOrder::Relevance => hits.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| b.recipe.crawl_date.cmp(&a.recipe.crawl_date))
            }),
            SortOrder::CrawlDateDesc => {
                hits.sort_by(|a, b| b.recipe.crawl_date.cmp(&a.recipe.crawl_date))
            }
        }

        let total = hits.len() as u64;
        let hits = hits.into_iter().skip(query.from).take(query.size).collect();
        Ok(SearchHits { total, hits })
    }
}
