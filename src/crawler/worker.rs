//! Per-page crawl pipeline: admission, fetch, classify, extract, store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::models::{CrawlSummary, CrawlTask, PageKind};
use crate::repository::{validate, CreateOutcome, RecipeRepository, RepositoryError};
use crate::scrapers::{DomainAdmission, PageAnalysis, PageFetcher, UrlClassifier};
use crate::storage::BackupWriter;

/// Counters updated by workers during a run.
#[derive(Debug, Default)]
pub struct CrawlStats {
    pub visited: AtomicUsize,
    pub fetched: AtomicUsize,
    pub listings: AtomicUsize,
    pub created: AtomicUsize,
    pub updated: AtomicUsize,
    pub duplicates: AtomicUsize,
    pub rejected: AtomicUsize,
    pub failed: AtomicUsize,
    pub skipped_depth: AtomicUsize,
}

impl CrawlStats {
    pub fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, timed_out: bool) -> CrawlSummary {
        let get = |c: &AtomicUsize| c.load(Ordering::Relaxed);
        CrawlSummary {
            visited: get(&self.visited),
            fetched: get(&self.fetched),
            listings: get(&self.listings),
            created: get(&self.created),
            updated: get(&self.updated),
            duplicates: get(&self.duplicates),
            rejected: get(&self.rejected),
            failed: get(&self.failed),
            skipped_depth: get(&self.skipped_depth),
            timed_out,
        }
    }
}

/// Components a worker needs to process one task.
#[derive(Clone)]
pub struct Pipeline {
    pub fetcher: Arc<dyn PageFetcher>,
    pub repository: Arc<RecipeRepository>,
    pub classifier: UrlClassifier,
    pub admission: DomainAdmission,
    pub backup: Option<BackupWriter>,
    pub max_depth: usize,
}

impl Pipeline {
    /// Process one task and return the tasks for the links found on it.
    /// Links are returned whether or not the page itself was stored.
    pub async fn process(&self, task: &CrawlTask, stats: &CrawlStats) -> Vec<CrawlTask> {
        if task.depth > self.max_depth {
            CrawlStats::bump(&stats.skipped_depth);
            return Vec::new();
        }

        let page = {
            let Some(_permit) = self.admission.acquire(&task.url).await else {
                warn!("No host in {}, skipping", task.url);
                CrawlStats::bump(&stats.failed);
                return Vec::new();
            };
            debug!("Fetching {} (depth {})", task.url, task.depth);
            match self.fetcher.fetch(&task.url).await {
                Ok(page) => page,
                Err(e) => {
                    warn!("Failed to fetch {}: {}", task.url, e);
                    CrawlStats::bump(&stats.failed);
                    return Vec::new();
                }
            }
        };
        CrawlStats::bump(&stats.fetched);

        let analysis = match PageAnalysis::analyze(&page, &self.classifier, false) {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!("Failed to analyze {}: {}", task.url, e);
                CrawlStats::bump(&stats.failed);
                return Vec::new();
            }
        };

        let children: Vec<CrawlTask> = analysis.links.iter().map(|l| task.child(l.as_str())).collect();

        match analysis.kind {
            PageKind::Listing => {
                CrawlStats::bump(&stats.listings);
                info!("Listing {}: {} links", task.url, children.len());
            }
            PageKind::Detail => self.store(&analysis, stats).await,
        }

        children
    }

    async fn store(&self, analysis: &PageAnalysis, stats: &CrawlStats) {
        let recipe = match validate(&analysis.fields, &analysis.url, &self.classifier) {
            Ok(recipe) => recipe,
            Err(rejection) => {
                warn!("Skipping {}: {}", analysis.url, rejection);
                CrawlStats::bump(&stats.rejected);
                return;
            }
        };

        let outcome = match self.repository.create(&recipe).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Failed to create recipe for {}: {}", analysis.url, e);
                CrawlStats::bump(&stats.failed);
                return;
            }
        };

        let existing = match outcome {
            CreateOutcome::Created(recipe) => {
                CrawlStats::bump(&stats.created);
                info!("Created recipe {} - {}", recipe.id, recipe.url);
                if let Some(backup) = &self.backup {
                    if let Err(e) = backup.write(&recipe).await {
                        warn!("Failed to back up {}: {}", recipe.id, e);
                    }
                }
                return;
            }
            CreateOutcome::DuplicateUrl(existing) => {
                warn!("Already stored: {} ({})", analysis.url, existing.recipe.id);
                existing
            }
            CreateOutcome::DuplicateTitle {
                existing,
                similarity,
            } => {
                warn!(
                    "Duplicate title {:?} for {} matches {} ({:.2})",
                    recipe.title, analysis.url, existing.recipe.id, similarity
                );
                existing
            }
        };
        CrawlStats::bump(&stats.duplicates);

        match self.repository.update(&existing.recipe.id, &recipe.to_patch()).await {
            Ok(updated) => {
                CrawlStats::bump(&stats.updated);
                info!("Updated recipe {} ({})", updated.id, updated.title);
            }
            Err(e @ (RepositoryError::DuplicateTitle { .. } | RepositoryError::DuplicateUrl { .. })) => {
                warn!("Not merging {} into {}: {}", analysis.url, existing.recipe.id, e);
            }
            Err(e) => {
                error!("Failed to update recipe {}: {}", existing.recipe.id, e);
                CrawlStats::bump(&stats.failed);
            }
        }
    }
}
