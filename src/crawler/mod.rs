//! Crawl scheduler.
//!
//! A fixed pool of workers pulls tasks from one shared queue. Each URL is
//! queued at most once per run. The run ends when the queue drains with
//! every worker idle, or when the wall-clock timeout fires, whichever comes
//! first. On timeout, in-flight pages finish on their own and the summary
//! is reported without waiting for them. Each page runs on its own task, so
//! a panic while processing one page counts as a failure and the worker
//! moves on.

mod visited;
mod worker;

pub use visited::VisitedSet;
pub use worker::{CrawlStats, Pipeline};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, error, info, warn};

use crate::models::{CrawlSummary, CrawlTask};
use crate::repository::RecipeRepository;
use crate::scrapers::{canonicalize_str, DomainAdmission, PageFetcher, UrlClassifier};
use crate::storage::BackupWriter;

/// Scheduler limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlConfig {
    pub workers: usize,
    /// Deepest link level fetched; seeds are depth 0.
    pub max_depth: usize,
    /// Wall-clock limit for the whole run.
    pub timeout: Duration,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            workers: 10,
            max_depth: 3,
            timeout: Duration::from_secs(30 * 60),
        }
    }
}

/// Shared work queue with the visited set and the outstanding-task count.
struct Frontier {
    tx: mpsc::UnboundedSender<CrawlTask>,
    rx: Mutex<mpsc::UnboundedReceiver<CrawlTask>>,
    visited: VisitedSet,
    /// Tasks queued or being processed.
    pending: AtomicUsize,
    drained: watch::Sender<bool>,
    max_depth: usize,
    stats: Arc<CrawlStats>,
}

impl Frontier {
    fn new(max_depth: usize, stats: Arc<CrawlStats>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (drained, _) = watch::channel(false);
        Self {
            tx,
            rx: Mutex::new(rx),
            visited: VisitedSet::new(),
            pending: AtomicUsize::new(0),
            drained,
            max_depth,
            stats,
        }
    }

    /// Queue a task unless it is too deep or its URL was already seen.
    async fn submit(&self, task: CrawlTask) -> bool {
        if task.depth > self.max_depth {
            CrawlStats::bump(&self.stats.skipped_depth);
            return false;
        }
        if !self.visited.insert(&task.url).await {
            return false;
        }
        CrawlStats::bump(&self.stats.visited);

        self.pending.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(task).is_err() {
            self.complete();
            return false;
        }
        true
    }

    /// Mark one task done; signals drain when nothing is left.
    fn complete(&self) {
        if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            let _ = self.drained.send(true);
        }
    }

    async fn next(&self) -> Option<CrawlTask> {
        self.rx.lock().await.recv().await
    }
}

/// Runs crawls over a fetcher, classifier and recipe repository.
pub struct Crawler {
    config: CrawlConfig,
    pipeline: Pipeline,
}

impl Crawler {
    pub fn new(
        config: CrawlConfig,
        fetcher: Arc<dyn PageFetcher>,
        repository: Arc<RecipeRepository>,
        classifier: UrlClassifier,
        admission: DomainAdmission,
    ) -> Self {
        Self {
            pipeline: Pipeline {
                fetcher,
                repository,
                classifier,
                admission,
                backup: None,
                max_depth: config.max_depth,
            },
            config,
        }
    }

    /// Mirror every created record to disk.
    pub fn with_backup(mut self, backup: Option<BackupWriter>) -> Self {
        self.pipeline.backup = backup;
        self
    }

    pub fn config(&self) -> CrawlConfig {
        self.config
    }

    /// Crawl from the given seed URLs until the queue drains or the
    /// timeout fires.
    pub async fn run(&self, seeds: &[String]) -> CrawlSummary {
        let stats = Arc::new(CrawlStats::default());
        let frontier = Arc::new(Frontier::new(self.config.max_depth, stats.clone()));
        let mut drained = frontier.drained.subscribe();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        for seed in seeds {
            match canonicalize_str(seed) {
                Some(url) => {
                    frontier.submit(CrawlTask::seed(url)).await;
                }
                None => {
                    warn!("Invalid seed URL: {}", seed);
                    CrawlStats::bump(&stats.failed);
                }
            }
        }
        if frontier.pending.load(Ordering::SeqCst) == 0 {
            info!("Nothing to crawl");
            return stats.snapshot(false);
        }

        let workers = self.config.workers.max(1);
        info!(
            "Starting crawl of {} seeds with {} workers (max depth {}, timeout {:?})",
            seeds.len(),
            workers,
            self.config.max_depth,
            self.config.timeout
        );

        let pipeline = Arc::new(self.pipeline.clone());
        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let frontier = frontier.clone();
            let pipeline = pipeline.clone();
            let stats = stats.clone();
            let mut shutdown = shutdown_rx.clone();

            handles.push(tokio::spawn(async move {
                loop {
                    let task = tokio::select! {
                        biased;
                        _ = shutdown.wait_for(|stop| *stop) => break,
                        task = frontier.next() => match task {
                            Some(task) => task,
                            None => break,
                        },
                    };

                    let url = task.url.clone();
                    let page = {
                        let pipeline = pipeline.clone();
                        let stats = stats.clone();
                        tokio::spawn(async move { pipeline.process(&task, &stats).await })
                    };
                    match page.await {
                        Ok(children) => {
                            for child in children {
                                frontier.submit(child).await;
                            }
                        }
                        Err(e) => {
                            error!("Worker {} failed on {}: {}", worker_id, url, e);
                            CrawlStats::bump(&stats.failed);
                        }
                    }
                    frontier.complete();
                }
                debug!("Worker {} stopped", worker_id);
            }));
        }

        let finished = tokio::select! {
            _ = drained.wait_for(|done| *done) => true,
            _ = tokio::time::sleep(self.config.timeout) => false,
        };
        let _ = shutdown_tx.send(true);

        if finished {
            join_all(handles).await;
            info!("Crawl finished: queue drained");
        } else {
            warn!(
                "Crawl timed out after {:?}; in-flight pages are left to finish",
                self.config.timeout
            );
        }

        stats.snapshot(!finished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryBackend;
    use crate::scrapers::{AdmissionConfig, FetchError, FetchedPage, ProfileSet};
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Serves canned pages; everything else is a 404.
    struct StubFetcher {
        pages: HashMap<String, String>,
        delay: Duration,
    }

    #[async_trait]
    impl PageFetcher for StubFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
            tokio::time::sleep(self.delay).await;
            match self.pages.get(url) {
                Some(body) => Ok(FetchedPage::new(url, body.clone())),
                None => Err(FetchError::HttpStatus {
                    url: url.to_string(),
                    status: 404,
                }),
            }
        }
    }

    fn crawler(pages: &[(&str, &str)], config: CrawlConfig, delay: Duration) -> Crawler {
        let fetcher = StubFetcher {
            pages: pages
                .iter()
                .map(|(u, b)| (u.to_string(), b.to_string()))
                .collect(),
            delay,
        };
        Crawler::new(
            config,
            Arc::new(fetcher),
            Arc::new(RecipeRepository::new(Arc::new(MemoryBackend::new()))),
            UrlClassifier::new(Arc::new(ProfileSet::builtin().unwrap())),
            DomainAdmission::new(AdmissionConfig {
                max_concurrent: 5,
                delay: Duration::ZERO,
            }),
        )
    }

    #[tokio::test]
    async fn test_drains_and_dedups_links() {
        let pages = [
            (
                "https://example.com/recipes/",
                r#"<body><a href="/recipes/soups/">Soups</a><a href="/recipes/soups">Soups again</a></body>"#,
            ),
            (
                "https://example.com/recipes/soups/",
                r#"<body><a href="/recipes/">Back</a></body>"#,
            ),
        ];
        let summary = crawler(&pages, CrawlConfig::default(), Duration::ZERO)
            .run(&["https://example.com/recipes/".to_string()])
            .await;

        assert_eq!(summary.visited, 2);
        assert_eq!(summary.fetched, 2);
        assert_eq!(summary.listings, 2);
        assert!(!summary.timed_out);
    }

    #[tokio::test]
    async fn test_invalid_seeds_end_immediately() {
        let summary = crawler(&[], CrawlConfig::default(), Duration::ZERO)
            .run(&["not a url".to_string()])
            .await;
        assert_eq!(summary.visited, 0);
        assert_eq!(summary.failed, 1);
    }

    #[tokio::test]
    async fn test_timeout_wins_over_slow_fetches() {
        let config = CrawlConfig {
            timeout: Duration::from_millis(50),
            ..Default::default()
        };
        let summary = crawler(&[], config, Duration::from_secs(5))
            .run(&["https://example.com/recipes/".to_string()])
            .await;
        assert!(summary.timed_out);
        assert_eq!(summary.fetched, 0);
    }
}
