//! End-to-end crawl tests over a stub fetcher and the in-memory backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use larder::crawler::{CrawlConfig, Crawler};
use larder::repository::{MemoryBackend, RecipeRepository};
use larder::scrapers::{
    AdmissionConfig, DomainAdmission, FetchError, FetchedPage, PageFetcher, ProfileSet,
    UrlClassifier,
};
use larder::storage::BackupWriter;

/// Serves canned pages, 404s everything else, and records every call.
#[derive(Default)]
struct StubFetcher {
    pages: HashMap<String, String>,
    delay: Duration,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    panic_on: Option<String>,
}

impl StubFetcher {
    fn new(pages: Vec<(String, String)>) -> Self {
        Self {
            pages: pages.into_iter().collect(),
            ..Default::default()
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn panicking_on(mut self, url: &str) -> Self {
        self.panic_on = Some(url.to_string());
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        if self.panic_on.as_deref() == Some(url) {
            panic!("stub fetcher blew up on {}", url);
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.pages.get(url) {
            Some(body) => Ok(FetchedPage::new(url, body.clone())),
            None => Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

struct Harness {
    fetcher: Arc<StubFetcher>,
    backend: Arc<MemoryBackend>,
    repository: Arc<RecipeRepository>,
}

impl Harness {
    fn new(fetcher: StubFetcher) -> Self {
        let backend = Arc::new(MemoryBackend::new());
        Self {
            fetcher: Arc::new(fetcher),
            repository: Arc::new(RecipeRepository::new(backend.clone())),
            backend,
        }
    }

    fn crawler(&self, config: CrawlConfig, max_per_domain: usize) -> Crawler {
        Crawler::new(
            config,
            self.fetcher.clone(),
            self.repository.clone(),
            UrlClassifier::new(Arc::new(ProfileSet::builtin().unwrap())),
            DomainAdmission::new(AdmissionConfig {
                max_concurrent: max_per_domain,
                delay: Duration::ZERO,
            }),
        )
    }
}

fn config(max_depth: usize) -> CrawlConfig {
    CrawlConfig {
        workers: 4,
        max_depth,
        timeout: Duration::from_secs(30),
    }
}

fn page(url: &str, body: &str) -> (String, String) {
    (url.to_string(), format!("<html><body>{}</body></html>", body))
}

const PANCAKES: &str = r#"<html><head><script type="application/ld+json">
{"@type":"Recipe","name":"Pancakes","recipeIngredient":["1 cup flour","2 eggs"],
 "recipeInstructions":[{"@type":"HowToStep","text":"Mix"},{"@type":"HowToStep","text":"Cook"}]}
</script></head><body><h2>Pancakes</h2></body></html>"#;

#[tokio::test]
async fn listing_page_enqueues_links_without_storing() {
    let links: String = (1..=12)
        .map(|i| format!(r#"<a href="/recipes/category-{}/">Category {}</a>"#, i, i))
        .collect();
    let harness = Harness::new(StubFetcher::new(vec![page(
        "https://example.com/recipes/",
        &links,
    )]));

    let summary = harness
        .crawler(config(1), 5)
        .run(&["https://example.com/recipes/".to_string()])
        .await;

    assert_eq!(summary.listings, 1);
    assert_eq!(summary.visited, 13);
    assert_eq!(summary.created, 0);
    assert_eq!(summary.failed, 12);
    assert!(harness.backend.is_empty().await);

    let calls = harness.fetcher.calls();
    assert_eq!(calls.len(), 13);
    assert!(calls.contains(&"https://example.com/recipes/category-12/".to_string()));
}

#[tokio::test]
async fn structured_recipe_is_created_once() {
    let harness = Harness::new(StubFetcher::new(vec![(
        "https://example.com/recipe/pancakes".to_string(),
        PANCAKES.to_string(),
    )]));

    let summary = harness
        .crawler(config(2), 5)
        .run(&["https://example.com/recipe/pancakes".to_string()])
        .await;
    assert_eq!(summary.created, 1);

    let stored = harness.backend.all().await;
    assert_eq!(stored.len(), 1);
    let recipe = &stored[0];
    assert_eq!(recipe.title, "Pancakes");
    assert_eq!(recipe.ingredients, vec!["1 cup flour", "2 eggs"]);
    assert_eq!(recipe.instructions, vec!["Mix", "Cook"]);
    assert_eq!(recipe.source_site, "example.com");
}

#[tokio::test]
async fn recrawl_updates_existing_record() {
    let harness = Harness::new(StubFetcher::new(vec![(
        "https://example.com/recipe/pancakes".to_string(),
        PANCAKES.to_string(),
    )]));
    let seeds = ["https://example.com/recipe/pancakes".to_string()];

    harness.crawler(config(1), 5).run(&seeds).await;
    let first = harness.backend.all().await.remove(0);

    tokio::time::sleep(Duration::from_millis(5)).await;
    let summary = harness.crawler(config(1), 5).run(&seeds).await;
    assert_eq!(summary.created, 0);
    assert_eq!(summary.duplicates, 1);
    assert_eq!(summary.updated, 1);

    let stored = harness.backend.all().await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, first.id);
    assert!(stored[0].crawl_date > first.crawl_date);
}

#[tokio::test]
async fn no_fetch_beyond_max_depth() {
    let pages = (0..6)
        .map(|i| {
            page(
                &format!("https://example.com/recipes/level-{}/", i),
                &format!(r#"<a href="/recipes/level-{}/">Next</a>"#, i + 1),
            )
        })
        .collect();
    let harness = Harness::new(StubFetcher::new(pages));

    let summary = harness
        .crawler(config(2), 5)
        .run(&["https://example.com/recipes/level-0/".to_string()])
        .await;

    let calls = harness.fetcher.calls();
    assert_eq!(
        calls,
        vec![
            "https://example.com/recipes/level-0/",
            "https://example.com/recipes/level-1/",
            "https://example.com/recipes/level-2/",
        ]
    );
    assert_eq!(summary.skipped_depth, 1);
    assert!(!summary.timed_out);
}

#[tokio::test]
async fn rejected_pages_still_lead_somewhere() {
    let harness = Harness::new(StubFetcher::new(vec![
        page(
            "https://example.com/about-us",
            r#"<p>We cook a lot.</p><a href="/recipe/pancakes">Our pancakes</a>"#,
        ),
        (
            "https://example.com/recipe/pancakes".to_string(),
            PANCAKES.to_string(),
        ),
    ]));

    let summary = harness
        .crawler(config(2), 5)
        .run(&["https://example.com/about-us".to_string()])
        .await;

    assert_eq!(summary.rejected, 1);
    assert_eq!(summary.created, 1);
    assert_eq!(harness.backend.len().await, 1);
}

#[tokio::test]
async fn per_domain_concurrency_is_capped() {
    let links: String = (0..20)
        .map(|i| format!(r#"<a href="/recipe/dish-{}">Dish</a>"#, i))
        .collect();
    let fetcher = StubFetcher::new(vec![page("https://example.com/recipes/", &links)])
        .with_delay(Duration::from_millis(10));
    let harness = Harness::new(fetcher);

    let summary = harness
        .crawler(
            CrawlConfig {
                workers: 8,
                ..config(1)
            },
            2,
        )
        .run(&["https://example.com/recipes/".to_string()])
        .await;

    assert_eq!(summary.visited, 21);
    assert!(harness.fetcher.peak.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn created_recipes_are_backed_up() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(StubFetcher::new(vec![(
        "https://example.com/recipe/pancakes".to_string(),
        PANCAKES.to_string(),
    )]));

    harness
        .crawler(config(1), 5)
        .with_backup(Some(BackupWriter::new(dir.path())))
        .run(&["https://example.com/recipe/pancakes".to_string()])
        .await;

    let recipe = harness.backend.all().await.remove(0);
    let expected = dir.path().join(format!("{}_Pancakes.json", recipe.id));
    assert!(expected.is_file());
}

#[tokio::test]
async fn panicking_page_does_not_stall_the_crawl() {
    let links = r#"<a href="/recipe/boom">Boom</a><a href="/recipe/pancakes">Pancakes</a>"#;
    let fetcher = StubFetcher::new(vec![
        page("https://example.com/recipes/", links),
        (
            "https://example.com/recipe/pancakes".to_string(),
            PANCAKES.to_string(),
        ),
    ])
    .panicking_on("https://example.com/recipe/boom");
    let harness = Harness::new(fetcher);

    let crawler = harness.crawler(
        CrawlConfig {
            workers: 1,
            ..config(1)
        },
        5,
    );
    let summary = tokio::time::timeout(
        Duration::from_secs(5),
        crawler.run(&["https://example.com/recipes/".to_string()]),
    )
    .await
    .expect("crawl should drain without waiting for its timeout");

    assert!(!summary.timed_out);
    assert_eq!(summary.visited, 3);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.created, 1);
    assert_eq!(harness.fetcher.calls().len(), 3);
}
