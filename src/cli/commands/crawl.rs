//! Crawl commands.

use std::sync::Arc;

use anyhow::Context;
use console::style;
use tracing::info;

use crate::config::Settings;
use crate::crawler::Crawler;
use crate::repository::RecipeRepository;
use crate::scrapers::{DomainAdmission, HttpFetcher, UrlClassifier};
use crate::storage::BackupWriter;

use super::super::helpers::{open_backend, print_summary};

/// Seed pages of well-known recipe sites.
const POPULAR_SITES: [&str; 16] = [
    "https://pinchofyum.com/recipes",
    "https://minimalistbaker.com/recipes",
    "https://cookieandkate.com/recipes",
    "https://loveandlemons.com/recipes",
    "https://smittenkitchen.com/recipes",
    "https://seriouseats.com/recipes",
    "https://halfbakedharvest.com/category/recipes",
    "https://101cookbooks.com/recipes",
    "https://food52.com/recipes",
    "https://budgetbytes.com/category/recipes",
    "https://thewoksoflife.com/recipes",
    "https://www.delish.com/cooking/recipe-ideas/",
    "https://www.allrecipes.com/recipes/",
    "https://www.foodnetwork.com/recipes",
    "https://www.epicurious.com/recipes",
    "https://www.simplyrecipes.com/recipes/",
];

pub fn popular_sites() -> Vec<String> {
    POPULAR_SITES.iter().map(|s| s.to_string()).collect()
}

/// Crawl from the given seeds and print a summary.
pub async fn cmd_crawl(settings: &Settings, seeds: &[String], memory: bool) -> anyhow::Result<()> {
    let profiles = settings.profile_set().context("Invalid site profile")?;
    let classifier =
        UrlClassifier::new(Arc::new(profiles)).with_allowed_domains(settings.allowed_domains.clone());
    let fetcher = HttpFetcher::new(&settings.fetch_config()).context("Failed to create HTTP client")?;

    let backend = open_backend(settings, memory).await?;
    let repository = Arc::new(RecipeRepository::with_config(
        backend,
        settings.repository_config(),
    ));
    let backup = settings
        .backups
        .then(|| BackupWriter::new(settings.backup_dir.clone()));

    println!(
        "{} Crawling {} seed URLs with {} workers (max depth {})",
        style("→").cyan(),
        seeds.len(),
        settings.workers,
        settings.max_depth
    );
    info!(
        "Delay {} ms, {} requests per domain, timeout {} min, threshold {}",
        settings.delay_ms,
        settings.max_requests_per_domain,
        settings.crawl_timeout_minutes,
        settings.similarity_threshold
    );
    if memory {
        println!("{} Using an in-memory index; nothing will be persisted", style("!").yellow());
    }

    let crawler = Crawler::new(
        settings.crawl_config(),
        Arc::new(fetcher),
        repository,
        classifier,
        DomainAdmission::new(settings.admission_config()),
    )
    .with_backup(backup);

    let summary = crawler.run(seeds).await;
    print_summary(&summary);
    Ok(())
}
