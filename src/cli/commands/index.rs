//! Index administration and search commands.

use anyhow::Context;
use chrono::{TimeDelta, Utc};
use console::style;

use crate::config::Settings;
use crate::repository::{EsBackend, SearchBackend, SearchQuery, SortOrder};

use super::super::helpers::{open_backend, truncate};

/// Delete the recipe index.
pub async fn cmd_delete_index(settings: &Settings, confirm: bool) -> anyhow::Result<()> {
    if !confirm {
        println!(
            "{} This will delete the index '{}' and every recipe in it.",
            style("!").yellow(),
            settings.index
        );
        println!("  Use --confirm to proceed.");
        return Ok(());
    }

    let backend = EsBackend::connect(&settings.es_config()).await?;
    if backend.delete_index().await? {
        println!("{} Deleted index '{}'", style("✓").green(), settings.index);
    } else {
        println!("{} Index '{}' does not exist", style("!").yellow(), settings.index);
    }
    Ok(())
}

/// Query the index and print hits.
pub async fn cmd_search(
    settings: &Settings,
    query: Option<String>,
    category: Option<String>,
    recent_days: Option<i64>,
    from: usize,
    size: usize,
) -> anyhow::Result<()> {
    let backend = open_backend(settings, false).await?;

    let mut search = SearchQuery {
        text: query,
        ..Default::default()
    }
    .page(from, size);
    if let Some(category) = category {
        search = search.with_category(category);
    }
    if let Some(days) = recent_days {
        let since = TimeDelta::try_days(days)
            .and_then(|window| Utc::now().checked_sub_signed(window))
            .with_context(|| format!("--recent {} is out of range", days))?;
        search = search.since(since).sorted(SortOrder::CrawlDateDesc);
    }

    let hits = backend.search(&search).await?;
    if hits.hits.is_empty() {
        println!("{} No recipes found", style("!").yellow());
        return Ok(());
    }

    println!(
        "\n{}",
        style(format!(
            "Showing {}-{} of {} recipes",
            from + 1,
            from + hits.hits.len(),
            hits.total
        ))
        .bold()
    );
    println!("{}", "-".repeat(60));
    for hit in &hits.hits {
        let recipe = &hit.recipe;
        println!(
            "{} {}",
            style("•").cyan(),
            style(truncate(&recipe.title, 60)).bold()
        );
        println!("  {}", style(&recipe.url).dim());
        println!(
            "  {} | crawled {}",
            recipe.source_site,
            recipe.crawl_date.format("%Y-%m-%d %H:%M")
        );
        if let Some(description) = &recipe.description {
            println!("  {}", truncate(description, 100));
        }
    }
    Ok(())
}
