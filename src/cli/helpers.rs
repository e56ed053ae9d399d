//! Shared helper functions for CLI commands.

use std::sync::Arc;

use anyhow::Context;
use console::style;

use crate::config::Settings;
use crate::models::CrawlSummary;
use crate::repository::{EsBackend, MemoryBackend, SearchBackend};

/// Connect to the configured backend and make sure the index exists.
pub async fn open_backend(settings: &Settings, memory: bool) -> anyhow::Result<Arc<dyn SearchBackend>> {
    let backend: Arc<dyn SearchBackend> = if memory {
        Arc::new(MemoryBackend::new())
    } else {
        let es = EsBackend::connect(&settings.es_config())
            .await
            .with_context(|| format!("Could not connect to Elasticsearch at {}", settings.es_url))?;
        Arc::new(es)
    };
    backend
        .ensure_index()
        .await
        .with_context(|| format!("Could not create index {}", settings.index))?;
    Ok(backend)
}

/// Truncate a string to `max` chars, adding an ellipsis.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

/// Print the end-of-run summary.
pub fn print_summary(summary: &CrawlSummary) {
    println!("\n{}", style("Crawl Summary").bold());
    println!("{}", "-".repeat(40));
    println!("{:<16} {}", "Visited:", summary.visited);
    println!("{:<16} {}", "Fetched:", summary.fetched);
    println!("{:<16} {}", "Listings:", summary.listings);
    println!("{:<16} {}", "Created:", style(summary.created).green());
    println!("{:<16} {}", "Updated:", style(summary.updated).cyan());
    println!("{:<16} {}", "Duplicates:", summary.duplicates);
    println!("{:<16} {}", "Rejected:", style(summary.rejected).yellow());
    println!("{:<16} {}", "Failed:", style(summary.failed).red());
    if summary.skipped_depth > 0 {
        println!("{:<16} {}", "Too deep:", style(summary.skipped_depth).dim());
    }
    if summary.timed_out {
        println!("{} Stopped at the crawl timeout", style("!").yellow());
    }
    println!(
        "\n{} Crawling completed. Processed {} URLs.",
        style("✓").green(),
        summary.visited
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a longer title", 6), "a lon…");
    }
}
