//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod crawl;
mod index;
mod test_url;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{Config, Settings};

#[derive(Parser)]
#[command(name = "larder")]
#[command(about = "Crawl recipe sites, extract structured recipes, and index them for search")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, visible_alias = "debug", global = true)]
    pub verbose: bool,

    /// Elasticsearch base URL
    #[arg(long, env = "LARDER_ES_URL", global = true)]
    es_url: Option<String>,

    /// Index name
    #[arg(long, env = "LARDER_INDEX", global = true)]
    index: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose" || arg == "--debug")
}

/// Longest `--recent` window accepted, in days.
const MAX_RECENT_DAYS: i64 = 36_500;

fn parse_threshold(value: &str) -> Result<f64, String> {
    let threshold: f64 = value
        .parse()
        .map_err(|_| format!("{:?} is not a number", value))?;
    if (0.0..=1.0).contains(&threshold) {
        Ok(threshold)
    } else {
        Err(format!("{} is not between 0 and 1", threshold))
    }
}

/// Crawl tuning flags shared by the crawl commands.
#[derive(Args, Debug, Clone, Default)]
pub struct CrawlArgs {
    /// Number of crawl workers
    #[arg(short, long)]
    workers: Option<usize>,

    /// Maximum link depth from the seeds
    #[arg(short, long)]
    depth: Option<usize>,

    /// Minimum delay between requests to one host, in milliseconds
    #[arg(long)]
    delay: Option<u64>,

    /// Concurrent requests allowed per host
    #[arg(long)]
    max_requests: Option<usize>,

    /// Stop the crawl after this many minutes
    #[arg(long)]
    timeout: Option<u64>,

    /// Title similarity at or above which two recipes are the same (0 to 1)
    #[arg(long, value_parser = parse_threshold)]
    threshold: Option<f64>,

    /// Do not write JSON backups of created recipes
    #[arg(long)]
    no_backup: bool,

    /// Directory for JSON backups
    #[arg(long, env = "LARDER_BACKUP_DIR")]
    backup_dir: Option<PathBuf>,

    /// Use an in-memory index instead of Elasticsearch (dry run)
    #[arg(long)]
    memory: bool,
}

impl CrawlArgs {
    fn apply(&self, settings: &mut Settings) {
        if let Some(workers) = self.workers {
            settings.workers = workers;
        }
        if let Some(depth) = self.depth {
            settings.max_depth = depth;
        }
        if let Some(delay) = self.delay {
            settings.delay_ms = delay;
        }
        if let Some(max) = self.max_requests {
            settings.max_requests_per_domain = max;
        }
        if let Some(timeout) = self.timeout {
            settings.crawl_timeout_minutes = timeout;
        }
        if let Some(threshold) = self.threshold {
            settings.similarity_threshold = threshold;
        }
        if let Some(ref dir) = self.backup_dir {
            settings.backup_dir = dir.clone();
        }
        if self.no_backup {
            settings.backups = false;
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl the built-in list of popular recipe sites
    Recipes {
        #[command(flatten)]
        args: CrawlArgs,
    },

    /// Crawl from one or more seed URLs
    Crawl {
        /// Seed URLs
        #[arg(required = true)]
        urls: Vec<String>,
        #[command(flatten)]
        args: CrawlArgs,
    },

    /// Delete the recipe index
    DeleteIndex {
        /// Confirm deletion
        #[arg(long)]
        confirm: bool,
    },

    /// Fetch one page and show what would be extracted (never stores)
    TestUrl {
        /// Page to test
        url: String,
    },

    /// Search indexed recipes
    Search {
        /// Query text (omit to list everything)
        query: Option<String>,
        /// Only recipes in this category or from this site
        #[arg(long)]
        category: Option<String>,
        /// Only recipes crawled within this many days, newest first
        #[arg(long, value_parser = clap::value_parser!(i64).range(0..=MAX_RECENT_DAYS))]
        recent: Option<i64>,
        /// Offset of the first hit
        #[arg(long, default_value = "0")]
        from: usize,
        /// Number of hits to show
        #[arg(long, default_value = "10")]
        size: usize,
    },
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref()).await?;
    let mut settings = config.settings();
    if let Some(url) = cli.es_url {
        settings.es_url = url;
    }
    if let Some(index) = cli.index {
        settings.index = index;
    }

    match cli.command {
        Commands::Recipes { args } => {
            args.apply(&mut settings);
            let seeds = crawl::popular_sites();
            crawl::cmd_crawl(&settings, &seeds, args.memory).await
        }
        Commands::Crawl { urls, args } => {
            args.apply(&mut settings);
            crawl::cmd_crawl(&settings, &urls, args.memory).await
        }
        Commands::DeleteIndex { confirm } => index::cmd_delete_index(&settings, confirm).await,
        Commands::TestUrl { url } => test_url::cmd_test_url(&settings, &url).await,
        Commands::Search {
            query,
            category,
            recent,
            from,
            size,
        } => index::cmd_search(&settings, query, category, recent, from, size).await,
    }
}
