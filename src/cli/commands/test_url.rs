//! Single-page extraction check.

use std::sync::Arc;

use anyhow::Context;
use console::style;

use crate::config::Settings;
use crate::repository::{validate, DataChecks};
use crate::scrapers::{canonicalize_str, HttpFetcher, PageAnalysis, PageFetcher, UrlClassifier};

use super::super::helpers::truncate;

fn check_mark(ok: bool) -> console::StyledObject<&'static str> {
    if ok {
        style("✓").green()
    } else {
        style("✗").red()
    }
}

fn print_field(label: &str, value: Option<&str>) {
    match value {
        Some(v) => println!("  {:<13} {}", format!("{}:", label), truncate(v, 100)),
        None => println!("  {:<13} {}", format!("{}:", label), style("-").dim()),
    }
}

fn print_list(label: &str, items: &[String]) {
    println!("  {} ({}):", label, items.len());
    for item in items {
        println!("    - {}", truncate(item, 100));
    }
}

/// Fetch one page and print what the crawler would make of it.
pub async fn cmd_test_url(settings: &Settings, url: &str) -> anyhow::Result<()> {
    let url = canonicalize_str(url).with_context(|| format!("Invalid URL: {}", url))?;
    println!("{} Testing URL: {}", style("→").cyan(), url);

    let profiles = settings.profile_set().context("Invalid site profile")?;
    let classifier =
        UrlClassifier::new(Arc::new(profiles)).with_allowed_domains(settings.allowed_domains.clone());
    let fetcher = HttpFetcher::new(&settings.fetch_config()).context("Failed to create HTTP client")?;

    let page = fetcher.fetch(&url).await?;
    let analysis = PageAnalysis::analyze(&page, &classifier, true)?;
    let fields = &analysis.fields;

    println!("\n{}", style("Classification").bold());
    println!("  {:<13} {}", "Page kind:", analysis.kind.as_str());
    println!("  {:<13} {}", "Likely recipe:", analysis.likely_recipe);
    print_field("Profile", analysis.profile.as_deref());

    println!("\n{}", style("Recipe Data").bold());
    print_field("Title", fields.title.as_deref());
    print_field("Name", fields.name.as_deref());
    print_field("Description", fields.description.as_deref());
    print_field("Image", fields.image.as_deref());
    print_field("Prep Time", fields.prep_time.as_deref());
    print_field("Cook Time", fields.cook_time.as_deref());
    print_field("Total Time", fields.total_time.as_deref());
    print_field("Calories", fields.calories.as_deref());
    print_field("Servings", fields.servings.as_deref());
    print_list("Ingredients", &fields.ingredients);
    print_list("Instructions", &fields.instructions);
    print_list("Categories", &fields.categories);

    let checks = DataChecks::of(fields);
    println!("\n{}", style("Data Checks").bold());
    println!("  {} Has name", check_mark(checks.has_title));
    println!(
        "  {} Has ingredients{}",
        check_mark(checks.has_ingredients()),
        if checks.structured_ingredients { "" } else { " (body text only)" }
    );
    println!(
        "  {} Has instructions{}",
        check_mark(checks.has_instructions()),
        if checks.structured_instructions { "" } else { " (body text only)" }
    );
    match validate(fields, &analysis.url, &classifier) {
        Ok(_) => println!("  {} Would be stored", check_mark(true)),
        Err(rejection) => println!("  {} Would be skipped: {}", check_mark(false), rejection),
    }

    println!("\n{} ({} found)", style("Links").bold(), analysis.links.len());
    for link in analysis.links.iter().take(5) {
        println!("  {}", link);
    }

    Ok(())
}
