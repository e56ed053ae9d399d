//! Synchronous analysis of a fetched page.
//!
//! `scraper::Html` is not `Send`, so the document is parsed, classified and
//! mined for links and fields in one step that returns owned data, before
//! the caller awaits anything else.

use serde::Serialize;
use url::Url;

use super::classify::UrlClassifier;
use super::extract::{self, RecipeFields};
use super::http_client::{FetchError, FetchedPage};
use crate::models::PageKind;

/// Everything the crawler needs from one page.
#[derive(Debug, Clone, Serialize)]
pub struct PageAnalysis {
    /// URL the page was requested at.
    pub url: String,
    pub kind: PageKind,
    pub likely_recipe: bool,
    /// Profile domain used for extraction, if any.
    pub profile: Option<String>,
    /// Followable links, canonical and deduplicated.
    pub links: Vec<String>,
    /// Extracted fields; empty for listing pages.
    pub fields: RecipeFields,
}

impl PageAnalysis {
    /// Classify the page, discover its links, and extract recipe fields
    /// when it is a detail page (or `always_extract` is set).
    pub fn analyze(
        page: &FetchedPage,
        classifier: &UrlClassifier,
        always_extract: bool,
    ) -> Result<Self, FetchError> {
        let requested = Url::parse(&page.url).map_err(|_| FetchError::InvalidUrl(page.url.clone()))?;
        let base = page.base_url().unwrap_or_else(|| requested.clone());

        let document = page.document();
        let kind = classifier.classify(&requested);
        let profile = classifier.profile_for(&requested);
        let links = classifier.discover_links(&document, &base);

        let fields = if kind == PageKind::Detail || always_extract {
            extract::extract(&document, &requested, profile)
        } else {
            RecipeFields::default()
        };

        Ok(Self {
            url: page.url.clone(),
            kind,
            likely_recipe: classifier.is_likely_recipe(&requested),
            profile: profile.map(|p| p.domain.clone()),
            links,
            fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::ProfileSet;
    use std::sync::Arc;

    fn classifier() -> UrlClassifier {
        UrlClassifier::new(Arc::new(ProfileSet::builtin().unwrap()))
    }

    #[test]
    fn test_listing_page_skips_extraction() {
        let page = FetchedPage::new(
            "https://example.com/recipes/",
            r#"<html><body><h1>All recipes</h1><a href="/recipes/soups/">Soups</a></body></html>"#,
        );
        let analysis = PageAnalysis::analyze(&page, &classifier(), false).unwrap();
        assert_eq!(analysis.kind, PageKind::Listing);
        assert_eq!(analysis.links, vec!["https://example.com/recipes/soups/"]);
        assert_eq!(analysis.fields, RecipeFields::default());
    }

    #[test]
    fn test_detail_page_is_extracted() {
        let page = FetchedPage::new(
            "https://example.com/recipe/42/pancakes/",
            r#"<html><head><script type="application/ld+json">
                {"@type":"Recipe","name":"Pancakes","recipeIngredient":["1 cup flour"]}
            </script></head><body></body></html>"#,
        );
        let analysis = PageAnalysis::analyze(&page, &classifier(), false).unwrap();
        assert_eq!(analysis.kind, PageKind::Detail);
        assert!(analysis.likely_recipe);
        assert_eq!(analysis.fields.name.as_deref(), Some("Pancakes"));
    }

    #[test]
    fn test_links_resolve_against_final_url() {
        let mut page = FetchedPage::new(
            "https://example.com/r/1",
            r#"<html><body><a href="pasta-bake">Pasta</a></body></html>"#,
        );
        page.final_url = "https://example.com/recipes/dinner/".to_string();
        let analysis = PageAnalysis::analyze(&page, &classifier(), false).unwrap();
        assert_eq!(analysis.links, vec!["https://example.com/recipes/dinner/pasta-bake"]);
    }
}
