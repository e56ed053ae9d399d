//! URL classification and link discovery.
//!
//! Decides whether a page is a listing (follow its links only) or a recipe
//! detail page (extract and store), and which discovered links are worth
//! queueing. Classification is advisory: detail pages still go through
//! validation before anything is stored.

use std::collections::HashSet;
use std::sync::Arc;

use scraper::{Html, Selector};
use url::Url;

use super::config::{ProfileSet, SiteProfile};
use crate::models::PageKind;

/// Path fragments of category and index pages.
const LISTING_PATTERNS: [&str; 10] = [
    "/recipes/",
    "/cooking/recipe-ideas/",
    "/recipe-ideas/",
    "/recipes-a-z/",
    "/category/",
    "/collections/",
    "/meal-type/",
    "/cuisines/",
    "/cooking-method/",
    "/holidays-events/",
];

/// Path fragments that suggest a single recipe.
const RECIPE_INDICATORS: [&str; 6] = ["/recipe/", "/recipes/", "-recipe", "recipe-", "-recipes", "recipes-"];

/// Link tokens followed on sites without a profile.
const GENERIC_LINK_TOKENS: [&str; 22] = [
    "/recipe/",
    "/recipes/",
    "/cooking/",
    "/food/",
    "/dish/",
    "/meal/",
    "recipe-ideas",
    "quick-and-easy",
    "chicken",
    "tacos",
    "pasta",
    "soup",
    "dessert",
    "breakfast",
    "lunch",
    "dinner",
    "appetizer",
    "snack",
    "vegetarian",
    "vegan",
    "healthy",
    "easy",
];

const SOCIAL_DOMAINS: [&str; 4] = ["twitter.com", "facebook.com", "instagram.com", "pinterest.com"];

/// Extensions that never lead to an HTML page.
const ASSET_EXTENSIONS: [&str; 14] = [
    ".jpg", ".jpeg", ".png", ".gif", ".webp", ".svg", ".pdf", ".zip", ".mp4", ".mp3", ".css", ".js",
    ".xml", ".ico",
];

/// Classifies URLs and filters discovered links, consulting site profiles.
#[derive(Debug, Clone)]
pub struct UrlClassifier {
    profiles: Arc<ProfileSet>,
    allowed_domains: Vec<String>,
}

impl UrlClassifier {
    pub fn new(profiles: Arc<ProfileSet>) -> Self {
        Self {
            profiles,
            allowed_domains: Vec::new(),
        }
    }

    /// Only follow links whose host ends with one of these domains.
    pub fn with_allowed_domains(mut self, domains: Vec<String>) -> Self {
        self.allowed_domains = domains
            .into_iter()
            .map(|d| d.trim().to_ascii_lowercase())
            .filter(|d| !d.is_empty())
            .collect();
        self
    }

    pub fn profiles(&self) -> &ProfileSet {
        &self.profiles
    }

    /// Profile for the URL's host, if any.
    pub fn profile_for(&self, url: &Url) -> Option<&SiteProfile> {
        url.host_str().and_then(|h| self.profiles.for_host(h))
    }

    /// Listing if the path sits on a listing pattern with at most one extra
    /// segment, unless a site rule marks it as a detail page.
    pub fn classify(&self, url: &Url) -> PageKind {
        if self.matches_detail_rule(url) {
            return PageKind::Detail;
        }
        if is_listing_path(url.path()) {
            PageKind::Listing
        } else {
            PageKind::Detail
        }
    }

    /// Whether the URL strongly suggests a single recipe page.
    pub fn is_likely_recipe(&self, url: &Url) -> bool {
        let path = url.path().to_ascii_lowercase();
        RECIPE_INDICATORS.iter().any(|i| path.contains(i)) || self.matches_detail_rule(url)
    }

    fn matches_detail_rule(&self, url: &Url) -> bool {
        self.profile_for(url)
            .is_some_and(|p| p.is_detail_path(url.path()))
    }

    /// Whether an absolute link may be queued.
    pub fn is_crawl_worthy(&self, link: &Url) -> bool {
        if !matches!(link.scheme(), "http" | "https") {
            return false;
        }
        let Some(host) = link.host_str().map(str::to_ascii_lowercase) else {
            return false;
        };
        if SOCIAL_DOMAINS.iter().any(|d| host.contains(d)) {
            return false;
        }
        let path = link.path().to_ascii_lowercase();
        if ASSET_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
            return false;
        }
        self.is_allowed_domain(link)
    }

    /// Whether the domain allow-list (if any) admits this URL's host.
    pub fn is_allowed_domain(&self, url: &Url) -> bool {
        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        self.allowed_domains.is_empty()
            || self
                .allowed_domains
                .iter()
                .any(|d| host == *d || host.ends_with(&format!(".{}", d)))
    }

    /// Discover followable links on a page, canonicalized and deduplicated
    /// in document order.
    pub fn discover_links(&self, document: &Html, page_url: &Url) -> Vec<String> {
        let profile = self.profile_for(page_url);
        let selector = match profile {
            Some(p) if !p.link_selectors.is_empty() => p.link_selectors.join(", "),
            _ => "body a".to_string(),
        };
        let Ok(selector) = Selector::parse(&selector) else {
            return Vec::new();
        };

        let mut seen = HashSet::new();
        let mut links = Vec::new();

        for anchor in document.select(&selector) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            if !is_followable_href(href) {
                continue;
            }
            if profile.is_none() && !is_generic_recipe_link(href) {
                continue;
            }
            let Some(resolved) = resolve_link(page_url, href) else {
                continue;
            };
            if let Some(p) = profile {
                if !p.url_patterns.is_empty() && !p.is_recipe_link(resolved.as_str()) {
                    continue;
                }
            }
            if !self.is_crawl_worthy(&resolved) {
                continue;
            }
            let canonical = canonicalize(&resolved);
            if seen.insert(canonical.clone()) {
                links.push(canonical);
            }
        }

        links
    }
}

fn is_listing_path(path: &str) -> bool {
    let path = path.to_ascii_lowercase();
    let slashes = path.matches('/').count();
    LISTING_PATTERNS.iter().any(|pattern| {
        let trimmed = pattern.trim_end_matches('/');
        let on_pattern = path.contains(pattern) || path.ends_with(trimmed);
        on_pattern && slashes <= pattern.matches('/').count() + 1
    })
}

fn is_generic_recipe_link(href: &str) -> bool {
    let href = href.to_ascii_lowercase();
    GENERIC_LINK_TOKENS.iter().any(|t| href.contains(t))
}

/// Reject fragments, script and contact links, and social-sharing targets
/// before resolution.
fn is_followable_href(href: &str) -> bool {
    let href = href.trim();
    let lower = href.to_ascii_lowercase();
    !(href.is_empty()
        || href.starts_with('#')
        || lower.starts_with("javascript")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || SOCIAL_DOMAINS.iter().any(|d| lower.contains(d)))
}

/// Resolve an href against the page URL. Rooted paths join against
/// scheme and host, other relative paths against the page's directory.
pub fn resolve_link(base: &Url, href: &str) -> Option<Url> {
    base.join(href.trim()).ok()
}

/// Canonical form used for fetching and storing: lowercase scheme and
/// host, no fragment, no `utm_*` tracking parameters.
pub fn canonicalize(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !k.to_ascii_lowercase().starts_with("utm_"))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }

    url.to_string()
}

/// Visited-set key: the canonical URL without a trailing slash on
/// non-root paths, so `/soups` and `/soups/` are fetched once.
pub fn visit_key(canonical: &str) -> String {
    match Url::parse(canonical) {
        Ok(mut url) => {
            let path = url.path().to_string();
            if path.len() > 1 && path.ends_with('/') {
                url.set_path(path.trim_end_matches('/'));
            }
            url.to_string()
        }
        Err(_) => canonical.to_string(),
    }
}

/// Parse and canonicalize a URL string.
pub fn canonicalize_str(raw: &str) -> Option<String> {
    Url::parse(raw.trim()).ok().map(|u| canonicalize(&u))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> UrlClassifier {
        UrlClassifier::new(Arc::new(ProfileSet::builtin().unwrap()))
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_listing_pages() {
        let c = classifier();
        assert_eq!(c.classify(&url("https://site.com/recipes/")), PageKind::Listing);
        assert_eq!(c.classify(&url("https://site.com/recipes")), PageKind::Listing);
        assert_eq!(c.classify(&url("https://site.com/category/desserts/")), PageKind::Listing);
        assert_eq!(c.classify(&url("https://site.com/cuisines/italian")), PageKind::Listing);
    }

    #[test]
    fn test_detail_pages() {
        let c = classifier();
        assert_eq!(
            c.classify(&url("https://site.com/recipe/12345/chocolate-cake/")),
            PageKind::Detail
        );
        assert_eq!(
            c.classify(&url("https://site.com/recipes/desserts/cakes/lemon-cake/")),
            PageKind::Detail
        );
        assert_eq!(c.classify(&url("https://site.com/lemon-bars/")), PageKind::Detail);
    }

    #[test]
    fn test_site_rule_overrides_listing_shape() {
        let c = classifier();
        // Two segments under /recipes/ would be a listing, but the site
        // keeps recipes at /recipes/<chef>/<slug>.
        assert_eq!(
            c.classify(&url("https://www.foodnetwork.com/recipes/ina-garten/roast-chicken")),
            PageKind::Detail
        );
        assert_eq!(
            c.classify(&url("https://www.foodnetwork.com/recipes/")),
            PageKind::Listing
        );
    }

    #[test]
    fn test_likely_recipe() {
        let c = classifier();
        assert!(c.is_likely_recipe(&url("https://site.com/best-brownies-recipe/")));
        assert!(c.is_likely_recipe(&url("https://site.com/recipe/1/x")));
        assert!(c.is_likely_recipe(&url("https://www.allrecipes.com/recipe/10813/cookies/")));
        assert!(!c.is_likely_recipe(&url("https://site.com/about/")));
    }

    #[test]
    fn test_crawl_worthy() {
        let c = classifier();
        assert!(c.is_crawl_worthy(&url("https://site.com/recipes/soup")));
        assert!(!c.is_crawl_worthy(&url("https://www.pinterest.com/pin/1")));
        assert!(!c.is_crawl_worthy(&url("https://site.com/images/cake.jpg")));
        assert!(!c.is_crawl_worthy(&url("ftp://site.com/recipes/")));

        let scoped = classifier().with_allowed_domains(vec!["site.com".to_string()]);
        assert!(scoped.is_crawl_worthy(&url("https://www.site.com/recipes/")));
        assert!(!scoped.is_crawl_worthy(&url("https://othersite.com/recipes/")));
    }

    #[test]
    fn test_resolve_link() {
        let base = url("https://site.com/recipes/desserts/index.html");
        assert_eq!(
            resolve_link(&base, "/recipe/1").unwrap().as_str(),
            "https://site.com/recipe/1"
        );
        assert_eq!(
            resolve_link(&base, "brownies").unwrap().as_str(),
            "https://site.com/recipes/desserts/brownies"
        );
        assert_eq!(
            resolve_link(&base, "//cdn.site.com/recipes/x").unwrap().as_str(),
            "https://cdn.site.com/recipes/x"
        );
    }

    #[test]
    fn test_canonicalize() {
        assert_eq!(
            canonicalize(&url("HTTPS://Site.COM/Recipes/Cake/?utm_source=x&id=2#comments")),
            "https://site.com/Recipes/Cake/?id=2"
        );
        assert_eq!(canonicalize(&url("https://site.com/")), "https://site.com/");
        assert_eq!(
            canonicalize(&url("https://site.com/recipes/?utm_medium=social")),
            "https://site.com/recipes/"
        );
    }

    #[test]
    fn test_visit_key() {
        assert_eq!(visit_key("https://site.com/recipes/"), "https://site.com/recipes");
        assert_eq!(visit_key("https://site.com/recipes"), "https://site.com/recipes");
        assert_eq!(visit_key("https://site.com/"), "https://site.com/");
        assert_eq!(visit_key("https://site.com/a/?q=1"), "https://site.com/a?q=1");
    }

    #[test]
    fn test_discover_links_generic() {
        let html = Html::parse_document(
            r##"<html><body>
                <a href="/recipes/soups/">Soups</a>
                <a href="/recipes/soups/#top">Soups again</a>
                <a href="#comments">Comments</a>
                <a href="mailto:me@site.com">Mail</a>
                <a href="https://facebook.com/share?u=/recipes/">Share</a>
                <a href="/about-us/">About</a>
                <a href="chicken-tacos">Tacos</a>
            </body></html>"##,
        );
        let links = classifier().discover_links(&html, &url("https://example.com/recipes/"));
        assert_eq!(
            links,
            vec![
                "https://example.com/recipes/soups/",
                "https://example.com/recipes/chicken-tacos"
            ]
        );
    }

    #[test]
    fn test_discover_links_with_profile() {
        let html = Html::parse_document(
            r#"<html><body>
                <a href="/recipes/lentil-soup/">Lentil soup</a>
                <a href="/shop/cookbook/">Cookbook</a>
                <a href="/recipe/kale-salad/">Salad</a>
            </body></html>"#,
        );
        let links = classifier().discover_links(&html, &url("https://pinchofyum.com/"));
        assert_eq!(
            links,
            vec![
                "https://pinchofyum.com/recipes/lentil-soup/",
                "https://pinchofyum.com/recipe/kale-salad/"
            ]
        );
    }
}
