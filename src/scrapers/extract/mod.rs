//! Layered recipe extraction.
//!
//! Three tiers run in order against the parsed page: embedded JSON-LD,
//! selector rules (site profile or generic), then narrative-text
//! heuristics. Each field is taken from the first tier that produced it,
//! so ingredients may come from JSON-LD while instructions come from prose.
//! Extraction never fails; missing data is left empty for validation to
//! judge.

mod duration;
mod jsonld;
mod narrative;
mod selectors;

pub use duration::humanize_duration;
pub use narrative::{is_ingredient_line, is_instruction_line};

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use serde::Serialize;
use url::Url;

use super::config::SiteProfile;

static STEP_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:step\s*\d+\s*[:.)\-]?|\d+\s*[.):\-])\s*").expect("valid step regex")
});

/// Recipe fields pulled from a single page. Empty lists and `None` mean
/// the field was not found.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecipeFields {
    pub title: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub prep_time: Option<String>,
    pub cook_time: Option<String>,
    pub total_time: Option<String>,
    pub calories: Option<String>,
    pub servings: Option<String>,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub categories: Vec<String>,
    /// Visible page text.
    #[serde(skip)]
    pub body: String,
}

impl RecipeFields {
    /// Fill every missing field from a lower-priority tier.
    fn fill_from(&mut self, lower: RecipeFields) {
        fn keep<T>(slot: &mut Option<T>, value: Option<T>) {
            if slot.is_none() {
                *slot = value;
            }
        }
        fn keep_list(slot: &mut Vec<String>, value: Vec<String>) {
            if slot.is_empty() {
                *slot = value;
            }
        }

        keep(&mut self.title, lower.title);
        keep(&mut self.name, lower.name);
        keep(&mut self.description, lower.description);
        keep(&mut self.image, lower.image);
        keep(&mut self.prep_time, lower.prep_time);
        keep(&mut self.cook_time, lower.cook_time);
        keep(&mut self.total_time, lower.total_time);
        keep(&mut self.calories, lower.calories);
        keep(&mut self.servings, lower.servings);
        keep_list(&mut self.ingredients, lower.ingredients);
        keep_list(&mut self.instructions, lower.instructions);
        keep_list(&mut self.categories, lower.categories);
        if self.body.is_empty() {
            self.body = lower.body;
        }
    }

    pub fn has_ingredients(&self) -> bool {
        !self.ingredients.is_empty()
    }

    pub fn has_instructions(&self) -> bool {
        !self.instructions.is_empty()
    }

    /// Title, guaranteed non-empty unless the URL has no usable path.
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or_default()
    }
}

/// Run all extraction tiers against a parsed page.
pub fn extract(document: &Html, url: &Url, profile: Option<&SiteProfile>) -> RecipeFields {
    let mut fields = jsonld::extract(document);
    fields.fill_from(selectors::extract(document, profile.map(|p| &p.selectors)));
    fields.fill_from(selectors::extract_meta(document));

    if !fields.has_ingredients() || !fields.has_instructions() {
        let scope = profile.and_then(|p| p.narrative_scope.as_deref());
        fields.fill_from(narrative::extract(document, scope));
    }

    fields.body = page_text(document);
    finish(fields, url)
}

/// Post-processing shared by every tier.
fn finish(mut fields: RecipeFields, url: &Url) -> RecipeFields {
    fields.ingredients = clean_lines(fields.ingredients, |l| l);
    fields.instructions = clean_lines(fields.instructions, strip_step_prefix);
    fields.categories = clean_lines(fields.categories, |l| l);

    let non_empty = |v: Option<String>| v.map(|s| normalize_whitespace(&s)).filter(|s| !s.is_empty());
    fields.name = non_empty(fields.name);
    fields.title = non_empty(fields.title)
        .or_else(|| fields.name.clone())
        .or_else(|| title_from_url(url));
    if fields.name.is_none() {
        fields.name = fields.title.clone();
    }
    fields.description = non_empty(fields.description);

    fields
}

/// Whitespace-normalize, drop empties, and dedupe while keeping order.
fn clean_lines(lines: Vec<String>, transform: impl Fn(String) -> String) -> Vec<String> {
    let mut seen = HashSet::new();
    lines
        .into_iter()
        .map(|l| transform(normalize_whitespace(&l)))
        .filter(|l| !l.is_empty())
        .filter(|l| seen.insert(l.to_lowercase()))
        .collect()
}

fn strip_step_prefix(line: String) -> String {
    STEP_PREFIX.replace(&line, "").trim().to_string()
}

/// Collapse runs of whitespace (non-breaking spaces included) into one
/// space and trim.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Last path segment, kebab-case turned into Title Case.
pub fn title_from_url(url: &Url) -> Option<String> {
    let segment = url
        .path_segments()?
        .filter(|s| !s.is_empty())
        .last()?;
    let segment = segment.rsplit_once('.').map_or(segment, |(stem, _)| stem);

    let words: Vec<String> = segment
        .split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect();

    (!words.is_empty()).then(|| words.join(" "))
}

/// Visible text of the page body.
pub fn page_text(document: &Html) -> String {
    let Ok(body) = Selector::parse("body") else {
        return String::new();
    };
    document
        .select(&body)
        .next()
        .map(|b| normalize_whitespace(&narrative::visible_text(b)))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_tiers_fill_independently() {
        let html = Html::parse_document(
            r#"<html><head>
                <script type="application/ld+json">
                {"@type":"Recipe","name":"Shortbread","recipeIngredient":["1 cup butter","2 cups flour"]}
                </script></head>
                <body><div class="entry-content">
                    <p>Step 1: Stir the butter and sugar until fluffy.</p>
                    <p>2. Add the flour and mix until just combined.</p>
                </div></body></html>"#,
        );
        let fields = extract(&html, &url("https://example.com/shortbread/"), None);
        assert_eq!(fields.name.as_deref(), Some("Shortbread"));
        assert_eq!(fields.title.as_deref(), Some("Shortbread"));
        assert_eq!(fields.ingredients, vec!["1 cup butter", "2 cups flour"]);
        assert_eq!(
            fields.instructions,
            vec![
                "Stir the butter and sugar until fluffy.",
                "Add the flour and mix until just combined."
            ]
        );
    }

    #[test]
    fn test_out_of_range_cook_time_is_kept() {
        let html = Html::parse_document(
            r#"<html><head><script type="application/ld+json">
                {"@type":"Recipe","name":"Stew","cookTime":"PT18446744073709551615H60M"}
                </script></head><body></body></html>"#,
        );
        let fields = extract(&html, &url("https://example.com/stew/"), None);
        assert_eq!(fields.cook_time.as_deref(), Some("18446744073709551615 hr"));
    }

    #[test]
    fn test_lists_are_deduplicated() {
        let lines = vec![
            " 1 cup  sugar".to_string(),
            "1 cup sugar".to_string(),
            "".to_string(),
            "2 eggs".to_string(),
        ];
        assert_eq!(clean_lines(lines, |l| l), vec!["1 cup sugar", "2 eggs"]);
    }

    #[test]
    fn test_step_prefixes() {
        assert_eq!(strip_step_prefix("Step 3: Bake".to_string()), "Bake");
        assert_eq!(strip_step_prefix("3. Bake".to_string()), "Bake");
        assert_eq!(strip_step_prefix("STEP 12 Rest".to_string()), "Rest");
        assert_eq!(strip_step_prefix("350 degrees".to_string()), "350 degrees");
    }

    #[test]
    fn test_title_from_url() {
        assert_eq!(
            title_from_url(&url("https://example.com/recipes/chocolate-chip-cookies/")),
            Some("Chocolate Chip Cookies".to_string())
        );
        assert_eq!(
            title_from_url(&url("https://example.com/banana_bread.html")),
            Some("Banana Bread".to_string())
        );
        assert_eq!(title_from_url(&url("https://example.com/")), None);
    }

    #[test]
    fn test_title_falls_back_to_url() {
        let html = Html::parse_document("<html><body><p>nothing here</p></body></html>");
        let fields = extract(&html, &url("https://example.com/garlic-knots"), None);
        assert_eq!(fields.title.as_deref(), Some("Garlic Knots"));
        assert_eq!(fields.name.as_deref(), Some("Garlic Knots"));
        assert_eq!(fields.body, "nothing here");
    }

    #[test]
    fn test_profile_selectors_used() {
        let profiles = crate::scrapers::ProfileSet::builtin().unwrap();
        let profile = profiles.for_host("www.budgetbytes.com");
        let html = Html::parse_document(
            r#"<html><body>
                <h1 class="entry-title">One Pot Pasta</h1>
                <ul class="ingredients"><li>8 oz pasta</li></ul>
                <ul class="instructions"><li>Boil everything together.</li></ul>
            </body></html>"#,
        );
        let fields = extract(&html, &url("https://www.budgetbytes.com/one-pot-pasta/"), profile);
        assert_eq!(fields.title.as_deref(), Some("One Pot Pasta"));
        assert_eq!(fields.ingredients, vec!["8 oz pasta"]);
        assert_eq!(fields.instructions, vec!["Boil everything together."]);
    }
}
