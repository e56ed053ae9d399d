//! Site-profile tier: CSS selector rules, with generic schema.org and
//! plugin conventions when no profile matches or a rule finds nothing.

use scraper::{ElementRef, Html, Selector};

use super::duration::humanize_duration;
use super::{normalize_whitespace, RecipeFields};
use crate::scrapers::config::SelectorRules;

const GENERIC_TITLE: &[&str] = &["[itemprop='name']", "h1.recipe-title, h1.entry-title, .wprm-recipe-name", "h1"];
const GENERIC_DESCRIPTION: &[&str] =
    &["[itemprop='description']", ".recipe-description, .recipe-summary, .wprm-recipe-summary"];
const GENERIC_INGREDIENTS: &[&str] = &[
    "[itemprop='recipeIngredient'], [itemprop='ingredients']",
    ".wprm-recipe-ingredient, .tasty-recipes-ingredients li",
    ".recipe-ingredients li, .ingredients li",
];
const GENERIC_INSTRUCTIONS: &[&str] = &[
    "[itemprop='recipeInstructions'] li",
    ".wprm-recipe-instruction-text, .tasty-recipes-instructions li",
    ".recipe-instructions li, .instructions li",
    "[itemprop='recipeInstructions']",
];
const GENERIC_TIME: &[&str] = &[
    "[itemprop='totalTime']",
    ".wprm-recipe-total_time-container, .recipe-time, .total-time",
];
const GENERIC_SERVINGS: &[&str] = &[
    "[itemprop='recipeYield']",
    ".wprm-recipe-servings, .recipe-servings, .servings, .yield",
];

/// The profile's selector (if set) followed by the generic ones.
fn chain<'a>(own: Option<&'a str>, generic: &[&'a str]) -> Vec<&'a str> {
    own.into_iter().chain(generic.iter().copied()).collect()
}

/// Apply the profile's rules (if any), falling back per field to the
/// generic selectors.
pub fn extract(document: &Html, rules: Option<&SelectorRules>) -> RecipeFields {
    let rules = rules.cloned().unwrap_or_default();

    let first_text = |selectors: Vec<&str>| selectors.into_iter().find_map(|s| select_first(document, s));
    let all_text = |selectors: Vec<&str>| {
        selectors
            .into_iter()
            .map(|s| select_all(document, s))
            .find(|items| !items.is_empty())
            .unwrap_or_default()
    };

    let total_time = first_text(chain(rules.time.as_deref(), GENERIC_TIME))
        .map(|t| humanize_duration(&t));

    RecipeFields {
        title: first_text(chain(rules.title.as_deref(), GENERIC_TITLE)),
        description: first_text(chain(rules.description.as_deref(), GENERIC_DESCRIPTION)),
        ingredients: all_text(chain(rules.ingredients.as_deref(), GENERIC_INGREDIENTS)),
        instructions: all_text(chain(rules.instructions.as_deref(), GENERIC_INSTRUCTIONS)),
        prep_time: itemprop_duration(document, "prepTime"),
        cook_time: itemprop_duration(document, "cookTime"),
        total_time: total_time.filter(|t| !t.is_empty()),
        servings: first_text(chain(rules.servings.as_deref(), GENERIC_SERVINGS)),
        ..Default::default()
    }
}

/// Page-level metadata: `<title>`, meta description, Open Graph and
/// Twitter cards.
pub fn extract_meta(document: &Html) -> RecipeFields {
    RecipeFields {
        title: meta_content(document, "meta[property='og:title']")
            .or_else(|| select_first(document, "title")),
        description: meta_content(document, "meta[name='description']")
            .or_else(|| meta_content(document, "meta[property='og:description']")),
        image: meta_content(document, "meta[property='og:image']")
            .or_else(|| meta_content(document, "meta[name='twitter:image']")),
        ..Default::default()
    }
}

fn element_text(element: ElementRef<'_>) -> Option<String> {
    // Microdata often keeps the machine value in `content`
    let text = element
        .value()
        .attr("content")
        .map(str::to_string)
        .unwrap_or_else(|| element.text().collect::<String>());
    let text = normalize_whitespace(&text);
    (!text.is_empty()).then_some(text)
}

pub(super) fn select_first(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document.select(&selector).find_map(element_text)
}

pub(super) fn select_all(document: &Html, selector: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse(selector) else {
        return Vec::new();
    };
    document.select(&selector).filter_map(element_text).collect()
}

fn meta_content(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .filter_map(|el| el.value().attr("content"))
        .map(normalize_whitespace)
        .find(|c| !c.is_empty())
}

fn itemprop_duration(document: &Html, prop: &str) -> Option<String> {
    let selector = format!("[itemprop='{}']", prop);
    select_first(document, &selector)
        .map(|raw| humanize_duration(&raw))
        .filter(|d| !d.is_empty())
}
