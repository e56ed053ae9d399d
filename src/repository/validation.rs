//! Minimum-data validation before a page becomes a recipe record.

use serde::Serialize;
use url::Url;

use crate::models::Recipe;
use crate::scrapers::{canonicalize, RecipeFields, UrlClassifier};

pub const INGREDIENTS_PLACEHOLDER: &str = "Ingredients mentioned in page but not structured";
pub const INSTRUCTIONS_PLACEHOLDER: &str = "Instructions mentioned in page but not structured";

const INGREDIENT_KEYWORDS: &[&str] = &["ingredient"];
const INSTRUCTION_KEYWORDS: &[&str] =
    &["direction", "instruction", "steps", "method", "preparation"];

/// Why a page was not turned into a record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("domain not allowed: {0}")]
    DomainNotAllowed(String),
    #[error("missing name and title")]
    MissingTitle,
    #[error("missing ingredients and instructions")]
    InsufficientData,
}

/// Content signals found on a page, structured or textual.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DataChecks {
    pub has_title: bool,
    pub structured_ingredients: bool,
    pub structured_instructions: bool,
    pub body_mentions_ingredients: bool,
    pub body_mentions_instructions: bool,
}

impl DataChecks {
    pub fn of(fields: &RecipeFields) -> Self {
        let body = fields.body.to_lowercase();
        let mentions = |keywords: &[&str]| keywords.iter().any(|k| body.contains(k));
        Self {
            has_title: !fields.display_title().trim().is_empty()
                || fields.name.as_deref().is_some_and(|n| !n.trim().is_empty()),
            structured_ingredients: fields.has_ingredients(),
            structured_instructions: fields.has_instructions(),
            body_mentions_ingredients: mentions(INGREDIENT_KEYWORDS),
            body_mentions_instructions: mentions(INSTRUCTION_KEYWORDS),
        }
    }

    pub fn has_ingredients(&self) -> bool {
        self.structured_ingredients || self.body_mentions_ingredients
    }

    pub fn has_instructions(&self) -> bool {
        self.structured_instructions || self.body_mentions_instructions
    }

    pub fn has_minimum_data(&self) -> bool {
        self.has_title && (self.has_ingredients() || self.has_instructions())
    }
}

/// Turn extracted fields into a storable record, or say why not.
///
/// Body text that mentions ingredients or instructions counts as a weak
/// signal. On URLs that look like recipes, a list backed only by such text
/// is stored as a placeholder line instead of being left empty.
pub fn validate(
    fields: &RecipeFields,
    page_url: &str,
    classifier: &UrlClassifier,
) -> Result<Recipe, Rejection> {
    let url = Url::parse(page_url.trim())
        .ok()
        .filter(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .ok_or_else(|| Rejection::InvalidUrl(page_url.to_string()))?;
    if !classifier.is_allowed_domain(&url) {
        return Err(Rejection::DomainNotAllowed(
            url.host_str().unwrap_or_default().to_string(),
        ));
    }

    let checks = DataChecks::of(fields);
    if !checks.has_title {
        return Err(Rejection::MissingTitle);
    }
    if !checks.has_minimum_data() {
        return Err(Rejection::InsufficientData);
    }

    let title = fields
        .title
        .clone()
        .filter(|t| !t.trim().is_empty())
        .or_else(|| fields.name.clone())
        .unwrap_or_default();

    let canonical = Url::parse(&canonicalize(&url)).unwrap_or(url);
    let mut recipe = Recipe::new(title, &canonical);
    if let Some(name) = fields.name.clone().filter(|n| !n.trim().is_empty()) {
        recipe.name = name;
    }
    recipe.description = fields.description.clone();
    recipe.body = fields.body.clone();
    recipe.image = fields.image.clone();
    recipe.prep_time = fields.prep_time.clone();
    recipe.cook_time = fields.cook_time.clone();
    recipe.total_time = fields.total_time.clone();
    recipe.calories = fields.calories.clone();
    recipe.servings = fields.servings.clone();
    recipe.ingredients = fields.ingredients.clone();
    recipe.instructions = fields.instructions.clone();
    recipe.categories = fields.categories.clone();

    if classifier.is_likely_recipe(&canonical) {
        if !checks.structured_ingredients && checks.body_mentions_ingredients {
            recipe.ingredients = vec![INGREDIENTS_PLACEHOLDER.to_string()];
        }
        if !checks.structured_instructions && checks.body_mentions_instructions {
            recipe.instructions = vec![INSTRUCTIONS_PLACEHOLDER.to_string()];
        }
    }

    Ok(recipe)
}
