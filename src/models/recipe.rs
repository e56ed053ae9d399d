//! Recipe records as stored in the search index.
//!
//! A `Recipe` is created once per newly discovered recipe page and is only
//! mutated afterwards through a `RecipePatch`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// A normalized recipe record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    /// Generated identifier, assigned at creation and never changed.
    pub id: String,
    pub title: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Visible page text, kept for full-text search.
    #[serde(default)]
    pub body: String,
    /// Absolute, canonical page URL.
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prep_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cook_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calories: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub servings: Option<String>,
    /// Ordered ingredient lines. Empty means missing.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ingredients: Vec<String>,
    /// Ordered instruction steps. Empty means missing.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instructions: Vec<String>,
    /// Hostname the recipe was crawled from.
    pub source_site: String,
    pub crawl_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
}

impl Recipe {
    /// Create a record with a fresh id for the given page.
    pub fn new(title: String, url: &Url) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: title.clone(),
            title,
            description: None,
            body: String::new(),
            url: url.to_string(),
            image: None,
            prep_time: None,
            cook_time: None,
            total_time: None,
            calories: None,
            servings: None,
            ingredients: Vec::new(),
            instructions: Vec::new(),
            source_site: url.host_str().unwrap_or_default().to_string(),
            crawl_date: Utc::now(),
            categories: Vec::new(),
        }
    }

    pub fn has_ingredients(&self) -> bool {
        self.ingredients.iter().any(|l| !l.trim().is_empty())
    }

    pub fn has_instructions(&self) -> bool {
        self.instructions.iter().any(|l| !l.trim().is_empty())
    }

    /// Build a patch that carries every content field of this record except
    /// its URL, for merging a fresh crawl into an existing record.
    pub fn to_patch(&self) -> RecipePatch {
        RecipePatch {
            url: None,
            title: Some(self.title.clone()),
            name: Some(self.name.clone()),
            description: self.description.clone(),
            body: (!self.body.is_empty()).then(|| self.body.clone()),
            image: self.image.clone(),
            prep_time: self.prep_time.clone(),
            cook_time: self.cook_time.clone(),
            total_time: self.total_time.clone(),
            calories: self.calories.clone(),
            servings: self.servings.clone(),
            ingredients: (!self.ingredients.is_empty()).then(|| self.ingredients.clone()),
            instructions: (!self.instructions.is_empty()).then(|| self.instructions.clone()),
            categories: (!self.categories.is_empty()).then(|| self.categories.clone()),
        }
    }
}

/// Partial update for a stored recipe. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecipePatch {
    pub url: Option<String>,
    pub title: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub body: Option<String>,
    pub image: Option<String>,
    pub prep_time: Option<String>,
    pub cook_time: Option<String>,
    pub total_time: Option<String>,
    pub calories: Option<String>,
    pub servings: Option<String>,
    pub ingredients: Option<Vec<String>>,
    pub instructions: Option<Vec<String>>,
    pub categories: Option<Vec<String>>,
}

impl RecipePatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the patch onto a record.
    pub fn apply(&self, recipe: &mut Recipe) {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(v) = value {
                *target = v.clone();
            }
        }
        fn set_opt<T: Clone>(target: &mut Option<T>, value: &Option<T>) {
            if value.is_some() {
                *target = value.clone();
            }
        }

        set(&mut recipe.url, &self.url);
        set(&mut recipe.title, &self.title);
        set(&mut recipe.name, &self.name);
        set_opt(&mut recipe.description, &self.description);
        set(&mut recipe.body, &self.body);
        set_opt(&mut recipe.image, &self.image);
        set_opt(&mut recipe.prep_time, &self.prep_time);
        set_opt(&mut recipe.cook_time, &self.cook_time);
        set_opt(&mut recipe.total_time, &self.total_time);
        set_opt(&mut recipe.calories, &self.calories);
        set_opt(&mut recipe.servings, &self.servings);
        set(&mut recipe.ingredients, &self.ingredients);
        set(&mut recipe.instructions, &self.instructions);
        set(&mut recipe.categories, &self.categories);
    }
}
