//! Structured-data tier: `Recipe` objects embedded as JSON-LD.

use scraper::{Html, Selector};
use serde_json::Value;
use tracing::debug;

use super::duration::humanize_duration;
use super::RecipeFields;

/// Extract fields from the first JSON-LD `Recipe` node in the document.
pub fn extract(document: &Html) -> RecipeFields {
    let Ok(selector) = Selector::parse(r#"script[type="application/ld+json"]"#) else {
        return RecipeFields::default();
    };

    for script in document.select(&selector) {
        let raw: String = script.text().collect();
        let json: Value = match serde_json::from_str(&sanitize_json(&raw)) {
            Ok(v) => v,
            Err(e) => {
                debug!("Skipping malformed JSON-LD block: {}", e);
                continue;
            }
        };

        if let Some(recipe) = find_recipe(&json) {
            return fields_from_recipe(recipe);
        }
    }

    RecipeFields::default()
}

/// Escape raw control characters inside JSON strings. Many sites embed
/// literal newlines in JSON-LD, which strict parsers reject.
fn sanitize_json(json: &str) -> String {
    let mut result = String::with_capacity(json.len());
    let mut in_string = false;
    let mut escaped = false;

    for c in json.chars() {
        if in_string {
            if escaped {
                escaped = false;
                result.push(c);
                continue;
            }
            match c {
                '\\' => {
                    escaped = true;
                    result.push(c);
                }
                '"' => {
                    in_string = false;
                    result.push(c);
                }
                '\n' => result.push_str("\\n"),
                '\r' => result.push_str("\\r"),
                '\t' => result.push_str("\\t"),
                c if c.is_control() => {}
                c => result.push(c),
            }
        } else {
            if c == '"' {
                in_string = true;
            }
            result.push(c);
        }
    }

    result
}

fn is_recipe_type(value: &Value) -> bool {
    match value {
        Value::String(s) => s.eq_ignore_ascii_case("recipe"),
        Value::Array(items) => items.iter().any(is_recipe_type),
        _ => false,
    }
}

/// Depth-first search for a node whose `@type` is `Recipe`.
fn find_recipe(json: &Value) -> Option<&Value> {
    match json {
        Value::Object(obj) => {
            if obj.get("@type").is_some_and(is_recipe_type) {
                return Some(json);
            }
            if let Some(recipe) = obj.get("@graph").and_then(find_recipe) {
                return Some(recipe);
            }
            obj.iter()
                .filter(|(key, _)| key.as_str() != "@graph")
                .find_map(|(_, value)| find_recipe(value))
        }
        Value::Array(items) => items.iter().find_map(find_recipe),
        _ => None,
    }
}

fn fields_from_recipe(recipe: &Value) -> RecipeFields {
    let duration = |key: &str| {
        scalar(recipe.get(key))
            .map(|d| humanize_duration(&d))
            .filter(|d| !d.is_empty())
    };

    let mut categories = keyword_list(recipe.get("recipeCategory"));
    categories.extend(keyword_list(recipe.get("recipeCuisine")));

    RecipeFields {
        name: scalar(recipe.get("name")),
        description: scalar(recipe.get("description")),
        image: image(recipe.get("image")),
        ingredients: string_list(
            recipe
                .get("recipeIngredient")
                .or_else(|| recipe.get("ingredients")),
        ),
        instructions: recipe
            .get("recipeInstructions")
            .map(instructions)
            .unwrap_or_default(),
        prep_time: duration("prepTime"),
        cook_time: duration("cookTime"),
        total_time: duration("totalTime"),
        servings: servings(recipe.get("recipeYield")),
        calories: recipe
            .get("nutrition")
            .and_then(|n| scalar(n.get("calories"))),
        categories,
        ..Default::default()
    }
}

/// A string or number rendered as trimmed text.
fn scalar(value: Option<&Value>) -> Option<String> {
    let text = match value? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => return items.iter().find_map(|v| scalar(Some(v))),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(|v| scalar(Some(v))).collect(),
        Some(Value::String(s)) => s
            .lines()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    }
}

/// Comma-separated keywords, or a list of them.
fn keyword_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        other => string_list(other),
    }
}

/// Instructions may be a plain string, a list of strings, `HowToStep`
/// objects, or `HowToSection` objects wrapping steps.
fn instructions(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => s
            .lines()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        Value::Array(items) => items.iter().flat_map(instructions).collect(),
        Value::Object(obj) => {
            if let Some(children) = obj.get("itemListElement") {
                return instructions(children);
            }
            obj.get("text")
                .or_else(|| obj.get("name"))
                .and_then(|t| scalar(Some(t)))
                .into_iter()
                .collect()
        }
        _ => Vec::new(),
    }
}

fn image(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Array(items) => items.iter().find_map(|v| image(Some(v))),
        Value::Object(obj) => scalar(obj.get("url")),
        _ => None,
    }
}

fn servings(value: Option<&Value>) -> Option<String> {
    match value? {
        // ["4", "4 servings"]: prefer the more descriptive entry
        Value::Array(items) => items
            .iter()
            .filter_map(|v| scalar(Some(v)))
            .max_by_key(|s| s.len()),
        other => scalar(Some(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(json: &str) -> Html {
        Html::parse_document(&format!(
            r#"<html><head><script type="application/ld+json">{}</script></head><body></body></html>"#,
            json
        ))
    }

    #[test]
    fn test_step_objects() {
        let fields = extract(&doc(
            r#"{"@type":"Recipe","name":"Pancakes","recipeIngredient":["1 cup flour","2 eggs"],
               "recipeInstructions":[{"@type":"HowToStep","text":"Mix"},{"@type":"HowToStep","text":"Cook"}]}"#,
        ));
        assert_eq!(fields.name.as_deref(), Some("Pancakes"));
        assert_eq!(fields.ingredients, vec!["1 cup flour", "2 eggs"]);
        assert_eq!(fields.instructions, vec!["Mix", "Cook"]);
    }

    #[test]
    fn test_graph_and_type_array() {
        let fields = extract(&doc(
            r#"{"@context":"https://schema.org","@graph":[
                {"@type":"WebPage","name":"Page"},
                {"@type":["Recipe","NewsArticle"],"name":"Stew","totalTime":"PT1H30M",
                 "recipeYield":["4","4 servings"],"nutrition":{"calories":"320 kcal"},
                 "image":{"url":"https://img.example.com/stew.jpg"},
                 "recipeCategory":"Dinner","recipeCuisine":["Irish"]}
            ]}"#,
        ));
        assert_eq!(fields.name.as_deref(), Some("Stew"));
        assert_eq!(fields.total_time.as_deref(), Some("1 hr 30 min"));
        assert_eq!(fields.servings.as_deref(), Some("4 servings"));
        assert_eq!(fields.calories.as_deref(), Some("320 kcal"));
        assert_eq!(fields.image.as_deref(), Some("https://img.example.com/stew.jpg"));
        assert_eq!(fields.categories, vec!["Dinner", "Irish"]);
    }

    #[test]
    fn test_lowercase_type_and_sections() {
        let fields = extract(&doc(
            r#"[{"@type":"recipe","name":"Bread","recipeInstructions":[
                {"@type":"HowToSection","name":"Dough","itemListElement":[
                    {"@type":"HowToStep","text":"Knead"},"Rest"]}]}]"#,
        ));
        assert_eq!(fields.instructions, vec!["Knead", "Rest"]);
    }

    #[test]
    fn test_literal_newlines_are_tolerated() {
        let fields = extract(&doc(
            "{\"@type\":\"Recipe\",\"name\":\"Soup\",\"description\":\"Warm\nand hearty\"}",
        ));
        assert_eq!(fields.description.as_deref(), Some("Warm\nand hearty"));
    }

    #[test]
    fn test_no_recipe_node() {
        let fields = extract(&doc(r#"{"@type":"Organization","name":"Site"}"#));
        assert_eq!(fields, RecipeFields::default());
    }
}
