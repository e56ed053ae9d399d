//! Narrative-text tier for prose-style recipe posts without markup.
//!
//! Scans paragraph and list-item text inside the post body and keeps lines
//! that look like ingredients (a measurement unit) or instructions (a
//! cooking verb, within a length window).

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use super::{normalize_whitespace, RecipeFields};

/// Containers holding the post body on most blog themes.
pub const DEFAULT_SCOPE: &str = ".entry-content, .post-content, .content";

const MAX_INGREDIENT_LEN: usize = 200;
const MIN_INSTRUCTION_LEN: usize = 20;
const MAX_INSTRUCTION_LEN: usize = 500;

static UNIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(cup|tablespoon|teaspoon|pound|ounce|gram)s?\b").expect("valid unit regex")
});

static ACTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(mix|combine|heat|bake|cook|add|stir|pour)").expect("valid verb regex")
});

static LEADING_QUANTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\d½⅓⅔¼¾⅛]").expect("valid quantity regex"));

/// Tags whose text is never visible.
const HIDDEN: [&str; 4] = ["script", "style", "noscript", "template"];

/// Extract ingredient and instruction candidates from body text.
pub fn extract(document: &Html, scope: Option<&str>) -> RecipeFields {
    let mut fields = RecipeFields::default();

    for line in candidate_lines(document, scope) {
        if is_ingredient_line(&line) {
            fields.ingredients.push(line);
        } else if is_instruction_line(&line) {
            fields.instructions.push(line);
        }
    }

    fields
}

pub fn is_ingredient_line(line: &str) -> bool {
    let len = line.chars().count();
    len > 0
        && len < MAX_INGREDIENT_LEN
        && UNIT.is_match(line)
        && (LEADING_QUANTITY.is_match(line) || !ACTION.is_match(line))
}

pub fn is_instruction_line(line: &str) -> bool {
    let len = line.chars().count();
    (MIN_INSTRUCTION_LEN..=MAX_INSTRUCTION_LEN).contains(&len)
        && ACTION.is_match(line)
        && !is_ingredient_line(line)
}

/// Paragraph and list-item lines inside the scope, or the whole body when
/// the scope matches nothing.
fn candidate_lines(document: &Html, scope: Option<&str>) -> Vec<String> {
    let Ok(blocks) = Selector::parse("p, li") else {
        return Vec::new();
    };

    let roots: Vec<ElementRef<'_>> = Selector::parse(scope.unwrap_or(DEFAULT_SCOPE))
        .ok()
        .map(|s| document.select(&s).collect())
        .unwrap_or_default();
    let roots = if roots.is_empty() {
        vec![document.root_element()]
    } else {
        roots
    };

    let mut lines = Vec::new();
    for root in roots {
        for block in root.select(&blocks) {
            let text = visible_text(block);
            lines.extend(
                text.split('\n')
                    .map(normalize_whitespace)
                    .filter(|l| !l.is_empty()),
            );
        }
    }
    lines
}

/// Text content of an element, skipping script and style children.
/// `<br>` becomes a line break.
pub fn visible_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in element.descendants() {
        if let Some(el) = node.value().as_element() {
            if el.name() == "br" {
                out.push('\n');
            }
            continue;
        }
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| HIDDEN.contains(&e.name()))
        });
        if !hidden {
            out.push_str(text);
        }
    }
    out
}
