//! Fuzzy title matching for dedup.

/// Tokens that carry no identity for a recipe title.
const NOISE_TOKENS: &[&str] = &["the", "best", "easy", "homemade", "recipe", "recipes"];

/// Lowercase, replace punctuation with spaces, drop marketing tokens and
/// collapse whitespace.
pub fn normalize_title(title: &str) -> String {
    let cleaned: String = title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    cleaned
        .split_whitespace()
        .filter(|token| !NOISE_TOKENS.contains(token))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Edit distance over chars.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Similarity of two titles in `[0, 1]`, computed on normalized forms as
/// `1 - distance / max_len`. Two titles that normalize to nothing are not
/// considered similar.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let a = normalize_title(a);
    let b = normalize_title(b);
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 0.0;
    }
    1.0 - levenshtein(&a, &b) as f64 / max_len as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_marketing_tokens() {
        assert_eq!(normalize_title("The Best Chocolate Cake Recipe"), "chocolate cake");
        assert_eq!(normalize_title("Easy Homemade  Pad-Thai!"), "pad thai");
        assert_eq!(normalize_title("Recipes"), "");
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("same", "same"), 0);
    }

    #[test]
    fn test_similarity() {
        assert_eq!(title_similarity("The Best Chocolate Cake Recipe", "chocolate cake"), 1.0);
        assert!(title_similarity("Chocolate Cake", "Chocolate Cakes") >= 0.8);
        assert!(title_similarity("Chocolate Cake", "Lemon Bars") < 0.5);
        assert_eq!(title_similarity("Recipe", "The Best"), 0.0);
    }
}
