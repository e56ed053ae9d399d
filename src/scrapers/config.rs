//! Site profile configuration.
//!
//! Profiles describe per-site extraction as data: which hosts they apply
//! to, which URL paths are recipe pages, and which CSS selectors hold each
//! recipe field. The built-in table lives in `profiles.toml`; more can be
//! added from the user config file.

use regex::Regex;
use scraper::Selector;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const BUILTIN_PROFILES: &str = include_str!("profiles.toml");

/// Errors from loading or validating site profiles.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("failed to parse profile table: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("profile has an empty domain")]
    EmptyDomain,

    #[error("profile {domain}: invalid selector {selector:?}")]
    InvalidSelector { domain: String, selector: String },

    #[error("profile {domain}: invalid detail pattern {pattern:?}: {source}")]
    InvalidPattern {
        domain: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// CSS selectors for each recipe field. Comma-separated selector groups
/// are allowed; unset fields fall back to the generic rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectorRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingredients: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub servings: Option<String>,
}

impl SelectorRules {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    fn all(&self) -> impl Iterator<Item = &String> {
        [
            &self.title,
            &self.description,
            &self.ingredients,
            &self.instructions,
            &self.time,
            &self.servings,
        ]
        .into_iter()
        .flatten()
    }
}

/// Extraction and crawl rules for one site.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteProfile {
    /// Matched by substring against the hostname (without `www.`).
    pub domain: String,
    /// Substrings a discovered link must contain to be followed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub url_patterns: Vec<String>,
    /// Regexes on the URL path that mark a recipe detail page.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub detail_patterns: Vec<String>,
    /// Anchors to consider when discovering links.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub link_selectors: Vec<String>,
    #[serde(default, skip_serializing_if = "SelectorRules::is_default")]
    pub selectors: SelectorRules,
    /// Container scanned by the narrative-text heuristics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative_scope: Option<String>,
    #[serde(skip)]
    detail_regexes: Vec<Regex>,
}

impl SiteProfile {
    /// Validate the domain and selectors, and compile detail patterns.
    pub fn compile(&mut self) -> Result<(), ProfileError> {
        let domain = self.domain.trim().to_ascii_lowercase();
        let domain = domain.strip_prefix("www.").unwrap_or(&domain);
        if domain.is_empty() {
            return Err(ProfileError::EmptyDomain);
        }
        self.domain = domain.to_string();

        let selectors = self
            .selectors
            .all()
            .chain(self.link_selectors.iter())
            .chain(self.narrative_scope.iter());
        for selector in selectors {
            if Selector::parse(selector).is_err() {
                return Err(ProfileError::InvalidSelector {
                    domain: self.domain.clone(),
                    selector: selector.clone(),
                });
            }
        }

        self.detail_regexes = self
            .detail_patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| ProfileError::InvalidPattern {
                    domain: self.domain.clone(),
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<Result<_, _>>()?;
        Ok(())
    }

    /// Whether this profile applies to `host`.
    pub fn matches_host(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        let host = host.strip_prefix("www.").unwrap_or(&host);
        host.contains(&self.domain)
    }

    /// Whether `path` matches one of the profile's detail-page rules.
    pub fn is_detail_path(&self, path: &str) -> bool {
        self.detail_regexes.iter().any(|re| re.is_match(path))
    }

    /// Whether a discovered link should be followed for this site.
    pub fn is_recipe_link(&self, link: &str) -> bool {
        self.url_patterns.iter().any(|p| link.contains(p.as_str()))
    }
}

#[derive(Debug, Deserialize)]
struct ProfileTable {
    #[serde(default)]
    profiles: Vec<SiteProfile>,
}

/// The set of known site profiles, consulted in order.
#[derive(Debug, Clone, Default)]
pub struct ProfileSet {
    profiles: Vec<SiteProfile>,
}

impl ProfileSet {
    /// Profiles shipped with the crate.
    pub fn builtin() -> Result<Self, ProfileError> {
        Self::from_toml(BUILTIN_PROFILES)
    }

    /// Parse a `[[profiles]]` table.
    pub fn from_toml(source: &str) -> Result<Self, ProfileError> {
        let table: ProfileTable = toml::from_str(source)?;
        Self::default().with_profiles(table.profiles)
    }

    /// Append more profiles. Earlier profiles win when several match.
    pub fn with_profiles(mut self, profiles: Vec<SiteProfile>) -> Result<Self, ProfileError> {
        for mut profile in profiles {
            profile.compile()?;
            self.profiles.push(profile);
        }
        Ok(self)
    }

    /// First profile matching `host`.
    pub fn for_host(&self, host: &str) -> Option<&SiteProfile> {
        self.profiles.iter().find(|p| p.matches_host(host))
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
