//! Page fetching, classification and recipe extraction.

pub mod classify;
pub mod config;
pub mod extract;
mod http_client;
mod page;
pub mod rate_limiter;

pub use classify::{canonicalize, canonicalize_str, visit_key, UrlClassifier};
pub use config::{ProfileError, ProfileSet, SelectorRules, SiteProfile};
pub use extract::RecipeFields;
pub use http_client::{
    resolve_user_agent, FetchConfig, FetchError, FetchedPage, HttpFetcher, PageFetcher,
    RetryPolicy, USER_AGENT,
};
pub use page::PageAnalysis;
pub use rate_limiter::{AdmissionConfig, AdmissionPermit, DomainAdmission};
