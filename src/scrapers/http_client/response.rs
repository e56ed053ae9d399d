//! Fetched page wrapper.

use scraper::Html;
use url::Url;

/// A successfully fetched HTML page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// URL as requested.
    pub url: String,
    /// URL after redirects; relative links resolve against this.
    pub final_url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl FetchedPage {
    /// A 200 response with the given body, as served from `url`.
    pub fn new(url: impl Into<String>, body: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            final_url: url.clone(),
            url,
            status: 200,
            content_type: Some("text/html".to_string()),
            body: body.into(),
        }
    }

    /// Parse the body into a queryable document.
    pub fn document(&self) -> Html {
        Html::parse_document(&self.body)
    }

    /// Base URL for link resolution.
    pub fn base_url(&self) -> Option<Url> {
        Url::parse(&self.final_url)
            .or_else(|_| Url::parse(&self.url))
            .ok()
    }
}
