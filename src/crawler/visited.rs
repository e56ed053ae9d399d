//! Visited-URL set shared by crawl workers.

use std::collections::HashSet;

use tokio::sync::Mutex;

use crate::scrapers::visit_key;

/// Set of visit keys. Check-and-insert is a single locked step, so two
/// workers discovering the same link cannot both queue it.
#[derive(Debug, Default)]
pub struct VisitedSet {
    keys: Mutex<HashSet<String>>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a canonical URL as visited. Returns `false` if it already was.
    pub async fn insert(&self, url: &str) -> bool {
        self.keys.lock().await.insert(visit_key(url))
    }

    pub async fn contains(&self, url: &str) -> bool {
        self.keys.lock().await.contains(&visit_key(url))
    }

    pub async fn len(&self) -> usize {
        self.keys.lock().await.len()
    }
}
