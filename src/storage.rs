//! JSON backups of created recipes on disk.

use std::path::{Path, PathBuf};

use crate::models::Recipe;

/// Make a title safe to use in a filename.
///
/// Path-hostile characters and whitespace become `_`; the result is capped
/// at 100 bytes on a char boundary.
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0' => '_',
            c if c.is_control() || c.is_whitespace() => '_',
            c => c,
        })
        .collect();

    let trimmed = sanitized.trim_matches('_');
    if trimmed.is_empty() {
        return "recipe".to_string();
    }
    let mut end = trimmed.len().min(100);
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    trimmed[..end].to_string()
}

/// Writes one pretty-printed JSON file per recipe.
#[derive(Debug, Clone)]
pub struct BackupWriter {
    dir: PathBuf,
}

impl BackupWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<dir>/<id>_<safe title>.json`
    pub fn path_for(&self, recipe: &Recipe) -> PathBuf {
        self.dir
            .join(format!("{}_{}.json", recipe.id, sanitize_filename(&recipe.title)))
    }

    /// Write the recipe, creating the directory on first use.
    pub async fn write(&self, recipe: &Recipe) -> anyhow::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(recipe);
        let json = serde_json::to_vec_pretty(recipe)?;
        tokio::fs::write(&path, json).await?;
        Ok(path)
    }
}
