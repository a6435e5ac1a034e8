//! Static pages and markdown rendering.
//!
//! Pages (shipping, returns, about, ...) are markdown files with YAML
//! frontmatter under `content/pages/`, loaded once at startup. Blog posts come
//! from the CMS instead (see [`crate::services::cms`]) but share the same
//! renderer.

use chrono::NaiveDate;
use comrak::{Options, markdown_to_html};
use gray_matter::{Matter, ParsedEntity, engine::YAML};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Reading speed used for reading-time estimates.
const WORDS_PER_MINUTE: usize = 200;

/// Frontmatter for static pages.
#[derive(Debug, Clone, Deserialize)]
pub struct PageMeta {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub updated_at: Option<NaiveDate>,
}

/// A rendered page.
#[derive(Debug, Clone)]
pub struct Page {
    pub slug: String,
    pub meta: PageMeta,
    pub content_html: String,
}

/// In-memory page store.
#[derive(Debug, Clone, Default)]
pub struct ContentStore {
    pages: Arc<HashMap<String, Page>>,
}

impl ContentStore {
    /// Load every page under `content_dir/pages`.
    ///
    /// A missing directory yields an empty store. Files that fail to parse are
    /// logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be read.
    pub fn load(content_dir: &Path) -> Result<Self, ContentError> {
        let dir = content_dir.join("pages");
        let mut pages = HashMap::new();

        if !dir.exists() {
            tracing::warn!("Pages directory does not exist: {:?}", dir);
            return Ok(Self::default());
        }

        let entries = std::fs::read_dir(&dir).map_err(|e| ContentError::Io(e.to_string()))?;

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "md") {
                match Self::load_page(&path) {
                    Ok(page) => {
                        tracing::info!("Loaded page: {}", page.slug);
                        pages.insert(page.slug.clone(), page);
                    }
                    Err(e) => {
                        tracing::error!("Failed to load page {:?}: {}", path, e);
                    }
                }
            }
        }

        Ok(Self {
            pages: Arc::new(pages),
        })
    }

    fn load_page(path: &Path) -> Result<Page, ContentError> {
        let content = std::fs::read_to_string(path).map_err(|e| ContentError::Io(e.to_string()))?;

        let slug = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| ContentError::Parse("Invalid filename".to_string()))?
            .to_string();

        let matter = Matter::<YAML>::new();
        let parsed: ParsedEntity<PageMeta> = matter
            .parse(&content)
            .map_err(|e| ContentError::Parse(format!("Failed to parse frontmatter: {e}")))?;
        let meta = parsed
            .data
            .ok_or_else(|| ContentError::Parse("Missing frontmatter".to_string()))?;

        Ok(Page {
            slug,
            meta,
            content_html: render_markdown(&parsed.content),
        })
    }

    #[must_use]
    pub fn get_page(&self, slug: &str) -> Option<&Page> {
        self.pages.get(slug)
    }

    /// Pages sorted by title, for footer links.
    #[must_use]
    pub fn pages(&self) -> Vec<&Page> {
        let mut pages: Vec<&Page> = self.pages.values().collect();
        pages.sort_by(|a, b| a.meta.title.cmp(&b.meta.title));
        pages
    }
}

/// Render markdown to HTML with GitHub Flavored Markdown extensions.
#[must_use]
pub fn render_markdown(content: &str) -> String {
    let mut options = Options::default();

    options.extension.strikethrough = true;
    options.extension.table = true;
    options.extension.autolink = true;
    options.extension.tasklist = true;
    options.extension.superscript = true;
    options.extension.header_ids = Some(String::new());
    options.extension.footnotes = true;

    // Content is written by staff in the CMS or the repo
    options.render.r#unsafe = true;

    markdown_to_html(content, &options)
}

/// Minutes to read `text` at 200 words per minute, never less than 1.
#[must_use]
pub fn reading_time_minutes(text: &str) -> u32 {
    let words = text.split_whitespace().count();
    u32::try_from(words.div_ceil(WORDS_PER_MINUTE))
        .unwrap_or(u32::MAX)
        .max(1)
}

/// Content loading errors
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_reading_time() {
        assert_eq!(reading_time_minutes(""), 1);
        assert_eq!(reading_time_minutes(&"word ".repeat(200)), 1);
        assert_eq!(reading_time_minutes(&"word ".repeat(201)), 2);
        assert_eq!(reading_time_minutes(&"word ".repeat(1000)), 5);
    }

    #[test]
    fn test_render_markdown_gfm() {
        let html =
            render_markdown("# Proofing\n\n~~fast~~ slow\n\n| a | b |\n|---|---|\n| 1 | 2 |\n");
        assert!(html.contains("<h1"));
        assert!(html.contains("<del>fast</del>"));
        assert!(html.contains("<table>"));
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let store = ContentStore::load(Path::new("/nonexistent/larder-content")).unwrap();
        assert!(store.pages().is_empty());
        assert!(store.get_page("shipping").is_none());
    }

    #[test]
    fn test_load_pages_from_directory() {
        let root = std::env::temp_dir().join(format!("larder-content-{}", uuid::Uuid::new_v4()));
        let pages = root.join("pages");
        std::fs::create_dir_all(&pages).unwrap();
        std::fs::write(
            pages.join("shipping.md"),
            "---\ntitle: Shipping\n---\nWe ship **weekly**.\n",
        )
        .unwrap();
        std::fs::write(pages.join("broken.md"), "no frontmatter here").unwrap();
        std::fs::write(pages.join("notes.txt"), "ignored").unwrap();

        let store = ContentStore::load(&root).unwrap();
        let page = store.get_page("shipping").unwrap();
        assert_eq!(page.meta.title, "Shipping");
        assert!(page.content_html.contains("<strong>weekly</strong>"));
        assert!(store.get_page("broken").is_none());
        assert_eq!(store.pages().len(), 1);

        std::fs::remove_dir_all(&root).unwrap();
    }
}
