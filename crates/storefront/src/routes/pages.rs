//! Static content page route handler.
//!
//! Serves the markdown pages loaded at startup (shipping, about, FAQ).

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::NaiveDate;
use tracing::instrument;

use super::PageChrome;
use crate::error::{AppError, Result};
use crate::filters;
use crate::state::AppState;

/// Content page template.
#[derive(Template, WebTemplate)]
#[template(path = "pages/show.html")]
pub struct ContentPageTemplate {
    pub chrome: PageChrome,
    pub title: String,
    pub description: String,
    pub updated_at: Option<NaiveDate>,
    pub content_html: String,
}

/// Display a content page by slug.
///
/// # Errors
///
/// Returns 404 if the page doesn't exist.
#[instrument(skip(state, chrome))]
pub async fn show(
    State(state): State<AppState>,
    chrome: PageChrome,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse> {
    let page = state
        .content()
        .get_page(&slug)
        .ok_or_else(|| AppError::NotFound(format!("Page {slug}")))?;

    Ok(ContentPageTemplate {
        chrome,
        title: page.meta.title.clone(),
        description: page.meta.description.clone().unwrap_or_default(),
        updated_at: page.meta.updated_at,
        content_html: page.content_html.clone(),
    })
}
