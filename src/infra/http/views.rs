//! Response shapes for the HTTP surface: JSON views and the HTML document page.

use askama::Template;
use axum::http::StatusCode;
use serde::Serialize;
use time::format_description::well_known::Rfc3339;

use crate::{
    application::error::HttpError,
    config::SiteSettings,
    domain::entities::{Category, Post},
};

#[derive(Debug, Clone, Serialize)]
pub struct PostView {
    pub path: String,
    pub title: String,
    pub category: String,
    pub size: u64,
    /// Human-readable size, e.g. `512B` or `1.2kB`.
    pub size_label: String,
    /// RFC 3339 timestamp.
    pub modified: String,
    pub is_dir: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
}

impl PostView {
    /// Metadata only; the rendered body is omitted.
    pub fn summary(post: &Post) -> Self {
        Self {
            path: post.path.clone(),
            title: post.title.clone(),
            category: post.category.clone(),
            size: post.size,
            size_label: format_size(post.size),
            modified: post.modified.format(&Rfc3339).unwrap_or_default(),
            is_dir: post.is_dir,
            html: None,
        }
    }

    pub fn full(post: Post) -> Self {
        let mut view = Self::summary(&post);
        view.html = Some(post.html);
        view
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryView {
    pub name: String,
    pub path: String,
}

impl From<&Category> for CategoryView {
    fn from(category: &Category) -> Self {
        Self {
            name: category.name.clone(),
            path: category.path.clone(),
        }
    }
}

/// Bytes below one kibibyte are shown exactly, larger sizes in kB with one decimal.
pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes}B")
    } else {
        format!("{:.1}kB", bytes as f64 / 1024.0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SiteView {
    pub author: String,
    pub brand: String,
    pub quote: String,
    pub github: String,
    pub since: String,
}

impl From<&SiteSettings> for SiteView {
    fn from(site: &SiteSettings) -> Self {
        Self {
            author: site.author.clone(),
            brand: site.brand.clone(),
            quote: site.quote.clone(),
            github: site.github.clone(),
            since: site.since.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HomeView {
    /// The site brand.
    pub title: String,
    pub site: SiteView,
    pub categories: Vec<CategoryView>,
    pub hot: Vec<PostView>,
}

/// A rendered document or directory landing page wrapped in the site shell.
#[derive(Template)]
#[template(path = "document.html")]
pub struct DocumentPage<'a> {
    /// Empty for the root landing page, which is titled with the brand instead.
    pub title: &'a str,
    /// Rendered markdown, inserted unescaped.
    pub body: &'a str,
    pub site: &'a SiteSettings,
}

impl DocumentPage<'_> {
    pub fn render_html(&self) -> Result<String, HttpError> {
        self.render().map_err(|err| {
            HttpError::from_error(
                "infra::http::views::DocumentPage::render_html",
                StatusCode::INTERNAL_SERVER_ERROR,
                "Template rendering failed",
                &err,
            )
        })
    }
}
