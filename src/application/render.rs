//! Markdown rendering.

use comrak::{markdown_to_html, options::Options};

/// Converts raw markdown into HTML.
///
/// Implementations must be total: malformed input renders as best-effort HTML
/// rather than failing.
pub trait MarkdownRenderer: Send + Sync {
    fn render(&self, source: &[u8]) -> String;
}

/// Comrak-based renderer with the GitHub-flavoured extensions enabled.
pub struct ComrakRenderer {
    options: Options<'static>,
}

impl ComrakRenderer {
    pub fn new() -> Self {
        Self {
            options: default_options(),
        }
    }
}

impl Default for ComrakRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownRenderer for ComrakRenderer {
    fn render(&self, source: &[u8]) -> String {
        let markdown = String::from_utf8_lossy(source);
        markdown_to_html(&markdown, &self.options)
    }
}

fn default_options() -> Options<'static> {
    let mut options = Options::default();

    let ext = &mut options.extension;
    ext.strikethrough = true;
    ext.table = true;
    ext.autolink = true;
    ext.tasklist = true;
    ext.superscript = true;
    ext.footnotes = true;
    ext.front_matter_delimiter = Some("---".to_string());

    let render = &mut options.render;
    render.github_pre_lang = true;
    // Content comes from the operator's own tree and may embed raw HTML.
    render.r#unsafe = true;

    options
}
