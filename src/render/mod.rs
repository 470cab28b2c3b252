//! Page Rendering
//!
//! Markdown to HTML through comrak, then composition into the site layout.

mod template;

use comrak::nodes::{AstNode, NodeValue};
use comrak::options::Options;
use comrak::{format_html, parse_document, Arena};
use thiserror::Error;

use crate::cache::CacheKey;

pub use template::{Layout, PageTemplate};

/// Filename token used when a key has no final segment.
pub const DEFAULT_FILENAME: &str = "default";

// == Render Error ==
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("markdown conversion failed: {0}")]
    Markdown(String),

    #[error("template execution failed: {0}")]
    Template(#[from] askama::Error),

    #[error("custom template failed: {0}")]
    Layout(#[from] minijinja::Error),
}

// == Site Settings ==
/// Site-wide values injected into every page.
#[derive(Debug, Clone, Default)]
pub struct SiteSettings {
    pub title: String,
    pub language: String,
    pub author: String,
    pub base_css_url: String,
    pub screen_css_url: String,
    pub print_css_url: String,
}

/// HTML body plus the text of its first top-level `#` heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    pub title: Option<String>,
    pub html: String,
}

// == Markdown Renderer ==
/// GitHub-flavored Markdown renderer.
pub struct MarkdownRenderer {
    options: Options<'static>,
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        let mut options = Options::default();
        let ext = &mut options.extension;
        ext.strikethrough = true;
        ext.table = true;
        ext.autolink = true;
        ext.tasklist = true;

        Self { options }
    }

    /// Parses `source`, extracts the first level-one heading and renders HTML.
    pub fn render(&self, source: &str) -> Result<RenderedDocument, RenderError> {
        let arena = Arena::new();
        let root = parse_document(&arena, source, &self.options);

        let title = first_level_one_heading(root);

        let mut html = String::new();
        format_html(root, &self.options, &mut html)
            .map_err(|err| RenderError::Markdown(err.to_string()))?;

        Ok(RenderedDocument { title, html })
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Only direct children of the document are considered, so a `#` nested in
/// a block quote or list does not become the page title.
fn first_level_one_heading<'a>(root: &'a AstNode<'a>) -> Option<String> {
    root.children()
        .find(|node| matches!(&node.data.borrow().value, NodeValue::Heading(h) if h.level == 1))
        .map(inline_text)
}

fn inline_text<'a>(node: &'a AstNode<'a>) -> String {
    fn walk<'a>(node: &'a AstNode<'a>, buffer: &mut String) {
        match &node.data.borrow().value {
            NodeValue::Text(text) => buffer.push_str(text),
            NodeValue::Code(code) => buffer.push_str(&code.literal),
            NodeValue::LineBreak | NodeValue::SoftBreak => buffer.push(' '),
            _ => {}
        }
        for child in node.children() {
            walk(child, buffer);
        }
    }

    let mut text = String::new();
    for child in node.children() {
        walk(child, &mut text);
    }
    text
}

// == Page Renderer ==
/// Markdown renderer bound to site settings; produces complete pages.
pub struct PageRenderer {
    markdown: MarkdownRenderer,
    site: SiteSettings,
    layout: Layout,
}

impl PageRenderer {
    pub fn new(site: SiteSettings) -> Self {
        Self::with_layout(site, Layout::Embedded)
    }

    pub fn with_layout(site: SiteSettings, layout: Layout) -> Self {
        Self {
            markdown: MarkdownRenderer::new(),
            site,
            layout,
        }
    }

    /// Renders a Markdown source into the final page for `key`.
    pub fn render_page(&self, key: &CacheKey, source: &[u8]) -> Result<String, RenderError> {
        let source = String::from_utf8_lossy(source);
        let document = self.markdown.render(&source)?;

        let title = match document.title.as_deref() {
            Some(heading) if !heading.is_empty() => format!("{} - {}", heading, self.site.title),
            _ => self.site.title.clone(),
        };
        let filename = match key.file_stem() {
            "" => DEFAULT_FILENAME,
            stem => stem,
        };

        let page = PageTemplate {
            title: &title,
            language: &self.site.language,
            author: &self.site.author,
            base_css: &self.site.base_css_url,
            screen_css: &self.site.screen_css_url,
            print_css: &self.site.print_css_url,
            filename,
            body: &document.html,
        };
        self.layout.render(&page)
    }
}
