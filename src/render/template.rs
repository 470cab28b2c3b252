use askama::Template;
use minijinja::{context, Environment, Value};

use super::RenderError;

/// Registered name of a runtime layout; the `.html` suffix enables escaping.
const CUSTOM_LAYOUT: &str = "layout.html";

/// Default page layout.
///
/// Every field is HTML-escaped except `body`, which is the renderer's output.
#[derive(Template)]
#[template(
    ext = "html",
    source = r#"<!DOCTYPE html>
<html lang="{{ language }}">
<head>
    <meta charset="UTF-8">
    <title>{{ title }}</title>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <link rel="stylesheet" href="{{ base_css }}">
    <link rel="stylesheet" href="{{ screen_css }}" media="screen">
    <link rel="stylesheet" href="{{ print_css }}" media="print">
</head>
<body id="{{ filename }}">
    <div class="container markdown-body">
        {{ body|safe }}
    </div>
    <div class="author">{{ author }}</div>
</body>
</html>"#
)]
pub struct PageTemplate<'a> {
    pub title: &'a str,
    pub language: &'a str,
    pub author: &'a str,
    pub base_css: &'a str,
    pub screen_css: &'a str,
    pub print_css: &'a str,
    pub filename: &'a str,
    pub body: &'a str,
}

impl PageTemplate<'_> {
    pub fn render_html(&self) -> askama::Result<String> {
        self.render()
    }
}

// == Layout ==
/// Page layout: the embedded default or a template supplied at startup.
#[derive(Debug, Default)]
pub enum Layout {
    #[default]
    Embedded,
    Custom(Environment<'static>),
}

impl Layout {
    /// Compiles a runtime layout.
    ///
    /// The template sees the same variables as the embedded layout (`title`,
    /// `language`, `author`, `base_css`, `screen_css`, `print_css`,
    /// `filename`, `body`). Everything but `body` is HTML-escaped.
    pub fn custom(source: impl Into<String>) -> Result<Self, RenderError> {
        let mut env = Environment::new();
        env.add_template_owned(CUSTOM_LAYOUT, source.into())?;
        Ok(Layout::Custom(env))
    }

    pub fn render(&self, page: &PageTemplate<'_>) -> Result<String, RenderError> {
        match self {
            Layout::Embedded => Ok(page.render_html()?),
            Layout::Custom(env) => {
                let template = env.get_template(CUSTOM_LAYOUT)?;
                Ok(template.render(context! {
                    title => page.title,
                    language => page.language,
                    author => page.author,
                    base_css => page.base_css,
                    screen_css => page.screen_css,
                    print_css => page.print_css,
                    filename => page.filename,
                    body => Value::from_safe_string(page.body.to_string()),
                })?)
            }
        }
    }
}
