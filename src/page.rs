//! HTML document around the rendered shell.

use crate::device::ws::WS_PATH;
use crate::error::Result;
use crate::shell::{AppShell, LOGO_SRC};
use tera::{Context, Tera};

pub const DOCUMENT_TEMPLATE: &str = "index.html";
pub const DOCUMENT_TITLE: &str = "Open Car Diagnostics";
pub const UPDATE_ENDPOINT: &str = "/api/update";

const INDEX_TEMPLATE: &str = include_str!("../templates/index.html.tera");

/// Wraps the shell's markup in the page template.
///
/// The shell is rendered to escaped HTML before it reaches the template, so
/// the template inserts it with `safe` and never sees raw stamp or content
/// text.
#[derive(Debug)]
pub struct PageRenderer {
    tera: Tera,
}

impl PageRenderer {
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_template(DOCUMENT_TEMPLATE, INDEX_TEMPLATE)?;
        Ok(Self { tera })
    }

    pub fn render(&self, shell: &AppShell) -> Result<String> {
        let mut context = Context::new();
        context.insert("title", DOCUMENT_TITLE);
        context.insert("favicon", LOGO_SRC);
        context.insert("ws_path", WS_PATH);
        context.insert("update_endpoint", UPDATE_ENDPOINT);
        context.insert("shell", &shell.render().to_html());
        Ok(self.tera.render(DOCUMENT_TEMPLATE, &context)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::{BuildStamp, EmptyContent, ReloadPrompt};
    use std::sync::Arc;

    fn shell(stamp: &str) -> AppShell {
        AppShell::new(
            BuildStamp::new(stamp),
            Arc::new(EmptyContent),
            Arc::new(ReloadPrompt::default()),
        )
    }

    #[test]
    fn document_embeds_shell_once() {
        let renderer = PageRenderer::new().unwrap();
        let html = renderer.render(&shell("2024-01-01T00:00:00Z")).unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>Open Car Diagnostics</title>"));
        assert_eq!(html.matches("2024-01-01T00:00:00Z").count(), 1);
        assert!(html.contains("<h1 class=\"Home-title\">Open Car Diagnostics!</h1>"));
    }

    #[test]
    fn stamp_markup_is_escaped() {
        let renderer = PageRenderer::new().unwrap();
        let html = renderer.render(&shell("<b>now</b>")).unwrap();
        assert!(html.contains("&lt;b&gt;now&lt;/b&gt;"));
        assert!(!html.contains("<b>now</b>"));
    }

    #[test]
    fn script_urls_are_not_entity_encoded() {
        let renderer = PageRenderer::new().unwrap();
        let html = renderer.render(&shell("s")).unwrap();
        assert!(html.contains(r#"fetch("/api/update", {"#));
        assert!(html.contains(r#"location.host + "/ws");"#));
        assert!(!html.contains("&#x2F;api"));
    }
}
