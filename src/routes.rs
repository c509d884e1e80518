//! Path to view table backing the shell's routed-content slot.

use crate::shell::{ContentProvider, Node};
use std::collections::BTreeMap;
use std::sync::Arc;

/// How a request path was matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteMatch {
    Found,
    NotFound,
}

impl RouteMatch {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteMatch::Found => "found",
            RouteMatch::NotFound => "not_found",
        }
    }
}

/// Result of resolving a path; plugs into the shell as its routed content.
#[derive(Debug, Clone)]
pub struct ResolvedRoute {
    pub path: String,
    pub matched: RouteMatch,
    view: Node,
}

impl ContentProvider for ResolvedRoute {
    fn view(&self) -> Node {
        self.view.clone()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: BTreeMap<String, Node>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes the app ships with. The index renders nothing of its own so the
    /// shell's branding stands alone.
    pub fn standard() -> Self {
        Self::new().route("/", Node::empty()).route(
            "/connect",
            Node::element("div")
                .class("Connect")
                .child(Node::element("h2").text("Connect to your device"))
                .child(Node::element("p").text(
                    "Join the OpenCarDiagnostics Wi-Fi network, then open http://ocd-device.local",
                )),
        )
    }

    pub fn route(mut self, path: &str, view: impl Into<Node>) -> Self {
        self.routes.insert(normalize(path), view.into());
        self
    }

    pub fn resolve(&self, path: &str) -> ResolvedRoute {
        let path = normalize(path);
        match self.routes.get(&path) {
            Some(view) => ResolvedRoute {
                path,
                matched: RouteMatch::Found,
                view: view.clone(),
            },
            None => ResolvedRoute {
                view: not_found_view(&path),
                path,
                matched: RouteMatch::NotFound,
            },
        }
    }

    pub fn resolve_shared(&self, path: &str) -> (RouteMatch, Arc<dyn ContentProvider>) {
        let resolved = self.resolve(path);
        (resolved.matched, Arc::new(resolved))
    }
}

fn not_found_view(path: &str) -> Node {
    Node::element("div")
        .class("NotFound")
        .child(Node::element("h2").text("Page not found"))
        .child(Node::element("p").text(format!("Nothing is routed at {path}")))
        .into()
}

/// Drops the query string and any trailing slash; the root stays `/`.
fn normalize(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_paths() {
        assert_eq!(normalize(""), "/");
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize("/connect/"), "/connect");
        assert_eq!(normalize("connect?x=1"), "/connect");
    }

    #[test]
    fn index_resolves_to_empty_view() {
        let resolved = RouteTable::standard().resolve("/");
        assert_eq!(resolved.matched, RouteMatch::Found);
        assert!(resolved.view().is_empty());
    }

    #[test]
    fn unknown_path_gets_not_found_view() {
        let resolved = RouteTable::standard().resolve("/nope");
        assert_eq!(resolved.matched, RouteMatch::NotFound);
        assert!(resolved.view().text_content().contains("/nope"));
    }
}
