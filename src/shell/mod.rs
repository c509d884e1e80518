//! The application shell: the stable frame every page renders inside.
//!
//! The shell shows the logo, the title and the build stamp, then hands the
//! rest of the page to two injected collaborators: the routed content and the
//! update notifier. It has no state and nothing in it can fail.

pub mod content;
pub mod reload_prompt;
pub mod stamp;
pub mod view;

pub use content::{ContentProvider, EmptyContent, StaticContent, UpdateNotifier};
pub use reload_prompt::{ReloadPrompt, UpdateState};
pub use stamp::{BUILD_STAMP_PLACEHOLDER, BuildStamp};
pub use view::{Element, Node};

use std::sync::Arc;
use strum::{Display, EnumIter};

pub const LOGO_SRC: &str = "/favicon.svg";
pub const LOGO_ALT: &str = "Open Car Diagnostics Logo";
pub const LOGO_SIZE: u32 = 100;
pub const TITLE: &str = "Open Car Diagnostics!";
pub const BUILT_AT_PREFIX: &str = "Built at: ";
pub const CONTENT_CLASS: &str = "App-content";

/// The shell's children, in render order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum ShellSection {
    Logo,
    Title,
    BuildStamp,
    RoutedContent,
    UpdateNotifier,
}

#[derive(Clone)]
pub struct AppShell {
    build_stamp: BuildStamp,
    content: Arc<dyn ContentProvider>,
    notifier: Arc<dyn UpdateNotifier>,
}

impl AppShell {
    pub fn new(
        build_stamp: BuildStamp,
        content: Arc<dyn ContentProvider>,
        notifier: Arc<dyn UpdateNotifier>,
    ) -> Self {
        Self {
            build_stamp,
            content,
            notifier,
        }
    }

    pub fn build_stamp(&self) -> &BuildStamp {
        &self.build_stamp
    }

    /// Same shell with different routed content.
    pub fn with_content(&self, content: Arc<dyn ContentProvider>) -> Self {
        Self {
            build_stamp: self.build_stamp.clone(),
            content,
            notifier: self.notifier.clone(),
        }
    }

    pub fn sections(&self) -> Vec<(ShellSection, Node)> {
        let logo = Node::element("img")
            .attr("src", LOGO_SRC)
            .attr("alt", LOGO_ALT)
            .attr("width", LOGO_SIZE.to_string())
            .attr("height", LOGO_SIZE.to_string());
        let title = Node::element("h1").class("Home-title").text(TITLE);
        let built = Node::element("div")
            .class("Home-built")
            .text(BUILT_AT_PREFIX)
            .text(self.build_stamp.as_str());
        let content = Node::element("section")
            .class(CONTENT_CLASS)
            .child(self.content.view());

        vec![
            (ShellSection::Logo, logo.into()),
            (ShellSection::Title, title.into()),
            (ShellSection::BuildStamp, built.into()),
            (ShellSection::RoutedContent, content.into()),
            (ShellSection::UpdateNotifier, self.notifier.view()),
        ]
    }

    pub fn render(&self) -> Node {
        self.sections()
            .into_iter()
            .fold(Node::element("main").class("App"), |main, (_, node)| {
                main.child(node)
            })
            .into()
    }
}

impl std::fmt::Debug for AppShell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppShell")
            .field("build_stamp", &self.build_stamp)
            .finish_non_exhaustive()
    }
}
