//! Collaborators the shell composes but does not own.

use super::view::Node;

/// Supplies the view matching the current navigation state.
pub trait ContentProvider: Send + Sync {
    fn view(&self) -> Node;
}

/// Detects a newer deployment and prompts the user to reload.
///
/// Self-contained: the shell passes nothing in and reads nothing back.
pub trait UpdateNotifier: Send + Sync {
    fn view(&self) -> Node;
}

/// Routed content with nothing to show.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyContent;

impl ContentProvider for EmptyContent {
    fn view(&self) -> Node {
        Node::empty()
    }
}

/// Routed content fixed to a single prebuilt view.
#[derive(Debug, Clone)]
pub struct StaticContent(pub Node);

impl ContentProvider for StaticContent {
    fn view(&self) -> Node {
        self.0.clone()
    }
}
