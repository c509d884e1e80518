use super::content::UpdateNotifier;
use super::view::Node;
use clap::ValueEnum;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

pub const CONTAINER_CLASS: &str = "ReloadPrompt-container";
pub const OFFLINE_READY_MESSAGE: &str = "App ready to work offline";
pub const NEED_REFRESH_MESSAGE: &str = "New content available, click on reload button to update.";

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum UpdateState {
    #[default]
    Idle,
    OfflineReady,
    NeedRefresh,
}

/// Reload prompt shown after the shell's routed content.
///
/// The container is always rendered so there is a stable mount point; the
/// toast inside it only appears once the app is cached for offline use or a
/// newer deployment is waiting.
#[derive(Debug, Default)]
pub struct ReloadPrompt {
    state: RwLock<UpdateState>,
}

impl ReloadPrompt {
    pub fn new(state: UpdateState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }

    pub fn state(&self) -> UpdateState {
        *self.state.read()
    }

    pub fn offline_ready(&self) {
        self.transition(UpdateState::OfflineReady);
    }

    pub fn need_refresh(&self) {
        self.transition(UpdateState::NeedRefresh);
    }

    /// Close button.
    pub fn dismiss(&self) {
        self.transition(UpdateState::Idle);
    }

    pub fn set(&self, state: UpdateState) {
        match state {
            UpdateState::Idle => self.dismiss(),
            UpdateState::OfflineReady => self.offline_ready(),
            UpdateState::NeedRefresh => self.need_refresh(),
        }
    }

    fn transition(&self, next: UpdateState) {
        let mut state = self.state.write();
        if *state != next {
            tracing::debug!(from = %*state, to = %next, "reload prompt state changed");
            *state = next;
        }
    }

    fn toast(state: UpdateState) -> Option<Node> {
        let message = match state {
            UpdateState::Idle => return None,
            UpdateState::OfflineReady => OFFLINE_READY_MESSAGE,
            UpdateState::NeedRefresh => NEED_REFRESH_MESSAGE,
        };

        let mut toast = Node::element("div")
            .class("ReloadPrompt-toast")
            .attr("role", "alert")
            .child(
                Node::element("div")
                    .class("ReloadPrompt-message")
                    .child(Node::element("span").text(message)),
            );
        if state == UpdateState::NeedRefresh {
            toast = toast.child(
                Node::element("button")
                    .class("ReloadPrompt-toast-button")
                    .attr("data-action", "reload")
                    .text("Reload"),
            );
        }
        toast = toast.child(
            Node::element("button")
                .class("ReloadPrompt-toast-button")
                .attr("data-action", "close")
                .text("Close"),
        );
        Some(toast.into())
    }
}

impl UpdateNotifier for ReloadPrompt {
    fn view(&self) -> Node {
        let mut container = Node::element("div").class(CONTAINER_CLASS);
        if let Some(toast) = Self::toast(self.state()) {
            container = container.child(toast);
        }
        container.into()
    }
}
