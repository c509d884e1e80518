use crate::config::ServerConfig;
use crate::error::Result;
use crate::page::PageRenderer;
use crate::routes::{RouteMatch, RouteTable};
use crate::shell::{AppShell, EmptyContent, ReloadPrompt};
use crate::shutdown::ShutdownCoordinator;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use strum::Display;

/// Lifecycle of the mDNS responder as seen by health checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Display)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MdnsStatus {
    Disabled,
    Running,
    Failed(String),
    Stopped,
}

/// Shared server state, one per process.
pub struct AppState {
    config: Arc<ServerConfig>,
    /// Shell with empty content; routed content is swapped in per request.
    shell: AppShell,
    prompt: Arc<ReloadPrompt>,
    routes: RouteTable,
    renderer: PageRenderer,
    coordinator: Arc<ShutdownCoordinator>,
    mdns_status: RwLock<MdnsStatus>,
}

impl AppState {
    pub fn new(config: Arc<ServerConfig>, coordinator: Arc<ShutdownCoordinator>) -> Result<Self> {
        Self::with_routes(config, coordinator, RouteTable::standard())
    }

    pub fn with_routes(
        config: Arc<ServerConfig>,
        coordinator: Arc<ShutdownCoordinator>,
        routes: RouteTable,
    ) -> Result<Self> {
        let prompt = Arc::new(ReloadPrompt::new(config.update_state));
        let shell = AppShell::new(
            config.build_stamp.clone(),
            Arc::new(EmptyContent),
            prompt.clone(),
        );
        let mdns_status = if config.mdns_enabled {
            MdnsStatus::Stopped
        } else {
            MdnsStatus::Disabled
        };

        Ok(Self {
            renderer: PageRenderer::new()?,
            config,
            shell,
            prompt,
            routes,
            coordinator,
            mdns_status: RwLock::new(mdns_status),
        })
    }

    pub fn config(&self) -> Arc<ServerConfig> {
        self.config.clone()
    }

    pub fn shell(&self) -> &AppShell {
        &self.shell
    }

    pub fn prompt(&self) -> &ReloadPrompt {
        &self.prompt
    }

    pub fn coordinator(&self) -> Arc<ShutdownCoordinator> {
        self.coordinator.clone()
    }

    /// Shell for `path` with the route table's view as its content.
    pub fn shell_for(&self, path: &str) -> (RouteMatch, AppShell) {
        let (matched, content) = self.routes.resolve_shared(path);
        (matched, self.shell.with_content(content))
    }

    /// Full HTML document for `path`.
    pub fn render_page(&self, path: &str) -> Result<(RouteMatch, String)> {
        let (matched, shell) = self.shell_for(path);
        let html = self.renderer.render(&shell)?;
        Ok((matched, html))
    }

    pub fn mdns_status(&self) -> MdnsStatus {
        self.mdns_status.read().clone()
    }

    pub fn set_mdns_status(&self, status: MdnsStatus) {
        tracing::debug!(%status, "mDNS status");
        *self.mdns_status.write() = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::{BuildStamp, UpdateState};
    use crate::shutdown::ShutdownConfig;

    fn state(config: ServerConfig) -> AppState {
        AppState::new(
            Arc::new(config),
            Arc::new(ShutdownCoordinator::new(ShutdownConfig::default())),
        )
        .unwrap()
    }

    #[test]
    fn unknown_path_renders_not_found_inside_shell() {
        let state = state(ServerConfig {
            build_stamp: BuildStamp::new("stamp-1"),
            ..ServerConfig::default()
        });
        let (matched, html) = state.render_page("/nowhere").unwrap();
        assert_eq!(matched, RouteMatch::NotFound);
        assert!(html.contains("Page not found"));
        assert!(html.contains("stamp-1"));
    }

    #[test]
    fn prompt_starts_in_configured_state() {
        let state = state(ServerConfig {
            update_state: UpdateState::NeedRefresh,
            ..ServerConfig::default()
        });
        assert_eq!(state.prompt().state(), UpdateState::NeedRefresh);
        let (_, shell) = state.shell_for("/");
        assert!(shell.render().text_content().contains("New content available"));
    }

    #[test]
    fn mdns_status_follows_config() {
        assert_eq!(state(ServerConfig::default()).mdns_status(), MdnsStatus::Disabled);
        let enabled = state(ServerConfig {
            mdns_enabled: true,
            ..ServerConfig::default()
        });
        assert_eq!(enabled.mdns_status(), MdnsStatus::Stopped);
        enabled.set_mdns_status(MdnsStatus::Failed("address in use".into()));
        assert_eq!(enabled.mdns_status().to_string(), "failed");
    }
}
