/// Prometheus metrics for the diagnostics server.
///
/// One global registry covers page serving, the device WebSocket channel,
/// the mDNS responder and errors by category.
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use prometheus_client::encoding::{EncodeLabelSet, text::encode};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use std::sync::Arc;

pub static METRICS: Lazy<Arc<MetricsCollector>> = Lazy::new(|| Arc::new(MetricsCollector::new()));

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct RouteLabels {
    /// "found" or "not_found"
    pub outcome: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct FrameLabels {
    /// Frame kind ("text", "binary", "ping", "pong", "close")
    pub kind: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct QueryLabels {
    /// "answered", "ignored" or "malformed"
    pub outcome: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ErrorLabels {
    pub category: String,
}

pub struct MetricsCollector {
    registry: RwLock<Registry>,

    /// Shell renders served as pages
    pub shell_renders_total: Counter,

    /// Page requests by route outcome
    pub page_requests_total: Family<RouteLabels, Counter>,

    /// Open WebSocket sessions
    pub ws_sessions_active: Gauge,

    /// WebSocket frames received by kind
    pub ws_frames_total: Family<FrameLabels, Counter>,

    /// Out-of-band sends queued by "Trigger async"
    pub ws_async_sends_total: Counter,

    /// mDNS packets by outcome
    pub mdns_queries_total: Family<QueryLabels, Counter>,

    pub errors_total: Family<ErrorLabels, Counter>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let shell_renders_total = Counter::default();
        registry.register(
            "ocd_shell_renders",
            "Total number of application shell renders",
            shell_renders_total.clone(),
        );

        let page_requests_total = Family::<RouteLabels, Counter>::default();
        registry.register(
            "ocd_page_requests",
            "Page requests by route outcome",
            page_requests_total.clone(),
        );

        let ws_sessions_active = Gauge::default();
        registry.register(
            "ocd_ws_sessions_active",
            "Number of open device WebSocket sessions",
            ws_sessions_active.clone(),
        );

        let ws_frames_total = Family::<FrameLabels, Counter>::default();
        registry.register(
            "ocd_ws_frames",
            "WebSocket frames received by kind",
            ws_frames_total.clone(),
        );

        let ws_async_sends_total = Counter::default();
        registry.register(
            "ocd_ws_async_sends",
            "Out-of-band WebSocket sends queued",
            ws_async_sends_total.clone(),
        );

        let mdns_queries_total = Family::<QueryLabels, Counter>::default();
        registry.register(
            "ocd_mdns_queries",
            "mDNS packets handled by outcome",
            mdns_queries_total.clone(),
        );

        let errors_total = Family::<ErrorLabels, Counter>::default();
        registry.register(
            "ocd_errors",
            "Errors by category",
            errors_total.clone(),
        );

        Self {
            registry: RwLock::new(registry),
            shell_renders_total,
            page_requests_total,
            ws_sessions_active,
            ws_frames_total,
            ws_async_sends_total,
            mdns_queries_total,
            errors_total,
        }
    }

    /// Encode metrics in Prometheus text format
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        let registry = self.registry.read();
        if let Err(e) = encode(&mut buffer, &registry) {
            tracing::warn!("failed to encode metrics: {}", e);
        }
        buffer
    }

    pub fn record_page(&self, outcome: &str) {
        self.shell_renders_total.inc();
        self.page_requests_total
            .get_or_create(&RouteLabels {
                outcome: outcome.to_string(),
            })
            .inc();
    }

    pub fn record_frame(&self, kind: &str) {
        self.ws_frames_total
            .get_or_create(&FrameLabels {
                kind: kind.to_string(),
            })
            .inc();
    }

    pub fn record_mdns(&self, outcome: &str) {
        self.mdns_queries_total
            .get_or_create(&QueryLabels {
                outcome: outcome.to_string(),
            })
            .inc();
    }

    pub fn record_error(&self, category: &str) {
        self.errors_total
            .get_or_create(&ErrorLabels {
                category: category.to_string(),
            })
            .inc();
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
