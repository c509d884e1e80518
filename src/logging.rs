//! Structured logging setup.
//!
//! JSON output in production, pretty output in development, optional daily
//! rotated log files and an OpenTelemetry layer when an OTLP endpoint is set.

use anyhow::{Context, Result};
use opentelemetry::{KeyValue, trace::TraceError};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    Resource,
    trace::{RandomIdGenerator, Sampler, Tracer},
};
use std::env;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub output: LogOutput,
    /// Directory for log files when `output` is `File`
    pub log_dir: PathBuf,
    pub log_file_prefix: String,
    pub service_name: String,
    pub service_version: String,
    /// "development", "production", ...
    pub environment: String,
    pub enable_rotation: bool,
    /// Set when traces should be exported over OTLP
    pub otlp_endpoint: Option<String>,
    /// Trace sampling ratio, 0.0 to 1.0
    pub otel_sampling_rate: f64,
    pub otlp_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    Stderr,
    /// Daily rotated file under `log_dir`
    File,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("ENV"))
            .unwrap_or_else(|_| "development".to_string());
        let production = is_production(&environment);

        Self {
            format: if production {
                LogFormat::Json
            } else {
                LogFormat::Pretty
            },
            output: LogOutput::Stderr,
            log_dir: PathBuf::from("logs"),
            log_file_prefix: "ocd-server".to_string(),
            service_name: "open-car-diagnostics".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            environment,
            enable_rotation: true,
            otlp_endpoint: None,
            otel_sampling_rate: if production { 0.1 } else { 1.0 },
            otlp_timeout_secs: 10,
        }
    }
}

fn is_production(environment: &str) -> bool {
    matches!(environment, "production" | "prod")
}

impl LoggingConfig {
    /// Defaults overridden by `LOG_*` and `OTEL_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        match env::var("LOG_FORMAT").map(|v| v.to_ascii_lowercase()).as_deref() {
            Ok("json") => config.format = LogFormat::Json,
            Ok("pretty") => config.format = LogFormat::Pretty,
            _ => {}
        }

        match env::var("LOG_OUTPUT").map(|v| v.to_ascii_lowercase()).as_deref() {
            Ok("stdout") => config.output = LogOutput::Stdout,
            Ok("stderr") => config.output = LogOutput::Stderr,
            Ok("file") => config.output = LogOutput::File,
            _ => {}
        }

        if let Ok(log_dir) = env::var("LOG_DIR") {
            config.log_dir = PathBuf::from(log_dir);
        }

        config.otlp_endpoint = env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
            .or_else(|_| env::var("OTLP_ENDPOINT"))
            .ok()
            .filter(|endpoint| !endpoint.is_empty());

        if let Some(rate) = env::var("OTEL_SAMPLING_RATE")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
        {
            config.otel_sampling_rate = rate.clamp(0.0, 1.0);
        }

        if let Some(timeout) = env::var("OTEL_EXPORTER_OTLP_TIMEOUT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            config.otlp_timeout_secs = timeout;
        }

        config
    }

    fn resource(&self) -> Resource {
        Resource::new(vec![
            KeyValue::new(
                opentelemetry_semantic_conventions::resource::SERVICE_NAME,
                self.service_name.clone(),
            ),
            KeyValue::new(
                opentelemetry_semantic_conventions::resource::SERVICE_VERSION,
                self.service_version.clone(),
            ),
            KeyValue::new("environment", self.environment.clone()),
            KeyValue::new("service.namespace", "ocd"),
        ])
    }

    fn sampler(&self) -> Sampler {
        if self.otel_sampling_rate >= 1.0 {
            Sampler::AlwaysOn
        } else if self.otel_sampling_rate <= 0.0 {
            Sampler::AlwaysOff
        } else {
            Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(
                self.otel_sampling_rate,
            )))
        }
    }

    fn writer(&self) -> Result<(NonBlocking, WorkerGuard)> {
        Ok(match self.output {
            LogOutput::Stdout => tracing_appender::non_blocking(io::stdout()),
            LogOutput::Stderr => tracing_appender::non_blocking(io::stderr()),
            LogOutput::File => {
                std::fs::create_dir_all(&self.log_dir).context("Failed to create log directory")?;
                let appender = if self.enable_rotation {
                    tracing_appender::rolling::daily(&self.log_dir, &self.log_file_prefix)
                } else {
                    tracing_appender::rolling::never(&self.log_dir, &self.log_file_prefix)
                };
                tracing_appender::non_blocking(appender)
            }
        })
    }
}

/// Install the global subscriber.
///
/// The returned guard must live as long as the process so buffered lines are
/// flushed on exit.
pub fn init_logging(config: LoggingConfig) -> Result<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if is_production(&config.environment) {
            "info"
        } else {
            "debug"
        };
        EnvFilter::new(format!("{level},hyper=info,tower=info,tungstenite=info"))
    });

    let (writer, guard) = config.writer()?;

    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(writer)
            .with_target(true)
            .with_line_number(true)
            .with_file(true)
            .with_thread_ids(true)
            .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
            .with_current_span(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_writer(writer)
            .with_target(true)
            .with_line_number(true)
            .with_file(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(true)
            .boxed(),
    };

    let otel_layer = match config.otlp_endpoint.as_ref() {
        Some(_) => match init_tracer(&config) {
            Ok(tracer) => Some(tracing_opentelemetry::layer().with_tracer(tracer)),
            Err(e) => {
                eprintln!(
                    "Warning: failed to initialize OpenTelemetry exporter: {}. Continuing without distributed tracing.",
                    e
                );
                None
            }
        },
        None => None,
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(otel_layer)
        .with(env_filter)
        .try_init()
        .context("a global tracing subscriber is already installed")?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = %config.environment,
        format = ?config.format,
        output = ?config.output,
        otlp = config.otlp_endpoint.is_some(),
        "logging initialized"
    );

    Ok(guard)
}

fn init_tracer(config: &LoggingConfig) -> Result<Tracer, TraceError> {
    let endpoint = config
        .otlp_endpoint
        .as_ref()
        .ok_or_else(|| TraceError::Other("No OTLP endpoint configured".into()))?;

    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(endpoint)
        .with_timeout(Duration::from_secs(config.otlp_timeout_secs));

    opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(exporter)
        .with_trace_config(
            opentelemetry_sdk::trace::Config::default()
                .with_sampler(config.sampler())
                .with_id_generator(RandomIdGenerator::default())
                .with_resource(config.resource()),
        )
        .install_batch(opentelemetry_sdk::runtime::Tokio)
}

/// Flush and stop the OTLP exporter.
pub fn shutdown_telemetry() {
    opentelemetry::global::shutdown_tracer_provider();
}

/// Span wrapping one page request.
pub fn page_span(path: &str) -> tracing::Span {
    tracing::info_span!(
        "page",
        http.path = path,
        service = env!("CARGO_PKG_NAME"),
        version = env!("CARGO_PKG_VERSION")
    )
}

/// Span covering the lifetime of one device WebSocket session.
pub fn ws_session_span(session_id: &str) -> tracing::Span {
    tracing::info_span!(
        "ws_session",
        ws.session = session_id,
        service = env!("CARGO_PKG_NAME"),
        version = env!("CARGO_PKG_VERSION")
    )
}
