use crate::device::DeviceProfile;
use crate::shell::{BuildStamp, UpdateState};
use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

const DEFAULT_HTTP_BIND: &str = "127.0.0.1:8080";
const DEFAULT_MDNS_BIND: &str = "0.0.0.0:5353";
const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub http_bind_address: SocketAddr,
    pub build_stamp: BuildStamp,
    pub update_state: UpdateState,
    pub device: DeviceProfile,
    pub mdns_enabled: bool,
    pub mdns_bind_address: SocketAddr,
    pub mdns_address: Option<Ipv4Addr>,
    pub graceful_shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_bind_address: default_addr(DEFAULT_HTTP_BIND),
            build_stamp: BuildStamp::compiled(),
            update_state: UpdateState::Idle,
            device: DeviceProfile::default(),
            mdns_enabled: false,
            mdns_bind_address: default_addr(DEFAULT_MDNS_BIND),
            mdns_address: None,
            graceful_shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
        }
    }
}

fn default_addr(addr: &str) -> SocketAddr {
    addr.parse()
        .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 0)))
}

impl ServerConfig {
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let CliArgs {
            config,
            http_bind: cli_http_bind,
            build_stamp: cli_build_stamp,
            update_state: cli_update_state,
            mdns: cli_mdns,
            mdns_bind: cli_mdns_bind,
            mdns_address: cli_mdns_address,
            hostname: cli_hostname,
            ssid: cli_ssid,
            password: cli_password,
            channel: cli_channel,
            max_connections: cli_max_connections,
            shutdown_timeout: cli_shutdown_timeout,
        } = args;

        let file_config = if let Some(path) = config.as_ref() {
            load_config_file(path)?
        } else {
            PartialConfig::default()
        };

        let PartialConfig {
            http_bind: file_http_bind,
            build_stamp: file_build_stamp,
            update_state: file_update_state,
            mdns: file_mdns,
            mdns_bind: file_mdns_bind,
            mdns_address: file_mdns_address,
            device: file_device,
            shutdown_timeout: file_shutdown_timeout,
        } = file_config;

        let defaults = Self::default();
        let file_device = file_device.unwrap_or_default();
        let base_device = DeviceProfile::default();

        let device = DeviceProfile {
            ssid: cli_ssid.or(file_device.ssid).unwrap_or(base_device.ssid),
            password: cli_password
                .or(file_device.password)
                .unwrap_or(base_device.password),
            channel: cli_channel
                .or(file_device.channel)
                .unwrap_or(base_device.channel),
            max_connections: cli_max_connections
                .or(file_device.max_connections)
                .unwrap_or(base_device.max_connections),
            hostname: cli_hostname
                .or(file_device.hostname)
                .unwrap_or(base_device.hostname),
            instance_name: file_device
                .instance_name
                .unwrap_or(base_device.instance_name),
        };

        let build_stamp = cli_build_stamp
            .or(file_build_stamp)
            .map(BuildStamp::new)
            .unwrap_or(defaults.build_stamp);

        Ok(Self {
            http_bind_address: cli_http_bind
                .or(file_http_bind)
                .unwrap_or(defaults.http_bind_address),
            build_stamp,
            update_state: cli_update_state
                .or(file_update_state)
                .unwrap_or(defaults.update_state),
            device,
            mdns_enabled: cli_mdns.or(file_mdns).unwrap_or(defaults.mdns_enabled),
            mdns_bind_address: cli_mdns_bind
                .or(file_mdns_bind)
                .unwrap_or(defaults.mdns_bind_address),
            mdns_address: cli_mdns_address.or(file_mdns_address),
            graceful_shutdown_timeout_secs: cli_shutdown_timeout
                .or(file_shutdown_timeout)
                .unwrap_or(defaults.graceful_shutdown_timeout_secs),
        })
    }

    /// Fail fast on settings the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.graceful_shutdown_timeout_secs > 0,
            "shutdown timeout must be at least one second"
        );
        self.device
            .validate()
            .context("device profile is invalid")?;
        if self.mdns_enabled {
            anyhow::ensure!(
                self.mdns_address.is_some(),
                "mDNS is enabled but no address to advertise was configured (--mdns-address)"
            );
        }
        if self.build_stamp.is_placeholder() {
            tracing::warn!(
                stamp = %self.build_stamp,
                "build stamp was not substituted at packaging time"
            );
        }
        Ok(())
    }
}

#[derive(Parser, Debug, Default, Clone)]
#[command(
    name = "ocd-server",
    about = "Open Car Diagnostics application server",
    version
)]
pub struct CliArgs {
    #[arg(
        long,
        value_name = "FILE",
        help = "Path to a configuration file (YAML or JSON)"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        env = "OCD_HTTP_BIND",
        value_name = "ADDR",
        help = "Address the HTTP server listens on"
    )]
    pub http_bind: Option<SocketAddr>,

    #[arg(
        long,
        env = "OCD_BUILD_STAMP",
        value_name = "STAMP",
        help = "When this build was packaged; shown verbatim in the app header"
    )]
    pub build_stamp: Option<String>,

    #[arg(
        long,
        env = "OCD_UPDATE_STATE",
        value_enum,
        value_name = "STATE",
        help = "Initial reload prompt state"
    )]
    pub update_state: Option<UpdateState>,

    #[arg(
        long,
        env = "OCD_MDNS",
        value_name = "BOOL",
        num_args = 0..=1,
        default_missing_value = "true",
        help = "Advertise the device host name over mDNS"
    )]
    pub mdns: Option<bool>,

    #[arg(
        long,
        env = "OCD_MDNS_BIND",
        value_name = "ADDR",
        help = "UDP address the mDNS responder listens on"
    )]
    pub mdns_bind: Option<SocketAddr>,

    #[arg(
        long,
        env = "OCD_MDNS_ADDRESS",
        value_name = "IPV4",
        help = "IPv4 address announced for the host name"
    )]
    pub mdns_address: Option<Ipv4Addr>,

    #[arg(
        long,
        env = "OCD_HOSTNAME",
        value_name = "NAME",
        help = "Device host name (without .local)"
    )]
    pub hostname: Option<String>,

    #[arg(long, env = "OCD_SSID", value_name = "SSID", help = "Access point SSID")]
    pub ssid: Option<String>,

    #[arg(
        long,
        env = "OCD_PASSWORD",
        value_name = "PASSWORD",
        help = "Access point password; empty for an open network"
    )]
    pub password: Option<String>,

    #[arg(long, value_name = "N", help = "Wi-Fi channel, 0 for automatic")]
    pub channel: Option<u8>,

    #[arg(long, value_name = "N", help = "Maximum stations on the access point")]
    pub max_connections: Option<u8>,

    #[arg(
        long,
        value_name = "SECS",
        help = "Time allowed for open sessions to drain on shutdown"
    )]
    pub shutdown_timeout: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PartialDevice {
    ssid: Option<String>,
    password: Option<String>,
    channel: Option<u8>,
    max_connections: Option<u8>,
    hostname: Option<String>,
    instance_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PartialConfig {
    http_bind: Option<SocketAddr>,
    build_stamp: Option<String>,
    update_state: Option<UpdateState>,
    mdns: Option<bool>,
    mdns_bind: Option<SocketAddr>,
    mdns_address: Option<Ipv4Addr>,
    device: Option<PartialDevice>,
    shutdown_timeout: Option<u64>,
}

fn load_config_file(path: &Path) -> Result<PartialConfig> {
    if !path.exists() {
        anyhow::bail!("config file {:?} does not exist", path);
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {:?}", path))?;
    let ext = path
        .extension()
        .and_then(|os| os.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let parsed = match ext.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse YAML config {:?}", path))?,
        "json" => serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse JSON config {:?}", path))?,
        other => anyhow::bail!("unsupported config extension: {other}"),
    };
    Ok(parsed)
}
