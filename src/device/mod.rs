//! Device-side pieces: the soft access-point profile, the WebSocket channel
//! and the mDNS responder that makes the device reachable as `ocd-device.local`.

pub mod mdns;
pub mod ws;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_SSID: &str = "OpenCarDiagnostics";
pub const DEFAULT_PASSWORD: &str = "PASSWORD";
pub const DEFAULT_CHANNEL: u8 = 0;
pub const DEFAULT_MAX_CONNECTIONS: u8 = 1;
pub const DEFAULT_HOSTNAME: &str = "ocd-device";
pub const DEFAULT_INSTANCE_NAME: &str = "Open Car Diagnostics ";

const MAX_SSID_LEN: usize = 32;
const WPA_PASSWORD_LEN: std::ops::RangeInclusive<usize> = 8..=63;
const MAX_CHANNEL: u8 = 13;
const MAX_STATIONS: u8 = 10;
const MAX_LABEL_LEN: usize = 63;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    Open,
    WpaWpa2Psk,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProfileError {
    #[error("ssid must be 1 to 32 bytes, got {0}")]
    SsidLength(usize),
    #[error("password must be empty or 8 to 63 bytes, got {0}")]
    PasswordLength(usize),
    #[error("channel {0} is outside 0..=13")]
    Channel(u8),
    #[error("max connections {0} is outside 1..=10")]
    MaxConnections(u8),
    #[error("hostname {0:?} is not a valid DNS label")]
    Hostname(String),
}

/// Soft access-point settings plus the name the device advertises over mDNS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub ssid: String,
    pub password: String,
    /// 0 lets the radio pick.
    pub channel: u8,
    pub max_connections: u8,
    pub hostname: String,
    pub instance_name: String,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            ssid: DEFAULT_SSID.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
            channel: DEFAULT_CHANNEL,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            hostname: DEFAULT_HOSTNAME.to_string(),
            instance_name: DEFAULT_INSTANCE_NAME.to_string(),
        }
    }
}

impl DeviceProfile {
    pub fn auth_mode(&self) -> AuthMode {
        if self.password.is_empty() {
            AuthMode::Open
        } else {
            AuthMode::WpaWpa2Psk
        }
    }

    /// Fully qualified mDNS name, e.g. `ocd-device.local`.
    pub fn mdns_name(&self) -> String {
        format!("{}.local", self.hostname)
    }

    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.ssid.is_empty() || self.ssid.len() > MAX_SSID_LEN {
            return Err(ProfileError::SsidLength(self.ssid.len()));
        }
        if !self.password.is_empty() && !WPA_PASSWORD_LEN.contains(&self.password.len()) {
            return Err(ProfileError::PasswordLength(self.password.len()));
        }
        if self.channel > MAX_CHANNEL {
            return Err(ProfileError::Channel(self.channel));
        }
        if self.max_connections == 0 || self.max_connections > MAX_STATIONS {
            return Err(ProfileError::MaxConnections(self.max_connections));
        }
        if !is_dns_label(&self.hostname) {
            return Err(ProfileError::Hostname(self.hostname.clone()));
        }
        Ok(())
    }

    /// Copy safe to hand to clients.
    pub fn redacted(&self) -> RedactedProfile {
        RedactedProfile {
            ssid: self.ssid.clone(),
            auth_mode: self.auth_mode(),
            channel: self.channel,
            max_connections: self.max_connections,
            hostname: self.mdns_name(),
            instance_name: self.instance_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedactedProfile {
    pub ssid: String,
    pub auth_mode: AuthMode,
    pub channel: u8,
    pub max_connections: u8,
    pub hostname: String,
    pub instance_name: String,
}

fn is_dns_label(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= MAX_LABEL_LEN
        && !label.starts_with('-')
        && !label.ends_with('-')
        && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn default_profile_is_valid_and_protected() {
        let profile = DeviceProfile::default();
        assert!(profile.validate().is_ok());
        assert_eq!(profile.auth_mode(), AuthMode::WpaWpa2Psk);
        assert_eq!(profile.mdns_name(), "ocd-device.local");
    }

    #[test]
    fn empty_password_means_open_network() {
        let profile = DeviceProfile {
            password: String::new(),
            ..Default::default()
        };
        assert!(profile.validate().is_ok());
        assert_eq!(profile.auth_mode(), AuthMode::Open);
    }

    #[test]
    fn short_password_is_rejected() {
        let profile = DeviceProfile {
            password: "short".into(),
            ..Default::default()
        };
        assert_matches!(profile.validate(), Err(ProfileError::PasswordLength(5)));
    }

    #[test]
    fn bad_hostname_is_rejected() {
        let profile = DeviceProfile {
            hostname: "ocd device".into(),
            ..Default::default()
        };
        assert_matches!(profile.validate(), Err(ProfileError::Hostname(_)));
    }

    #[test]
    fn station_limits_are_enforced() {
        let profile = DeviceProfile {
            max_connections: 0,
            ..Default::default()
        };
        assert_matches!(profile.validate(), Err(ProfileError::MaxConnections(0)));
        let profile = DeviceProfile {
            channel: 14,
            ..Default::default()
        };
        assert_matches!(profile.validate(), Err(ProfileError::Channel(14)));
    }

    #[test]
    fn redacted_profile_has_no_password() {
        let json = serde_json::to_value(DeviceProfile::default().redacted()).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["auth_mode"], "wpa_wpa2_psk");
    }
}
