//! Device manifest and runtime configuration.
//!
//! The manifest is a single JSON document in the flash data partition:
//!
//! ```text
//! { "wifi":    { ip, gateway, subnet, dns, hostname, ssid, password },
//!   "mqtt":    { host, port, clientID, username, password, topic },
//!   "devices": [ { name, pin, type }, ... ],
//!   "runtime": { retry_delay_ms, keepalive_interval_ms, ... }   // optional
//! }
//! ```
//!
//! It is loaded once at boot into an immutable [`ConfigStore`] and only ever
//! replaced by a fresh load, never mutated in place.

use std::net::Ipv4Addr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::app::ports::{ConfigError, ManifestSource};

/// Upper bound on the manifest size read from flash.
pub const MAX_MANIFEST_BYTES: usize = 4096;

// ---------------------------------------------------------------------------
// Manifest sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceManifest {
    pub wifi: WifiSettings,
    pub mqtt: MqttSettings,
    #[serde(default, deserialize_with = "bindings_from_entries")]
    pub devices: Vec<PinBinding>,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// WiFi station settings.  An empty (or `"dhcp"`) `ip` selects DHCP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WifiSettings {
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub gateway: String,
    #[serde(default)]
    pub subnet: String,
    #[serde(default)]
    pub dns: String,
    pub hostname: String,
    pub ssid: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressMode {
    Dynamic,
    Static(StaticAddress),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticAddress {
    pub ip: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub subnet: Ipv4Addr,
    pub dns: Option<Ipv4Addr>,
}

impl StaticAddress {
    /// Prefix length of the subnet mask (`255.255.255.0` → 24).
    pub fn prefix_len(&self) -> u8 {
        u32::from(self.subnet).leading_ones() as u8
    }
}

impl WifiSettings {
    pub fn address_mode(&self) -> Result<AddressMode, ConfigError> {
        let ip = self.ip.trim();
        if ip.is_empty() || ip.eq_ignore_ascii_case("dhcp") || ip.eq_ignore_ascii_case("dynamic") {
            return Ok(AddressMode::Dynamic);
        }

        let parse = |text: &str, field: &'static str| {
            text.trim().parse::<Ipv4Addr>().map_err(|_| ConfigError::Invalid(field))
        };
        let subnet = parse(&self.subnet, "wifi.subnet")?;
        // Masks must be contiguous ones followed by zeros.
        let bits = u32::from(subnet);
        if bits.leading_ones() + bits.trailing_zeros() != 32 {
            return Err(ConfigError::Invalid("wifi.subnet"));
        }
        let dns = if self.dns.trim().is_empty() {
            None
        } else {
            Some(parse(&self.dns, "wifi.dns")?)
        };

        Ok(AddressMode::Static(StaticAddress {
            ip: parse(ip, "wifi.ip")?,
            gateway: parse(&self.gateway, "wifi.gateway")?,
            subnet,
            dns,
        }))
    }
}

/// Broker session settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MqttSettings {
    pub host: String,
    #[serde(default = "default_mqtt_port", deserialize_with = "port_from_number_or_string")]
    pub port: u16,
    #[serde(rename = "clientID")]
    pub client_id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub topic: String,
}

impl MqttSettings {
    /// Broker URL in the form the ESP-IDF client expects.
    pub fn url(&self) -> String {
        format!("mqtt://{}:{}", self.host, self.port)
    }
}

const fn default_mqtt_port() -> u16 {
    1883
}

/// One `devices[]` entry: a symbolic name bound to a raw pin spec.
///
/// Every field is read leniently.  A missing or mistyped value becomes text
/// that [`PinTable::resolve`](crate::pin_table::PinTable::resolve) skips,
/// so one bad entry never fails the whole manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinBinding {
    #[serde(default, deserialize_with = "text_from_any")]
    pub name: String,
    /// `"D5"`, `"GPIO13"` or `"13"` (a bare JSON number is accepted too).
    #[serde(default, deserialize_with = "text_from_any")]
    pub pin: String,
    #[serde(rename = "type", default = "default_pin_type", deserialize_with = "text_from_any")]
    pub kind: String,
}

fn default_pin_type() -> String {
    "OUTPUT".into()
}

// ---------------------------------------------------------------------------
// Runtime timing
// ---------------------------------------------------------------------------

/// Control-loop timing.  Every field is optional in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Fixed delay between failed setup attempts (config, link, broker).
    pub retry_delay_ms: u32,
    /// Interval between liveness publications.
    pub keepalive_interval_ms: u32,
    /// Indicator on-time and off-time per pulse.
    pub indicator_pulse_ms: u32,
    /// Settle delay after power-on before the first manifest read.
    pub boot_settle_ms: u32,
    /// Sleep between control-loop passes.
    pub loop_interval_ms: u32,
    /// Accept commands only for pins declared in `devices`.
    pub restrict_to_manifest: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            retry_delay_ms: 2_000,
            keepalive_interval_ms: 10_000,
            indicator_pulse_ms: 100,
            boot_settle_ms: 3_000,
            loop_interval_ms: 10,
            restrict_to_manifest: false,
        }
    }
}

// ---------------------------------------------------------------------------
// ConfigStore
// ---------------------------------------------------------------------------

/// Immutable, validated device manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigStore {
    manifest: DeviceManifest,
}

impl ConfigStore {
    /// Read the manifest from `source` and validate it.
    pub fn load(source: &mut impl ManifestSource) -> Result<Self, ConfigError> {
        let text = source.read_manifest()?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        if text.len() > MAX_MANIFEST_BYTES {
            return Err(ConfigError::TooLarge(text.len()));
        }
        let manifest: DeviceManifest = serde_json::from_str(text).map_err(|e| ConfigError::Parse {
            line: e.line(),
            column: e.column(),
        })?;
        validate(&manifest)?;
        Ok(Self { manifest })
    }

    pub fn manifest(&self) -> &DeviceManifest {
        &self.manifest
    }

    pub fn wifi(&self) -> &WifiSettings {
        &self.manifest.wifi
    }

    pub fn mqtt(&self) -> &MqttSettings {
        &self.manifest.mqtt
    }

    pub fn devices(&self) -> &[PinBinding] {
        &self.manifest.devices
    }

    pub fn runtime(&self) -> &RuntimeConfig {
        &self.manifest.runtime
    }

    /// Compact JSON rendering of the whole manifest.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.manifest).unwrap_or_else(|_| "{}".into())
    }
}

fn validate(manifest: &DeviceManifest) -> Result<(), ConfigError> {
    manifest.wifi.address_mode()?;
    if manifest.mqtt.host.trim().is_empty() {
        return Err(ConfigError::Invalid("mqtt.host must not be empty"));
    }
    if manifest.mqtt.topic.is_empty() {
        return Err(ConfigError::Invalid("mqtt.topic must not be empty"));
    }
    if manifest.mqtt.client_id.is_empty() {
        return Err(ConfigError::Invalid("mqtt.clientID must not be empty"));
    }
    let rt = &manifest.runtime;
    if rt.keepalive_interval_ms == 0 {
        return Err(ConfigError::Invalid("runtime.keepalive_interval_ms must be > 0"));
    }
    if rt.loop_interval_ms == 0 {
        return Err(ConfigError::Invalid("runtime.loop_interval_ms must be > 0"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Lenient number-or-string fields
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    Text(String),
    Other(serde_json::Value),
}

impl NumberOrString {
    fn into_text(self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s,
            Self::Other(value) => value.to_string(),
        }
    }
}

fn port_from_number_or_string<'de, D: Deserializer<'de>>(d: D) -> Result<u16, D::Error> {
    let port = match NumberOrString::deserialize(d)? {
        NumberOrString::Number(n) => u16::try_from(n).ok(),
        NumberOrString::Text(s) => s.trim().parse::<u16>().ok(),
        NumberOrString::Other(_) => None,
    };
    port.filter(|p| *p != 0)
        .ok_or_else(|| serde::de::Error::custom("mqtt.port must be 1-65535"))
}

fn text_from_any<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(NumberOrString::deserialize(d)?.into_text())
}

/// Entries that are not objects become unnamed bindings, which resolution
/// skips.
fn bindings_from_entries<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<PinBinding>, D::Error> {
    let entries = Option::<Vec<serde_json::Value>>::deserialize(d)?.unwrap_or_default();
    Ok(entries
        .into_iter()
        .map(|entry| {
            serde_json::from_value(entry.clone()).unwrap_or_else(|_| PinBinding {
                name: String::new(),
                pin: entry.to_string(),
                kind: default_pin_type(),
            })
        })
        .collect())
}
