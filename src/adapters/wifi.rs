//! WiFi station-mode adapter.
//!
//! Implements [`LinkPort`], the hexagonal boundary for network
//! connectivity.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: real ESP-IDF WiFi driver calls via `esp_idf_svc::wifi`.
//! - **all other targets**: simulation with scriptable failures for host-side tests.
//!
//! ## Retry policy
//!
//! The adapter makes exactly one bounded attempt per call.  Waiting
//! between attempts belongs to the control loop's fixed-delay retry.

use log::{info, warn};

use crate::app::ports::{ConnectivityState, LinkError, LinkInfo, LinkPort};
use crate::config::{AddressMode, WifiSettings};

#[cfg(target_os = "espidf")]
use embedded_svc::wifi::{AuthMethod, ClientConfiguration, Configuration};
#[cfg(target_os = "espidf")]
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::modem::Modem,
    ipv4,
    netif::{EspNetif, NetifConfiguration},
    nvs::EspDefaultNvsPartition,
    sys::EspError,
    wifi::{BlockingWifi, EspWifi},
};

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

fn validate_ssid(ssid: &str) -> Result<(), LinkError> {
    if ssid.is_empty() || ssid.len() > 32 {
        return Err(LinkError::InvalidSsid);
    }
    if !is_printable_ascii(ssid) {
        return Err(LinkError::InvalidSsid);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), LinkError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(LinkError::InvalidPassword);
    }
    Ok(())
}

fn validate_hostname(hostname: &str) -> Result<heapless::String<32>, LinkError> {
    let valid = !hostname.is_empty()
        && !hostname.starts_with('-')
        && hostname.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-');
    if !valid {
        return Err(LinkError::InvalidHostname);
    }
    let mut out = heapless::String::new();
    out.push_str(hostname).map_err(|()| LinkError::InvalidHostname)?;
    Ok(out)
}

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiLink {
    state: ConnectivityState,
    info: Option<LinkInfo>,
    attempts: u32,
    #[cfg(target_os = "espidf")]
    wifi: BlockingWifi<EspWifi<'static>>,
    #[cfg(target_os = "espidf")]
    started: bool,
    /// Simulation: number of upcoming attempts that fail.
    #[cfg(not(target_os = "espidf"))]
    sim_failures: u32,
}

#[cfg(target_os = "espidf")]
impl WifiLink {
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: EspDefaultNvsPartition,
    ) -> anyhow::Result<Self> {
        let esp_wifi = EspWifi::new(modem, sysloop.clone(), Some(nvs))?;
        let wifi = BlockingWifi::wrap(esp_wifi, sysloop)?;
        Ok(Self {
            state: ConnectivityState::Disconnected,
            info: None,
            attempts: 0,
            wifi,
            started: false,
        })
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for WifiLink {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(target_os = "espidf"))]
impl WifiLink {
    pub fn new() -> Self {
        Self {
            state: ConnectivityState::Disconnected,
            info: None,
            attempts: 0,
            sim_failures: 0,
        }
    }

    /// Simulation: make the next `n` attempts fail.
    pub fn fail_next(&mut self, n: u32) {
        self.sim_failures = n;
    }

    /// Simulation: the access point goes away.
    pub fn drop_link(&mut self) {
        self.state = ConnectivityState::Disconnected;
    }
}

impl WifiLink {
    /// Total association attempts made.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn info(&self) -> Option<&LinkInfo> {
        self.info.as_ref()
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_attach(
        &mut self,
        settings: &WifiSettings,
        mode: &AddressMode,
        hostname: &heapless::String<32>,
    ) -> Result<LinkInfo, LinkError> {
        fn driver(e: EspError) -> LinkError {
            LinkError::Driver(e.code())
        }

        if !self.started {
            let netif = build_sta_netif(mode, hostname)?;
            self.wifi.wifi_mut().swap_netif_sta(netif).map_err(driver)?;

            let auth_method = if settings.password.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPAWPA2Personal
            };
            self.wifi
                .set_configuration(&Configuration::Client(ClientConfiguration {
                    ssid: settings.ssid.as_str().try_into().map_err(|_| LinkError::InvalidSsid)?,
                    password: settings
                        .password
                        .as_str()
                        .try_into()
                        .map_err(|_| LinkError::InvalidPassword)?,
                    auth_method,
                    ..Default::default()
                }))
                .map_err(driver)?;
            self.wifi.start().map_err(driver)?;
            self.started = true;
        }

        self.wifi.connect().map_err(|_| LinkError::AssociationFailed)?;
        self.wifi.wait_netif_up().map_err(|_| LinkError::NoAddress)?;
        let ip = self.wifi.wifi().sta_netif().get_ip_info().map_err(driver)?;
        Ok(LinkInfo { hostname: hostname.clone(), address: ip.ip })
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_attach(
        &mut self,
        settings: &WifiSettings,
        mode: &AddressMode,
        hostname: &heapless::String<32>,
    ) -> Result<LinkInfo, LinkError> {
        if self.sim_failures > 0 {
            self.sim_failures -= 1;
            warn!("WiFi(sim): '{}' did not answer", settings.ssid);
            return Err(LinkError::AssociationFailed);
        }
        let address = match mode {
            AddressMode::Static(addr) => addr.ip,
            AddressMode::Dynamic => std::net::Ipv4Addr::new(192, 168, 4, 2),
        };
        Ok(LinkInfo { hostname: hostname.clone(), address })
    }

    #[cfg(target_os = "espidf")]
    fn platform_detach(&mut self) {
        let _ = self.wifi.disconnect();
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_detach(&mut self) {}

    #[cfg(target_os = "espidf")]
    fn platform_is_connected(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_is_connected(&self) -> bool {
        true
    }
}

/// Station netif carrying the hostname and either DHCP or a fixed address.
#[cfg(target_os = "espidf")]
fn build_sta_netif(mode: &AddressMode, hostname: &str) -> Result<EspNetif, LinkError> {
    let ip_configuration = match mode {
        AddressMode::Dynamic => ipv4::ClientConfiguration::DHCP(ipv4::DHCPClientSettings {
            hostname: Some(hostname.try_into().map_err(|_| LinkError::InvalidHostname)?),
        }),
        AddressMode::Static(addr) => ipv4::ClientConfiguration::Fixed(ipv4::ClientSettings {
            ip: addr.ip,
            subnet: ipv4::Subnet {
                gateway: addr.gateway,
                mask: ipv4::Mask::try_from(addr.subnet).map_err(|_| LinkError::InvalidAddress)?,
            },
            dns: addr.dns,
            secondary_dns: None,
        }),
    };
    let conf = NetifConfiguration {
        ip_configuration: Some(ipv4::Configuration::Client(ip_configuration)),
        ..NetifConfiguration::wifi_default_client()
    };
    EspNetif::new_with_conf(&conf).map_err(|e| LinkError::Driver(e.code()))
}

// ───────────────────────────────────────────────────────────────
// LinkPort
// ───────────────────────────────────────────────────────────────

impl LinkPort for WifiLink {
    fn attach(&mut self, settings: &WifiSettings) -> Result<LinkInfo, LinkError> {
        validate_ssid(&settings.ssid)?;
        validate_password(&settings.password)?;
        let hostname = validate_hostname(&settings.hostname)?;
        let mode = settings.address_mode().map_err(|_| LinkError::InvalidAddress)?;

        self.attempts = self.attempts.wrapping_add(1);
        self.state = ConnectivityState::Connecting;
        info!("WiFi: connecting to '{}' (attempt {})", settings.ssid, self.attempts);

        match self.platform_attach(settings, &mode, &hostname) {
            Ok(info) => {
                self.state = ConnectivityState::Connected;
                self.info = Some(info.clone());
                Ok(info)
            }
            Err(e) => {
                warn!("WiFi: attempt {} failed: {}", self.attempts, e);
                self.platform_detach();
                self.state = ConnectivityState::Disconnected;
                Err(e)
            }
        }
    }

    fn reattach(&mut self, settings: &WifiSettings) -> Result<LinkInfo, LinkError> {
        if self.is_attached() {
            if let Some(info) = &self.info {
                return Ok(info.clone());
            }
        }
        self.platform_detach();
        self.state = ConnectivityState::Disconnected;
        self.attach(settings)
    }

    fn state(&self) -> ConnectivityState {
        match self.state {
            ConnectivityState::Connected if !self.platform_is_connected() => {
                ConnectivityState::Disconnected
            }
            other => other,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
