//! Flash-backed manifest source.
//!
//! Implements [`ManifestSource`] by reading the JSON manifest from a file.
//!
//! - **`target_os = "espidf"`**: mounts the SPIFFS data partition at
//!   `/spiffs` on first use and reads `/spiffs/config.json`.
//! - **all other targets**: reads whatever path the adapter was built
//!   with (the repo ships `data/config.json`).

use std::io::Read;
use std::path::PathBuf;

use log::info;

use crate::app::ports::{ConfigError, ManifestSource};
use crate::config::MAX_MANIFEST_BYTES;

/// Manifest location on the device.
pub const DEVICE_MANIFEST_PATH: &str = "/spiffs/config.json";

pub struct FlashManifestSource {
    path: PathBuf,
    mounted: bool,
}

impl FlashManifestSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), mounted: false }
    }

    /// Source for the on-device manifest.
    pub fn device() -> Self {
        Self::new(DEVICE_MANIFEST_PATH)
    }

    #[cfg(target_os = "espidf")]
    fn platform_mount(&mut self) -> Result<(), ConfigError> {
        use esp_idf_svc::sys::{esp_vfs_spiffs_conf_t, esp_vfs_spiffs_register, ESP_ERR_INVALID_STATE, ESP_OK};

        let conf = esp_vfs_spiffs_conf_t {
            base_path: c"/spiffs".as_ptr(),
            partition_label: core::ptr::null(),
            max_files: 4,
            format_if_mount_failed: false,
        };
        // SAFETY: `conf` and the static base path outlive the call; the VFS
        // copies what it needs.  Re-registering reports INVALID_STATE.
        let ret = unsafe { esp_vfs_spiffs_register(&conf) };
        if ret != ESP_OK as i32 && ret != ESP_ERR_INVALID_STATE as i32 {
            return Err(ConfigError::MountFailed(ret));
        }
        info!("storage: SPIFFS mounted at /spiffs");
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_mount(&mut self) -> Result<(), ConfigError> {
        info!("storage(sim): reading manifest from {}", self.path.display());
        Ok(())
    }
}

impl ManifestSource for FlashManifestSource {
    fn read_manifest(&mut self) -> Result<String, ConfigError> {
        if !self.mounted {
            self.platform_mount()?;
            self.mounted = true;
        }

        let file = std::fs::File::open(&self.path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ConfigError::NotFound,
            _ => ConfigError::Io,
        })?;

        // Read one byte past the limit to detect oversized files.
        let mut bytes = Vec::new();
        file.take(MAX_MANIFEST_BYTES as u64 + 1)
            .read_to_end(&mut bytes)
            .map_err(|_| ConfigError::Io)?;
        if bytes.len() > MAX_MANIFEST_BYTES {
            return Err(ConfigError::TooLarge(bytes.len()));
        }
        String::from_utf8(bytes).map_err(|_| ConfigError::Invalid("manifest is not valid UTF-8"))
    }
}
