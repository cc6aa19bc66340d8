//! Session settings
//!
//! Persisted defaults for a burn run. Stored as JSON in the platform config
//! directory so repeat runs don't need the full flag set; every field has a
//! serde default so old files keep loading after new fields appear.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::capacity::{DiscLength, DiscMode};

fn default_device() -> String {
    "/dev/sr0".to_string()
}

fn default_speed() -> u32 {
    4
}

fn default_disc_length() -> DiscLength {
    DiscLength::Minutes80
}

fn default_mode() -> DiscMode {
    DiscMode::Dao
}

fn default_max_retries() -> u32 {
    2
}

fn default_device_timeout_secs() -> u64 {
    120
}

fn default_eject() -> bool {
    true
}

/// Configuration for one mastering-and-burn session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Burner device path
    #[serde(default = "default_device")]
    pub device: String,
    /// Write speed passed to the burner
    #[serde(default = "default_speed")]
    pub speed: u32,
    #[serde(default = "default_disc_length")]
    pub disc_length: DiscLength,
    #[serde(default = "default_mode")]
    pub mode: DiscMode,
    /// Max parallel transcodes; None sizes the pool from CPU cores
    #[serde(default)]
    pub max_workers: Option<usize>,
    /// Retry budget per disc before the job is terminally failed
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// How long to wait for the device (and a usable blank disc)
    #[serde(default = "default_device_timeout_secs")]
    pub device_timeout_secs: u64,
    /// Eject the disc after a successful burn
    #[serde(default = "default_eject")]
    pub eject: bool,
    /// Run the full pipeline but skip the physical write
    #[serde(default)]
    pub simulate: bool,
    /// Stop the whole session on the first permanently failed disc
    #[serde(default)]
    pub abort_on_failure: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            device: default_device(),
            speed: default_speed(),
            disc_length: default_disc_length(),
            mode: default_mode(),
            max_workers: None,
            max_retries: default_max_retries(),
            device_timeout_secs: default_device_timeout_secs(),
            eject: default_eject(),
            simulate: false,
            abort_on_failure: false,
        }
    }
}

impl SessionSettings {
    const SETTINGS_FILE: &'static str = "settings.json";

    fn config_dir() -> Result<PathBuf, String> {
        let base =
            dirs::config_dir().ok_or_else(|| "Could not determine config directory".to_string())?;
        let dir = base.join("discpress");
        if !dir.exists() {
            std::fs::create_dir_all(&dir)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }
        Ok(dir)
    }

    /// Load settings from disk, or return defaults if not found
    pub fn load() -> Self {
        match Self::try_load() {
            Ok(settings) => {
                log::debug!("Loaded session settings from disk");
                settings
            }
            Err(e) => {
                log::debug!("Using default session settings: {}", e);
                Self::default()
            }
        }
    }

    fn try_load() -> Result<Self, String> {
        let path = Self::config_dir()?.join(Self::SETTINGS_FILE);
        if !path.exists() {
            return Err("Settings file not found".to_string());
        }
        let contents = std::fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read settings: {}", e))?;
        serde_json::from_str(&contents).map_err(|e| format!("Failed to parse settings: {}", e))
    }

    /// Save settings to disk
    pub fn save(&self) -> Result<(), String> {
        let path = Self::config_dir()?.join(Self::SETTINGS_FILE);
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;
        std::fs::write(&path, json).map_err(|e| format!("Failed to write settings: {}", e))?;
        log::debug!("Saved session settings to {:?}", path);
        Ok(())
    }

    /// Disc capacity implied by the configured length
    pub fn capacity_frames(&self) -> u64 {
        self.disc_length.capacity_frames()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = SessionSettings::default();
        assert_eq!(s.device, "/dev/sr0");
        assert_eq!(s.speed, 4);
        assert_eq!(s.mode, DiscMode::Dao);
        assert_eq!(s.capacity_frames(), 360_000);
        assert_eq!(s.max_retries, 2);
        assert!(s.eject);
        assert!(!s.simulate);
        assert!(!s.abort_on_failure);
    }

    #[test]
    fn test_json_round_trip() {
        let mut s = SessionSettings::default();
        s.mode = DiscMode::Tao;
        s.disc_length = DiscLength::Minutes74;
        s.max_workers = Some(3);

        let json = serde_json::to_string(&s).unwrap();
        let back: SessionSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back.mode, DiscMode::Tao);
        assert_eq!(back.capacity_frames(), 333_000);
        assert_eq!(back.max_workers, Some(3));
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let back: SessionSettings = serde_json::from_str(r#"{"speed": 16}"#).unwrap();
        assert_eq!(back.speed, 16);
        assert_eq!(back.device, "/dev/sr0");
        assert_eq!(back.device_timeout_secs, 120);
    }

    #[test]
    fn test_mode_serializes_lowercase() {
        let json = serde_json::to_string(&DiscMode::Tao).unwrap();
        assert_eq!(json, r#""tao""#);
    }
}
