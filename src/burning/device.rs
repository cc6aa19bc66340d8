//! Burner device handling
//!
//! The physical drive is a single-writer resource. It is modeled as an
//! explicit handle whose guard is acquired with a timeout and released on
//! every exit path by drop, never as an ambient global. Media status and
//! drive discovery wrap the burner tool's query commands.

use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::{Error, Result};
use crate::events::CancelToken;

/// Exclusive handle to one physical burner
#[derive(Debug, Clone)]
pub struct BurnerDevice {
    path: String,
    lock: Arc<Mutex<()>>,
}

/// Scoped ownership of the device; dropping it releases the drive
#[derive(Debug)]
pub struct DeviceGuard {
    path: String,
    _guard: OwnedMutexGuard<()>,
}

impl DeviceGuard {
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl BurnerDevice {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Acquire exclusive use of the drive, waiting at most `timeout`
    pub async fn acquire(&self, timeout: Duration) -> Result<DeviceGuard> {
        match tokio::time::timeout(timeout, self.lock.clone().lock_owned()).await {
            Ok(guard) => Ok(DeviceGuard {
                path: self.path.clone(),
                _guard: guard,
            }),
            Err(_) => Err(Error::DeviceTimeout {
                device: self.path.clone(),
                waited_secs: timeout.as_secs(),
            }),
        }
    }
}

/// What is currently in the drive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaStatus {
    /// No disc inserted
    NoDisc,
    /// Blank disc ready to burn
    Blank,
    /// Rewritable disc carrying data; would need an erase
    ErasableWithData,
    /// Write-once disc that already has data
    NonErasable,
}

/// Interpret the burner tool's media report
pub fn parse_media_status(output: &str) -> MediaStatus {
    let lower = output.to_lowercase();

    if lower.contains("no disk") || lower.contains("no disc") || lower.contains("not ready") {
        return MediaStatus::NoDisc;
    }
    if lower.contains("blank") {
        return MediaStatus::Blank;
    }
    // "Is not erasable" must not read as erasable
    if lower.contains("is erasable") && !lower.contains("is not erasable") {
        return MediaStatus::ErasableWithData;
    }
    MediaStatus::NonErasable
}

/// Query the drive for its current media
pub async fn check_media_status(device: &str) -> Result<MediaStatus> {
    let output = Command::new("wodim")
        .arg(format!("dev={}", device))
        .arg("-atip")
        .output()
        .await?;

    // wodim reports media detail on stderr as often as stdout
    let mut text = String::from_utf8_lossy(&output.stdout).to_string();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    Ok(parse_media_status(&text))
}

/// Poll the drive until blank media appears.
///
/// Non-blank discs are reported and polling continues so the user can swap
/// them; the timeout covers the whole wait.
pub async fn wait_for_blank_media(
    device: &str,
    timeout: Duration,
    cancel: &CancelToken,
) -> Result<()> {
    let deadline = tokio::time::Instant::now() + timeout;
    let mut warned_status: Option<MediaStatus> = None;

    loop {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(Error::DeviceTimeout {
                device: device.to_string(),
                waited_secs: timeout.as_secs(),
            });
        }

        match check_media_status(device).await {
            Ok(MediaStatus::Blank) => {
                log::info!("Blank disc detected in {}", device);
                return Ok(());
            }
            Ok(status) => {
                if warned_status != Some(status) {
                    match status {
                        MediaStatus::NoDisc => log::info!("Waiting for a disc in {}", device),
                        MediaStatus::ErasableWithData => {
                            log::warn!("Rewritable disc with data in {} - insert blank media", device)
                        }
                        MediaStatus::NonErasable => {
                            log::warn!("Non-blank disc in {} - insert blank media", device)
                        }
                        MediaStatus::Blank => {}
                    }
                    warned_status = Some(status);
                }
            }
            Err(e) => log::error!("Error checking media: {}", e),
        }

        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}

/// Pull device paths out of `wodim --devices` output
pub fn parse_device_list(output: &str) -> Vec<String> {
    let mut devices = Vec::new();
    for line in output.lines() {
        if let Some(start) = line.find("/dev/") {
            let device: String = line[start..]
                .chars()
                .take_while(|c| !c.is_whitespace() && *c != '\'' && *c != ':')
                .collect();
            if !device.is_empty() && !devices.contains(&device) {
                devices.push(device);
            }
        }
    }
    devices
}

/// Detect available burner devices, falling back to common paths
pub async fn list_devices() -> Vec<String> {
    let discovered = match Command::new("wodim").arg("--devices").output().await {
        Ok(output) => parse_device_list(&String::from_utf8_lossy(&output.stdout)),
        Err(e) => {
            log::debug!("wodim --devices failed: {}", e);
            Vec::new()
        }
    };
    if !discovered.is_empty() {
        return discovered;
    }

    let mut fallback = Vec::new();
    for candidate in ["/dev/sr0", "/dev/sr1", "/dev/cdrom", "/dev/dvd"] {
        if std::path::Path::new(candidate).exists() {
            fallback.push(candidate.to_string());
        }
    }
    fallback
}
