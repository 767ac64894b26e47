//! Runtime environment probes: accelerator placement and embedding server availability.

use crate::config::DevicePreference;
use serde::Serialize;
use std::fmt;
use std::process::Command;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("Ollama is not installed or not in PATH")]
    NotInstalled,

    #[error("Ollama is installed but not running")]
    NotRunning,

    #[error("Failed to check Ollama status: {0}")]
    CheckFailed(String),
}

pub type Result<T> = std::result::Result<T, DetectionError>;

/// Hardware a manager runs its embedding and index work on.
///
/// Chosen once when a [`RagManager`](crate::RagManager) is constructed and
/// never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Device {
    Cpu,
    Cuda { ordinal: usize },
    Metal,
}

impl Device {
    pub fn is_accelerator(&self) -> bool {
        !matches!(self, Device::Cpu)
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda { ordinal } => write!(f, "cuda:{}", ordinal),
            Device::Metal => write!(f, "metal"),
        }
    }
}

/// Resolves a configured preference into a concrete device.
///
/// An explicit `cuda`/`metal` request is honored only when the probe finds the
/// hardware; otherwise the CPU is used and a warning is logged.
pub fn resolve_device(preference: DevicePreference) -> Device {
    match preference {
        DevicePreference::Cpu => Device::Cpu,
        DevicePreference::Cuda => {
            if has_cuda() {
                Device::Cuda { ordinal: 0 }
            } else {
                warn!("CUDA requested but no NVIDIA device was found, using cpu");
                Device::Cpu
            }
        }
        DevicePreference::Metal => {
            if has_metal() {
                Device::Metal
            } else {
                warn!("Metal requested but this host does not support it, using cpu");
                Device::Cpu
            }
        }
        DevicePreference::Auto => {
            if has_cuda() {
                Device::Cuda { ordinal: 0 }
            } else if has_metal() {
                Device::Metal
            } else {
                debug!("No accelerator detected");
                Device::Cpu
            }
        }
    }
}

fn has_cuda() -> bool {
    Command::new("nvidia-smi")
        .arg("-L")
        .output()
        .map(|output| output.status.success() && !output.stdout.is_empty())
        .unwrap_or(false)
}

fn has_metal() -> bool {
    cfg!(all(target_os = "macos", target_arch = "aarch64"))
}

/// Information about Ollama availability.
#[derive(Debug, Clone)]
pub struct OllamaInfo {
    pub installed: bool,
    pub running: bool,
}

/// Quietly checks whether the Ollama embedding server is available.
pub fn check_ollama_silent() -> Result<OllamaInfo> {
    if !is_ollama_installed() {
        return Err(DetectionError::NotInstalled);
    }

    match is_ollama_running() {
        Ok(true) => Ok(OllamaInfo {
            installed: true,
            running: true,
        }),
        Ok(false) => Err(DetectionError::NotRunning),
        Err(e) => Err(DetectionError::CheckFailed(e)),
    }
}

/// Human-readable next step for a failed [`check_ollama_silent`].
pub fn setup_hint(error: &DetectionError) -> &'static str {
    match error {
        DetectionError::NotInstalled => {
            if cfg!(target_os = "macos") {
                "Install Ollama with `brew install ollama`, then `ollama pull embeddinggemma`"
            } else if cfg!(target_os = "windows") {
                "Download Ollama from https://ollama.com/download, then `ollama pull embeddinggemma`"
            } else {
                "Install Ollama with `curl -fsSL https://ollama.com/install.sh | sh`, then `ollama pull embeddinggemma`"
            }
        }
        DetectionError::NotRunning => "Start the server with `ollama serve` and verify with `ollama list`",
        DetectionError::CheckFailed(_) => "Run `ollama list` manually to see what is wrong",
    }
}

fn is_ollama_installed() -> bool {
    Command::new("which")
        .arg("ollama")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

fn is_ollama_running() -> std::result::Result<bool, String> {
    let output = Command::new("ollama")
        .arg("list")
        .output()
        .map_err(|e| e.to_string())?;

    Ok(output.status.success())
}
