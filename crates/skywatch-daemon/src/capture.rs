//! Capture device abstraction and the external still-command runner.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use skywatch::CaptureError;
use tokio::process::Command;

/// Opaque device settings (resolution, exposure, white balance, focus, …),
/// rendered verbatim as `--key value` flags. The daemon never interprets
/// them; they belong to the capture tool.
#[derive(Debug, Clone, Default)]
pub struct DeviceSettings(BTreeMap<String, String>);

impl DeviceSettings {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Render as command-line arguments. An empty value becomes a bare flag.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        for (key, value) in &self.0 {
            args.push(format!("--{key}"));
            if !value.is_empty() {
                args.push(value.clone());
            }
        }
        args
    }
}

impl From<BTreeMap<String, String>> for DeviceSettings {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

/// Anything that can materialize one frame at `output`.
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    async fn capture(&self, output: &Path, settings: &DeviceSettings)
        -> Result<(), CaptureError>;
}

/// Runs an external still-capture command (`libcamera-still`-style: settings
/// flags plus `-o <output>`) and verifies it produced a non-empty file.
pub struct StillCommand {
    program: String,
}

impl StillCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl CaptureDevice for StillCommand {
    async fn capture(
        &self,
        output: &Path,
        settings: &DeviceSettings,
    ) -> Result<(), CaptureError> {
        let result = Command::new(&self.program)
            .args(settings.to_args())
            .arg("-o")
            .arg(output)
            .output()
            .await;

        let out = match result {
            Ok(out) => out,
            Err(e) => {
                return Err(CaptureError::DeviceError(format!(
                    "failed to spawn {}: {e}",
                    self.program
                )))
            }
        };

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            if stderr.contains("busy") || stderr.contains("in use") {
                return Err(CaptureError::DeviceBusy);
            }
            return Err(CaptureError::DeviceError(format!(
                "{} exited with {}: {}",
                self.program,
                out.status,
                stderr.trim()
            )));
        }

        // A zero-byte frame must never survive into the store.
        match tokio::fs::metadata(output).await {
            Ok(meta) if meta.len() > 0 => Ok(()),
            Ok(_) => {
                let _ = tokio::fs::remove_file(output).await;
                Err(CaptureError::DeviceError(
                    "capture produced an empty file".to_string(),
                ))
            }
            Err(e) => Err(CaptureError::DeviceError(format!(
                "capture produced no file: {e}"
            ))),
        }
    }
}
