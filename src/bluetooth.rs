use std::path::PathBuf;
use std::process::Output;
use std::time::Duration;

use anyhow::{Context as _, bail};
use log::debug;
use mac_address::MacAddress;
use tokio::process::Command;

/// Access to the host Bluetooth stack for a single device.
///
/// Implementations report failures as errors; turning those into a fail-safe
/// connection state is up to [`crate::link::DeviceLink`].
pub trait BluetoothControl {
    async fn is_connected(&self, device: &MacAddress) -> anyhow::Result<bool>;

    /// Asks the stack to connect. Returning `Ok` does not mean the device is connected.
    async fn connect(&self, device: &MacAddress) -> anyhow::Result<()>;
}

/// Drives BlueZ through the `bluetoothctl` command line tool.
#[derive(Debug, Clone)]
pub struct Bluetoothctl {
    program: PathBuf,
    timeout: Duration,
}

impl Bluetoothctl {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Bluetoothctl {
            program: program.into(),
            timeout,
        }
    }

    async fn run(&self, args: &[String]) -> anyhow::Result<Output> {
        debug!("Running {} {}", self.program.display(), args.join(" "));
        Command::new(&self.program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("failed to run {}", self.program.display()))
    }
}

impl BluetoothControl for Bluetoothctl {
    async fn is_connected(&self, device: &MacAddress) -> anyhow::Result<bool> {
        let output = self.run(&["info".to_string(), device.to_string()]).await?;
        if !output.status.success() {
            bail!(
                "bluetoothctl info {} exited with {}: {}",
                device,
                output.status,
                String::from_utf8_lossy(&output.stdout).trim()
            );
        }
        parse_connected(&String::from_utf8_lossy(&output.stdout))
    }

    async fn connect(&self, device: &MacAddress) -> anyhow::Result<()> {
        // bluetoothctl gives up before the caller's timeout so its own error is reported
        let output = self
            .run(&[
                "--timeout".to_string(),
                inner_timeout_secs(self.timeout).to_string(),
                "connect".to_string(),
                device.to_string(),
            ])
            .await?;
        if !output.status.success() {
            bail!(
                "bluetoothctl connect {} exited with {}: {}",
                device,
                output.status,
                String::from_utf8_lossy(&output.stdout).trim()
            );
        }
        Ok(())
    }
}

/// Whole seconds for `bluetoothctl --timeout`, one less than `timeout` and at least one.
fn inner_timeout_secs(timeout: Duration) -> u64 {
    timeout.as_secs().saturating_sub(1).max(1)
}

/// Reads the `Connected:` property out of `bluetoothctl info` output.
fn parse_connected(info: &str) -> anyhow::Result<bool> {
    for line in info.lines() {
        if let Some(value) = line.trim().strip_prefix("Connected:") {
            return match value.trim() {
                "yes" => Ok(true),
                "no" => Ok(false),
                other => bail!("unexpected Connected value `{other}`"),
            };
        }
    }
    bail!("no Connected property in bluetoothctl output")
}
