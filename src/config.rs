use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use log::LevelFilter;
use mac_address::MacAddress;

/// Lights an LED while a Bluetooth device is connected and reconnects it on a button press
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Hardware address of the device to watch, e.g. DA:FE:25:0E:EE:19
    #[arg(short, long)]
    pub device: MacAddress,

    /// Seconds between connection checks
    #[arg(long, default_value = "10", value_parser = parse_interval)]
    pub poll_interval: Duration,

    /// Seconds during which further button presses are ignored
    #[arg(long, default_value = "1", value_parser = parse_seconds)]
    pub debounce_interval: Duration,

    /// Upper bound in seconds for a single Bluetooth query or connect request
    #[arg(long, default_value = "5", value_parser = parse_interval)]
    pub command_timeout: Duration,

    /// GPIO character device
    #[arg(long, default_value = "/dev/gpiochip0")]
    pub chip: PathBuf,

    /// Line offset driving the status LED
    #[arg(long, default_value_t = 25)]
    pub led_line: u32,

    /// Line offset of the reconnect button; the button is disabled when omitted
    #[arg(long)]
    pub button_line: Option<u32>,

    /// Treat a high button level as pressed (default: active-low with pull-up)
    #[arg(long)]
    pub button_active_high: bool,

    /// How to talk to the Bluetooth stack
    #[arg(long, value_enum, default_value_t = Backend::Bluetoothctl)]
    pub backend: Backend,

    /// Program used by the bluetoothctl backend
    #[arg(long, default_value = "bluetoothctl")]
    pub bluetoothctl: PathBuf,

    /// Attempt one connection before the first check
    #[arg(long)]
    pub connect_on_start: bool,

    /// More logging; repeat for trace output
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Shell out to `bluetoothctl`
    Bluetoothctl,
    /// Talk to BlueZ over D-Bus
    Bluez,
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub device: MacAddress,
    pub poll_interval: Duration,
    pub debounce_interval: Duration,
    pub command_timeout: Duration,
    pub connect_on_start: bool,
}

#[derive(Debug, Clone)]
pub struct GpioConfig {
    pub chip: PathBuf,
    pub led_line: u32,
    pub button: Option<ButtonConfig>,
}

#[derive(Debug, Clone, Copy)]
pub struct ButtonConfig {
    pub line: u32,
    pub active_low: bool,
}

impl Args {
    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            device: self.device,
            poll_interval: self.poll_interval,
            debounce_interval: self.debounce_interval,
            command_timeout: self.command_timeout,
            connect_on_start: self.connect_on_start,
        }
    }

    pub fn gpio_config(&self) -> GpioConfig {
        GpioConfig {
            chip: self.chip.clone(),
            led_line: self.led_line,
            button: self.button_line.map(|line| ButtonConfig {
                line,
                active_low: !self.button_active_high,
            }),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

fn parse_seconds(value: &str) -> Result<Duration, String> {
    let seconds: f64 = value
        .parse()
        .map_err(|_| format!("`{value}` is not a number of seconds"))?;
    Duration::try_from_secs_f64(seconds).map_err(|_| format!("`{value}` is not a valid duration"))
}

fn parse_interval(value: &str) -> Result<Duration, String> {
    let interval = parse_seconds(value)?;
    if interval.is_zero() {
        return Err("interval must be greater than zero".to_string());
    }
    Ok(interval)
}
