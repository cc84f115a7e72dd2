use clap::Parser;
use log::info;
use tokio::signal::unix::{SignalKind, signal};

mod bluetooth;
mod btle;
mod config;
mod debounce;
mod gpio;
mod link;
mod reconciler;
mod state;

use crate::bluetooth::{BluetoothControl, Bluetoothctl};
use crate::config::{Args, Backend};
use crate::gpio::GpioPort;
use crate::reconciler::Reconciler;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut logger = pretty_env_logger::formatted_timed_builder();
    logger.filter_level(args.log_level());
    if let Ok(filters) = std::env::var("RUST_LOG") {
        logger.parse_filters(&filters);
    }
    logger.init();

    let config = args.monitor_config();
    info!(
        "Watching {} every {:?} (debounce {:?})",
        config.device, config.poll_interval, config.debounce_interval
    );

    // Lines stay claimed until the reconciler is dropped
    let port = GpioPort::open(&args.gpio_config())?;

    match args.backend {
        Backend::Bluetoothctl => {
            let backend = Bluetoothctl::new(&args.bluetoothctl, config.command_timeout);
            monitor(Reconciler::new(config, backend, port)).await
        }
        Backend::Bluez => {
            let backend = btle::BtleControl::new().await?;
            monitor(Reconciler::new(config, backend, port)).await
        }
    }
}

async fn monitor<B: BluetoothControl>(mut reconciler: Reconciler<B, GpioPort>) -> anyhow::Result<()> {
    let mut terminate = signal(SignalKind::terminate())?;
    let shutdown = async {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("Received interrupt"),
            _ = terminate.recv() => info!("Received terminate signal"),
        }
    };

    reconciler.run(shutdown).await;
    info!("Exiting with device {}", reconciler.state());

    Ok(())
}
