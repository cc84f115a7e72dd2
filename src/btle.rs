use anyhow::{Context as _, bail};
use btleplug::api::{BDAddr, Central as _, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use log::{debug, info};
use mac_address::MacAddress;

use crate::bluetooth::BluetoothControl;

/// Talks to BlueZ over D-Bus through the first local adapter.
pub struct BtleControl {
    adapter: Adapter,
}

impl BtleControl {
    pub async fn new() -> anyhow::Result<Self> {
        let manager = Manager::new()
            .await
            .context("failed to connect to the Bluetooth stack")?;

        // get the first bluetooth adapter
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .context("no Bluetooth adapter found")?;
        info!("Using Bluetooth adapter {}", adapter.adapter_info().await?);

        Ok(BtleControl { adapter })
    }

    async fn peripheral(&self, device: &MacAddress) -> anyhow::Result<Option<Peripheral>> {
        let address = BDAddr::from(device.bytes());
        let peripherals = self.adapter.peripherals().await?;
        Ok(peripherals.into_iter().find(|p| p.address() == address))
    }
}

impl BluetoothControl for BtleControl {
    async fn is_connected(&self, device: &MacAddress) -> anyhow::Result<bool> {
        match self.peripheral(device).await? {
            Some(peripheral) => Ok(peripheral.is_connected().await?),
            None => {
                debug!("{device} is not known to the adapter");
                Ok(false)
            }
        }
    }

    async fn connect(&self, device: &MacAddress) -> anyhow::Result<()> {
        match self.peripheral(device).await? {
            Some(peripheral) => Ok(peripheral.connect().await?),
            None => {
                // discovered devices show up in peripherals()
                self.adapter.start_scan(ScanFilter::default()).await?;
                bail!("{device} is not known to the adapter; started a scan")
            }
        }
    }
}
