use std::time::Duration;

use log::{debug, warn};
use mac_address::MacAddress;
use tokio::time::timeout;

use crate::bluetooth::BluetoothControl;
use crate::state::ConnectionState;

/// Connection probe and reconnect trigger for one device.
///
/// Every call is bounded by `timeout`, and neither operation fails: a probe
/// that errors or times out reports `Disconnected`, a trigger that fails is
/// logged and dropped.
pub struct DeviceLink<B> {
    backend: B,
    device: MacAddress,
    timeout: Duration,
}

impl<B: BluetoothControl> DeviceLink<B> {
    pub fn new(backend: B, device: MacAddress, timeout: Duration) -> Self {
        DeviceLink {
            backend,
            device,
            timeout,
        }
    }

    pub fn device(&self) -> &MacAddress {
        &self.device
    }

    pub async fn probe(&self) -> ConnectionState {
        match timeout(self.timeout, self.backend.is_connected(&self.device)).await {
            Ok(Ok(connected)) => ConnectionState::from(connected),
            Ok(Err(err)) => {
                warn!("Could not query {}: {:#}", self.device, err);
                ConnectionState::Disconnected
            }
            Err(_) => {
                warn!(
                    "Querying {} timed out after {:?}",
                    self.device, self.timeout
                );
                ConnectionState::Disconnected
            }
        }
    }

    pub async fn trigger(&self) {
        match timeout(self.timeout, self.backend.connect(&self.device)).await {
            Ok(Ok(())) => debug!("Connect request for {} accepted", self.device),
            Ok(Err(err)) => warn!("Connect request for {} failed: {:#}", self.device, err),
            Err(_) => warn!(
                "Connect request for {} timed out after {:?}",
                self.device, self.timeout
            ),
        }
    }

    #[cfg(test)]
    pub fn backend(&self) -> &B {
        &self.backend
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    use anyhow::anyhow;

    use super::*;

    #[derive(Clone, Copy, Debug)]
    pub enum Reply {
        Connected,
        Disconnected,
        Fail,
        Hang,
    }

    /// Scripted backend: probe replies are consumed in order, the last one repeats.
    #[derive(Default)]
    pub struct FakeBluetooth {
        replies: RefCell<VecDeque<Reply>>,
        pub probes: Cell<usize>,
        pub connects: Cell<usize>,
        pub fail_connect: Cell<bool>,
        pub hang_connect: Cell<bool>,
    }

    impl FakeBluetooth {
        pub fn new(replies: &[Reply]) -> Self {
            FakeBluetooth {
                replies: RefCell::new(replies.iter().copied().collect()),
                ..Default::default()
            }
        }

        pub fn script(&self, replies: &[Reply]) {
            *self.replies.borrow_mut() = replies.iter().copied().collect();
        }

        fn next_reply(&self) -> Reply {
            let mut replies = self.replies.borrow_mut();
            if replies.len() > 1 {
                replies.pop_front().unwrap()
            } else {
                replies.front().copied().unwrap_or(Reply::Disconnected)
            }
        }
    }

    impl BluetoothControl for FakeBluetooth {
        async fn is_connected(&self, _device: &MacAddress) -> anyhow::Result<bool> {
            self.probes.set(self.probes.get() + 1);
            match self.next_reply() {
                Reply::Connected => Ok(true),
                Reply::Disconnected => Ok(false),
                Reply::Fail => Err(anyhow!("bluetoothctl exited with 1")),
                Reply::Hang => std::future::pending().await,
            }
        }

        async fn connect(&self, _device: &MacAddress) -> anyhow::Result<()> {
            self.connects.set(self.connects.get() + 1);
            if self.hang_connect.get() {
                std::future::pending::<()>().await;
            }
            if self.fail_connect.get() {
                return Err(anyhow!("connect failed"));
            }
            Ok(())
        }
    }

    pub fn device() -> MacAddress {
        "DA:FE:25:0E:EE:19".parse().unwrap()
    }
}
