use std::future::Future;

use log::{debug, info, trace, warn};
use tokio::time::{Instant, MissedTickBehavior, interval};

use crate::bluetooth::BluetoothControl;
use crate::config::MonitorConfig;
use crate::debounce::Debouncer;
use crate::gpio::DigitalIo;
use crate::link::DeviceLink;
use crate::state::{ButtonState, ConnectionState};

/// Keeps the LED in line with the device's connection state and turns button
/// presses into reconnect requests.
pub struct Reconciler<B, IO> {
    config: MonitorConfig,
    link: DeviceLink<B>,
    io: IO,
    debouncer: Debouncer,
    last_state: ConnectionState,
}

impl<B: BluetoothControl, IO: DigitalIo> Reconciler<B, IO> {
    pub fn new(config: MonitorConfig, backend: B, io: IO) -> Self {
        let link = DeviceLink::new(backend, config.device, config.command_timeout);
        let debouncer = Debouncer::new(config.debounce_interval);
        Reconciler {
            config,
            link,
            io,
            debouncer,
            last_state: ConnectionState::Unknown,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.last_state
    }

    /// Runs one tick every poll interval until `shutdown` completes.
    ///
    /// Shutdown is observed between ticks, so a tick in progress always
    /// finishes. The initial connection attempt is abandoned on shutdown.
    pub async fn run(&mut self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);

        if self.config.connect_on_start {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    debug!("Stopping during initial connection attempt");
                    return;
                }
                _ = self.initial_connect() => {}
            }
        }

        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    debug!("Stopping monitor loop");
                    break;
                }
                _ = ticker.tick() => self.tick(Instant::now()).await,
            }
        }
    }

    async fn initial_connect(&self) {
        info!("Attempting initial connection to {}", self.link.device());
        self.link.trigger().await;
        if self.link.probe().await.is_connected() {
            info!("Connected to {}", self.link.device());
        }
    }

    pub async fn tick(&mut self, now: Instant) {
        let button = match self.io.read_button() {
            Ok(pressed) => ButtonState::from(pressed),
            Err(err) => {
                warn!("Could not read button: {:#}", err);
                ButtonState::Released
            }
        };

        if self.debouncer.sample(button, now).is_some() {
            info!("Button pressed: reconnecting...");
            if self.link.probe().await.is_connected() {
                info!("{} is already connected", self.link.device());
            } else {
                info!("Connecting to {}", self.link.device());
                self.link.trigger().await;
            }
        }

        let current = self.link.probe().await;
        if current == self.last_state {
            trace!("{} still {}", self.link.device(), current);
            return;
        }

        match self.io.write_led(current.is_connected()) {
            Ok(()) => {
                info!("Bluetooth device {} {}", self.link.device(), current);
                self.last_state = current;
            }
            // last_state stays put so the next tick writes again
            Err(err) => warn!("Could not update LED: {:#}", err),
        }
    }
}
