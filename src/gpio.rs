use anyhow::Context as _;
use gpiocdev::Request;
use gpiocdev::line::{Bias, Value};
use log::{debug, info, warn};

use crate::config::{ButtonConfig, GpioConfig};

/// The button input and LED output the monitor drives.
pub trait DigitalIo {
    /// Samples the button once. `true` means pressed, polarity is handled by the port.
    fn read_button(&mut self) -> anyhow::Result<bool>;

    /// Sets the LED. Writing the current value again is allowed and changes nothing.
    fn write_led(&mut self, on: bool) -> anyhow::Result<()>;
}

struct Line {
    offset: u32,
    request: Request,
}

/// Lines claimed on a GPIO character device.
///
/// The lines stay claimed for as long as the port lives and are handed back
/// to the kernel when it is dropped, with the LED switched off first.
pub struct GpioPort {
    led: Line,
    button: Option<Line>,
}

impl GpioPort {
    pub fn open(config: &GpioConfig) -> anyhow::Result<Self> {
        let chip = config.chip.display();

        let led = Request::builder()
            .on_chip(&config.chip)
            .with_consumer("bt-led")
            .with_line(config.led_line)
            .as_output(Value::Inactive)
            .request()
            .with_context(|| format!("failed to claim LED line {} on {chip}", config.led_line))?;
        let led = Line {
            offset: config.led_line,
            request: led,
        };

        let button = match config.button {
            Some(button) => Some(
                Self::request_button(config, button)
                    .with_context(|| format!("failed to claim button line {} on {chip}", button.line))?,
            ),
            None => {
                info!("No button line configured, running LED only");
                None
            }
        };

        debug!("Claimed GPIO lines on {chip}");
        Ok(GpioPort { led, button })
    }

    fn request_button(config: &GpioConfig, button: ButtonConfig) -> anyhow::Result<Line> {
        let mut builder = Request::builder();
        builder
            .on_chip(&config.chip)
            .with_consumer("bt-button")
            .with_line(button.line)
            .as_input();
        if button.active_low {
            builder.with_bias(Bias::PullUp).as_active_low();
        } else {
            builder.with_bias(Bias::PullDown);
        }
        Ok(Line {
            offset: button.line,
            request: builder.request()?,
        })
    }
}

impl DigitalIo for GpioPort {
    fn read_button(&mut self) -> anyhow::Result<bool> {
        let Some(button) = &self.button else {
            return Ok(false);
        };
        let value = button
            .request
            .value(button.offset)
            .with_context(|| format!("failed to read button line {}", button.offset))?;
        Ok(value == Value::Active)
    }

    fn write_led(&mut self, on: bool) -> anyhow::Result<()> {
        let value = if on { Value::Active } else { Value::Inactive };
        self.led
            .request
            .set_value(self.led.offset, value)
            .with_context(|| format!("failed to set LED line {}", self.led.offset))?;
        Ok(())
    }
}

impl Drop for GpioPort {
    fn drop(&mut self) {
        if let Err(err) = self.write_led(false) {
            warn!("Could not switch LED off: {:#}", err);
        }
        debug!("Releasing GPIO lines");
    }
}
