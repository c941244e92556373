//! The reed switch in the mailbox door, and the status LED on the board.
//!
//! Default wiring: 3v3 (physical pin 1) to a normally open reed switch, and
//! from the switch to GPIO 22 with the internal pull-down enabled. With the
//! magnet next to the switch (door shut) the pin reads high.

use std::time::Duration;

use anyhow::Error;
use log::{info, warn};
use tokio::time::{sleep, Instant};

#[cfg(feature = "pi")]
use rppal::gpio::{Gpio, InputPin, OutputPin};

use crate::{
    config::{Level, Pin, ReedSwitchConfig},
    error::SensorError,
    watchdog::Watchdog,
};

/// Anything that can tell whether the mailbox door is shut.
pub trait DoorSensor {
    fn door_closed(&mut self) -> Result<bool, SensorError>;
}

#[cfg(feature = "pi")]
pub struct ReedSwitch {
    pin: InputPin,
    closed_level: Level,
}

#[cfg(not(feature = "pi"))]
pub struct ReedSwitch {
    warned: bool,
}

impl ReedSwitch {
    pub fn init(config: &ReedSwitchConfig) -> Result<Self, Error> {
        config.pin.check()?;
        let pin = config.pin.gpio();
        info!(
            "Reed switch: initializing on GPIO {} (closed reads {:?})",
            pin.0, config.closed_level
        );

        #[cfg(feature = "pi")]
        {
            let pin = Gpio::new()?.get(pin.0)?;
            // Pull away from the level the closed switch drives the pin to
            let pin = match config.closed_level {
                Level::High => pin.into_input_pulldown(),
                Level::Low => pin.into_input_pullup(),
            };

            Ok(Self {
                pin,
                closed_level: config.closed_level,
            })
        }

        #[cfg(not(feature = "pi"))]
        {
            Ok(Self { warned: false })
        }
    }
}

impl DoorSensor for ReedSwitch {
    #[cfg(feature = "pi")]
    fn door_closed(&mut self) -> Result<bool, SensorError> {
        Ok(level_means_closed(self.pin.is_high(), self.closed_level))
    }

    #[cfg(not(feature = "pi"))]
    fn door_closed(&mut self) -> Result<bool, SensorError> {
        if !self.warned {
            warn!("Reed switch: GPIO is not supported on this platform, reporting closed");
            self.warned = true;
        }
        Ok(true)
    }
}

/// Translate a pin reading into a door state for the given polarity
pub fn level_means_closed(pin_high: bool, closed_level: Level) -> bool {
    match closed_level {
        Level::High => pin_high,
        Level::Low => !pin_high,
    }
}

/// Wait up to `hold` for a freshly opened door to shut again, feeding the
/// watchdog once a second. Returns true if the door closed before the hold
/// ran out.
pub async fn hold_while_open<S: DoorSensor>(
    hold: Duration,
    sensor: &mut S,
    watchdog: &Watchdog,
) -> bool {
    let started = Instant::now();
    while started.elapsed() < hold {
        sleep(Duration::from_secs(1).min(hold.saturating_sub(started.elapsed()))).await;
        watchdog.feed();
        if matches!(sensor.door_closed(), Ok(true)) {
            info!("Mailbox: door closed during hold");
            return true;
        }
    }
    false
}

/// The on-board LED, lit while the network is up.
#[cfg(feature = "pi")]
pub struct StatusLed {
    pin: Option<OutputPin>,
}

#[cfg(not(feature = "pi"))]
#[allow(dead_code)]
pub struct StatusLed {
    pin: Option<()>,
}

impl StatusLed {
    pub fn init(pin: Option<&Pin>) -> Result<Self, Error> {
        let Some(pin) = pin else {
            return Ok(Self::none());
        };
        pin.check()?;
        let pin = pin.gpio();
        info!("Status LED: initializing on GPIO {}", pin.0);

        #[cfg(feature = "pi")]
        {
            let mut pin = Gpio::new()?.get(pin.0)?.into_output();
            pin.set_low();
            Ok(Self { pin: Some(pin) })
        }

        #[cfg(not(feature = "pi"))]
        {
            Ok(Self { pin: Some(()) })
        }
    }

    pub fn none() -> Self {
        Self { pin: None }
    }

    #[allow(unused_variables)]
    pub fn set(&mut self, on: bool) {
        #[cfg(feature = "pi")]
        if let Some(pin) = self.pin.as_mut() {
            match on {
                true => pin.set_high(),
                false => pin.set_low(),
            }
        }
    }
}
