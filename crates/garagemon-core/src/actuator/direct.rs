use crate::gpio::{Level, OutputPin};
use std::io;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Timing of one simulated button press on the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseSpec {
    pub active: Duration,
    pub settle: Duration,
}

impl PulseSpec {
    pub const RELAY: Self = Self {
        active: Duration::from_millis(500),
        settle: Duration::from_millis(200),
    };

    pub fn total(&self) -> Duration {
        self.active + self.settle
    }
}

/// Relay wired straight to a GPIO output.
pub struct DirectActuator {
    pin: Mutex<Box<dyn OutputPin>>,
    active_low: bool,
    pulse: PulseSpec,
}

impl DirectActuator {
    /// Take ownership of `pin` and drive it to the inactive level.
    pub fn new(mut pin: Box<dyn OutputPin>, active_low: bool, pulse: PulseSpec) -> io::Result<Self> {
        pin.write(Level::for_state(false, active_low))?;
        Ok(Self {
            pin: Mutex::new(pin),
            active_low,
            pulse,
        })
    }

    pub fn pulse_spec(&self) -> PulseSpec {
        self.pulse
    }

    fn set_active(&self, active: bool) {
        let level = Level::for_state(active, self.active_low);
        let mut pin = self.pin.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = pin.write(level) {
            tracing::warn!(active, "writing relay pin: {e}");
        }
    }

    /// Press and release. There is no feedback channel, so this cannot fail.
    pub async fn pulse(&self) {
        self.set_active(true);
        {
            // Dropped on the normal path and if the caller abandons us mid-hold.
            let _release = InactiveOnDrop(self);
            tokio::time::sleep(self.pulse.active).await;
        }
        tokio::time::sleep(self.pulse.settle).await;
    }

    /// Force the relay inactive and hand the pin back to the system.
    pub fn shutdown(&self) {
        self.set_active(false);
        let mut pin = self.pin.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = pin.release() {
            tracing::warn!("releasing relay pin: {e}");
        }
    }
}

struct InactiveOnDrop<'a>(&'a DirectActuator);

impl Drop for InactiveOnDrop<'_> {
    fn drop(&mut self) {
        self.0.set_active(false);
    }
}

impl std::fmt::Debug for DirectActuator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectActuator")
            .field("active_low", &self.active_low)
            .field("pulse", &self.pulse)
            .finish_non_exhaustive()
    }
}
