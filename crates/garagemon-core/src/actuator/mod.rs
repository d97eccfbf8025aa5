//! The door actuator: one capability, `activate`, over two backends.
//!
//! ```text
//! ActuatorConfig ──acquire──▶ Actuator { Backend::Direct | Backend::Remote }
//!                                   │
//!                         activate() (single-flight gate)
//! ```

pub mod direct;
pub mod remote;

pub use direct::{DirectActuator, PulseSpec};
pub use remote::{RemoteActuator, REMOTE_TIMEOUT};

use crate::config::{ActuatorConfig, ConcurrencyPolicy, Mode};
use crate::error::{ActivationError, GarageError, Result};
use crate::gpio::SysfsPin;
use tokio::sync::Mutex;

#[derive(Debug)]
pub enum Backend {
    Direct(DirectActuator),
    Remote(RemoteActuator),
}

#[derive(Debug)]
pub struct Actuator {
    backend: Backend,
    policy: ConcurrencyPolicy,
    in_flight: Mutex<()>,
}

impl Actuator {
    pub fn new(backend: Backend, policy: ConcurrencyPolicy) -> Self {
        Self {
            backend,
            policy,
            in_flight: Mutex::new(()),
        }
    }

    /// Acquire the backend's resources: open the relay GPIO, or run the
    /// remote self-check. Any failure here is fatal.
    pub async fn acquire(config: &ActuatorConfig, policy: ConcurrencyPolicy) -> Result<Self> {
        let backend = match config {
            ActuatorConfig::Direct(direct) => {
                let pin = direct.pin;
                let active_low = direct.active_low;
                let actuator = tokio::task::spawn_blocking(move || {
                    let sysfs = SysfsPin::open(pin)?;
                    DirectActuator::new(Box::new(sysfs), active_low, PulseSpec::RELAY)
                })
                .await
                .map_err(|e| GarageError::Gpio {
                    pin,
                    source: std::io::Error::other(format!("task join error: {e}")),
                })?
                .map_err(|source| GarageError::Gpio { pin, source })?;
                tracing::info!(pin, active_low, "relay GPIO ready");
                Backend::Direct(actuator)
            }
            ActuatorConfig::Remote(remote) => {
                let actuator = RemoteActuator::new(remote.clone());
                actuator.self_check().await?;
                Backend::Remote(actuator)
            }
        };
        Ok(Self::new(backend, policy))
    }

    pub fn mode(&self) -> Mode {
        match self.backend {
            Backend::Direct(_) => Mode::Hardware,
            Backend::Remote(_) => Mode::Hubitat,
        }
    }

    pub fn policy(&self) -> ConcurrencyPolicy {
        self.policy
    }

    pub async fn activate(&self) -> std::result::Result<(), ActivationError> {
        let _gate = match self.policy {
            ConcurrencyPolicy::Reject => self
                .in_flight
                .try_lock()
                .map_err(|_| ActivationError::Busy)?,
            ConcurrencyPolicy::Queue => self.in_flight.lock().await,
        };

        tracing::info!("Activating!");
        match &self.backend {
            Backend::Direct(direct) => {
                tracing::debug!("Hardware action: pulsing relay...");
                direct.pulse().await;
                Ok(())
            }
            Backend::Remote(remote) => {
                tracing::debug!("Hubitat action...");
                remote.activate().await
            }
        }
    }

    /// Leave the hardware in its safe state. Waits out any pulse still running.
    pub async fn shutdown(&self) {
        let _gate = self.in_flight.lock().await;
        if let Backend::Direct(direct) = &self.backend {
            direct.shutdown();
            tracing::info!("relay forced inactive and released");
        }
    }
}
