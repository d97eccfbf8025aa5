//! Process lifecycle: acquire hardware, serve, drain, release.
//!
//! ```text
//! Starting ──grace elapsed──▶ Live ──shutdown──▶ Draining ──tasks joined──▶ Stopped
//!     └──────────────shutdown during grace──────────▲
//! ```
//!
//! The coordinator is the only owner of the phase. Everything it spawns
//! watches the shared [`Shutdown`] signal and returns when it fires.

use crate::identity::IdentityLookup;
use crate::listener::SupervisedListener;
use axum::serve::ListenerExt;
use crate::state::AppState;
use garagemon_core::actuator::Actuator;
use garagemon_core::config::{ActuatorConfig, Config};
use garagemon_core::indicator::StatusIndicator;
use garagemon_core::lifecycle::{Lifecycle, LifecycleWatch, Phase, Shutdown};
use garagemon_core::GarageError;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinSet;

/// Startup delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// How long the listener must survive before the process counts as up.
    pub grace: Duration,
    /// Pause between the startup blink and the background heartbeat.
    pub live_pause: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(3),
            live_pause: Duration::from_secs(1),
        }
    }
}

pub struct Coordinator {
    lifecycle: Lifecycle,
    actuator: Arc<Actuator>,
    indicator: Arc<StatusIndicator>,
    background_blink: bool,
    state: AppState,
    timings: Timings,
}

impl Coordinator {
    /// Validate the config and take hold of every resource the mode needs.
    /// Anything already acquired is released again if a later step fails.
    pub async fn acquire(config: Config) -> Result<Self, GarageError> {
        let actuator_config = config.actuator_config()?;
        let actuator = Actuator::acquire(&actuator_config, config.activation.concurrent).await?;

        let indicator = match StatusIndicator::acquire(&actuator_config) {
            Ok(indicator) => indicator,
            Err(e) => {
                actuator.shutdown().await;
                return Err(e);
            }
        };
        let background_blink =
            matches!(&actuator_config, ActuatorConfig::Direct(d) if d.blink_enabled);

        Ok(Self::from_parts(config, actuator, indicator, background_blink))
    }

    /// Assemble a coordinator from resources acquired elsewhere.
    pub fn from_parts(
        config: Config,
        actuator: Actuator,
        indicator: StatusIndicator,
        background_blink: bool,
    ) -> Self {
        let actuator = Arc::new(actuator);
        let state = AppState::new(actuator.clone(), Arc::new(config));
        Self {
            lifecycle: Lifecycle::new(),
            actuator,
            indicator: Arc::new(indicator),
            background_blink,
            state,
            timings: Timings::default(),
        }
    }

    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    pub fn with_identity(mut self, identity: Arc<dyn IdentityLookup>) -> Self {
        self.state = self.state.with_identity(identity);
        self
    }

    pub fn watch(&self) -> LifecycleWatch {
        self.lifecycle.watch()
    }

    /// Request a graceful stop from outside the process signal path.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.lifecycle.shutdown().clone()
    }

    /// Bind `addr` and run until `signal` resolves or the listener dies.
    pub async fn serve<S>(self, addr: &str, signal: S) -> Result<(), GarageError>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        match TcpListener::bind(addr).await {
            Ok(listener) => self.serve_on(listener, signal).await,
            Err(source) => {
                tracing::error!("Could not listen on {addr}: {source}");
                self.lifecycle.shutdown().trigger();
                self.finish().await;
                Err(GarageError::Bind {
                    addr: addr.to_string(),
                    source,
                })
            }
        }
    }

    /// Run on a pre-bound listener. Useful when the port is 0 and the
    /// caller needs to know which one the OS picked.
    pub async fn serve_on<S>(self, listener: TcpListener, signal: S) -> Result<(), GarageError>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        let addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(source) => {
                self.lifecycle.shutdown().trigger();
                self.finish().await;
                return Err(GarageError::Bind {
                    addr: "pre-bound listener".to_string(),
                    source,
                });
            }
        };
        tracing::info!("Serving HTTP on http://{addr}");

        let shutdown = self.lifecycle.shutdown().clone();
        let mut tasks: JoinSet<Option<GarageError>> = JoinSet::new();

        tasks.spawn({
            let shutdown = shutdown.clone();
            async move {
                tokio::select! {
                    _ = signal => {
                        tracing::info!("Caught interrupt; shutting down gracefully");
                        shutdown.trigger();
                    }
                    _ = shutdown.wait() => {}
                }
                None
            }
        });

        let app = crate::build_router(self.state.clone());
        tasks.spawn({
            let shutdown = shutdown.clone();
            async move {
                let graceful = {
                    let shutdown = shutdown.clone();
                    async move { shutdown.wait().await }
                };
                let listener = SupervisedListener::new(listener, shutdown.clone());
                let failure = listener.failure();
                let served = axum::serve(
                    listener.tap_io(|_| {}),
                    app.into_make_service_with_connect_info::<SocketAddr>(),
                )
                .with_graceful_shutdown(graceful)
                .await;
                shutdown.trigger();
                let source = match served {
                    Ok(()) => failure.take(),
                    Err(e) => Some(e),
                };
                source.map(|source| GarageError::Listener { addr, source })
            }
        });

        let survived_grace = tokio::select! {
            _ = tokio::time::sleep(self.timings.grace) => true,
            _ = shutdown.wait() => false,
        };

        if survived_grace && self.lifecycle.advance(Phase::Live) {
            tracing::info!("garagemon startup OK");
            self.indicator.startup_blink().await;
            tokio::time::sleep(self.timings.live_pause).await;
            if self.background_blink && self.indicator.is_enabled() {
                let indicator = self.indicator.clone();
                let shutdown = shutdown.clone();
                tasks.spawn(async move {
                    indicator.background_blink(shutdown).await;
                    None
                });
            }
        }

        shutdown.wait().await;
        self.lifecycle.advance(Phase::Draining);
        tracing::info!("Draining");

        let mut failure = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(err)) => {
                    failure.get_or_insert(err);
                }
                Ok(None) => {}
                Err(e) => tracing::error!("task failed: {e}"),
            }
        }

        self.finish().await;
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn finish(&self) {
        self.lifecycle.advance(Phase::Draining);
        self.lifecycle.advance(Phase::Stopped);
        self.indicator.set_state(false);
        self.actuator.shutdown().await;
        tracing::info!("garagemon done");
    }
}
