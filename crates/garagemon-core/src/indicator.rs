//! Status LED. Purely diagnostic: every write is best-effort and an
//! unconfigured indicator turns every operation into a no-op.

use crate::config::ActuatorConfig;
use crate::error::{GarageError, Result};
use crate::lifecycle::Shutdown;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where indicator state ends up.
pub trait IndicatorSink: Send + Sync {
    fn set(&self, on: bool) -> io::Result<()>;
}

// ---------------------------------------------------------------------------
// LedFile
// ---------------------------------------------------------------------------

/// A Linux LED class device, e.g. `/sys/class/leds/led0`.
#[derive(Debug)]
pub struct LedFile {
    dir: PathBuf,
}

impl LedFile {
    /// Take manual control of the LED by switching its trigger to `gpio`.
    pub fn setup(dir: &Path) -> io::Result<Self> {
        fs::write(dir.join("trigger"), "gpio")?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }
}

impl IndicatorSink for LedFile {
    fn set(&self, on: bool) -> io::Result<()> {
        let brightness = if on { "255" } else { "0" };
        fs::write(self.dir.join("brightness"), brightness)
    }
}

// ---------------------------------------------------------------------------
// BlinkPattern
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlinkPattern {
    pub on: Duration,
    pub off: Duration,
}

impl BlinkPattern {
    pub const STARTUP: Self = Self {
        on: Duration::from_millis(100),
        off: Duration::from_millis(100),
    };

    pub const BACKGROUND: Self = Self {
        on: Duration::from_millis(1200),
        off: Duration::from_millis(1200),
    };

    pub fn cycle(&self) -> Duration {
        self.on + self.off
    }
}

pub const STARTUP_BLINKS: usize = 4;

// ---------------------------------------------------------------------------
// StatusIndicator
// ---------------------------------------------------------------------------

pub struct StatusIndicator {
    sink: Option<Box<dyn IndicatorSink>>,
}

impl StatusIndicator {
    pub fn new(sink: impl IndicatorSink + 'static) -> Self {
        Self {
            sink: Some(Box::new(sink)),
        }
    }

    pub fn disabled() -> Self {
        Self { sink: None }
    }

    /// Build the indicator for a deployment. Only the hardware backend has
    /// a local LED; failing to take control of it is fatal.
    pub fn acquire(config: &ActuatorConfig) -> Result<Self> {
        match config {
            ActuatorConfig::Direct(direct) => match &direct.led_path {
                Some(path) => {
                    let led = LedFile::setup(path).map_err(GarageError::IndicatorSetup)?;
                    Ok(Self::new(led))
                }
                None => Ok(Self::disabled()),
            },
            ActuatorConfig::Remote(_) => Ok(Self::disabled()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    pub fn set_state(&self, on: bool) {
        if let Some(sink) = &self.sink {
            if let Err(e) = sink.set(on) {
                tracing::warn!("Setting LED state: {e}");
            }
        }
    }

    async fn cycle(&self, pattern: BlinkPattern) {
        self.set_state(true);
        tokio::time::sleep(pattern.on).await;
        self.set_state(false);
        tokio::time::sleep(pattern.off).await;
    }

    /// Visible heartbeat run once the controller has come up.
    pub async fn startup_blink(&self) {
        if !self.is_enabled() {
            return;
        }
        for _ in 0..STARTUP_BLINKS {
            self.cycle(BlinkPattern::STARTUP).await;
        }
    }

    /// Blink until `shutdown` fires. Cancellation is only observed between
    /// full on/off cycles, so the LED always ends up off.
    pub async fn background_blink(&self, shutdown: Shutdown) {
        if !self.is_enabled() {
            return;
        }
        while !shutdown.is_triggered() {
            self.cycle(BlinkPattern::BACKGROUND).await;
        }
        tracing::debug!("background blink stopped");
    }
}

impl std::fmt::Debug for StatusIndicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusIndicator")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    #[derive(Clone, Default)]
    struct RecordingSink {
        writes: Arc<Mutex<Vec<(bool, Instant)>>>,
    }

    impl RecordingSink {
        fn states(&self) -> Vec<bool> {
            self.writes.lock().unwrap().iter().map(|(on, _)| *on).collect()
        }
    }

    impl IndicatorSink for RecordingSink {
        fn set(&self, on: bool) -> io::Result<()> {
            self.writes.lock().unwrap().push((on, Instant::now()));
            Ok(())
        }
    }

    struct FailingSink;

    impl IndicatorSink for FailingSink {
        fn set(&self, _on: bool) -> io::Result<()> {
            Err(io::Error::other("read-only filesystem"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn startup_blink_does_four_cycles() {
        let sink = RecordingSink::default();
        let indicator = StatusIndicator::new(sink.clone());

        let start = Instant::now();
        indicator.startup_blink().await;

        assert_eq!(
            sink.states(),
            vec![true, false, true, false, true, false, true, false]
        );
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(800), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(810), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn unconfigured_startup_blink_returns_immediately() {
        let indicator = StatusIndicator::disabled();
        let start = Instant::now();
        indicator.startup_blink().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn write_failures_are_swallowed() {
        let indicator = StatusIndicator::new(FailingSink);
        indicator.set_state(true);
        indicator.startup_blink().await;
    }

    #[tokio::test(start_paused = true)]
    async fn background_blink_finishes_current_cycle_after_shutdown() {
        let sink = RecordingSink::default();
        let indicator = Arc::new(StatusIndicator::new(sink.clone()));
        let shutdown = Shutdown::new();

        let task = {
            let indicator = indicator.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move { indicator.background_blink(shutdown).await })
        };

        // Mid-way through the second cycle's "on" phase.
        tokio::time::sleep(Duration::from_millis(3000)).await;
        let signalled = Instant::now();
        shutdown.trigger();
        task.await.unwrap();

        let latency = signalled.elapsed();
        assert!(latency <= BlinkPattern::BACKGROUND.cycle(), "{latency:?}");
        assert!(latency >= Duration::from_millis(1800), "{latency:?}");
        assert_eq!(sink.states(), vec![true, false, true, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn background_blink_exits_immediately_if_already_cancelled() {
        let sink = RecordingSink::default();
        let indicator = StatusIndicator::new(sink.clone());
        let shutdown = Shutdown::new();
        shutdown.trigger();
        indicator.background_blink(shutdown).await;
        assert!(sink.states().is_empty());
    }

    #[test]
    fn led_file_writes_trigger_and_brightness() {
        let dir = tempfile::TempDir::new().unwrap();
        let led = LedFile::setup(dir.path()).unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("trigger")).unwrap(),
            "gpio"
        );
        led.set(true).unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("brightness")).unwrap(),
            "255"
        );
        led.set(false).unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("brightness")).unwrap(),
            "0"
        );
    }

    #[test]
    fn acquire_without_led_path_is_disabled() {
        let config = ActuatorConfig::Direct(crate::config::DirectConfig {
            pin: 17,
            active_low: false,
            led_path: None,
            blink_enabled: true,
        });
        assert!(!StatusIndicator::acquire(&config).unwrap().is_enabled());
    }

    #[test]
    fn acquire_with_unwritable_led_is_fatal() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = ActuatorConfig::Direct(crate::config::DirectConfig {
            pin: 17,
            active_low: false,
            led_path: Some(dir.path().join("missing")),
            blink_enabled: false,
        });
        let err = StatusIndicator::acquire(&config).unwrap_err();
        assert!(matches!(err, GarageError::IndicatorSetup(_)));
    }

    #[test]
    fn led_setup_fails_on_missing_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(LedFile::setup(&dir.path().join("led0")).is_err());
    }
}
