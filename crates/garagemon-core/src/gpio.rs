//! Output pin port and the Linux sysfs GPIO adapter behind it.
//!
//! The actuator only ever talks to [`OutputPin`]; tests substitute a
//! recording pin, production uses [`SysfsPin`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const SYSFS_GPIO_ROOT: &str = "/sys/class/gpio";

/// Physical signal level on an output pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl Level {
    /// Map a logical active/inactive state onto a level, honouring polarity.
    pub fn for_state(active: bool, active_low: bool) -> Self {
        if active != active_low {
            Level::High
        } else {
            Level::Low
        }
    }
}

/// A single digital output.
pub trait OutputPin: Send {
    fn write(&mut self, level: Level) -> io::Result<()>;

    /// Give the pin back to the system. Called once during teardown.
    fn release(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SysfsPin
// ---------------------------------------------------------------------------

/// udev applies permissions to a freshly exported pin asynchronously.
const EXPORT_SETTLE_ATTEMPTS: u32 = 20;
const EXPORT_SETTLE_DELAY: Duration = Duration::from_millis(5);

/// Labels of the gpiochips whose lines are numbered like the SoC's GPIO pins.
const SOC_CHIP_LABELS: &[&str] = &["pinctrl-bcm2835", "pinctrl-bcm2711", "pinctrl-rp1"];

/// GPIO output driven through `/sys/class/gpio`.
///
/// `pin` is the SoC (BCM) pin number. Sysfs wants the global line number,
/// which is the pin offset from the SoC gpiochip's `base` (512 on recent
/// Raspberry Pi kernels, 0 on older ones).
///
/// Blocking: open and release touch the filesystem and may sleep briefly,
/// call them from `spawn_blocking`.
#[derive(Debug)]
pub struct SysfsPin {
    root: PathBuf,
    pin: u32,
    line: u32,
    exported_by_us: bool,
}

impl SysfsPin {
    pub fn open(pin: u32) -> io::Result<Self> {
        Self::open_at(Path::new(SYSFS_GPIO_ROOT), pin)
    }

    /// Open `pin` under an alternative sysfs root.
    pub fn open_at(root: &Path, pin: u32) -> io::Result<Self> {
        let line = soc_chip_base(root)? + pin;
        let dir = root.join(format!("gpio{line}"));
        let exported_by_us = if dir.is_dir() {
            false
        } else {
            fs::write(root.join("export"), line.to_string())?;
            true
        };

        // From here on, dropping `opened` unexports again on failure.
        let opened = Self {
            root: root.to_path_buf(),
            pin,
            line,
            exported_by_us,
        };

        let direction = dir.join("direction");
        let mut attempt = 0;
        loop {
            match fs::write(&direction, "out") {
                Ok(()) => break,
                Err(e)
                    if exported_by_us
                        && attempt < EXPORT_SETTLE_ATTEMPTS
                        && matches!(
                            e.kind(),
                            io::ErrorKind::PermissionDenied | io::ErrorKind::NotFound
                        ) =>
                {
                    attempt += 1;
                    std::thread::sleep(EXPORT_SETTLE_DELAY);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(opened)
    }

    pub fn pin(&self) -> u32 {
        self.pin
    }

    /// Global sysfs line number backing this pin.
    pub fn line(&self) -> u32 {
        self.line
    }

    fn value_path(&self) -> PathBuf {
        self.root.join(format!("gpio{}", self.line)).join("value")
    }
}

/// Base of the SoC gpiochip under `root`, or 0 when none is labelled as one.
fn soc_chip_base(root: &Path) -> io::Result<u32> {
    for entry in fs::read_dir(root)? {
        let path = entry?.path();
        let is_chip = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("gpiochip"));
        if !is_chip {
            continue;
        }
        let Ok(label) = fs::read_to_string(path.join("label")) else {
            continue;
        };
        if !SOC_CHIP_LABELS.contains(&label.trim()) {
            continue;
        }
        let base = fs::read_to_string(path.join("base"))?;
        return base.trim().parse().map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{}: bad base {:?}: {e}", path.display(), base.trim()),
            )
        });
    }
    Ok(0)
}

impl OutputPin for SysfsPin {
    fn write(&mut self, level: Level) -> io::Result<()> {
        let raw = match level {
            Level::High => "1",
            Level::Low => "0",
        };
        fs::write(self.value_path(), raw)
    }

    fn release(&mut self) -> io::Result<()> {
        if self.exported_by_us {
            fs::write(self.root.join("unexport"), self.line.to_string())?;
            self.exported_by_us = false;
        }
        Ok(())
    }
}

impl Drop for SysfsPin {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::warn!(line = self.line, "unexporting GPIO: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fake_sysfs(pin: u32) -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(format!("gpio{pin}"))).unwrap();
        dir
    }

    #[test]
    fn polarity_mapping() {
        assert_eq!(Level::for_state(true, false), Level::High);
        assert_eq!(Level::for_state(false, false), Level::Low);
        assert_eq!(Level::for_state(true, true), Level::Low);
        assert_eq!(Level::for_state(false, true), Level::High);
    }

    #[test]
    fn open_sets_direction_out() {
        let sysfs = fake_sysfs(17);
        let pin = SysfsPin::open_at(sysfs.path(), 17).unwrap();
        assert_eq!(pin.pin(), 17);
        let direction = std::fs::read_to_string(sysfs.path().join("gpio17/direction")).unwrap();
        assert_eq!(direction, "out");
    }

    #[test]
    fn write_updates_value_file() {
        let sysfs = fake_sysfs(4);
        let mut pin = SysfsPin::open_at(sysfs.path(), 4).unwrap();
        let value = sysfs.path().join("gpio4/value");

        pin.write(Level::High).unwrap();
        assert_eq!(std::fs::read_to_string(&value).unwrap(), "1");
        pin.write(Level::Low).unwrap();
        assert_eq!(std::fs::read_to_string(&value).unwrap(), "0");
    }

    #[test]
    fn already_exported_pin_is_not_unexported() {
        let sysfs = fake_sysfs(4);
        let mut pin = SysfsPin::open_at(sysfs.path(), 4).unwrap();
        pin.release().unwrap();
        assert!(!sysfs.path().join("unexport").exists());
    }

    fn fake_chip(sysfs: &TempDir, name: &str, label: &str, base: u32) {
        let chip = sysfs.path().join(name);
        std::fs::create_dir_all(&chip).unwrap();
        std::fs::write(chip.join("label"), format!("{label}\n")).unwrap();
        std::fs::write(chip.join("base"), format!("{base}\n")).unwrap();
    }

    /// Stand in for the kernel: once `export` is written, create the line's
    /// directory the way sysfs would.
    fn export_on_demand(sysfs: &TempDir, line: u32) -> std::thread::JoinHandle<()> {
        let root = sysfs.path().to_path_buf();
        std::thread::spawn(move || {
            for _ in 0..2000 {
                let written = std::fs::read_to_string(root.join("export")).unwrap_or_default();
                if !written.is_empty() {
                    assert_eq!(written, line.to_string());
                    std::fs::create_dir_all(root.join(format!("gpio{line}"))).unwrap();
                    return;
                }
                std::thread::sleep(Duration::from_millis(1));
            }
            panic!("export never written");
        })
    }

    #[test]
    fn soc_chip_base_offsets_pin() {
        let sysfs = TempDir::new().unwrap();
        fake_chip(&sysfs, "gpiochip512", "pinctrl-bcm2711", 512);
        fake_chip(&sysfs, "gpiochip570", "raspberrypi-exp-gpio", 570);
        std::fs::create_dir_all(sysfs.path().join("gpio529")).unwrap();

        let mut pin = SysfsPin::open_at(sysfs.path(), 17).unwrap();
        assert_eq!(pin.pin(), 17);
        assert_eq!(pin.line(), 529);
        pin.write(Level::High).unwrap();
        assert_eq!(
            std::fs::read_to_string(sysfs.path().join("gpio529/value")).unwrap(),
            "1"
        );
        assert!(!sysfs.path().join("gpio17").exists());
    }

    #[test]
    fn unrelated_chips_leave_base_at_zero() {
        let sysfs = fake_sysfs(17);
        fake_chip(&sysfs, "gpiochip570", "raspberrypi-exp-gpio", 570);
        let pin = SysfsPin::open_at(sysfs.path(), 17).unwrap();
        assert_eq!(pin.line(), 17);
    }

    #[test]
    fn unparsable_chip_base_is_an_error() {
        let sysfs = TempDir::new().unwrap();
        let chip = sysfs.path().join("gpiochip0");
        std::fs::create_dir_all(&chip).unwrap();
        std::fs::write(chip.join("label"), "pinctrl-bcm2835\n").unwrap();
        std::fs::write(chip.join("base"), "zero\n").unwrap();

        let err = SysfsPin::open_at(sysfs.path(), 4).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn pin_we_export_is_unexported_on_release() {
        let sysfs = TempDir::new().unwrap();
        fake_chip(&sysfs, "gpiochip512", "pinctrl-bcm2835", 512);
        let kernel = export_on_demand(&sysfs, 529);

        let mut pin = SysfsPin::open_at(sysfs.path(), 17).unwrap();
        kernel.join().unwrap();
        assert_eq!(
            std::fs::read_to_string(sysfs.path().join("gpio529/direction")).unwrap(),
            "out"
        );

        pin.release().unwrap();
        assert_eq!(
            std::fs::read_to_string(sysfs.path().join("unexport")).unwrap(),
            "529"
        );

        // A second release, and the drop after it, must not unexport again.
        std::fs::remove_file(sysfs.path().join("unexport")).unwrap();
        pin.release().unwrap();
        drop(pin);
        assert!(!sysfs.path().join("unexport").exists());
    }

    #[test]
    fn dropping_pin_we_export_unexports_it() {
        let sysfs = TempDir::new().unwrap();
        let kernel = export_on_demand(&sysfs, 4);

        let pin = SysfsPin::open_at(sysfs.path(), 4).unwrap();
        kernel.join().unwrap();
        drop(pin);
        assert_eq!(
            std::fs::read_to_string(sysfs.path().join("unexport")).unwrap(),
            "4"
        );
    }

    #[test]
    fn export_that_never_appears_is_undone() {
        let sysfs = TempDir::new().unwrap();
        let err = SysfsPin::open_at(sysfs.path(), 4).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert_eq!(
            std::fs::read_to_string(sysfs.path().join("unexport")).unwrap(),
            "4"
        );
    }

    #[test]
    fn missing_sysfs_is_an_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        assert!(SysfsPin::open_at(&missing, 4).is_err());
    }
}
