use crate::error::{GarageError, Result};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Secret
// ---------------------------------------------------------------------------

/// A string that never shows up in logs, `Debug` output or serialized config.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str("<redacted>")
    }
}

// ---------------------------------------------------------------------------
// Mode
// ---------------------------------------------------------------------------

/// Which actuator backend drives the door.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Running on a Raspberry Pi with a GPIO-controlled relay.
    Hardware,
    /// Talking to a Hubitat hub with the Maker API enabled.
    Hubitat,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Hardware => "hardware",
            Mode::Hubitat => "hubitat",
        }
    }
}

impl FromStr for Mode {
    type Err = GarageError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "hardware" => Ok(Mode::Hardware),
            "hubitat" => Ok(Mode::Hubitat),
            other => Err(GarageError::UnsupportedMode(other.to_string())),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Raw YAML sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HardwareConfig {
    /// BCM pin number of the relay, as printed on pinout charts. Mapped onto
    /// the SoC gpiochip's sysfs line when opened.
    pub action_pin: u32,
    #[serde(default)]
    pub action_active_low: bool,
    /// Sysfs LED directory (e.g. `/sys/class/leds/led0`); empty or absent means no LED.
    #[serde(default)]
    pub led_path: Option<PathBuf>,
    #[serde(default)]
    pub blink_led: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HubitatConfig {
    /// e.g. `http://1.2.3.4/apps/api/3/devices`
    pub maker_api: String,
    pub access_token: Secret,
    pub device: u32,
    /// Command to send the device, usually `on`.
    pub command: String,
}

/// What happens when `/activate` arrives while another activation is running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyPolicy {
    /// Fail the newcomer with `ActivationError::Busy`.
    #[default]
    Reject,
    /// Wait for the running activation, then run a full one.
    Queue,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActivationConfig {
    #[serde(default)]
    pub concurrent: ConcurrencyPolicy,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// The on-disk configuration file. Unknown keys are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hardware: Option<HardwareConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hubitat: Option<HubitatConfig>,
    #[serde(default)]
    pub activation: ActivationConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|source| GarageError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&data).map_err(|source| GarageError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn mode(&self) -> Result<Mode> {
        self.mode.parse()
    }

    /// Validate the selected section and collapse it into an [`ActuatorConfig`].
    pub fn actuator_config(&self) -> Result<ActuatorConfig> {
        match self.mode()? {
            Mode::Hardware => {
                let hw = self
                    .hardware
                    .as_ref()
                    .ok_or_else(|| GarageError::MissingSection {
                        mode: Mode::Hardware.to_string(),
                    })?;
                Ok(ActuatorConfig::Direct(DirectConfig {
                    pin: hw.action_pin,
                    active_low: hw.action_active_low,
                    led_path: hw
                        .led_path
                        .clone()
                        .filter(|p| !p.as_os_str().is_empty()),
                    blink_enabled: hw.blink_led,
                }))
            }
            Mode::Hubitat => {
                let hub = self
                    .hubitat
                    .as_ref()
                    .ok_or_else(|| GarageError::MissingSection {
                        mode: Mode::Hubitat.to_string(),
                    })?;
                let base_url = reqwest::Url::parse(hub.maker_api.trim()).map_err(|e| {
                    GarageError::InvalidConfig(format!(
                        "hubitat.maker_api {:?}: {e}",
                        hub.maker_api
                    ))
                })?;
                if !matches!(base_url.scheme(), "http" | "https") || base_url.cannot_be_a_base() {
                    return Err(GarageError::InvalidConfig(format!(
                        "hubitat.maker_api {:?} must be an http(s) URL",
                        hub.maker_api
                    )));
                }
                if hub.access_token.is_empty() {
                    return Err(GarageError::InvalidConfig(
                        "hubitat.access_token must not be empty".into(),
                    ));
                }
                if hub.command.trim().is_empty() {
                    return Err(GarageError::InvalidConfig(
                        "hubitat.command must not be empty".into(),
                    ));
                }
                Ok(ActuatorConfig::Remote(RemoteConfig {
                    base_url,
                    access_token: hub.access_token.clone(),
                    device_id: hub.device,
                    command: hub.command.clone(),
                }))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ActuatorConfig
// ---------------------------------------------------------------------------

/// Validated actuator settings; exactly one backend.
#[derive(Debug, Clone)]
pub enum ActuatorConfig {
    Direct(DirectConfig),
    Remote(RemoteConfig),
}

impl ActuatorConfig {
    pub fn mode(&self) -> Mode {
        match self {
            ActuatorConfig::Direct(_) => Mode::Hardware,
            ActuatorConfig::Remote(_) => Mode::Hubitat,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectConfig {
    pub pin: u32,
    pub active_low: bool,
    pub led_path: Option<PathBuf>,
    pub blink_enabled: bool,
}

#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub base_url: reqwest::Url,
    pub access_token: Secret,
    pub device_id: u32,
    pub command: String,
}
