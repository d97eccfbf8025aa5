use crate::config::{RemoteConfig, Secret};
use crate::error::{ActivationError, GarageError};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

/// Upper bound on any single Maker API round trip.
pub const REMOTE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Deserialize)]
struct DeviceCommand {
    command: String,
}

/// A Hubitat device driven through the Maker API.
#[derive(Debug, Clone)]
pub struct RemoteActuator {
    client: reqwest::Client,
    base_url: Url,
    access_token: Secret,
    device_id: u32,
    command: String,
    timeout: Duration,
}

impl RemoteActuator {
    pub fn new(config: RemoteConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url,
            access_token: config.access_token,
            device_id: config.device_id,
            command: config.command,
            timeout: REMOTE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn device_id(&self) -> u32 {
        self.device_id
    }

    /// `{base}/{device}/{segment}`, without credentials.
    fn endpoint(&self, segment: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push(&self.device_id.to_string())
                .push(segment);
        }
        url
    }

    async fn get<T: DeserializeOwned>(&self, segment: &str) -> Result<T, ActivationError> {
        let url = self.endpoint(segment);
        tracing::debug!("Hitting {url}?access_token=<REDACTED>");

        let mut authed = url;
        authed
            .query_pairs_mut()
            .append_pair("access_token", self.access_token.expose());

        let fetch = async {
            let resp = self
                .client
                .get(authed)
                .send()
                .await
                .map_err(|e| ActivationError::Transport(e.without_url()))?;
            let status = resp.status();
            let raw = resp
                .bytes()
                .await
                .map_err(|e| ActivationError::Transport(e.without_url()))?;
            tracing::debug!("Raw response: {}", String::from_utf8_lossy(&raw));
            if status != StatusCode::OK {
                return Err(ActivationError::Status(status));
            }
            serde_json::from_slice(&raw).map_err(ActivationError::Decode)
        };

        match tokio::time::timeout(self.timeout, fetch).await {
            Ok(result) => result,
            Err(_) => Err(ActivationError::Timeout(self.timeout)),
        }
    }

    /// Send the configured command. The response body carries nothing
    /// interesting but must be a JSON object or `null`.
    pub async fn activate(&self) -> Result<(), ActivationError> {
        let _ack: Option<serde_json::Map<String, serde_json::Value>> =
            self.get(&self.command).await?;
        Ok(())
    }

    /// Confirm the device actually supports the configured command.
    pub async fn self_check(&self) -> Result<(), GarageError> {
        let commands: Vec<DeviceCommand> = self
            .get("commands")
            .await
            .map_err(|e| GarageError::SelfCheck(e.to_string()))?;
        if !commands.iter().any(|c| c.command == self.command) {
            return Err(GarageError::SelfCheck(format!(
                "no command {:?} supported by device",
                self.command
            )));
        }
        tracing::info!(
            "Hubitat self-check OK: device {} supports command {:?}",
            self.device_id,
            self.command
        );
        Ok(())
    }
}
