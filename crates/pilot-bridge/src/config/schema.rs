use std::time::Duration;

use serde::Deserialize;

use pilot_core::{PilotError, Result};

use crate::provider::takeover;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    pub version: u32,

    #[serde(default)]
    pub bridge: BridgeSection,

    #[serde(default)]
    pub injection: InjectionSection,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            version: 1,
            bridge: BridgeSection::default(),
            injection: InjectionSection::default(),
        }
    }
}

impl BridgeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(PilotError::BadRequest(format!(
                "unsupported config version: {}",
                self.version
            )));
        }

        self.bridge.validate()?;
        self.injection.validate()?;

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeSection {
    /// How long a connection attempt waits for `CONNECTED` before retrying.
    #[serde(default = "default_connect_retry_ms")]
    pub connect_retry_ms: u64,

    /// Frames buffered per port direction.
    #[serde(default = "default_port_buffer")]
    pub port_buffer: usize,

    /// Origin of the extension's own connect surface. Never injected, never bridged.
    #[serde(default = "default_connect_origin")]
    pub connect_origin: String,
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            connect_retry_ms: default_connect_retry_ms(),
            port_buffer: default_port_buffer(),
            connect_origin: default_connect_origin(),
        }
    }
}

impl BridgeSection {
    pub fn validate(&self) -> Result<()> {
        if !(50..=10_000).contains(&self.connect_retry_ms) {
            return Err(PilotError::BadRequest(
                "bridge.connect_retry_ms must be between 50 and 10000".into(),
            ));
        }
        if !(1..=4096).contains(&self.port_buffer) {
            return Err(PilotError::BadRequest(
                "bridge.port_buffer must be between 1 and 4096".into(),
            ));
        }
        if !(self.connect_origin.starts_with("https://") || self.connect_origin.starts_with("http://"))
            || self.connect_origin.ends_with('/')
        {
            return Err(PilotError::BadRequest(
                "bridge.connect_origin must be an http(s) origin without a trailing slash".into(),
            ));
        }
        Ok(())
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.connect_retry_ms)
    }
}

fn default_connect_retry_ms() -> u64 {
    500
}
fn default_port_buffer() -> usize {
    64
}
fn default_connect_origin() -> String {
    "https://app.pilot.gnosisguild.org".into()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InjectionSection {
    /// Named takeover strategies tried, in order, when another wallet holds
    /// a non-configurable provider slot.
    #[serde(default = "default_takeover_strategies")]
    pub takeover_strategies: Vec<String>,
}

impl Default for InjectionSection {
    fn default() -> Self {
        Self {
            takeover_strategies: default_takeover_strategies(),
        }
    }
}

impl InjectionSection {
    pub fn validate(&self) -> Result<()> {
        for name in &self.takeover_strategies {
            if takeover::by_name(name).is_none() {
                return Err(PilotError::BadRequest(format!(
                    "injection.takeover_strategies: unknown strategy {name}"
                )));
            }
        }
        Ok(())
    }
}

fn default_takeover_strategies() -> Vec<String> {
    vec![takeover::WALLET_ROUTER.to_string()]
}
