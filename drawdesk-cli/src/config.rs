use drawdesk_core::{ExchangeConfig, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Market tuning persisted next to the database. Written with defaults on
/// first run so operators have a file to edit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    pub market_open_hour: u32,
    pub reset_hour: u32,
    pub utc_offset_minutes: i32,
    pub reset_poll_secs: u64,
}

impl Default for CliConfig {
    fn default() -> Self {
        let defaults = ExchangeConfig::default();
        Self {
            market_open_hour: defaults.market_open_hour,
            reset_hour: defaults.reset_hour,
            utc_offset_minutes: defaults.utc_offset_minutes,
            reset_poll_secs: defaults.reset_poll_interval.as_secs(),
        }
    }
}

impl CliConfig {
    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join("config.json");
        if !path.exists() {
            let config = Self::default();
            std::fs::write(&path, serde_json::to_string_pretty(&config)?)?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn exchange_config(&self) -> ExchangeConfig {
        ExchangeConfig {
            market_open_hour: self.market_open_hour,
            reset_hour: self.reset_hour,
            utc_offset_minutes: self.utc_offset_minutes,
            reset_poll_interval: Duration::from_secs(self.reset_poll_secs),
        }
    }
}
