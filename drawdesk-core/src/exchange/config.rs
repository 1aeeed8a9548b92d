use crate::error::{ExchangeError, Result};
use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// Hour of day at which every market opens, market-local.
    pub market_open_hour: u32,
    /// Hour of day at which settled games are cleared for the next cycle.
    pub reset_hour: u32,
    /// Offset of market-local time from UTC, in minutes.
    pub utc_offset_minutes: i32,
    /// How often the reset scheduler re-checks.
    pub reset_poll_interval: Duration,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            market_open_hour: 10,
            reset_hour: 5,
            utc_offset_minutes: 330,
            reset_poll_interval: Duration::from_secs(60),
        }
    }
}

impl ExchangeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.market_open_hour > 23 {
            return Err(ExchangeError::config(format!(
                "market_open_hour must be 0-23, got {}",
                self.market_open_hour
            )));
        }

        if self.reset_hour > 23 {
            return Err(ExchangeError::config(format!(
                "reset_hour must be 0-23, got {}",
                self.reset_hour
            )));
        }

        if self.utc_offset_minutes.abs() > 14 * 60 {
            return Err(ExchangeError::config(format!(
                "utc_offset_minutes must be within +-840, got {}",
                self.utc_offset_minutes
            )));
        }

        if self.reset_poll_interval.is_zero() {
            return Err(ExchangeError::config("reset_poll_interval must be non-zero"));
        }

        Ok(())
    }

    pub fn market_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or(Utc.fix())
    }

    /// Project a UTC instant into market-local naive time for the window
    /// and reset calculations.
    pub fn local_time(&self, now: DateTime<Utc>) -> NaiveDateTime {
        now.with_timezone(&self.market_offset()).naive_local()
    }
}
