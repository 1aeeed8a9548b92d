use crate::error::{ExchangeError, Result};
use crate::exchange::ExchangeConfig;
use crate::storage::{GameStore, Storage};
use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, TimeZone, Utc};
use parking_lot::Mutex;
use std::sync::Arc;

/// Clears settled games for the next day's cycle. The watermark is each
/// game's `approved_at`: anything approved before the most recent reset
/// boundary belongs to a finished cycle, so restarts can neither
/// double-fire nor skip a day.
pub struct ResetScheduler {
    storage: Arc<Storage>,
    config: ExchangeConfig,
    running: Mutex<()>,
}

impl ResetScheduler {
    pub fn new(storage: Arc<Storage>, config: ExchangeConfig) -> Self {
        Self {
            storage,
            config,
            running: Mutex::new(()),
        }
    }

    /// Spawn the periodic poller. The first check runs immediately, then
    /// once per poll interval.
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.reset_poll_interval);
            loop {
                interval.tick().await;
                if let Err(e) = self.run_once(Utc::now()).await {
                    tracing::warn!("Daily reset check failed: {}", e);
                }
            }
        })
    }

    /// One reset check. Returns how many games were cleared. A check that
    /// would overlap a still-running one backs off instead.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<usize> {
        let _guard = match self.running.try_lock() {
            Some(guard) => guard,
            None => return Ok(0),
        };

        let boundary_local =
            last_reset_boundary(self.config.local_time(now), self.config.reset_hour);
        let boundary = self
            .config
            .market_offset()
            .from_local_datetime(&boundary_local)
            .single()
            .ok_or_else(|| ExchangeError::internal("reset boundary is not a valid instant"))?
            .timestamp();

        let conn = self.storage.get_connection().await;
        let reset = GameStore::new(&conn).reset_approved_before(boundary)?;
        if reset > 0 {
            tracing::info!("Daily reset cleared {} settled game(s)", reset);
        }

        Ok(reset)
    }
}

/// Most recent reset boundary: today at the reset hour, or yesterday's
/// boundary when the hour has not yet arrived today.
pub fn last_reset_boundary(now_local: NaiveDateTime, reset_hour: u32) -> NaiveDateTime {
    let reset_time = NaiveTime::from_hms_opt(reset_hour, 0, 0).unwrap_or(NaiveTime::MIN);
    let today = now_local.date().and_time(reset_time);
    if now_local < today {
        today - Duration::days(1)
    } else {
        today
    }
}
