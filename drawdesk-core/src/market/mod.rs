use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// Half-open interval during which a game accepts bets, in market-local
/// time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketWindow {
    pub opens_at: NaiveDateTime,
    pub closes_at: NaiveDateTime,
}

impl MarketWindow {
    pub fn contains(&self, now: NaiveDateTime) -> bool {
        self.opens_at <= now && now < self.closes_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketStatus {
    pub window: MarketWindow,
    pub is_open: bool,
}

/// The betting window relevant to `now`. Yesterday's cycle wins while it
/// is still running (overnight draws close after midnight); otherwise the
/// window anchored on today's open instant applies, which for a not yet
/// opened market is the upcoming one.
pub fn current_window(now: NaiveDateTime, draw_time: NaiveTime, open_hour: u32) -> MarketWindow {
    let yesterday = window_for_day(now.date() - Duration::days(1), draw_time, open_hour);
    if yesterday.contains(now) {
        return yesterday;
    }
    window_for_day(now.date(), draw_time, open_hour)
}

pub fn is_open(now: NaiveDateTime, draw_time: NaiveTime, open_hour: u32) -> bool {
    current_window(now, draw_time, open_hour).contains(now)
}

fn window_for_day(open_date: NaiveDate, draw_time: NaiveTime, open_hour: u32) -> MarketWindow {
    let open_time = NaiveTime::from_hms_opt(open_hour, 0, 0).unwrap_or(NaiveTime::MIN);
    let opens_at = open_date.and_time(open_time);

    // Draws earlier in the day than the open hour settle on the morning
    // after the market opened.
    let close_date = if draw_time.hour() < open_hour {
        open_date + Duration::days(1)
    } else {
        open_date
    };
    let closes_at = close_date.and_time(draw_time);

    MarketWindow { opens_at, closes_at }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPEN_HOUR: u32 = 10;

    fn dt(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn time(hour: u32, minute: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
    }

    #[test]
    fn evening_draw_same_day_window() {
        let draw = time(21, 30);

        assert!(!is_open(dt(15, 9, 59), draw, OPEN_HOUR));
        assert!(is_open(dt(15, 10, 0), draw, OPEN_HOUR));
        assert!(is_open(dt(15, 14, 0), draw, OPEN_HOUR));
        assert!(is_open(dt(15, 21, 29), draw, OPEN_HOUR));
        assert!(!is_open(dt(15, 21, 30), draw, OPEN_HOUR));
        assert!(!is_open(dt(15, 23, 0), draw, OPEN_HOUR));
    }

    #[test]
    fn overnight_draw_spans_midnight() {
        let draw = time(1, 30);

        let window = current_window(dt(15, 12, 0), draw, OPEN_HOUR);
        assert_eq!(window.opens_at, dt(15, 10, 0));
        assert_eq!(window.closes_at, dt(16, 1, 30));

        assert!(is_open(dt(15, 10, 0), draw, OPEN_HOUR));
        assert!(is_open(dt(15, 23, 59), draw, OPEN_HOUR));
        assert!(is_open(dt(16, 0, 30), draw, OPEN_HOUR));
        assert!(is_open(dt(16, 1, 29), draw, OPEN_HOUR));
        assert!(!is_open(dt(16, 1, 30), draw, OPEN_HOUR));
    }

    #[test]
    fn early_morning_poll_lands_in_yesterdays_cycle() {
        let draw = time(1, 30);

        // Just after midnight the applicable cycle is still the one that
        // opened yesterday morning.
        let window = current_window(dt(16, 0, 45), draw, OPEN_HOUR);
        assert_eq!(window.opens_at, dt(15, 10, 0));
        assert_eq!(window.closes_at, dt(16, 1, 30));
    }

    #[test]
    fn closed_morning_gap_reports_upcoming_window() {
        let draw = time(1, 30);

        // Between the overnight close and today's open the market is shut
        // and the reported window is today's upcoming cycle.
        let window = current_window(dt(16, 5, 0), draw, OPEN_HOUR);
        assert!(!window.contains(dt(16, 5, 0)));
        assert_eq!(window.opens_at, dt(16, 10, 0));
        assert_eq!(window.closes_at, dt(17, 1, 30));
    }

    #[test]
    fn draw_between_open_and_midnight_next_day_is_new_cycle() {
        let draw = time(21, 30);

        let window = current_window(dt(16, 9, 0), draw, OPEN_HOUR);
        assert_eq!(window.opens_at, dt(16, 10, 0));
        assert_eq!(window.closes_at, dt(16, 21, 30));
    }
}
