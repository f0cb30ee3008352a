//! Day/night window and date readout cadence.

pub const DEFAULT_SLEEP_START_HOUR: u8 = 23;
pub const DEFAULT_SLEEP_END_HOUR: u8 = 6;
pub const DEFAULT_DATE_INTERVAL_MINUTES: u8 = 24;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScheduleError {
    SleepStartHour(u8),
    SleepEndHour(u8),
    DateInterval(u8),
}

/// User-configurable schedule, persisted alongside WiFi credentials.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ScheduleWindow {
    pub sleep_start_hour: u8,
    pub sleep_end_hour: u8,
    /// Minutes between date readouts; zero disables them.
    pub date_display_interval_minutes: u8,
}

impl Default for ScheduleWindow {
    fn default() -> Self {
        Self::new(
            DEFAULT_SLEEP_START_HOUR,
            DEFAULT_SLEEP_END_HOUR,
            DEFAULT_DATE_INTERVAL_MINUTES,
        )
    }
}

impl ScheduleWindow {
    pub const fn new(sleep_start_hour: u8, sleep_end_hour: u8, date_interval: u8) -> Self {
        Self {
            sleep_start_hour,
            sleep_end_hour,
            date_display_interval_minutes: date_interval,
        }
    }

    pub fn validated(
        sleep_start_hour: u8,
        sleep_end_hour: u8,
        date_interval: u8,
    ) -> Result<Self, ScheduleError> {
        if sleep_start_hour > 23 {
            return Err(ScheduleError::SleepStartHour(sleep_start_hour));
        }
        if sleep_end_hour > 23 {
            return Err(ScheduleError::SleepEndHour(sleep_end_hour));
        }
        if date_interval > 59 {
            return Err(ScheduleError::DateInterval(date_interval));
        }

        Ok(Self::new(sleep_start_hour, sleep_end_hour, date_interval))
    }

    pub fn is_valid(&self) -> bool {
        Self::validated(
            self.sleep_start_hour,
            self.sleep_end_hour,
            self.date_display_interval_minutes,
        )
        .is_ok()
    }

    /// Hour falls in the night window (wraps past midnight).
    pub const fn is_sleep_hour(&self, hour: u8) -> bool {
        hour >= self.sleep_start_hour || hour < self.sleep_end_hour
    }

    pub const fn is_wake_hour(&self, hour: u8) -> bool {
        hour >= self.sleep_end_hour && hour < self.sleep_start_hour
    }

    pub const fn date_display_enabled(&self) -> bool {
        self.date_display_interval_minutes != 0
    }
}
