//! First NTP synchronization with bounded retries.

use core::fmt::Write as _;

use heapless::String;
use log::{info, warn};
use time::PrimitiveDateTime;

use crate::app::{ControlSurface, ResetRequested, Servicing};
use crate::display::StatusWord;
use crate::ports::ClockPlatform;
use crate::timezone::TimeZoneRule;

pub const DEFAULT_NTP_SERVERS: [&str; 2] = ["pool.ntp.org", "europe.pool.ntp.org"];

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SyncStatus {
    #[default]
    Reset,
    InProgress,
    Completed,
}

/// Platform SNTP client plus the wall clock it disciplines.
pub trait TimeSource {
    /// (Re)starts the client: one immediate query, then periodic polling.
    /// Resets the status to [`SyncStatus::Reset`].
    fn start(&mut self, servers: &[&'static str; 2]);
    fn stop(&mut self);
    fn is_running(&self) -> bool;
    fn status(&self) -> SyncStatus;
    /// Current UTC seconds; epoch plus uptime until the first sync.
    fn now_unix(&self) -> i64;
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TimeSyncConfig {
    pub servers: [&'static str; 2],
    pub settle_ms: u64,
    pub retry_count: u8,
    pub retry_interval_ms: u64,
    pub zone: TimeZoneRule,
}

impl Default for TimeSyncConfig {
    fn default() -> Self {
        Self {
            servers: DEFAULT_NTP_SERVERS,
            settle_ms: 2_000,
            retry_count: 15,
            retry_interval_ms: 2_000,
            zone: TimeZoneRule::uk(),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SyncReport {
    pub synchronized: bool,
    pub local_time: PrimitiveDateTime,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TimeSyncService {
    config: TimeSyncConfig,
}

impl TimeSyncService {
    pub const fn new(config: TimeSyncConfig) -> Self {
        Self { config }
    }

    pub fn local_time<T: TimeSource>(&self, source: &T) -> PrimitiveDateTime {
        self.config.zone.to_local(source.now_unix())
    }

    /// Restarts the client and waits for the first answer. Running out of
    /// retries is not an error: the clock's current value is returned as is.
    pub async fn sync<P: ClockPlatform>(
        &self,
        source: &mut P::Time,
        surface: &mut ControlSurface<P>,
    ) -> Result<SyncReport, ResetRequested> {
        if source.is_running() {
            source.stop();
        }
        source.start(&self.config.servers);
        surface.wait(self.config.settle_ms, Servicing::ALL).await?;

        surface.show_status(StatusWord::Sync, true);
        info!("Waiting for NTP time sync...");
        surface.set_message(1, "Syncing NTP time");

        let mut retries = 0u8;
        while source.status() != SyncStatus::Completed && retries < self.config.retry_count {
            retries += 1;
            info!(
                "Waiting for system time to be set... ({}/{})",
                retries, self.config.retry_count
            );
            surface.show_status(StatusWord::SyncRetry(retries), false);
            surface.wait(self.config.retry_interval_ms, Servicing::ALL).await?;
        }

        let synchronized = source.status() == SyncStatus::Completed;
        if !synchronized {
            warn!("ntp: no answer after {} retries; continuing unsynchronized", retries);
        }

        let local_time = self.local_time(source);
        let mut message: String<40> = String::new();
        let _ = write!(
            message,
            "Sync time: {:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            local_time.year(),
            u8::from(local_time.month()),
            local_time.day(),
            local_time.hour(),
            local_time.minute(),
            local_time.second()
        );
        info!("{}", message.as_str());
        surface.set_message(1, &message);

        Ok(SyncReport {
            synchronized,
            local_time,
        })
    }
}
