//! The clock's control loop.

use embedded_hal::digital::ErrorType;
use log::{info, warn};
use time::PrimitiveDateTime;

use crate::{
    display::{ClockDisplayDriver, DisplayConfig},
    input::{ButtonConfig, ButtonInput},
    led::{LedAnimator, LedProgram},
    network::{ConnectivityState, NetworkConfig, NetworkManager},
    ports::{ClockPlatform, Ticker},
    recalibration::{DEFAULT_RECALIBRATION_INTERVAL_MS, RecalibrationScheduler},
    schedule::ScheduleWindow,
    sleep::{SleepScheduler, SleepState, SleepTransition},
    time_sync::{SyncStatus, TimeSource, TimeSyncConfig, TimeSyncService},
};

mod surface;

pub use surface::{ControlSurface, ResetRequested, Servicing};

const RESET_CONFIRM_MS: u64 = 5_000;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ClockConfig {
    pub display: DisplayConfig,
    pub button: ButtonConfig,
    pub recalibration_interval_ms: u64,
    pub reset_confirm_ms: u64,
    pub network: NetworkConfig,
    pub time_sync: TimeSyncConfig,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            display: DisplayConfig::default(),
            button: ButtonConfig::default(),
            recalibration_interval_ms: DEFAULT_RECALIBRATION_INTERVAL_MS,
            reset_confirm_ms: RESET_CONFIRM_MS,
            network: NetworkConfig::default(),
            time_sync: TimeSyncConfig::default(),
        }
    }
}

/// Per-boot controller state. Never persisted.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ClockState {
    pub current_time: Option<PrimitiveDateTime>,
    pub last_displayed_time: Option<PrimitiveDateTime>,
    pub last_calibration_ms: u64,
    pub asleep: bool,
    pub sleep_toggle_requested: bool,
    /// The time source has answered at least once since the last sync.
    pub time_synchronized: bool,
}

/// Returned once the user confirmed a factory reset; the caller restarts.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FactoryReset;

/// Board-supplied pieces handed to [`ClockController::new`].
pub struct ClockParts<P: ClockPlatform> {
    pub button: P::Button,
    pub leds: P::Leds,
    pub display: P::Display,
    pub status: P::Status,
    pub ticker: P::Ticker,
    pub network: P::Network,
    pub store: P::Store,
    pub time: P::Time,
}

pub struct ClockController<P: ClockPlatform> {
    surface: ControlSurface<P>,
    network: NetworkManager<P>,
    time_source: P::Time,
    time_sync: TimeSyncService,
    sleep: SleepScheduler,
    recalibration: RecalibrationScheduler,
    display: ClockDisplayDriver,
    state: ClockState,
    reset_confirm_ms: u64,
}

impl<P> ClockController<P>
where
    P: ClockPlatform,
{
    pub fn new(
        parts: ClockParts<P>,
        config: ClockConfig,
    ) -> Result<Self, <P::Button as ErrorType>::Error> {
        let now_ms = parts.ticker.now_ms();
        let button = ButtonInput::new(parts.button, config.button)?;
        let network = NetworkManager::new(parts.network, parts.store, config.network);
        let window = network.window();
        let display = ClockDisplayDriver::new(config.display, &window);
        let surface = ControlSurface::new(
            button,
            LedAnimator::new(parts.leds, LedProgram::Idle, now_ms),
            parts.display,
            parts.status,
            parts.ticker,
            display.module_count(),
        );

        Ok(Self {
            surface,
            network,
            time_source: parts.time,
            time_sync: TimeSyncService::new(config.time_sync),
            sleep: SleepScheduler::new(window),
            recalibration: RecalibrationScheduler::new(config.recalibration_interval_ms),
            display,
            state: ClockState {
                last_calibration_ms: now_ms,
                ..ClockState::default()
            },
            reset_confirm_ms: config.reset_confirm_ms,
        })
    }

    pub fn state(&self) -> &ClockState {
        &self.state
    }

    pub fn surface(&self) -> &ControlSurface<P> {
        &self.surface
    }

    pub fn connectivity(&self) -> ConnectivityState {
        self.network.state()
    }

    pub fn window(&self) -> ScheduleWindow {
        *self.sleep.window()
    }

    /// Connects, synchronizes time and switches to the awake program.
    pub async fn start(&mut self) -> Result<(), ResetRequested> {
        self.state.last_calibration_ms = self.surface.now_ms();
        self.bring_online().await?;
        self.state.asleep = false;
        self.surface.set_led_program(LedProgram::Awake);
        info!("clock: started");
        Ok(())
    }

    /// One control-loop iteration. Only a reconnect suspends for longer than
    /// the trailing 1 ms service wait.
    pub async fn run_once(&mut self) -> Result<(), ResetRequested> {
        let now_ms = self.surface.now_ms();
        let now = self.time_sync.local_time(&self.time_source);
        self.state.current_time = Some(now);
        if self.surface.take_sleep_toggle() {
            self.state.sleep_toggle_requested = true;
        }

        if !self.state.time_synchronized && self.time_source.status() == SyncStatus::Completed {
            info!("ntp: time synchronized after startup");
            self.state.time_synchronized = true;
            self.display.invalidate(&mut self.state.last_displayed_time);
        }

        if !self.state.asleep {
            self.refresh_display(&now, now_ms);

            // A re-home would wipe the date readout; it waits for the dwell.
            if !self.display.is_holding_date(now_ms)
                && self
                    .recalibration
                    .poll(&mut self.state.last_calibration_ms, now_ms)
            {
                info!("Recalibrating display");
                self.surface.reset_all();
                self.display.invalidate(&mut self.state.last_displayed_time);
            }

            if !self.network.is_connected() {
                warn!("clock: WiFi disconnected; reconnecting");
                self.network.leave();
                self.bring_online().await?;
                self.surface.set_led_program(LedProgram::Awake);
                self.display.invalidate(&mut self.state.last_displayed_time);
            }
        }

        self.update_sleep(&now);
        self.surface.wait(1, Servicing::ALL).await
    }

    /// Runs until the user holds the button, then performs the reset
    /// sequence and hands control back for a restart.
    pub async fn run(&mut self) -> FactoryReset {
        if self.start().await.is_ok() {
            while self.run_once().await.is_ok() {}
        }
        self.factory_reset().await
    }

    pub async fn factory_reset(&mut self) -> FactoryReset {
        warn!("clock: factory reset requested");
        self.surface.acknowledge_reset();
        self.surface.set_led_program(LedProgram::Provisioning);
        // Button is not serviced, so the wait always runs to the end.
        self.surface
            .wait(self.reset_confirm_ms, Servicing::LEDS_ONLY)
            .await
            .ok();
        self.network.forget_credentials();
        info!("Restarting...");
        FactoryReset
    }

    async fn bring_online(&mut self) -> Result<(), ResetRequested> {
        let window = self.network.connect(&mut self.surface).await?;
        self.sleep.set_window(window);
        self.display.set_window(&window);

        let report = self
            .time_sync
            .sync(&mut self.time_source, &mut self.surface)
            .await?;
        self.state.current_time = Some(report.local_time);
        self.state.time_synchronized = report.synchronized;
        Ok(())
    }

    fn refresh_display(&mut self, now: &PrimitiveDateTime, now_ms: u64) {
        if self.display.is_holding_date(now_ms) {
            return;
        }

        let display = self.surface.display_mut();
        if let Err(err) = self
            .display
            .show_clock(now, &mut self.state.last_displayed_time, &mut *display)
        {
            warn!("display: clock write failed err={:?}", err);
        }
        if let Err(err) =
            self.display
                .show_date(now, now_ms, &mut self.state.last_displayed_time, display)
        {
            warn!("display: date write failed err={:?}", err);
        }
    }

    fn update_sleep(&mut self, now: &PrimitiveDateTime) {
        let current = SleepState::from_asleep(self.state.asleep);
        let transition =
            self.sleep
                .evaluate(current, now.hour(), self.state.sleep_toggle_requested);
        self.state.sleep_toggle_requested = false;

        let Some(transition) = transition else {
            return;
        };
        match transition {
            SleepTransition::EnterSleep => {
                info!("Entering sleep");
                let blank = self.display.blank_text();
                self.surface.show(&blank, false);
                self.display.invalidate(&mut self.state.last_displayed_time);
            }
            SleepTransition::Wake => info!("Waking from sleep"),
        }
        self.surface.set_led_program(transition.led_program());
        self.state.asleep = transition.target() == SleepState::Asleep;
    }
}

#[cfg(test)]
mod tests;
