//! WiFi association with a setup-portal fallback.

use core::fmt::{Debug, Write as _};

use heapless::String;
use log::{info, warn};

use crate::app::{ControlSurface, ResetRequested, Servicing};
use crate::display::StatusWord;
use crate::led::LedProgram;
use crate::ports::ClockPlatform;
use crate::provisioning::{
    PORTAL_PASSWORD, PORTAL_SSID, ProvisioningDefaults, ProvisioningSubmission,
};
use crate::schedule::ScheduleWindow;
use crate::settings::{PersistedSettings, SettingsStore, WifiCredentials};

/// Connectivity as seen by the controller.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ConnectivityState {
    #[default]
    Disconnected,
    Connecting,
    Provisioning,
    Connected,
}

/// Station link progress reported by the radio.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum LinkStatus {
    #[default]
    Idle,
    Joining,
    Connected,
    Failed,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PortalConfig {
    pub ssid: &'static str,
    pub password: &'static str,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            ssid: PORTAL_SSID,
            password: PORTAL_PASSWORD,
        }
    }
}

/// Non-blocking radio control. Every call returns immediately; the board
/// crate runs the actual association in its own worker.
pub trait NetworkBackend {
    type Error: Debug;

    /// Starts associating. `link_status` reports [`LinkStatus::Joining`]
    /// from the moment this returns `Ok`.
    fn begin_join(&mut self, credentials: &WifiCredentials) -> Result<(), Self::Error>;
    fn link_status(&self) -> LinkStatus;
    fn leave(&mut self);

    /// Opens the access point and captive portal alongside the station.
    fn start_portal(
        &mut self,
        portal: &PortalConfig,
        defaults: &ProvisioningDefaults,
    ) -> Result<(), Self::Error>;
    /// Takes the next validated form submission, if any.
    fn poll_portal(&mut self) -> Option<ProvisioningSubmission>;
    fn stop_portal(&mut self);
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct NetworkConfig {
    pub portal: PortalConfig,
    /// Joins tried with stored credentials before the portal opens.
    pub connect_attempts: u8,
    pub join_timeout_ms: u64,
    pub poll_interval_ms: u64,
    /// Pause before retrying stored credentials while the portal is open.
    pub retry_interval_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            portal: PortalConfig::default(),
            connect_attempts: 3,
            join_timeout_ms: 20_000,
            poll_interval_ms: 500,
            retry_interval_ms: 10_000,
        }
    }
}

pub struct NetworkManager<P: ClockPlatform> {
    backend: P::Network,
    store: P::Store,
    config: NetworkConfig,
    settings: PersistedSettings,
    state: ConnectivityState,
}

impl<P> NetworkManager<P>
where
    P: ClockPlatform,
{
    pub fn new(backend: P::Network, mut store: P::Store, config: NetworkConfig) -> Self {
        let settings = match store.load() {
            Ok(Some(settings)) if settings.window.is_valid() => {
                info!(
                    "settings: loaded sleep={} wake={} date={} credentials={}",
                    settings.window.sleep_start_hour,
                    settings.window.sleep_end_hour,
                    settings.window.date_display_interval_minutes,
                    settings.credentials.is_some(),
                );
                settings
            }
            Ok(Some(settings)) => {
                warn!("settings: stored schedule out of range; using defaults");
                PersistedSettings {
                    window: ScheduleWindow::default(),
                    ..settings
                }
            }
            Ok(None) => {
                info!("settings: nothing stored; using defaults");
                PersistedSettings::default()
            }
            Err(err) => {
                warn!("settings: load failed err={:?}; using defaults", err);
                PersistedSettings::default()
            }
        };

        Self {
            backend,
            store,
            config,
            settings,
            state: ConnectivityState::Disconnected,
        }
    }

    pub fn state(&self) -> ConnectivityState {
        self.state
    }

    pub fn window(&self) -> ScheduleWindow {
        self.settings.window
    }

    /// Reflects the radio's last reported link state without waiting.
    pub fn is_connected(&mut self) -> bool {
        let connected = self.backend.link_status() == LinkStatus::Connected;
        if !connected && self.state == ConnectivityState::Connected {
            warn!("wifi: link lost");
            self.state = ConnectivityState::Disconnected;
        }
        connected
    }

    pub fn leave(&mut self) {
        self.backend.leave();
        self.state = ConnectivityState::Disconnected;
    }

    /// Joins with stored credentials, opening the portal when there are none
    /// or every attempt fails. Returns the schedule in force afterwards.
    pub async fn connect(
        &mut self,
        surface: &mut ControlSurface<P>,
    ) -> Result<ScheduleWindow, ResetRequested> {
        surface.show_status(StatusWord::Wifi, true);
        info!("Establishing connection to WiFi");
        self.state = ConnectivityState::Connecting;

        let mut joined = false;
        if let Some(credentials) = self.settings.credentials.clone() {
            let attempts = self.config.connect_attempts.max(1);
            for attempt in 1..=attempts {
                info!(
                    "wifi: joining ssid={} attempt={}/{}",
                    credentials.ssid.as_str(),
                    attempt,
                    attempts
                );
                if self.join(&credentials, surface).await? {
                    joined = true;
                    break;
                }
            }
        } else {
            info!("wifi: no stored credentials");
        }

        if !joined {
            self.provision(surface).await?;
        }

        let window = self.settings.window;
        info!(
            "Sleep time {}/{} : Date display {}",
            window.sleep_start_hour, window.sleep_end_hour, window.date_display_interval_minutes
        );

        surface.show_status(StatusWord::Ready, true);
        let mut message: String<64> = String::new();
        let ssid = self
            .settings
            .credentials
            .as_ref()
            .map(|creds| creds.ssid.as_str())
            .unwrap_or("");
        let _ = write!(message, "Connected to network {}", ssid);
        info!("{}", message.as_str());
        surface.set_message(1, &message);

        self.state = ConnectivityState::Connected;
        Ok(window)
    }

    /// Runs the setup portal until a station join succeeds, either with
    /// submitted credentials or with stored ones retried in the background.
    pub async fn provision(&mut self, surface: &mut ControlSurface<P>) -> Result<(), ResetRequested> {
        self.state = ConnectivityState::Provisioning;
        surface.set_led_program(LedProgram::Provisioning);
        surface.show_status(StatusWord::Setup, true);

        let mut message: String<64> = String::new();
        let _ = write!(message, "Join WiFi {} to set up", self.config.portal.ssid);
        info!("{}", message.as_str());
        surface.set_message(1, &message);

        let defaults = ProvisioningDefaults {
            ssid: self
                .settings
                .credentials
                .as_ref()
                .map(|creds| creds.ssid.clone())
                .unwrap_or_default(),
            window: self.settings.window,
        };
        while let Err(err) = self.backend.start_portal(&self.config.portal, &defaults) {
            warn!("portal: start failed err={:?}", err);
            surface.wait(self.config.retry_interval_ms, Servicing::ALL).await?;
        }
        info!("portal: open ssid={}", self.config.portal.ssid);

        let mut join_started_ms: Option<u64> = None;
        let mut next_retry_ms = surface.now_ms().saturating_add(self.config.retry_interval_ms);
        loop {
            let now_ms = surface.now_ms();

            if let Some(submission) = self.backend.poll_portal() {
                self.apply_submission(submission);
                join_started_ms = self.start_join(now_ms);
            }

            match self.backend.link_status() {
                LinkStatus::Connected if join_started_ms.is_some() => break,
                LinkStatus::Failed | LinkStatus::Idle if join_started_ms.is_some() => {
                    warn!("portal: join failed");
                    surface.set_message(1, "WiFi join failed");
                    join_started_ms = None;
                    next_retry_ms = now_ms.saturating_add(self.config.retry_interval_ms);
                }
                _ => {}
            }

            if let Some(started) = join_started_ms
                && now_ms.saturating_sub(started) >= self.config.join_timeout_ms
            {
                warn!("portal: join timed out");
                self.backend.leave();
                join_started_ms = None;
                next_retry_ms = now_ms.saturating_add(self.config.retry_interval_ms);
            }

            if join_started_ms.is_none() && now_ms >= next_retry_ms {
                join_started_ms = self.start_join(now_ms);
                next_retry_ms = now_ms.saturating_add(self.config.retry_interval_ms);
            }

            surface.wait(self.config.poll_interval_ms, Servicing::ALL).await?;
        }

        self.backend.stop_portal();
        info!("portal: closed");
        Ok(())
    }

    /// Drops stored credentials and schedule.
    pub fn forget_credentials(&mut self) {
        self.settings = PersistedSettings::default();
        match self.store.clear() {
            Ok(()) => info!("settings: cleared"),
            Err(err) => warn!("settings: clear failed err={:?}", err),
        }
    }

    async fn join(
        &mut self,
        credentials: &WifiCredentials,
        surface: &mut ControlSurface<P>,
    ) -> Result<bool, ResetRequested> {
        if let Err(err) = self.backend.begin_join(credentials) {
            warn!("wifi: join request failed err={:?}", err);
            surface.wait(self.config.poll_interval_ms, Servicing::ALL).await?;
            return Ok(false);
        }

        let started_ms = surface.now_ms();
        loop {
            match self.backend.link_status() {
                LinkStatus::Connected => return Ok(true),
                LinkStatus::Failed => {
                    warn!("wifi: join failed ssid={}", credentials.ssid.as_str());
                    return Ok(false);
                }
                LinkStatus::Idle | LinkStatus::Joining => {}
            }

            if surface.now_ms().saturating_sub(started_ms) >= self.config.join_timeout_ms {
                warn!("wifi: join timed out ssid={}", credentials.ssid.as_str());
                self.backend.leave();
                return Ok(false);
            }
            surface.wait(self.config.poll_interval_ms, Servicing::ALL).await?;
        }
    }

    fn start_join(&mut self, now_ms: u64) -> Option<u64> {
        let credentials = self.settings.credentials.as_ref()?;
        match self.backend.begin_join(credentials) {
            Ok(()) => Some(now_ms),
            Err(err) => {
                warn!("wifi: join request failed err={:?}", err);
                None
            }
        }
    }

    fn apply_submission(&mut self, submission: ProvisioningSubmission) {
        info!(
            "portal: received ssid={} sleep={} wake={} date={}",
            submission.credentials.ssid.as_str(),
            submission.window.sleep_start_hour,
            submission.window.sleep_end_hour,
            submission.window.date_display_interval_minutes
        );
        self.settings.credentials = Some(submission.credentials);
        self.settings.window = submission.window;

        if let Err(err) = self.store.save(&self.settings) {
            warn!("settings: save failed err={:?}", err);
        }
    }
}
