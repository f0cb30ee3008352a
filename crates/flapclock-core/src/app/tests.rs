use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    rc::Rc,
    string::{String, ToString},
    vec::Vec,
};

use embassy_futures::block_on;
use embedded_hal::digital::{ErrorType, InputPin};
use time::macros::datetime;

use super::*;
use crate::{
    led::{CHANNEL_COUNT, LedOutput},
    network::{LinkStatus, NetworkBackend, PortalConfig},
    ports::{SplitflapDisplay, StatusScreen},
    provisioning::{ProvisioningDefaults, ProvisioningSubmission},
    settings::{PersistedSettings, SettingsStore, WifiCredentials},
    time_sync::{SyncStatus, TimeSource},
    timezone::TimeZoneRule,
};

#[derive(Clone, Default)]
struct SimClock(Rc<Cell<u64>>);

impl SimClock {
    fn now(&self) -> u64 {
        self.0.get()
    }

    fn advance(&self, ms: u64) {
        self.0.set(self.0.get() + ms);
    }
}

struct SimTicker(SimClock);

impl Ticker for SimTicker {
    fn now_ms(&self) -> u64 {
        self.0.now()
    }

    async fn pause_ms(&mut self, ms: u32) {
        self.0.advance(ms as u64);
    }
}

/// Active-low button pressed during `[from, until)` on the simulated clock.
#[derive(Clone)]
struct ScriptedButton {
    clock: SimClock,
    press: Rc<Cell<Option<(u64, u64)>>>,
}

impl ErrorType for ScriptedButton {
    type Error = core::convert::Infallible;
}

impl InputPin for ScriptedButton {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        let now = self.clock.now();
        let pressed = self
            .press
            .get()
            .is_some_and(|(from, until)| now >= from && now < until);
        Ok(!pressed)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|high| !high)
    }
}

struct DarkLeds;

impl LedOutput for DarkLeds {
    type Error = core::convert::Infallible;

    fn write_levels(&mut self, _levels: [u8; CHANNEL_COUNT]) -> Result<(), Self::Error> {
        Ok(())
    }
}

#[derive(Clone, Default)]
struct Flaps {
    shown: Rc<RefCell<Vec<(String, bool)>>>,
    resets: Rc<Cell<u32>>,
}

impl SplitflapDisplay for Flaps {
    type Error = core::convert::Infallible;

    fn show_string(
        &mut self,
        text: &str,
        module_count: usize,
        force_refresh: bool,
    ) -> Result<(), Self::Error> {
        assert_eq!(text.chars().count(), module_count);
        self.shown.borrow_mut().push((text.to_string(), force_refresh));
        Ok(())
    }

    fn reset_all(&mut self) -> Result<(), Self::Error> {
        self.resets.set(self.resets.get() + 1);
        Ok(())
    }
}

#[derive(Clone, Default)]
struct StatusLines(Rc<RefCell<Vec<(u8, String)>>>);

impl StatusScreen for StatusLines {
    fn set_message(&mut self, line: u8, text: &str) {
        self.0.borrow_mut().push((line, text.to_string()));
    }
}

#[derive(Clone, Default)]
struct Radio {
    clock: SimClock,
    link: Rc<Cell<LinkStatus>>,
    accepts: Rc<RefCell<Vec<String>>>,
    /// Networks that never answer: joins stay in `Joining`.
    stalled: Rc<RefCell<Vec<String>>>,
    /// Joins begun before this time fail, accepted network or not.
    outage_until_ms: Rc<Cell<u64>>,
    joins: Rc<RefCell<Vec<String>>>,
    leaves: Rc<Cell<u32>>,
    portal_open: Rc<Cell<bool>>,
    portals_opened: Rc<Cell<u32>>,
    /// Form submissions with the time each reaches the portal.
    submissions: Rc<RefCell<VecDeque<(u64, ProvisioningSubmission)>>>,
}

impl Radio {
    fn submit(&self, at_ms: u64, ssid: &str, password: &str, window: ScheduleWindow) {
        self.submissions.borrow_mut().push_back((
            at_ms,
            ProvisioningSubmission {
                credentials: WifiCredentials::new(ssid, password).unwrap(),
                window,
            },
        ));
    }
}

impl NetworkBackend for Radio {
    type Error = ();

    fn begin_join(&mut self, credentials: &WifiCredentials) -> Result<(), Self::Error> {
        let ssid = credentials.ssid.to_string();
        let status = if self.stalled.borrow().contains(&ssid) {
            LinkStatus::Joining
        } else if self.accepts.borrow().contains(&ssid)
            && self.clock.now() >= self.outage_until_ms.get()
        {
            LinkStatus::Connected
        } else {
            LinkStatus::Failed
        };
        self.joins.borrow_mut().push(ssid);
        self.link.set(status);
        Ok(())
    }

    fn link_status(&self) -> LinkStatus {
        self.link.get()
    }

    fn leave(&mut self) {
        self.leaves.set(self.leaves.get() + 1);
        self.link.set(LinkStatus::Idle);
    }

    fn start_portal(
        &mut self,
        _portal: &PortalConfig,
        _defaults: &ProvisioningDefaults,
    ) -> Result<(), Self::Error> {
        self.portal_open.set(true);
        self.portals_opened.set(self.portals_opened.get() + 1);
        Ok(())
    }

    fn poll_portal(&mut self) -> Option<ProvisioningSubmission> {
        let mut queue = self.submissions.borrow_mut();
        match queue.front() {
            Some((at_ms, _)) if *at_ms <= self.clock.now() => {
                queue.pop_front().map(|(_, submission)| submission)
            }
            _ => None,
        }
    }

    fn stop_portal(&mut self) {
        self.portal_open.set(false);
    }
}

#[derive(Clone, Default)]
struct MemoryStore(Rc<RefCell<Option<PersistedSettings>>>);

impl SettingsStore for MemoryStore {
    type Error = core::convert::Infallible;

    fn load(&mut self) -> Result<Option<PersistedSettings>, Self::Error> {
        Ok(self.0.borrow().clone())
    }

    fn save(&mut self, settings: &PersistedSettings) -> Result<(), Self::Error> {
        *self.0.borrow_mut() = Some(settings.clone());
        Ok(())
    }

    fn clear(&mut self) -> Result<(), Self::Error> {
        *self.0.borrow_mut() = None;
        Ok(())
    }
}

/// Answers once the simulated clock reaches `completes_at`.
#[derive(Clone)]
struct SimSntp {
    clock: SimClock,
    unix: Rc<Cell<i64>>,
    running: Rc<Cell<bool>>,
    starts: Rc<Cell<u32>>,
    completes_at: Rc<Cell<u64>>,
}

impl TimeSource for SimSntp {
    fn start(&mut self, _servers: &[&'static str; 2]) {
        self.running.set(true);
        self.starts.set(self.starts.get() + 1);
    }

    fn stop(&mut self) {
        self.running.set(false);
    }

    fn is_running(&self) -> bool {
        self.running.get()
    }

    fn status(&self) -> SyncStatus {
        if self.running.get() && self.clock.now() >= self.completes_at.get() {
            SyncStatus::Completed
        } else {
            SyncStatus::Reset
        }
    }

    fn now_unix(&self) -> i64 {
        self.unix.get()
    }
}

struct TestPlatform;

impl ClockPlatform for TestPlatform {
    type Button = ScriptedButton;
    type Leds = DarkLeds;
    type Display = Flaps;
    type Status = StatusLines;
    type Ticker = SimTicker;
    type Network = Radio;
    type Store = MemoryStore;
    type Time = SimSntp;
}

struct Rig {
    clock: SimClock,
    press: Rc<Cell<Option<(u64, u64)>>>,
    flaps: Flaps,
    lines: StatusLines,
    radio: Radio,
    store: MemoryStore,
    sntp: SimSntp,
}

impl Rig {
    /// Stored credentials for "home", which the radio accepts.
    fn new() -> Self {
        let clock = SimClock::default();
        let store = MemoryStore::default();
        *store.0.borrow_mut() = Some(
            PersistedSettings::new(ScheduleWindow::default())
                .with_credentials(WifiCredentials::new("home", "secret")),
        );
        let radio = Radio {
            clock: clock.clone(),
            ..Radio::default()
        };
        radio.accepts.borrow_mut().push("home".to_string());

        Self {
            sntp: SimSntp {
                clock: clock.clone(),
                unix: Rc::new(Cell::new(0)),
                running: Rc::new(Cell::new(false)),
                starts: Rc::new(Cell::new(0)),
                completes_at: Rc::new(Cell::new(0)),
            },
            clock,
            press: Rc::new(Cell::new(None)),
            flaps: Flaps::default(),
            lines: StatusLines::default(),
            radio,
            store,
        }
    }

    fn set_time(&self, time: PrimitiveDateTime) {
        self.sntp.unix.set(time.assume_utc().unix_timestamp());
    }

    fn controller(&self, config: ClockConfig) -> ClockController<TestPlatform> {
        let parts = ClockParts {
            button: ScriptedButton {
                clock: self.clock.clone(),
                press: self.press.clone(),
            },
            leds: DarkLeds,
            display: self.flaps.clone(),
            status: self.lines.clone(),
            ticker: SimTicker(self.clock.clone()),
            network: self.radio.clone(),
            store: self.store.clone(),
            time: self.sntp.clone(),
        };
        ClockController::new(parts, config).unwrap()
    }

    fn started(&self, config: ClockConfig) -> ClockController<TestPlatform> {
        let mut clock = self.controller(config);
        block_on(clock.start()).unwrap();
        self.flaps.shown.borrow_mut().clear();
        clock
    }

    fn shown(&self) -> Vec<String> {
        self.flaps.shown.borrow().iter().map(|(text, _)| text.clone()).collect()
    }

    fn last_shown(&self) -> Option<(String, bool)> {
        self.flaps.shown.borrow().last().cloned()
    }

    fn has_line(&self, prefix: &str) -> bool {
        self.lines.0.borrow().iter().any(|(_, text)| text.starts_with(prefix))
    }
}

fn utc_config() -> ClockConfig {
    ClockConfig {
        time_sync: TimeSyncConfig {
            zone: TimeZoneRule::utc(),
            ..TimeSyncConfig::default()
        },
        ..ClockConfig::default()
    }
}

fn four_module_config() -> ClockConfig {
    ClockConfig {
        display: DisplayConfig {
            module_count: 4,
            ..DisplayConfig::default()
        },
        ..utc_config()
    }
}

#[test]
fn startup_announces_progress_and_turns_awake() {
    let rig = Rig::new();
    rig.set_time(datetime!(2024-01-15 12:00:00));
    let mut clock = rig.controller(utc_config());

    assert_eq!(clock.surface().led_program(), LedProgram::Idle);
    block_on(clock.start()).unwrap();

    let shown = rig.flaps.shown.borrow().clone();
    assert_eq!(
        shown,
        [
            ("wifi  ".to_string(), true),
            ("ready ".to_string(), true),
            ("sync  ".to_string(), true),
        ]
    );
    assert_eq!(clock.surface().led_program(), LedProgram::Awake);
    assert_eq!(clock.connectivity(), ConnectivityState::Connected);
    assert!(rig.has_line("Connected to network home"));
    assert!(rig.has_line("Syncing NTP time"));
    assert!(rig.has_line("Sync time: 2024-01-15 12:00:00"));
    assert_eq!(rig.sntp.starts.get(), 1);
    assert!(clock.state().time_synchronized);
}

#[test]
fn enters_sleep_when_the_hour_reaches_sleep_start() {
    let rig = Rig::new();
    rig.set_time(datetime!(2024-01-15 22:59:56));
    let mut clock = rig.started(utc_config());

    block_on(clock.run_once()).unwrap();
    assert_eq!(rig.shown(), ["1059pm"]);
    assert!(!clock.state().asleep);

    rig.set_time(datetime!(2024-01-15 23:00:00));
    block_on(clock.run_once()).unwrap();

    assert!(clock.state().asleep);
    assert_eq!(rig.last_shown(), Some(("      ".to_string(), false)));
    assert_eq!(clock.surface().led_program(), LedProgram::Asleep);
    assert_eq!(clock.state().last_displayed_time, None);
}

#[test]
fn asleep_clock_does_not_touch_the_display_and_wakes_at_sleep_end() {
    let rig = Rig::new();
    rig.set_time(datetime!(2024-01-16 02:00:00));
    let mut clock = rig.started(utc_config());

    block_on(clock.run_once()).unwrap();
    assert!(clock.state().asleep);
    let writes = rig.shown().len();

    for _ in 0..100 {
        block_on(clock.run_once()).unwrap();
    }
    assert_eq!(rig.shown().len(), writes);

    rig.set_time(datetime!(2024-01-16 06:00:00));
    block_on(clock.run_once()).unwrap();
    assert!(!clock.state().asleep);
    assert_eq!(clock.surface().led_program(), LedProgram::Awake);

    block_on(clock.run_once()).unwrap();
    assert_eq!(rig.last_shown(), Some(("0600am".to_string(), false)));
}

#[test]
fn date_readout_holds_for_the_dwell_then_reverts_to_time() {
    let rig = Rig::new();
    rig.set_time(datetime!(2024-01-15 10:24:03));
    let mut clock = rig.started(utc_config());

    block_on(clock.run_once()).unwrap();
    rig.set_time(datetime!(2024-01-15 10:24:04));
    block_on(clock.run_once()).unwrap();
    block_on(clock.run_once()).unwrap();
    assert_eq!(rig.shown(), ["1024am", "150124"]);

    rig.clock.advance(10_000);
    rig.set_time(datetime!(2024-01-15 10:24:14));
    block_on(clock.run_once()).unwrap();
    assert_eq!(rig.shown().len(), 2);

    rig.clock.advance(20_000);
    rig.set_time(datetime!(2024-01-15 10:24:34));
    block_on(clock.run_once()).unwrap();
    assert_eq!(rig.shown(), ["1024am", "150124", "1024am"]);
}

#[test]
fn four_module_date_readout_is_day_and_month() {
    let rig = Rig::new();
    rig.set_time(datetime!(2024-01-15 10:24:04));
    let mut clock = rig.started(four_module_config());

    block_on(clock.run_once()).unwrap();

    assert_eq!(rig.shown(), ["1024", "1501"]);
}

#[test]
fn click_forces_exactly_one_transition() {
    let rig = Rig::new();
    rig.set_time(datetime!(2024-01-15 12:00:00));
    let mut clock = rig.started(utc_config());
    let now = rig.clock.now();
    rig.press.set(Some((now, now + 200)));

    let mut transitions = 0;
    let mut asleep = clock.state().asleep;
    for _ in 0..400 {
        block_on(clock.run_once()).unwrap();
        assert!(!clock.state().sleep_toggle_requested);
        if clock.state().asleep != asleep {
            asleep = clock.state().asleep;
            transitions += 1;
            if transitions == 1 {
                assert_eq!(clock.surface().led_program(), LedProgram::Asleep);
                assert_eq!(rig.last_shown(), Some(("      ".to_string(), false)));
            }
        }
    }

    // The schedule wakes the clock again on the following evaluation.
    assert_eq!(transitions, 2);
    assert!(!clock.state().asleep);
}

#[test]
fn long_press_unwinds_to_factory_reset() {
    let rig = Rig::new();
    rig.set_time(datetime!(2024-01-15 12:00:00));
    rig.press.set(Some((10_000, u64::MAX)));
    let mut clock = rig.controller(utc_config());

    let reset = block_on(clock.run());

    assert_eq!(reset, FactoryReset);
    assert_eq!(clock.surface().led_program(), LedProgram::Provisioning);
    assert_eq!(*rig.store.0.borrow(), None);
    // Long press after 5 s held, then the 5 s confirmation.
    assert!(rig.clock.now() >= 10_000 + 5_000 + 5_000);
    assert!(rig.clock.now() < 10_000 + 5_000 + 5_000 + 50);
}

#[test]
fn recalibrates_once_per_interval_while_awake() {
    let rig = Rig::new();
    rig.set_time(datetime!(2024-01-15 12:00:00));
    let mut clock = rig.started(ClockConfig {
        recalibration_interval_ms: 10_000,
        ..utc_config()
    });

    let until = rig.clock.now() + 25_000;
    while rig.clock.now() < until {
        block_on(clock.run_once()).unwrap();
    }

    assert_eq!(rig.flaps.resets.get(), 2);
}

#[test]
fn recalibration_is_skipped_while_asleep() {
    let rig = Rig::new();
    rig.set_time(datetime!(2024-01-15 23:30:00));
    let mut clock = rig.started(ClockConfig {
        recalibration_interval_ms: 10_000,
        ..utc_config()
    });

    let until = rig.clock.now() + 25_000;
    while rig.clock.now() < until {
        block_on(clock.run_once()).unwrap();
    }
    assert_eq!(rig.flaps.resets.get(), 0);

    rig.set_time(datetime!(2024-01-16 07:00:00));
    block_on(clock.run_once()).unwrap();
    block_on(clock.run_once()).unwrap();
    assert_eq!(rig.flaps.resets.get(), 1);
}

#[test]
fn lost_link_reconnects_and_resyncs() {
    let rig = Rig::new();
    rig.set_time(datetime!(2024-01-15 12:00:00));
    let mut clock = rig.started(utc_config());
    block_on(clock.run_once()).unwrap();

    rig.radio.link.set(LinkStatus::Idle);
    block_on(clock.run_once()).unwrap();

    assert_eq!(rig.radio.joins.borrow().len(), 2);
    assert_eq!(rig.sntp.starts.get(), 2);
    assert!(rig.shown().contains(&"wifi  ".to_string()));
    assert_eq!(clock.connectivity(), ConnectivityState::Connected);
    assert_eq!(clock.surface().led_program(), LedProgram::Awake);

    block_on(clock.run_once()).unwrap();
    assert_eq!(rig.last_shown(), Some(("1200pm".to_string(), false)));
}

#[test]
fn missing_credentials_open_the_portal_and_persist_the_submission() {
    let rig = Rig::new();
    *rig.store.0.borrow_mut() = None;
    rig.radio.accepts.borrow_mut().push("cabin".to_string());
    rig.radio.submit(0, "cabin", "pine", ScheduleWindow::new(22, 7, 0));
    rig.set_time(datetime!(2024-01-15 10:24:04));
    let mut clock = rig.controller(utc_config());

    block_on(clock.start()).unwrap();

    assert_eq!(rig.radio.portals_opened.get(), 1);
    assert!(!rig.radio.portal_open.get());
    assert!(rig.shown().contains(&"setup ".to_string()));
    let stored = rig.store.0.borrow().clone().unwrap();
    assert_eq!(stored.window, ScheduleWindow::new(22, 7, 0));
    assert_eq!(stored.credentials.unwrap().ssid.as_str(), "cabin");
    assert_eq!(clock.window(), ScheduleWindow::new(22, 7, 0));
    assert_eq!(clock.surface().led_program(), LedProgram::Awake);

    // Interval zero: no date readout at hh:24:04.
    rig.flaps.shown.borrow_mut().clear();
    block_on(clock.run_once()).unwrap();
    assert_eq!(rig.shown(), ["1024am"]);
}

#[test]
fn failing_credentials_fall_back_to_the_portal_after_three_attempts() {
    let rig = Rig::new();
    rig.radio.accepts.borrow_mut().clear();
    rig.radio.accepts.borrow_mut().push("office".to_string());
    rig.radio.submit(0, "office", "", ScheduleWindow::default());
    rig.set_time(datetime!(2024-01-15 12:00:00));
    let mut clock = rig.controller(utc_config());

    block_on(clock.start()).unwrap();

    let joins = rig.radio.joins.borrow().clone();
    assert_eq!(joins, ["home", "home", "home", "office"]);
    assert!(rig.has_line("Connected to network office"));
}

#[test]
fn unanswered_sync_shows_every_retry_and_carries_on() {
    let rig = Rig::new();
    rig.sntp.completes_at.set(u64::MAX);
    rig.set_time(datetime!(1970-01-01 00:00:42));
    let mut clock = rig.controller(utc_config());

    block_on(clock.start()).unwrap();

    let retries: Vec<_> = rig
        .flaps
        .shown
        .borrow()
        .iter()
        .filter(|(text, _)| text.starts_with("sync") && text != "sync  ")
        .cloned()
        .collect();
    assert_eq!(retries.len(), 15);
    assert_eq!(retries[0], ("sync01".to_string(), false));
    assert_eq!(retries[14], ("sync15".to_string(), false));
    assert!(rig.has_line("Sync time: 1970-01-01 00:00:42"));
    assert_eq!(clock.surface().led_program(), LedProgram::Awake);
    assert!(rig.clock.now() >= 2_000 + 15 * 2_000);
    assert!(!clock.state().time_synchronized);
}

#[test]
fn late_time_sync_is_noticed_and_redraws_the_clock() {
    let rig = Rig::new();
    rig.sntp.completes_at.set(u64::MAX);
    rig.set_time(datetime!(2024-01-15 12:00:00));
    let mut clock = rig.started(utc_config());
    assert!(!clock.state().time_synchronized);

    block_on(clock.run_once()).unwrap();
    block_on(clock.run_once()).unwrap();
    assert_eq!(rig.shown(), ["1200pm"]);

    rig.sntp.completes_at.set(0);
    block_on(clock.run_once()).unwrap();

    assert!(clock.state().time_synchronized);
    assert_eq!(rig.shown(), ["1200pm", "1200pm"]);
}

#[test]
fn recalibration_waits_for_the_date_dwell() {
    let rig = Rig::new();
    rig.set_time(datetime!(2024-01-15 10:24:03));
    let mut clock = rig.started(ClockConfig {
        recalibration_interval_ms: 5_000,
        ..utc_config()
    });

    block_on(clock.run_once()).unwrap();
    rig.set_time(datetime!(2024-01-15 10:24:04));
    block_on(clock.run_once()).unwrap();

    rig.clock.advance(6_000);
    rig.set_time(datetime!(2024-01-15 10:24:10));
    block_on(clock.run_once()).unwrap();
    block_on(clock.run_once()).unwrap();
    assert_eq!(rig.shown(), ["1024am", "150124"]);
    assert_eq!(rig.flaps.resets.get(), 0);

    rig.clock.advance(30_000);
    rig.set_time(datetime!(2024-01-15 10:24:40));
    block_on(clock.run_once()).unwrap();
    block_on(clock.run_once()).unwrap();
    assert_eq!(rig.flaps.resets.get(), 1);
    assert_eq!(rig.last_shown(), Some(("1024am".to_string(), false)));
}

#[test]
fn stored_credentials_are_retried_while_the_portal_is_open() {
    let rig = Rig::new();
    rig.radio.outage_until_ms.set(1_000);
    rig.set_time(datetime!(2024-01-15 12:00:00));
    let mut clock = rig.controller(utc_config());

    block_on(clock.start()).unwrap();

    assert_eq!(*rig.radio.joins.borrow(), ["home"; 4]);
    assert_eq!(rig.radio.portals_opened.get(), 1);
    assert!(!rig.radio.portal_open.get());
    assert_eq!(clock.connectivity(), ConnectivityState::Connected);
    assert!(rig.has_line("Connected to network home"));
    // First background retry is one retry interval after the portal opened.
    assert!(rig.clock.now() >= 10_000);
}

#[test]
fn stalled_joins_time_out_before_the_portal_opens() {
    let rig = Rig::new();
    rig.radio.stalled.borrow_mut().push("home".to_string());
    rig.radio.accepts.borrow_mut().push("cabin".to_string());
    rig.radio.submit(0, "cabin", "pine", ScheduleWindow::default());
    rig.set_time(datetime!(2024-01-15 12:00:00));
    let mut clock = rig.controller(utc_config());

    block_on(clock.start()).unwrap();

    assert_eq!(*rig.radio.joins.borrow(), ["home", "home", "home", "cabin"]);
    assert_eq!(rig.radio.leaves.get(), 3);
    assert!(rig.clock.now() >= 3 * 20_000);
    let stored = rig.store.0.borrow().clone().unwrap();
    assert_eq!(stored.credentials.unwrap().ssid.as_str(), "cabin");
}

#[test]
fn failed_portal_join_recovers_and_takes_the_next_submission() {
    let rig = Rig::new();
    *rig.store.0.borrow_mut() = None;
    rig.radio.accepts.borrow_mut().push("cabin".to_string());
    rig.radio.submit(0, "cabn", "pine", ScheduleWindow::default());
    rig.radio.submit(0, "cabin", "pine", ScheduleWindow::default());
    rig.set_time(datetime!(2024-01-15 12:00:00));
    let mut clock = rig.controller(utc_config());

    block_on(clock.start()).unwrap();

    assert_eq!(*rig.radio.joins.borrow(), ["cabn", "cabin"]);
    assert!(rig.has_line("WiFi join failed"));
    assert!(rig.has_line("Connected to network cabin"));
    assert_eq!(clock.connectivity(), ConnectivityState::Connected);
}

#[test]
fn portal_join_that_never_answers_is_abandoned() {
    let rig = Rig::new();
    *rig.store.0.borrow_mut() = None;
    rig.radio.stalled.borrow_mut().push("slow".to_string());
    rig.radio.accepts.borrow_mut().push("cabin".to_string());
    rig.radio.submit(0, "slow", "", ScheduleWindow::default());
    rig.radio.submit(25_000, "cabin", "pine", ScheduleWindow::default());
    rig.set_time(datetime!(2024-01-15 12:00:00));
    let mut clock = rig.controller(utc_config());

    block_on(clock.start()).unwrap();

    assert_eq!(*rig.radio.joins.borrow(), ["slow", "cabin"]);
    assert_eq!(rig.radio.leaves.get(), 1);
    assert!(rig.clock.now() >= 25_000);
    assert!(!rig.radio.portal_open.get());
}
