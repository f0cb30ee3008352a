//! Awake/asleep decision for each control-loop iteration.

use crate::led::LedProgram;
use crate::schedule::ScheduleWindow;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SleepState {
    #[default]
    Awake,
    Asleep,
}

impl SleepState {
    pub const fn from_asleep(asleep: bool) -> Self {
        if asleep { Self::Asleep } else { Self::Awake }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SleepTransition {
    EnterSleep,
    Wake,
}

impl SleepTransition {
    pub const fn target(self) -> SleepState {
        match self {
            Self::EnterSleep => SleepState::Asleep,
            Self::Wake => SleepState::Awake,
        }
    }

    pub const fn led_program(self) -> LedProgram {
        match self {
            Self::EnterSleep => LedProgram::Asleep,
            Self::Wake => LedProgram::Awake,
        }
    }
}

/// Combines the configured window with a pending manual toggle.
///
/// The toggle forces the opposite transition once. It is not sticky: a
/// manual wake at night holds only until the next evaluation that finds
/// the clock awake inside the sleep window, and the same applies to a
/// manual sleep during the day.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SleepScheduler {
    window: ScheduleWindow,
}

impl SleepScheduler {
    pub const fn new(window: ScheduleWindow) -> Self {
        Self { window }
    }

    pub fn window(&self) -> &ScheduleWindow {
        &self.window
    }

    pub fn set_window(&mut self, window: ScheduleWindow) {
        self.window = window;
    }

    pub fn evaluate(
        &self,
        state: SleepState,
        hour: u8,
        toggle_requested: bool,
    ) -> Option<SleepTransition> {
        match state {
            SleepState::Awake if toggle_requested || self.window.is_sleep_hour(hour) => {
                Some(SleepTransition::EnterSleep)
            }
            SleepState::Asleep if toggle_requested || self.window.is_wake_hour(hour) => {
                Some(SleepTransition::Wake)
            }
            _ => None,
        }
    }
}
