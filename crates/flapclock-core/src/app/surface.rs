//! The user-facing peripherals plus the bounded wait that keeps them live.

use log::{info, warn};

use crate::display::{StatusWord, status_text};
use crate::input::{ButtonEvent, ButtonInput};
use crate::led::{LedAnimator, LedProgram};
use crate::ports::{ClockPlatform, SplitflapDisplay, StatusScreen, Ticker};

/// A long press was seen; the caller should unwind to the factory reset.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ResetRequested;

/// Which subsystems a wait keeps ticking.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Servicing {
    pub button: bool,
    pub leds: bool,
}

impl Servicing {
    pub const ALL: Self = Self {
        button: true,
        leds: true,
    };
    pub const LEDS_ONLY: Self = Self {
        button: false,
        leds: true,
    };
}

pub struct ControlSurface<P: ClockPlatform> {
    button: ButtonInput<P::Button>,
    leds: LedAnimator<P::Leds>,
    display: P::Display,
    status: P::Status,
    ticker: P::Ticker,
    module_count: usize,
    sleep_toggle_pending: bool,
    reset_pending: bool,
    button_fault_logged: bool,
    led_fault_logged: bool,
}

impl<P> ControlSurface<P>
where
    P: ClockPlatform,
{
    pub fn new(
        button: ButtonInput<P::Button>,
        leds: LedAnimator<P::Leds>,
        display: P::Display,
        status: P::Status,
        ticker: P::Ticker,
        module_count: usize,
    ) -> Self {
        Self {
            button,
            leds,
            display,
            status,
            ticker,
            module_count,
            sleep_toggle_pending: false,
            reset_pending: false,
            button_fault_logged: false,
            led_fault_logged: false,
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.ticker.now_ms()
    }

    /// Ticks the selected subsystems once and dispatches the button event.
    pub fn service(&mut self, servicing: Servicing) -> ButtonEvent {
        let now_ms = self.ticker.now_ms();
        let mut event = ButtonEvent::None;

        if servicing.button {
            event = match self.button.tick(now_ms) {
                Ok(event) => event,
                Err(err) => {
                    if !self.button_fault_logged {
                        warn!("button: read failed err={:?}", err);
                        self.button_fault_logged = true;
                    }
                    ButtonEvent::None
                }
            };

            match event {
                ButtonEvent::Click => {
                    info!("Sleep press");
                    self.sleep_toggle_pending = true;
                }
                ButtonEvent::LongPress => {
                    info!("Reset press");
                    self.reset_pending = true;
                }
                ButtonEvent::None => {}
            }
        }

        if servicing.leds
            && let Err(err) = self.leds.tick(now_ms)
            && !self.led_fault_logged
        {
            warn!("led: write failed err={:?}", err);
            self.led_fault_logged = true;
        }

        event
    }

    /// Waits `duration_ms` while servicing at 1 ms granularity. Returns early
    /// with [`ResetRequested`] once a long press has been seen.
    pub async fn wait(&mut self, duration_ms: u64, servicing: Servicing) -> Result<(), ResetRequested> {
        let started_ms = self.ticker.now_ms();
        loop {
            self.service(servicing);
            if self.reset_pending {
                return Err(ResetRequested);
            }
            if self.ticker.now_ms().saturating_sub(started_ms) >= duration_ms {
                return Ok(());
            }
            self.ticker.pause_ms(1).await;
        }
    }

    pub fn take_sleep_toggle(&mut self) -> bool {
        core::mem::take(&mut self.sleep_toggle_pending)
    }

    pub fn acknowledge_reset(&mut self) {
        self.reset_pending = false;
    }

    pub fn led_program(&self) -> LedProgram {
        self.leds.program()
    }

    pub fn set_led_program(&mut self, program: LedProgram) {
        let now_ms = self.ticker.now_ms();
        self.leds.set_program(program, now_ms);
    }

    pub fn module_count(&self) -> usize {
        self.module_count
    }

    pub fn show(&mut self, text: &str, force_refresh: bool) {
        if let Err(err) = self.display.show_string(text, self.module_count, force_refresh) {
            warn!("display: write failed text={} err={:?}", text, err);
        }
    }

    pub fn show_status(&mut self, word: StatusWord, force_refresh: bool) {
        let text = status_text(word, self.module_count);
        self.show(&text, force_refresh);
    }

    pub fn reset_all(&mut self) {
        if let Err(err) = self.display.reset_all() {
            warn!("display: reset failed err={:?}", err);
        }
    }

    pub fn set_message(&mut self, line: u8, text: &str) {
        self.status.set_message(line, text);
    }

    pub fn display(&self) -> &P::Display {
        &self.display
    }

    pub(crate) fn display_mut(&mut self) -> &mut P::Display {
        &mut self.display
    }
}
