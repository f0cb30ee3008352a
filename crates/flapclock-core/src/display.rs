//! Text rendering and refresh policy for the flap modules.

use core::fmt::Write as _;

use heapless::String;
use log::{info, warn};
use time::{Date, PrimitiveDateTime};

use crate::ports::SplitflapDisplay;
use crate::schedule::ScheduleWindow;

pub const MIN_MODULES: usize = 4;
pub const MAX_MODULES: usize = 8;

pub type ModuleText = String<MAX_MODULES>;

/// Short words shown while the clock is not yet telling time.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StatusWord {
    Wifi,
    Setup,
    Ready,
    Sync,
    SyncRetry(u8),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DisplayConfig {
    pub module_count: usize,
    pub date_dwell_ms: u64,
    /// Second within the minute on which the date readout fires.
    pub date_second: u8,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            module_count: 6,
            date_dwell_ms: 30_000,
            date_second: 4,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct MinuteStamp {
    date: Date,
    hour: u8,
    minute: u8,
}

impl MinuteStamp {
    fn of(time: &PrimitiveDateTime) -> Self {
        Self {
            date: time.date(),
            hour: time.hour(),
            minute: time.minute(),
        }
    }
}

#[derive(Debug)]
pub struct ClockDisplayDriver {
    config: DisplayConfig,
    date_interval_minutes: u8,
    date_hold_until_ms: Option<u64>,
    last_date_minute: Option<MinuteStamp>,
}

impl ClockDisplayDriver {
    pub fn new(config: DisplayConfig, window: &ScheduleWindow) -> Self {
        let module_count = config.module_count.clamp(MIN_MODULES, MAX_MODULES);
        if module_count != config.module_count {
            warn!(
                "display module count {} out of range; using {}",
                config.module_count, module_count
            );
        }

        Self {
            config: DisplayConfig {
                module_count,
                ..config
            },
            date_interval_minutes: window.date_display_interval_minutes,
            date_hold_until_ms: None,
            last_date_minute: None,
        }
    }

    pub fn module_count(&self) -> usize {
        self.config.module_count
    }

    pub fn set_window(&mut self, window: &ScheduleWindow) {
        self.date_interval_minutes = window.date_display_interval_minutes;
    }

    /// `hhmm` on twelve-hour time, plus `am`/`pm` on six modules or more.
    pub fn clock_text(&self, now: &PrimitiveDateTime) -> ModuleText {
        let hour12 = match now.hour() % 12 {
            0 => 12,
            hour => hour,
        };

        let mut text = ModuleText::new();
        let _ = write!(text, "{:02}{:02}", hour12, now.minute());
        if self.module_count() >= 6 {
            let _ = text.push_str(if now.hour() >= 12 { "pm" } else { "am" });
        }
        self.fit(&text)
    }

    /// `ddmmyy` on six modules or more, `ddmm` otherwise.
    pub fn date_text(&self, now: &PrimitiveDateTime) -> ModuleText {
        let mut text = ModuleText::new();
        let _ = write!(text, "{:02}{:02}", now.day(), u8::from(now.month()));
        if self.module_count() >= 6 {
            let _ = write!(text, "{:02}", now.year().rem_euclid(100));
        }
        self.fit(&text)
    }

    pub fn blank_text(&self) -> ModuleText {
        self.fit("")
    }

    pub fn status_text(&self, word: StatusWord) -> ModuleText {
        status_text(word, self.module_count())
    }

    /// True while a date readout is still on the modules.
    pub fn is_holding_date(&mut self, now_ms: u64) -> bool {
        match self.date_hold_until_ms {
            Some(until) if now_ms < until => true,
            Some(_) => {
                self.date_hold_until_ms = None;
                false
            }
            None => false,
        }
    }

    /// Writes the clock unless `last_displayed` already shows this minute.
    pub fn show_clock<D: SplitflapDisplay>(
        &mut self,
        now: &PrimitiveDateTime,
        last_displayed: &mut Option<PrimitiveDateTime>,
        display: &mut D,
    ) -> Result<bool, D::Error> {
        if last_displayed
            .as_ref()
            .is_some_and(|last| MinuteStamp::of(last) == MinuteStamp::of(now))
        {
            return Ok(false);
        }

        let text = self.clock_text(now);
        display.show_string(&text, self.module_count(), false)?;
        *last_displayed = Some(*now);
        Ok(true)
    }

    /// Shows the date once on every minute divisible by the configured
    /// interval (never at minute zero), at `date_second`. The readout is held
    /// for the dwell time and the clock is redrawn afterwards.
    pub fn show_date<D: SplitflapDisplay>(
        &mut self,
        now: &PrimitiveDateTime,
        now_ms: u64,
        last_displayed: &mut Option<PrimitiveDateTime>,
        display: &mut D,
    ) -> Result<bool, D::Error> {
        let interval = self.date_interval_minutes;
        if interval == 0 {
            return Ok(false);
        }

        let minute = now.minute();
        if minute == 0 || minute % interval != 0 || now.second() != self.config.date_second {
            return Ok(false);
        }

        let stamp = MinuteStamp::of(now);
        if self.last_date_minute == Some(stamp) {
            return Ok(false);
        }

        let text = self.date_text(now);
        info!("Showing date {}", text.as_str());
        display.show_string(&text, self.module_count(), false)?;
        self.last_date_minute = Some(stamp);
        self.date_hold_until_ms = Some(now_ms.saturating_add(self.config.date_dwell_ms));
        *last_displayed = None;
        Ok(true)
    }

    /// Forgets what the modules show, e.g. after blanking them.
    pub fn invalidate(&mut self, last_displayed: &mut Option<PrimitiveDateTime>) {
        *last_displayed = None;
        self.date_hold_until_ms = None;
    }

    fn fit(&self, text: &str) -> ModuleText {
        fit_to_modules(text, self.module_count())
    }
}

/// Status word abbreviated for narrow displays and padded to width.
pub fn status_text(word: StatusWord, module_count: usize) -> ModuleText {
    let wide = module_count >= 6;
    let mut text = ModuleText::new();
    let _ = match word {
        StatusWord::Wifi => text.push_str("wifi"),
        StatusWord::Sync => text.push_str("sync"),
        StatusWord::Ready if wide => text.push_str("ready"),
        StatusWord::Ready => text.push_str("redy"),
        StatusWord::Setup if wide => text.push_str("setup"),
        StatusWord::Setup => text.push_str("setp"),
        StatusWord::SyncRetry(n) if wide => write!(text, "sync{:02}", n % 100).map_err(|_| ()),
        StatusWord::SyncRetry(n) => write!(text, "sy{:02}", n % 100).map_err(|_| ()),
    };
    fit_to_modules(&text, module_count)
}

/// Truncates or space-pads `text` to exactly `module_count` glyphs.
pub fn fit_to_modules(text: &str, module_count: usize) -> ModuleText {
    let width = module_count.min(MAX_MODULES);
    let mut fitted = ModuleText::new();
    for ch in text.chars().take(width) {
        let _ = fitted.push(ch);
    }
    while fitted.len() < width {
        let _ = fitted.push(' ');
    }
    fitted
}
