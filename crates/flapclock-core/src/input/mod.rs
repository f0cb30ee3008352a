//! Debounced push-button input.

use embedded_hal::digital::InputPin;
use log::debug;

pub mod mock;

/// Classified press produced by one [`ButtonInput::tick`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ButtonEvent {
    #[default]
    None,
    Click,
    LongPress,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ButtonConfig {
    pub active_low: bool,
    /// Identical consecutive samples needed before a level change counts.
    pub debounce_polls: u8,
    pub long_press_ms: u64,
    /// Longest press, released, that still counts as a click.
    pub click_max_ms: u64,
}

impl Default for ButtonConfig {
    fn default() -> Self {
        Self {
            active_low: true,
            debounce_polls: 3,
            long_press_ms: 5_000,
            click_max_ms: 1_000,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum PressPhase {
    Released,
    Held { since_ms: u64 },
    LongPressed,
}

/// Single-pin button sampled once per control-loop tick.
///
/// The raw level must stay unchanged for `debounce_polls` consecutive ticks
/// before it is accepted. A press that is still held after `long_press_ms`
/// yields exactly one [`ButtonEvent::LongPress`] and nothing on release; a
/// press released within `click_max_ms` yields [`ButtonEvent::Click`].
#[derive(Debug)]
pub struct ButtonInput<SW> {
    pin: SW,
    config: ButtonConfig,
    raw: bool,
    stable: bool,
    stable_count: u8,
    phase: PressPhase,
}

impl<SW> ButtonInput<SW>
where
    SW: InputPin,
{
    pub fn new(mut pin: SW, config: ButtonConfig) -> Result<Self, SW::Error> {
        let pressed = pressed_from_level(pin.is_high()?, config.active_low);

        Ok(Self {
            pin,
            config,
            raw: pressed,
            stable: pressed,
            stable_count: 0,
            // A button held through boot must be released before it counts.
            phase: PressPhase::Released,
        })
    }

    pub fn tick(&mut self, now_ms: u64) -> Result<ButtonEvent, SW::Error> {
        let pressed = pressed_from_level(self.pin.is_high()?, self.config.active_low);

        if pressed == self.raw {
            self.stable_count = self.stable_count.saturating_add(1);
        } else {
            self.raw = pressed;
            self.stable_count = 0;
        }

        let debounce_threshold = self.config.debounce_polls.max(1);
        if self.stable_count >= debounce_threshold && self.stable != self.raw {
            self.stable = self.raw;
            return Ok(self.on_edge(now_ms));
        }

        if let PressPhase::Held { since_ms } = self.phase
            && now_ms.saturating_sub(since_ms) >= self.config.long_press_ms
        {
            self.phase = PressPhase::LongPressed;
            debug!("button long press after {}ms", now_ms.saturating_sub(since_ms));
            return Ok(ButtonEvent::LongPress);
        }

        Ok(ButtonEvent::None)
    }

    pub fn is_pressed(&self) -> bool {
        self.stable
    }

    fn on_edge(&mut self, now_ms: u64) -> ButtonEvent {
        if self.stable {
            self.phase = PressPhase::Held { since_ms: now_ms };
            return ButtonEvent::None;
        }

        let event = match self.phase {
            PressPhase::Held { since_ms }
                if now_ms.saturating_sub(since_ms) <= self.config.click_max_ms =>
            {
                ButtonEvent::Click
            }
            _ => ButtonEvent::None,
        };
        self.phase = PressPhase::Released;
        event
    }
}

#[inline]
fn pressed_from_level(high: bool, active_low: bool) -> bool {
    if active_low { !high } else { high }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::mock::LevelPin;
    use core::cell::Cell;

    fn hold(button: &mut ButtonInput<LevelPin<'_>>, from_ms: u64, to_ms: u64) -> [u32; 3] {
        let mut counts = [0u32; 3];
        for now in from_ms..to_ms {
            match button.tick(now).unwrap() {
                ButtonEvent::None => counts[0] += 1,
                ButtonEvent::Click => counts[1] += 1,
                ButtonEvent::LongPress => counts[2] += 1,
            }
        }
        counts
    }

    #[test]
    fn short_press_is_a_click() {
        let level = Cell::new(true);
        let mut button = ButtonInput::new(LevelPin::new(&level), ButtonConfig::default()).unwrap();

        hold(&mut button, 0, 10);
        level.set(false);
        let pressed = hold(&mut button, 10, 210);
        level.set(true);
        let released = hold(&mut button, 210, 260);

        assert_eq!(pressed[1] + pressed[2], 0);
        assert_eq!(released[1], 1);
        assert_eq!(released[2], 0);
    }

    #[test]
    fn held_press_is_one_long_press_and_no_click() {
        let level = Cell::new(true);
        let mut button = ButtonInput::new(LevelPin::new(&level), ButtonConfig::default()).unwrap();

        level.set(false);
        let pressed = hold(&mut button, 0, 6_000);
        level.set(true);
        let released = hold(&mut button, 6_000, 6_100);

        assert_eq!(pressed[2], 1);
        assert_eq!(pressed[1], 0);
        assert_eq!(released[1] + released[2], 0);
    }

    #[test]
    fn medium_press_is_ignored() {
        let level = Cell::new(true);
        let mut button = ButtonInput::new(LevelPin::new(&level), ButtonConfig::default()).unwrap();

        level.set(false);
        hold(&mut button, 0, 2_500);
        level.set(true);
        let released = hold(&mut button, 2_500, 2_600);

        assert_eq!(released, [100, 0, 0]);
    }

    #[test]
    fn bounce_shorter_than_debounce_window_is_filtered() {
        let level = Cell::new(true);
        let mut button = ButtonInput::new(LevelPin::new(&level), ButtonConfig::default()).unwrap();

        for now in 0..40u64 {
            level.set(now % 2 == 0);
            assert_eq!(button.tick(now).unwrap(), ButtonEvent::None);
        }
        assert!(!button.is_pressed());
    }

    #[test]
    fn press_held_through_boot_is_not_reported() {
        let level = Cell::new(false);
        let mut button = ButtonInput::new(LevelPin::new(&level), ButtonConfig::default()).unwrap();

        let held = hold(&mut button, 0, 6_000);
        level.set(true);
        let released = hold(&mut button, 6_000, 6_050);

        assert_eq!(held[1] + held[2], 0);
        assert_eq!(released[1] + released[2], 0);
    }
}
