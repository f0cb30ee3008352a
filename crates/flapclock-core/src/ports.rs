//! Collaborator traits the board crate implements.

use core::fmt::Debug;

use embedded_hal::digital::InputPin;

use crate::led::LedOutput;
use crate::network::NetworkBackend;
use crate::settings::SettingsStore;
use crate::time_sync::TimeSource;

/// Link to the split-flap module controller.
pub trait SplitflapDisplay {
    type Error: Debug;

    /// Shows `text` left-aligned over the first `module_count` modules.
    /// Without `force_refresh` modules already showing the right glyph stay
    /// put; with it every module spins through a full revolution.
    fn show_string(
        &mut self,
        text: &str,
        module_count: usize,
        force_refresh: bool,
    ) -> Result<(), Self::Error>;

    /// Re-homes every module against its hall sensor.
    fn reset_all(&mut self) -> Result<(), Self::Error>;
}

/// Secondary status line sink (serial console, small OLED).
pub trait StatusScreen {
    fn set_message(&mut self, line: u8, text: &str);
}

/// Monotonic millisecond clock plus a cooperative pause.
#[allow(async_fn_in_trait)]
pub trait Ticker {
    fn now_ms(&self) -> u64;

    async fn pause_ms(&mut self, ms: u32);
}

/// Bundles every board-provided type the controller is generic over.
pub trait ClockPlatform {
    type Button: InputPin;
    type Leds: LedOutput;
    type Display: SplitflapDisplay;
    type Status: StatusScreen;
    type Ticker: Ticker;
    type Network: NetworkBackend;
    type Store: SettingsStore;
    type Time: TimeSource;
}
