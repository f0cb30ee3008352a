use esp_hal::{
    Blocking,
    gpio::Input,
    ledc::{LowSpeed, channel::Channel},
    uart::Uart,
};
use flapclock_core::ports::ClockPlatform;
use flapclock_hal_esp32s3::{
    led::pwm::PwmRgbLed,
    network::EspNetwork,
    platform::{splitflap::SerialSplitflap, status::LogStatusScreen},
    storage::flash_settings::FlashSettingsStore,
    time::{sntp::SntpClock, ticker::EmbassyTicker},
};

pub(super) type LedChannel = Channel<'static, LowSpeed>;

/// The clock as wired on the ESP32-S3 board.
pub(super) enum EspPlatform {}

impl ClockPlatform for EspPlatform {
    type Button = Input<'static>;
    type Leds = PwmRgbLed<LedChannel, LedChannel, LedChannel>;
    type Display = SerialSplitflap<Uart<'static, Blocking>>;
    type Status = LogStatusScreen;
    type Ticker = EmbassyTicker;
    type Network = EspNetwork;
    // `None` when no settings partition exists; settings then last one boot.
    type Store = Option<FlashSettingsStore>;
    type Time = &'static SntpClock;
}
