#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use embassy_executor::Spawner;
use embassy_futures::join::{join, join4};
use embassy_net::{Ipv4Address, Ipv4Cidr, StackResources, StaticConfigV4};
use embassy_time::Timer;
use esp_hal::{
    clock::CpuClock,
    gpio::{DriveMode, Input, InputConfig, Pull, interconnect::PeripheralOutput},
    ledc::{self, LSGlobalClkSource, Ledc, LowSpeed, channel::ChannelIFace, timer::TimerIFace},
    system::software_reset,
    time::Rate,
    timer::timg::TimerGroup,
    uart::{Config as UartConfig, Uart},
};
use flapclock_core::{
    app::{ClockConfig, ClockController, ClockParts, FactoryReset},
    display::DisplayConfig,
};
use flapclock_hal_esp32s3::{
    led::pwm::PwmRgbLed,
    network::{
        EspNetwork, WifiLink, dhcp_server_loop, dns_server_loop, portal_http_loop, wifi_link_loop,
    },
    platform::{splitflap::SerialSplitflap, status::LogStatusScreen},
    storage::flash_settings::FlashSettingsStore,
    time::{
        sntp::{SntpClock, sntp_loop},
        ticker::EmbassyTicker,
    },
};
use log::{LevelFilter, info};
use static_cell::StaticCell;

use platform::{EspPlatform, LedChannel};

#[path = "main/bootstrap.rs"]
mod bootstrap;
#[path = "main/platform.rs"]
mod platform;

const SPLITFLAP_MODULES: usize = 6;
const SPLITFLAP_BAUD: u32 = 115_200;
const LED_PWM_KHZ: u32 = 24;
const RESTART_DELAY_MS: u64 = 200;

const AP_ADDRESS: Ipv4Address = Ipv4Address::new(192, 168, 4, 1);
const AP_POOL_START: Ipv4Address = Ipv4Address::new(192, 168, 4, 10);
const AP_POOL_SIZE: u8 = 8;

static WIFI_LINK: WifiLink = WifiLink::new();
static SNTP_CLOCK: SntpClock = SntpClock::new();
static STA_RESOURCES: StaticCell<StackResources<4>> = StaticCell::new();
static AP_RESOURCES: StaticCell<StackResources<4>> = StaticCell::new();
static LED_TIMER: StaticCell<ledc::timer::Timer<'static, LowSpeed>> = StaticCell::new();

#[panic_handler]
fn panic(_: &core::panic::PanicInfo) -> ! {
    loop {}
}

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

fn clock_config() -> ClockConfig {
    ClockConfig {
        display: DisplayConfig {
            module_count: SPLITFLAP_MODULES,
            ..DisplayConfig::default()
        },
        ..ClockConfig::default()
    }
}

fn led_channel(
    ledc: &Ledc<'static>,
    timer: &'static ledc::timer::Timer<'static, LowSpeed>,
    number: ledc::channel::Number,
    pin: impl PeripheralOutput<'static>,
) -> LedChannel {
    let mut channel = ledc.channel(number, pin);
    channel
        .configure(ledc::channel::config::Config {
            timer,
            // Common-anode LED: full duty is dark.
            duty_pct: 100,
            drive_mode: DriveMode::PushPull,
        })
        .unwrap();
    channel
}

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(_spawner: Spawner) -> ! {
    esp_println::logger::init_logger(LevelFilter::Info);
    esp_println::println!("boot: flapclock starting");

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    // esp-radio requires an allocator.
    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 65536);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    // Wiring: BUTTON=GPIO12 (to GND), LED R/G/B=GPIO4/5/6 (common anode),
    // motor board UART1 TX=GPIO17 RX=GPIO18.
    let button = Input::new(
        peripherals.GPIO12,
        InputConfig::default().with_pull(Pull::Up),
    );

    let mut ledc = Ledc::new(peripherals.LEDC);
    ledc.set_global_slow_clock(LSGlobalClkSource::APBClk);
    let led_timer = LED_TIMER.init(ledc.timer::<LowSpeed>(ledc::timer::Number::Timer0));
    led_timer
        .configure(ledc::timer::config::Config {
            duty: ledc::timer::config::Duty::Duty8Bit,
            clock_source: ledc::timer::LSClockSource::APBClk,
            frequency: Rate::from_khz(LED_PWM_KHZ),
        })
        .unwrap();
    let led_timer = &*led_timer;
    let leds = PwmRgbLed::new(
        led_channel(&ledc, led_timer, ledc::channel::Number::Channel0, peripherals.GPIO4),
        led_channel(&ledc, led_timer, ledc::channel::Number::Channel1, peripherals.GPIO5),
        led_channel(&ledc, led_timer, ledc::channel::Number::Channel2, peripherals.GPIO6),
    );

    let splitflap_uart = Uart::new(
        peripherals.UART1,
        UartConfig::default().with_baudrate(SPLITFLAP_BAUD),
    )
    .unwrap()
    .with_tx(peripherals.GPIO17)
    .with_rx(peripherals.GPIO18);
    let display = SerialSplitflap::new(splitflap_uart);

    let mut settings_store = match FlashSettingsStore::new() {
        Ok(store) => Some(store),
        Err(err) => {
            info!(
                "settings storage unavailable err={:?}; settings will be volatile",
                err
            );
            None
        }
    };
    bootstrap::seed_credentials(&mut settings_store);

    let radio = match esp_radio::init() {
        Ok(radio) => radio,
        Err(err) => {
            info!("esp-radio init failed: {:?}", err);
            loop {
                Timer::after_secs(1).await;
            }
        }
    };

    let (mut wifi_controller, interfaces) =
        match esp_radio::wifi::new(&radio, peripherals.WIFI, esp_radio::wifi::Config::default()) {
            Ok(parts) => parts,
            Err(err) => {
                info!("wifi peripheral init failed: {:?}", err);
                loop {
                    Timer::after_secs(1).await;
                }
            }
        };

    let (sta_stack, mut sta_runner) = embassy_net::new(
        interfaces.sta,
        embassy_net::Config::dhcpv4(Default::default()),
        STA_RESOURCES.init(StackResources::<4>::new()),
        0x5A17_2B34_D099_EE11,
    );
    let (ap_stack, mut ap_runner) = embassy_net::new(
        interfaces.ap,
        embassy_net::Config::ipv4_static(StaticConfigV4 {
            address: Ipv4Cidr::new(AP_ADDRESS, 24),
            gateway: Some(AP_ADDRESS),
            dns_servers: Default::default(),
        }),
        AP_RESOURCES.init(StackResources::<4>::new()),
        0x3C91_7E05_A4B2_6D18,
    );

    let parts = ClockParts::<EspPlatform> {
        button,
        leds,
        display,
        status: LogStatusScreen,
        ticker: EmbassyTicker::new(),
        network: EspNetwork::new(&WIFI_LINK),
        store: settings_store,
        time: &SNTP_CLOCK,
    };
    let mut controller =
        ClockController::new(parts, clock_config()).unwrap_or_else(|err| match err {});

    info!(
        "Clock started: modules={} button=GPIO12 leds=GPIO4/5/6 uart=GPIO17/18",
        SPLITFLAP_MODULES
    );

    let net_future = join(sta_runner.run(), ap_runner.run());
    let wifi_future = wifi_link_loop(&mut wifi_controller, sta_stack, &WIFI_LINK);
    let services_future = join4(
        sntp_loop(sta_stack, &SNTP_CLOCK),
        portal_http_loop(ap_stack, &WIFI_LINK),
        dns_server_loop(ap_stack, AP_ADDRESS),
        dhcp_server_loop(ap_stack, AP_ADDRESS, AP_POOL_START, AP_POOL_SIZE),
    );
    let clock_future = async {
        let FactoryReset = controller.run().await;
        Timer::after_millis(RESTART_DELAY_MS).await;
        software_reset()
    };

    let _ = join4(net_future, wifi_future, services_future, clock_future).await;
    unreachable!()
}
