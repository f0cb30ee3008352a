//! SNTP client disciplining a software wall clock.

use core::cell::Cell;

use embassy_futures::select::select;
use embassy_net::{
    Stack,
    dns::DnsQueryType,
    udp::{PacketMetadata, UdpSocket},
};
use embassy_sync::blocking_mutex::{Mutex, raw::CriticalSectionRawMutex};
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Instant, Timer, WithTimeout};
use flapclock_core::{
    protocol::ntp::{NTP_PORT, NtpReplyError, PACKET_LEN, client_request, parse_reply},
    time_sync::{SyncStatus, TimeSource},
};
use log::{info, warn};

const REPLY_TIMEOUT_SECS: u64 = 5;
const POLL_INTERVAL_SECS: u64 = 3_600;
const RETRY_INTERVAL_SECS: u64 = 2;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SntpError {
    Dns,
    NoAddress,
    Socket,
    Timeout,
    Reply(NtpReplyError),
}

#[derive(Clone, Copy)]
struct SntpState {
    running: bool,
    generation: u32,
    status: SyncStatus,
    servers: [&'static str; 2],
    /// Unix seconds at the last answer plus when it arrived.
    anchor: Option<(i64, Instant)>,
}

/// Wall clock shared by the clock loop ([`TimeSource`]) and [`sntp_loop`].
pub struct SntpClock {
    state: Mutex<CriticalSectionRawMutex, Cell<SntpState>>,
    wake: Signal<CriticalSectionRawMutex, ()>,
}

impl SntpClock {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(Cell::new(SntpState {
                running: false,
                generation: 0,
                status: SyncStatus::Reset,
                servers: ["", ""],
                anchor: None,
            })),
            wake: Signal::new(),
        }
    }

    fn update(&self, f: impl FnOnce(&mut SntpState)) {
        self.state.lock(|cell| {
            let mut state = cell.get();
            f(&mut state);
            cell.set(state);
        });
    }

    fn read(&self) -> SntpState {
        self.state.lock(Cell::get)
    }

    fn active(&self) -> Option<(u32, [&'static str; 2])> {
        let state = self.read();
        state.running.then_some((state.generation, state.servers))
    }

    fn mark_in_progress(&self, generation: u32) {
        self.update(|state| {
            if state.generation == generation && state.status == SyncStatus::Reset {
                state.status = SyncStatus::InProgress;
            }
        });
    }

    fn complete(&self, generation: u32, unix_seconds: i64) {
        self.update(|state| {
            state.anchor = Some((unix_seconds, Instant::now()));
            if state.generation == generation {
                state.status = SyncStatus::Completed;
            }
        });
    }
}

impl Default for SntpClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for &'static SntpClock {
    fn start(&mut self, servers: &[&'static str; 2]) {
        self.update(|state| {
            state.running = true;
            state.generation = state.generation.wrapping_add(1);
            state.status = SyncStatus::Reset;
            state.servers = *servers;
        });
        self.wake.signal(());
    }

    fn stop(&mut self) {
        self.update(|state| {
            state.running = false;
            state.generation = state.generation.wrapping_add(1);
        });
        self.wake.signal(());
    }

    fn is_running(&self) -> bool {
        self.read().running
    }

    fn status(&self) -> SyncStatus {
        self.read().status
    }

    fn now_unix(&self) -> i64 {
        match self.read().anchor {
            Some((unix, at)) => unix + at.elapsed().as_secs() as i64,
            None => Instant::now().as_secs() as i64,
        }
    }
}

/// Polls the configured servers while the client is running: right after
/// each (re)start, then hourly. Failed polls retry every couple of seconds.
pub async fn sntp_loop(stack: Stack<'_>, clock: &'static SntpClock) -> ! {
    loop {
        let Some((generation, servers)) = clock.active() else {
            clock.wake.wait().await;
            continue;
        };
        clock.wake.reset();
        clock.mark_in_progress(generation);

        let delay_secs = match query_any(stack, &servers).await {
            Ok(unix_seconds) => {
                info!("sntp: time set unix={}", unix_seconds);
                clock.complete(generation, unix_seconds);
                POLL_INTERVAL_SECS
            }
            Err(err) => {
                warn!("sntp: poll failed err={:?}", err);
                RETRY_INTERVAL_SECS
            }
        };

        let _ = select(clock.wake.wait(), Timer::after_secs(delay_secs)).await;
    }
}

async fn query_any(stack: Stack<'_>, servers: &[&'static str; 2]) -> Result<i64, SntpError> {
    let mut last_err = SntpError::NoAddress;
    for server in servers.iter().filter(|server| !server.is_empty()) {
        match query(stack, server).await {
            Ok(unix_seconds) => return Ok(unix_seconds),
            Err(err) => {
                info!("sntp: {} failed err={:?}", server, err);
                last_err = err;
            }
        }
    }
    Err(last_err)
}

async fn query(stack: Stack<'_>, server: &str) -> Result<i64, SntpError> {
    let addresses = stack
        .dns_query(server, DnsQueryType::A)
        .await
        .map_err(|_| SntpError::Dns)?;
    let address = *addresses.first().ok_or(SntpError::NoAddress)?;

    let mut rx_meta = [PacketMetadata::EMPTY; 1];
    let mut rx_buffer = [0u8; 128];
    let mut tx_meta = [PacketMetadata::EMPTY; 1];
    let mut tx_buffer = [0u8; 128];
    let mut socket = UdpSocket::new(
        stack,
        &mut rx_meta,
        &mut rx_buffer,
        &mut tx_meta,
        &mut tx_buffer,
    );
    socket.bind(0).map_err(|_| SntpError::Socket)?;

    socket
        .send_to(&client_request(), (address, NTP_PORT))
        .await
        .map_err(|_| SntpError::Socket)?;

    let mut reply = [0u8; PACKET_LEN];
    let (len, _) = socket
        .recv_from(&mut reply)
        .with_timeout(Duration::from_secs(REPLY_TIMEOUT_SECS))
        .await
        .map_err(|_| SntpError::Timeout)?
        .map_err(|_| SntpError::Socket)?;

    parse_reply(&reply[..len]).map_err(SntpError::Reply)
}
