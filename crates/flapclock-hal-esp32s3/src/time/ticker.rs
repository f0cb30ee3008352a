use embassy_time::{Instant, Timer};
use flapclock_core::ports::Ticker;

/// Milliseconds since construction, paused on the embassy timer queue.
#[derive(Debug, Clone, Copy)]
pub struct EmbassyTicker {
    origin: Instant,
}

impl EmbassyTicker {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for EmbassyTicker {
    fn default() -> Self {
        Self::new()
    }
}

impl Ticker for EmbassyTicker {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis()
    }

    async fn pause_ms(&mut self, ms: u32) {
        Timer::after_millis(u64::from(ms)).await;
    }
}
