use flapclock_core::ports::StatusScreen;
use log::info;

/// Status lines go to the serial log; the clock has no secondary display.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogStatusScreen;

impl StatusScreen for LogStatusScreen {
    fn set_message(&mut self, line: u8, text: &str) {
        info!("status[{}]: {}", line, text);
    }
}
