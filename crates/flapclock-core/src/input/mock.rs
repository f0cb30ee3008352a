use core::cell::Cell;
use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, InputPin};

/// Pin whose level is driven from outside through a shared cell.
#[derive(Debug, Clone, Copy)]
pub struct LevelPin<'a> {
    level: &'a Cell<bool>,
}

impl<'a> LevelPin<'a> {
    pub const fn new(level: &'a Cell<bool>) -> Self {
        Self { level }
    }
}

impl ErrorType for LevelPin<'_> {
    type Error = Infallible;
}

impl InputPin for LevelPin<'_> {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.level.get())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.level.get())
    }
}
