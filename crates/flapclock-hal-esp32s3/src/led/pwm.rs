use embedded_hal::pwm::SetDutyCycle;
use flapclock_core::led::{CHANNEL_COUNT, LedOutput};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum LedOutputError<RedErr, GreenErr, BlueErr> {
    Red(RedErr),
    Green(GreenErr),
    Blue(BlueErr),
}

/// Three PWM channels driving one RGB LED.
///
/// The status LED on the clock is common-anode, so a channel at full duty is
/// dark. Brightness levels from the animator are inverted here.
#[derive(Debug)]
pub struct PwmRgbLed<R, G, B> {
    red: R,
    green: G,
    blue: B,
}

impl<R, G, B> PwmRgbLed<R, G, B>
where
    R: SetDutyCycle,
    G: SetDutyCycle,
    B: SetDutyCycle,
{
    pub fn new(red: R, green: G, blue: B) -> Self {
        Self { red, green, blue }
    }

    fn duty(&self, level: u8) -> u16 {
        u16::from(u8::MAX - level)
    }
}

impl<R, G, B> LedOutput for PwmRgbLed<R, G, B>
where
    R: SetDutyCycle,
    G: SetDutyCycle,
    B: SetDutyCycle,
{
    type Error = LedOutputError<R::Error, G::Error, B::Error>;

    fn write_levels(&mut self, levels: [u8; CHANNEL_COUNT]) -> Result<(), Self::Error> {
        let [red, green, blue] = levels;
        let full = u16::from(u8::MAX);

        let duty = self.duty(red);
        self.red
            .set_duty_cycle_fraction(duty, full)
            .map_err(LedOutputError::Red)?;
        let duty = self.duty(green);
        self.green
            .set_duty_cycle_fraction(duty, full)
            .map_err(LedOutputError::Green)?;
        let duty = self.duty(blue);
        self.blue
            .set_duty_cycle_fraction(duty, full)
            .map_err(LedOutputError::Blue)?;
        Ok(())
    }
}
