//! RGB status LED programs.
//!
//! A program is a fixed set of per-channel waveforms. Switching program
//! replaces all three channels at once and restarts the phase from zero.

use log::debug;

pub const CHANNEL_COUNT: usize = 3;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Waveform {
    /// Smooth fade up and back down over `period_ms`.
    Breathe { period_ms: u32 },
    /// Square wave starting in the on phase.
    Blink { on_ms: u32, off_ms: u32 },
    Off,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ChannelAnimation {
    pub waveform: Waveform,
    pub max_brightness: u8,
}

impl ChannelAnimation {
    pub const OFF: Self = Self {
        waveform: Waveform::Off,
        max_brightness: 0,
    };

    pub const fn breathe(period_ms: u32, max_brightness: u8) -> Self {
        Self {
            waveform: Waveform::Breathe { period_ms },
            max_brightness,
        }
    }

    pub const fn blink(on_ms: u32, off_ms: u32, max_brightness: u8) -> Self {
        Self {
            waveform: Waveform::Blink { on_ms, off_ms },
            max_brightness,
        }
    }

    pub fn level_at(&self, elapsed_ms: u64) -> u8 {
        let max = self.max_brightness as u64;
        match self.waveform {
            Waveform::Off => 0,
            Waveform::Blink { on_ms, off_ms } => {
                let period = (on_ms as u64 + off_ms as u64).max(1);
                if elapsed_ms % period < on_ms as u64 {
                    self.max_brightness
                } else {
                    0
                }
            }
            Waveform::Breathe { period_ms } => {
                let period = (period_ms as u64).max(2);
                let half = period / 2;
                let t = elapsed_ms % period;
                let rising = if t < half { t } else { period - t };
                // smoothstep(x) = 3x^2 - 2x^3 on a 0..=1000 scale
                let x = (rising * 1_000 / half).min(1_000);
                let eased = x * x * (3_000 - 2 * x) / 1_000_000;
                (max * eased / 1_000) as u8
            }
        }
    }
}

const BREATHE_PERIOD_MS: u32 = 4_500;

/// Named LED programs, one per controller situation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LedProgram {
    /// Yellow blink shown before the first connection completes.
    Idle,
    /// Dim white breathe while the clock is running.
    Awake,
    /// Red breathe while the display is blanked.
    Asleep,
    /// Fast blue blink for the setup portal and factory reset.
    Provisioning,
    /// Green breathe, free for diagnostics.
    Custom,
}

impl LedProgram {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Awake => "awake",
            Self::Asleep => "asleep",
            Self::Provisioning => "provisioning",
            Self::Custom => "custom",
        }
    }

    /// Red, green and blue channel animations.
    pub const fn channels(self) -> [ChannelAnimation; CHANNEL_COUNT] {
        match self {
            Self::Idle => [
                ChannelAnimation::blink(250, 250, 102),
                ChannelAnimation::blink(250, 250, 230),
                ChannelAnimation::OFF,
            ],
            Self::Awake => [
                ChannelAnimation::breathe(BREATHE_PERIOD_MS, 51),
                ChannelAnimation::breathe(BREATHE_PERIOD_MS, 128),
                ChannelAnimation::breathe(BREATHE_PERIOD_MS, 230),
            ],
            Self::Asleep => [
                ChannelAnimation::breathe(BREATHE_PERIOD_MS, 204),
                ChannelAnimation::OFF,
                ChannelAnimation::OFF,
            ],
            Self::Provisioning => [
                ChannelAnimation::OFF,
                ChannelAnimation::OFF,
                ChannelAnimation::blink(100, 100, 204),
            ],
            Self::Custom => [
                ChannelAnimation::OFF,
                ChannelAnimation::breathe(BREATHE_PERIOD_MS, 204),
                ChannelAnimation::OFF,
            ],
        }
    }
}

/// Three-channel brightness sink. Levels are logical: 0 is off, 255 is full.
pub trait LedOutput {
    type Error: core::fmt::Debug;

    fn write_levels(&mut self, levels: [u8; CHANNEL_COUNT]) -> Result<(), Self::Error>;
}

#[derive(Debug)]
pub struct LedAnimator<O> {
    output: O,
    program: LedProgram,
    channels: [ChannelAnimation; CHANNEL_COUNT],
    started_ms: u64,
    last_levels: Option<[u8; CHANNEL_COUNT]>,
}

impl<O> LedAnimator<O>
where
    O: LedOutput,
{
    pub fn new(output: O, program: LedProgram, now_ms: u64) -> Self {
        Self {
            output,
            program,
            channels: program.channels(),
            started_ms: now_ms,
            last_levels: None,
        }
    }

    pub fn program(&self) -> LedProgram {
        self.program
    }

    pub fn set_program(&mut self, program: LedProgram, now_ms: u64) {
        debug!("led program {} -> {}", self.program.name(), program.name());
        self.program = program;
        self.channels = program.channels();
        self.started_ms = now_ms;
    }

    pub fn levels_at(&self, now_ms: u64) -> [u8; CHANNEL_COUNT] {
        let elapsed = now_ms.saturating_sub(self.started_ms);
        let [r, g, b] = self.channels;
        [r.level_at(elapsed), g.level_at(elapsed), b.level_at(elapsed)]
    }

    /// Advances the animation and pushes changed levels to the output.
    pub fn tick(&mut self, now_ms: u64) -> Result<(), O::Error> {
        let levels = self.levels_at(now_ms);
        if self.last_levels == Some(levels) {
            return Ok(());
        }

        self.output.write_levels(levels)?;
        self.last_levels = Some(levels);
        Ok(())
    }

    pub fn output(&self) -> &O {
        &self.output
    }
}
