use embedded_io::Write;
use flapclock_core::{display::MAX_MODULES, ports::SplitflapDisplay};
use heapless::Vec;

/// Glyphs printed on the flaps, in drum order.
pub const FLAPS: &[u8] = b" abcdefghijklmnopqrstuvwxyz0123456789.,'";

const CMD_SHOW: u8 = b'=';
const CMD_SHOW_FORCED: u8 = b'!';
const CMD_RESET: u8 = b'@';

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SplitflapLinkError<E> {
    Io(E),
    UnsupportedGlyph(char),
}

/// Line protocol to the motor controller board.
///
/// `=text` moves only modules whose glyph changes, `!text` spins every
/// module through a full revolution first, `@` re-homes all modules.
/// Text is lower-cased and padded with blanks to the module count.
#[derive(Debug)]
pub struct SerialSplitflap<W> {
    link: W,
}

impl<W> SerialSplitflap<W>
where
    W: Write,
{
    pub fn new(link: W) -> Self {
        Self { link }
    }

    fn send(&mut self, line: &[u8]) -> Result<(), SplitflapLinkError<W::Error>> {
        self.link.write_all(line).map_err(SplitflapLinkError::Io)?;
        self.link.flush().map_err(SplitflapLinkError::Io)
    }
}

impl<W> SplitflapDisplay for SerialSplitflap<W>
where
    W: Write,
{
    type Error = SplitflapLinkError<W::Error>;

    fn show_string(
        &mut self,
        text: &str,
        module_count: usize,
        force_refresh: bool,
    ) -> Result<(), Self::Error> {
        let module_count = module_count.min(MAX_MODULES);
        let mut line: Vec<u8, { MAX_MODULES + 2 }> = Vec::new();
        let command = if force_refresh {
            CMD_SHOW_FORCED
        } else {
            CMD_SHOW
        };
        let _ = line.push(command);

        let mut glyphs = text.chars().map(|ch| ch.to_ascii_lowercase());
        for _ in 0..module_count {
            let glyph = glyphs.next().unwrap_or(' ');
            if !glyph.is_ascii() || !FLAPS.contains(&(glyph as u8)) {
                return Err(SplitflapLinkError::UnsupportedGlyph(glyph));
            }
            let _ = line.push(glyph as u8);
        }
        let _ = line.push(b'\n');

        self.send(&line)
    }

    fn reset_all(&mut self) -> Result<(), Self::Error> {
        self.send(&[CMD_RESET, b'\n'])
    }
}
