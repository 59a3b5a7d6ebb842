//! Hex dump rendering for trace-level packet logging.

use std::fmt;

const BYTES_PER_LINE: usize = 16;

/// Renders bytes as `offset  hex bytes  ascii` lines.
///
/// ```text
/// 00000000  fd 00 01 00 73 00 a2 30  81 9f 30 0d 06 09 2a 86  |....s..0..0...*.|
/// ```
pub struct HexDump<'a>(pub &'a [u8]);

impl fmt::Display for HexDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (line, chunk) in self.0.chunks(BYTES_PER_LINE).enumerate() {
            if line > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{:08x} ", line * BYTES_PER_LINE)?;
            for i in 0..BYTES_PER_LINE {
                if i == BYTES_PER_LINE / 2 {
                    f.write_str(" ")?;
                }
                match chunk.get(i) {
                    Some(byte) => write!(f, " {byte:02x}")?,
                    None => f.write_str("   ")?,
                }
            }
            f.write_str("  |")?;
            for &byte in chunk {
                let c = if byte.is_ascii_graphic() || byte == b' ' {
                    byte as char
                } else {
                    '.'
                };
                write!(f, "{c}")?;
            }
            f.write_str("|")?;
        }
        Ok(())
    }
}
