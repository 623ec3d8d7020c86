use canvas_core::models::Pixel;

use crate::byte_sink::ByteSink;

// color tables are always written with all 256 entries
pub const COLOR_TABLE_ENTRIES: usize = 256;
pub const COLOR_TABLE_SIZE: usize = COLOR_TABLE_ENTRIES * 3;

// every palette index fits into a byte
pub const COLOR_DEPTH: u8 = 8;

#[derive(Clone)]
pub struct ColorTable {
    pub colors: Vec<Pixel>,
}

impl ColorTable {

    pub fn new(colors: &[Pixel]) -> Self {
        ColorTable {
            colors: colors.iter().take(COLOR_TABLE_ENTRIES).copied().collect(),
        }
    }

    /// Value of the 3 bit "size of color table" field, which declares 2^(n+1) entries.
    pub fn size_bits(&self) -> u8 {
        (COLOR_TABLE_ENTRIES.trailing_zeros() - 1) as u8
    }

    /// Writes the table padded with black up to 256 entries.
    pub fn write(&self, sink: &mut ByteSink) {
        for color in &self.colors {
            sink.write_bytes(&[color.red, color.green, color.blue]);
        }

        for _ in self.colors.len()..COLOR_TABLE_ENTRIES {
            sink.write_bytes(&[0, 0, 0]);
        }
    }
}
