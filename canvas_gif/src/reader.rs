//! Walks the blocks of an encoded GIF and decodes image data, so tests can check what was written.

use bit_vec::BitVec;
use byteorder::{ByteOrder, LittleEndian};
use custom_error::custom_error;

// see https://www.fileformat.info/format/gif/egff.htm

custom_error! {pub GIFReaderError
    InvalidHeader {description: String} = "Invalid header: {description}",
    InvalidBlock {description: String} = "Invalid block: {description}",
    NotImplemented {description: String} = "Not implemented: {description}"
}

pub struct GIF {
    pub screen_width: u16,
    pub screen_height: u16,
    pub packed: u8,
    pub background_color: u8,
    pub aspect_ratio: u8,
    pub global_color_table: Option<Vec<u8>>,
    pub loop_counts: Vec<u16>,
    pub graphic_control_extensions: usize,
    pub frames: Vec<Frame>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GraphicControl {
    pub packed: u8,
    pub delay: u16,
    pub transparent_index: u8,
}

impl GraphicControl {

    pub fn disposal(&self) -> u8 {
        (self.packed >> 2) & 0b111
    }

    pub fn has_transparency(&self) -> bool {
        self.packed & 0b1 == 1
    }
}

pub struct Frame {
    pub left: u16,
    pub top: u16,
    pub width: u16,
    pub height: u16,
    pub packed: u8,
    pub graphic_control: Option<GraphicControl>,
    pub local_color_table: Option<Vec<u8>>,
    pub min_code_size: u8,
    pub sub_block_lengths: Vec<u8>,
    pub indices: Vec<u8>,
}

pub fn read_gif(data: &[u8]) -> Result<GIF, GIFReaderError> {
    match take(data, 0, 6)? {
        b"GIF89a" => {},
        signature => return Err(GIFReaderError::InvalidHeader {
            description: format!("Unexpected signature for GIF89a: {:x?}", signature),
        })
    };

    let descriptor = take(data, 6, 7)?;
    let packed = descriptor[4];

    let mut gif = GIF {
        screen_width: LittleEndian::read_u16(&descriptor[0..2]),
        screen_height: LittleEndian::read_u16(&descriptor[2..4]),
        packed,
        background_color: descriptor[5],
        aspect_ratio: descriptor[6],
        global_color_table: None,
        loop_counts: Vec::new(),
        graphic_control_extensions: 0,
        frames: Vec::new(),
    };

    trace!("packed is {:?}", packed);

    let mut offset = 13;
    if packed & 0b1000_0000 != 0 {
        let size = color_table_size(packed);
        gif.global_color_table = Some(take(data, offset, size)?.to_vec());
        offset += size;
    }

    let mut graphic_control = None;

    loop {
        match take(data, offset, 1)?[0] {
            0x21 => {
                let label = take(data, offset + 1, 1)?[0];
                offset += 2;

                match label {
                    0xF9 => {
                        let block = take(data, offset, 6)?;
                        if block[0] != 4 || block[5] != 0 {
                            return Err(GIFReaderError::InvalidBlock {
                                description: format!("malformed graphic control extension: {:x?}", block),
                            });
                        }

                        graphic_control = Some(GraphicControl {
                            packed: block[1],
                            delay: LittleEndian::read_u16(&block[2..4]),
                            transparent_index: block[4],
                        });
                        gif.graphic_control_extensions += 1;
                        offset += 6;
                    },
                    0xFF => {
                        let size = take(data, offset, 1)?[0] as usize;
                        let identifier = take(data, offset + 1, size)?.to_vec();
                        let (payload, _, next) = read_sub_blocks(data, offset + 1 + size)?;
                        offset = next;

                        if identifier == b"NETSCAPE2.0" && payload.len() == 3 && payload[0] == 1 {
                            gif.loop_counts.push(LittleEndian::read_u16(&payload[1..3]));
                        }
                    },
                    _ => {
                        let (_, _, next) = read_sub_blocks(data, offset)?;
                        offset = next;
                    },
                }
            },
            0x2C => {
                let (frame, next) = read_frame(data, offset, graphic_control.take())?;
                gif.frames.push(frame);
                offset = next;
            },
            0x3B => {
                if offset + 1 != data.len() {
                    return Err(GIFReaderError::InvalidBlock {
                        description: format!("trailer at {} is followed by {} bytes", offset, data.len() - offset - 1),
                    });
                }

                return Ok(gif);
            },
            other => return Err(GIFReaderError::InvalidBlock {
                description: format!("unexpected block introducer {:x} at {}", other, offset),
            }),
        }
    }
}

fn read_frame(data: &[u8], offset: usize, graphic_control: Option<GraphicControl>) -> Result<(Frame, usize), GIFReaderError> {
    let descriptor = take(data, offset, 10)?;
    let packed = descriptor[9];

    if packed & 0b0100_0000 != 0 {
        return Err(GIFReaderError::NotImplemented {
            description: "interlaced images are not supported".to_string(),
        });
    }

    let mut offset = offset + 10;
    let mut local_color_table = None;
    if packed & 0b1000_0000 != 0 {
        let size = color_table_size(packed);
        local_color_table = Some(take(data, offset, size)?.to_vec());
        offset += size;
    }

    let min_code_size = take(data, offset, 1)?[0];
    let (compressed, sub_block_lengths, next) = read_sub_blocks(data, offset + 1)?;
    let indices = decode_lzw(min_code_size, &compressed)?;

    Ok((Frame {
        left: LittleEndian::read_u16(&descriptor[1..3]),
        top: LittleEndian::read_u16(&descriptor[3..5]),
        width: LittleEndian::read_u16(&descriptor[5..7]),
        height: LittleEndian::read_u16(&descriptor[7..9]),
        packed,
        graphic_control,
        local_color_table,
        min_code_size,
        sub_block_lengths,
        indices,
    }, next))
}

fn color_table_size(packed: u8) -> usize {
    3 * (1 << ((packed & 0b111) + 1))
}

fn take(data: &[u8], offset: usize, len: usize) -> Result<&[u8], GIFReaderError> {
    data.get(offset..offset + len).ok_or_else(|| GIFReaderError::InvalidBlock {
        description: format!("expected {} bytes at {}, but data is {} bytes long", len, offset, data.len()),
    })
}

/// Concatenates sub-blocks starting at `offset` up to the zero terminator.
/// Returns the payload, every block length and the offset right after the terminator.
pub fn read_sub_blocks(data: &[u8], offset: usize) -> Result<(Vec<u8>, Vec<u8>, usize), GIFReaderError> {
    let mut payload = Vec::new();
    let mut lengths = Vec::new();
    let mut offset = offset;

    loop {
        let len = take(data, offset, 1)?[0];
        offset += 1;

        if len == 0 {
            return Ok((payload, lengths, offset));
        }

        payload.extend_from_slice(take(data, offset, len as usize)?);
        lengths.push(len);
        offset += len as usize;
    }
}

pub fn decode_lzw(min_code_size: u8, data: &[u8]) -> Result<Vec<u8>, GIFReaderError> {
    decode_lzw_traced(min_code_size, data).map(|(indices, _)| indices)
}

/// Same as `decode_lzw`, but also returns every code read together with its width in bits.
pub fn decode_lzw_traced(min_code_size: u8, data: &[u8]) -> Result<(Vec<u8>, Vec<(u16, u8)>), GIFReaderError> {
    let bits = bit_vec_for_source_bytes(data);

    let mut indices = Vec::new();
    let mut codes = Vec::new();
    let mut dictionary: Vec<Vec<u8>> = Vec::new(); // index is a key
    let (clear_index, end_index) = init_dictionary(&mut dictionary, min_code_size);
    let mut code_size = min_code_size + 1;
    let mut offset = 0;
    let mut prev_code: Option<usize> = None;

    while offset + code_size as usize <= bits.len() {
        let code = read_bits(&bits, offset, code_size) as usize;
        codes.push((code as u16, code_size));
        offset += code_size as usize;

        if code == clear_index {
            init_dictionary(&mut dictionary, min_code_size);
            code_size = min_code_size + 1;
            prev_code = None;
            continue;
        }

        if code == end_index {
            return Ok((indices, codes));
        }

        let entry = if code < dictionary.len() {
            dictionary[code].clone()
        } else if let (true, Some(prev_code)) = (code == dictionary.len(), prev_code) {
            // match to an entry that has just been encoded.
            let mut entry = dictionary[prev_code].clone();
            entry.push(entry[0]);
            entry
        } else {
            return Err(GIFReaderError::InvalidBlock {
                description: format!("code {} is not in the dictionary of {} entries", code, dictionary.len()),
            });
        };

        indices.extend_from_slice(&entry);

        if let Some(prev_code) = prev_code {
            if dictionary.len() < 4096 {
                let mut new_entry = dictionary[prev_code].clone();
                new_entry.push(entry[0]);
                dictionary.push(new_entry);
            }
        }

        prev_code = Some(code);

        if dictionary.len() == 1 << code_size && code_size < 12 {
            code_size += 1;
        }
    }

    Err(GIFReaderError::InvalidBlock {
        description: "compressed data ended without end of information code".to_string(),
    })
}

fn init_dictionary(dictionary: &mut Vec<Vec<u8>>, min_code_size: u8) -> (usize, usize) {
    dictionary.clear();

    for i in 0..(1usize << min_code_size) {
        dictionary.push(vec![i as u8]);
    }

    let clear_index = dictionary.len();
    dictionary.push(Vec::new());

    let end_index = dictionary.len();
    dictionary.push(Vec::new());

    (clear_index, end_index)
}

fn read_bits(bits: &BitVec, offset: usize, total: u8) -> u16 {
    let mut result = 0;

    for i in 0..total {
        result <<= 1;
        let bit = if bits[offset + (total as usize - 1 - i as usize)] { 1 } else { 0 };
        result |= bit;
    }

    result
}

fn bit_vec_for_source_bytes(data: &[u8]) -> BitVec {
    BitVec::from_fn(data.len() * 8, |x| (data[x / 8] >> (x % 8)) & 0b1 == 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitvec_offsets() {
        let data: Vec<u8> = vec![
            0b10000000,
            0b00000001,
            0b00000111,
            0b00011100,
        ];

        let bits = bit_vec_for_source_bytes(&data);

        let offset = 0;
        let code_size = 9;
        assert_eq!(read_bits(&bits, offset, code_size), 0b110_000_000);

        let offset = offset + code_size as usize;
        assert_eq!(read_bits(&bits, offset, code_size), 0b110_000_000);

        let offset = offset + code_size as usize;
        let code_size = code_size + 1;
        assert_eq!(read_bits(&bits, offset, code_size), 0b110_000_000_1);
    }

    #[test]
    fn test_read_sub_blocks() {
        let data = vec![0xAA, 2, 1, 2, 1, 3, 0, 0x3B];

        let (payload, lengths, next) = read_sub_blocks(&data, 1).expect("failed to read sub-blocks");

        assert_eq!(payload, vec![1, 2, 3]);
        assert_eq!(lengths, vec![2, 1]);
        assert_eq!(next, 7);

        assert!(read_sub_blocks(&data[..4], 1).is_err());
    }

    #[test]
    fn test_read_rejects_garbage() {
        assert!(read_gif(b"GIF87a").is_err());
        assert!(read_gif(b"PNG").is_err());
    }
}
