use crate::byte_sink::ByteSink;

// see https://www.w3.org/Graphics/GIF/spec-gif89a.txt, Appendix F
// Code table is an open addressing hash of (prefix, pixel) pairs, cleared as soon as it is full.

const BITS: u32 = 12;
const MAX_MAX_CODE: i32 = 1 << BITS; // one past the last code which fits into 12 bits
const HASH_TABLE_SIZE: usize = 5003; // prime, ~80% occupancy when all 4096 codes are assigned
const HASH_SHIFT: u32 = hash_shift(HASH_TABLE_SIZE);
const MAX_PACKET_SIZE: usize = 254;

// shift which keeps (pixel << shift) ^ prefix inside of the table
const fn hash_shift(table_size: usize) -> u32 {
    let mut shift = 0;
    let mut fcode = table_size;

    while fcode < 65536 {
        shift += 1;
        fcode *= 2;
    }

    8 - shift
}

const fn max_code(code_size: u32) -> i32 {
    (1 << code_size) - 1
}

/// Bits which did not make a full byte yet, plus current code width bookkeeping.
struct BitAccumulator {
    accum: u32,
    bits: u32,
    code_size: u32,
    init_code_size: u32,
    max_code: i32,
    clear_pending: bool,
}

impl BitAccumulator {

    fn new(init_code_size: u32) -> Self {
        BitAccumulator {
            accum: 0,
            bits: 0,
            code_size: init_code_size,
            init_code_size,
            max_code: max_code(init_code_size),
            clear_pending: false,
        }
    }

    fn write_code(&mut self, code: u32, packet: &mut Packet, sink: &mut ByteSink) {
        self.accum &= (1 << self.bits) - 1;
        self.accum |= code << self.bits;
        self.bits += self.code_size;

        while self.bits >= 8 {
            packet.push((self.accum & 0xFF) as u8, sink);
            self.accum >>= 8;
            self.bits -= 8;
        }
    }

    // called after every code, width only goes back down right after a clear code
    fn update_code_size(&mut self, next_code: i32) {
        if self.clear_pending {
            self.code_size = self.init_code_size;
            self.max_code = max_code(self.code_size);
            self.clear_pending = false;
        } else if next_code > self.max_code {
            self.code_size += 1;
            self.max_code = if self.code_size == BITS {
                MAX_MAX_CODE
            } else {
                max_code(self.code_size)
            };
        }
    }

    fn flush(&mut self, packet: &mut Packet, sink: &mut ByteSink) {
        if self.bits > 0 {
            packet.push((self.accum & 0xFF) as u8, sink);
            self.accum = 0;
            self.bits = 0;
        }
    }
}

/// Data of the sub-block which is being filled.
struct Packet {
    data: [u8; MAX_PACKET_SIZE],
    len: usize,
}

impl Packet {

    fn new() -> Self {
        Packet {
            data: [0; MAX_PACKET_SIZE],
            len: 0,
        }
    }

    fn push(&mut self, byte: u8, sink: &mut ByteSink) {
        self.data[self.len] = byte;
        self.len += 1;

        if self.len >= MAX_PACKET_SIZE {
            self.flush(sink);
        }
    }

    fn flush(&mut self, sink: &mut ByteSink) {
        if self.len > 0 {
            sink.write_byte(self.len as u8);
            sink.write_bytes(&self.data[..self.len]);
            self.len = 0;
        }
    }
}

pub struct LZWEncoder {
    init_code_size: u8,
    clear_code: i32,
    eof_code: i32,
    next_code: i32,
    hash_table: Vec<i32>, // (pixel << BITS) + prefix, -1 for free slots
    code_table: Vec<i32>,
    accumulator: BitAccumulator,
    packet: Packet,
}

impl LZWEncoder {

    pub fn new(color_depth: u8) -> Self {
        let init_code_size = color_depth.max(2);
        let clear_code = 1 << init_code_size;

        LZWEncoder {
            init_code_size,
            clear_code,
            eof_code: clear_code + 1,
            next_code: clear_code + 2,
            hash_table: vec![-1; HASH_TABLE_SIZE],
            code_table: vec![0; HASH_TABLE_SIZE],
            accumulator: BitAccumulator::new(init_code_size as u32 + 1),
            packet: Packet::new(),
        }
    }

    /// Writes the complete image data block: code size byte, sub-blocks and the terminator.
    pub fn encode(&mut self, pixels: &[u8], sink: &mut ByteSink) {
        let start = sink.len();

        sink.write_byte(self.init_code_size);
        self.compress(pixels, sink);
        sink.write_byte(0);

        debug!("{} pixels compressed into {} bytes", pixels.len(), sink.len() - start);
    }

    fn compress(&mut self, pixels: &[u8], sink: &mut ByteSink) {
        self.accumulator = BitAccumulator::new(self.init_code_size as u32 + 1);
        self.packet = Packet::new();
        self.next_code = self.clear_code + 2;
        self.reset_hash_table();

        self.output(self.clear_code, sink);

        let mut pixels = pixels.iter();
        let mut prefix = match pixels.next() {
            Some(pixel) => *pixel as i32,
            None => {
                self.output(self.eof_code, sink);
                return;
            }
        };

        'pixels: for &pixel in pixels {
            let pixel = pixel as i32;
            let fcode = (pixel << BITS) + prefix;
            let mut i = ((pixel << HASH_SHIFT) ^ prefix) as usize;

            if self.hash_table[i] == fcode {
                prefix = self.code_table[i];
                continue;
            }

            if self.hash_table[i] >= 0 {
                let displacement = if i == 0 {
                    1
                } else {
                    HASH_TABLE_SIZE - i
                };

                loop {
                    i = if i >= displacement {
                        i - displacement
                    } else {
                        i + HASH_TABLE_SIZE - displacement
                    };

                    if self.hash_table[i] == fcode {
                        prefix = self.code_table[i];
                        continue 'pixels;
                    }

                    if self.hash_table[i] < 0 {
                        break;
                    }
                }
            }

            self.output(prefix, sink);
            prefix = pixel;

            if self.next_code < MAX_MAX_CODE {
                self.code_table[i] = self.next_code;
                self.hash_table[i] = fcode;
                self.next_code += 1;
            } else {
                self.clear_block(sink);
            }
        }

        self.output(prefix, sink);
        self.output(self.eof_code, sink);
    }

    fn clear_block(&mut self, sink: &mut ByteSink) {
        trace!("code table is full, emitting clear code");

        self.reset_hash_table();
        self.next_code = self.clear_code + 2;
        self.accumulator.clear_pending = true;
        self.output(self.clear_code, sink);
    }

    fn reset_hash_table(&mut self) {
        self.hash_table.iter_mut().for_each(|slot| *slot = -1);
    }

    fn output(&mut self, code: i32, sink: &mut ByteSink) {
        self.accumulator.write_code(code as u32, &mut self.packet, sink);
        self.accumulator.update_code_size(self.next_code);

        if code == self.eof_code {
            self.accumulator.flush(&mut self.packet, sink);
            self.packet.flush(sink);
        }
    }
}
