use byteorder::{ByteOrder, LittleEndian};

/// Append-only buffer the GIF stream is assembled in.
pub struct ByteSink {
    data: Vec<u8>,
}

impl ByteSink {

    pub fn new() -> Self {
        ByteSink {
            data: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        ByteSink {
            data: Vec::with_capacity(capacity),
        }
    }

    pub fn write_byte(&mut self, value: u8) {
        self.data.push(value);
    }

    pub fn write_bytes(&mut self, data: &[u8]) {
        self.data.extend_from_slice(data);
    }

    pub fn write_short_le(&mut self, value: u16) {
        let mut buf = [0u8; 2];
        LittleEndian::write_u16(&mut buf, value);
        self.data.extend_from_slice(&buf);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Hands out everything written so far and leaves the sink empty.
    pub fn finalize(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.data)
    }
}
