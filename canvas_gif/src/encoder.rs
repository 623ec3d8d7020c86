use canvas_core::models::Image;

use crate::{
    byte_sink::ByteSink,
    common::{ColorTable, COLOR_DEPTH, COLOR_TABLE_SIZE},
    errors::GIFEncoderError,
    lzw::LZWEncoder,
    quantizer::{Quantizer, MAX_PALETTE_SIZE},
};

pub const DEFAULT_DELAY: u16 = 3; // centiseconds, roughly 30 frames per second
pub const DEFAULT_REPEAT: i32 = 0;
pub const DEFAULT_QUALITY: u32 = 10;

pub const PLAY_ONCE: i32 = -1;
pub const MAX_REPEAT: i32 = 20;

/// What a decoder does with the frame before rendering the next one.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DisposalMethod {
    None,       // 0 - No disposal specified
    Keep,       // 1 - Keep previous image
    Background, // 2 - Restore background color
    Previous,   // 3 - Restore previous frame
}

impl DisposalMethod {

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(DisposalMethod::None),
            1 => Some(DisposalMethod::Keep),
            2 => Some(DisposalMethod::Background),
            3 => Some(DisposalMethod::Previous),
            _ => None,
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            DisposalMethod::None => 0,
            DisposalMethod::Keep => 1,
            DisposalMethod::Background => 2,
            DisposalMethod::Previous => 3,
        }
    }
}

// Current State | Call      | Next State
// Idle          | start     | Started
// Started       | add_frame | Started
// Started       | finish    | Finished
// options can only be changed while Idle
#[derive(Debug, PartialEq)]
enum EncoderState {
    Idle,
    Started,
    Finished,
}

// palette built from the first frame, every later frame is mapped onto it
struct SharedPalette {
    quantizer: Quantizer,
    color_table: ColorTable,
}

/// Writes frames of a fixed size into an animated GIF89a.
pub struct GIFEncoder {
    width: u16,
    height: u16,
    state: EncoderState,

    delay: u16,
    repeat: i32,
    dispose: Option<DisposalMethod>,
    transparent: Option<u32>,
    sample: u32,
    max_colors: usize,

    palette: Option<SharedPalette>,
    frame_count: usize,
    out: ByteSink,
}

impl GIFEncoder {

    pub fn new(width: u16, height: u16) -> Self {
        GIFEncoder {
            width,
            height,
            state: EncoderState::Idle,
            delay: DEFAULT_DELAY,
            repeat: DEFAULT_REPEAT,
            dispose: None,
            transparent: None,
            sample: DEFAULT_QUALITY,
            max_colors: MAX_PALETTE_SIZE,
            palette: None,
            frame_count: 0,
            out: ByteSink::with_capacity(2 * COLOR_TABLE_SIZE),
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn delay(&self) -> u16 {
        self.delay
    }

    pub fn repeat(&self) -> i32 {
        self.repeat
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn is_started(&self) -> bool {
        self.state == EncoderState::Started
    }

    /// Delay between frames in hundredths of a second.
    pub fn set_delay(&mut self, centiseconds: u16) -> Result<&mut Self, GIFEncoderError> {
        self.ensure_configurable("set delay")?;
        self.delay = centiseconds;
        Ok(self)
    }

    pub fn set_frame_rate(&mut self, fps: f32) -> Result<&mut Self, GIFEncoderError> {
        self.ensure_configurable("set frame rate")?;

        if !fps.is_finite() || fps <= 0.0 {
            return Err(GIFEncoderError::InvalidOption {
                description: format!("frame rate should be a positive number, got {}", fps),
            });
        }

        self.delay = (100.0 / fps).round() as u16;
        Ok(self)
    }

    /// If not set, frames are not disposed without a transparent color and restored to background with one.
    pub fn set_dispose(&mut self, dispose: DisposalMethod) -> Result<&mut Self, GIFEncoderError> {
        self.ensure_configurable("set disposal method")?;
        self.dispose = Some(dispose);
        Ok(self)
    }

    /// -1 plays the animation once, 0 loops forever, anything else loops that many times (up to 20).
    pub fn set_repeat(&mut self, repeat: i32) -> Result<&mut Self, GIFEncoderError> {
        self.ensure_configurable("set repeat")?;
        self.repeat = repeat.max(PLAY_ONCE).min(MAX_REPEAT);
        Ok(self)
    }

    /// 1 gives the best palette, higher values look at fewer pixels when building it.
    pub fn set_quality(&mut self, quality: u32) -> Result<&mut Self, GIFEncoderError> {
        self.ensure_configurable("set quality")?;
        self.sample = quality.max(1);
        Ok(self)
    }

    pub fn set_max_colors(&mut self, max_colors: usize) -> Result<&mut Self, GIFEncoderError> {
        self.ensure_configurable("set max colors")?;
        self.max_colors = max_colors.max(2).min(MAX_PALETTE_SIZE);
        Ok(self)
    }

    /// Color (0xRRGGBB) which fully transparent pixels are replaced with.
    pub fn set_transparent(&mut self, color: Option<u32>) -> Result<&mut Self, GIFEncoderError> {
        self.ensure_configurable("set transparent color")?;

        if let Some(color) = color {
            if color > 0xFFFFFF {
                return Err(GIFEncoderError::InvalidOption {
                    description: format!("transparent color should be 0xRRGGBB, got {:#x}", color),
                });
            }
        }

        self.transparent = color;
        Ok(self)
    }

    pub fn start(&mut self) -> Result<&mut Self, GIFEncoderError> {
        self.ensure_configurable("start encoding")?;

        self.out.write_bytes(b"GIF89a");
        self.state = EncoderState::Started;

        debug!("started {}x{} gif", self.width, self.height);
        Ok(self)
    }

    /// Adds a frame from row-major rgba bytes, exactly width * height * 4 of them.
    pub fn add_frame(&mut self, rgba: &[u8]) -> Result<(), GIFEncoderError> {
        self.ensure_started("add frame")?;

        let expected = self.width as usize * self.height as usize * 4;
        if rgba.len() != expected {
            return Err(GIFEncoderError::MissingPixelData {
                expected,
                actual: rgba.len(),
            });
        }

        let pixels = image_pixels(rgba);
        let first_frame = self.frame_count == 0;

        let mut palette = match self.palette.take() {
            Some(palette) => palette,
            None => self.write_screen(&pixels),
        };

        let (indexed_pixels, transparent_index) = analyze_pixels(&mut palette.quantizer, &pixels, rgba, self.transparent);

        self.write_graphic_control_ext(transparent_index);
        self.write_image_descriptor(first_frame, &palette.color_table);
        if !first_frame {
            palette.color_table.write(&mut self.out);
        }

        LZWEncoder::new(COLOR_DEPTH).encode(&indexed_pixels, &mut self.out);

        self.palette = Some(palette);
        self.frame_count += 1;

        info!("frame #{} written, {} bytes so far", self.frame_count, self.out.len());
        Ok(())
    }

    /// Adds the top left width x height region of the image as a frame.
    pub fn add_image(&mut self, image: &Image) -> Result<(), GIFEncoderError> {
        self.ensure_started("add image")?;

        let rgba = image.read_region(0, 0, self.width as usize, self.height as usize)
            .map_err(|_| GIFEncoderError::MissingPixelData {
                expected: self.width as usize * self.height as usize * 4,
                actual: image.width * image.height * 4,
            })?;

        self.add_frame(&rgba)
    }

    /// Writes the trailer and hands out the complete file.
    pub fn finish(&mut self) -> Result<Vec<u8>, GIFEncoderError> {
        self.ensure_started("finish")?;

        self.out.write_byte(0x3B);
        self.state = EncoderState::Finished;

        info!("gif finished: {} frames, {} bytes", self.frame_count, self.out.len());
        Ok(self.out.finalize())
    }

    fn ensure_configurable(&self, operation: &str) -> Result<(), GIFEncoderError> {
        match self.state {
            EncoderState::Idle => Ok(()),
            EncoderState::Started => Err(GIFEncoderError::AlreadyStarted {
                operation: operation.to_string(),
            }),
            EncoderState::Finished => Err(GIFEncoderError::AlreadyFinished {
                operation: operation.to_string(),
            }),
        }
    }

    fn ensure_started(&self, operation: &str) -> Result<(), GIFEncoderError> {
        match self.state {
            EncoderState::Started => Ok(()),
            EncoderState::Idle => Err(GIFEncoderError::NotStarted {
                operation: operation.to_string(),
            }),
            EncoderState::Finished => Err(GIFEncoderError::AlreadyFinished {
                operation: operation.to_string(),
            }),
        }
    }

    // logical screen descriptor, global color table and looping extension, written once
    fn write_screen(&mut self, pixels: &[u8]) -> SharedPalette {
        let mut quantizer = Quantizer::new(self.sample, self.max_colors);
        quantizer.build_palette(pixels);
        let color_table = ColorTable::new(quantizer.palette());
        info!("color palette selected: {} colors", color_table.colors.len());

        self.write_logical_screen_descriptor(&color_table);
        color_table.write(&mut self.out);

        if self.repeat != PLAY_ONCE {
            self.write_netscape_ext();
        }

        SharedPalette {
            quantizer,
            color_table,
        }
    }

    fn write_logical_screen_descriptor(&mut self, color_table: &ColorTable) {
        self.out.write_short_le(self.width);
        self.out.write_short_le(self.height);

        let mut packed: u8 = 0;
        packed |= 0b1000_0000; // use global color table
        packed |= 7 << 4; // color resolution
        packed |= color_table.size_bits();
        trace!("logical screen descriptor packed is {:#010b}", packed);

        self.out.write_byte(packed);
        self.out.write_byte(0); // background color index
        self.out.write_byte(0); // pixel aspect ratio
    }

    fn write_netscape_ext(&mut self) {
        self.out.write_byte(0x21); // extension introducer
        self.out.write_byte(0xFF); // application extension label
        self.out.write_byte(11); // block size
        self.out.write_bytes(b"NETSCAPE2.0");
        self.out.write_byte(3); // sub-block size
        self.out.write_byte(1); // loop sub-block id
        self.out.write_short_le(self.repeat as u16);
        self.out.write_byte(0); // block terminator
    }

    fn write_graphic_control_ext(&mut self, transparent_index: Option<u8>) {
        self.out.write_byte(0x21); // extension introducer
        self.out.write_byte(0xF9); // graphic control label
        self.out.write_byte(4); // block size

        let disposal = match self.dispose {
            Some(dispose) => dispose.code(),
            None if self.transparent.is_some() => DisposalMethod::Background.code(),
            None => DisposalMethod::None.code(),
        };

        let transparent_flag = if self.transparent.is_some() { 1 } else { 0 };

        // reserved (3 bits) | disposal method (3 bits) | user input flag | transparent color flag
        self.out.write_byte((disposal & 0b111) << 2 | transparent_flag);
        self.out.write_short_le(self.delay);
        self.out.write_byte(transparent_index.unwrap_or(0));
        self.out.write_byte(0); // block terminator
    }

    fn write_image_descriptor(&mut self, first_frame: bool, color_table: &ColorTable) {
        self.out.write_byte(0x2C); // image separator
        self.out.write_short_le(0); // left
        self.out.write_short_le(0); // top
        self.out.write_short_le(self.width);
        self.out.write_short_le(self.height);

        // first frame uses the global color table, the rest repeat it as a local one
        if first_frame {
            self.out.write_byte(0);
        } else {
            self.out.write_byte(0b1000_0000 | color_table.size_bits());
        }
    }
}

// rgba to a flat rgb buffer
fn image_pixels(rgba: &[u8]) -> Vec<u8> {
    let mut pixels = Vec::with_capacity(rgba.len() / 4 * 3);

    for pixel in rgba.chunks_exact(4) {
        pixels.extend_from_slice(&pixel[0..3]);
    }

    pixels
}

fn analyze_pixels(quantizer: &mut Quantizer, pixels: &[u8], rgba: &[u8], transparent: Option<u32>) -> (Vec<u8>, Option<u8>) {
    quantizer.forget_lookups();

    let mut indexed_pixels: Vec<u8> = pixels.chunks_exact(3)
        .map(|v| quantizer.lookup_index(v[0], v[1], v[2]).unwrap_or(0))
        .collect();

    let transparent_index = transparent.and_then(|color| quantizer.closest_to(color));

    if let Some(transparent_index) = transparent_index {
        for (index, pixel) in indexed_pixels.iter_mut().zip(rgba.chunks_exact(4)) {
            if pixel[3] == 0 {
                *index = transparent_index;
            }
        }
    }

    (indexed_pixels, transparent_index)
}
