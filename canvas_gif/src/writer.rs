use std::convert::TryFrom;

use canvas_core::models::{Image, ImageIOError, ImageWriter, ImageWriterOptions};

use crate::{
    encoder::{DisposalMethod, GIFEncoder, DEFAULT_DELAY, DEFAULT_QUALITY, DEFAULT_REPEAT},
    errors::GIFEncoderError,
    quantizer::MAX_PALETTE_SIZE,
};

pub const OPTION_QUALITY: &str = "quality";
pub const OPTION_REPEAT: &str = "repeat";
pub const OPTION_DELAY: &str = "delay";
pub const OPTION_DISPOSE: &str = "dispose";
pub const OPTION_TRANSPARENT: &str = "transparent";
pub const OPTION_MAX_COLORS: &str = "max_colors";

/// Writes a single image as a one frame GIF.
pub struct GIFWriter {
}

impl GIFWriter {

    pub fn new() -> Self {
        GIFWriter {
        }
    }
}

impl ImageWriter for GIFWriter {

    fn write(&self, image: &Image, options: &ImageWriterOptions) -> Result<Vec<u8>, ImageIOError> {
        let mut encoder = encoder_with_options(image, options)?;

        encode_single_frame(&mut encoder, image).map_err(|err| ImageIOError::FailedToWrite {
            description: format!("failed to encode gif: {}", err),
        })
    }
}

fn encode_single_frame(encoder: &mut GIFEncoder, image: &Image) -> Result<Vec<u8>, GIFEncoderError> {
    encoder.start()?;
    encoder.add_image(image)?;
    encoder.finish()
}

fn encoder_with_options(image: &Image, options: &ImageWriterOptions) -> Result<GIFEncoder, ImageIOError> {
    let (width, height) = match (u16::try_from(image.width), u16::try_from(image.height)) {
        (Ok(width), Ok(height)) => (width, height),
        _ => return Err(ImageIOError::FailedToWrite {
            description: format!("{}x{} image does not fit into gif screen size", image.width, image.height),
        }),
    };

    let delay = options.get_u32(OPTION_DELAY, DEFAULT_DELAY as u32)?;
    let delay = u16::try_from(delay).map_err(|_| ImageIOError::InvalidOptions {
        description: format!("delay should fit into 16 bits, got {}", delay),
    })?;

    let mut encoder = GIFEncoder::new(width, height);
    encoder.set_quality(options.get_u32(OPTION_QUALITY, DEFAULT_QUALITY)?).map_err(invalid_options)?
        .set_repeat(options.get_i32(OPTION_REPEAT, DEFAULT_REPEAT)?).map_err(invalid_options)?
        .set_delay(delay).map_err(invalid_options)?
        .set_max_colors(options.get_u32(OPTION_MAX_COLORS, MAX_PALETTE_SIZE as u32)? as usize).map_err(invalid_options)?
        .set_transparent(options.get_color(OPTION_TRANSPARENT)?).map_err(invalid_options)?;

    if options.contains(OPTION_DISPOSE) {
        let code = options.get_u32(OPTION_DISPOSE, 0)?;
        let dispose = u8::try_from(code).ok()
            .and_then(DisposalMethod::from_code)
            .ok_or_else(|| ImageIOError::InvalidOptions {
                description: format!("unknown disposal method: {}", code),
            })?;

        encoder.set_dispose(dispose).map_err(invalid_options)?;
    }

    Ok(encoder)
}

fn invalid_options(err: GIFEncoderError) -> ImageIOError {
    ImageIOError::InvalidOptions {
        description: err.to_string(),
    }
}
