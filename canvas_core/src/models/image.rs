use super::{io::ImageIOError, pixel::Pixel};

/// A dense RGBA surface, the shape frames arrive in from a canvas.
#[derive(Clone)]
pub struct Image {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<Pixel>, // starting at top left pixel of the image, pos = y * width + x
}

impl Image {

    pub fn new(width: usize, height: usize) -> Self {
        Image {
            width,
            height,
            pixels: vec![Pixel::zero(); width * height],
        }
    }

    pub fn from_rgba_bytes(width: usize, height: usize, data: &[u8]) -> Result<Self, ImageIOError> {
        let expected = width * height * 4;
        if data.len() != expected {
            return Err(ImageIOError::FailedToRead {
                description: format!("expected {} bytes of rgba data for {}x{} image, got {}", expected, width, height, data.len()),
            });
        }

        let pixels = data.chunks_exact(4)
            .map(|v| Pixel::from_rgba(v[0], v[1], v[2], v[3]))
            .collect();

        Ok(Image {
            width,
            height,
            pixels,
        })
    }

    pub fn test_image() -> Self {
        let mut image = Self::new(4, 4);

        let white = Pixel::from_rgb(255, 255, 255);
        let blue = Pixel::from_rgb(3, 155, 229);
        let red = Pixel::from_rgb(221, 47, 47);

        image.fill(white);
        image.set_pixel(1, 1, blue);
        image.set_pixel(2, 1, blue);
        image.set_pixel(1, 2, blue);
        image.set_pixel(2, 2, red);

        image
    }

    pub fn test_image_with_alpha() -> Self {
        let mut image = Self::new(4, 4);

        let transparent = Pixel::from_rgba(255, 255, 255, 0);

        image.fill(transparent);
        image.set_pixel(1, 1, Pixel::from_rgba(3, 155, 229, 255));
        image.set_pixel(2, 1, Pixel::from_rgba(3, 155, 229, 150));
        image.set_pixel(1, 2, Pixel::from_rgba(3, 155, 229, 100));
        image.set_pixel(2, 2, Pixel::from_rgba(221, 47, 47, 255));

        image
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, pixel: Pixel) {
        self.pixels[y * self.width + x] = pixel;
    }

    pub fn get_pixel(&self, x: usize, y: usize) -> Pixel {
        self.pixels[y * self.width + x]
    }

    pub fn fill(&mut self, color: Pixel) {
        for y in 0..self.height {
            for x in 0..self.width {
                self.set_pixel(x, y, color);
            }
        }
    }

    /// Reads a rectangle as row-major RGBA bytes, 4 bytes per pixel.
    pub fn read_region(&self, left: usize, top: usize, width: usize, height: usize) -> Result<Vec<u8>, ImageIOError> {
        if left + width > self.width || top + height > self.height {
            return Err(ImageIOError::FailedToRead {
                description: format!(
                    "region {}x{} at ({}, {}) does not fit into {}x{} image",
                    width, height, left, top, self.width, self.height
                ),
            });
        }

        trace!("reading {}x{} region at ({}, {})", width, height, left, top);

        let mut data = Vec::with_capacity(width * height * 4);
        for y in top..top + height {
            for x in left..left + width {
                data.extend_from_slice(&self.get_pixel(x, y).rgba());
            }
        }

        Ok(data)
    }

    pub fn to_rgba_bytes(&self) -> Vec<u8> {
        self.pixels.iter().flat_map(|v| v.rgba()).collect()
    }
}
