use std::collections::HashMap;

use custom_error::custom_error;

use super::image::Image;

custom_error! {pub ImageIOError
    FailedToRead {description: String} = "Failed to read image: {description}",
    FailedToWrite {description: String} = "Failed to write image: {description}",
    InvalidOptions {description: String} = "Invalid options are set for this io operation: {description}",
}

pub trait ImageWriter {

    fn write(&self, image: &Image, options: &ImageWriterOptions) -> Result<Vec<u8>, ImageIOError>;
}

#[derive(Clone, Debug)]
pub struct ImageWriterOptions {

    options: HashMap<String, String>,
}

impl ImageWriterOptions {

    pub fn default() -> Self {
        Self {
            options: HashMap::new(),
        }
    }

    pub fn with_option(&self, key: &str, value: &str) -> Self {
        let mut options = self.options.clone();
        options.insert(key.to_string(), value.to_string());

        Self {
            options,
        }
    }

    pub fn with_option_u32(&self, key: &str, value: u32) -> Self {
        self.with_option(key, &value.to_string())
    }

    pub fn with_option_i32(&self, key: &str, value: i32) -> Self {
        self.with_option(key, &value.to_string())
    }

    pub fn with_option_bool(&self, key: &str, value: bool) -> Self {
        self.with_option(key, if value {
            "true"
        } else {
            "false"
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.options.contains_key(key)
    }

    pub fn get_bool(&self, key: &str, default: bool) -> Result<bool, ImageIOError> {
        let value = match self.options.get(key) {
            Some(v) => v,
            None => return Ok(default),
        };

        match value.to_lowercase().trim() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(ImageIOError::InvalidOptions {
                description: format!("failed to parse option value as a bool: {}", other),
            })
        }
    }

    pub fn get_u32(&self, key: &str, default: u32) -> Result<u32, ImageIOError> {
        match self.options.get(key) {
            Some(v) => v.trim().parse().map_err(|err| ImageIOError::InvalidOptions {
                description: format!("failed to parse option {} as u32: {}", key, err),
            }),
            None => Ok(default),
        }
    }

    pub fn get_i32(&self, key: &str, default: i32) -> Result<i32, ImageIOError> {
        match self.options.get(key) {
            Some(v) => v.trim().parse().map_err(|err| ImageIOError::InvalidOptions {
                description: format!("failed to parse option {} as i32: {}", key, err),
            }),
            None => Ok(default),
        }
    }

    /// Colors are accepted both as decimal numbers and as 0xRRGGBB.
    pub fn get_color(&self, key: &str) -> Result<Option<u32>, ImageIOError> {
        let value = match self.options.get(key) {
            Some(v) => v.trim().to_lowercase(),
            None => return Ok(None),
        };

        let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix('#')) {
            Some(hex) => u32::from_str_radix(hex, 16),
            None => value.parse(),
        };

        match parsed {
            Ok(color) if color <= 0xFFFFFF => Ok(Some(color)),
            Ok(color) => Err(ImageIOError::InvalidOptions {
                description: format!("color for option {} is out of rgb range: {:#x}", key, color),
            }),
            Err(err) => Err(ImageIOError::InvalidOptions {
                description: format!("failed to parse option {} as color: {}", key, err),
            }),
        }
    }
}
