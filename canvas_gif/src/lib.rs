#[macro_use]
extern crate log;
extern crate custom_error;

mod common;
pub mod byte_sink;
pub mod encoder;
pub mod errors;
pub mod lzw;
pub mod quantizer;
pub mod writer;

#[cfg(test)]
mod reader;

pub use encoder::{DisposalMethod, GIFEncoder};
pub use errors::GIFEncoderError;
pub use writer::GIFWriter;
