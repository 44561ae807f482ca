//! Encodes raw pixel buffers into PNG streams, in place or on a worker thread.

pub mod chunks;
mod crc;
mod decoder;
mod encoder;
mod error;
mod filters;
mod image_data;
mod pixel;
mod scanlines;
mod stack;
mod task;
mod utils;

pub use chunks::ihdr::ColorType;
pub use decoder::{decode, DecodedImage};
pub use encoder::{encode, EncodedImage, Encoder, EncoderOptions, DEFAULT_MAX_CHUNK_SIZE};
pub use error::{EncodeError, EncodeResult};
pub use filters::{Filter, FilterStrategy};
pub use image_data::Compression;
pub use pixel::{BitDepth, ColorMode, Palette, PixelBuffer, MAX_DIMENSION};
pub use stack::{DynamicStack, FixedStack, Rect};
pub use task::EncodeTask;
