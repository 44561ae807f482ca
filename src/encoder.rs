use std::ops::Deref;

use crate::{
    chunks::{
        idat::IDATChunk, iend::IENDChunk, ihdr::IHDRChunk, plte::PLTEChunk, trns::tRNSChunk,
        ParseableChunk, CHUNK_OVERHEAD, SIGNATURE,
    },
    error::EncodeResult,
    filters::{filter_scanlines, FilterStrategy},
    image_data::{compress_data, Compression},
    utils::div_ceil,
    PixelBuffer,
};

/// Largest payload a single IDAT chunk may carry by default.
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 8192;

/// PNG limits chunk lengths to 31 bits.
const MAX_CHUNK_LENGTH: usize = i32::MAX as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderOptions {
    pub filter: FilterStrategy,
    pub compression: Compression,
    pub max_chunk_size: usize,
}
impl Default for EncoderOptions {
    fn default() -> Self {
        Self {
            filter: FilterStrategy::default(),
            compression: Compression::default(),
            max_chunk_size: DEFAULT_MAX_CHUNK_SIZE,
        }
    }
}
impl EncoderOptions {
    pub fn with_filter(mut self, filter: FilterStrategy) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Caps each IDAT payload; values are clamped to `1..=2^31 - 1`.
    pub fn with_max_chunk_size(mut self, max_chunk_size: usize) -> Self {
        self.max_chunk_size = max_chunk_size;
        self
    }

    fn chunk_size(&self) -> usize {
        self.max_chunk_size.clamp(1, MAX_CHUNK_LENGTH)
    }
}

/// A complete PNG stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage(Vec<u8>);
impl EncodedImage {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}
impl Deref for EncodedImage {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
impl AsRef<[u8]> for EncodedImage {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
impl From<EncodedImage> for Vec<u8> {
    fn from(image: EncodedImage) -> Self {
        image.0
    }
}

/// Turns pixel buffers into PNG streams.
///
/// An encoder only holds its options, so one value can be shared between
/// threads and used for any number of concurrent encodes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Encoder {
    options: EncoderOptions,
}
impl Encoder {
    pub fn new(options: EncoderOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &EncoderOptions {
        &self.options
    }

    pub fn encode(&self, buffer: &PixelBuffer) -> EncodeResult<EncodedImage> {
        let header = IHDRChunk::new(
            buffer.width(),
            buffer.height(),
            buffer.bit_depth().bits(),
            buffer.color_mode().color_type(),
        );

        let filtered = filter_scanlines(buffer, &header, self.options.filter);
        let compressed = compress_data(&filtered, self.options.compression)?;
        let chunk_size = self.options.chunk_size();

        let idat_count = div_ceil(compressed.len(), chunk_size).max(1);
        let mut png = Vec::with_capacity(
            SIGNATURE.len() + compressed.len() + (idat_count + 4) * CHUNK_OVERHEAD,
        );
        png.extend(SIGNATURE);
        header.write_to(&mut png);
        if let Some(palette) = buffer.palette() {
            PLTEChunk::from_palette(palette).write_to(&mut png);
            if let Some(trns) = tRNSChunk::from_palette(palette) {
                trns.write_to(&mut png);
            }
        }
        for idat in IDATChunk::split(&compressed, chunk_size) {
            idat.write_to(&mut png);
        }
        IENDChunk.write_to(&mut png);

        log::debug!(
            "encoded {}x{} {}/{}: {} filtered bytes, {} compressed, {idat_count} IDAT, {} total",
            buffer.width(),
            buffer.height(),
            buffer.color_mode(),
            buffer.bit_depth().bits(),
            filtered.len(),
            compressed.len(),
            png.len()
        );
        Ok(EncodedImage(png))
    }
}

/// Encodes with the default options.
pub fn encode(buffer: &PixelBuffer) -> EncodeResult<EncodedImage> {
    Encoder::default().encode(buffer)
}
