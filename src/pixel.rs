use std::{fmt, str::FromStr};

use crate::{
    chunks::ihdr::ColorType,
    error::{EncodeError, EncodeResult},
    utils::row_bytes,
};

/// PNG dimensions are stored as 31-bit values.
pub const MAX_DIMENSION: u32 = i32::MAX as u32;

/// Layout of the samples in a raw pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorMode {
    Gray,
    GrayAlpha,
    Rgb,
    Bgr,
    Rgba,
    Bgra,
    Indexed,
}
impl ColorMode {
    pub fn channel_count(&self) -> u8 {
        match self {
            Self::Gray | Self::Indexed => 1,
            Self::GrayAlpha => 2,
            Self::Rgb | Self::Bgr => 3,
            Self::Rgba | Self::Bgra => 4,
        }
    }

    /// The color type written to IHDR. Blue-first layouts are stored as their
    /// red-first equivalent.
    pub(crate) fn color_type(&self) -> ColorType {
        match self {
            Self::Gray => ColorType::Greyscale,
            Self::GrayAlpha => ColorType::GreyscaleWithAlpha,
            Self::Rgb | Self::Bgr => ColorType::Truecolor,
            Self::Rgba | Self::Bgra => ColorType::TruecolorWithAlpha,
            Self::Indexed => ColorType::IndexedColor,
        }
    }

    pub fn supports(&self, depth: BitDepth) -> bool {
        use BitDepth::*;
        match self {
            Self::Gray => true,
            Self::Indexed => depth != Sixteen,
            Self::GrayAlpha | Self::Rgb | Self::Rgba => matches!(depth, Eight | Sixteen),
            Self::Bgr | Self::Bgra => depth == Eight,
        }
    }

    pub(crate) fn swaps_red_blue(&self) -> bool {
        matches!(self, Self::Bgr | Self::Bgra)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gray => "gray",
            Self::GrayAlpha => "gray_alpha",
            Self::Rgb => "rgb",
            Self::Bgr => "bgr",
            Self::Rgba => "rgba",
            Self::Bgra => "bgra",
            Self::Indexed => "indexed",
        }
    }
}
impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
impl FromStr for ColorMode {
    type Err = EncodeError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gray" => Ok(Self::Gray),
            "gray_alpha" => Ok(Self::GrayAlpha),
            "rgb" => Ok(Self::Rgb),
            "bgr" => Ok(Self::Bgr),
            "rgba" => Ok(Self::Rgba),
            "bgra" => Ok(Self::Bgra),
            "indexed" => Ok(Self::Indexed),
            other => Err(EncodeError::UnsupportedFormat(format!(
                "unknown pixel format '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitDepth {
    One = 1,
    Two = 2,
    Four = 4,
    Eight = 8,
    Sixteen = 16,
}
impl BitDepth {
    pub fn bits(&self) -> u8 {
        *self as u8
    }
}
impl TryFrom<u8> for BitDepth {
    type Error = EncodeError;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            4 => Ok(Self::Four),
            8 => Ok(Self::Eight),
            16 => Ok(Self::Sixteen),
            i => Err(EncodeError::UnsupportedFormat(format!(
                "bit depth {i} is not a PNG bit depth"
            ))),
        }
    }
}

/// Colors for an indexed image. Entries are RGBA; alpha other than 255 ends up
/// in a tRNS chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    entries: Vec<[u8; 4]>,
}
impl Palette {
    pub fn new(colors: impl IntoIterator<Item = [u8; 3]>) -> EncodeResult<Self> {
        Self::with_alpha(colors.into_iter().map(|[r, g, b]| [r, g, b, u8::MAX]))
    }

    pub fn with_alpha(colors: impl IntoIterator<Item = [u8; 4]>) -> EncodeResult<Self> {
        let entries: Vec<_> = colors.into_iter().collect();
        if entries.is_empty() || entries.len() > 256 {
            return Err(EncodeError::UnsupportedFormat(format!(
                "palette must have 1 to 256 entries, got {}",
                entries.len()
            )));
        }
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: u8) -> Option<[u8; 4]> {
        self.entries.get(index as usize).copied()
    }

    pub(crate) fn colors(&self) -> impl Iterator<Item = [u8; 3]> + '_ {
        self.entries.iter().map(|&[r, g, b, _]| [r, g, b])
    }

    /// Alpha values up to the last non-opaque entry, or `None` when every entry is opaque.
    pub(crate) fn transparency(&self) -> Option<Vec<u8>> {
        let last = self.entries.iter().rposition(|e| e[3] != u8::MAX)?;
        Some(self.entries[..=last].iter().map(|e| e[3]).collect())
    }
}

/// Raw interleaved pixels plus the geometry needed to encode them.
///
/// Rows are stored top to bottom with no padding beyond the byte boundary
/// that sub-byte depths require. Sixteen-bit samples are big-endian.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    data: Vec<u8>,
    width: u32,
    height: u32,
    color_mode: ColorMode,
    bit_depth: BitDepth,
    palette: Option<Palette>,
}
impl PixelBuffer {
    /// An 8-bit buffer in any non-indexed mode.
    pub fn new(
        data: Vec<u8>,
        width: u32,
        height: u32,
        color_mode: ColorMode,
    ) -> EncodeResult<Self> {
        Self::with_depth(data, width, height, color_mode, BitDepth::Eight)
    }

    pub fn with_depth(
        data: Vec<u8>,
        width: u32,
        height: u32,
        color_mode: ColorMode,
        bit_depth: BitDepth,
    ) -> EncodeResult<Self> {
        if color_mode == ColorMode::Indexed {
            return Err(EncodeError::UnsupportedFormat(
                "indexed buffers need a palette".into(),
            ));
        }
        let buffer = Self {
            data,
            width,
            height,
            color_mode,
            bit_depth,
            palette: None,
        };
        buffer.validate()?;
        Ok(buffer)
    }

    pub fn indexed(
        data: Vec<u8>,
        width: u32,
        height: u32,
        bit_depth: BitDepth,
        palette: Palette,
    ) -> EncodeResult<Self> {
        let buffer = Self {
            data,
            width,
            height,
            color_mode: ColorMode::Indexed,
            bit_depth,
            palette: Some(palette),
        };
        buffer.validate()?;
        buffer.validate_indices()?;
        Ok(buffer)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn color_mode(&self) -> ColorMode {
        self.color_mode
    }

    pub fn bit_depth(&self) -> BitDepth {
        self.bit_depth
    }

    pub fn palette(&self) -> Option<&Palette> {
        self.palette.as_ref()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub(crate) fn bits_per_pixel(&self) -> usize {
        self.color_mode.channel_count() as usize * self.bit_depth.bits() as usize
    }

    pub(crate) fn row_bytes(&self) -> usize {
        row_bytes(self.width as usize, self.bits_per_pixel())
    }

    pub(crate) fn rows(&self) -> std::slice::Chunks<'_, u8> {
        self.data.chunks(self.row_bytes())
    }

    fn validate(&self) -> EncodeResult<()> {
        if !self.color_mode.supports(self.bit_depth) {
            return Err(EncodeError::UnsupportedFormat(format!(
                "{} does not support {}-bit samples",
                self.color_mode,
                self.bit_depth.bits()
            )));
        }
        if self.width == 0 || self.height == 0 {
            return Err(EncodeError::InvalidGeometry(format!(
                "dimensions must be positive, got {}x{}",
                self.width, self.height
            )));
        }
        if self.width > MAX_DIMENSION || self.height > MAX_DIMENSION {
            return Err(EncodeError::InvalidGeometry(format!(
                "{}x{} exceeds the maximum PNG dimension of {MAX_DIMENSION}",
                self.width, self.height
            )));
        }
        let expected = self
            .row_bytes()
            .checked_mul(self.height as usize)
            .ok_or_else(|| {
                EncodeError::InvalidGeometry(format!(
                    "{}x{} is too large to address",
                    self.width, self.height
                ))
            })?;
        if self.data.len() != expected {
            return Err(EncodeError::InvalidGeometry(format!(
                "buffer is {} bytes, expected {expected} for {}x{} {}/{}",
                self.data.len(),
                self.width,
                self.height,
                self.color_mode,
                self.bit_depth.bits()
            )));
        }
        Ok(())
    }

    fn validate_indices(&self) -> EncodeResult<()> {
        let Some(palette) = &self.palette else {
            return Err(EncodeError::UnsupportedFormat(
                "indexed buffers need a palette".into(),
            ));
        };
        let bits = self.bit_depth.bits() as usize;
        if palette.len() > 1 << bits {
            return Err(EncodeError::UnsupportedFormat(format!(
                "palette has {} entries but {bits}-bit indices address only {}",
                palette.len(),
                1 << bits
            )));
        }
        let width = self.width as usize;
        for row in self.rows() {
            for index in unpack_samples(row, bits).take(width) {
                if index as usize >= palette.len() {
                    return Err(EncodeError::UnsupportedFormat(format!(
                        "index {index} is outside the {}-entry palette",
                        palette.len()
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Splits packed sub-byte (or 8-bit) samples MSB first.
pub(crate) fn unpack_samples(row: &[u8], bits: usize) -> impl Iterator<Item = u8> + '_ {
    let per_byte = 8 / bits;
    let mask = ((1u16 << bits) - 1) as u8;
    row.iter().flat_map(move |&byte| {
        (0..per_byte).map(move |i| (byte >> (8 - bits * (i + 1))) & mask)
    })
}
