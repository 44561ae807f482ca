use std::marker::PhantomData;

use anyhow::{anyhow, bail, ensure, Context};

use crate::{
    chunks::{
        ihdr::{ColorType, IHDRChunk, Interlacing},
        iter_chunks, parse_signature,
        plte::PLTEChunk,
        trns::tRNSChunk,
        Chunk,
    },
    filters::{filtered_len, reconstruct_scanlines},
    image_data::decompress_data,
    pixel::{BitDepth, ColorMode, Palette, PixelBuffer, MAX_DIMENSION},
};

/// Walks a PNG stream in the order its chunks must appear.
pub struct PNGDecoder<'a, State>(&'a [u8], PhantomData<State>);

pub struct Start;
pub struct Chunks;

impl<'a> PNGDecoder<'a, Start> {
    pub fn new(data: &'a [u8]) -> anyhow::Result<Self> {
        let (rest, _) = parse_signature(data)
            .map_err(|_| anyhow!("input doesn't start with expected signature"))?;
        Ok(Self(rest, PhantomData))
    }

    pub fn parse_ihdr(self) -> anyhow::Result<(PNGDecoder<'a, Chunks>, IHDRChunk)> {
        let mut chunks = iter_chunks(self.0);
        let Some(Chunk::IHDR(header)) = chunks.next().transpose()? else {
            bail!("first chunk is not IHDR");
        };
        ensure!(header.width > 0 && header.height > 0, "image has no pixels");
        ensure!(
            header.width <= MAX_DIMENSION && header.height <= MAX_DIMENSION,
            "{}x{} exceeds the maximum PNG dimension",
            header.width,
            header.height
        );
        ensure!(
            header.compression_method == 0 && header.filter_method == 0,
            "unknown compression or filter method"
        );
        ensure!(
            header.interlace_method == Interlacing::None,
            "interlaced images are not supported"
        );
        Ok((PNGDecoder(chunks.remaining(), PhantomData), header))
    }
}

impl<'a> PNGDecoder<'a, Chunks> {
    /// Collects the palette and the concatenated IDAT payloads up to IEND.
    pub fn parse_image_data(self) -> anyhow::Result<(Option<Palette>, Vec<u8>)> {
        let mut plte: Option<PLTEChunk> = None;
        let mut trns: Option<tRNSChunk> = None;
        let mut compressed = vec![];
        let mut seen_end = false;

        for chunk in iter_chunks(self.0) {
            match chunk? {
                Chunk::PLTE(chunk) => plte = Some(chunk),
                Chunk::tRNS(chunk) => trns = Some(chunk),
                Chunk::IDAT(idat) => compressed.extend_from_slice(idat.data),
                Chunk::IEND => seen_end = true,
                Chunk::IHDR(_) => bail!("duplicate IHDR"),
                Chunk::Unknown(raw) if raw.is_critical() => bail!(
                    "unknown critical chunk {}",
                    String::from_utf8_lossy(raw.chunk_type)
                ),
                Chunk::Unknown(raw) => log::debug!(
                    "skipping {} ({} bytes)",
                    String::from_utf8_lossy(raw.chunk_type),
                    raw.chunk_data.len()
                ),
            }
        }
        ensure!(seen_end, "stream ends before IEND");
        ensure!(!compressed.is_empty(), "no IDAT chunks");

        let palette = plte
            .map(|plte| {
                Palette::with_alpha((0..plte.len()).filter_map(|i| {
                    let [r, g, b] = plte.get_color(i as u8)?;
                    let a = trns.as_ref().map_or(u8::MAX, |t| t.as_palette(i as u8));
                    Some([r, g, b, a])
                }))
            })
            .transpose()?;
        Ok((palette, compressed))
    }
}

/// Pixels recovered from a PNG stream, in the same row layout [`PixelBuffer`] uses.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    header: IHDRChunk,
    palette: Option<Palette>,
    data: Vec<u8>,
}
impl DecodedImage {
    pub fn width(&self) -> u32 {
        self.header.width
    }

    pub fn height(&self) -> u32 {
        self.header.height
    }

    pub fn color_type(&self) -> ColorType {
        self.header.color_type
    }

    pub fn bit_depth(&self) -> u8 {
        self.header.bit_depth
    }

    pub fn palette(&self) -> Option<&Palette> {
        self.palette.as_ref()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_pixel_buffer(self) -> anyhow::Result<PixelBuffer> {
        let depth = BitDepth::try_from(self.header.bit_depth)?;
        let (width, height) = (self.header.width, self.header.height);
        let buffer = match (self.header.color_type, self.palette) {
            (ColorType::IndexedColor, Some(palette)) => {
                PixelBuffer::indexed(self.data, width, height, depth, palette)?
            }
            (ColorType::IndexedColor, None) => bail!("indexed image without PLTE"),
            (color_type, _) => {
                PixelBuffer::with_depth(self.data, width, height, color_mode(color_type), depth)?
            }
        };
        Ok(buffer)
    }
}

fn color_mode(color_type: ColorType) -> ColorMode {
    match color_type {
        ColorType::Greyscale => ColorMode::Gray,
        ColorType::GreyscaleWithAlpha => ColorMode::GrayAlpha,
        ColorType::Truecolor => ColorMode::Rgb,
        ColorType::TruecolorWithAlpha => ColorMode::Rgba,
        ColorType::IndexedColor => ColorMode::Indexed,
    }
}

/// Decodes a non-interlaced PNG stream.
pub fn decode(bytes: &[u8]) -> anyhow::Result<DecodedImage> {
    let decoder = PNGDecoder::new(bytes)?;
    let (decoder, header) = decoder.parse_ihdr()?;
    let depth = BitDepth::try_from(header.bit_depth)?;
    ensure!(
        color_mode(header.color_type).supports(depth),
        "{:?} does not allow bit depth {}",
        header.color_type,
        header.bit_depth
    );

    let (palette, compressed) = decoder.parse_image_data()?;
    ensure!(
        header.color_type != ColorType::IndexedColor || palette.is_some(),
        "indexed image without PLTE"
    );
    let filtered = decompress_data(&compressed, filtered_len(&header)?)?;
    let data = reconstruct_scanlines(&filtered, &header)
        .with_context(|| format!("Failed to unfilter {}x{} image", header.width, header.height))?;

    Ok(DecodedImage {
        header,
        palette,
        data,
    })
}
