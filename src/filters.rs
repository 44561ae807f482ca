use anyhow::{anyhow, ensure, Context};

use crate::{chunks::ihdr::IHDRChunk, scanlines::Scanlines, PixelBuffer};

/// Per-row byte transforms from the PNG adaptive filter method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    None = 0,
    Sub = 1,
    Up = 2,
    Average = 3,
    Paeth = 4,
}
impl Filter {
    pub const ALL: [Filter; 5] = [
        Filter::None,
        Filter::Sub,
        Filter::Up,
        Filter::Average,
        Filter::Paeth,
    ];

    /// `x` is the current byte, `a` the byte one pixel left, `b` the byte above
    /// and `c` the byte above and left.
    pub fn filter(&self, x: u8, a: u8, b: u8, c: u8) -> u8 {
        match self {
            Filter::None => x,
            Filter::Sub => x.wrapping_sub(a),
            Filter::Up => x.wrapping_sub(b),
            Filter::Average => x.wrapping_sub(average(a, b)),
            Filter::Paeth => x.wrapping_sub(paeth_predictor(a, b, c)),
        }
    }

    pub fn reconstruct(&self, x: u8, a: u8, b: u8, c: u8) -> u8 {
        match self {
            Filter::None => x,
            Filter::Sub => x.wrapping_add(a),
            Filter::Up => x.wrapping_add(b),
            Filter::Average => x.wrapping_add(average(a, b)),
            Filter::Paeth => x.wrapping_add(paeth_predictor(a, b, c)),
        }
    }
}
impl TryFrom<u8> for Filter {
    type Error = anyhow::Error;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Sub),
            2 => Ok(Self::Up),
            3 => Ok(Self::Average),
            4 => Ok(Self::Paeth),
            i => Err(anyhow!("{i} is not a PNG filter type")),
        }
    }
}

/// How the encoder picks a filter for each row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterStrategy {
    None,
    Sub,
    Up,
    Average,
    Paeth,
    /// Per row, the filter whose output has the smallest sum of absolute
    /// values (bytes read as signed). Ties go to the lower filter type.
    /// Indexed and sub-byte images always use `None`.
    #[default]
    Adaptive,
}
impl FilterStrategy {
    fn fixed(&self) -> Option<Filter> {
        match self {
            Self::None => Some(Filter::None),
            Self::Sub => Some(Filter::Sub),
            Self::Up => Some(Filter::Up),
            Self::Average => Some(Filter::Average),
            Self::Paeth => Some(Filter::Paeth),
            Self::Adaptive => None,
        }
    }
}

fn average(a: u8, b: u8) -> u8 {
    ((a as u16 + b as u16) / 2) as u8
}

fn paeth_predictor(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let pa = (p - a as i16).abs();
    let pb = (p - b as i16).abs();
    let pc = (p - c as i16).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

/// Yields the filtered byte for every position of `row`.
fn filtered_bytes<'a>(
    filter: Filter,
    row: &'a [u8],
    prev: &'a [u8],
    bpp: usize,
) -> impl Iterator<Item = u8> + 'a {
    row.iter().enumerate().map(move |(i, &x)| {
        let (a, c) = if i >= bpp {
            (row[i - bpp], prev[i - bpp])
        } else {
            (0, 0)
        };
        filter.filter(x, a, prev[i], c)
    })
}

fn score(filter: Filter, row: &[u8], prev: &[u8], bpp: usize) -> u64 {
    filtered_bytes(filter, row, prev, bpp)
        .map(|b| (b as i8).unsigned_abs() as u64)
        .sum()
}

fn select_filter(row: &[u8], prev: &[u8], bpp: usize) -> Filter {
    let mut best = (Filter::None, score(Filter::None, row, prev, bpp));
    for filter in &Filter::ALL[1..] {
        let s = score(*filter, row, prev, bpp);
        if s < best.1 {
            best = (*filter, s);
        }
    }
    best.0
}

/// Filters every scanline of `buffer` into one stream, each row prefixed by
/// its filter type.
pub(crate) fn filter_scanlines(
    buffer: &PixelBuffer,
    header: &IHDRChunk,
    strategy: FilterStrategy,
) -> Vec<u8> {
    let row_len = header.row_bytes();
    let bpp = header.filter_width();
    let adaptive_allowed = header.bit_depth >= 8 && buffer.palette().is_none();
    let mut output = Vec::with_capacity((row_len + 1) * header.height as usize);
    let mut counts = [0usize; 5];
    let mut prev = vec![0; row_len];

    for (y, row) in Scanlines::new(buffer).enumerate() {
        let filter = match strategy.fixed() {
            Some(filter) => filter,
            None if adaptive_allowed => select_filter(&row, &prev, bpp),
            None => Filter::None,
        };
        log::trace!("row {y}: {filter:?}");
        counts[filter as usize] += 1;
        output.push(filter as u8);
        output.extend(filtered_bytes(filter, &row, &prev, bpp));
        prev.clear();
        prev.extend_from_slice(&row);
    }

    log::debug!(
        "filters: strategy={strategy:?} None={} Sub={} Up={} Average={} Paeth={}",
        counts[0],
        counts[1],
        counts[2],
        counts[3],
        counts[4]
    );
    output
}

/// Undoes [`filter_scanlines`], returning the rows without filter bytes.
/// Size of the filtered stream `header` describes: every row plus its filter byte.
pub(crate) fn filtered_len(header: &IHDRChunk) -> anyhow::Result<usize> {
    (header.width as usize)
        .checked_mul(header.pixel_width())
        .map(|bits| crate::utils::div_ceil(bits, 8))
        .and_then(|row_len| row_len.checked_add(1))
        .and_then(|row_len| row_len.checked_mul(header.height as usize))
        .with_context(|| {
            format!(
                "{}x{} image does not fit in memory",
                header.width, header.height
            )
        })
}

pub(crate) fn reconstruct_scanlines(data: &[u8], header: &IHDRChunk) -> anyhow::Result<Vec<u8>> {
    let expected = filtered_len(header)?;
    let row_len = header.row_bytes();
    let bpp = header.filter_width();
    ensure!(
        data.len() == expected,
        "image data is {} bytes, expected {expected}",
        data.len()
    );

    let mut output = Vec::with_capacity(row_len * header.height as usize);
    let zero_row = vec![0; row_len];
    for (y, filtered) in data.chunks(row_len + 1).enumerate() {
        let filter = Filter::try_from(filtered[0])?;
        let start = output.len();
        for (i, &x) in filtered[1..].iter().enumerate() {
            let b = if y == 0 {
                zero_row[i]
            } else {
                output[start - row_len + i]
            };
            let (a, c) = if i >= bpp {
                let c = if y == 0 {
                    0
                } else {
                    output[start - row_len + i - bpp]
                };
                (output[start + i - bpp], c)
            } else {
                (0, 0)
            };
            output.push(filter.reconstruct(x, a, b, c));
        }
    }
    Ok(output)
}
