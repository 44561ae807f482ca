use std::borrow::Cow;

use super::ParseableChunk;
use crate::pixel::Palette;
use nom::IResult;

/// Transparency. Only the palette form (one alpha byte per entry) is written.
#[allow(non_camel_case_types)]
#[derive(Debug)]
pub struct tRNSChunk<'a> {
    inner: Cow<'a, [u8]>,
}
impl tRNSChunk<'_> {
    pub(crate) fn from_palette(palette: &Palette) -> Option<tRNSChunk<'static>> {
        Some(tRNSChunk {
            inner: Cow::Owned(palette.transparency()?),
        })
    }

    /// Entries past the end of the chunk are opaque.
    pub fn as_palette(&self, index: u8) -> u8 {
        *self.inner.get(index as usize).unwrap_or(&u8::MAX)
    }
}
impl<'a> ParseableChunk<'a> for tRNSChunk<'a> {
    const HEADER: &'static [u8; 4] = b"tRNS";

    fn from_bytes(chunk_data: &'a [u8]) -> IResult<&'a [u8], Self> {
        Ok((
            &chunk_data[chunk_data.len()..],
            tRNSChunk {
                inner: Cow::Borrowed(chunk_data),
            },
        ))
    }

    fn data(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(&self.inner)
    }
}
