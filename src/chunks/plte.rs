use std::borrow::Cow;

use super::ParseableChunk;
use crate::pixel::Palette;
use nom::{
    bytes::complete::take,
    combinator::recognize,
    error::{Error, ErrorKind},
    multi::count,
    IResult,
};

#[derive(Debug)]
pub struct PLTEChunk<'a> {
    colors: Cow<'a, [u8]>,
}
impl PLTEChunk<'_> {
    pub(crate) fn from_palette(palette: &Palette) -> PLTEChunk<'static> {
        PLTEChunk {
            colors: Cow::Owned(palette.colors().flatten().collect()),
        }
    }

    pub fn len(&self) -> usize {
        self.colors.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn get_color(&self, index: u8) -> Option<[u8; 3]> {
        let start = index as usize * 3;
        self.colors.get(start..start + 3)?.try_into().ok()
    }
}
impl<'a> ParseableChunk<'a> for PLTEChunk<'a> {
    const HEADER: &'static [u8; 4] = b"PLTE";

    fn from_bytes(chunk_data: &'a [u8]) -> IResult<&'a [u8], Self> {
        let entry_count = chunk_data.len() / 3;
        if entry_count == 0 || entry_count > 256 || chunk_data.len() % 3 != 0 {
            return Err(nom::Err::Error(Error::new(chunk_data, ErrorKind::Verify)));
        }
        let (rest, colors) = recognize(count(take(3usize), entry_count))(chunk_data)?;
        Ok((
            rest,
            PLTEChunk {
                colors: Cow::Borrowed(colors),
            },
        ))
    }

    fn data(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(&self.colors)
    }
}
