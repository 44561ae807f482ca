use std::borrow::Cow;

use super::ParseableChunk;
use nom::IResult;

#[derive(Debug)]
pub struct IDATChunk<'a> {
    pub data: &'a [u8],
}
impl IDATChunk<'_> {
    /// One chunk per `max_size` slice of the compressed stream. An empty stream
    /// still gets a single, empty chunk.
    pub(crate) fn split(compressed: &[u8], max_size: usize) -> impl Iterator<Item = IDATChunk<'_>> {
        let empty = compressed.is_empty().then_some(IDATChunk { data: compressed });
        compressed
            .chunks(max_size.max(1))
            .map(|data| IDATChunk { data })
            .chain(empty)
    }
}
impl<'a> ParseableChunk<'a> for IDATChunk<'a> {
    const HEADER: &'static [u8; 4] = b"IDAT";

    fn from_bytes(chunk_data: &'a [u8]) -> IResult<&'a [u8], Self> {
        Ok((&chunk_data[0..0], IDATChunk { data: chunk_data }))
    }

    fn data(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(self.data)
    }
}
