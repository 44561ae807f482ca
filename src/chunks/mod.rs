use std::borrow::Cow;

use anyhow::anyhow;
use nom::{
    bytes::complete::{tag, take},
    combinator::map,
    multi::length_data,
    number::complete::be_u32,
    sequence::terminated,
    IResult,
};

use crate::crc::chunk_crc;

pub mod idat;
pub mod iend;
pub mod ihdr;
pub mod plte;
pub mod trns;

pub const SIGNATURE: &[u8; 8] = b"\x89PNG\x0d\x0a\x1a\x0a";

/// Length, type and CRC fields around every chunk's data.
pub(crate) const CHUNK_OVERHEAD: usize = 12;

#[allow(non_camel_case_types, clippy::upper_case_acronyms)]
#[derive(Debug)]
pub enum Chunk<'a> {
    IHDR(ihdr::IHDRChunk),
    PLTE(plte::PLTEChunk<'a>),
    tRNS(trns::tRNSChunk<'a>),
    IDAT(idat::IDATChunk<'a>),
    IEND,
    Unknown(RawChunk<'a>),
}

/// Iterates the chunks following the signature, stopping after IEND or the
/// first chunk that fails to parse or whose CRC doesn't match.
pub fn iter_chunks(source: &[u8]) -> ChunkIter<'_> {
    ChunkIter {
        source,
        finished: false,
    }
}

pub struct ChunkIter<'a> {
    source: &'a [u8],
    finished: bool,
}
impl<'a> ChunkIter<'a> {
    /// Bytes not yet consumed by the iterator.
    pub fn remaining(&self) -> &'a [u8] {
        self.source
    }
}

impl<'a> Iterator for ChunkIter<'a> {
    type Item = anyhow::Result<Chunk<'a>>;
    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match parse_chunk(self.source) {
            Ok((rest, chunk)) => {
                self.source = rest;
                if matches!(chunk, Chunk::IEND) {
                    self.finished = true;
                }
                Some(Ok(chunk))
            }
            Err(e) => {
                self.finished = true;
                Some(Err(anyhow!("malformed chunk: {e:?}")))
            }
        }
    }
}

pub(crate) fn parse_signature(input: &[u8]) -> IResult<&[u8], &[u8]> {
    tag(&SIGNATURE[..])(input)
}

fn parse_chunk(input: &[u8]) -> IResult<&[u8], Chunk<'_>> {
    let (rest, (header, chunk_data)) = valid_chunk::<nom::error::Error<&[u8]>>(input)?;
    match header {
        ihdr::IHDRChunk::HEADER => Ok((
            rest,
            Chunk::IHDR(ihdr::IHDRChunk::from_bytes(chunk_data)?.1),
        )),
        plte::PLTEChunk::HEADER => Ok((
            rest,
            Chunk::PLTE(plte::PLTEChunk::from_bytes(chunk_data)?.1),
        )),
        trns::tRNSChunk::HEADER => Ok((
            rest,
            Chunk::tRNS(trns::tRNSChunk::from_bytes(chunk_data)?.1),
        )),
        idat::IDATChunk::HEADER => Ok((
            rest,
            Chunk::IDAT(idat::IDATChunk::from_bytes(chunk_data)?.1),
        )),
        iend::IENDChunk::HEADER => Ok((rest, Chunk::IEND)),
        _ => Ok((
            rest,
            Chunk::Unknown(RawChunk {
                chunk_type: header,
                chunk_data,
            }),
        )),
    }
}

#[derive(Debug)]
pub struct RawChunk<'a> {
    pub chunk_type: &'a [u8; 4],
    pub chunk_data: &'a [u8],
}
impl RawChunk<'_> {
    /// Ancillary chunks have a lowercase first letter and may be skipped.
    pub fn is_critical(&self) -> bool {
        self.chunk_type[0].is_ascii_uppercase()
    }
}

fn valid_chunk<'a, Error: nom::error::ParseError<&'a [u8]>>(
    input: &'a [u8],
) -> IResult<&'a [u8], (&'a [u8; 4], &'a [u8]), Error> {
    let (header_length, crc_length) = (4usize, 4usize);
    let (input, chunk_data) = length_data::<_, _, Error, _>(map(be_u32, |v| {
        v as usize + header_length + crc_length
    }))(input)?;
    let (header, data) = chunk_data[..chunk_data.len() - crc_length].split_at(header_length);
    let header: &[u8; 4] = header
        .try_into()
        .expect("length_data always takes the header bytes");
    let crc = chunk_crc(header, data).to_be_bytes();
    let (_, data) = terminated::<_, _, _, Error, _, _>(take(data.len()), tag(&crc[..]))(
        &chunk_data[header_length..],
    )?;
    Ok((input, (header, data)))
}

/// A chunk that can be read from and written to a PNG stream.
pub(crate) trait ParseableChunk<'a>: Sized {
    const HEADER: &'static [u8; 4];

    fn from_bytes(chunk_data: &'a [u8]) -> IResult<&'a [u8], Self>;
    fn data(&self) -> Cow<'_, [u8]>;

    /// Appends length, type, data and CRC.
    fn write_to(&self, out: &mut Vec<u8>) {
        let data = self.data();
        out.reserve(data.len() + CHUNK_OVERHEAD);
        out.extend((data.len() as u32).to_be_bytes());
        out.extend(Self::HEADER);
        out.extend(data.iter());
        out.extend(chunk_crc(Self::HEADER, &data).to_be_bytes());
    }
}
