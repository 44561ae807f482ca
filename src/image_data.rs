use anyhow::Context;
use miniz_oxide::{
    deflate::core::{
        compress, create_comp_flags_from_zip_params, CompressorOxide, TDEFLFlush, TDEFLStatus,
    },
    inflate::decompress_to_vec_zlib_with_limit,
};

use crate::error::{EncodeError, EncodeResult};

/// Deflate effort. Levels follow zlib's 0 (stored) to 9 scale; miniz also accepts 10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    Stored,
    Fastest,
    #[default]
    Balanced,
    Best,
    Level(u8),
}
impl Compression {
    pub fn level(&self) -> u8 {
        match self {
            Self::Stored => 0,
            Self::Fastest => 1,
            Self::Balanced => 6,
            Self::Best => 9,
            Self::Level(level) => (*level).min(10),
        }
    }
}

/// Zlib-wraps `data`. Every call owns its compressor.
pub(crate) fn compress_data(data: &[u8], compression: Compression) -> EncodeResult<Vec<u8>> {
    // Positive window bits ask for the zlib header and adler32 trailer.
    let flags = create_comp_flags_from_zip_params(compression.level().into(), 15, 0);
    let mut compressor = CompressorOxide::new(flags);
    let mut output = vec![0; usize::max(data.len() / 2, 64)];
    let (mut in_pos, mut out_pos) = (0, 0);

    loop {
        let (status, bytes_in, bytes_out) = compress(
            &mut compressor,
            &data[in_pos..],
            &mut output[out_pos..],
            TDEFLFlush::Finish,
        );
        in_pos += bytes_in;
        out_pos += bytes_out;

        match status {
            TDEFLStatus::Done => {
                output.truncate(out_pos);
                return Ok(output);
            }
            TDEFLStatus::Okay => {
                if output.len() - out_pos < 32 {
                    output.resize(output.len() * 2, 0);
                }
            }
            status => {
                return Err(EncodeError::CompressionFailure(format!(
                    "deflate stopped with {status:?} after {in_pos} of {} bytes",
                    data.len()
                )))
            }
        }
    }
}

/// Inflates a zlib stream, refusing to produce more than `limit` bytes.
pub(crate) fn decompress_data(compressed_data: &[u8], limit: usize) -> anyhow::Result<Vec<u8>> {
    decompress_to_vec_zlib_with_limit(compressed_data, limit)
        .map_err(|e| anyhow::anyhow!("{:?}", e.status))
        .context("Failed to decompress image data.")
}
