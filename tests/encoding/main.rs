use std::io::Cursor;

use png_stack::{
    chunks::{iter_chunks, Chunk, SIGNATURE},
    decode, encode, BitDepth, ColorMode, Compression, EncodeError, Encoder, EncoderOptions,
    FilterStrategy, Palette, PixelBuffer,
};

const IEND: [u8; 12] = [0, 0, 0, 0, b'I', b'E', b'N', b'D', 0xae, 0x42, 0x60, 0x82];

const STRATEGIES: [FilterStrategy; 6] = [
    FilterStrategy::None,
    FilterStrategy::Sub,
    FilterStrategy::Up,
    FilterStrategy::Average,
    FilterStrategy::Paeth,
    FilterStrategy::Adaptive,
];

/// Deterministic bytes with some local structure, so filters have work to do.
fn noise(len: usize, seed: u32) -> Vec<u8> {
    let mut state = seed.wrapping_mul(2654435761).wrapping_add(1);
    (0..len)
        .map(|i| {
            state = state.wrapping_mul(1103515245).wrapping_add(12345);
            if i % 5 == 0 {
                (state >> 16) as u8
            } else {
                (i / 7) as u8
            }
        })
        .collect()
}

fn decode_with_png_crate(bytes: &[u8]) -> (png::OutputInfo, Vec<u8>) {
    let mut decoder = png::Decoder::new(Cursor::new(bytes));
    decoder.set_transformations(png::Transformations::IDENTITY);
    let mut reader = decoder.read_info().unwrap();
    let mut buf = vec![0; reader.output_buffer_size()];
    let info = reader.next_frame(&mut buf).unwrap();
    buf.truncate(info.buffer_size());
    (info, buf)
}

fn row_bytes(width: u32, bits_per_pixel: usize) -> usize {
    (width as usize * bits_per_pixel + 7) / 8
}

#[test]
fn round_trips_through_png_crate() {
    let cases = [
        (ColorMode::Gray, BitDepth::One, png::ColorType::Grayscale),
        (ColorMode::Gray, BitDepth::Two, png::ColorType::Grayscale),
        (ColorMode::Gray, BitDepth::Four, png::ColorType::Grayscale),
        (ColorMode::Gray, BitDepth::Eight, png::ColorType::Grayscale),
        (ColorMode::Gray, BitDepth::Sixteen, png::ColorType::Grayscale),
        (ColorMode::GrayAlpha, BitDepth::Eight, png::ColorType::GrayscaleAlpha),
        (ColorMode::GrayAlpha, BitDepth::Sixteen, png::ColorType::GrayscaleAlpha),
        (ColorMode::Rgb, BitDepth::Eight, png::ColorType::Rgb),
        (ColorMode::Rgb, BitDepth::Sixteen, png::ColorType::Rgb),
        (ColorMode::Rgba, BitDepth::Eight, png::ColorType::Rgba),
        (ColorMode::Rgba, BitDepth::Sixteen, png::ColorType::Rgba),
    ];
    let (width, height) = (13, 7);
    for (seed, (mode, depth, color_type)) in cases.into_iter().enumerate() {
        let bits = mode.channel_count() as usize * depth.bits() as usize;
        let data = noise(row_bytes(width, bits) * height as usize, seed as u32);
        let buffer = PixelBuffer::with_depth(data.clone(), width, height, mode, depth).unwrap();
        for strategy in STRATEGIES {
            let encoder = Encoder::new(EncoderOptions::default().with_filter(strategy));
            let png = encoder.encode(&buffer).unwrap();
            assert_eq!(&png[..8], SIGNATURE);

            let (info, pixels) = decode_with_png_crate(&png);
            assert_eq!((info.width, info.height), (width, height));
            assert_eq!(info.color_type, color_type, "{mode}/{}", depth.bits());
            assert_eq!(info.bit_depth as u8, depth.bits());
            assert_eq!(pixels, data, "{mode}/{} with {strategy:?}", depth.bits());

            assert_eq!(decode(&png).unwrap().data(), &data[..]);
        }
    }
}

#[test]
fn indexed_round_trips_with_palette() {
    for depth in [BitDepth::One, BitDepth::Two, BitDepth::Four, BitDepth::Eight] {
        let entries = 1usize << depth.bits();
        let palette = Palette::with_alpha((0..entries).map(|i| {
            let alpha = if i == 0 { 0 } else { 255 };
            [i as u8, (i * 3) as u8, 255 - i as u8, alpha]
        }))
        .unwrap();
        let (width, height) = (11, 4);
        // Any packed bit pattern is a valid index when the palette is full.
        let data = noise(row_bytes(width, depth.bits() as usize) * height as usize, 99);
        let buffer = PixelBuffer::indexed(data.clone(), width, height, depth, palette).unwrap();
        let png = encode(&buffer).unwrap();

        let chunk_types: Vec<_> = iter_chunks(&png[8..])
            .map(|chunk| match chunk.unwrap() {
                Chunk::IHDR(_) => "IHDR",
                Chunk::PLTE(_) => "PLTE",
                Chunk::tRNS(_) => "tRNS",
                Chunk::IDAT(_) => "IDAT",
                Chunk::IEND => "IEND",
                Chunk::Unknown(_) => "unknown",
            })
            .collect();
        assert_eq!(chunk_types, ["IHDR", "PLTE", "tRNS", "IDAT", "IEND"]);

        let mut decoder = png::Decoder::new(Cursor::new(png.as_bytes()));
        decoder.set_transformations(png::Transformations::IDENTITY);
        let mut reader = decoder.read_info().unwrap();
        assert_eq!(reader.info().palette.as_deref().map(<[u8]>::len), Some(entries * 3));
        assert_eq!(reader.info().trns.as_deref(), Some(&[0u8][..]));
        let mut pixels = vec![0; reader.output_buffer_size()];
        let info = reader.next_frame(&mut pixels).unwrap();
        assert_eq!(&pixels[..info.buffer_size()], &data[..]);
    }
}

#[test]
fn opaque_palette_has_no_trns() {
    let palette = Palette::new([[0, 0, 0], [255, 255, 255]]).unwrap();
    let buffer = PixelBuffer::indexed(vec![0, 1, 1, 0], 2, 2, BitDepth::Eight, palette).unwrap();
    let png = encode(&buffer).unwrap();
    assert!(iter_chunks(&png[8..]).all(|chunk| !matches!(chunk.unwrap(), Chunk::tRNS(_))));
}

#[test]
fn terminal_frame_encodes() {
    let rgba = noise(720 * 400 * 4, 7);
    assert_eq!(rgba.len(), 1_152_000);
    let buffer = PixelBuffer::new(rgba.clone(), 720, 400, ColorMode::Rgba).unwrap();
    let png = encode(&buffer).unwrap();

    assert_eq!(&png[..8], SIGNATURE);
    assert_eq!(&png[png.len() - 12..], &IEND);
    let chunks: Vec<_> = iter_chunks(&png[8..]).collect::<anyhow::Result<_>>().unwrap();
    assert!(matches!(chunks.last(), Some(Chunk::IEND)));
    assert!(chunks
        .iter()
        .filter_map(|chunk| match chunk {
            Chunk::IDAT(idat) => Some(idat.data.len()),
            _ => None,
        })
        .all(|len| len <= png_stack::DEFAULT_MAX_CHUNK_SIZE));

    let (_, pixels) = decode_with_png_crate(&png);
    assert_eq!(pixels, rgba);
}

#[test]
fn single_pixel_image() {
    for mode in [ColorMode::Gray, ColorMode::Rgb, ColorMode::Rgba, ColorMode::GrayAlpha] {
        let data = vec![42; mode.channel_count() as usize];
        let buffer = PixelBuffer::new(data.clone(), 1, 1, mode).unwrap();
        let png = encode(&buffer).unwrap();
        assert_eq!(&png[png.len() - 12..], &IEND);
        assert_eq!(decode_with_png_crate(&png).1, data);
    }
}

#[test]
fn short_buffer_is_invalid_geometry() {
    let result = PixelBuffer::new(vec![0; 720 * 400 * 4 - 1], 720, 400, ColorMode::Rgba);
    assert!(matches!(result, Err(EncodeError::InvalidGeometry(_))));
}

#[test]
fn unknown_format_tag_is_unsupported() {
    assert!(matches!(
        "yuv".parse::<ColorMode>(),
        Err(EncodeError::UnsupportedFormat(_))
    ));
}

#[test]
fn bgr_input_matches_swizzled_rgb() {
    let bgra = noise(9 * 5 * 4, 3);
    let rgba: Vec<u8> = bgra
        .chunks_exact(4)
        .flat_map(|p| [p[2], p[1], p[0], p[3]])
        .collect();
    let from_bgra = encode(&PixelBuffer::new(bgra.clone(), 9, 5, ColorMode::Bgra).unwrap()).unwrap();
    let from_rgba = encode(&PixelBuffer::new(rgba, 9, 5, ColorMode::Rgba).unwrap()).unwrap();
    assert_eq!(from_bgra, from_rgba);

    let bgr: Vec<u8> = bgra.chunks_exact(4).flat_map(|p| [p[0], p[1], p[2]]).collect();
    let rgb: Vec<u8> = bgra.chunks_exact(4).flat_map(|p| [p[2], p[1], p[0]]).collect();
    let from_bgr = encode(&PixelBuffer::new(bgr, 9, 5, ColorMode::Bgr).unwrap()).unwrap();
    let from_rgb = encode(&PixelBuffer::new(rgb, 9, 5, ColorMode::Rgb).unwrap()).unwrap();
    assert_eq!(from_bgr, from_rgb);
}

#[test]
fn encoding_is_deterministic_across_options() {
    let buffer = PixelBuffer::new(noise(40 * 30 * 3, 11), 40, 30, ColorMode::Rgb).unwrap();
    for compression in [Compression::Stored, Compression::Fastest, Compression::Best] {
        let encoder = Encoder::new(EncoderOptions::default().with_compression(compression));
        assert_eq!(encoder.encode(&buffer).unwrap(), encoder.encode(&buffer).unwrap());
    }
}

#[test]
fn concurrent_async_encodes_stay_independent() {
    let first = PixelBuffer::new(noise(64 * 48 * 4, 1), 64, 48, ColorMode::Rgba).unwrap();
    let second = PixelBuffer::new(noise(31 * 17 * 3, 2), 31, 17, ColorMode::Rgb).unwrap();
    let encoder = Encoder::default();
    let expected_first = encoder.encode(&first).unwrap();
    let expected_second = encoder.encode(&second).unwrap();

    let task_first = encoder.encode_async(first.clone());
    let task_second = encoder.encode_async(second.clone());
    let (got_second, got_first) = (task_second.wait().unwrap(), task_first.wait().unwrap());

    assert_eq!(got_first, expected_first);
    assert_eq!(got_second, expected_second);
    assert_eq!(decode_with_png_crate(&got_first).1, first.as_bytes());
    assert_eq!(decode_with_png_crate(&got_second).1, second.as_bytes());
}

#[test]
fn many_threads_share_one_encoder() {
    let encoder = Encoder::new(EncoderOptions::default().with_max_chunk_size(256));
    let tasks: Vec<_> = (0..8)
        .map(|seed| {
            let buffer = PixelBuffer::new(noise(20 * 20, seed), 20, 20, ColorMode::Gray).unwrap();
            (buffer.clone(), encoder.encode_async(buffer))
        })
        .collect();
    for (buffer, task) in tasks {
        let png = task.wait().unwrap();
        assert_eq!(decode_with_png_crate(&png).1, buffer.as_bytes());
    }
}
