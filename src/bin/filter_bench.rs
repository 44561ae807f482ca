use std::{fs, path::Path, time::Instant};

use anyhow::Context;
use png_stack::{
    decode, ColorMode, Compression, Encoder, EncoderOptions, FilterStrategy, PixelBuffer,
};

const STRATEGIES: [FilterStrategy; 6] = [
    FilterStrategy::None,
    FilterStrategy::Sub,
    FilterStrategy::Up,
    FilterStrategy::Average,
    FilterStrategy::Paeth,
    FilterStrategy::Adaptive,
];

/// Uses the terminal capture when present, otherwise a synthetic gradient.
fn load_input() -> anyhow::Result<PixelBuffer> {
    let capture = Path::new("./rgba-terminal.dat");
    if capture.is_file() {
        let rgba = fs::read(capture).context("Failed to read rgba-terminal.dat")?;
        return Ok(PixelBuffer::new(rgba, 720, 400, ColorMode::Rgba)?);
    }
    let (width, height) = (256u32, 256u32);
    let rgba = (0..height)
        .flat_map(|y| (0..width).flat_map(move |x| [x as u8, y as u8, (x ^ y) as u8, 255]))
        .collect();
    Ok(PixelBuffer::new(rgba, width, height, ColorMode::Rgba)?)
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::formatted_builder()
        .filter_level(log::LevelFilter::Info)
        .init();

    let output_dir = Path::new("benchmark");
    fs::create_dir_all(output_dir).context("Failed to create benchmark folder")?;
    let buffer = load_input()?;
    let mut results = Vec::with_capacity(STRATEGIES.len() * 3);

    for strategy in STRATEGIES {
        for compression in [Compression::Fastest, Compression::Balanced, Compression::Best] {
            let encoder = Encoder::new(
                EncoderOptions::default()
                    .with_filter(strategy)
                    .with_compression(compression),
            );
            let started = Instant::now();
            let png = encoder.encode(&buffer)?;
            let elapsed = started.elapsed();
            let decoded = decode(&png).context(format!("Failed to read back {strategy:?}"))?;
            anyhow::ensure!(
                decoded.data() == buffer.as_bytes(),
                "{strategy:?} at level {} did not round-trip",
                compression.level()
            );
            log::info!(
                "{strategy:?} level {}: {} bytes in {elapsed:?}",
                compression.level(),
                png.len()
            );
            results.push(serde_json::json!({
                "filter": format!("{strategy:?}"),
                "level": compression.level(),
                "bytes": png.len(),
                "micros": elapsed.as_micros() as u64,
            }));
        }
    }

    let now = time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Iso8601::DEFAULT)?;
    let report = serde_json::json!({
        "date": now,
        "width": buffer.width(),
        "height": buffer.height(),
        "raw_bytes": buffer.as_bytes().len(),
        "results": results,
    });
    fs::write(output_dir.join("filter_results.json"), report.to_string())?;
    Ok(())
}
