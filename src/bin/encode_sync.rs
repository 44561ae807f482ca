use anyhow::Context;
use png_stack::{ColorMode, Encoder, PixelBuffer};

// The terminal capture is a 720x400 RGBA frame, 1152000 bytes long.
const INPUT: &str = "./rgba-terminal.dat";
const WIDTH: u32 = 720;
const HEIGHT: u32 = 400;

fn main() -> anyhow::Result<()> {
    let verbosity = if std::env::args().nth(1).as_deref() == Some("-v") {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Error
    };
    pretty_env_logger::formatted_builder()
        .filter_level(verbosity)
        .init();

    let rgba = std::fs::read(INPUT).context(format!("Failed to read {INPUT}"))?;
    let buffer = PixelBuffer::new(rgba, WIDTH, HEIGHT, ColorMode::Rgba)?;
    let png = Encoder::default().encode(&buffer)?;
    std::fs::write("./png.png", png)?;
    Ok(())
}
