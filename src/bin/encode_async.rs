use std::sync::mpsc;

use anyhow::Context;
use png_stack::{ColorMode, Encoder, PixelBuffer};

const INPUT: &str = "./rgba-terminal.dat";

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
    let buffer = PixelBuffer::new(rgba, 720, 400, ColorMode::Rgba)?;

    let (done, finished) = mpsc::channel();
    Encoder::default().encode_with(buffer, move |result| {
        let written = result
            .context("Encoding failed")
            .and_then(|png| std::fs::write("./png-async.png", png).context("Failed to write output"));
        let _ = done.send(written);
    });
    log::info!("encode queued");

    finished.recv().context("Encode worker vanished")?
}
