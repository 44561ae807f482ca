//! Canvases that composite rectangular pixel patches before encoding.
//!
//! Both stacks keep four bytes per pixel. Patches pushed in `rgb`/`bgr` get an
//! opaque alpha, and uncovered pixels stay opaque white. A stack fed blue-first
//! patches keeps a BGRA canvas, which the encoder stores as RGBA.

use crate::{
    encoder::{EncodedImage, Encoder},
    error::{EncodeError, EncodeResult},
    task::EncodeTask,
    ColorMode, PixelBuffer, MAX_DIMENSION,
};

const BACKGROUND: u8 = 0xFF;

/// A region of a canvas, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}
impl Rect {
    fn right(&self) -> u32 {
        self.x + self.width
    }

    fn bottom(&self) -> u32 {
        self.y + self.height
    }

    fn union(&self, other: &Rect) -> Rect {
        let (x, y) = (self.x.min(other.x), self.y.min(other.y));
        Rect {
            x,
            y,
            width: self.right().max(other.right()) - x,
            height: self.bottom().max(other.bottom()) - y,
        }
    }
}

fn patch_layout(layout: ColorMode) -> EncodeResult<ColorMode> {
    match layout {
        ColorMode::Rgb | ColorMode::Bgr | ColorMode::Rgba | ColorMode::Bgra => Ok(layout),
        other => Err(EncodeError::UnsupportedFormat(format!(
            "stacks accept rgb, bgr, rgba or bgra patches, not {other}"
        ))),
    }
}

fn canvas_mode(layout: ColorMode) -> ColorMode {
    if layout.swaps_red_blue() {
        ColorMode::Bgra
    } else {
        ColorMode::Rgba
    }
}

/// Allocates an opaque white four-channel canvas, failing instead of aborting
/// when the size is out of range or the allocator refuses it.
fn alloc_canvas(width: u32, height: u32) -> EncodeResult<Vec<u8>> {
    if width == 0 || height == 0 {
        return Err(EncodeError::InvalidGeometry(format!(
            "canvas dimensions must be positive, got {width}x{height}"
        )));
    }
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(EncodeError::InvalidGeometry(format!(
            "{width}x{height} canvas exceeds the maximum PNG dimension of {MAX_DIMENSION}"
        )));
    }
    let too_large =
        || EncodeError::InvalidGeometry(format!("{width}x{height} canvas is too large"));
    let len = (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(4))
        .ok_or_else(too_large)?;
    let mut canvas = Vec::new();
    canvas.try_reserve_exact(len).map_err(|_| too_large())?;
    canvas.resize(len, BACKGROUND);
    Ok(canvas)
}

/// Checks `x + w` and `y + h` stay addressable and `data` covers the patch.
fn patch_rect(
    data: &[u8],
    layout: ColorMode,
    x: u32,
    y: u32,
    w: u32,
    h: u32,
) -> EncodeResult<(Rect, usize)> {
    if x.checked_add(w).is_none() || y.checked_add(h).is_none() {
        return Err(EncodeError::InvalidGeometry(format!(
            "patch at ({x}, {y}) of {w}x{h} overflows the coordinate space"
        )));
    }
    let needed = w as usize * h as usize * layout.channel_count() as usize;
    if data.len() < needed {
        return Err(EncodeError::InvalidGeometry(format!(
            "patch of {w}x{h} {layout} needs {needed} bytes, got {}",
            data.len()
        )));
    }
    Ok((
        Rect {
            x,
            y,
            width: w,
            height: h,
        },
        needed,
    ))
}

/// Copies a patch into a four-channel canvas `canvas_width` pixels wide, with
/// the patch's top-left corner at `(x, y)` in canvas coordinates.
fn blit(
    canvas: &mut [u8],
    canvas_width: usize,
    data: &[u8],
    layout: ColorMode,
    x: usize,
    y: usize,
    w: usize,
) {
    if w == 0 {
        return;
    }
    let src_bpp = layout.channel_count() as usize;
    for (row, src) in data.chunks_exact(w * src_bpp).enumerate() {
        let start = ((y + row) * canvas_width + x) * 4;
        let dst = &mut canvas[start..start + w * 4];
        for (out, pixel) in dst.chunks_exact_mut(4).zip(src.chunks_exact(src_bpp)) {
            out[..3].copy_from_slice(&pixel[..3]);
            out[3] = pixel.get(3).copied().unwrap_or(u8::MAX);
        }
    }
}

/// A canvas of fixed size that patches are painted onto as they are pushed.
#[derive(Debug, Clone)]
pub struct FixedStack {
    width: u32,
    height: u32,
    layout: ColorMode,
    canvas: Vec<u8>,
}
impl FixedStack {
    pub fn new(width: u32, height: u32, layout: ColorMode) -> EncodeResult<Self> {
        Ok(Self {
            width,
            height,
            layout: patch_layout(layout)?,
            canvas: alloc_canvas(width, height)?,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Paints a `w`x`h` patch with its top-left corner at `(x, y)`. Later
    /// pushes overwrite earlier ones.
    pub fn push(&mut self, data: &[u8], x: u32, y: u32, w: u32, h: u32) -> EncodeResult<()> {
        if x >= self.width {
            return Err(EncodeError::InvalidGeometry(format!(
                "x coordinate {x} exceeds the stack's width of {}",
                self.width
            )));
        }
        if y >= self.height {
            return Err(EncodeError::InvalidGeometry(format!(
                "y coordinate {y} exceeds the stack's height of {}",
                self.height
            )));
        }
        let (rect, needed) = patch_rect(data, self.layout, x, y, w, h)?;
        if rect.right() > self.width {
            return Err(EncodeError::InvalidGeometry(format!(
                "patch ends at x={} past the stack's width of {}",
                rect.right(),
                self.width
            )));
        }
        if rect.bottom() > self.height {
            return Err(EncodeError::InvalidGeometry(format!(
                "patch ends at y={} past the stack's height of {}",
                rect.bottom(),
                self.height
            )));
        }
        blit(
            &mut self.canvas,
            self.width as usize,
            &data[..needed],
            self.layout,
            x as usize,
            y as usize,
            w as usize,
        );
        Ok(())
    }

    pub fn to_buffer(&self) -> EncodeResult<PixelBuffer> {
        PixelBuffer::new(
            self.canvas.clone(),
            self.width,
            self.height,
            canvas_mode(self.layout),
        )
    }

    pub fn encode(&self, encoder: &Encoder) -> EncodeResult<EncodedImage> {
        encoder.encode(&self.to_buffer()?)
    }

    /// Snapshots the canvas and encodes it on a worker thread.
    pub fn encode_async(&self, encoder: &Encoder) -> EncodeResult<EncodeTask> {
        Ok(encoder.encode_async(self.to_buffer()?))
    }
}

#[derive(Debug, Clone)]
struct Patch {
    rect: Rect,
    data: Vec<u8>,
}

/// Collects patches anywhere in the coordinate space; the encoded image
/// covers exactly their bounding box.
#[derive(Debug, Clone)]
pub struct DynamicStack {
    layout: ColorMode,
    patches: Vec<Patch>,
}
impl DynamicStack {
    pub fn new(layout: ColorMode) -> EncodeResult<Self> {
        Ok(Self {
            layout: patch_layout(layout)?,
            patches: vec![],
        })
    }

    pub fn push(&mut self, data: &[u8], x: u32, y: u32, w: u32, h: u32) -> EncodeResult<()> {
        let (rect, needed) = patch_rect(data, self.layout, x, y, w, h)?;
        self.patches.push(Patch {
            rect,
            data: data[..needed].to_vec(),
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    /// Bounding box of everything pushed so far.
    pub fn dimensions(&self) -> Option<Rect> {
        let mut rects = self.patches.iter().map(|patch| patch.rect);
        let first = rects.next()?;
        Some(rects.fold(first, |bounds, rect| bounds.union(&rect)))
    }

    /// Composites the patches, in push order, onto a canvas covering their bounding box.
    pub fn to_buffer(&self) -> EncodeResult<(PixelBuffer, Rect)> {
        let bounds = self
            .dimensions()
            .ok_or_else(|| EncodeError::InvalidGeometry("stack has no patches".into()))?;
        let mut canvas = alloc_canvas(bounds.width, bounds.height)?;
        for patch in &self.patches {
            blit(
                &mut canvas,
                bounds.width as usize,
                &patch.data,
                self.layout,
                (patch.rect.x - bounds.x) as usize,
                (patch.rect.y - bounds.y) as usize,
                patch.rect.width as usize,
            );
        }
        log::debug!(
            "composited {} patches into {}x{} at ({}, {})",
            self.patches.len(),
            bounds.width,
            bounds.height,
            bounds.x,
            bounds.y
        );
        let buffer = PixelBuffer::new(
            canvas,
            bounds.width,
            bounds.height,
            canvas_mode(self.layout),
        )?;
        Ok((buffer, bounds))
    }

    pub fn encode(&self, encoder: &Encoder) -> EncodeResult<(EncodedImage, Rect)> {
        let (buffer, bounds) = self.to_buffer()?;
        Ok((encoder.encode(&buffer)?, bounds))
    }

    /// Composites now and encodes the result on a worker thread.
    pub fn encode_async(&self, encoder: &Encoder) -> EncodeResult<(EncodeTask, Rect)> {
        let (buffer, bounds) = self.to_buffer()?;
        Ok((encoder.encode_async(buffer), bounds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode;

    #[test]
    fn fixed_stack_starts_opaque_white() {
        let stack = FixedStack::new(2, 2, ColorMode::Rgb).unwrap();
        assert_eq!(stack.to_buffer().unwrap().as_bytes(), &[0xFF; 16]);
    }

    #[test]
    fn fixed_stack_paints_and_overwrites() {
        let mut stack = FixedStack::new(3, 2, ColorMode::Rgb).unwrap();
        stack.push(&[1, 2, 3, 4, 5, 6], 0, 0, 2, 1).unwrap();
        stack.push(&[7, 8, 9], 1, 0, 1, 1).unwrap();
        stack.push(&[10, 11, 12], 2, 1, 1, 1).unwrap();
        let buffer = stack.to_buffer().unwrap();
        assert_eq!(buffer.color_mode(), ColorMode::Rgba);
        assert_eq!(
            buffer.as_bytes(),
            &[
                1, 2, 3, 255, 7, 8, 9, 255, 255, 255, 255, 255, //
                255, 255, 255, 255, 255, 255, 255, 255, 10, 11, 12, 255,
            ]
        );
    }

    #[test]
    fn fixed_stack_bounds() {
        let mut stack = FixedStack::new(4, 4, ColorMode::Rgba).unwrap();
        let patch = [0u8; 4 * 4 * 4];
        assert!(stack.push(&patch, 4, 0, 1, 1).is_err());
        assert!(stack.push(&patch, 0, 4, 1, 1).is_err());
        assert!(stack.push(&patch, 2, 0, 3, 1).is_err());
        assert!(stack.push(&patch, 0, 2, 1, 3).is_err());
        assert!(stack.push(&patch[..15], 0, 0, 2, 2).is_err());
        assert!(stack.push(&patch, 0, 0, 4, 4).is_ok());
        assert!(FixedStack::new(0, 4, ColorMode::Rgb).is_err());
        assert!(FixedStack::new(4, 4, ColorMode::Gray).is_err());
    }

    #[test]
    fn bgr_stack_encodes_as_rgba() {
        let mut stack = FixedStack::new(1, 1, ColorMode::Bgr).unwrap();
        stack.push(&[30, 20, 10], 0, 0, 1, 1).unwrap();
        let png = stack.encode(&Encoder::default()).unwrap();
        assert_eq!(decode(&png).unwrap().data(), &[10, 20, 30, 255]);
    }

    #[test]
    fn dynamic_stack_bounding_box() {
        let mut stack = DynamicStack::new(ColorMode::Rgba).unwrap();
        assert_eq!(stack.dimensions(), None);
        assert!(stack.to_buffer().is_err());

        stack.push(&[1; 8], 10, 5, 2, 1).unwrap();
        stack.push(&[2; 4], 13, 7, 1, 1).unwrap();
        let bounds = Rect {
            x: 10,
            y: 5,
            width: 4,
            height: 3,
        };
        assert_eq!(stack.dimensions(), Some(bounds));

        let (buffer, rect) = stack.to_buffer().unwrap();
        assert_eq!(rect, bounds);
        assert_eq!((buffer.width(), buffer.height()), (4, 3));
        let bytes = buffer.as_bytes();
        assert_eq!(&bytes[..8], &[1; 8]);
        assert_eq!(&bytes[8..16], &[0xFF; 8]);
        // Bottom-right pixel.
        assert_eq!(&bytes[44..48], &[2; 4]);
    }

    #[test]
    fn dynamic_stack_later_patches_win() {
        let mut stack = DynamicStack::new(ColorMode::Rgb).unwrap();
        stack.push(&[1; 2 * 2 * 3], 20, 30, 2, 2).unwrap();
        stack.push(&[2; 2 * 2 * 3], 21, 31, 2, 2).unwrap();
        let (buffer, rect) = stack.to_buffer().unwrap();
        assert_eq!(
            rect,
            Rect {
                x: 20,
                y: 30,
                width: 3,
                height: 3,
            }
        );
        let pixels: Vec<&[u8]> = buffer.as_bytes().chunks_exact(4).collect();
        assert_eq!(pixels[0], &[1, 1, 1, 255]);
        assert_eq!(pixels[1], &[1, 1, 1, 255]);
        assert_eq!(pixels[2], &[255; 4]);
        assert_eq!(pixels[3], &[1, 1, 1, 255]);
        // Overlap at (21, 31) belongs to the second patch.
        assert_eq!(pixels[4], &[2, 2, 2, 255]);
        assert_eq!(pixels[5], &[2, 2, 2, 255]);
        assert_eq!(pixels[6], &[255; 4]);
        assert_eq!(pixels[8], &[2, 2, 2, 255]);
    }

    #[test]
    fn oversized_canvases_are_rejected_before_allocating() {
        assert!(matches!(
            FixedStack::new(MAX_DIMENSION + 1, 1, ColorMode::Rgba),
            Err(EncodeError::InvalidGeometry(_))
        ));

        let mut stack = DynamicStack::new(ColorMode::Rgb).unwrap();
        stack.push(&[0; 3], 0, 0, 1, 1).unwrap();
        stack.push(&[0; 3], u32::MAX - 2, 0, 1, 1).unwrap();
        assert_eq!(stack.dimensions().map(|rect| rect.width), Some(u32::MAX - 1));
        assert!(matches!(stack.to_buffer(), Err(EncodeError::InvalidGeometry(_))));
        assert!(stack.encode(&Encoder::default()).is_err());
    }

    #[test]
    fn dynamic_stack_encodes_async() {
        let mut stack = DynamicStack::new(ColorMode::Bgra).unwrap();
        stack.push(&[1, 2, 3, 4], 0, 0, 1, 1).unwrap();
        let (task, rect) = stack.encode_async(&Encoder::default()).unwrap();
        assert_eq!((rect.width, rect.height), (1, 1));
        let decoded = decode(&task.wait().unwrap()).unwrap();
        assert_eq!(decoded.data(), &[3, 2, 1, 4]);
    }

    #[test]
    fn dynamic_stack_checks_patch_length() {
        let mut stack = DynamicStack::new(ColorMode::Rgb).unwrap();
        assert!(stack.push(&[0; 5], 0, 0, 2, 1).is_err());
        assert!(stack.push(&[0; 3], u32::MAX, 0, 2, 1).is_err());
        assert!(stack.is_empty());
    }
}
