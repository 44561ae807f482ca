use std::borrow::Cow;

use crate::PixelBuffer;

/// Rows of a pixel buffer, top to bottom, in the sample order PNG stores.
///
/// Blue-first layouts are copied with red and blue exchanged; everything else
/// is borrowed.
pub(crate) struct Scanlines<'a> {
    rows: std::slice::Chunks<'a, u8>,
    swap_stride: Option<usize>,
}
impl<'a> Scanlines<'a> {
    pub(crate) fn new(buffer: &'a PixelBuffer) -> Self {
        let mode = buffer.color_mode();
        Self {
            rows: buffer.rows(),
            swap_stride: mode
                .swaps_red_blue()
                .then_some(mode.channel_count() as usize),
        }
    }
}
impl<'a> Iterator for Scanlines<'a> {
    type Item = Cow<'a, [u8]>;
    fn next(&mut self) -> Option<Self::Item> {
        let row = self.rows.next()?;
        let Some(stride) = self.swap_stride else {
            return Some(Cow::Borrowed(row));
        };
        let mut swapped = row.to_vec();
        for pixel in swapped.chunks_exact_mut(stride) {
            pixel.swap(0, 2);
        }
        Some(Cow::Owned(swapped))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}
