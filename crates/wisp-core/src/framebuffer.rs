//! RAM framebuffer for monochrome panels, with change detection.
//!
//! Every frame is drawn into this bit-packed buffer first. Flushing compares
//! it with the frame last sent and pushes only the bounding rectangle of the
//! pixels that differ, in a single `fill_contiguous` call. Clearing and
//! redrawing the same content therefore sends nothing.

extern crate alloc;

use alloc::vec;
use alloc::vec::Vec;
use core::convert::Infallible;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;
use log::trace;

/// Bounding box of pixels that differ from the panel contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DirtyRect {
    min_x: usize,
    min_y: usize,
    max_x: usize,
    max_y: usize,
}

impl DirtyRect {
    /// Expand the dirty region to include the span `x0..=x1` on row `y`.
    fn expand(&mut self, x0: usize, x1: usize, y: usize) {
        self.min_x = self.min_x.min(x0);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x1);
        self.max_y = self.max_y.max(y);
    }

    fn from_span(x0: usize, x1: usize, y: usize) -> Self {
        Self {
            min_x: x0,
            min_y: y,
            max_x: x1,
            max_y: y,
        }
    }
}

/// One bit per pixel, row-major, most significant bit leftmost.
///
/// A 128x32 panel takes 512 bytes, twice: the frame being drawn and the
/// frame the panel is showing.
pub struct FrameBuffer {
    width: usize,
    height: usize,
    bits: Vec<u8>,
    shown: Vec<u8>,
}

impl FrameBuffer {
    /// Allocate a framebuffer with every pixel off.
    pub fn new(size: Size) -> Self {
        let width = size.width as usize;
        let height = size.height as usize;
        let len = width.div_ceil(8) * height;
        Self {
            width,
            height,
            bits: vec![0; len],
            shown: vec![0; len],
        }
    }

    fn stride(&self) -> usize {
        self.width.div_ceil(8)
    }

    /// Raw pixel bits, for comparing frames.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bits
    }

    /// Whether the frame differs from what was last flushed.
    pub fn is_dirty(&self) -> bool {
        self.bits != self.shown
    }

    /// Color at `point`; off outside the buffer.
    pub fn pixel(&self, point: Point) -> BinaryColor {
        if point.x < 0 || point.y < 0 {
            return BinaryColor::Off;
        }
        let (x, y) = (point.x as usize, point.y as usize);
        if x >= self.width || y >= self.height {
            return BinaryColor::Off;
        }
        self.get(x, y)
    }

    #[inline]
    fn get(&self, x: usize, y: usize) -> BinaryColor {
        let byte = self.bits[y * self.stride() + x / 8];
        BinaryColor::from(byte & (0x80 >> (x % 8)) != 0)
    }

    #[inline]
    fn set_pixel(&mut self, x: usize, y: usize, color: BinaryColor) {
        let idx = y * self.stride() + x / 8;
        let mask = 0x80 >> (x % 8);
        match color {
            BinaryColor::On => self.bits[idx] |= mask,
            BinaryColor::Off => self.bits[idx] &= !mask,
        }
    }

    fn changed_region(&self) -> Option<DirtyRect> {
        let stride = self.stride();
        let mut rect: Option<DirtyRect> = None;

        for (idx, (now, shown)) in self.bits.iter().zip(&self.shown).enumerate() {
            let diff = now ^ shown;
            if diff == 0 {
                continue;
            }
            let y = idx / stride;
            let byte_x = (idx % stride) * 8;
            let x0 = byte_x + diff.leading_zeros() as usize;
            let x1 = byte_x + 7 - diff.trailing_zeros() as usize;

            match &mut rect {
                Some(rect) => rect.expand(x0, x1, y),
                None => rect = Some(DirtyRect::from_span(x0, x1, y)),
            }
        }

        rect
    }

    /// Flush the changed region to a panel.
    ///
    /// If nothing changed, this is a no-op. If the panel reports an error the
    /// region stays dirty and is retried on the next flush.
    pub fn flush<D>(&mut self, display: &mut D) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = BinaryColor>,
    {
        let Some(rect) = self.changed_region() else {
            return Ok(());
        };

        let width = rect.max_x - rect.min_x + 1;
        let height = rect.max_y - rect.min_y + 1;

        trace!(
            "Flushing {}x{} dirty region at ({}, {})",
            width, height, rect.min_x, rect.min_y
        );

        let area = Rectangle::new(
            Point::new(rect.min_x as i32, rect.min_y as i32),
            Size::new(width as u32, height as u32),
        );

        let this = &*self;
        let pixel_iter = (rect.min_y..=rect.max_y)
            .flat_map(move |y| (rect.min_x..=rect.max_x).map(move |x| this.get(x, y)));

        display.fill_contiguous(&area, pixel_iter)?;
        self.shown.copy_from_slice(&self.bits);
        Ok(())
    }
}

impl OriginDimensions for FrameBuffer {
    fn size(&self) -> Size {
        Size::new(self.width as u32, self.height as u32)
    }
}

impl DrawTarget for FrameBuffer {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(coord, color) in pixels {
            let x = coord.x;
            let y = coord.y;
            if x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height {
                self.set_pixel(x as usize, y as usize, color);
            }
        }
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        let clamp = |start: i32, len: u32, limit: usize| {
            let start = i64::from(start);
            let end = start + i64::from(len);
            (
                start.clamp(0, limit as i64) as usize,
                end.clamp(0, limit as i64) as usize,
            )
        };
        let (x_start, x_end) = clamp(area.top_left.x, area.size.width, self.width);
        let (y_start, y_end) = clamp(area.top_left.y, area.size.height, self.height);

        for y in y_start..y_end {
            for x in x_start..x_end {
                self.set_pixel(x, y, color);
            }
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        let fill = match color {
            BinaryColor::On => 0xFF,
            BinaryColor::Off => 0x00,
        };
        self.bits.fill(fill);

        // Keep the padding bits past the right edge off
        let spare = self.stride() * 8 - self.width;
        if spare > 0 && color == BinaryColor::On {
            let mask = 0xFFu8 << spare;
            let stride = self.stride();
            for row in self.bits.chunks_mut(stride) {
                if let Some(last) = row.last_mut() {
                    *last &= mask;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records every pixel pushed by `fill_contiguous`.
    struct Recorder {
        size: Size,
        areas: Vec<Rectangle>,
        pixels: Vec<BinaryColor>,
    }

    impl Recorder {
        fn new() -> Self {
            Self {
                size: Size::new(16, 8),
                areas: Vec::new(),
                pixels: Vec::new(),
            }
        }
    }

    impl OriginDimensions for Recorder {
        fn size(&self) -> Size {
            self.size
        }
    }

    impl DrawTarget for Recorder {
        type Color = BinaryColor;
        type Error = Infallible;

        fn draw_iter<I>(&mut self, _pixels: I) -> Result<(), Self::Error>
        where
            I: IntoIterator<Item = Pixel<Self::Color>>,
        {
            Ok(())
        }

        fn fill_contiguous<I>(&mut self, area: &Rectangle, colors: I) -> Result<(), Self::Error>
        where
            I: IntoIterator<Item = Self::Color>,
        {
            self.areas.push(*area);
            self.pixels.extend(colors);
            Ok(())
        }
    }

    #[test]
    fn test_bit_packing() {
        let mut fb = FrameBuffer::new(Size::new(16, 8));
        fb.draw_iter([
            Pixel(Point::new(0, 0), BinaryColor::On),
            Pixel(Point::new(9, 1), BinaryColor::On),
        ])
        .unwrap();

        assert_eq!(fb.as_bytes().len(), 16);
        assert_eq!(fb.as_bytes()[0], 0x80);
        assert_eq!(fb.as_bytes()[3], 0x40);
        assert_eq!(fb.pixel(Point::new(9, 1)), BinaryColor::On);
        assert_eq!(fb.pixel(Point::new(-1, 0)), BinaryColor::Off);
        assert_eq!(fb.pixel(Point::new(16, 0)), BinaryColor::Off);
    }

    #[test]
    fn test_flush_sends_only_dirty_region() {
        let mut fb = FrameBuffer::new(Size::new(16, 8));
        let mut panel = Recorder::new();

        fb.fill_solid(
            &Rectangle::new(Point::new(2, 3), Size::new(3, 2)),
            BinaryColor::On,
        )
        .unwrap();
        fb.flush(&mut panel).unwrap();

        assert_eq!(
            panel.areas,
            vec![Rectangle::new(Point::new(2, 3), Size::new(3, 2))]
        );
        assert!(panel.pixels.iter().all(|&c| c == BinaryColor::On));
        assert!(!fb.is_dirty());
    }

    #[test]
    fn test_unchanged_pixels_do_not_dirty() {
        let mut fb = FrameBuffer::new(Size::new(16, 8));
        let mut panel = Recorder::new();

        fb.clear(BinaryColor::Off).unwrap();
        assert!(!fb.is_dirty());
        fb.flush(&mut panel).unwrap();
        assert!(panel.areas.is_empty());
    }

    #[test]
    fn test_redrawing_same_frame_sends_nothing() {
        let mut fb = FrameBuffer::new(Size::new(16, 8));
        let mut panel = Recorder::new();
        let bar = Rectangle::new(Point::new(9, 2), Size::new(4, 1));

        fb.fill_solid(&bar, BinaryColor::On).unwrap();
        fb.flush(&mut panel).unwrap();
        assert_eq!(panel.areas, vec![bar]);

        fb.clear(BinaryColor::Off).unwrap();
        fb.fill_solid(&bar, BinaryColor::On).unwrap();
        assert!(!fb.is_dirty());
        fb.flush(&mut panel).unwrap();
        assert_eq!(panel.areas.len(), 1);
    }

    #[test]
    fn test_clear_on_leaves_padding_off() {
        let mut fb = FrameBuffer::new(Size::new(12, 2));
        fb.clear(BinaryColor::On).unwrap();

        assert_eq!(fb.as_bytes(), &[0xFF, 0xF0, 0xFF, 0xF0]);
        assert_eq!(fb.pixel(Point::new(11, 1)), BinaryColor::On);
    }

    #[test]
    fn test_out_of_bounds_is_clipped() {
        let mut fb = FrameBuffer::new(Size::new(16, 8));
        fb.fill_solid(
            &Rectangle::new(Point::new(-4, 6), Size::new(8, 8)),
            BinaryColor::On,
        )
        .unwrap();

        assert_eq!(fb.pixel(Point::new(0, 6)), BinaryColor::On);
        assert_eq!(fb.pixel(Point::new(3, 7)), BinaryColor::On);
        assert_eq!(fb.pixel(Point::new(4, 7)), BinaryColor::Off);
    }
}
