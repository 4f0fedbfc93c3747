//! Display collaborator
//!
//! [`StatusDisplay`] is the narrow interface the render loop draws through.
//! [`PanelDisplay`] implements it for any monochrome embedded-graphics panel
//! by drawing into a [`FrameBuffer`] and flushing only what changed.

use embedded_graphics::mono_font::{MonoTextStyle, iso_8859_1::FONT_5X8};
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Baseline, Text};
use log::error;

use crate::error::DisplayError;
use crate::framebuffer::FrameBuffer;

/// Text-oriented display surface.
pub trait StatusDisplay {
    /// Bring the panel up. A failure here is fatal.
    fn init(&mut self) -> Result<(), DisplayError>;

    /// Blank the frame being built.
    fn clear(&mut self);

    /// Draw `text` with its top-left corner at (`x`, `y`).
    fn draw_text(&mut self, x: i32, y: i32, text: &str);

    /// Push the frame to the glass.
    fn present(&mut self) -> Result<(), DisplayError>;
}

/// A physical (or simulated) monochrome panel.
pub trait Panel: DrawTarget<Color = BinaryColor> {
    fn init(&mut self) -> Result<(), DisplayError>;

    /// Called after the changed region has been drawn to the panel. Buffered
    /// drivers send their buffer here.
    fn flush(&mut self) -> Result<(), DisplayError> {
        Ok(())
    }
}

/// [`StatusDisplay`] over a [`Panel`], white 5x8 text on black.
///
/// The 5x8 font is the ISO 8859-1 variant so that `°` renders.
pub struct PanelDisplay<P> {
    panel: P,
    frame: FrameBuffer,
    text_style: MonoTextStyle<'static, BinaryColor>,
}

impl<P: Panel> PanelDisplay<P> {
    pub fn new(panel: P) -> Self {
        let frame = FrameBuffer::new(panel.bounding_box().size);
        Self {
            panel,
            frame,
            text_style: MonoTextStyle::new(&FONT_5X8, BinaryColor::On),
        }
    }

    /// The frame as last drawn.
    pub fn frame(&self) -> &FrameBuffer {
        &self.frame
    }

    pub fn panel(&self) -> &P {
        &self.panel
    }

    pub fn panel_mut(&mut self) -> &mut P {
        &mut self.panel
    }
}

impl<P: Panel> StatusDisplay for PanelDisplay<P> {
    fn init(&mut self) -> Result<(), DisplayError> {
        self.panel.init().inspect_err(|e| error!("Panel init failed: {}", e))
    }

    fn clear(&mut self) {
        let _ = self.frame.clear(BinaryColor::Off);
    }

    fn draw_text(&mut self, x: i32, y: i32, text: &str) {
        let _ = Text::with_baseline(text, Point::new(x, y), self.text_style, Baseline::Top)
            .draw(&mut self.frame);
    }

    fn present(&mut self) -> Result<(), DisplayError> {
        self.frame
            .flush(&mut self.panel)
            .map_err(|_| DisplayError::Bus)?;
        self.panel.flush()
    }
}
