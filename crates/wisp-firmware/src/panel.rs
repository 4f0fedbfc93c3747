//! SSD1306 128x32 OLED as a [`Panel`]

use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::Rectangle;
use log::{error, info};
use ssd1306::Ssd1306;
use ssd1306::mode::{BufferedGraphicsMode, DisplayConfig as _};
use ssd1306::prelude::WriteOnlyDataCommand;
use ssd1306::size::DisplaySize128x32;

use wisp_core::{DisplayError, Panel};

type Driver<DI> = Ssd1306<DI, DisplaySize128x32, BufferedGraphicsMode<DisplaySize128x32>>;

/// The driver keeps its own buffer; drawing only touches RAM and
/// [`Panel::flush`] sends it over I2C.
pub struct OledPanel<DI> {
    driver: Driver<DI>,
}

impl<DI: WriteOnlyDataCommand> OledPanel<DI> {
    pub fn new(driver: Driver<DI>) -> Self {
        Self { driver }
    }
}

impl<DI: WriteOnlyDataCommand> OriginDimensions for OledPanel<DI> {
    fn size(&self) -> Size {
        self.driver.size()
    }
}

impl<DI: WriteOnlyDataCommand> DrawTarget for OledPanel<DI> {
    type Color = BinaryColor;
    type Error = <Driver<DI> as DrawTarget>::Error;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        self.driver.draw_iter(pixels)
    }

    fn fill_contiguous<I>(&mut self, area: &Rectangle, colors: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Self::Color>,
    {
        self.driver.fill_contiguous(area, colors)
    }
}

impl<DI: WriteOnlyDataCommand> Panel for OledPanel<DI> {
    fn init(&mut self) -> Result<(), DisplayError> {
        self.driver.init().map_err(|e| {
            error!("SSD1306 did not answer: {:?}", e);
            DisplayError::Init
        })?;
        info!("SSD1306 ready");
        Ok(())
    }

    fn flush(&mut self) -> Result<(), DisplayError> {
        self.driver.flush().map_err(|_| DisplayError::Bus)
    }
}
