// ABOUTME: Sixel graphics protocol implementation
// ABOUTME: Stateless encoder that prints an ImageMagick sixel stream at the cursor

use super::scaling::{CellSize, TargetArea};
use super::tools::{ExternalTools, RasterFormat};
use super::{ImageProtocol, TerminalWriter, cursor_to};
use crate::constants::tools::CONVERT;
use crate::error::{Result, TermpixError};
use std::io::Write;
use std::path::Path;
use std::rc::Rc;

pub struct SixelProtocol {
    tools: Rc<dyn ExternalTools>,
    out: TerminalWriter,
}

impl SixelProtocol {
    pub fn new(tools: Rc<dyn ExternalTools>, out: TerminalWriter) -> Self {
        Self { tools, out }
    }
}

impl ImageProtocol for SixelProtocol {
    fn display(&mut self, path: &Path, area: &TargetArea) -> Result<()> {
        let cell = CellSize::detect(self.tools.as_ref()).unwrap_or_default();
        let (max_width, max_height) = cell.max_pixels(area);

        let sixel = self
            .tools
            .rasterize(path, max_width, max_height, RasterFormat::Sixel)?;
        if sixel.is_empty() {
            return Err(TermpixError::tool(CONVERT, "empty output"));
        }

        log::debug!(
            "Printing {} as sixel within {}x{} ({} bytes)",
            path.display(),
            max_width,
            max_height,
            sixel.len()
        );
        self.out.write_all(cursor_to(area).as_bytes())?;
        self.out.write_all(&sixel)?;
        self.out.flush()?;
        Ok(())
    }

    /// Sixel output is ordinary cell content; the caller redraws over it
    fn clear(&mut self, _area: Option<&TargetArea>) -> Result<()> {
        Ok(())
    }
}
