// ABOUTME: w3mimgdisplay overlay protocol implementation
// ABOUTME: Maps cells to window pixels and pipes draw/clear commands to the overlay helper

use super::ImageProtocol;
use super::cache::NormalizedCache;
use super::scaling::{CellSize, PixelRect, TargetArea, scale_to_fit};
use super::tools::ExternalTools;
use crate::error::{Result, TermpixError};
use std::path::{Path, PathBuf};
use std::rc::Rc;

pub struct W3mProtocol {
    tools: Rc<dyn ExternalTools>,
    helper: PathBuf,
    cache: NormalizedCache,
}

impl W3mProtocol {
    pub fn new(tools: Rc<dyn ExternalTools>, helper: PathBuf, cache: NormalizedCache) -> Self {
        Self {
            tools,
            helper,
            cache,
        }
    }

    pub fn helper(&self) -> &Path {
        &self.helper
    }

    /// Cell size derived from the X window, which is what the overlay draws in
    fn window_cells(&self, columns: u16, rows: u16) -> Result<(CellSize, (u32, u32))> {
        let (window_width, window_height) = self
            .tools
            .window_geometry()
            .ok_or(TermpixError::GeometryUnavailable("window pixel size"))?;
        let cell = CellSize::from_window(window_width, window_height, columns, rows)
            .ok_or(TermpixError::GeometryUnavailable("cell size"))?;
        Ok((cell, (window_width, window_height)))
    }

    /// Erase the overlay over `area`, padded by one cell left and right.
    ///
    /// Returns true when there was nothing to erase because the window
    /// geometry is unknown.
    pub fn clear_region(&self, area: &TargetArea, columns: u16, rows: u16) -> bool {
        match self.erase(area, columns, rows) {
            Ok(()) => true,
            Err(e) => {
                log::debug!("Overlay clear failed: {}", e);
                false
            }
        }
    }

    fn erase(&self, area: &TargetArea, columns: u16, rows: u16) -> Result<()> {
        let (cell, window) = match self.window_cells(columns, rows) {
            Ok(found) => found,
            Err(e) => {
                log::debug!("Skipping overlay clear: {}", e);
                return Ok(());
            }
        };

        let rect = padded_rect(cell, area, window);
        self.tools.send_overlay(&self.helper, &clear_commands(&rect))
    }
}

impl ImageProtocol for W3mProtocol {
    fn display(&mut self, path: &Path, area: &TargetArea) -> Result<()> {
        // Helper commands are newline-delimited
        if has_line_break(path) {
            return Err(TermpixError::tool(
                &self.helper.to_string_lossy(),
                format!("image path contains a line break: {:?}", path),
            ));
        }

        let (columns, rows) = self
            .tools
            .terminal_size()
            .ok_or(TermpixError::GeometryUnavailable("terminal size"))?;
        let (cell, _) = self.window_cells(columns, rows)?;
        let rect = cell.to_pixel_rect(area);

        let source = self.cache.resolve(self.tools.as_ref(), path)?;
        let (source_width, source_height) = self.tools.identify(&source)?;
        let (width, height) = scale_to_fit(source_width, source_height, rect.width, rect.height);

        log::debug!(
            "Overlaying {} at {},{} as {}x{}",
            source.display(),
            rect.x,
            rect.y,
            width,
            height
        );
        self.tools
            .send_overlay(&self.helper, &draw_commands(&rect, width, height, &source))
    }

    fn clear(&mut self, area: Option<&TargetArea>) -> Result<()> {
        let Some((columns, rows)) = self.tools.terminal_size() else {
            log::debug!("Skipping overlay clear: terminal size unknown");
            return Ok(());
        };
        let full = TargetArea::new(0, 0, columns, rows);
        self.erase(area.unwrap_or(&full), columns, rows)
    }
}

fn has_line_break(path: &Path) -> bool {
    path.as_os_str()
        .as_encoded_bytes()
        .iter()
        .any(|byte| matches!(byte, b'\n' | b'\r'))
}

fn padded_rect(cell: CellSize, area: &TargetArea, window: (u32, u32)) -> PixelRect {
    let (window_width, window_height) = window;
    let rect = cell.to_pixel_rect(area);

    let x = rect.x.saturating_sub(cell.width).min(window_width);
    let y = rect.y.min(window_height);
    let width = (rect.width + 2 * cell.width).min(window_width - x);
    let height = rect.height.min(window_height - y);

    PixelRect {
        x,
        y,
        width,
        height,
    }
}

/// Draw `source` at the rect origin, then sync and flush the helper
pub fn draw_commands(rect: &PixelRect, width: u32, height: u32, source: &Path) -> String {
    format!(
        "0;1;{};{};{};{};;;;;{}\n4;\n3;\n",
        rect.x,
        rect.y,
        width,
        height,
        source.display()
    )
}

pub fn clear_commands(rect: &PixelRect) -> String {
    format!(
        "6;{};{};{};{};\n4;\n3;\n",
        rect.x, rect.y, rect.width, rect.height
    )
}
