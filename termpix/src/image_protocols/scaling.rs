// ABOUTME: Character-cell to pixel geometry and shrink-only aspect-preserving scaling
// ABOUTME: Shared by the Kitty and w3m encoders so every protocol sizes images the same way

use crate::constants::geometry::{DEFAULT_CELL_HEIGHT, DEFAULT_CELL_WIDTH};
use crate::image_protocols::tools::ExternalTools;
use serde::Serialize;

/// Requested placement in character cells; `x = 0, y = 0` is the top-left cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TargetArea {
    pub x: u16,
    pub y: u16,
    pub max_width: u16,
    pub max_height: u16,
}

impl TargetArea {
    pub fn new(x: u16, y: u16, max_width: u16, max_height: u16) -> Self {
        Self {
            x,
            y,
            max_width,
            max_height,
        }
    }
}

/// Rectangle in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Pixel size of one character cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellSize {
    pub width: u32,
    pub height: u32,
}

impl Default for CellSize {
    fn default() -> Self {
        Self {
            width: DEFAULT_CELL_WIDTH,
            height: DEFAULT_CELL_HEIGHT,
        }
    }
}

impl CellSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Divide a pixel area evenly among its cells.
    ///
    /// Returns `None` when the division would produce a zero-sized cell.
    pub fn from_window(
        pixel_width: u32,
        pixel_height: u32,
        columns: u16,
        rows: u16,
    ) -> Option<Self> {
        if columns == 0 || rows == 0 {
            return None;
        }

        let width = pixel_width / u32::from(columns);
        let height = pixel_height / u32::from(rows);
        if width == 0 || height == 0 {
            return None;
        }

        Some(Self { width, height })
    }

    /// Resolve the cell size of the running terminal.
    ///
    /// Falls back to 10x20 when the terminal does not report its pixel size;
    /// `None` only when the cell counts themselves are unknown.
    pub fn detect(tools: &dyn ExternalTools) -> Option<Self> {
        let (columns, rows) = tools.terminal_size()?;

        let detected = tools
            .terminal_pixels()
            .and_then(|(width, height)| Self::from_window(width, height, columns, rows));

        match detected {
            Some(cell) => Some(cell),
            None => {
                log::debug!(
                    "Terminal pixel size unavailable, assuming {}x{} cells",
                    DEFAULT_CELL_WIDTH,
                    DEFAULT_CELL_HEIGHT
                );
                Some(Self::default())
            }
        }
    }

    pub fn to_pixel_rect(&self, area: &TargetArea) -> PixelRect {
        PixelRect {
            x: self.width * u32::from(area.x),
            y: self.height * u32::from(area.y),
            width: self.width * u32::from(area.max_width),
            height: self.height * u32::from(area.max_height),
        }
    }

    /// Bounding box of `area` in pixels
    pub fn max_pixels(&self, area: &TargetArea) -> (u32, u32) {
        let rect = self.to_pixel_rect(area);
        (rect.width, rect.height)
    }
}

/// Shrink `source` to fit inside `max`, preserving aspect ratio.
///
/// Images that already fit are returned unchanged; nothing is ever enlarged.
/// Scaled dimensions truncate toward zero.
pub fn scale_to_fit(
    source_width: u32,
    source_height: u32,
    max_width: u32,
    max_height: u32,
) -> (u32, u32) {
    if source_width <= max_width && source_height <= max_height {
        return (source_width, source_height);
    }
    if source_width == 0 || source_height == 0 {
        return (source_width, source_height);
    }

    let width_ratio = max_width as f64 / source_width as f64;
    let height_ratio = max_height as f64 / source_height as f64;
    let scale_ratio = width_ratio.min(height_ratio);

    let target_width = (source_width as f64 * scale_ratio) as u32;
    let target_height = (source_height as f64 * scale_ratio) as u32;

    (target_width.min(max_width), target_height.min(max_height))
}
