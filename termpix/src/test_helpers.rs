// ABOUTME: Test doubles shared by unit tests across modules
// ABOUTME: Scripted ExternalTools implementation and a cloneable in-memory terminal writer

use crate::error::{Result, TermpixError};
use crate::image_protocols::{ExternalTools, RasterFormat};
use std::cell::RefCell;
use std::io::{self, Write};
use std::path::Path;
use std::rc::Rc;

/// Scripted answers for every external query, recording each call
#[derive(Debug, Default)]
pub struct FakeTools {
    pub dimensions: Option<(u32, u32)>,
    pub orientation: String,
    pub payload: Vec<u8>,
    pub window: Option<(u32, u32)>,
    pub terminal: Option<(u16, u16)>,
    pub pixels: Option<(u32, u32)>,
    pub calls: RefCell<Vec<String>>,
    pub overlay: RefCell<Vec<String>>,
}

impl FakeTools {
    /// 80x24 terminal reporting 800x480 pixels (10x20 cells)
    pub fn kitty_terminal(dimensions: (u32, u32)) -> Self {
        Self {
            dimensions: Some(dimensions),
            orientation: "TopLeft".to_string(),
            payload: b"\x89PNG fake payload".to_vec(),
            terminal: Some((80, 24)),
            pixels: Some((800, 480)),
            ..Self::default()
        }
    }

    /// 80x24 terminal in a 1280x720 X window (16x30 cells)
    pub fn overlay_terminal(dimensions: (u32, u32)) -> Self {
        Self {
            window: Some((1280, 720)),
            ..Self::kitty_terminal(dimensions)
        }
    }

    /// Recorded calls starting with `name`
    pub fn calls_to(&self, name: &str) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter(|call| call.starts_with(name))
            .cloned()
            .collect()
    }

    fn record(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }
}

impl ExternalTools for FakeTools {
    fn identify(&self, path: &Path) -> Result<(u32, u32)> {
        self.record(format!("identify {}", path.display()));
        self.dimensions
            .ok_or_else(|| TermpixError::tool("identify", "no dimensions"))
    }

    fn orientation(&self, path: &Path) -> Result<String> {
        self.record(format!("orientation {}", path.display()));
        Ok(self.orientation.clone())
    }

    fn rasterize(
        &self,
        _path: &Path,
        width: u32,
        height: u32,
        format: RasterFormat,
    ) -> Result<Vec<u8>> {
        self.record(format!("rasterize {}x{} {:?}", width, height, format));
        Ok(self.payload.clone())
    }

    fn normalize_orientation(&self, source: &Path, dest: &Path) -> Result<()> {
        self.record(format!("normalize {}", source.display()));
        std::fs::write(dest, b"normalized")?;
        Ok(())
    }

    fn window_geometry(&self) -> Option<(u32, u32)> {
        self.record("window_geometry".to_string());
        self.window
    }

    fn terminal_size(&self) -> Option<(u16, u16)> {
        self.terminal
    }

    fn terminal_pixels(&self) -> Option<(u32, u32)> {
        self.pixels
    }

    fn send_overlay(&self, helper: &Path, commands: &str) -> Result<()> {
        self.record(format!("send_overlay {}", helper.display()));
        self.overlay.borrow_mut().push(commands.to_string());
        Ok(())
    }
}

/// Writer whose bytes stay readable after it is boxed into an encoder
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }

    pub fn reset(&self) {
        self.0.borrow_mut().clear();
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
