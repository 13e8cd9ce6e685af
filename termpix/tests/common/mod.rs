// ABOUTME: Shared doubles for termpix integration tests
// ABOUTME: Mock external tools, a fixed tool probe, and a readable terminal writer

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashSet;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use termpix::image_protocols::{ExternalTools, RasterFormat, ToolProbe};
use termpix::{Result, TermpixError};

/// Tools for an 80x24 terminal: 800x480 text area, 1280x720 window
pub struct MockTools {
    pub dimensions: (u32, u32),
    pub orientation: String,
    pub window: Option<(u32, u32)>,
    pub calls: RefCell<Vec<String>>,
    pub overlay: RefCell<Vec<String>>,
}

impl MockTools {
    pub fn new(dimensions: (u32, u32)) -> Self {
        Self {
            dimensions,
            orientation: "TopLeft".to_string(),
            window: Some((1280, 720)),
            calls: RefCell::new(Vec::new()),
            overlay: RefCell::new(Vec::new()),
        }
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }
}

impl ExternalTools for MockTools {
    fn identify(&self, path: &Path) -> Result<(u32, u32)> {
        self.calls
            .borrow_mut()
            .push(format!("identify {}", path.display()));
        Ok(self.dimensions)
    }

    fn orientation(&self, _path: &Path) -> Result<String> {
        self.calls.borrow_mut().push("orientation".to_string());
        Ok(self.orientation.clone())
    }

    fn rasterize(
        &self,
        _path: &Path,
        width: u32,
        height: u32,
        format: RasterFormat,
    ) -> Result<Vec<u8>> {
        self.calls
            .borrow_mut()
            .push(format!("rasterize {}x{} {:?}", width, height, format));
        Ok(vec![0x89, b'P', b'N', b'G'])
    }

    fn normalize_orientation(&self, _source: &Path, dest: &Path) -> Result<()> {
        self.calls.borrow_mut().push("normalize".to_string());
        std::fs::write(dest, b"upright").map_err(TermpixError::from)
    }

    fn window_geometry(&self) -> Option<(u32, u32)> {
        self.calls.borrow_mut().push("window_geometry".to_string());
        self.window
    }

    fn terminal_size(&self) -> Option<(u16, u16)> {
        Some((80, 24))
    }

    fn terminal_pixels(&self) -> Option<(u32, u32)> {
        Some((800, 480))
    }

    fn send_overlay(&self, _helper: &Path, commands: &str) -> Result<()> {
        self.calls.borrow_mut().push("send_overlay".to_string());
        self.overlay.borrow_mut().push(commands.to_string());
        Ok(())
    }
}

/// Probe answering from fixed sets of installed commands and files
#[derive(Default)]
pub struct FixedProbe {
    pub commands: HashSet<String>,
    pub files: HashSet<PathBuf>,
}

impl FixedProbe {
    pub fn with_commands(commands: &[&str]) -> Self {
        Self {
            commands: commands.iter().map(|c| c.to_string()).collect(),
            files: HashSet::new(),
        }
    }

    pub fn with_file(mut self, path: &str) -> Self {
        self.files.insert(PathBuf::from(path));
        self
    }
}

impl ToolProbe for FixedProbe {
    fn command_exists(&self, name: &str) -> bool {
        self.commands.contains(name)
    }

    fn file_exists(&self, path: &Path) -> bool {
        self.files.contains(path)
    }
}

#[derive(Clone, Default)]
pub struct Terminal(Rc<RefCell<Vec<u8>>>);

impl Terminal {
    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

impl Write for Terminal {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
