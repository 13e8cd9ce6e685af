// ABOUTME: Image protocol implementations for terminal inline image display
// ABOUTME: Defines the protocol set, the encoder trait, and the closed encoder type

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::Path;

pub mod cache;
pub mod detection;
pub mod kitty;
pub mod scaling;
pub mod sixel;
pub mod tools;
pub mod w3m;

pub use cache::NormalizedCache;
pub use detection::{
    DetectionOptions, Environment, SystemProbe, TerminalCapabilities, ToolProbe,
    find_overlay_helper,
};
pub use kitty::KittyProtocol;
pub use scaling::{scale_to_fit, CellSize, PixelRect, TargetArea};
pub use sixel::SixelProtocol;
pub use tools::{ExternalTools, RasterFormat, SystemTools};
pub use w3m::W3mProtocol;

/// Where encoders write their control sequences
pub type TerminalWriter = Box<dyn Write>;

/// Cursor move to the area's origin: row `y`, column `x`.
///
/// Terminals read 0 the same as 1, so the top-left cell is reachable as
/// either `(0, 0)` or `(1, 1)`.
pub fn cursor_to(area: &TargetArea) -> String {
    format!("\x1b[{};{}H", area.y, area.x)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Kitty graphics: id-tagged transmissions with separate placements
    Kitty,
    /// Sixel pixel stream printed inline
    Sixel,
    /// w3mimgdisplay overlay drawn in window pixels
    W3m,
}

impl Protocol {
    pub fn name(self) -> &'static str {
        match self {
            Protocol::Kitty => "kitty",
            Protocol::Sixel => "sixel",
            Protocol::W3m => "w3m",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub trait ImageProtocol {
    /// Draw `path` inside `area`
    fn display(&mut self, path: &Path, area: &TargetArea) -> Result<()>;

    /// Remove what `display` drew; `area` is the last displayed area, if any
    fn clear(&mut self, area: Option<&TargetArea>) -> Result<()>;

    /// Whether a new image can replace the old one without a visible gap
    fn atomic_replace(&self) -> bool {
        false
    }
}

/// The encoder chosen for a display session
pub enum Encoder {
    Kitty(KittyProtocol),
    Sixel(SixelProtocol),
    W3m(W3mProtocol),
}

impl Encoder {
    pub fn protocol(&self) -> Protocol {
        match self {
            Encoder::Kitty(_) => Protocol::Kitty,
            Encoder::Sixel(_) => Protocol::Sixel,
            Encoder::W3m(_) => Protocol::W3m,
        }
    }
}

impl ImageProtocol for Encoder {
    fn display(&mut self, path: &Path, area: &TargetArea) -> Result<()> {
        match self {
            Encoder::Kitty(kitty) => kitty.display(path, area),
            Encoder::Sixel(sixel) => sixel.display(path, area),
            Encoder::W3m(w3m) => w3m.display(path, area),
        }
    }

    fn clear(&mut self, area: Option<&TargetArea>) -> Result<()> {
        match self {
            Encoder::Kitty(kitty) => kitty.clear(area),
            Encoder::Sixel(sixel) => sixel.clear(area),
            Encoder::W3m(w3m) => w3m.clear(area),
        }
    }

    fn atomic_replace(&self) -> bool {
        match self {
            Encoder::Kitty(kitty) => kitty.atomic_replace(),
            Encoder::Sixel(sixel) => sixel.atomic_replace(),
            Encoder::W3m(w3m) => w3m.atomic_replace(),
        }
    }
}

impl fmt::Debug for Encoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Encoder").field(&self.protocol()).finish()
    }
}
