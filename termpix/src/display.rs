// ABOUTME: Display facade that owns the chosen encoder and the currently shown image
// ABOUTME: Turns every failure into a false result so callers never handle terminal errors

use crate::config::TermpixConfig;
use crate::constants::overlay::HELPER_PATHS;
use crate::error::TermpixError;
use crate::image_protocols::{
    Encoder, Environment, ExternalTools, ImageProtocol, KittyProtocol, NormalizedCache, Protocol,
    SixelProtocol, SystemProbe, SystemTools, TargetArea, TerminalCapabilities, TerminalWriter,
    ToolProbe, W3mProtocol, find_overlay_helper,
};
use serde::Serialize;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Snapshot of the display state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayInfo {
    pub protocol: Option<Protocol>,
    pub supported: bool,
    pub current_image: Option<PathBuf>,
}

pub struct Display {
    encoder: Option<Encoder>,
    current_image: Option<PathBuf>,
    last_area: Option<TargetArea>,
}

impl Display {
    /// Use `protocol`, or detect one when `None`, with config from the standard locations
    pub fn new(protocol: Option<Protocol>) -> Self {
        let config = TermpixConfig::load().unwrap_or_else(|e| {
            log::warn!("Failed to load termpix config, using defaults: {:#}", e);
            TermpixConfig::default()
        });
        Self::with_config(protocol, &config)
    }

    pub fn with_config(protocol: Option<Protocol>, config: &TermpixConfig) -> Self {
        let tools: Rc<dyn ExternalTools> = Rc::new(SystemTools::new(config.tool_timeout()));
        Self::with_parts(
            protocol,
            tools,
            &SystemProbe,
            &Environment::from_process(),
            Box::new(io::stdout()),
            config,
        )
    }

    /// Assemble a display from explicit collaborators
    pub fn with_parts(
        protocol: Option<Protocol>,
        tools: Rc<dyn ExternalTools>,
        probe: &dyn ToolProbe,
        environment: &Environment,
        out: TerminalWriter,
        config: &TermpixConfig,
    ) -> Self {
        // Detection only runs when the caller left the choice open
        let mut detected_helper = None;
        let chosen = match protocol {
            Some(protocol) => {
                log::debug!("Image display using requested protocol {}", protocol);
                Some(protocol)
            }
            None => {
                let capabilities = TerminalCapabilities::detect_with(
                    environment,
                    probe,
                    &config.detection_options(),
                );
                match capabilities.protocol {
                    Some(protocol) => log::debug!(
                        "Image display using {} on {}",
                        protocol,
                        capabilities.terminal_name
                    ),
                    None => log::debug!("No image protocol for {}", capabilities.terminal_name),
                }
                detected_helper = capabilities.overlay_helper;
                capabilities.protocol
            }
        };

        let encoder = chosen.map(|protocol| match protocol {
            Protocol::Kitty => Encoder::Kitty(
                KittyProtocol::new(tools, out).with_cache_limit(config.max_cached_images),
            ),
            Protocol::Sixel => Encoder::Sixel(SixelProtocol::new(tools, out)),
            Protocol::W3m => {
                let helper = detected_helper
                    .or_else(|| find_overlay_helper(probe, config.overlay_helper.as_deref()))
                    .or_else(|| config.overlay_helper.clone())
                    .or_else(|| HELPER_PATHS.first().map(PathBuf::from))
                    .unwrap_or_default();
                let w3m = W3mProtocol::new(tools, helper, NormalizedCache::new(config.cache_dir()));
                log::debug!("Using overlay helper {}", w3m.helper().display());
                Encoder::W3m(w3m)
            }
        });

        Self {
            encoder,
            current_image: None,
            last_area: None,
        }
    }

    /// Draw `path` with its top-left corner at cell (`x`, `y`), at most
    /// `max_width` x `max_height` cells. Returns false on any failure.
    pub fn show(
        &mut self,
        path: impl AsRef<Path>,
        x: u16,
        y: u16,
        max_width: u16,
        max_height: u16,
    ) -> bool {
        let path = path.as_ref();
        let Some(encoder) = self.encoder.as_mut() else {
            log::debug!("{}", TermpixError::UnsupportedProtocol);
            return false;
        };

        if !path.exists() {
            log::debug!("{}", TermpixError::MissingResource(path.to_path_buf()));
            return false;
        }

        let area = TargetArea::new(x, y, max_width, max_height);
        match encoder.display(path, &area) {
            Ok(()) => {
                self.current_image = Some(path.to_path_buf());
                self.last_area = Some(area);
                true
            }
            Err(e) => {
                log::debug!("Failed to display {}: {}", path.display(), e);
                false
            }
        }
    }

    /// Remove the current image. False only when no protocol is available.
    pub fn clear(&mut self) -> bool {
        let Some(encoder) = self.encoder.as_mut() else {
            return false;
        };

        if let Err(e) = encoder.clear(self.last_area.as_ref()) {
            log::debug!("Failed to clear image: {}", e);
        }
        self.current_image = None;
        self.last_area = None;
        true
    }

    pub fn supported(&self) -> bool {
        self.encoder.is_some()
    }

    /// Whether showing a new image replaces the old one without a gap
    pub fn atomic_replace(&self) -> bool {
        self.encoder
            .as_ref()
            .is_some_and(|encoder| encoder.atomic_replace())
    }

    pub fn protocol(&self) -> Option<Protocol> {
        self.encoder.as_ref().map(Encoder::protocol)
    }

    pub fn current_image(&self) -> Option<&Path> {
        self.current_image.as_deref()
    }

    pub fn info(&self) -> DisplayInfo {
        DisplayInfo {
            protocol: self.protocol(),
            supported: self.supported(),
            current_image: self.current_image.clone(),
        }
    }
}

impl fmt::Debug for Display {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Display")
            .field("encoder", &self.encoder)
            .field("current_image", &self.current_image)
            .field("last_area", &self.last_area)
            .finish()
    }
}
