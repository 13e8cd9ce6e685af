// ABOUTME: Library exports for termpix terminal image display
// ABOUTME: Exposes the Display facade, protocol encoders, configuration, and error types

pub mod config;
pub mod constants;
pub mod display;
pub mod error;
pub mod image_protocols;

#[cfg(test)]
mod test_helpers;

pub use config::TermpixConfig;
pub use display::{Display, DisplayInfo};
pub use error::{Result, TermpixError};
pub use image_protocols::{Protocol, TargetArea};
