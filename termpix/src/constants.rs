// ABOUTME: Centralized constants for terminal image display
// ABOUTME: Contains protocol limits, default geometry, tool names, helper paths, and env keys

/// Kitty graphics protocol framing
pub mod kitty {
    /// Maximum base64 payload bytes per APC frame (must stay a multiple of 4)
    pub const CHUNK_SIZE: usize = 4096;

    /// Kitty format code for PNG payloads
    pub const FORMAT_PNG: u32 = 100;

    /// Placement id used for every placement so re-placing an image moves it
    pub const PLACEMENT_ID: u32 = 1;
}

/// Character cell geometry fallbacks
pub mod geometry {
    /// Cell width in pixels when the terminal does not report pixel size
    pub const DEFAULT_CELL_WIDTH: u32 = 10;

    /// Cell height in pixels when the terminal does not report pixel size
    pub const DEFAULT_CELL_HEIGHT: u32 = 20;
}

/// External executables and their limits
pub mod tools {
    use std::time::Duration;

    pub const IDENTIFY: &str = "identify";
    pub const CONVERT: &str = "convert";
    pub const IMG2SIXEL: &str = "img2sixel";
    pub const XDOTOOL: &str = "xdotool";
    pub const XWININFO: &str = "xwininfo";

    /// Upper bound on any single subprocess invocation
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
}

/// w3mimgdisplay overlay helper
pub mod overlay {
    /// Install locations probed in order
    pub const HELPER_PATHS: &[&str] = &[
        "/usr/lib/w3m/w3mimgdisplay",
        "/usr/libexec/w3m/w3mimgdisplay",
        "/usr/local/libexec/w3m/w3mimgdisplay",
    ];

    /// Orientation values that need no normalization
    pub const IDENTITY_ORIENTATIONS: &[&str] = &["", "TopLeft", "Undefined"];
}

/// Environment variables read by termpix
pub mod env {
    /// Force a protocol: kitty, sixel, w3m, none
    pub const FORCE_PROTOCOL: &str = "TERMPIX_PROTOCOL";

    /// Directory for orientation-normalized copies
    pub const CACHE_DIR: &str = "TERMPIX_CACHE_DIR";

    /// Subprocess timeout, e.g. "500ms", "10s", "1m"
    pub const TOOL_TIMEOUT: &str = "TERMPIX_TOOL_TIMEOUT";

    /// Terminal signature variables
    pub const TERM: &str = "TERM";
    pub const TERM_PROGRAM: &str = "TERM_PROGRAM";
}

/// Terminal names whose TERM value signals sixel support
pub const SIXEL_TERM_SIGNATURES: &[&str] = &["xterm", "mlterm", "foot"];
