// ABOUTME: Terminal capability detection for image protocol support
// ABOUTME: Picks one protocol from env signals and installed tools, honoring explicit overrides

use crate::constants::{SIXEL_TERM_SIGNATURES, env as env_keys, overlay, tools};
use crate::image_protocols::Protocol;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

/// Answers "is this tool installed?" without running it
pub trait ToolProbe {
    fn command_exists(&self, name: &str) -> bool;
    fn file_exists(&self, path: &Path) -> bool;
}

/// Searches `PATH` the way a shell would
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProbe;

impl ToolProbe for SystemProbe {
    fn command_exists(&self, name: &str) -> bool {
        if name.contains(std::path::MAIN_SEPARATOR) {
            return is_executable(Path::new(name));
        }

        let Some(search_path) = env::var_os("PATH") else {
            return false;
        };
        env::split_paths(&search_path).any(|dir| is_executable(&dir.join(name)))
    }

    fn file_exists(&self, path: &Path) -> bool {
        is_executable(path)
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|metadata| metadata.is_file() && metadata.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Snapshot of the environment variables detection looks at
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    pub fn from_process() -> Self {
        let vars = [
            env_keys::TERM,
            env_keys::TERM_PROGRAM,
            env_keys::FORCE_PROTOCOL,
        ]
        .iter()
        .filter_map(|key| env::var(key).ok().map(|value| (key.to_string(), value)))
        .collect();

        Self { vars }
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            vars: pairs
                .into_iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }
}

/// Inputs to detection that come from configuration rather than the terminal
#[derive(Debug, Clone, Default)]
pub struct DetectionOptions {
    /// Protocol name from the config file; the env override wins over it
    pub forced_protocol: Option<String>,
    /// Overlay helper location checked before the standard install paths
    pub overlay_helper: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalCapabilities {
    pub protocol: Option<Protocol>,
    pub overlay_helper: Option<PathBuf>,
    pub terminal_name: String,
}

enum Override {
    Force(Protocol),
    Disable,
}

impl TerminalCapabilities {
    pub fn detect() -> Self {
        Self::detect_with(
            &Environment::from_process(),
            &SystemProbe,
            &DetectionOptions::default(),
        )
    }

    pub fn detect_with(
        environment: &Environment,
        probe: &dyn ToolProbe,
        options: &DetectionOptions,
    ) -> Self {
        let overlay_helper = find_overlay_helper(probe, options.overlay_helper.as_deref());

        // User override first: env beats config
        let forced = environment
            .get(env_keys::FORCE_PROTOCOL)
            .or(options.forced_protocol.as_deref());
        if let Some(forced) = forced {
            match parse_override(forced) {
                Some(choice) => {
                    let protocol = match choice {
                        Override::Force(protocol) => Some(protocol),
                        Override::Disable => None,
                    };
                    log::debug!("Image protocol forced to {:?}", protocol);
                    return Self {
                        protocol,
                        overlay_helper: overlay_helper.or_else(default_overlay_helper),
                        terminal_name: format!("forced-{}", forced),
                    };
                }
                None => log::warn!(
                    "Unknown protocol '{}' in {}. Valid values: kitty, sixel, w3m, none",
                    forced,
                    env_keys::FORCE_PROTOCOL
                ),
            }
        }

        let protocol = detect_protocol(environment, probe, overlay_helper.as_deref());
        let terminal_name = determine_terminal_name(
            environment.get(env_keys::TERM_PROGRAM).unwrap_or_default(),
            environment.get(env_keys::TERM).unwrap_or_default(),
        );
        log::debug!("Detected image protocol {:?} for {}", protocol, terminal_name);

        Self {
            protocol,
            overlay_helper,
            terminal_name,
        }
    }

    pub fn supports_inline_images(&self) -> bool {
        self.protocol.is_some()
    }
}

/// Automatic selection; Kitty is never chosen here because it fights with
/// full-screen interactive rendering, so it is reachable only by override.
pub fn detect_protocol(
    environment: &Environment,
    probe: &dyn ToolProbe,
    overlay_helper: Option<&Path>,
) -> Option<Protocol> {
    let term = environment.get(env_keys::TERM).unwrap_or_default();

    if detect_sixel_support(term, probe) {
        return Some(Protocol::Sixel);
    }

    if detect_overlay_support(probe, overlay_helper) {
        return Some(Protocol::W3m);
    }

    None
}

fn parse_override(value: &str) -> Option<Override> {
    match value.trim().to_lowercase().as_str() {
        "kitty" => Some(Override::Force(Protocol::Kitty)),
        "sixel" => Some(Override::Force(Protocol::Sixel)),
        "w3m" | "w3mimgdisplay" => Some(Override::Force(Protocol::W3m)),
        "none" | "disable" | "disabled" => Some(Override::Disable),
        _ => None,
    }
}

fn detect_sixel_support(term: &str, probe: &dyn ToolProbe) -> bool {
    let signature = SIXEL_TERM_SIGNATURES
        .iter()
        .any(|signature| term.contains(signature))
        || probe.command_exists(tools::IMG2SIXEL);

    signature && probe.command_exists(tools::CONVERT)
}

fn detect_overlay_support(probe: &dyn ToolProbe, overlay_helper: Option<&Path>) -> bool {
    overlay_helper.is_some()
        && [tools::XWININFO, tools::XDOTOOL, tools::IDENTIFY]
            .iter()
            .all(|tool| probe.command_exists(tool))
}

/// First existing helper: the configured path, then the standard install paths
pub fn find_overlay_helper(probe: &dyn ToolProbe, configured: Option<&Path>) -> Option<PathBuf> {
    configured
        .into_iter()
        .chain(overlay::HELPER_PATHS.iter().map(Path::new))
        .find(|path| probe.file_exists(path))
        .map(Path::to_path_buf)
}

fn default_overlay_helper() -> Option<PathBuf> {
    overlay::HELPER_PATHS.first().map(PathBuf::from)
}

fn determine_terminal_name(term_program: &str, term: &str) -> String {
    if !term_program.is_empty() {
        term_program.to_string()
    } else if !term.is_empty() {
        term.to_string()
    } else {
        "unknown".to_string()
    }
}
