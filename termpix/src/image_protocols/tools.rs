// ABOUTME: External tool collaborator for rasterizing, probing, and overlay piping
// ABOUTME: Wraps ImageMagick, xdotool/xwininfo, crossterm queries, and w3mimgdisplay behind a trait

use crate::constants::tools;
use crate::error::{Result, TermpixError};
use once_cell::sync::Lazy;
use regex::Regex;
use std::ffi::{OsStr, OsString};
use std::io::{Read, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;
use wait_timeout::ChildExt;

static WIDTH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Width: (\d+)").expect("valid regex"));
static HEIGHT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Height: (\d+)").expect("valid regex"));

/// Output encodings the rasterizer can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterFormat {
    /// PNG bytes for in-memory payloads
    Png,
    /// Sixel stream ready to print
    Sixel,
}

impl RasterFormat {
    fn output_spec(self) -> &'static str {
        match self {
            RasterFormat::Png => "PNG:-",
            RasterFormat::Sixel => "sixel:-",
        }
    }
}

/// Everything termpix needs from the outside world.
///
/// Encoders only talk to subprocesses and the terminal through this trait so
/// their geometry and framing logic can be exercised with a test double.
pub trait ExternalTools {
    /// Pixel dimensions of the first frame of `path`
    fn identify(&self, path: &Path) -> Result<(u32, u32)>;

    /// EXIF orientation name, e.g. "TopLeft" or "RightTop"
    fn orientation(&self, path: &Path) -> Result<String>;

    /// Shrink-only resize of `path` into `width`x`height`, auto-oriented
    fn rasterize(&self, path: &Path, width: u32, height: u32, format: RasterFormat)
        -> Result<Vec<u8>>;

    /// Write an auto-oriented copy of `source` to `dest`
    fn normalize_orientation(&self, source: &Path, dest: &Path) -> Result<()>;

    /// Pixel size of the active window, if it can be determined
    fn window_geometry(&self) -> Option<(u32, u32)>;

    /// Terminal size in (columns, rows)
    fn terminal_size(&self) -> Option<(u16, u16)>;

    /// Terminal text area size in pixels (width, height)
    fn terminal_pixels(&self) -> Option<(u32, u32)>;

    /// Feed newline-delimited commands to the overlay helper's stdin
    fn send_overlay(&self, helper: &Path, commands: &str) -> Result<()>;
}

/// Runs the real executables with a bounded timeout
#[derive(Debug, Clone)]
pub struct SystemTools {
    timeout: Duration,
}

impl Default for SystemTools {
    fn default() -> Self {
        Self::new(tools::DEFAULT_TIMEOUT)
    }
}

impl SystemTools {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `program`, returning its stdout once it exits successfully.
    ///
    /// Stdout is drained on a separate thread so a large payload cannot fill
    /// the pipe and stall the child past the timeout.
    fn run(&self, program: &OsStr, args: &[OsString], input: Option<&[u8]>) -> Result<Vec<u8>> {
        let name = program.to_string_lossy().into_owned();
        log::debug!("Running {} {:?}", name, args);

        let mut child = Command::new(program)
            .args(args)
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| TermpixError::tool(&name, e.to_string()))?;

        if let (Some(data), Some(mut stdin)) = (input, child.stdin.take()) {
            if let Err(e) = stdin.write_all(data) {
                let _ = child.kill();
                let _ = child.wait();
                return Err(TermpixError::tool(&name, format!("write to stdin: {}", e)));
            }
        }

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| TermpixError::tool(&name, "stdout not captured"))?;
        let reader = thread::spawn(move || {
            let mut buffer = Vec::new();
            stdout.read_to_end(&mut buffer).map(|_| buffer)
        });

        let status = match child.wait_timeout(self.timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                let _ = reader.join();
                return Err(TermpixError::Timeout {
                    tool: name,
                    after: self.timeout,
                });
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                let _ = reader.join();
                return Err(TermpixError::tool(&name, e.to_string()));
            }
        };

        let output = reader
            .join()
            .map_err(|_| TermpixError::tool(&name, "stdout reader panicked"))?
            .map_err(|e| TermpixError::tool(&name, e.to_string()))?;

        if !status.success() {
            return Err(TermpixError::tool(&name, format!("exited with {}", status)));
        }

        Ok(output)
    }

    fn run_text(&self, program: &str, args: &[OsString]) -> Result<String> {
        let output = self.run(OsStr::new(program), args, None)?;
        Ok(String::from_utf8_lossy(&output).trim().to_string())
    }
}

impl ExternalTools for SystemTools {
    fn identify(&self, path: &Path) -> Result<(u32, u32)> {
        let args = [os("-format"), os("%wx%h"), first_frame(path)];
        let output = self.run_text(tools::IDENTIFY, &args)?;
        parse_dimensions(&output).ok_or_else(|| {
            TermpixError::tool(tools::IDENTIFY, format!("unexpected output {:?}", output))
        })
    }

    fn orientation(&self, path: &Path) -> Result<String> {
        let args = [os("-format"), os("%[orientation]"), first_frame(path)];
        self.run_text(tools::IDENTIFY, &args)
    }

    fn rasterize(
        &self,
        path: &Path,
        width: u32,
        height: u32,
        format: RasterFormat,
    ) -> Result<Vec<u8>> {
        let args = [
            first_frame(path),
            os("-auto-orient"),
            os("-resize"),
            OsString::from(shrink_only_spec(width, height)),
            os(format.output_spec()),
        ];
        let output = self.run(OsStr::new(tools::CONVERT), &args, None)?;
        if output.is_empty() {
            return Err(TermpixError::tool(tools::CONVERT, "empty output"));
        }
        Ok(output)
    }

    fn normalize_orientation(&self, source: &Path, dest: &Path) -> Result<()> {
        let args = [
            source.as_os_str().to_owned(),
            os("-auto-orient"),
            dest.as_os_str().to_owned(),
        ];
        self.run(OsStr::new(tools::CONVERT), &args, None)?;
        Ok(())
    }

    fn window_geometry(&self) -> Option<(u32, u32)> {
        let window_id = self
            .run_text(tools::XDOTOOL, &[os("getactivewindow")])
            .map_err(|e| log::debug!("No active window: {}", e))
            .ok()
            .filter(|id| !id.is_empty())?;

        let info = self
            .run_text(tools::XWININFO, &[os("-id"), OsString::from(window_id)])
            .map_err(|e| log::debug!("xwininfo unavailable: {}", e))
            .ok()?;

        parse_window_geometry(&info)
    }

    fn terminal_size(&self) -> Option<(u16, u16)> {
        crossterm::terminal::size()
            .map_err(|e| log::debug!("Failed to get terminal size: {}", e))
            .ok()
            .filter(|(cols, rows)| *cols > 0 && *rows > 0)
    }

    fn terminal_pixels(&self) -> Option<(u32, u32)> {
        crossterm::terminal::window_size()
            .map_err(|e| log::debug!("Failed to get terminal pixel size: {}", e))
            .ok()
            .filter(|size| size.width > 0 && size.height > 0)
            .map(|size| (u32::from(size.width), u32::from(size.height)))
    }

    fn send_overlay(&self, helper: &Path, commands: &str) -> Result<()> {
        self.run(helper.as_os_str(), &[], Some(commands.as_bytes()))?;
        Ok(())
    }
}

/// ImageMagick geometry that only ever shrinks, e.g. `640x480>`
pub fn shrink_only_spec(width: u32, height: u32) -> String {
    format!("{}x{}>", width, height)
}

/// Parse identify's `<width>x<height>` output
pub fn parse_dimensions(output: &str) -> Option<(u32, u32)> {
    let (width, height) = output.trim().split_once('x')?;
    Some((width.trim().parse().ok()?, height.trim().parse().ok()?))
}

/// Pull `Width:` and `Height:` out of xwininfo output
pub fn parse_window_geometry(info: &str) -> Option<(u32, u32)> {
    let width = WIDTH_RE.captures(info)?.get(1)?.as_str().parse().ok()?;
    let height = HEIGHT_RE.captures(info)?.get(1)?.as_str().parse().ok()?;
    Some((width, height))
}

fn first_frame(path: &Path) -> OsString {
    let mut frame = path.as_os_str().to_owned();
    frame.push("[0]");
    frame
}

fn os(arg: &str) -> OsString {
    OsString::from(arg)
}
