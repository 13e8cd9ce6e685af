// ABOUTME: Kitty terminal graphics protocol implementation
// ABOUTME: Caches transmissions per (path, pixel box), chunks payloads, swaps placements atomically

use super::scaling::{CellSize, TargetArea, scale_to_fit};
use super::tools::{ExternalTools, RasterFormat};
use super::{ImageProtocol, TerminalWriter, cursor_to};
use crate::constants::kitty::{CHUNK_SIZE, FORMAT_PNG, PLACEMENT_ID};
use crate::constants::tools::CONVERT;
use crate::error::{Result, TermpixError};
use base64::{Engine, engine::general_purpose::STANDARD};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Terminal-side image id; never zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ImageId(u32);

impl ImageId {
    pub fn new(id: u32) -> Option<Self> {
        (id != 0).then_some(Self(id))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Image path plus the pixel box it was fitted into
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    path: PathBuf,
    box_width: u32,
    box_height: u32,
}

/// Hands out ids starting from a clock-derived seed
#[derive(Debug)]
struct IdAllocator {
    next: u32,
}

impl IdAllocator {
    fn from_clock() -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.subsec_nanos() ^ elapsed.as_secs() as u32)
            .unwrap_or(1);
        Self { next: seed }
    }

    fn starting_at(next: u32) -> Self {
        Self { next }
    }

    fn allocate(&mut self, in_use: impl Fn(u32) -> bool) -> ImageId {
        loop {
            let candidate = self.next;
            self.next = self.next.wrapping_add(1);
            if candidate != 0 && !in_use(candidate) {
                return ImageId(candidate);
            }
        }
    }
}

pub struct KittyProtocol {
    tools: Rc<dyn ExternalTools>,
    out: TerminalWriter,
    transmissions: HashMap<CacheKey, ImageId>,
    /// Oldest first; drives eviction when a cache limit is set
    transmission_order: VecDeque<CacheKey>,
    max_cached: Option<usize>,
    current: Option<ImageId>,
    ids: IdAllocator,
}

impl KittyProtocol {
    pub fn new(tools: Rc<dyn ExternalTools>, out: TerminalWriter) -> Self {
        Self {
            tools,
            out,
            transmissions: HashMap::new(),
            transmission_order: VecDeque::new(),
            max_cached: None,
            current: None,
            ids: IdAllocator::from_clock(),
        }
    }

    /// Keep at most `limit` transmitted images alive in the terminal
    pub fn with_cache_limit(mut self, limit: Option<usize>) -> Self {
        self.max_cached = limit.map(|limit| limit.max(1));
        self
    }

    /// Start id allocation at `seed` instead of the clock
    pub fn with_id_seed(mut self, seed: u32) -> Self {
        self.ids = IdAllocator::starting_at(seed);
        self
    }

    pub fn current_image(&self) -> Option<ImageId> {
        self.current
    }

    pub fn cached_transmissions(&self) -> usize {
        self.transmissions.len()
    }

    /// Rasterize, transmit, and remember a new image
    fn transmit(&mut self, path: &Path, key: CacheKey, size: (u32, u32)) -> Result<ImageId> {
        let (width, height) = size;
        let payload = self.tools.rasterize(path, width, height, RasterFormat::Png)?;
        if payload.is_empty() {
            return Err(TermpixError::tool(CONVERT, "empty output"));
        }

        let transmissions = &self.transmissions;
        let current = self.current;
        let id = self.ids.allocate(|candidate| {
            current.is_some_and(|id| id.0 == candidate)
                || transmissions.values().any(|id| id.0 == candidate)
        });

        log::debug!(
            "Transmitting {} as image {} ({}x{}, {} bytes)",
            path.display(),
            id,
            width,
            height,
            payload.len()
        );
        self.out.write_all(encode_transmission(id, &payload).as_bytes())?;
        self.out.flush()?;

        self.transmissions.insert(key.clone(), id);
        self.transmission_order.push_back(key);
        Ok(id)
    }

    /// Drop the oldest transmissions beyond the configured limit
    fn enforce_cache_limit(&mut self) {
        let Some(limit) = self.max_cached else {
            return;
        };

        while self.transmissions.len() > limit {
            let current = self.current;
            let Some(position) = self
                .transmission_order
                .iter()
                .position(|key| self.transmissions.get(key).copied() != current)
            else {
                break;
            };
            let Some(key) = self.transmission_order.remove(position) else {
                break;
            };
            if let Some(id) = self.transmissions.remove(&key) {
                log::debug!("Evicting image {} for {}", id, key.path.display());
                if let Err(e) = self.out.write_all(free_image_command(id).as_bytes()) {
                    log::debug!("Failed to free image {}: {}", id, e);
                }
            }
        }

        if let Err(e) = self.out.flush() {
            log::debug!("Failed to flush evictions: {}", e);
        }
    }
}

impl ImageProtocol for KittyProtocol {
    fn display(&mut self, path: &Path, area: &TargetArea) -> Result<()> {
        let cell = CellSize::detect(self.tools.as_ref())
            .ok_or(TermpixError::GeometryUnavailable("terminal cell size"))?;
        let (max_width, max_height) = cell.max_pixels(area);

        let (source_width, source_height) = self.tools.identify(path)?;
        let (width, height) = scale_to_fit(source_width, source_height, max_width, max_height);
        if width == 0 || height == 0 {
            return Err(TermpixError::GeometryUnavailable("target area is empty"));
        }

        let key = CacheKey {
            path: path.to_path_buf(),
            box_width: max_width,
            box_height: max_height,
        };
        let id = match self.transmissions.get(&key) {
            Some(id) => {
                log::debug!("Reusing image {} for {}", id, path.display());
                *id
            }
            None => self.transmit(path, key, (width, height))?,
        };

        let mut frame = cursor_to(area).into_bytes();
        frame.extend_from_slice(place_command(id).as_bytes());
        // New placement first, then the old one goes: no blank frame between
        if let Some(previous) = self.current.filter(|previous| *previous != id) {
            frame.extend_from_slice(delete_placements_command(previous).as_bytes());
        }
        log::trace!("Kitty placement frame: {:?}", String::from_utf8_lossy(&frame));

        self.out.write_all(&frame)?;
        self.out.flush()?;
        self.current = Some(id);

        self.enforce_cache_limit();
        Ok(())
    }

    fn clear(&mut self, _area: Option<&TargetArea>) -> Result<()> {
        if let Some(id) = self.current.take() {
            self.out.write_all(delete_placements_command(id).as_bytes())?;
            self.out.flush()?;
        }
        Ok(())
    }

    fn atomic_replace(&self) -> bool {
        true
    }
}

/// Encode `data` as PNG transmission frames for image `id`.
///
/// The first frame carries the action, format, and id; the rest carry only
/// the continuation flag, which is `m=0` on the final frame.
pub fn encode_transmission(id: ImageId, data: &[u8]) -> String {
    let base64_data = STANDARD.encode(data);
    let total = base64_data.len();
    let chunk_count = total.div_ceil(CHUNK_SIZE).max(1);

    let mut output = String::with_capacity(total + chunk_count * 48);
    for index in 0..chunk_count {
        // base64 is ASCII, so byte offsets are char boundaries
        let start = index * CHUNK_SIZE;
        let end = (start + CHUNK_SIZE).min(total);
        let chunk = &base64_data[start..end];
        let m_value = if index + 1 == chunk_count { 0 } else { 1 };

        if index == 0 {
            output.push_str(&format!(
                "\x1b_Ga=t,f={},i={},q=2,m={};{}\x1b\\",
                FORMAT_PNG, id, m_value, chunk
            ));
        } else {
            output.push_str(&format!("\x1b_Gm={};{}\x1b\\", m_value, chunk));
        }
    }

    output
}

/// Show a transmitted image at the cursor without moving the cursor
pub fn place_command(id: ImageId) -> String {
    format!("\x1b_Ga=p,i={},p={},C=1,q=2\x1b\\", id, PLACEMENT_ID)
}

/// Remove placements of `id` but keep its data for later reuse
pub fn delete_placements_command(id: ImageId) -> String {
    format!("\x1b_Ga=d,d=i,i={},q=2\x1b\\", id)
}

/// Remove placements of `id` and free its data
pub fn free_image_command(id: ImageId) -> String {
    format!("\x1b_Ga=d,d=I,i={},q=2\x1b\\", id)
}
