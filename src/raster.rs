// ============================================================================
// RASTER TYPES — colors, immutable images, and the mutable working buffer
// ============================================================================
//
// `RasterImage` is the value type handed between components (history,
// snapshots, I/O). `PixelBuffer` is the only mutable raster and is owned by a
// single fill operation at a time.

use image::{Rgba, RgbaImage};
use std::sync::Arc;

use crate::error::FillError;

// ============================================================================
// COLOR
// ============================================================================

/// An 8-bit-per-channel RGBA color.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parse `#RRGGBB`, `RRGGBB`, `#RRGGBBAA`, or `r,g,b[,a]`.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.contains(',') {
            let parts: Vec<&str> = s.split(',').collect();
            if parts.len() != 3 && parts.len() != 4 {
                return None;
            }
            let r = parts[0].trim().parse::<u8>().ok()?;
            let g = parts[1].trim().parse::<u8>().ok()?;
            let b = parts[2].trim().parse::<u8>().ok()?;
            let a = match parts.get(3) {
                Some(p) => p.trim().parse::<u8>().ok()?,
                None => 255,
            };
            return Some(Self::rgba(r, g, b, a));
        }

        let hex = s.strip_prefix('#').unwrap_or(s);
        if !hex.is_ascii() {
            return None;
        }
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        match hex.len() {
            6 => Some(Self::rgb(byte(0)?, byte(2)?, byte(4)?)),
            8 => Some(Self::rgba(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
            _ => None,
        }
    }
}

impl From<Rgba<u8>> for Color {
    fn from(p: Rgba<u8>) -> Self {
        Self::rgba(p.0[0], p.0[1], p.0[2], p.0[3])
    }
}

impl From<Color> for Rgba<u8> {
    fn from(c: Color) -> Self {
        Rgba([c.r, c.g, c.b, c.a])
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
    }
}

// ============================================================================
// CONNECTIVITY
// ============================================================================

/// Which neighbors a traversal examines around each pixel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Connectivity {
    /// Left, right, up, down.
    Four,
    /// The four axis neighbors plus the diagonals.
    Eight,
}

const AXIS_OFFSETS: [(i64, i64); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];
const ALL_OFFSETS: [(i64, i64); 8] = [
    (-1, 0),
    (1, 0),
    (0, -1),
    (0, 1),
    (-1, -1),
    (1, -1),
    (-1, 1),
    (1, 1),
];

impl Connectivity {
    pub fn offsets(self) -> &'static [(i64, i64)] {
        match self {
            Connectivity::Four => &AXIS_OFFSETS,
            Connectivity::Eight => &ALL_OFFSETS,
        }
    }

    /// `4` or `8`; anything else is rejected.
    pub fn from_count(n: u32) -> Option<Self> {
        match n {
            4 => Some(Connectivity::Four),
            8 => Some(Connectivity::Eight),
            _ => None,
        }
    }

    pub fn count(self) -> u32 {
        self.offsets().len() as u32
    }
}

// ============================================================================
// RASTER IMAGE — immutable, cheaply clonable snapshot
// ============================================================================

/// An immutable RGBA8 raster. Clones share the same pixel storage.
#[derive(Clone)]
pub struct RasterImage {
    pixels: Arc<RgbaImage>,
}

impl RasterImage {
    /// A `width`×`height` image filled with one color.
    pub fn new(width: u32, height: u32, color: Color) -> Self {
        Self::from_rgba_image(RgbaImage::from_pixel(width, height, color.into()))
    }

    pub fn from_rgba_image(image: RgbaImage) -> Self {
        Self {
            pixels: Arc::new(image),
        }
    }

    /// Wrap raw row-major RGBA bytes. Returns `None` if the length does not
    /// match `width * height * 4`.
    pub fn from_raw(width: u32, height: u32, raw: Vec<u8>) -> Option<Self> {
        RgbaImage::from_raw(width, height, raw).map(Self::from_rgba_image)
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Color> {
        if x >= self.width() || y >= self.height() {
            return None;
        }
        Some((*self.pixels.get_pixel(x, y)).into())
    }

    pub fn as_rgba_image(&self) -> &RgbaImage {
        &self.pixels
    }

    /// Count pixels equal to `color` on all four channels.
    pub fn count_color(&self, color: Color) -> usize {
        let target: Rgba<u8> = color.into();
        self.pixels.pixels().filter(|p| **p == target).count()
    }

    pub fn memory_bytes(&self) -> usize {
        self.pixels.as_raw().len()
    }

    /// Pixel-for-pixel equality; shared storage short-circuits.
    pub fn same_pixels(&self, other: &RasterImage) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
            || (self.width() == other.width()
                && self.height() == other.height()
                && self.pixels.as_raw() == other.pixels.as_raw())
    }
}

impl PartialEq for RasterImage {
    fn eq(&self, other: &Self) -> bool {
        self.same_pixels(other)
    }
}

impl std::fmt::Debug for RasterImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterImage")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

// ============================================================================
// PIXEL BUFFER — the working raster of one fill operation
// ============================================================================

/// Mutable row-major RGBA8 raster. Every access is bounds-checked.
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

const CHANNELS: usize = 4;

impl PixelBuffer {
    /// Copy an image into a fresh working buffer.
    pub fn from_image(image: &RasterImage) -> Result<Self, FillError> {
        let (width, height) = (image.width(), image.height());
        let src = image.as_rgba_image().as_raw();
        if width == 0 || height == 0 || src.len() != width as usize * height as usize * CHANNELS {
            return Err(FillError::InvalidSource);
        }
        Ok(Self {
            width,
            height,
            data: copy_bytes(src)?,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of pixels.
    pub fn len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < self.width as i64 && y < self.height as i64
    }

    pub fn index_of(&self, x: u32, y: u32) -> Option<usize> {
        if x < self.width && y < self.height {
            Some(y as usize * self.width as usize + x as usize)
        } else {
            None
        }
    }

    pub fn coords(&self, index: usize) -> (u32, u32) {
        let w = self.width as usize;
        ((index % w) as u32, (index / w) as u32)
    }

    pub fn get(&self, x: u32, y: u32) -> Option<Color> {
        self.get_index(self.index_of(x, y)?)
    }

    pub fn set(&mut self, x: u32, y: u32, color: Color) -> bool {
        match self.index_of(x, y) {
            Some(index) => self.set_index(index, color),
            None => false,
        }
    }

    pub fn get_index(&self, index: usize) -> Option<Color> {
        let o = index.checked_mul(CHANNELS)?;
        let px = self.data.get(o..o + CHANNELS)?;
        Some(Color::rgba(px[0], px[1], px[2], px[3]))
    }

    pub fn set_index(&mut self, index: usize, color: Color) -> bool {
        let Some(o) = index.checked_mul(CHANNELS) else {
            return false;
        };
        match self.data.get_mut(o..o + CHANNELS) {
            Some(px) => {
                px.copy_from_slice(&[color.r, color.g, color.b, color.a]);
                true
            }
            None => false,
        }
    }

    /// In-bounds neighbor indices of `index` for the given connectivity.
    pub fn neighbors(
        &self,
        index: usize,
        connectivity: Connectivity,
    ) -> impl Iterator<Item = usize> + '_ {
        let (x, y) = self.coords(index);
        connectivity.offsets().iter().filter_map(move |&(dx, dy)| {
            let nx = x as i64 + dx;
            let ny = y as i64 + dy;
            if self.contains(nx, ny) {
                Some(ny as usize * self.width as usize + nx as usize)
            } else {
                None
            }
        })
    }

    /// A stable copy of the current state. The buffer stays usable.
    pub fn snapshot(&self) -> Result<RasterImage, FillError> {
        let raw = copy_bytes(&self.data)?;
        RasterImage::from_raw(self.width, self.height, raw).ok_or(FillError::InvalidSource)
    }

    /// Consume the buffer without copying.
    pub fn into_image(self) -> Result<RasterImage, FillError> {
        RasterImage::from_raw(self.width, self.height, self.data).ok_or(FillError::InvalidSource)
    }
}

fn copy_bytes(src: &[u8]) -> Result<Vec<u8>, FillError> {
    let mut data = Vec::new();
    data.try_reserve_exact(src.len())
        .map_err(|_| FillError::AllocationFailure)?;
    data.extend_from_slice(src);
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hex_and_triplets() {
        assert_eq!(Color::parse("#ff0000"), Some(Color::rgb(255, 0, 0)));
        assert_eq!(Color::parse("00ff0080"), Some(Color::rgba(0, 255, 0, 128)));
        assert_eq!(Color::parse("10, 20, 30"), Some(Color::rgb(10, 20, 30)));
        assert_eq!(Color::parse("1,2,3,4"), Some(Color::rgba(1, 2, 3, 4)));
        assert_eq!(Color::parse("#fff"), None);
        assert_eq!(Color::parse("300,0,0"), None);
        assert_eq!(Color::parse("zzzzzz"), None);
    }

    #[test]
    fn buffer_rejects_empty_image() {
        let empty = RasterImage::from_rgba_image(RgbaImage::new(0, 0));
        assert_eq!(PixelBuffer::from_image(&empty).err(), Some(FillError::InvalidSource));
    }

    #[test]
    fn buffer_access_is_bounds_checked() {
        let img = RasterImage::new(3, 2, Color::WHITE);
        let mut buf = PixelBuffer::from_image(&img).unwrap();
        assert_eq!(buf.len(), 6);
        assert_eq!(buf.get(2, 1), Some(Color::WHITE));
        assert_eq!(buf.get(3, 0), None);
        assert_eq!(buf.get(0, 2), None);
        assert!(!buf.set(5, 5, Color::BLACK));
        assert!(buf.set(1, 1, Color::BLACK));
        assert_eq!(buf.get(1, 1), Some(Color::BLACK));
        assert_eq!(buf.get_index(6), None);
        assert!(!buf.contains(-1, 0));
    }

    #[test]
    fn snapshot_is_detached_from_buffer() {
        let img = RasterImage::new(2, 2, Color::WHITE);
        let mut buf = PixelBuffer::from_image(&img).unwrap();
        buf.set(0, 0, Color::BLACK);
        let snap = buf.snapshot().unwrap();
        buf.set(1, 1, Color::BLACK);
        assert_eq!(snap.pixel(0, 0), Some(Color::BLACK));
        assert_eq!(snap.pixel(1, 1), Some(Color::WHITE));
        // The source image is never touched
        assert_eq!(img.pixel(0, 0), Some(Color::WHITE));
    }

    #[test]
    fn neighbors_respect_edges() {
        let img = RasterImage::new(3, 3, Color::WHITE);
        let buf = PixelBuffer::from_image(&img).unwrap();
        let corner: Vec<usize> = buf.neighbors(0, Connectivity::Four).collect();
        assert_eq!(corner, vec![1, 3]);
        let mut center: Vec<usize> = buf.neighbors(4, Connectivity::Eight).collect();
        center.sort();
        assert_eq!(center, vec![0, 1, 2, 3, 5, 6, 7, 8]);
        assert_eq!(buf.neighbors(8, Connectivity::Eight).count(), 3);
    }
}
