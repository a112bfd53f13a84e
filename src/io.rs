use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::tga::TgaEncoder;
use image::{DynamicImage, ImageError};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::raster::RasterImage;

/// Still-image formats the CLI can write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveFormat {
    Png,
    Jpeg,
    Webp,
    Bmp,
    Tga,
}

impl SaveFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "webp" => Some(Self::Webp),
            "bmp" => Some(Self::Bmp),
            "tga" => Some(Self::Tga),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Webp => "webp",
            Self::Bmp => "bmp",
            Self::Tga => "tga",
        }
    }
}

/// Container for a recorded fill animation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnimationFormat {
    Gif,
    Apng,
}

impl AnimationFormat {
    /// `.gif` records a GIF; `.png` and `.apng` record an APNG.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "gif" => Some(Self::Gif),
            "png" | "apng" => Some(Self::Apng),
            _ => None,
        }
    }
}

/// Load any format the `image` crate decodes, converted to RGBA8.
pub fn load_image(path: &Path) -> Result<RasterImage, String> {
    let img = image::open(path)
        .map_err(|e| format!("could not open '{}': {}", path.display(), e))?
        .to_rgba8();
    Ok(RasterImage::from_rgba_image(img))
}

/// Encode `image` to `path` in `format`. `quality` applies to JPEG only.
pub fn encode_and_write(
    image: &RasterImage,
    path: &Path,
    format: SaveFormat,
    quality: u8,
) -> Result<(), ImageError> {
    let rgba = image.as_rgba_image();
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    match format {
        SaveFormat::Png => {
            let encoder = PngEncoder::new(&mut writer);
            #[allow(deprecated)]
            encoder.encode(
                rgba.as_raw(),
                rgba.width(),
                rgba.height(),
                image::ColorType::Rgba8,
            )?;
        }
        SaveFormat::Jpeg => {
            // JPEG has no alpha channel
            let rgb_image = DynamicImage::ImageRgba8(rgba.clone()).to_rgb8();
            let mut encoder = JpegEncoder::new_with_quality(&mut writer, quality.clamp(1, 100));
            encoder.encode(
                rgb_image.as_raw(),
                rgb_image.width(),
                rgb_image.height(),
                image::ColorType::Rgb8,
            )?;
        }
        SaveFormat::Webp => {
            drop(writer);
            DynamicImage::ImageRgba8(rgba.clone()).save(path)?;
        }
        SaveFormat::Bmp => {
            let mut encoder = BmpEncoder::new(&mut writer);
            encoder.encode(
                rgba.as_raw(),
                rgba.width(),
                rgba.height(),
                image::ColorType::Rgba8,
            )?;
        }
        SaveFormat::Tga => {
            let encoder = TgaEncoder::new(&mut writer);
            encoder.encode(
                rgba.as_raw(),
                rgba.width(),
                rgba.height(),
                image::ColorType::Rgba8,
            )?;
        }
    }
    Ok(())
}

/// Save `image`, picking the format from the file extension.
pub fn save_image(image: &RasterImage, path: &Path, quality: u8) -> Result<(), String> {
    let format = SaveFormat::from_path(path)
        .ok_or_else(|| format!("unsupported output format: '{}'", path.display()))?;
    encode_and_write(image, path, format, quality)
        .map_err(|e| format!("could not write '{}': {}", path.display(), e))
}

fn check_frames(frames: &[RasterImage], fps: f32) -> Result<(u32, u32), String> {
    let first = frames.first().ok_or("No frames to encode")?;
    if fps.is_nan() || fps <= 0.0 {
        return Err(format!("invalid frame rate: {}", fps));
    }
    let (w, h) = (first.width(), first.height());
    if frames.iter().any(|f| f.width() != w || f.height() != h) {
        return Err("Frames differ in size".to_string());
    }
    Ok((w, h))
}

/// Encode fill snapshots as a looping GIF, one palette per frame.
pub fn encode_animated_gif(frames: &[RasterImage], fps: f32, path: &Path) -> Result<(), String> {
    let (w, h) = check_frames(frames, fps)?;
    if w > u16::MAX as u32 || h > u16::MAX as u32 {
        return Err("Image dimensions exceed GIF maximum (65535×65535)".to_string());
    }
    let (w, h) = (w as u16, h as u16);
    let delay_cs = ((100.0 / fps).round() as u16).max(1); // centiseconds

    let file = File::create(path).map_err(|e| format!("Failed to create GIF file: {}", e))?;

    let (global_palette, _) = quantize_rgba(&frames[0], 256);
    let mut encoder = gif::Encoder::new(BufWriter::new(file), w, h, &global_palette)
        .map_err(|e| format!("GIF encoder init error: {}", e))?;
    encoder
        .set_repeat(gif::Repeat::Infinite)
        .map_err(|e| format!("GIF set repeat error: {}", e))?;

    for snapshot in frames {
        let (local_palette, local_indexed) = quantize_rgba(snapshot, 256);
        let frame = gif::Frame {
            width: w,
            height: h,
            delay: delay_cs,
            palette: Some(local_palette),
            buffer: std::borrow::Cow::Owned(local_indexed),
            ..Default::default()
        };
        encoder
            .write_frame(&frame)
            .map_err(|e| format!("GIF frame write error: {}", e))?;
    }

    Ok(())
}

/// Encode fill snapshots as a looping APNG.
pub fn encode_animated_png(frames: &[RasterImage], fps: f32, path: &Path) -> Result<(), String> {
    let (width, height) = check_frames(frames, fps)?;
    let delay_ms = (1000.0 / fps).round().clamp(1.0, 65535.0) as u16;

    let file = File::create(path).map_err(|e| format!("Failed to create APNG file: {}", e))?;

    let mut encoder = png::Encoder::new(BufWriter::new(file), width, height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    encoder
        .set_animated(frames.len() as u32, 0) // 0 = infinite loop
        .map_err(|e| format!("APNG set_animated error: {}", e))?;

    let mut writer = encoder
        .write_header()
        .map_err(|e| format!("APNG header write error: {}", e))?;

    for snapshot in frames {
        writer
            .set_frame_delay(delay_ms, 1000)
            .map_err(|e| format!("APNG set frame delay error: {}", e))?;
        writer
            .set_dispose_op(png::DisposeOp::Background)
            .map_err(|e| format!("APNG set dispose op error: {}", e))?;
        writer
            .write_image_data(snapshot.as_rgba_image().as_raw())
            .map_err(|e| format!("APNG frame write error: {}", e))?;
    }

    writer
        .finish()
        .map_err(|e| format!("APNG finish error: {}", e))
}

/// Write `frames` in the container implied by `path`.
pub fn encode_animation(frames: &[RasterImage], fps: f32, path: &Path) -> Result<(), String> {
    match AnimationFormat::from_path(path) {
        Some(AnimationFormat::Gif) => encode_animated_gif(frames, fps, path),
        Some(AnimationFormat::Apng) => encode_animated_png(frames, fps, path),
        None => Err(format!(
            "animation output must be .gif, .png or .apng: '{}'",
            path.display()
        )),
    }
}

/// Quantize to a flat RGB palette plus one index per pixel.
fn quantize_rgba(image: &RasterImage, max_colors: usize) -> (Vec<u8>, Vec<u8>) {
    let rgba = image.as_rgba_image();
    let nq = color_quant::NeuQuant::new(10, max_colors, rgba.as_raw());

    let mut palette = Vec::with_capacity(max_colors * 3);
    for i in 0..max_colors {
        match nq.lookup(i) {
            Some(color) => palette.extend_from_slice(&color[..3]),
            None => palette.extend_from_slice(&[0, 0, 0]),
        }
    }

    let indices = rgba
        .pixels()
        .map(|p| nq.index_of(&p.0) as u8)
        .collect();

    (palette, indices)
}
