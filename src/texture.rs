use std::path::{Path, PathBuf};

use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TextureError {
    #[error("failed to load texture {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("unknown wrap mode `{0}` (expected clamp or repeat)")]
    UnknownWrap(String),
    #[error("unknown filter mode `{0}` (expected linear or nearest)")]
    UnknownFilter(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WrapMode {
    ClampToEdge,
    Repeat,
}

impl WrapMode {
    pub fn from_name(name: &str) -> Result<Self, TextureError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "clamp" | "clamp-to-edge" => Ok(WrapMode::ClampToEdge),
            "repeat" => Ok(WrapMode::Repeat),
            other => Err(TextureError::UnknownWrap(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterMode {
    Linear,
    Nearest,
}

impl FilterMode {
    pub fn from_name(name: &str) -> Result<Self, TextureError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "linear" => Ok(FilterMode::Linear),
            "nearest" => Ok(FilterMode::Nearest),
            other => Err(TextureError::UnknownFilter(other.to_string())),
        }
    }
}

/// Where a texture comes from and how it is sampled.
///
/// Without a path the texture is generated procedurally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub wrap: WrapMode,
    pub filter: FilterMode,
}

impl TextureSource {
    pub fn primary() -> Self {
        Self {
            path: None,
            wrap: WrapMode::ClampToEdge,
            filter: FilterMode::Linear,
        }
    }

    pub fn secondary() -> Self {
        Self {
            path: None,
            wrap: WrapMode::Repeat,
            filter: FilterMode::Nearest,
        }
    }
}

/// The pair of textures blended on textured objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureSet {
    pub primary: TextureSource,
    pub secondary: TextureSource,
    /// Multiplier applied to every texture coordinate.
    pub scale: f32,
    /// Weight of the secondary texture in the blend.
    pub mix: f32,
}

impl Default for TextureSet {
    fn default() -> Self {
        Self {
            primary: TextureSource::primary(),
            secondary: TextureSource::secondary(),
            scale: 1.0,
            mix: 0.2,
        }
    }
}

/// Decoded RGBA8 pixels, bottom row first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl TextureImage {
    /// Two-colour checkerboard with `cells` squares per side.
    pub fn checkerboard(size: u32, cells: u32, a: [u8; 4], b: [u8; 4]) -> Self {
        let size = size.max(1);
        let cell = (size / cells.max(1)).max(1);
        let mut pixels = Vec::with_capacity((size * size * 4) as usize);
        for y in 0..size {
            for x in 0..size {
                let color = if ((x / cell) + (y / cell)) % 2 == 0 { a } else { b };
                pixels.extend_from_slice(&color);
            }
        }
        Self {
            width: size,
            height: size,
            pixels,
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = ((y * self.width + x) * 4) as usize;
        let slice = self.pixels.get(offset..offset + 4)?;
        Some([slice[0], slice[1], slice[2], slice[3]])
    }
}

/// Loads the texture described by `source`, or builds the fallback pattern for
/// `slot` when no file is configured.
pub fn load_texture(source: &TextureSource, slot: usize) -> Result<TextureImage, TextureError> {
    match source.path.as_deref() {
        Some(path) => decode_file(path),
        None => {
            info!("no texture configured for slot {slot}; using a generated pattern");
            Ok(fallback_texture(slot))
        }
    }
}

fn decode_file(path: &Path) -> Result<TextureImage, TextureError> {
    let image = image::open(path).map_err(|source| TextureError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    // Texture coordinates put v = 0 at the bottom, image rows start at the top.
    let rgba = image.flipv().to_rgba8();
    let (width, height) = rgba.dimensions();
    info!("loaded texture {} ({width}x{height})", path.display());
    Ok(TextureImage {
        width,
        height,
        pixels: rgba.into_raw(),
    })
}

fn fallback_texture(slot: usize) -> TextureImage {
    match slot {
        0 => TextureImage::checkerboard(256, 8, [181, 134, 84, 255], [120, 84, 48, 255]),
        _ => TextureImage::checkerboard(64, 2, [250, 214, 64, 255], [40, 40, 40, 255]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sampler_names() {
        assert_eq!(WrapMode::from_name("clamp").unwrap(), WrapMode::ClampToEdge);
        assert_eq!(WrapMode::from_name("Repeat").unwrap(), WrapMode::Repeat);
        assert_eq!(FilterMode::from_name("nearest").unwrap(), FilterMode::Nearest);
        assert!(matches!(
            WrapMode::from_name("mirror"),
            Err(TextureError::UnknownWrap(_))
        ));
        assert!(FilterMode::from_name("cubic").is_err());
    }

    #[test]
    fn default_set_matches_container_and_face_sampling() {
        let set = TextureSet::default();
        assert_eq!(set.primary.wrap, WrapMode::ClampToEdge);
        assert_eq!(set.primary.filter, FilterMode::Linear);
        assert_eq!(set.secondary.wrap, WrapMode::Repeat);
        assert_eq!(set.secondary.filter, FilterMode::Nearest);
        assert_eq!(set.mix, 0.2);
    }

    #[test]
    fn checkerboard_alternates_cells() {
        let image = TextureImage::checkerboard(4, 2, [255, 0, 0, 255], [0, 0, 255, 255]);
        assert_eq!(image.pixels.len(), 4 * 4 * 4);
        assert_eq!(image.pixel(0, 0), Some([255, 0, 0, 255]));
        assert_eq!(image.pixel(2, 0), Some([0, 0, 255, 255]));
        assert_eq!(image.pixel(2, 2), Some([255, 0, 0, 255]));
        assert_eq!(image.pixel(4, 0), None);
    }

    #[test]
    fn missing_path_uses_generated_pattern() {
        let image = load_texture(&TextureSource::primary(), 0).unwrap();
        assert_eq!((image.width, image.height), (256, 256));
    }

    #[test]
    fn decoded_image_is_flipped_vertically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stripes.png");
        let image = image::RgbaImage::from_fn(2, 2, |_, y| {
            if y == 0 {
                image::Rgba([255, 0, 0, 255])
            } else {
                image::Rgba([0, 255, 0, 255])
            }
        });
        image.save(&path).unwrap();

        let source = TextureSource {
            path: Some(path),
            ..TextureSource::secondary()
        };
        let loaded = load_texture(&source, 1).unwrap();
        assert_eq!((loaded.width, loaded.height), (2, 2));
        assert_eq!(loaded.pixel(0, 0), Some([0, 255, 0, 255]));
        assert_eq!(loaded.pixel(1, 1), Some([255, 0, 0, 255]));
    }

    #[test]
    fn unreadable_file_reports_path() {
        let source = TextureSource {
            path: Some(PathBuf::from("does/not/exist.png")),
            ..TextureSource::primary()
        };
        let err = load_texture(&source, 0).unwrap_err();
        assert!(err.to_string().contains("does/not/exist.png"));
    }
}
