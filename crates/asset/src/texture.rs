//! Texture references held by materials, and RGBA8 decoding for upload.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Constant 1x1 texture used when a material has no map of that kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FallbackTexture {
    /// Diffuse fallback: multiplies to identity.
    White,
    /// Bump fallback: no perturbation.
    Black,
}

impl FallbackTexture {
    pub fn rgba(self) -> [u8; 4] {
        match self {
            FallbackTexture::White => [255, 255, 255, 255],
            FallbackTexture::Black => [0, 0, 0, 255],
        }
    }
}

/// Where a material's texture comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TextureRef {
    Fallback(FallbackTexture),
    /// Path already resolved against the material library's directory.
    File(PathBuf),
}

/// A texture reference together with its `-s` scale.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureMap {
    pub source: TextureRef,
    pub scale: [f32; 3],
}

impl TextureMap {
    pub fn fallback(kind: FallbackTexture) -> Self {
        Self {
            source: TextureRef::Fallback(kind),
            scale: [1.0; 3],
        }
    }

    pub fn file(path: PathBuf, scale: [f32; 3]) -> Self {
        Self {
            source: TextureRef::File(path),
            scale,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self.source, TextureRef::Fallback(_))
    }
}

#[derive(Debug, Error)]
pub enum TextureError {
    #[error("failed to open image {}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Texture data in CPU-friendly format before GPU upload.
#[derive(Clone, Debug)]
pub struct TextureData {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl TextureData {
    /// Create a new texture with given dimensions and RGBA8 format.
    pub fn new_rgba8(width: u32, height: u32, data: Vec<u8>) -> Self {
        assert_eq!(
            Some(data.len()),
            rgba8_len(width, height),
            "Data size doesn't match RGBA8 format"
        );
        Self {
            data,
            width,
            height,
        }
    }

    /// 1x1 texture of a single color.
    pub fn solid(rgba: [u8; 4]) -> Self {
        Self::new_rgba8(1, 1, rgba.to_vec())
    }

    /// Decode an image file. Rows are flipped so that row 0 is the bottom
    /// of the image, matching texture coordinates with v pointing up.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self, TextureError> {
        let path = path.as_ref();
        log::info!("Loading texture from {:?}", path);

        let img = image::open(path).map_err(|source| TextureError::Decode {
            path: path.to_path_buf(),
            source,
        })?;

        let rgba = img.flipv().to_rgba8();
        let (width, height) = rgba.dimensions();
        let data = rgba.into_raw();

        log::info!("Loaded texture {}x{} with {} bytes", width, height, data.len());

        Ok(Self::new_rgba8(width, height, data))
    }

    /// Resolve a material texture reference to pixels.
    pub fn load(source: &TextureRef) -> Result<Self, TextureError> {
        match source {
            TextureRef::Fallback(kind) => Ok(Self::solid(kind.rgba())),
            TextureRef::File(path) => Self::load_file(path),
        }
    }

    pub fn is_valid(&self) -> bool {
        Some(self.data.len()) == rgba8_len(self.width, self.height)
            && self.width > 0
            && self.height > 0
    }
}

/// Byte length of a `width` x `height` RGBA8 image, `None` on overflow.
fn rgba8_len(width: u32, height: u32) -> Option<usize> {
    usize::try_from(width)
        .ok()?
        .checked_mul(usize::try_from(height).ok()?)?
        .checked_mul(4)
}
