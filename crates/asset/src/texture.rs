//! Texture loading and data structures.
//! Decodes any format `image` supports into RGBA8, flipped so that row 0 is
//! the bottom of the image (OBJ texcoords put v=0 at the bottom).

use std::path::Path;

use anyhow::Context;

const BYTES_PER_PIXEL: usize = 4;

/// Tightly packed RGBA8 pixels, bottom row first.
#[derive(Clone, Debug)]
pub struct TextureData {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl TextureData {
    pub fn new_rgba8(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            data,
            width,
            height,
        }
    }

    /// Load and decode an image file, flipping it vertically.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        log::info!("Loading texture from {:?}", path);

        let img = image::open(path)
            .with_context(|| format!("Failed to load texture {}", path.display()))?;

        let rgba = img.flipv().to_rgba8();
        let (width, height) = rgba.dimensions();
        let data = rgba.into_raw();

        log::info!("Loaded texture {}x{} with {} bytes", width, height, data.len());

        Ok(Self::new_rgba8(width, height, data))
    }

    /// 1x1 texture of a single color; bound when an object has no texture.
    pub fn solid(rgba: [u8; 4]) -> Self {
        Self::new_rgba8(1, 1, rgba.to_vec())
    }

    /// Non-empty and the pixel buffer matches the dimensions.
    pub fn is_valid(&self) -> bool {
        let expected = self.width as usize * self.height as usize * BYTES_PER_PIXEL;
        self.width > 0 && self.height > 0 && self.data.len() == expected
    }

    /// Valid and no side longer than `max_dimension` (a device limit).
    pub fn fits_within(&self, max_dimension: u32) -> bool {
        self.is_valid() && self.width <= max_dimension && self.height <= max_dimension
    }
}
