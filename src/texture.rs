use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::assets::LoadError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorSpace {
    #[default]
    Srgb,
    Linear,
}

/// Decoded RGBA8 pixels, rows top to bottom.
#[derive(Clone, PartialEq, Eq)]
pub struct TextureImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl fmt::Debug for TextureImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextureImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

/// Decodes PNG or JPEG bytes into RGBA8, optionally flipping rows.
pub fn decode_image(bytes: &[u8], flip_y: bool) -> Result<TextureImage, LoadError> {
    let mut rgba = image::load_from_memory(bytes)?.to_rgba8();
    if flip_y {
        image::imageops::flip_vertical_in_place(&mut rgba);
    }
    Ok(TextureImage {
        width: rgba.width(),
        height: rgba.height(),
        pixels: rgba.into_raw(),
    })
}

#[derive(Debug)]
struct TextureSlot {
    path: String,
    flip_y: bool,
    color_space: ColorSpace,
    image: RwLock<Option<Arc<TextureImage>>>,
}

/// Texture whose pixels arrive asynchronously.
///
/// The handle exists as soon as the material referencing it is built; the
/// renderer skips meshes that sample it until [`TextureHandle::is_ready`].
#[derive(Debug, Clone)]
pub struct TextureHandle(Arc<TextureSlot>);

impl TextureHandle {
    pub fn new(path: impl Into<String>, flip_y: bool, color_space: ColorSpace) -> Self {
        Self(Arc::new(TextureSlot {
            path: path.into(),
            flip_y,
            color_space,
            image: RwLock::new(None),
        }))
    }

    pub fn path(&self) -> &str {
        &self.0.path
    }

    pub fn flip_y(&self) -> bool {
        self.0.flip_y
    }

    pub fn color_space(&self) -> ColorSpace {
        self.0.color_space
    }

    pub fn is_ready(&self) -> bool {
        self.0.image.read().is_some()
    }

    pub fn image(&self) -> Option<Arc<TextureImage>> {
        self.0.image.read().clone()
    }

    pub fn set_image(&self, image: TextureImage) {
        *self.0.image.write() = Some(Arc::new(image));
    }

    /// Identity of the underlying slot, stable across clones.
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}
