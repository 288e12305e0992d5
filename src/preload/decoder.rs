//! Image decoding run on the worker threads.

use std::io::Cursor;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::codecs::gif::GifDecoder;
use image::AnimationDecoder;
use image::{DynamicImage, ImageFormat};
use tracing::{trace, warn};

use super::thumbnails::{ThumbnailKey, ThumbnailStore};
use crate::geometry::Size;
use crate::models::Metadata;

/// What a load produces: the full-size image or a gallery thumbnail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageKind {
    Full,
    Thumbnail,
}

/// A decoded RGBA8 pixel buffer
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    /// Dimensions of `pixels`
    pub width: u32,
    pub height: u32,
    /// Natural dimensions of the source image
    pub source_width: u32,
    pub source_height: u32,
    pub format: String,
    pub pixels: Vec<u8>,
}

impl Decoded {
    pub fn size(&self) -> Size {
        Size::from((self.width, self.height))
    }

    pub fn metadata(&self) -> Metadata {
        Metadata {
            width: self.source_width,
            height: self.source_height,
            format: self.format.clone(),
        }
    }
}

/// Turns a path into pixels. Called from worker threads.
pub trait Decoder: Send + Sync {
    fn decode(&self, path: &Path, kind: ImageKind) -> Result<Decoded>;
}

/// Decoder backed by the `image` crate
#[derive(Debug, Clone)]
pub struct ImageDecoder {
    /// Thumbnails fit within a square of this size
    thumbnail_size: u32,
    store: Option<ThumbnailStore>,
}

impl ImageDecoder {
    pub fn new(thumbnail_size: u32) -> Self {
        Self {
            thumbnail_size: thumbnail_size.max(1),
            store: None,
        }
    }

    /// Read thumbnails from `store` before generating them
    pub fn with_store(mut self, store: ThumbnailStore) -> Self {
        self.store = Some(store);
        self
    }

    fn stored_thumbnail(&self, path: &Path, store: &ThumbnailStore) -> Result<Decoded> {
        let key = ThumbnailKey::for_file(path, self.thumbnail_size)?;
        if let Some(decoded) = store.load(&key, path) {
            trace!(?path, "Thumbnail store hit");
            return Ok(decoded);
        }

        let decoded = self.generate(path, ImageKind::Thumbnail)?;
        if let Err(e) = store.save(&key, &decoded) {
            warn!(?path, error = ?e, "Failed to save thumbnail");
        }
        Ok(decoded)
    }

    fn generate(&self, path: &Path, kind: ImageKind) -> Result<Decoded> {
        let (image, format) = open_image(path)?;
        let (source_width, source_height) = (image.width(), image.height());

        let image = match kind {
            ImageKind::Full => image,
            ImageKind::Thumbnail => image.thumbnail(self.thumbnail_size, self.thumbnail_size),
        };

        let rgba = image.into_rgba8();
        Ok(Decoded {
            width: rgba.width(),
            height: rgba.height(),
            source_width,
            source_height,
            format,
            pixels: rgba.into_raw(),
        })
    }
}

impl Decoder for ImageDecoder {
    fn decode(&self, path: &Path, kind: ImageKind) -> Result<Decoded> {
        match (kind, &self.store) {
            (ImageKind::Thumbnail, Some(store)) => self.stored_thumbnail(path, store),
            _ => self.generate(path, kind),
        }
    }
}

pub(crate) fn format_name(format: Option<ImageFormat>) -> String {
    format
        .map(|f| format!("{:?}", f).to_lowercase())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Decode an image; animated GIFs decode to their first frame
pub fn open_image(path: &Path) -> Result<(DynamicImage, String)> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read image: {:?}", path))?;
    let format = image::guess_format(&bytes).ok();
    let name = format_name(format);

    if format == Some(ImageFormat::Gif) {
        let decoder = GifDecoder::new(Cursor::new(bytes))
            .with_context(|| format!("Failed to decode GIF: {:?}", path))?;
        let mut frames = decoder.into_frames();
        if let Some(frame) = frames.next() {
            let frame = frame.context("Failed to decode GIF frame")?;
            return Ok((DynamicImage::ImageRgba8(frame.into_buffer()), name));
        }
        return Err(anyhow!("GIF has no frames: {:?}", path));
    }

    let image = match format {
        Some(fmt) => image::load_from_memory_with_format(&bytes, fmt)
            .with_context(|| format!("Failed to decode image: {:?}", path))?,
        None => image::load_from_memory(&bytes)
            .with_context(|| format!("Failed to decode image: {:?}", path))?,
    };
    Ok((image, name))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashSet;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    use anyhow::{bail, Result};
    use parking_lot::{Condvar, Mutex};

    use super::{Decoded, Decoder, ImageKind};

    /// Blocks decodes while closed
    #[derive(Default)]
    pub struct Gate {
        open: Mutex<bool>,
        cond: Condvar,
    }

    impl Gate {
        pub fn closed() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn open(&self) {
            *self.open.lock() = true;
            self.cond.notify_all();
        }

        fn wait(&self) {
            let mut open = self.open.lock();
            while !*open {
                self.cond.wait(&mut open);
            }
        }
    }

    /// Deterministic decoder: every image is 400x300 (thumbnails 40x30)
    #[derive(Default)]
    pub struct FakeDecoder {
        pub failing: HashSet<PathBuf>,
        pub gate: Option<Arc<Gate>>,
    }

    impl FakeDecoder {
        pub fn failing(paths: &[&str]) -> Self {
            Self {
                failing: paths.iter().map(PathBuf::from).collect(),
                gate: None,
            }
        }

        pub fn gated(gate: Arc<Gate>) -> Self {
            Self {
                failing: HashSet::new(),
                gate: Some(gate),
            }
        }
    }

    impl Decoder for FakeDecoder {
        fn decode(&self, path: &Path, kind: ImageKind) -> Result<Decoded> {
            if let Some(gate) = &self.gate {
                gate.wait();
            }
            if self.failing.contains(path) {
                bail!("Failed to decode image: {:?}", path);
            }
            let (width, height) = match kind {
                ImageKind::Full => (400, 300),
                ImageKind::Thumbnail => (40, 30),
            };
            Ok(Decoded {
                width,
                height,
                source_width: 400,
                source_height: 300,
                format: "fake".to_string(),
                pixels: Vec::new(),
            })
        }
    }

    pub fn decoded(width: u32, height: u32) -> Decoded {
        Decoded {
            width,
            height,
            source_width: width,
            source_height: height,
            format: "fake".to_string(),
            pixels: Vec::new(),
        }
    }
}
