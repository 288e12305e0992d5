//! On-disk thumbnail store.
//!
//! Thumbnails live in the platform cache directory as PNG files named by the
//! xxhash of (path + mtime + size + thumbnail size). Editing or replacing a
//! source image changes its key, so stale thumbnails are never read back.
//! Existing thumbnails are always used; new ones are written only when
//! saving is enabled.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use image::{ImageFormat, ImageReader};
use tracing::{debug, warn};
use xxhash_rust::xxh3::xxh3_64;

use super::decoder::{format_name, Decoded};

/// Bump when thumbnail generation changes
const THUMB_CACHE_VERSION: u8 = 1;

/// Identifies one thumbnail of one version of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThumbnailKey {
    hash: u64,
}

impl ThumbnailKey {
    pub fn new(path: &Path, mtime: i64, size: u64, thumbnail_size: u32) -> Self {
        let path_str = path.to_string_lossy();
        let mut data = Vec::with_capacity(path_str.len() + 21);
        data.push(THUMB_CACHE_VERSION);
        data.extend_from_slice(path_str.as_bytes());
        data.extend_from_slice(&mtime.to_le_bytes());
        data.extend_from_slice(&size.to_le_bytes());
        data.extend_from_slice(&thumbnail_size.to_le_bytes());
        Self {
            hash: xxh3_64(&data),
        }
    }

    /// Key for the file as it is on disk right now
    pub fn for_file(path: &Path, thumbnail_size: u32) -> Result<Self> {
        let path = fs::canonicalize(path)
            .with_context(|| format!("Failed to resolve image path: {:?}", path))?;
        let meta =
            fs::metadata(&path).with_context(|| format!("Failed to stat image: {:?}", path))?;
        let mtime = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
            .unwrap_or(0);
        Ok(Self::new(&path, mtime, meta.len(), thumbnail_size))
    }

    pub fn disk_filename(&self) -> String {
        format!("{:016x}.png", self.hash)
    }
}

/// Thumbnail files under one directory
#[derive(Debug, Clone)]
pub struct ThumbnailStore {
    dir: PathBuf,
    save: bool,
}

impl ThumbnailStore {
    /// `save` controls whether generated thumbnails are written back
    pub fn new(dir: PathBuf, save: bool) -> Self {
        debug!(?dir, save, "Thumbnail store");
        Self { dir, save }
    }

    /// The platform cache directory for thumbnails
    pub fn default_dir() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("", "", "glance")
            .context("Failed to determine project directories")?;
        Ok(proj_dirs.cache_dir().join("thumbs"))
    }

    pub fn disk_path(&self, key: &ThumbnailKey) -> PathBuf {
        self.dir.join(key.disk_filename())
    }

    /// The stored thumbnail of `source`. Unreadable files are removed.
    pub fn load(&self, key: &ThumbnailKey, source: &Path) -> Option<Decoded> {
        let disk_path = self.disk_path(key);
        if !disk_path.exists() {
            return None;
        }

        match read_thumbnail(&disk_path, source) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!(path = ?disk_path, error = ?e, "Removing unreadable thumbnail");
                let _ = fs::remove_file(&disk_path);
                None
            }
        }
    }

    /// Write a generated thumbnail, when saving is enabled
    pub fn save(&self, key: &ThumbnailKey, decoded: &Decoded) -> Result<()> {
        if !self.save {
            return Ok(());
        }

        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create thumbnail directory: {:?}", self.dir))?;
        let path = self.disk_path(key);
        image::save_buffer_with_format(
            &path,
            &decoded.pixels,
            decoded.width,
            decoded.height,
            image::ColorType::Rgba8,
            ImageFormat::Png,
        )
        .with_context(|| format!("Failed to write thumbnail: {:?}", path))?;
        Ok(())
    }
}

/// Pixels come from the thumbnail; size and format come from the source header
fn read_thumbnail(disk_path: &Path, source: &Path) -> Result<Decoded> {
    let thumb = image::open(disk_path)
        .with_context(|| format!("Failed to decode thumbnail: {:?}", disk_path))?
        .into_rgba8();

    let reader = ImageReader::open(source)
        .with_context(|| format!("Failed to open image: {:?}", source))?
        .with_guessed_format()
        .with_context(|| format!("Failed to read image header: {:?}", source))?;
    let format = format_name(reader.format());
    let (source_width, source_height) = reader
        .into_dimensions()
        .with_context(|| format!("Failed to read image dimensions: {:?}", source))?;

    Ok(Decoded {
        width: thumb.width(),
        height: thumb.height(),
        source_width,
        source_height,
        format,
        pixels: thumb.into_raw(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preload::decoder::{Decoder, ImageDecoder, ImageKind};
    use image::{Rgba, RgbaImage};
    use tempfile::tempdir;

    fn write_png(path: &Path, width: u32, height: u32) {
        let img = RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255]));
        img.save(path).unwrap();
    }

    fn stored_files(dir: &Path) -> Vec<PathBuf> {
        match fs::read_dir(dir) {
            Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        }
    }

    #[test]
    fn test_key_changes_with_file_version() {
        let path = Path::new("/pictures/a.png");
        let key = ThumbnailKey::new(path, 100, 2048, 256);
        assert_eq!(key, ThumbnailKey::new(path, 100, 2048, 256));
        assert_ne!(key, ThumbnailKey::new(path, 101, 2048, 256));
        assert_ne!(key, ThumbnailKey::new(path, 100, 2049, 256));
        assert_ne!(key, ThumbnailKey::new(path, 100, 2048, 128));
        assert_ne!(key, ThumbnailKey::new(Path::new("/pictures/b.png"), 100, 2048, 256));
        assert!(key.disk_filename().ends_with(".png"));
        assert_eq!(key.disk_filename().len(), 20);
    }

    #[test]
    fn test_generated_thumbnail_is_saved_and_reused() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a.png");
        write_png(&source, 64, 32);
        let store_dir = dir.path().join("thumbs");
        let decoder =
            ImageDecoder::new(16).with_store(ThumbnailStore::new(store_dir.clone(), true));

        let first = decoder.decode(&source, ImageKind::Thumbnail).unwrap();
        assert_eq!((first.width, first.height), (16, 8));

        let key = ThumbnailKey::for_file(&source, 16).unwrap();
        let cached = store_dir.join(key.disk_filename());
        assert_eq!(stored_files(&store_dir), vec![cached.clone()]);

        // A stored thumbnail is served as is
        write_png(&cached, 3, 3);
        let second = decoder.decode(&source, ImageKind::Thumbnail).unwrap();
        assert_eq!((second.width, second.height), (3, 3));
        assert_eq!((second.source_width, second.source_height), (64, 32));
        assert_eq!(second.format, "png");
        assert_eq!(second.pixels.len(), 3 * 3 * 4);
    }

    #[test]
    fn test_modified_source_skips_stale_thumbnail() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a.png");
        write_png(&source, 64, 32);
        let store_dir = dir.path().join("thumbs");
        let decoder =
            ImageDecoder::new(16).with_store(ThumbnailStore::new(store_dir.clone(), true));

        decoder.decode(&source, ImageKind::Thumbnail).unwrap();
        let stale = store_dir.join(ThumbnailKey::for_file(&source, 16).unwrap().disk_filename());
        write_png(&stale, 3, 3);

        let img = RgbaImage::from_fn(128, 128, |x, y| Rgba([x as u8, y as u8, 7, 255]));
        img.save(&source).unwrap();

        let fresh = decoder.decode(&source, ImageKind::Thumbnail).unwrap();
        assert_eq!((fresh.width, fresh.height), (16, 16));
        assert_eq!((fresh.source_width, fresh.source_height), (128, 128));
        assert_eq!(stored_files(&store_dir).len(), 2);
    }

    #[test]
    fn test_saving_disabled_writes_nothing() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a.png");
        write_png(&source, 64, 32);
        let store_dir = dir.path().join("thumbs");

        let reader = ImageDecoder::new(16).with_store(ThumbnailStore::new(store_dir.clone(), false));
        reader.decode(&source, ImageKind::Thumbnail).unwrap();
        assert!(stored_files(&store_dir).is_empty());

        // Thumbnails written earlier are still read
        let writer = ImageDecoder::new(16).with_store(ThumbnailStore::new(store_dir.clone(), true));
        writer.decode(&source, ImageKind::Thumbnail).unwrap();
        let cached = store_dir.join(ThumbnailKey::for_file(&source, 16).unwrap().disk_filename());
        write_png(&cached, 5, 5);
        let decoded = reader.decode(&source, ImageKind::Thumbnail).unwrap();
        assert_eq!((decoded.width, decoded.height), (5, 5));
    }

    #[test]
    fn test_corrupt_thumbnail_is_regenerated() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a.png");
        write_png(&source, 64, 32);
        let store_dir = dir.path().join("thumbs");
        let decoder =
            ImageDecoder::new(16).with_store(ThumbnailStore::new(store_dir.clone(), true));

        let cached = store_dir.join(ThumbnailKey::for_file(&source, 16).unwrap().disk_filename());
        fs::create_dir_all(&store_dir).unwrap();
        fs::write(&cached, b"not a png").unwrap();

        let decoded = decoder.decode(&source, ImageKind::Thumbnail).unwrap();
        assert_eq!((decoded.width, decoded.height), (16, 8));
        let rewritten = image::open(&cached).unwrap();
        assert_eq!((rewritten.width(), rewritten.height()), (16, 8));
    }

    #[test]
    fn test_full_images_bypass_the_store() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a.png");
        write_png(&source, 64, 32);
        let store_dir = dir.path().join("thumbs");
        let decoder =
            ImageDecoder::new(16).with_store(ThumbnailStore::new(store_dir.clone(), true));

        let full = decoder.decode(&source, ImageKind::Full).unwrap();
        assert_eq!((full.width, full.height), (64, 32));
        assert!(stored_files(&store_dir).is_empty());
    }
}
