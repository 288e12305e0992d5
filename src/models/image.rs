use std::path::{Path, PathBuf};

/// Whether a path looks like an image we can decode
pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            matches!(
                ext.to_lowercase().as_str(),
                "jpg" | "jpeg" | "png" | "webp" | "gif" | "bmp" | "tiff" | "tif"
            )
        })
        .unwrap_or(false)
}

/// Facts learned from a successful decode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    /// Natural width in pixels
    pub width: u32,
    /// Natural height in pixels
    pub height: u32,
    /// Format name reported by the decoder
    pub format: String,
}

/// One entry of the image list
#[derive(Debug, Clone)]
pub struct Image {
    path: PathBuf,
    absolute_path: Option<PathBuf>,
    filename: Option<String>,
    filestem: Option<String>,
    /// Absent until a decode succeeds
    metadata: Option<Metadata>,
    /// Set when a decode failed; cleared by a reload
    unloadable: bool,
}

impl Image {
    pub fn new(path: PathBuf) -> Self {
        let absolute_path = std::fs::canonicalize(&path).ok();
        let filename = path
            .file_name()
            .and_then(|s| s.to_str())
            .map(str::to_string);
        let filestem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string);

        Self {
            path,
            absolute_path,
            filename,
            filestem,
            metadata: None,
            unloadable: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn absolute_path(&self) -> Option<&Path> {
        self.absolute_path.as_deref()
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    pub fn filestem(&self) -> Option<&str> {
        self.filestem.as_deref()
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    /// Record metadata from a decode. Metadata that is already present is kept.
    pub fn set_metadata(&mut self, metadata: Metadata) {
        if self.metadata.is_none() {
            self.metadata = Some(metadata);
        }
    }

    pub fn is_unloadable(&self) -> bool {
        self.unloadable
    }

    pub fn mark_unloadable(&mut self) {
        self.unloadable = true;
    }

    /// Forget the metadata and the unloadable mark ahead of a reload
    pub fn reset_load_state(&mut self) {
        self.metadata = None;
        self.unloadable = false;
    }
}

/// Snapshot of an image returned by the engine's query API
#[derive(Debug, Clone, PartialEq)]
pub struct ImageDetails {
    pub index: usize,
    pub path: PathBuf,
    pub absolute_path: Option<PathBuf>,
    pub filename: Option<String>,
    pub filestem: Option<String>,
    pub metadata: Option<Metadata>,
    /// A decode of this image failed
    pub errored: bool,
    /// The full image is decoded and retained
    pub loaded: bool,
    /// The gallery thumbnail is decoded and retained
    pub thumbnail_loaded: bool,
}

impl ImageDetails {
    pub fn new(index: usize, image: &Image, loaded: bool, thumbnail_loaded: bool) -> Self {
        Self {
            index,
            path: image.path.clone(),
            absolute_path: image.absolute_path.clone(),
            filename: image.filename.clone(),
            filestem: image.filestem.clone(),
            metadata: image.metadata.clone(),
            errored: image.unloadable,
            loaded,
            thumbnail_loaded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_image_path() {
        assert!(is_image_path(Path::new("a/b/photo.JPG")));
        assert!(is_image_path(Path::new("x.webp")));
        assert!(!is_image_path(Path::new("clip.mp4")));
        assert!(!is_image_path(Path::new("README")));
    }

    #[test]
    fn test_name_parts() {
        let image = Image::new(PathBuf::from("/does/not/exist/cat.png"));
        assert_eq!(image.filename(), Some("cat.png"));
        assert_eq!(image.filestem(), Some("cat"));
        assert!(image.absolute_path().is_none());
        assert!(image.metadata().is_none());
    }

    #[test]
    fn test_metadata_is_set_once_until_reset() {
        let mut image = Image::new(PathBuf::from("a.png"));
        let first = Metadata {
            width: 10,
            height: 20,
            format: "png".into(),
        };
        image.set_metadata(first.clone());
        image.set_metadata(Metadata {
            width: 1,
            height: 1,
            format: "png".into(),
        });
        assert_eq!(image.metadata(), Some(&first));

        image.mark_unloadable();
        image.reset_load_state();
        assert!(image.metadata().is_none());
        assert!(!image.is_unloadable());
    }
}
