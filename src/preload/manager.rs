//! Keeps decoded images around the current position.
//!
//! The manager is pure state: it decides which loads to issue and applies the
//! results it is handed, while the engine moves requests and results across the
//! worker queue.
//!
//! Each navigation bumps a global generation counter. A request records the
//! generation it was issued under in `pending`, and a result is applied only if
//! that record is still in place. Leaving the window or reloading drops the
//! record, so late results for it are discarded without touching the cache.

use std::collections::HashMap;
use std::ops::Range;

use tracing::{debug, trace, warn};

use super::cache::ImageCache;
use super::decoder::{Decoded, ImageKind};
use super::queue::{LoadRequest, LoadResult};
use crate::error::EngineError;
use crate::geometry::Size;
use crate::models::Image;
use crate::transform::ImageTransform;

/// Cache entries kept beyond the window unless configured otherwise
pub const DEFAULT_CACHE_SLACK: usize = 2;

/// A decoded full image together with its view transform
#[derive(Debug, Clone)]
pub struct FullImage {
    pub decoded: Decoded,
    pub transform: ImageTransform,
}

/// The position the window is centred on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Focus {
    /// Image mode: full images around `current`
    Image { current: usize },
    /// Gallery mode: thumbnails for the visible tiles
    Gallery { cursor: usize, visible: Range<usize> },
}

impl Focus {
    pub fn kind(&self) -> ImageKind {
        match self {
            Self::Image { .. } => ImageKind::Full,
            Self::Gallery { .. } => ImageKind::Thumbnail,
        }
    }

    pub fn current(&self) -> usize {
        match self {
            Self::Image { current } => *current,
            Self::Gallery { cursor, .. } => *cursor,
        }
    }
}

/// What applying a load result did
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    /// Superseded by a later navigation or reload; nothing changed
    Stale,
    Loaded { index: usize, kind: ImageKind },
    Failed {
        index: usize,
        kind: ImageKind,
        error: EngineError,
    },
}

pub struct PreloadManager {
    images: Vec<Image>,
    forward: usize,
    backward: usize,
    slack: usize,
    generation: u64,
    /// Outstanding requests and the generation they were issued under
    pending: HashMap<(ImageKind, usize), u64>,
    full: ImageCache<FullImage>,
    thumbnails: ImageCache<Decoded>,
    focus: Focus,
}

impl PreloadManager {
    pub fn new(images: Vec<Image>, forward: usize, backward: usize, slack: usize) -> Self {
        let window = forward + backward + 1;
        Self {
            images,
            forward,
            backward,
            slack,
            generation: 0,
            pending: HashMap::new(),
            full: ImageCache::new(window + slack),
            thumbnails: ImageCache::new(1 + slack),
            focus: Focus::Image { current: 0 },
        }
    }

    pub fn total(&self) -> usize {
        self.images.len()
    }

    pub fn image(&self, index: usize) -> Option<&Image> {
        self.images.get(index)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn range(&self) -> (usize, usize) {
        (self.forward, self.backward)
    }

    /// Change the window extents. Takes effect on the next `update`.
    pub fn set_range(&mut self, forward: usize, backward: usize) {
        self.forward = forward;
        self.backward = backward;
        self.full.set_capacity(forward + backward + 1 + self.slack);
    }

    /// Indices of full images that should be loaded around `current`
    pub fn full_window(&self, current: usize) -> Range<usize> {
        let total = self.total();
        let start = current.saturating_sub(self.backward);
        let end = current.saturating_add(self.forward).saturating_add(1).min(total);
        start..end
    }

    fn window(&self) -> Range<usize> {
        match &self.focus {
            Focus::Image { current } => self.full_window(*current),
            Focus::Gallery { visible, .. } => visible.start..visible.end.min(self.total()),
        }
    }

    pub fn is_loaded(&self, kind: ImageKind, index: usize) -> bool {
        match kind {
            ImageKind::Full => self.full.contains(index),
            ImageKind::Thumbnail => self.thumbnails.contains(index),
        }
    }

    /// Loaded indices in ascending order
    pub fn loaded(&self, kind: ImageKind) -> Vec<usize> {
        match kind {
            ImageKind::Full => self.full.indices(),
            ImageKind::Thumbnail => self.thumbnails.indices(),
        }
    }

    pub fn full_image(&self, index: usize) -> Option<&FullImage> {
        self.full.peek(index)
    }

    pub fn full_image_mut(&mut self, index: usize) -> Option<&mut FullImage> {
        self.full.peek_mut(index)
    }

    pub fn thumbnail(&self, index: usize) -> Option<&Decoded> {
        self.thumbnails.peek(index)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, kind: ImageKind, index: usize) -> bool {
        self.pending.contains_key(&(kind, index))
    }

    /// Move the window to `focus` and return the loads to issue, closest first.
    pub fn update(&mut self, focus: Focus) -> Vec<LoadRequest> {
        self.generation += 1;
        self.focus = focus;

        let kind = self.focus.kind();
        let window = self.window();

        // Outstanding loads that left the window are abandoned
        self.pending
            .retain(|&(k, index), _| k != kind || window.contains(&index));

        let current = self.focus.current();
        match kind {
            ImageKind::Full => self.full.touch(current),
            ImageKind::Thumbnail => {
                self.thumbnails.set_capacity(window.len() + self.slack);
                self.thumbnails.touch(current);
            }
        }

        self.evict(kind);

        let mut wanted: Vec<usize> = window
            .filter(|&index| self.needs_load(kind, index))
            .collect();
        wanted.sort_by_key(|&index| index.abs_diff(current));

        debug!(
            generation = self.generation,
            ?kind,
            current,
            requests = wanted.len(),
            "Recomputed preload window"
        );

        wanted
            .into_iter()
            .map(|index| self.request(kind, index))
            .collect()
    }

    fn needs_load(&self, kind: ImageKind, index: usize) -> bool {
        !self.is_loaded(kind, index)
            && !self.is_pending(kind, index)
            && !self.images[index].is_unloadable()
    }

    fn request(&mut self, kind: ImageKind, index: usize) -> LoadRequest {
        self.pending.insert((kind, index), self.generation);
        LoadRequest {
            index,
            path: self.images[index].path().to_path_buf(),
            kind,
            generation: self.generation,
        }
    }

    fn evict(&mut self, kind: ImageKind) {
        let current = self.focus.current();
        let window = if kind == self.focus.kind() {
            self.window()
        } else {
            0..0
        };
        let protected = |index: usize| index == current || window.contains(&index);

        let evicted = match kind {
            ImageKind::Full => self.full.evict(protected),
            ImageKind::Thumbnail => self.thumbnails.evict(protected),
        };
        if !evicted.is_empty() {
            debug!(?kind, ?evicted, "Evicted cache entries");
        }
    }

    /// Apply a finished load. `initial` builds the transform for a new full image
    /// from its natural size.
    pub fn apply(
        &mut self,
        result: LoadResult,
        initial: impl FnOnce(Size) -> ImageTransform,
    ) -> Applied {
        let key = (result.kind, result.index);
        if self.pending.get(&key) != Some(&result.generation) {
            trace!(
                index = result.index,
                generation = result.generation,
                "Dropped stale load result"
            );
            return Applied::Stale;
        }
        self.pending.remove(&key);

        let LoadResult {
            index,
            kind,
            outcome,
            ..
        } = result;

        match outcome {
            Ok(decoded) => {
                self.images[index].set_metadata(decoded.metadata());
                match kind {
                    ImageKind::Full => {
                        let transform = initial(decoded.size());
                        self.full.insert(index, FullImage { decoded, transform });
                    }
                    ImageKind::Thumbnail => self.thumbnails.insert(index, decoded),
                }
                self.evict(kind);
                debug!(index, ?kind, "Loaded image");
                Applied::Loaded { index, kind }
            }
            Err(error) => {
                warn!(index, ?kind, %error, "Failed to load image");
                self.images[index].mark_unloadable();
                Applied::Failed { index, kind, error }
            }
        }
    }

    /// Forget the current image and load it again from scratch.
    pub fn reload(&mut self) -> LoadRequest {
        let kind = self.focus.kind();
        let index = self.focus.current();

        self.generation += 1;
        self.pending.remove(&(kind, index));
        match kind {
            ImageKind::Full => {
                self.full.remove(index);
            }
            ImageKind::Thumbnail => {
                self.thumbnails.remove(index);
            }
        }
        self.images[index].reset_load_state();

        debug!(index, ?kind, generation = self.generation, "Reloading image");
        self.request(kind, index)
    }
}
