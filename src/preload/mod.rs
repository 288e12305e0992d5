//! Background decoding of the images around the current position.

pub mod cache;
pub mod decoder;
pub mod manager;
pub mod queue;
pub mod thumbnails;

pub use decoder::{Decoded, Decoder, ImageDecoder, ImageKind};
pub use manager::{Applied, Focus, FullImage, PreloadManager, DEFAULT_CACHE_SLACK};
pub use queue::{LoadQueue, LoadQueueBuilder, LoadRequest, LoadResult, DEFAULT_WORKERS};
pub use thumbnails::{ThumbnailKey, ThumbnailStore};
