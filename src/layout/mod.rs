pub mod gallery;

pub use gallery::{GalleryLayout, GalleryScroll};
