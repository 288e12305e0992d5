//! glance: the viewing engine of a keyboard-driven image browser.
//!
//! The engine keeps an ordered image list, shows one image or a gallery grid,
//! decodes neighbouring images in the background and hands lifecycle points to
//! configuration-supplied callables.

pub mod config;
pub mod engine;
pub mod error;
pub mod extension;
pub mod geometry;
pub mod input;
pub mod layout;
pub mod models;
pub mod navigation;
pub mod preload;
pub mod transform;

pub use config::{Color, Settings, StatusBarPosition, ViewConfig};
pub use engine::{Engine, EngineBuilder, FrameState, GalleryFrame, NullPresenter, Presenter};
pub use error::{EngineError, Result};
pub use extension::{callback, status_query, Callback, ConfigFlag, Flags, Hook, StatusText};
pub use geometry::Size;
pub use input::Keycode;
pub use navigation::Mode;
pub use transform::{AlignX, AlignY, ImageTransform, Scaling};
