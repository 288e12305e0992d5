//! The viewing engine: one owner for navigation, transforms, preloading,
//! keybindings and the extension surface.
//!
//! Everything here runs on a single thread. Decoding happens on the worker
//! queue, and finished loads are applied when the caller drains them with
//! [`Engine::process_loads`]. Hooks run synchronously after the state change
//! that triggered them and before the redraw is presented.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use tracing::{debug, info, trace, warn};

use crate::config::{Color, Settings, StatusBarPosition, ViewConfig};
use crate::error::{EngineError, Result};
use crate::extension::{
    guarded, Callback, ExtensionBridge, Flags, Hook, Hooks, StatusQuery, StatusText,
};
use crate::geometry::Size;
use crate::input::{KeyBinds, Keycode, Scope};
use crate::layout::GalleryLayout;
use crate::models::{Image, ImageDetails};
use crate::navigation::{Mode, NavigationController};
use crate::preload::{
    Applied, Decoder, Focus, FullImage, ImageDecoder, ImageKind, LoadQueue, LoadQueueBuilder,
    LoadResult, PreloadManager, ThumbnailStore,
};
use crate::transform::{
    check_angle, check_zoom, check_zoom_factor, AlignX, AlignY, ImageTransform, Scaling,
};

/// Viewport used until the first `resize`
pub const DEFAULT_VIEWPORT: Size = Size::new(1280.0, 720.0);

/// What the presentation layer needs to draw one frame
#[derive(Debug)]
pub struct FrameState<'a> {
    pub mode: Mode,
    /// Current index in the active mode
    pub index: usize,
    pub total: usize,
    pub viewport: Size,
    pub fullscreen: bool,
    pub config: &'a ViewConfig,
    /// Image mode: the open image, once loaded
    pub image: Option<&'a FullImage>,
    /// Gallery mode: grid geometry and the visible tiles
    pub gallery: Option<GalleryFrame>,
    /// The status bar text, when the status bar is shown
    pub status_bar: Option<&'a StatusText>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GalleryFrame {
    pub layout: GalleryLayout,
    pub first: usize,
    pub visible: usize,
    pub cursor: usize,
}

/// The windowing/rendering layer
pub trait Presenter {
    fn present(&mut self, frame: &FrameState<'_>);
}

/// Presenter that draws nothing
#[derive(Debug, Default)]
pub struct NullPresenter;

impl Presenter for NullPresenter {
    fn present(&mut self, _frame: &FrameState<'_>) {}
}

/// Builder for [`Engine`].
pub struct EngineBuilder {
    paths: Vec<PathBuf>,
    settings: Settings,
    start: usize,
    flags: Flags,
    viewport: Size,
    decoder: Option<Arc<dyn Decoder>>,
    presenter: Box<dyn Presenter>,
}

impl EngineBuilder {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            paths,
            settings: Settings::default(),
            start: 0,
            flags: Flags::default(),
            viewport: DEFAULT_VIEWPORT,
            decoder: None,
            presenter: Box::new(NullPresenter),
        }
    }

    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Index of the first image to open
    pub fn start_at(mut self, index: usize) -> Self {
        self.start = index;
        self
    }

    pub fn flags(mut self, flags: Flags) -> Self {
        self.flags = flags;
        self
    }

    pub fn viewport(mut self, viewport: Size) -> Self {
        self.viewport = viewport;
        self
    }

    pub fn decoder(mut self, decoder: Arc<dyn Decoder>) -> Self {
        self.decoder = Some(decoder);
        self
    }

    pub fn presenter(mut self, presenter: Box<dyn Presenter>) -> Self {
        self.presenter = presenter;
        self
    }

    pub fn build(self) -> anyhow::Result<Engine> {
        let total = self.paths.len();
        let nav = NavigationController::new(total, self.start)
            .context("Failed to open the image list")?;

        let images = self.paths.into_iter().map(Image::new).collect();
        let s = &self.settings;
        let preload =
            PreloadManager::new(images, s.preload_forward, s.preload_backward, s.cache_slack);

        let decoder = self
            .decoder
            .unwrap_or_else(|| Arc::new(default_decoder(s)));
        let queue = LoadQueueBuilder::new(decoder).workers(s.workers).build()?;

        let mut engine = Engine {
            nav,
            preload,
            queue,
            config: s.view_config(),
            keybinds: KeyBinds::new(),
            bridge: ExtensionBridge::new(self.flags),
            presenter: self.presenter,
            viewport: self.viewport,
            fullscreen: false,
            status: StatusText::default(),
            frozen: false,
        };
        engine.refresh_window();

        info!(total, start = self.start, "Engine ready");
        Ok(engine)
    }
}

/// The image crate decoder, with the thumbnail store when its directory resolves
fn default_decoder(s: &Settings) -> ImageDecoder {
    let decoder = ImageDecoder::new(s.thumbnail_size);
    let dir = match &s.thumbnail_dir {
        Some(dir) => Ok(dir.clone()),
        None => ThumbnailStore::default_dir(),
    };
    match dir {
        Ok(dir) => decoder.with_store(ThumbnailStore::new(dir, s.save_thumbnails)),
        Err(e) => {
            warn!(error = ?e, "Thumbnail store disabled");
            decoder
        }
    }
}

pub struct Engine {
    nav: NavigationController,
    preload: PreloadManager,
    queue: LoadQueue,
    config: ViewConfig,
    keybinds: KeyBinds<Callback>,
    bridge: ExtensionBridge,
    presenter: Box<dyn Presenter>,
    viewport: Size,
    fullscreen: bool,
    status: StatusText,
    frozen: bool,
}

// === Internals ===

impl Engine {
    fn gallery_layout(&self) -> GalleryLayout {
        GalleryLayout::compute(
            self.config.gallery_tile_width,
            self.config.gallery_height_width_ratio,
            self.viewport,
        )
    }

    /// Move the preload window to the current position and issue its loads
    fn refresh_window(&mut self) {
        let focus = match self.nav.mode() {
            Mode::Image => Focus::Image {
                current: self.nav.image_index(),
            },
            Mode::Gallery => Focus::Gallery {
                cursor: self.nav.gallery_cursor(),
                visible: self
                    .nav
                    .scroll()
                    .visible_indices(&self.gallery_layout(), self.nav.total()),
            },
        };

        for request in self.preload.update(focus) {
            self.queue.submit(request);
        }
    }

    /// Run an external callable at the extension boundary
    fn call(&mut self, what: &str, callback: &Callback) {
        if !self.bridge.enter(what) {
            return;
        }
        trace!(callable = what, "Calling");
        guarded(what, || callback(self));
        self.bridge.leave();
    }

    fn fire(&mut self, hook: Hook) {
        if let Some(callback) = self.bridge.hook(hook) {
            self.call(hook.name(), &callback);
        }
    }

    fn redraw(&mut self) {
        if self.frozen {
            return;
        }

        let mode = self.nav.mode();
        let layout = self.gallery_layout();
        let (image, gallery) = match mode {
            Mode::Image => (self.preload.full_image(self.nav.image_index()), None),
            Mode::Gallery => {
                let (first, visible) = self.nav.scroll().visible_range(&layout);
                let frame = GalleryFrame {
                    layout,
                    first,
                    visible,
                    cursor: self.nav.gallery_cursor(),
                };
                (None, Some(frame))
            }
        };
        let status_bar = if self.status_bar_visible() {
            Some(&self.status)
        } else {
            None
        };

        let frame = FrameState {
            mode,
            index: self.nav.index(),
            total: self.nav.total(),
            viewport: self.viewport,
            fullscreen: self.fullscreen,
            config: &self.config,
            image,
            gallery,
            status_bar,
        };
        self.presenter.present(&frame);
    }

    fn redraw_in(&mut self, mode: Mode) {
        if self.nav.mode() == mode {
            self.redraw();
        }
    }

    /// Follow-up for a navigation call in `mode`
    fn moved(&mut self, mode: Mode, changed: bool) {
        if changed && self.nav.mode() == mode {
            self.refresh_window();
            self.redraw();
            self.fire(Hook::CurrentImageChange);
        }
    }

    /// Apply `update` to the open image's transform.
    /// Does nothing while the open image is not loaded.
    fn update_transform(&mut self, update: impl FnOnce(&mut ImageTransform, Size)) {
        let view = self.viewport;
        let index = self.nav.image_index();
        let Some(image) = self.preload.full_image_mut(index) else {
            trace!(index, "Transform update ignored, image not loaded");
            return;
        };
        update(&mut image.transform, view);

        self.redraw_in(Mode::Image);
        self.fire(Hook::TransformUpdate);
    }

    fn apply_result(&mut self, result: LoadResult) {
        let scaling = self.config.scaling;
        let align = self.config.align;
        let view = self.viewport;
        let applied = self.preload.apply(result, |size| {
            ImageTransform::initial(scaling, align, size, view)
        });

        let (index, kind) = match applied {
            Applied::Stale => return,
            Applied::Loaded { index, kind } | Applied::Failed { index, kind, .. } => (index, kind),
        };

        let is_current = match (self.nav.mode(), kind) {
            (Mode::Image, ImageKind::Full) => self.nav.image_index() == index,
            (Mode::Gallery, ImageKind::Thumbnail) => self.nav.gallery_cursor() == index,
            _ => false,
        };
        let visible = is_current
            || (kind == ImageKind::Thumbnail && self.nav.mode() == Mode::Gallery);

        if visible {
            self.redraw();
        }
        if is_current {
            self.fire(Hook::CurrentImageLoad);
        }
    }
}

// === Loading ===

impl Engine {
    /// Apply every finished load without blocking. Returns how many arrived.
    pub fn process_loads(&mut self) -> usize {
        let results = self.queue.poll_results();
        let count = results.len();
        for result in results {
            self.apply_result(result);
        }
        count
    }

    /// Apply loads as they finish until nothing is pending or `timeout` passes.
    /// Returns true if everything settled.
    pub fn settle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.process_loads();
            if self.preload.pending_count() == 0 {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            if let Some(result) = self.queue.recv_timeout(deadline - now) {
                self.apply_result(result);
            }
        }
    }

    /// Indices with decoded data of the given kind
    pub fn loaded(&self, kind: ImageKind) -> Vec<usize> {
        self.preload.loaded(kind)
    }

    /// Discard the current image and decode it again
    pub fn reload(&mut self) {
        let request = self.preload.reload();
        self.queue.submit(request);
        self.redraw();
    }

    pub fn preload_range(&self) -> (usize, usize) {
        self.preload.range()
    }

    pub fn set_preload_range(&mut self, forward: usize, backward: usize) {
        self.preload.set_range(forward, backward);
        if self.nav.mode() == Mode::Image {
            self.refresh_window();
        }
    }
}

// === Modes and navigation ===

impl Engine {
    pub fn mode(&self) -> Mode {
        self.nav.mode()
    }

    pub fn current_mode(&self) -> Mode {
        self.mode()
    }

    pub fn set_mode(&mut self, mode: Mode) {
        let layout = self.gallery_layout();
        if self.nav.set_mode(mode, &layout) {
            debug!(%mode, "Switched mode");
            self.refresh_window();
            self.redraw();
            self.fire(Hook::CurrentImageChange);
        }
    }

    pub fn toggle_mode(&mut self) {
        let mode = match self.mode() {
            Mode::Image => Mode::Gallery,
            Mode::Gallery => Mode::Image,
        };
        self.set_mode(mode);
    }

    /// Open the gallery selection in image mode
    pub fn select(&mut self) -> Result<()> {
        self.nav.select()?;
        self.refresh_window();
        self.redraw();
        self.fire(Hook::CurrentImageChange);
        Ok(())
    }

    /// Current index in the active mode
    pub fn index(&self) -> usize {
        self.nav.index()
    }

    pub fn total_images(&self) -> usize {
        self.nav.total()
    }

    pub fn image(&self, index: usize) -> Result<ImageDetails> {
        let image = self.preload.image(index).ok_or(EngineError::Range {
            index,
            total: self.nav.total(),
        })?;
        Ok(ImageDetails::new(
            index,
            image,
            self.preload.is_loaded(ImageKind::Full, index),
            self.preload.is_loaded(ImageKind::Thumbnail, index),
        ))
    }

    /// Details of the current image in the active mode
    pub fn current_image(&self) -> Result<ImageDetails> {
        self.image(self.nav.index())
    }

    pub fn goto(&mut self, index: usize) -> Result<()> {
        self.nav.goto(index)?;
        self.moved(Mode::Image, true);
        Ok(())
    }

    pub fn next(&mut self) {
        let changed = self.nav.next(false);
        self.moved(Mode::Image, changed);
    }

    pub fn prev(&mut self) {
        let changed = self.nav.prev(false);
        self.moved(Mode::Image, changed);
    }

    pub fn next_wrapping(&mut self) {
        let changed = self.nav.next(true);
        self.moved(Mode::Image, changed);
    }

    pub fn prev_wrapping(&mut self) {
        let changed = self.nav.prev(true);
        self.moved(Mode::Image, changed);
    }

    pub fn first(&mut self) {
        let changed = self.nav.first();
        self.moved(Mode::Image, changed);
    }

    pub fn last(&mut self) {
        let changed = self.nav.last();
        self.moved(Mode::Image, changed);
    }

    pub fn gallery_goto(&mut self, index: usize) -> Result<()> {
        let layout = self.gallery_layout();
        self.nav.gallery_goto(index, &layout)?;
        self.moved(Mode::Gallery, true);
        Ok(())
    }

    pub fn gallery_next(&mut self) {
        let layout = self.gallery_layout();
        let changed = self.nav.gallery_next(false, &layout);
        self.moved(Mode::Gallery, changed);
    }

    pub fn gallery_prev(&mut self) {
        let layout = self.gallery_layout();
        let changed = self.nav.gallery_prev(false, &layout);
        self.moved(Mode::Gallery, changed);
    }

    pub fn gallery_next_wrapping(&mut self) {
        let layout = self.gallery_layout();
        let changed = self.nav.gallery_next(true, &layout);
        self.moved(Mode::Gallery, changed);
    }

    pub fn gallery_prev_wrapping(&mut self) {
        let layout = self.gallery_layout();
        let changed = self.nav.gallery_prev(true, &layout);
        self.moved(Mode::Gallery, changed);
    }

    pub fn gallery_first(&mut self) {
        let layout = self.gallery_layout();
        let changed = self.nav.gallery_first(&layout);
        self.moved(Mode::Gallery, changed);
    }

    pub fn gallery_last(&mut self) {
        let layout = self.gallery_layout();
        let changed = self.nav.gallery_last(&layout);
        self.moved(Mode::Gallery, changed);
    }

    pub fn gallery_up(&mut self) {
        let layout = self.gallery_layout();
        let changed = self.nav.gallery_up(&layout);
        self.moved(Mode::Gallery, changed);
    }

    pub fn gallery_down(&mut self) {
        let layout = self.gallery_layout();
        let changed = self.nav.gallery_down(&layout);
        self.moved(Mode::Gallery, changed);
    }

    /// Index of the first visible gallery tile and the number of tiles shown
    pub fn gallery_visible_range(&self) -> (usize, usize) {
        self.nav.scroll().visible_range(&self.gallery_layout())
    }
}

// === Transform ===

impl Engine {
    /// The open image's transform, once it is loaded
    pub fn transform(&self) -> Option<ImageTransform> {
        self.preload
            .full_image(self.nav.image_index())
            .map(|image| image.transform)
    }

    pub fn pan(&mut self, dx: f64, dy: f64) {
        self.update_transform(|t, _| t.pan(dx, dy));
    }

    pub fn set_pan(&mut self, x: f64, y: f64) {
        self.update_transform(|t, _| t.set_pan(x, y));
    }

    pub fn zoom(&mut self, factor: f64) -> Result<()> {
        check_zoom_factor(factor)?;
        self.update_transform(|t, view| {
            // Validated above
            let _ = t.zoom(factor, view);
        });
        Ok(())
    }

    pub fn set_zoom(&mut self, zoom: f64) -> Result<()> {
        check_zoom(zoom)?;
        self.update_transform(|t, _| {
            let _ = t.set_zoom(zoom);
        });
        Ok(())
    }

    pub fn rotate(&mut self, degrees: f64) -> Result<()> {
        check_angle(degrees)?;
        self.update_transform(|t, view| {
            let _ = t.rotate(degrees, view);
        });
        Ok(())
    }

    pub fn set_rotation(&mut self, degrees: f64) -> Result<()> {
        check_angle(degrees)?;
        self.update_transform(|t, _| {
            let _ = t.set_rotation(degrees);
        });
        Ok(())
    }

    pub fn hflip(&mut self) {
        self.update_transform(|t, view| t.hflip(view));
    }

    pub fn vflip(&mut self) {
        self.update_transform(|t, view| t.vflip(view));
    }

    pub fn set_flipped(&mut self, flipped: bool) {
        self.update_transform(|t, _| t.set_flipped(flipped));
    }

    /// Recompute the transform from the scaling and align options
    pub fn reset(&mut self) {
        let scaling = self.config.scaling;
        let align = self.config.align;
        let image = self
            .preload
            .full_image(self.nav.image_index())
            .map(|image| image.decoded.size())
            .unwrap_or_default();
        self.update_transform(|t, view| t.reset(scaling, align, image, view));
    }
}

// === View configuration ===

impl Engine {
    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    pub fn scaling(&self) -> Scaling {
        self.config.scaling
    }

    /// Applies to images loaded afterwards and to `reset`
    pub fn set_scaling(&mut self, scaling: Scaling) {
        self.config.scaling = scaling;
    }

    pub fn align_x(&self) -> AlignX {
        self.config.align.x
    }

    pub fn set_align_x(&mut self, align: AlignX) {
        self.config.align.x = align;
    }

    pub fn align_y(&self) -> AlignY {
        self.config.align.y
    }

    pub fn set_align_y(&mut self, align: AlignY) {
        self.config.align.y = align;
    }

    pub fn gallery_tile_width(&self) -> f64 {
        self.config.gallery_tile_width
    }

    pub fn set_gallery_tile_width(&mut self, width: f64) -> Result<()> {
        if !(width > 0.0 && width.is_finite()) {
            return Err(EngineError::NonPositive {
                what: "gallery tile width",
                value: width as f32,
            });
        }
        self.config.gallery_tile_width = width;
        self.relayout();
        Ok(())
    }

    pub fn gallery_height_width_ratio(&self) -> f64 {
        self.config.gallery_height_width_ratio
    }

    pub fn set_gallery_height_width_ratio(&mut self, ratio: f64) -> Result<()> {
        if !(ratio > 0.0 && ratio.is_finite()) {
            return Err(EngineError::NonPositive {
                what: "gallery height width ratio",
                value: ratio as f32,
            });
        }
        self.config.gallery_height_width_ratio = ratio;
        self.relayout();
        Ok(())
    }

    fn relayout(&mut self) {
        let layout = self.gallery_layout();
        self.nav.relayout(&layout);
        if self.nav.mode() == Mode::Gallery {
            self.refresh_window();
            self.redraw();
        }
    }

    pub fn set_background_color(&mut self, color: Color) {
        self.config.background = color;
        self.redraw();
    }

    pub fn set_backdrop_color(&mut self, color: Color) {
        self.config.backdrop = color;
        self.redraw_in(Mode::Image);
    }

    pub fn set_gallery_cursor_color(&mut self, color: Color) {
        self.config.gallery_cursor = color;
        self.redraw_in(Mode::Gallery);
    }

    pub fn set_gallery_border_color(&mut self, color: Color) {
        self.config.gallery_border = color;
        self.redraw_in(Mode::Gallery);
    }

    pub fn set_status_bar_color(&mut self, color: Color) {
        self.config.status_bar_color = color;
        if self.status_bar_visible() {
            self.redraw();
        }
    }
}

// === Window ===

impl Engine {
    pub fn viewport(&self) -> Size {
        self.viewport
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        self.viewport = Size::new(width.max(0.0), height.max(0.0));
        debug!(width, height, "Viewport resized");

        let layout = self.gallery_layout();
        self.nav.relayout(&layout);
        if self.nav.mode() == Mode::Gallery {
            self.refresh_window();
        }
        self.redraw();
        self.fire(Hook::Resize);
    }

    pub fn fullscreen(&self) -> bool {
        self.fullscreen
    }

    pub fn set_fullscreen(&mut self, fullscreen: bool) {
        if self.fullscreen != fullscreen {
            self.fullscreen = fullscreen;
            self.redraw();
        }
    }

    pub fn toggle_fullscreen(&mut self) {
        self.set_fullscreen(!self.fullscreen);
    }

    /// Stop presenting frames. State changes and hooks carry on.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Resume presenting with one catch-up frame
    pub fn unfreeze(&mut self) {
        if self.frozen {
            self.frozen = false;
            self.redraw();
        }
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }
}

// === Status bar ===

impl Engine {
    /// Shown in the gallery always, in image mode when enabled
    pub fn status_bar_visible(&self) -> bool {
        self.nav.mode() == Mode::Gallery || self.config.status_bar
    }

    pub fn status_bar(&self) -> bool {
        self.config.status_bar
    }

    pub fn set_status_bar(&mut self, show: bool) {
        if self.config.status_bar != show {
            self.config.status_bar = show;
            self.redraw_in(Mode::Image);
        }
    }

    pub fn toggle_status_bar(&mut self) {
        self.set_status_bar(!self.config.status_bar);
    }

    pub fn status_bar_position(&self) -> StatusBarPosition {
        self.config.status_bar_position
    }

    pub fn set_status_bar_position(&mut self, position: StatusBarPosition) {
        self.config.status_bar_position = position;
        if self.status_bar_visible() {
            self.redraw();
        }
    }

    /// The text from the last `refresh_status_bar`
    pub fn status_text(&self) -> &StatusText {
        &self.status
    }

    /// Run the status bar query. A missing or failing query empties the bar.
    pub fn refresh_status_bar(&mut self) {
        let mut text = StatusText::default();
        if let Some(query) = self.bridge.status_query() {
            if self.bridge.enter("status_bar_query") {
                let engine: &Engine = self;
                text = guarded("status_bar_query", || query(engine)).unwrap_or_default();
                self.bridge.leave();
            }
        }
        self.status = text;

        if self.status_bar_visible() {
            self.redraw();
        }
    }

    pub fn set_status_query(&mut self, query: Option<StatusQuery>) {
        self.bridge.set_status_query(query);
    }
}

// === Extension surface ===

impl Engine {
    pub fn flags(&self) -> &Flags {
        self.bridge.flags()
    }

    pub fn hooks_mut(&mut self) -> &mut Hooks {
        self.bridge.hooks_mut()
    }

    pub fn set_hook(&mut self, hook: Hook, callback: Callback) {
        self.bridge.hooks_mut().set(hook, callback);
    }

    /// Bind in the global scope
    pub fn bind(&mut self, keycode: &str, action: Callback) -> Result<()> {
        self.keybinds.register(Scope::Global, keycode, action)
    }

    pub fn bind_image(&mut self, keycode: &str, action: Callback) -> Result<()> {
        self.keybinds.register(Scope::Image, keycode, action)
    }

    pub fn bind_gallery(&mut self, keycode: &str, action: Callback) -> Result<()> {
        self.keybinds.register(Scope::Gallery, keycode, action)
    }

    /// Run the action bound to a press. Returns false if nothing is bound.
    pub fn handle_key(&mut self, key: &Keycode) -> bool {
        let Some(action) = self.keybinds.resolve(key, self.nav.mode()).cloned() else {
            trace!(%key, "Unbound key");
            return false;
        };
        self.call(&format!("binding {}", key), &action);
        true
    }
}
