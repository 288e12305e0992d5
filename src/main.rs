use std::cell::Cell;
use std::fs;
use std::io::{self, BufRead, IsTerminal};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use glance::config::{Settings, CONFIG_DIR_ENV};
use glance::models::is_image_path;
use glance::{
    callback, status_query, Callback, ConfigFlag, Engine, EngineBuilder, Flags, FrameState, Hook,
    Keycode, Mode, Presenter,
};

/// How long to wait for outstanding loads after the key feed ends
const SETTLE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(name = "glance", version, about = "Keyboard-driven image viewer")]
struct Args {
    /// Images or directories to open. Read from stdin, one per line, when omitted.
    paths: Vec<PathBuf>,

    /// Image to open first (1-based)
    #[arg(long, default_value_t = 1)]
    start_at: usize,

    /// Flag exposed to configuration, may be repeated
    #[arg(long = "flag", value_name = "NAME[:VALUE]")]
    flags: Vec<ConfigFlag>,

    /// Directory holding config.toml
    #[arg(long, value_name = "DIR")]
    config_dir: Option<PathBuf>,

    /// Keycodes to press, one per line
    #[arg(long, value_name = "FILE")]
    keys: Option<PathBuf>,
}

/// Presenter for headless runs: every frame becomes a debug event
struct LogPresenter;

impl Presenter for LogPresenter {
    fn present(&mut self, frame: &FrameState<'_>) {
        debug!(
            mode = %frame.mode,
            index = frame.index,
            total = frame.total,
            loaded = frame.image.is_some(),
            fullscreen = frame.fullscreen,
            status = ?frame.status_bar,
            "Frame"
        );
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("glance=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let config_dir = match args.config_dir {
        Some(dir) => dir,
        None => match std::env::var_os(CONFIG_DIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => Settings::default_dir()?,
        },
    };
    let settings = Settings::load(&config_dir)?;

    let paths = if args.paths.is_empty() {
        read_stdin_paths()?
    } else {
        args.paths
    };
    let images = expand_paths(&paths);
    if images.is_empty() {
        bail!("No images to show");
    }

    if args.start_at == 0 || args.start_at > images.len() {
        bail!(
            "--start-at must be between 1 and {}, got {}",
            images.len(),
            args.start_at
        );
    }

    let mut engine = EngineBuilder::new(images)
        .settings(settings)
        .start_at(args.start_at - 1)
        .flags(Flags::new(args.flags))
        .presenter(Box::new(LogPresenter))
        .build()?;

    let quit = Rc::new(Cell::new(false));
    install_default_bindings(&mut engine, quit.clone())?;
    install_status_bar(&mut engine);

    if let Some(keys) = args.keys {
        feed_keys(&mut engine, &keys, &quit)?;
    }

    if !engine.settle(SETTLE_TIMEOUT) {
        warn!("Gave up waiting for outstanding loads");
    }

    let current = engine.current_image()?;
    info!(
        mode = %engine.mode(),
        index = current.index,
        path = ?current.path,
        metadata = ?current.metadata,
        "Done"
    );
    Ok(())
}

fn read_stdin_paths() -> Result<Vec<PathBuf>> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        bail!("No paths given and nothing piped on stdin");
    }

    let mut paths = Vec::new();
    for line in stdin.lock().lines() {
        let line = line.context("Failed to read paths from stdin")?;
        let line = line.trim();
        if !line.is_empty() {
            paths.push(PathBuf::from(line));
        }
    }
    Ok(paths)
}

/// Replace directories by the images inside them, sorted by path
fn expand_paths(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut images = Vec::new();

    for path in paths {
        if !path.is_dir() {
            images.push(path.clone());
            continue;
        }

        let mut found: Vec<PathBuf> = WalkDir::new(path)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && is_image_path(e.path()))
            .map(|e| e.into_path())
            .collect();
        found.sort();

        debug!(dir = ?path, count = found.len(), "Expanded directory");
        images.extend(found);
    }

    images
}

type Action = fn(&mut Engine) -> glance::Result<()>;

const GLOBAL_BINDINGS: &[(&str, Action)] = &[
    ("Tab", |e| {
        e.toggle_mode();
        Ok(())
    }),
    ("F11", |e| {
        e.toggle_fullscreen();
        Ok(())
    }),
    ("b", |e| {
        e.toggle_status_bar();
        Ok(())
    }),
    ("C-r", |e| {
        e.reload();
        Ok(())
    }),
];

const IMAGE_BINDINGS: &[(&str, Action)] = &[
    ("Right", |e| {
        e.next();
        Ok(())
    }),
    ("l", |e| {
        e.next();
        Ok(())
    }),
    ("Left", |e| {
        e.prev();
        Ok(())
    }),
    ("h", |e| {
        e.prev();
        Ok(())
    }),
    ("Space", |e| {
        e.next_wrapping();
        Ok(())
    }),
    ("g", |e| {
        e.first();
        Ok(())
    }),
    ("S-g", |e| {
        e.last();
        Ok(())
    }),
    ("S-+", |e| e.zoom(1.25)),
    ("-", |e| e.zoom(-1.25)),
    ("r", |e| e.rotate(90.0)),
    ("S-r", |e| e.rotate(-90.0)),
    ("f", |e| {
        e.hflip();
        Ok(())
    }),
    ("S-f", |e| {
        e.vflip();
        Ok(())
    }),
    ("0", |e| {
        e.reset();
        Ok(())
    }),
];

const GALLERY_BINDINGS: &[(&str, Action)] = &[
    ("Return", |e| e.select()),
    ("Right", |e| {
        e.gallery_next();
        Ok(())
    }),
    ("l", |e| {
        e.gallery_next();
        Ok(())
    }),
    ("Left", |e| {
        e.gallery_prev();
        Ok(())
    }),
    ("h", |e| {
        e.gallery_prev();
        Ok(())
    }),
    ("Down", |e| {
        e.gallery_down();
        Ok(())
    }),
    ("j", |e| {
        e.gallery_down();
        Ok(())
    }),
    ("Up", |e| {
        e.gallery_up();
        Ok(())
    }),
    ("k", |e| {
        e.gallery_up();
        Ok(())
    }),
    ("g", |e| {
        e.gallery_first();
        Ok(())
    }),
    ("S-g", |e| {
        e.gallery_last();
        Ok(())
    }),
];

fn action(f: Action) -> Callback {
    callback(move |e| f(e).map_err(Into::into))
}

fn install_default_bindings(engine: &mut Engine, quit: Rc<Cell<bool>>) -> Result<()> {
    for &(key, f) in GLOBAL_BINDINGS {
        engine.bind(key, action(f))?;
    }
    for &(key, f) in IMAGE_BINDINGS {
        engine.bind_image(key, action(f))?;
    }
    for &(key, f) in GALLERY_BINDINGS {
        engine.bind_gallery(key, action(f))?;
    }
    engine.bind(
        "q",
        callback(move |_| {
            quit.set(true);
            Ok(())
        }),
    )?;
    Ok(())
}

/// Show the file name and position, refreshed whenever either may change
fn install_status_bar(engine: &mut Engine) {
    engine.set_status_query(Some(status_query(|e| {
        let image = e.current_image()?;
        let name = image.filename.unwrap_or_default();
        let left = match e.mode() {
            Mode::Image if image.errored => format!("{} (failed to load)", name),
            _ => name,
        };
        let right = format!("{}/{}", image.index + 1, e.total_images());
        Ok((left, Some(right)))
    })));

    for hook in [Hook::CurrentImageChange, Hook::CurrentImageLoad] {
        engine.set_hook(
            hook,
            callback(|e| {
                e.refresh_status_bar();
                Ok(())
            }),
        );
    }
    engine.refresh_status_bar();
}

fn feed_keys(engine: &mut Engine, path: &Path, quit: &Cell<bool>) -> Result<()> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read key file: {:?}", path))?;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("//") {
            continue;
        }

        let key: Keycode = match line.parse() {
            Ok(key) => key,
            Err(e) => {
                warn!(error = %e, "Skipping key");
                continue;
            }
        };
        if !engine.handle_key(&key) {
            debug!(%key, "Key not bound");
        }
        engine.process_loads();

        if quit.get() {
            info!("Quit requested");
            break;
        }
    }
    Ok(())
}
