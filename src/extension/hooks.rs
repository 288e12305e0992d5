use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use crate::engine::Engine;
use crate::error::EngineError;

/// A hook, bound action or other callable supplied by configuration
pub type Callback = Rc<dyn Fn(&mut Engine) -> anyhow::Result<()>>;

/// Text for the status bar: left-aligned and optional right-aligned part
pub type StatusText = (String, Option<String>);

/// The status bar query supplied by configuration
pub type StatusQuery = Rc<dyn Fn(&Engine) -> anyhow::Result<StatusText>>;

/// Wrap a closure as a [`Callback`]
pub fn callback<F>(f: F) -> Callback
where
    F: Fn(&mut Engine) -> anyhow::Result<()> + 'static,
{
    Rc::new(f)
}

/// Wrap a closure as a [`StatusQuery`]
pub fn status_query<F>(f: F) -> StatusQuery
where
    F: Fn(&Engine) -> anyhow::Result<StatusText> + 'static,
{
    Rc::new(f)
}

/// Points in the engine's lifecycle where configuration can run code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    /// The displayed image or the gallery selection changed
    CurrentImageChange,
    /// The current image's transform changed
    TransformUpdate,
    /// A load of the current image (full or thumbnail) was applied
    CurrentImageLoad,
    /// The viewport size changed
    Resize,
}

impl Hook {
    pub const ALL: [Hook; 4] = [
        Hook::CurrentImageChange,
        Hook::TransformUpdate,
        Hook::CurrentImageLoad,
        Hook::Resize,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::CurrentImageChange => "current_image_change",
            Self::TransformUpdate => "transform_update",
            Self::CurrentImageLoad => "current_image_load",
            Self::Resize => "resize",
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Hook {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, EngineError> {
        Self::ALL
            .into_iter()
            .find(|hook| hook.name() == s)
            .ok_or_else(|| EngineError::invalid("hook", s))
    }
}

/// The hook table: at most one callable per hook
#[derive(Default, Clone)]
pub struct Hooks {
    table: HashMap<Hook, Callback>,
}

impl Hooks {
    /// Install a hook, returning the previous one
    pub fn set(&mut self, hook: Hook, callback: Callback) -> Option<Callback> {
        self.table.insert(hook, callback)
    }

    pub fn clear(&mut self, hook: Hook) -> Option<Callback> {
        self.table.remove(&hook)
    }

    pub fn get(&self, hook: Hook) -> Option<Callback> {
        self.table.get(&hook).cloned()
    }

    pub fn is_set(&self, hook: Hook) -> bool {
        self.table.contains_key(&hook)
    }
}
