//! Keyboard input: keycode parsing and scoped keybindings.

pub mod keybinds;
pub mod keycode;

pub use keybinds::{KeyBinds, Scope};
pub use keycode::{BaseKey, KeyInput, Keycode, Modifiers, NamedKey};
