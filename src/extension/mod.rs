//! Hooks, status bar query and startup flags supplied by configuration.

pub mod bridge;
pub mod flags;
pub mod hooks;

pub use bridge::{guarded, ExtensionBridge, MAX_CALL_DEPTH};
pub use flags::{ConfigFlag, FlagValue, Flags};
pub use hooks::{callback, status_query, Callback, Hook, Hooks, StatusQuery, StatusText};
