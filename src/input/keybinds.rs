//! Scoped keybindings.
//!
//! Bindings live in three tables: one per mode plus a global table. Resolution
//! checks the table of the current mode first and falls back to the global table,
//! so a mode binding always shadows a global one regardless of registration order.

use std::collections::HashMap;

use tracing::debug;

use super::keycode::Keycode;
use crate::error::Result;
use crate::navigation::Mode;

/// The table a binding is registered into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Global,
    Image,
    Gallery,
}

impl From<Mode> for Scope {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Image => Self::Image,
            Mode::Gallery => Self::Gallery,
        }
    }
}

/// Keycode to action tables
pub struct KeyBinds<A> {
    global: HashMap<Keycode, A>,
    image: HashMap<Keycode, A>,
    gallery: HashMap<Keycode, A>,
}

impl<A> KeyBinds<A> {
    pub fn new() -> Self {
        Self {
            global: HashMap::new(),
            image: HashMap::new(),
            gallery: HashMap::new(),
        }
    }

    fn table_mut(&mut self, scope: Scope) -> &mut HashMap<Keycode, A> {
        match scope {
            Scope::Global => &mut self.global,
            Scope::Image => &mut self.image,
            Scope::Gallery => &mut self.gallery,
        }
    }

    fn table(&self, scope: Scope) -> &HashMap<Keycode, A> {
        match scope {
            Scope::Global => &self.global,
            Scope::Image => &self.image,
            Scope::Gallery => &self.gallery,
        }
    }

    /// Parse `keycode` and bind it in `scope`.
    /// A binding for the same (scope, keycode) is silently replaced.
    pub fn register(&mut self, scope: Scope, keycode: &str, action: A) -> Result<()> {
        let key: Keycode = keycode.parse()?;
        self.insert(scope, key, action);
        Ok(())
    }

    /// Bind an already parsed keycode. Returns the replaced action, if any.
    pub fn insert(&mut self, scope: Scope, key: Keycode, action: A) -> Option<A> {
        let replaced = self.table_mut(scope).insert(key, action);
        if replaced.is_some() {
            debug!(?scope, %key, "Replaced keybinding");
        }
        replaced
    }

    /// Look up the action for a press in the given mode.
    pub fn resolve(&self, key: &Keycode, mode: Mode) -> Option<&A> {
        self.table(Scope::from(mode))
            .get(key)
            .or_else(|| self.global.get(key))
    }

    /// Number of bindings in a scope
    pub fn len(&self, scope: Scope) -> usize {
        self.table(scope).len()
    }
}

impl<A> Default for KeyBinds<A> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> Keycode {
        s.parse().unwrap()
    }

    #[test]
    fn test_mode_binding_shadows_global() {
        let mut binds = KeyBinds::new();
        binds.register(Scope::Global, "q", "A").unwrap();
        binds.register(Scope::Image, "q", "B").unwrap();

        assert_eq!(binds.resolve(&key("q"), Mode::Image), Some(&"B"));
        assert_eq!(binds.resolve(&key("q"), Mode::Gallery), Some(&"A"));
    }

    #[test]
    fn test_precedence_ignores_registration_order() {
        let mut binds = KeyBinds::new();
        binds.register(Scope::Gallery, "j", "down").unwrap();
        binds.register(Scope::Global, "j", "next").unwrap();

        assert_eq!(binds.resolve(&key("j"), Mode::Gallery), Some(&"down"));
        assert_eq!(binds.resolve(&key("j"), Mode::Image), Some(&"next"));
    }

    #[test]
    fn test_duplicate_registration_overwrites() {
        let mut binds = KeyBinds::new();
        binds.register(Scope::Image, "C-r", 1).unwrap();
        binds.register(Scope::Image, "C-r", 2).unwrap();

        assert_eq!(binds.len(Scope::Image), 1);
        assert_eq!(binds.resolve(&key("C-r"), Mode::Image), Some(&2));
    }

    #[test]
    fn test_unbound_key_resolves_to_none() {
        let mut binds = KeyBinds::new();
        binds.register(Scope::Image, "x", ()).unwrap();
        assert!(binds.resolve(&key("y"), Mode::Image).is_none());
        assert!(binds.resolve(&key("x"), Mode::Gallery).is_none());
    }

    #[test]
    fn test_parse_error_leaves_tables_untouched() {
        let mut binds = KeyBinds::new();
        assert!(binds.register(Scope::Global, "C-S-a", ()).is_err());
        assert_eq!(binds.len(Scope::Global), 0);
    }

    #[test]
    fn test_shifted_symbol_binding() {
        let mut binds = KeyBinds::new();
        binds.register(Scope::Global, "S-*", "star").unwrap();
        binds.register(Scope::Global, "8", "eight").unwrap();

        assert_eq!(binds.resolve(&key("S-*"), Mode::Image), Some(&"star"));
        assert!(binds.resolve(&key("*"), Mode::Image).is_none());
    }
}
