//! Keycode identifiers for keybindings.
//!
//! Format:
//!     [S-][C-][A-][L-]<base>
//! S: Shift
//! C: Ctrl
//! A: Alt
//! L: Logo / Command / Super
//!
//! The base key is the character actually produced by the key combination, so
//! shift-8 is written `S-*`, never `S-8` or `*`. Letter keys are the exception:
//! they are only accepted in lowercase and shift is expressed with `S-` alone.

use std::fmt;
use std::str::FromStr;

use crate::error::{EngineError, Result};

/// Modifier keys held during a press.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub logo: bool,
}

impl Modifiers {
    pub const NONE: Self = Self {
        shift: false,
        ctrl: false,
        alt: false,
        logo: false,
    };

    pub fn shift() -> Self {
        Self {
            shift: true,
            ..Self::NONE
        }
    }

    pub fn ctrl() -> Self {
        Self {
            ctrl: true,
            ..Self::NONE
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::NONE
    }
}

/// Non-character keys with a fixed name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedKey {
    Escape,
    Snapshot,
    Scroll,
    Pause,
    Insert,
    Home,
    Delete,
    End,
    PageDown,
    PageUp,
    Left,
    Right,
    Up,
    Down,
    Back,
    Return,
    Space,
    Tab,
    Compose,
    Numlock,
    Capital,
    Apps,
    NumpadAdd,
    NumpadSubtract,
    NumpadMultiply,
    NumpadDivide,
    NumpadDecimal,
    NumpadComma,
    NumpadEnter,
    NumpadEquals,
    Mute,
    VolumeDown,
    VolumeUp,
    PlayPause,
    NextTrack,
    PrevTrack,
}

const NAMED_KEYS: &[(&str, NamedKey)] = &[
    ("Esc", NamedKey::Escape),
    ("Snapshot", NamedKey::Snapshot),
    ("Scroll", NamedKey::Scroll),
    ("Pause", NamedKey::Pause),
    ("Insert", NamedKey::Insert),
    ("Home", NamedKey::Home),
    ("Delete", NamedKey::Delete),
    ("End", NamedKey::End),
    ("PageDown", NamedKey::PageDown),
    ("PageUp", NamedKey::PageUp),
    ("Left", NamedKey::Left),
    ("Right", NamedKey::Right),
    ("Up", NamedKey::Up),
    ("Down", NamedKey::Down),
    ("Back", NamedKey::Back),
    ("Return", NamedKey::Return),
    ("Space", NamedKey::Space),
    ("Tab", NamedKey::Tab),
    ("Compose", NamedKey::Compose),
    ("Numlock", NamedKey::Numlock),
    ("Capital", NamedKey::Capital),
    ("Apps", NamedKey::Apps),
    ("NumpadAdd", NamedKey::NumpadAdd),
    ("NumpadSubtract", NamedKey::NumpadSubtract),
    ("NumpadMultiply", NamedKey::NumpadMultiply),
    ("NumpadDivide", NamedKey::NumpadDivide),
    ("NumpadDecimal", NamedKey::NumpadDecimal),
    ("NumpadComma", NamedKey::NumpadComma),
    ("NumpadEnter", NamedKey::NumpadEnter),
    ("NumpadEquals", NamedKey::NumpadEquals),
    ("Mute", NamedKey::Mute),
    ("VolumeDown", NamedKey::VolumeDown),
    ("VolumeUp", NamedKey::VolumeUp),
    ("PlayPause", NamedKey::PlayPause),
    ("NextTrack", NamedKey::NextTrack),
    ("PrevTrack", NamedKey::PrevTrack),
];

/// Punctuation, addressable by name or by the literal character.
const SYMBOLS: &[(&str, char)] = &[
    ("Apostrophe", '\''),
    ("Asterisk", '*'),
    ("At", '@'),
    ("Backslash", '\\'),
    ("Caret", '^'),
    ("Colon", ':'),
    ("Comma", ','),
    ("Dollar", '$'),
    ("Equals", '='),
    ("Exclaim", '!'),
    ("Grave", '`'),
    ("Hash", '#'),
    ("Percent", '%'),
    ("Ampersand", '&'),
    ("LParen", '('),
    ("RParen", ')'),
    ("LBracket", '['),
    ("RBracket", ']'),
    ("LBrace", '{'),
    ("RBrace", '}'),
    ("Less", '<'),
    ("Greater", '>'),
    ("Minus", '-'),
    ("Period", '.'),
    ("Pipe", '|'),
    ("Plus", '+'),
    ("Question", '?'),
    ("Quote", '"'),
    ("Semicolon", ';'),
    ("Slash", '/'),
    ("Tilde", '~'),
    ("Underline", '_'),
];

/// The base key of a keycode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseKey {
    /// `0`-`9` on the main row
    Digit(u8),
    /// `a`-`z`, always stored lowercase
    Letter(char),
    /// `F1`-`F24`
    Function(u8),
    /// `Numpad0`-`Numpad9`
    Numpad(u8),
    /// A produced punctuation character, e.g. `*`
    Symbol(char),
    Named(NamedKey),
}

impl BaseKey {
    /// Map a produced character onto a base key.
    /// Uppercase letters fold to lowercase.
    pub fn from_char(c: char) -> Option<Self> {
        if let Some(d) = c.to_digit(10) {
            return Some(Self::Digit(d as u8));
        }
        if c.is_ascii_alphabetic() {
            return Some(Self::Letter(c.to_ascii_lowercase()));
        }
        if c == ' ' {
            return Some(Self::Named(NamedKey::Space));
        }
        SYMBOLS
            .iter()
            .find(|(_, sym)| *sym == c)
            .map(|&(_, sym)| Self::Symbol(sym))
    }

    fn parse(s: &str) -> std::result::Result<Self, &'static str> {
        let mut chars = s.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            if c.is_ascii_uppercase() {
                return Err("letter keys are only accepted in lowercase");
            }
            if let Some(key) = Self::from_char(c) {
                return Ok(key);
            }
        }

        if let Some(n) = numbered(s, "F").filter(|n| (1..=24).contains(n)) {
            return Ok(Self::Function(n));
        }
        if let Some(n) = numbered(s, "Numpad").filter(|n| *n <= 9) {
            return Ok(Self::Numpad(n));
        }
        if let Some(&(_, key)) = NAMED_KEYS.iter().find(|(name, _)| *name == s) {
            return Ok(Self::Named(key));
        }
        if let Some(&(_, sym)) = SYMBOLS.iter().find(|(name, _)| *name == s) {
            return Ok(Self::Symbol(sym));
        }

        Err("unrecognised base key")
    }
}

/// Parse `F12` style tokens
fn numbered(s: &str, prefix: &str) -> Option<u8> {
    let digits = s.strip_prefix(prefix)?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

impl fmt::Display for BaseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Digit(d) => write!(f, "{}", d),
            Self::Letter(c) | Self::Symbol(c) => write!(f, "{}", c),
            Self::Function(n) => write!(f, "F{}", n),
            Self::Numpad(n) => write!(f, "Numpad{}", n),
            Self::Named(key) => {
                let name = NAMED_KEYS
                    .iter()
                    .find(|(_, k)| k == key)
                    .map(|(name, _)| *name)
                    .unwrap_or("?");
                write!(f, "{}", name)
            }
        }
    }
}

/// Identification of a specific key press including modifiers.
/// Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Keycode {
    modifiers: Modifiers,
    base: BaseKey,
}

/// What a physical key press produced, as reported by the windowing layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyInput {
    /// A character, already shift-aware (shift-8 produces `*`)
    Char(char),
    Named(NamedKey),
    Function(u8),
    Numpad(u8),
}

impl Keycode {
    pub fn new(modifiers: Modifiers, base: BaseKey) -> Self {
        Self { modifiers, base }
    }

    /// Build the keycode for a physical press.
    /// Returns `None` when the produced key has no place in the vocabulary.
    pub fn pressed(modifiers: Modifiers, input: KeyInput) -> Option<Self> {
        let base = match input {
            KeyInput::Char(c) => BaseKey::from_char(c)?,
            KeyInput::Named(key) => BaseKey::Named(key),
            KeyInput::Function(n) if (1..=24).contains(&n) => BaseKey::Function(n),
            KeyInput::Numpad(n) if n <= 9 => BaseKey::Numpad(n),
            _ => return None,
        };
        Some(Self::new(modifiers, base))
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    pub fn base(&self) -> BaseKey {
        self.base
    }
}

/// Modifier prefixes in their required order
const MODIFIER_ORDER: [&str; 4] = ["S", "C", "A", "L"];

impl FromStr for Keycode {
    type Err = EngineError;

    fn from_str(input: &str) -> Result<Self> {
        let mut s = input;
        let mut modifiers = Modifiers::NONE;

        for (i, prefix) in MODIFIER_ORDER.iter().enumerate() {
            if strip_modifier(&mut s, prefix) {
                match i {
                    0 => modifiers.shift = true,
                    1 => modifiers.ctrl = true,
                    2 => modifiers.alt = true,
                    _ => modifiers.logo = true,
                }
            }
        }

        if s.is_empty() {
            return Err(EngineError::parse(input, "missing base key"));
        }

        // A modifier left over at this point was written out of order
        if s.len() > 2 && MODIFIER_ORDER.iter().any(|m| is_modifier_prefix(s, m)) {
            return Err(EngineError::parse(
                input,
                "modifiers must appear in the order S-C-A-L",
            ));
        }

        let base = BaseKey::parse(s).map_err(|reason| EngineError::parse(input, reason))?;
        Ok(Self { modifiers, base })
    }
}

fn is_modifier_prefix(s: &str, modifier: &str) -> bool {
    s.strip_prefix(modifier)
        .is_some_and(|rest| rest.starts_with('-'))
}

/// Try to strip the modifier prefix from `s`
/// `s`: "C-f", `modifier`: "C"
/// -> `s`: "f", true
fn strip_modifier(s: &mut &str, modifier: &str) -> bool {
    const SEPARATOR: char = '-';
    if let Some(rem) = s
        .strip_prefix(modifier)
        .and_then(|s| s.strip_prefix(SEPARATOR))
    {
        *s = rem;
        true
    } else {
        false
    }
}

impl fmt::Display for Keycode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.modifiers;
        for (held, prefix) in [
            (m.shift, "S-"),
            (m.ctrl, "C-"),
            (m.alt, "A-"),
            (m.logo, "L-"),
        ] {
            if held {
                f.write_str(prefix)?;
            }
        }
        write!(f, "{}", self.base)
    }
}
