//! Hotkey specs parsed from the config file.
//!
//! The event tap that actually captures key events lives outside this
//! crate; it matches incoming events against these specs and delivers
//! the bound action to the core.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Modifiers {
    pub cmd: bool,
    pub alt: bool,
    pub ctrl: bool,
    pub shift: bool,
}

impl Modifiers {
    pub const HYPER: Modifiers = Modifiers {
        cmd: true,
        alt: true,
        ctrl: true,
        shift: true,
    };

    pub fn with_shift(mut self) -> Modifiers {
        self.shift = true;
        self
    }

    pub fn is_empty(&self) -> bool { !(self.cmd || self.alt || self.ctrl || self.shift) }
}

impl fmt::Display for Modifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.cmd {
            parts.push("cmd");
        }
        if self.alt {
            parts.push("alt");
        }
        if self.ctrl {
            parts.push("ctrl");
        }
        if self.shift {
            parts.push("shift");
        }
        write!(f, "{}", parts.join("+"))
    }
}

/// A modifier set plus a named key, e.g. `cmd+alt, h`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hotkey {
    pub mods: Modifiers,
    pub key: String,
}

impl Hotkey {
    pub fn new(mods: Modifiers, key: impl Into<String>) -> Self {
        Hotkey {
            mods,
            key: key.into().to_lowercase(),
        }
    }
}

impl fmt::Display for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.mods.is_empty() {
            write!(f, "{}", self.key)
        } else {
            write!(f, "{}+{}", self.mods, self.key)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseHotkeyError(pub String);

impl fmt::Display for ParseHotkeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid hotkey: {}", self.0)
    }
}

impl std::error::Error for ParseHotkeyError {}

impl FromStr for Modifiers {
    type Err = ParseHotkeyError;

    /// Parse `cmd+alt`, `hyper`, `ctrl`, ... Empty input is an empty set.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut mods = Modifiers::default();
        for part in s.split('+').map(str::trim).filter(|p| !p.is_empty()) {
            match part.to_lowercase().as_str() {
                "cmd" | "command" | "super" | "meta" => mods.cmd = true,
                "alt" | "option" | "opt" => mods.alt = true,
                "ctrl" | "control" => mods.ctrl = true,
                "shift" => mods.shift = true,
                "hyper" => mods = Modifiers::HYPER,
                other => return Err(ParseHotkeyError(format!("unknown modifier '{other}'"))),
            }
        }
        Ok(mods)
    }
}

/// Parse the `mods, key` half of a binding line.
pub fn parse_hotkey(spec: &str) -> Result<Hotkey, ParseHotkeyError> {
    let (mods_str, key) = match spec.rsplit_once(',') {
        Some((mods, key)) => (mods.trim(), key.trim()),
        None => ("", spec.trim()),
    };
    if key.is_empty() {
        return Err(ParseHotkeyError(format!("missing key in '{spec}'")));
    }
    let mods = mods_str.parse::<Modifiers>()?;
    Ok(Hotkey::new(mods, key))
}
