//! POSIX-style permission bits.
//!
//! A [`FileMode`] holds three triads (owner, group, other), each a set of
//! [`Access`] bits. Only the low nine bits are meaningful; setuid/sticky and
//! friends do not exist here.

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use thiserror::Error;

bitflags! {
    /// One triad of permission bits, laid out like a single octal digit.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Access: u8 {
        const READ = 0b100;
        const WRITE = 0b010;
        const EXECUTE = 0b001;
    }
}

impl Access {
    fn symbolic(self) -> [char; 3] {
        [
            if self.contains(Access::READ) { 'r' } else { '-' },
            if self.contains(Access::WRITE) { 'w' } else { '-' },
            if self.contains(Access::EXECUTE) { 'x' } else { '-' },
        ]
    }
}

/// Which triad of a mode applies to a principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Class {
    Owner,
    Group,
    Other,
}

impl Class {
    fn shift(self) -> u16 {
        match self {
            Class::Owner => 6,
            Class::Group => 3,
            Class::Other => 0,
        }
    }
}

/// Error parsing an octal mode string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid file mode: {0:?}")]
pub struct ModeParseError(pub String);

/// Owner / group / other permission bits.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileMode(u16);

impl FileMode {
    /// `rwxr-xr-x`, the default for new directories.
    pub const DIRECTORY: FileMode = FileMode(0o755);
    /// `rw-r--r--`, the default for new files.
    pub const FILE: FileMode = FileMode(0o644);

    /// Build a mode from raw bits; anything above `0o777` is dropped.
    pub const fn new(bits: u16) -> Self {
        Self(bits & 0o777)
    }

    /// The raw nine permission bits.
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// The triad for one class.
    pub fn triad(self, class: Class) -> Access {
        Access::from_bits_truncate(((self.0 >> class.shift()) & 0o7) as u8)
    }

    /// Whether `class` has every bit in `access`.
    pub fn allows(self, class: Class, access: Access) -> bool {
        self.triad(class).contains(access)
    }
}

impl Default for FileMode {
    fn default() -> Self {
        Self::FILE
    }
}

impl From<u16> for FileMode {
    fn from(bits: u16) -> Self {
        Self::new(bits)
    }
}

/// Parses octal notation: `"755"`, `"0755"`, or `"0o755"`.
impl FromStr for FileMode {
    type Err = ModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim();
        let digits = digits.strip_prefix("0o").unwrap_or(digits);
        if digits.is_empty() || digits.len() > 4 {
            return Err(ModeParseError(s.to_string()));
        }
        match u16::from_str_radix(digits, 8) {
            Ok(bits) if bits <= 0o777 => Ok(Self(bits)),
            _ => Err(ModeParseError(s.to_string())),
        }
    }
}

/// Symbolic form, e.g. `rwxr-x---`.
impl fmt::Display for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for class in [Class::Owner, Class::Group, Class::Other] {
            for c in self.triad(class).symbolic() {
                write!(f, "{c}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for FileMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileMode({:#o})", self.0)
    }
}
