//! Decoder leniency flags.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Bit flags that relax how response bodies and stream frames are decoded.
///
/// None of the flags can turn a missing required field into a success.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ParsingOptions(u8);

impl ParsingOptions {
    /// Strict decoding.
    pub const NONE: Self = Self(0);

    /// Decode 2xx bodies as JSON even when `content-type` names another media type.
    pub const LENIENT_CONTENT_TYPE: Self = Self(1 << 0);

    /// Decode an empty 2xx body as JSON `null`.
    pub const EMPTY_BODY_AS_NULL: Self = Self(1 << 1);

    /// Remove explicit `null` object members before decoding.
    pub const STRIP_NULL_FIELDS: Self = Self(1 << 2);

    /// Deliver undecodable stream frames as per-frame errors and keep the
    /// session open instead of terminating it.
    pub const SKIP_MALFORMED_FRAMES: Self = Self(1 << 3);

    const ALL: [(Self, &'static str); 4] = [
        (Self::LENIENT_CONTENT_TYPE, "LENIENT_CONTENT_TYPE"),
        (Self::EMPTY_BODY_AS_NULL, "EMPTY_BODY_AS_NULL"),
        (Self::STRIP_NULL_FIELDS, "STRIP_NULL_FIELDS"),
        (Self::SKIP_MALFORMED_FRAMES, "SKIP_MALFORMED_FRAMES"),
    ];

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Parse a comma separated list of flag names (as used by `from_env`).
    /// Unknown names are returned as the error value.
    pub fn parse_list(list: &str) -> Result<Self, String> {
        let mut out = Self::NONE;
        for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let flag = Self::ALL
                .iter()
                .find(|(_, n)| n.eq_ignore_ascii_case(name))
                .map(|(f, _)| *f)
                .ok_or_else(|| name.to_string())?;
            out.insert(flag);
        }
        Ok(out)
    }
}

impl BitOr for ParsingOptions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOrAssign for ParsingOptions {
    fn bitor_assign(&mut self, rhs: Self) {
        self.insert(rhs);
    }
}

impl fmt::Debug for ParsingOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = Self::ALL
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "ParsingOptions({})", names.join(" | "))
    }
}
