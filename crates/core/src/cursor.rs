//! Opaque pagination cursors.
//!
//! On the wire a cursor is a plain string: `""` starts a listing, `"eof"`
//! marks it exhausted, and anything else is the decimal offset of the next
//! row to deliver.

use crate::error::{Error, ErrorKind};
use std::fmt;
use std::str::FromStr;

const BEGIN: &str = "";
const END: &str = "eof";
/// Offsets are bound as SQLite integers.
const MAX_OFFSET: u64 = i64::MAX as u64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Cursor {
    #[default]
    Begin,
    Offset(u64),
    End,
}

impl Cursor {
    /// Row offset this cursor resumes at, or `None` once exhausted.
    pub fn offset(&self) -> Option<u64> {
        match self {
            Self::Begin => Some(0),
            Self::Offset(offset) => Some(*offset),
            Self::End => None,
        }
    }

    pub fn is_end(&self) -> bool {
        matches!(self, Self::End)
    }
}

impl FromStr for Cursor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            BEGIN => Ok(Self::Begin),
            END => Ok(Self::End),
            // `u64::from_str` would also accept a leading `+`.
            digits if digits.bytes().all(|b| b.is_ascii_digit()) => digits
                .parse::<u64>()
                .ok()
                .filter(|offset| *offset <= MAX_OFFSET)
                .map(Self::Offset)
                .ok_or_else(|| exn::Exn::from(ErrorKind::Validation(format!("cursor `{s}` is out of range")))),
            _ => exn::bail!(ErrorKind::Validation(format!("cursor `{s}` is not an offset"))),
        }
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Begin => f.write_str(BEGIN),
            Self::Offset(offset) => write!(f, "{offset}"),
            Self::End => f.write_str(END),
        }
    }
}
