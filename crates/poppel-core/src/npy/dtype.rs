//! Array element descriptions (`descr` strings such as `<f8` or `|u1`)

use std::fmt;

use crate::error::{PoppelError, Result};

/// Byte order marker of a dtype
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ByteOrder {
    Little,
    Big,
    /// Single-byte and other order-free kinds
    NotApplicable,
}

impl ByteOrder {
    /// Byte order of the host
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        }
    }

    pub fn as_char(self) -> char {
        match self {
            ByteOrder::Little => '<',
            ByteOrder::Big => '>',
            ByteOrder::NotApplicable => '|',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '<' => Some(ByteOrder::Little),
            '>' => Some(ByteOrder::Big),
            '|' => Some(ByteOrder::NotApplicable),
            _ => None,
        }
    }
}

/// Element kind letter of a dtype
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    SignedInt,
    UnsignedInt,
    Float,
    Complex,
    /// UTF-32 text; the size digit counts characters
    Unicode,
}

impl Kind {
    pub fn as_char(self) -> char {
        match self {
            Kind::SignedInt => 'i',
            Kind::UnsignedInt => 'u',
            Kind::Float => 'f',
            Kind::Complex => 'c',
            Kind::Unicode => 'U',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'i' => Some(Kind::SignedInt),
            'u' => Some(Kind::UnsignedInt),
            'f' => Some(Kind::Float),
            'c' => Some(Kind::Complex),
            'U' => Some(Kind::Unicode),
            _ => None,
        }
    }

    /// Factor between the size digit in `descr` and the byte width
    pub fn size_multiplier(self) -> usize {
        match self {
            Kind::Unicode => 4,
            _ => 1,
        }
    }
}

/// Element type of an array: byte order, kind and byte width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dtype {
    pub byte_order: ByteOrder,
    pub kind: Kind,
    /// Width of one element in bytes
    pub item_size: usize,
}

impl Dtype {
    pub const fn new(byte_order: ByteOrder, kind: Kind, item_size: usize) -> Self {
        Self {
            byte_order,
            kind,
            item_size,
        }
    }

    /// Dtype for a numeric kind stored in host byte order
    ///
    /// Single-byte elements get the order-free marker.
    pub const fn native(kind: Kind, item_size: usize) -> Self {
        let byte_order = if item_size == 1 {
            ByteOrder::NotApplicable
        } else {
            ByteOrder::native()
        };
        Self::new(byte_order, kind, item_size)
    }

    /// The `descr` string without quotes, e.g. `<f8`
    pub fn descr(&self) -> String {
        format!(
            "{}{}{}",
            self.byte_order.as_char(),
            self.kind.as_char(),
            self.item_size / self.kind.size_multiplier()
        )
    }

    /// Parse a `descr` string without quotes
    pub fn parse_descr(descr: &str) -> Result<Self> {
        let invalid =
            |why: &str| PoppelError::format(format!("invalid descr '{}': {}", descr, why));

        let mut chars = descr.chars();
        let byte_order = chars
            .next()
            .and_then(ByteOrder::from_char)
            .ok_or_else(|| invalid("unknown byte order"))?;
        let kind = chars
            .next()
            .and_then(Kind::from_char)
            .ok_or_else(|| invalid("unknown kind"))?;

        let digits = chars.as_str();
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("bad item size"));
        }
        let count: usize = digits.parse().map_err(|_| invalid("bad item size"))?;

        let item_size = count
            .checked_mul(kind.size_multiplier())
            .ok_or_else(|| invalid("item size too large"))?;

        Ok(Self::new(byte_order, kind, item_size))
    }
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.descr())
    }
}
