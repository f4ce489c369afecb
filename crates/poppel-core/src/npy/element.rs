//! Native element types and their dtypes
//!
//! [`ElementType`] is the one table mapping native values to dtypes; scalar
//! and buffer code paths both go through it.

use std::mem::size_of;

use super::dtype::{Dtype, Kind};

/// Complex number stored as real part followed by imaginary part
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[repr(C)]
pub struct Complex<T> {
    pub re: T,
    pub im: T,
}

impl<T> Complex<T> {
    pub fn new(re: T, im: T) -> Self {
        Self { re, im }
    }
}

pub type Complex32 = Complex<f32>;
pub type Complex64 = Complex<f64>;

/// Runtime tag for every supported element type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Complex32,
    Complex64,
}

impl ElementType {
    /// Dtype written for this element type
    ///
    /// Booleans are stored as one-byte unsigned integers.
    pub const fn dtype(self) -> Dtype {
        match self {
            ElementType::Bool => Dtype::native(Kind::UnsignedInt, 1),
            ElementType::I8 => Dtype::native(Kind::SignedInt, 1),
            ElementType::I16 => Dtype::native(Kind::SignedInt, 2),
            ElementType::I32 => Dtype::native(Kind::SignedInt, 4),
            ElementType::I64 => Dtype::native(Kind::SignedInt, 8),
            ElementType::U8 => Dtype::native(Kind::UnsignedInt, 1),
            ElementType::U16 => Dtype::native(Kind::UnsignedInt, 2),
            ElementType::U32 => Dtype::native(Kind::UnsignedInt, 4),
            ElementType::U64 => Dtype::native(Kind::UnsignedInt, 8),
            ElementType::F32 => Dtype::native(Kind::Float, 4),
            ElementType::F64 => Dtype::native(Kind::Float, 8),
            ElementType::Complex32 => Dtype::native(Kind::Complex, 8),
            ElementType::Complex64 => Dtype::native(Kind::Complex, 16),
        }
    }

    pub const fn size(self) -> usize {
        self.dtype().item_size
    }

    /// Integer type with the given width in bytes
    pub const fn integer(width: usize, signed: bool) -> ElementType {
        match (width, signed) {
            (1, true) => ElementType::I8,
            (2, true) => ElementType::I16,
            (4, true) => ElementType::I32,
            (1, false) => ElementType::U8,
            (2, false) => ElementType::U16,
            (4, false) => ElementType::U32,
            (_, true) => ElementType::I64,
            (_, false) => ElementType::U64,
        }
    }
}

/// A native value that can be stored as one array element
pub trait Element: Copy + Default {
    const TYPE: ElementType;

    /// Append the host-order bytes of this value
    fn write_ne(&self, out: &mut Vec<u8>);

    /// Read a value from exactly `Self::TYPE.size()` host-order bytes
    fn read_ne(bytes: &[u8]) -> Self;

    fn dtype() -> Dtype {
        Self::TYPE.dtype()
    }
}

macro_rules! impl_numeric_element {
    ($($ty:ty => $tag:expr),* $(,)?) => {
        $(
            impl Element for $ty {
                const TYPE: ElementType = $tag;

                fn write_ne(&self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_ne_bytes());
                }

                fn read_ne(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; size_of::<$ty>()];
                    raw.copy_from_slice(&bytes[..size_of::<$ty>()]);
                    <$ty>::from_ne_bytes(raw)
                }
            }
        )*
    };
}

impl_numeric_element! {
    i8 => ElementType::I8,
    i16 => ElementType::I16,
    i32 => ElementType::I32,
    i64 => ElementType::I64,
    u8 => ElementType::U8,
    u16 => ElementType::U16,
    u32 => ElementType::U32,
    u64 => ElementType::U64,
    f32 => ElementType::F32,
    f64 => ElementType::F64,
    isize => ElementType::integer(size_of::<isize>(), true),
    usize => ElementType::integer(size_of::<usize>(), false),
}

impl Element for bool {
    const TYPE: ElementType = ElementType::Bool;

    fn write_ne(&self, out: &mut Vec<u8>) {
        out.push(u8::from(*self));
    }

    fn read_ne(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }
}

impl Element for Complex32 {
    const TYPE: ElementType = ElementType::Complex32;

    fn write_ne(&self, out: &mut Vec<u8>) {
        self.re.write_ne(out);
        self.im.write_ne(out);
    }

    fn read_ne(bytes: &[u8]) -> Self {
        Complex::new(f32::read_ne(&bytes[..4]), f32::read_ne(&bytes[4..8]))
    }
}

impl Element for Complex64 {
    const TYPE: ElementType = ElementType::Complex64;

    fn write_ne(&self, out: &mut Vec<u8>) {
        self.re.write_ne(out);
        self.im.write_ne(out);
    }

    fn read_ne(bytes: &[u8]) -> Self {
        Complex::new(f64::read_ne(&bytes[..8]), f64::read_ne(&bytes[8..16]))
    }
}

/// Host-order bytes of a slice of elements
pub fn to_bytes<T: Element>(values: &[T]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * T::TYPE.size());
    for value in values {
        value.write_ne(&mut out);
    }
    out
}

/// Decode host-order bytes into `out`, one element per `T::TYPE.size()` bytes
///
/// `bytes` must hold at least `out.len()` elements.
pub fn decode_into<T: Element>(bytes: &[u8], out: &mut [T]) {
    let size = T::TYPE.size();
    for (slot, chunk) in out.iter_mut().zip(bytes.chunks_exact(size)) {
        *slot = T::read_ne(chunk);
    }
}

/// Decode host-order bytes into a new vector
pub fn from_bytes<T: Element>(bytes: &[u8]) -> Vec<T> {
    bytes
        .chunks_exact(T::TYPE.size())
        .map(T::read_ne)
        .collect()
}
