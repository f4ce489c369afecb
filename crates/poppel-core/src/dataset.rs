//! Dataset payload I/O
//!
//! A dataset node keeps its array in `data.npy` inside the node directory.
//! Every operation checks the open state and the node type before the codec
//! is touched, so a rejected call never reads or writes the payload.

use std::path::PathBuf;

use tracing::debug;

use crate::error::{PoppelError, Result};
use crate::node::{DatasetDescriptor, Node};
use crate::npy::dtype::{ByteOrder, Kind};
use crate::npy::element::{self, Complex32, Complex64, Element};
use crate::npy::{self as codec, Dtype, Header, NpyArray};
use crate::path::ensure_dataset;
use crate::state::OpenStateHandle;

/// Name of the payload file inside a dataset directory
pub const PAYLOAD_FILE: &str = "data.npy";

/// A value whose dtype and shape follow from the value itself
pub trait Payload {
    fn encode(&self) -> (Header, Vec<u8>);
}

/// A value that can be rebuilt from a stored array
pub trait FromPayload: Sized {
    fn decode(array: NpyArray) -> Result<Self>;
}

fn mismatch(expected: &Header, found: &Header) -> PoppelError {
    PoppelError::FormatMismatch {
        expected: expected.to_string(),
        found: found.to_string(),
    }
}

/// Check dtype and dimensionality; memory order is irrelevant below 2-D
fn expect_layout(found: &Header, dtype: Dtype, ndim: usize) -> Result<()> {
    if found.dtype != dtype || found.shape.len() != ndim {
        let shape = if ndim == 0 { vec![] } else { vec![found.len()?] };
        return Err(mismatch(&Header::new(dtype, false, shape), found));
    }
    Ok(())
}

macro_rules! impl_scalar_payload {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Payload for $ty {
                fn encode(&self) -> (Header, Vec<u8>) {
                    (
                        Header::new(<$ty as Element>::dtype(), false, Vec::new()),
                        element::to_bytes(std::slice::from_ref(self)),
                    )
                }
            }

            impl FromPayload for $ty {
                fn decode(array: NpyArray) -> Result<Self> {
                    expect_layout(&array.header, <$ty as Element>::dtype(), 0)?;
                    Ok(<$ty as Element>::read_ne(&array.data))
                }
            }
        )*
    };
}

impl_scalar_payload!(
    bool, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, Complex32, Complex64,
);

impl<T: Element> Payload for [T] {
    fn encode(&self) -> (Header, Vec<u8>) {
        (
            Header::new(T::dtype(), false, vec![self.len()]),
            element::to_bytes(self),
        )
    }
}

impl<T: Element> Payload for Vec<T> {
    fn encode(&self) -> (Header, Vec<u8>) {
        self.as_slice().encode()
    }
}

impl<T: Element> FromPayload for Vec<T> {
    fn decode(array: NpyArray) -> Result<Self> {
        expect_layout(&array.header, T::dtype(), 1)?;
        Ok(element::from_bytes(&array.data))
    }
}

/// Strings are stored as a 1-D array of UTF-8 bytes
impl Payload for str {
    fn encode(&self) -> (Header, Vec<u8>) {
        (
            Header::new(i8::dtype(), false, vec![self.len()]),
            self.as_bytes().to_vec(),
        )
    }
}

impl Payload for String {
    fn encode(&self) -> (Header, Vec<u8>) {
        self.as_str().encode()
    }
}

impl FromPayload for String {
    fn decode(array: NpyArray) -> Result<Self> {
        let header = &array.header;
        match (header.dtype.kind, header.dtype.item_size, header.shape.as_slice()) {
            (Kind::SignedInt | Kind::UnsignedInt, 1, [_]) => String::from_utf8(array.data)
                .map_err(|_| PoppelError::format("string payload is not valid UTF-8")),
            (Kind::Unicode, _, [] | [1]) => decode_utf32(header.dtype.byte_order, &array.data),
            _ => Err(mismatch(
                &Header::new(i8::dtype(), false, vec![array.data.len()]),
                header,
            )),
        }
    }
}

/// Decode a fixed-width UTF-32 string, dropping trailing NUL padding
fn decode_utf32(byte_order: ByteOrder, data: &[u8]) -> Result<String> {
    let mut text: String = data
        .chunks_exact(4)
        .map(|chunk| {
            let raw = [chunk[0], chunk[1], chunk[2], chunk[3]];
            let code = match byte_order {
                ByteOrder::Big => u32::from_be_bytes(raw),
                ByteOrder::Little => u32::from_le_bytes(raw),
                ByteOrder::NotApplicable => u32::from_ne_bytes(raw),
            };
            char::from_u32(code)
                .ok_or_else(|| PoppelError::format(format!("invalid code point {:#x}", code)))
        })
        .collect::<Result<_>>()?;

    let trimmed = text.trim_end_matches('\0').len();
    text.truncate(trimmed);
    Ok(text)
}

fn payload_path(node: &Node) -> PathBuf {
    node.path().join(PAYLOAD_FILE)
}

/// Header of the stored array
pub fn dataset_header(node: &Node, state: &OpenStateHandle) -> Result<Header> {
    state.ensure_open()?;
    ensure_dataset(node)?;
    codec::load_header_path(&payload_path(node))
}

/// Shape and layout of the stored array, read live from its header
pub fn dataset_descriptor(node: &Node, state: &OpenStateHandle) -> Result<DatasetDescriptor> {
    let header = dataset_header(node, state)?;
    Ok(DatasetDescriptor {
        word_size: header.dtype.item_size,
        fortran_order: header.fortran_order,
        shape: header.shape,
    })
}

/// Load a convenience value whose type fixes the expected dtype and rank
pub fn load_value<V: FromPayload>(node: &Node, state: &OpenStateHandle) -> Result<V> {
    state.ensure_open()?;
    ensure_dataset(node)?;
    V::decode(codec::load_path(&payload_path(node))?)
}

/// Replace the stored array with `value`
pub fn save_value<V: Payload + ?Sized>(
    node: &Node,
    state: &OpenStateHandle,
    value: &V,
) -> Result<()> {
    state.ensure_writable()?;
    ensure_dataset(node)?;

    let (header, data) = value.encode();
    codec::save_path(&payload_path(node), &header, &data)?;
    debug!("Saved {} to {:?}", header, node.path());
    Ok(())
}

/// Load into a caller-provided buffer with explicit shape and memory order
///
/// With `reshape` set, any stored shape with the same element count is
/// accepted; dtype and memory order must still match.
pub fn load_raw<T: Element>(
    node: &Node,
    state: &OpenStateHandle,
    buffer: &mut [T],
    fortran_order: bool,
    shape: &[usize],
    reshape: bool,
) -> Result<()> {
    state.ensure_open()?;
    ensure_dataset(node)?;

    let path = payload_path(node);
    let mut expected = Header::new(T::dtype(), fortran_order, shape.to_vec());
    let count = expected.len()?;
    if count != buffer.len() {
        return Err(PoppelError::FormatMismatch {
            expected: format!("{} elements for shape {:?}", count, shape),
            found: format!("buffer of {} elements", buffer.len()),
        });
    }

    if reshape {
        let found = codec::load_header_path(&path)?;
        if found.dtype != expected.dtype
            || found.fortran_order != expected.fortran_order
            || found.len()? != count
        {
            return Err(mismatch(&expected, &found));
        }
        expected = found;
    }

    let mut bytes = vec![0u8; expected.num_bytes()?];
    codec::load_into_path(&path, &expected, &mut bytes)?;
    element::decode_into(&bytes, buffer);
    Ok(())
}

/// Store a caller-provided buffer with explicit shape and memory order
pub fn save_raw<T: Element>(
    node: &Node,
    state: &OpenStateHandle,
    buffer: &[T],
    fortran_order: bool,
    shape: &[usize],
) -> Result<()> {
    state.ensure_writable()?;
    ensure_dataset(node)?;

    let header = Header::new(T::dtype(), fortran_order, shape.to_vec());
    codec::save_path(&payload_path(node), &header, &element::to_bytes(buffer))?;
    debug!("Saved {} to {:?}", header, node.path());
    Ok(())
}
