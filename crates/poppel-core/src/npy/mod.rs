//! NumPy `.npy` array codec
//!
//! Stream functions work on any `Read`/`Write`; the `*_path` variants open
//! the backing file and attach its path to errors. Writes always produce
//! format version 3.0.

pub mod dtype;
pub mod element;
pub mod header;

use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::Path;

use crate::error::{PoppelError, Result};
use crate::persistence::atomic_write;

pub use dtype::{ByteOrder, Dtype, Kind};
pub use element::{Complex, Complex32, Complex64, Element, ElementType};
pub use header::{Header, Version};

/// A header together with its raw payload bytes
#[derive(Debug, Clone, PartialEq)]
pub struct NpyArray {
    pub header: Header,
    pub data: Vec<u8>,
}

fn check_payload_len(header: &Header, len: usize) -> Result<()> {
    let expected = header.num_bytes()?;
    if expected != len {
        return Err(PoppelError::FormatMismatch {
            expected: format!("{} bytes for {}", expected, header),
            found: format!("{} bytes", len),
        });
    }
    Ok(())
}

/// Write a complete array: preamble, header text and payload
pub fn save<W: Write>(writer: &mut W, header: &Header, data: &[u8]) -> Result<()> {
    check_payload_len(header, data.len())?;
    header::write_preamble_and_text(writer, header)?;
    writer.write_all(data)?;
    Ok(())
}

/// Read only the header; the reader is left at the start of the payload
pub fn load_header<R: Read>(reader: &mut R) -> Result<Header> {
    header::read_header(reader)
}

/// Read an array whose header must equal `expected`, filling `buffer`
pub fn load_into<R: Read>(reader: &mut R, expected: &Header, buffer: &mut [u8]) -> Result<()> {
    let found = header::read_header(reader)?;
    if &found != expected {
        return Err(PoppelError::FormatMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        });
    }
    check_payload_len(&found, buffer.len())?;
    reader.read_exact(buffer)?;
    Ok(())
}

/// Read an array, sizing the payload buffer from its header
///
/// The buffer grows with the bytes actually read, so a header claiming more
/// data than the stream holds fails with an I/O error.
pub fn load<R: Read>(reader: &mut R) -> Result<NpyArray> {
    let header = header::read_header(reader)?;
    let expected = header.num_bytes()?;

    let mut data = Vec::new();
    reader.take(expected as u64).read_to_end(&mut data)?;
    if data.len() != expected {
        return Err(PoppelError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("payload has {} of {} bytes", data.len(), expected),
        )));
    }
    Ok(NpyArray { header, data })
}

fn open(path: &Path) -> Result<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| PoppelError::read(e, path))
}

/// Write an array file atomically
pub fn save_path(path: &Path, header: &Header, data: &[u8]) -> Result<()> {
    let mut encoded = Vec::with_capacity(data.len() + header::HEADER_ALIGNMENT);
    save(&mut encoded, header, data)?;
    atomic_write(path, &encoded)
}

pub fn load_header_path(path: &Path) -> Result<Header> {
    load_header(&mut open(path)?).map_err(|e| e.at_path(path))
}

pub fn load_path(path: &Path) -> Result<NpyArray> {
    load(&mut open(path)?).map_err(|e| e.at_path(path))
}

pub fn load_into_path(path: &Path, expected: &Header, buffer: &mut [u8]) -> Result<()> {
    load_into(&mut open(path)?, expected, buffer).map_err(|e| e.at_path(path))
}
