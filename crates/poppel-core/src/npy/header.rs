//! `.npy` preamble and header text
//!
//! Layout:
//!
//! ```text
//! \x93NUMPY | major | minor | HEADER_LEN (u16 LE for 1.0, u32 LE otherwise)
//! {'descr': '<f8', 'fortran_order': False, 'shape': (2, 3), }    ...\n
//! ```
//!
//! The header text is padded with spaces and ends in a newline so that the
//! preamble plus the text is a multiple of 64 bytes.

use std::fmt;
use std::io::{Read, Write};

use tracing::warn;

use super::dtype::Dtype;
use crate::error::{PoppelError, Result};

pub const MAGIC: &[u8; 6] = b"\x93NUMPY";

/// Alignment of the preamble plus header text
pub const HEADER_ALIGNMENT: usize = 64;

/// Format version of an array file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
}

impl Version {
    pub const V1_0: Version = Version { major: 1, minor: 0 };
    pub const V2_0: Version = Version { major: 2, minor: 0 };
    pub const V3_0: Version = Version { major: 3, minor: 0 };

    /// Version emitted by every write
    pub const WRITE: Version = Self::V3_0;

    pub fn is_supported(self) -> bool {
        matches!(self, Self::V1_0 | Self::V2_0 | Self::V3_0)
    }

    /// Width of the header length field in bytes
    pub fn length_field_size(self) -> usize {
        if self.major == 1 {
            2
        } else {
            4
        }
    }

    /// Magic, version bytes and length field
    pub fn preamble_len(self) -> usize {
        MAGIC.len() + 2 + self.length_field_size()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Everything needed to interpret an array payload
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Header {
    pub dtype: Dtype,
    /// Column-major (first axis fastest) when set
    pub fortran_order: bool,
    /// Empty for a 0-dimensional scalar
    pub shape: Vec<usize>,
}

impl Header {
    pub fn new(dtype: Dtype, fortran_order: bool, shape: Vec<usize>) -> Self {
        Self {
            dtype,
            fortran_order,
            shape,
        }
    }

    /// Number of elements; a scalar has one
    ///
    /// Fails with a format error when the shape overflows `usize`.
    pub fn len(&self) -> Result<usize> {
        self.shape
            .iter()
            .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
            .ok_or_else(|| PoppelError::format(format!("shape {:?} is too large", self.shape)))
    }

    pub fn is_empty(&self) -> bool {
        self.shape.contains(&0)
    }

    /// Payload size in bytes
    pub fn num_bytes(&self) -> Result<usize> {
        self.len()?
            .checked_mul(self.dtype.item_size)
            .ok_or_else(|| PoppelError::format(format!("payload of {} is too large", self)))
    }

    /// Header text including padding and the trailing newline
    pub fn to_text(&self, version: Version) -> String {
        let mut text = format!(
            "{{'descr': '{}', 'fortran_order': {}, 'shape': ({}), }}",
            self.dtype.descr(),
            if self.fortran_order { "True" } else { "False" },
            format_shape(&self.shape),
        );

        let unpadded = version.preamble_len() + text.len() + 1;
        let padding = (HEADER_ALIGNMENT - unpadded % HEADER_ALIGNMENT) % HEADER_ALIGNMENT;
        text.extend(std::iter::repeat(' ').take(padding));
        text.push('\n');
        text
    }

    /// Parse header text as stored after the preamble
    pub fn parse_text(text: &str) -> Result<Self> {
        let body = text
            .strip_suffix('\n')
            .ok_or_else(|| PoppelError::format("header is not terminated by a newline"))?
            .trim_matches(|c| c == ' ' || c == '\t');

        let body = body
            .strip_prefix('{')
            .and_then(|b| b.strip_suffix('}'))
            .ok_or_else(|| PoppelError::format("header is not a dictionary literal"))?;

        let descr = quoted_value(value_after_key(body, "descr")?)?;
        let dtype = Dtype::parse_descr(descr)?;

        let fortran_order = match value_after_key(body, "fortran_order")? {
            v if v.starts_with("True") => true,
            v if v.starts_with("False") => false,
            _ => return Err(PoppelError::format("fortran_order is not a boolean")),
        };

        let shape = parse_shape(value_after_key(body, "shape")?)?;

        Ok(Self::new(dtype, fortran_order, shape))
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}-order ({})",
            self.dtype,
            if self.fortran_order { "F" } else { "C" },
            format_shape(&self.shape)
        )
    }
}

/// Shape tuple contents without parentheses; 1-tuples keep a trailing comma
fn format_shape(shape: &[usize]) -> String {
    match shape {
        [] => String::new(),
        [only] => format!("{},", only),
        _ => shape
            .iter()
            .map(usize::to_string)
            .collect::<Vec<_>>()
            .join(", "),
    }
}

/// Text following `'key':`, with leading whitespace removed
fn value_after_key<'a>(body: &'a str, key: &str) -> Result<&'a str> {
    for quote in ['\'', '"'] {
        let needle = format!("{quote}{key}{quote}");
        if let Some(pos) = body.find(&needle) {
            let rest = body[pos + needle.len()..].trim_start();
            if let Some(value) = rest.strip_prefix(':') {
                return Ok(value.trim_start());
            }
        }
    }
    Err(PoppelError::format(format!("missing key '{}' in header", key)))
}

fn quoted_value(value: &str) -> Result<&str> {
    let mut chars = value.chars();
    let quote = match chars.next() {
        Some(q @ ('\'' | '"')) => q,
        _ => return Err(PoppelError::format("descr is not a string")),
    };
    let rest = chars.as_str();
    let end = rest
        .find(quote)
        .ok_or_else(|| PoppelError::format("unterminated descr string"))?;
    Ok(&rest[..end])
}

fn parse_shape(value: &str) -> Result<Vec<usize>> {
    let inner = value
        .strip_prefix('(')
        .and_then(|v| v.find(')').map(|end| &v[..end]))
        .ok_or_else(|| PoppelError::format("shape is not a tuple"))?;

    let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
    let mut shape = Vec::with_capacity(parts.len());
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            // Only "()" and a trailing comma leave empty parts.
            if i + 1 == parts.len() {
                continue;
            }
            return Err(PoppelError::format("empty dimension in shape"));
        }
        let dim = part
            .parse::<usize>()
            .map_err(|_| PoppelError::format(format!("invalid dimension '{}' in shape", part)))?;
        shape.push(dim);
    }
    Ok(shape)
}

/// Write magic, version and header length, then the header text
pub fn write_preamble_and_text<W: Write>(writer: &mut W, header: &Header) -> Result<usize> {
    let version = Version::WRITE;
    let text = header.to_text(version);
    let length = u32::try_from(text.len())
        .map_err(|_| PoppelError::format("header text is too long"))?;

    writer.write_all(MAGIC)?;
    writer.write_all(&[version.major, version.minor])?;
    writer.write_all(&length.to_le_bytes())?;
    writer.write_all(text.as_bytes())?;
    Ok(version.preamble_len() + text.len())
}

/// Read and check magic and version, returning the version and header length
pub fn read_preamble<R: Read>(reader: &mut R) -> Result<(Version, usize)> {
    let mut lead = [0u8; 8];
    reader.read_exact(&mut lead)?;

    if &lead[..6] != MAGIC {
        return Err(PoppelError::format("not an npy file (bad magic)"));
    }

    let version = Version {
        major: lead[6],
        minor: lead[7],
    };
    if !version.is_supported() {
        return Err(PoppelError::UnsupportedVersion {
            what: "npy format",
            version: version.to_string(),
        });
    }

    let length = if version.length_field_size() == 2 {
        let mut raw = [0u8; 2];
        reader.read_exact(&mut raw)?;
        u16::from_le_bytes(raw) as usize
    } else {
        let mut raw = [0u8; 4];
        reader.read_exact(&mut raw)?;
        u32::from_le_bytes(raw) as usize
    };

    Ok((version, length))
}

/// Read the preamble and parse the header text that follows it
pub fn read_header<R: Read>(reader: &mut R) -> Result<Header> {
    let (version, length) = read_preamble(reader)?;

    if (version.preamble_len() + length) % HEADER_ALIGNMENT != 0 {
        warn!(
            "npy header of version {} is not {}-byte aligned ({} bytes)",
            version,
            HEADER_ALIGNMENT,
            version.preamble_len() + length
        );
    }

    let mut raw = vec![0u8; length];
    reader.read_exact(&mut raw)?;
    let text =
        String::from_utf8(raw).map_err(|_| PoppelError::format("header text is not UTF-8"))?;

    let header = Header::parse_text(&text)?;
    header.num_bytes()?;
    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::npy::dtype::{ByteOrder, Kind};
    use proptest::prelude::*;

    fn f8(shape: Vec<usize>) -> Header {
        Header::new(
            Dtype::new(ByteOrder::Little, Kind::Float, 8),
            false,
            shape,
        )
    }

    #[test]
    fn test_header_text_layout() {
        let text = f8(vec![2, 3]).to_text(Version::V3_0);
        assert!(text.starts_with("{'descr': '<f8', 'fortran_order': False, 'shape': (2, 3), }"));
        assert!(text.ends_with('\n'));
        assert_eq!((Version::V3_0.preamble_len() + text.len()) % 64, 0);
    }

    #[test]
    fn test_shape_formatting() {
        assert!(f8(vec![]).to_text(Version::V3_0).contains("'shape': ()"));
        assert!(f8(vec![5]).to_text(Version::V3_0).contains("'shape': (5,)"));
        assert!(f8(vec![1, 2, 3])
            .to_text(Version::V3_0)
            .contains("'shape': (1, 2, 3)"));
    }

    #[test]
    fn test_parse_numpy_written_header() {
        let text = "{'descr': '>i2', 'fortran_order': True, 'shape': (4,), }          \n";
        let header = Header::parse_text(text).unwrap();
        assert_eq!(header.dtype.descr(), ">i2");
        assert!(header.fortran_order);
        assert_eq!(header.shape, vec![4]);
    }

    #[test]
    fn test_parse_tolerates_key_order_and_quotes() {
        let text = "{\"shape\": (), \"fortran_order\": False, \"descr\": \"<U3\"}\n";
        let header = Header::parse_text(text).unwrap();
        assert_eq!(header.dtype.kind, Kind::Unicode);
        assert_eq!(header.dtype.item_size, 12);
        assert!(header.shape.is_empty());
        assert_eq!(header.len().unwrap(), 1);
    }

    #[test]
    fn test_parse_errors() {
        let cases = [
            "{'descr': '<f8', 'fortran_order': False, 'shape': (2,), }",
            "{'fortran_order': False, 'shape': (2,), }\n",
            "{'descr': '<f8', 'shape': (2,), }\n",
            "{'descr': '<f8', 'fortran_order': False, }\n",
            "{'descr': '<f8', 'fortran_order': maybe, 'shape': (2,), }\n",
            "{'descr': '<f8', 'fortran_order': False, 'shape': (2, x), }\n",
            "{'descr': '<f8', 'fortran_order': False, 'shape': (2,,3), }\n",
            "{'descr': '<f8', 'fortran_order': False, 'shape': 2, }\n",
            "'descr': '<f8'\n",
        ];
        for text in cases {
            let err = Header::parse_text(text).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Format, "text {:?}", text);
        }
    }

    #[test]
    fn test_preamble_versions() {
        let body = f8(vec![3]).to_text(Version::V1_0);

        let mut v1 = Vec::new();
        v1.extend_from_slice(MAGIC);
        v1.extend_from_slice(&[1, 0]);
        v1.extend_from_slice(&(body.len() as u16).to_le_bytes());
        v1.extend_from_slice(body.as_bytes());
        assert_eq!(v1.len() % 64, 0);
        assert_eq!(read_header(&mut v1.as_slice()).unwrap(), f8(vec![3]));

        let body = f8(vec![3]).to_text(Version::V2_0);
        let mut v2 = Vec::new();
        v2.extend_from_slice(MAGIC);
        v2.extend_from_slice(&[2, 0]);
        v2.extend_from_slice(&(body.len() as u32).to_le_bytes());
        v2.extend_from_slice(body.as_bytes());
        assert_eq!(read_header(&mut v2.as_slice()).unwrap(), f8(vec![3]));
    }

    #[test]
    fn test_written_preamble() {
        let mut out = Vec::new();
        let written = write_preamble_and_text(&mut out, &f8(vec![7])).unwrap();
        assert_eq!(written, out.len());
        assert_eq!(&out[..6], MAGIC);
        assert_eq!(&out[6..8], &[3, 0]);
        let length = u32::from_le_bytes([out[8], out[9], out[10], out[11]]) as usize;
        assert_eq!(length + 12, out.len());
        assert_eq!(out.len() % 64, 0);
    }

    #[test]
    fn test_bad_magic_and_version() {
        let err = read_header(&mut &b"\x93NUMPZ\x03\x00\x00\x00\x00\x00"[..]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);

        let err = read_header(&mut &b"\x93NUMPY\x04\x00\x00\x00\x00\x00"[..]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedVersion);

        let err = read_header(&mut &b"\x93NUMPY\x01\x01\x00\x00"[..]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedVersion);
    }

    #[test]
    fn test_truncated_header_is_io() {
        let mut out = Vec::new();
        write_preamble_and_text(&mut out, &f8(vec![7])).unwrap();
        out.truncate(20);
        let err = read_header(&mut out.as_slice()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_element_count_overflow() {
        let header = f8(vec![usize::MAX, 2]);
        assert_eq!(header.len().unwrap_err().kind(), ErrorKind::Format);
        assert!(!header.is_empty());

        let header = f8(vec![usize::MAX / 4]);
        assert_eq!(header.len().unwrap(), usize::MAX / 4);
        assert_eq!(header.num_bytes().unwrap_err().kind(), ErrorKind::Format);

        assert!(f8(vec![usize::MAX, 0]).is_empty());
        assert_eq!(f8(vec![3, 0]).num_bytes().unwrap(), 0);
    }

    #[test]
    fn test_oversized_shape_is_rejected_on_read() {
        let text = format!(
            "{{'descr': '<f8', 'fortran_order': False, 'shape': ({}, 2), }}\n",
            usize::MAX
        );
        assert!(Header::parse_text(&text).is_ok());

        let mut raw = Vec::new();
        raw.extend_from_slice(MAGIC);
        raw.extend_from_slice(&[3, 0]);
        raw.extend_from_slice(&(text.len() as u32).to_le_bytes());
        raw.extend_from_slice(text.as_bytes());
        let err = read_header(&mut raw.as_slice()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn test_oversized_unicode_descr_is_rejected_on_read() {
        let text = "{'descr': '<U9223372036854775807', 'fortran_order': False, 'shape': (), }\n";
        let mut raw = Vec::new();
        raw.extend_from_slice(MAGIC);
        raw.extend_from_slice(&[3, 0]);
        raw.extend_from_slice(&(text.len() as u32).to_le_bytes());
        raw.extend_from_slice(text.as_bytes());
        let err = read_header(&mut raw.as_slice()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn test_misaligned_header_is_accepted() {
        let body = "{'descr': '<f8', 'fortran_order': False, 'shape': (3,), }\n";
        let mut raw = Vec::new();
        raw.extend_from_slice(MAGIC);
        raw.extend_from_slice(&[3, 0]);
        raw.extend_from_slice(&(body.len() as u32).to_le_bytes());
        raw.extend_from_slice(body.as_bytes());
        assert_ne!(raw.len() % 64, 0);
        assert_eq!(read_header(&mut raw.as_slice()).unwrap(), f8(vec![3]));
    }

    proptest! {
        #[test]
        fn prop_written_headers_are_aligned(
            shape in proptest::collection::vec(0usize..100_000, 0..8),
            fortran_order in any::<bool>(),
            size in prop_oneof![Just(1usize), Just(2), Just(4), Just(8), Just(16)],
        ) {
            let header = Header::new(Dtype::native(Kind::UnsignedInt, size), fortran_order, shape);
            for version in [Version::V1_0, Version::V2_0, Version::V3_0] {
                let text = header.to_text(version);
                prop_assert_eq!((version.preamble_len() + text.len()) % HEADER_ALIGNMENT, 0);
                prop_assert_eq!(Header::parse_text(&text).unwrap(), header.clone());
            }
        }
    }
}
