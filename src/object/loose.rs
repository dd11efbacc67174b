//! The loose object file format: a zlib stream holding
//! `"{type} {length}\0"` followed by the object's content.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use super::{header, parse_utils, Kind, Object};
use crate::error::{Error, Result};

/// Compress an object into the loose object format.
pub fn encode(kind: Kind, content: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&header(kind, content.len()))?;
    encoder.write_all(content)?;
    Ok(encoder.finish()?)
}

/// Decompress and parse a loose object.
///
/// The zlib header is checked before inflating, and the length declared in the
/// object header must match the content that follows it.
pub fn decode(data: &[u8]) -> Result<Object> {
    if !has_zlib_header(data) {
        return Err(Error::CorruptObject(
            "loose object does not start with a zlib header".to_string(),
        ));
    }

    let mut inflated = Vec::new();
    ZlibDecoder::new(data)
        .read_to_end(&mut inflated)
        .map_err(|err| Error::CorruptObject(format!("unable to inflate loose object: {}", err)))?;

    parse_inflated(&inflated)
}

fn parse_inflated(inflated: &[u8]) -> Result<Object> {
    let nul = inflated
        .iter()
        .position(|b| *b == 0)
        .ok_or_else(|| Error::CorruptObject("object header is not terminated".to_string()))?;

    let (kind_name, size) = parse_utils::split_once(&inflated[..nul], &b' ');
    let kind = Kind::from_name(kind_name).ok_or_else(|| {
        Error::CorruptObject(format!(
            "unknown object type `{}`",
            String::from_utf8_lossy(kind_name)
        ))
    })?;

    let size = std::str::from_utf8(size)
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .ok_or_else(|| Error::CorruptObject("object header has an invalid size".to_string()))?;

    let content = &inflated[nul + 1..];
    if content.len() != size {
        return Err(Error::CorruptObject(format!(
            "object header declares {} bytes but {} follow",
            size,
            content.len()
        )));
    }

    Ok(Object::new(kind, content))
}

/// The first byte must name the deflate method with a 32K window (`0x78`),
/// and the 16-bit header word must be a multiple of 31.
fn has_zlib_header(data: &[u8]) -> bool {
    if data.len() < 2 {
        return false;
    }

    let word = (u16::from(data[0]) << 8) | u16::from(data[1]);
    data[0] == 0x78 && word % 31 == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deflate(raw: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(raw).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn encode_then_decode() {
        let data = encode(Kind::Blob, b"test content\n").unwrap();
        assert_eq!(&data[0..2], &[0x78, 0x9c]);

        let o = decode(&data).unwrap();
        assert_eq!(o.kind(), Kind::Blob);
        assert_eq!(o.content(), b"test content\n");
    }

    #[test]
    fn encoded_header() {
        let data = encode(Kind::Tree, b"").unwrap();
        let mut inflated = Vec::new();
        ZlibDecoder::new(&data[..])
            .read_to_end(&mut inflated)
            .unwrap();
        assert_eq!(inflated, b"tree 0\0".to_vec());
    }

    #[test]
    fn rejects_missing_zlib_header() {
        let err = decode(b"blob 1\0a").unwrap_err();
        assert!(matches!(err, Error::CorruptObject(_)));

        let err = decode(b"x").unwrap_err();
        assert!(matches!(err, Error::CorruptObject(_)));
    }

    #[test]
    fn rejects_bad_header_checksum() {
        let mut data = encode(Kind::Blob, b"a").unwrap();
        data[1] = data[1].wrapping_add(1);
        let err = decode(&data).unwrap_err();
        assert!(matches!(err, Error::CorruptObject(_)));
    }

    #[test]
    fn rejects_size_mismatch() {
        let err = decode(&deflate(b"blob 5\0abc")).unwrap_err();
        match err {
            Error::CorruptObject(msg) => {
                assert_eq!(msg, "object header declares 5 bytes but 3 follow")
            }
            _ => panic!("Unexpected error {:?}", err),
        }
    }

    #[test]
    fn rejects_unknown_type() {
        let err = decode(&deflate(b"bogus 1\0a")).unwrap_err();
        assert!(matches!(err, Error::CorruptObject(_)));
    }

    #[test]
    fn rejects_unterminated_header() {
        let err = decode(&deflate(b"blob 1")).unwrap_err();
        assert!(matches!(err, Error::CorruptObject(_)));
    }

    #[test]
    fn rejects_truncated_stream() {
        let data = encode(Kind::Blob, &b"foobar".repeat(100)).unwrap();
        let err = decode(&data[..data.len() / 2]).unwrap_err();
        assert!(matches!(err, Error::CorruptObject(_)));
    }
}
