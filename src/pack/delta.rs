//! Git's delta encoding, used by `OFS_DELTA` and `REF_DELTA` pack entries.
//!
//! A delta starts with the source and target sizes, each a little-endian
//! base-128 varint, followed by instructions:
//!
//! * `1xxxxxxx` copy: bits 0-3 select which offset bytes follow, bits 4-6
//!   which size bytes follow (a size of zero means `0x10000`)
//! * `0xxxxxxx` insert: the next `x` bytes are literal data (`x` may not be 0)

use thiserror::Error;

/// Reasons why a delta can not be applied.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum DeltaError {
    #[error("delta is truncated")]
    Truncated,

    #[error("delta expects a {expected}-byte base but base has {actual} bytes")]
    SourceSize { expected: usize, actual: usize },

    #[error("delta declares {expected} result bytes but produces {actual}")]
    TargetSize { expected: usize, actual: usize },

    #[error("delta copies {size} bytes at offset {offset} past the end of the base")]
    CopyOutOfRange { offset: usize, size: usize },

    #[error("delta contains reserved opcode 0")]
    ReservedOpcode,
}

/// Reads a little-endian base-128 varint, returning the value and the
/// remaining input.
pub(crate) fn read_size(data: &[u8]) -> Result<(usize, &[u8]), DeltaError> {
    let mut value = 0usize;
    let mut shift = 0u32;

    for (i, byte) in data.iter().enumerate() {
        if shift >= usize::BITS {
            return Err(DeltaError::Truncated);
        }
        value |= usize::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok((value, &data[i + 1..]));
        }
        shift += 7;
    }

    Err(DeltaError::Truncated)
}

/// Returns the result size a delta declares without applying it.
pub fn target_size(delta: &[u8]) -> Result<usize, DeltaError> {
    let (_, rest) = read_size(delta)?;
    let (size, _) = read_size(rest)?;
    Ok(size)
}

/// Apply `delta` to `base`.
pub fn apply(base: &[u8], delta: &[u8]) -> Result<Vec<u8>, DeltaError> {
    let (source_size, rest) = read_size(delta)?;
    if source_size != base.len() {
        return Err(DeltaError::SourceSize {
            expected: source_size,
            actual: base.len(),
        });
    }

    let (target_size, mut rest) = read_size(rest)?;
    let mut result = Vec::with_capacity(target_size.min(base.len().saturating_add(delta.len())));

    while let Some((&op, tail)) = rest.split_first() {
        rest = tail;

        if op & 0x80 != 0 {
            let mut offset = 0usize;
            for i in 0..4 {
                if op & (1 << i) != 0 {
                    let (&b, tail) = rest.split_first().ok_or(DeltaError::Truncated)?;
                    offset |= usize::from(b) << (8 * i);
                    rest = tail;
                }
            }

            let mut size = 0usize;
            for i in 0..3 {
                if op & (0x10 << i) != 0 {
                    let (&b, tail) = rest.split_first().ok_or(DeltaError::Truncated)?;
                    size |= usize::from(b) << (8 * i);
                    rest = tail;
                }
            }
            if size == 0 {
                size = 0x10000;
            }

            let end = offset
                .checked_add(size)
                .filter(|end| *end <= base.len())
                .ok_or(DeltaError::CopyOutOfRange { offset, size })?;
            result.extend_from_slice(&base[offset..end]);
        } else if op != 0 {
            let len = usize::from(op);
            if rest.len() < len {
                return Err(DeltaError::Truncated);
            }
            result.extend_from_slice(&rest[..len]);
            rest = &rest[len..];
        } else {
            return Err(DeltaError::ReservedOpcode);
        }

        if result.len() > target_size {
            break;
        }
    }

    if result.len() != target_size {
        return Err(DeltaError::TargetSize {
            expected: target_size,
            actual: result.len(),
        });
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn size(mut n: usize) -> Vec<u8> {
        let mut out = Vec::new();
        loop {
            let byte = (n & 0x7f) as u8;
            n >>= 7;
            if n == 0 {
                out.push(byte);
                return out;
            }
            out.push(byte | 0x80);
        }
    }

    fn header(source: usize, target: usize) -> Vec<u8> {
        let mut out = size(source);
        out.extend(size(target));
        out
    }

    #[test]
    fn read_size_multibyte() {
        assert_eq!(read_size(&[0x05, 0xff]).unwrap(), (5, &[0xff][..]));
        assert_eq!(read_size(&[0x80, 0x01]).unwrap(), (128, &[][..]));
        assert_eq!(read_size(&[0xe8, 0x07]).unwrap(), (1000, &[][..]));
        assert_eq!(read_size(&[0x80]).unwrap_err(), DeltaError::Truncated);
    }

    #[test]
    fn copy_and_insert() {
        let base = b"hello world";
        let mut delta = header(base.len(), 13);
        // copy offset 0, size 5
        delta.extend_from_slice(&[0x90, 5]);
        // insert ", "
        delta.extend_from_slice(&[2, b',', b' ']);
        // copy offset 6, size 5
        delta.extend_from_slice(&[0x91, 6, 5]);
        // insert "!"
        delta.extend_from_slice(&[1, b'!']);
        // 5 + 2 + 5 + 1 = 13

        assert_eq!(apply(base, &delta).unwrap(), b"hello, world!");
        assert_eq!(target_size(&delta).unwrap(), 13);
    }

    #[test]
    fn copy_size_zero_means_64k() {
        let base = vec![7u8; 0x10000];
        let mut delta = header(base.len(), 0x10000);
        delta.push(0x80);
        assert_eq!(apply(&base, &delta).unwrap(), base);
    }

    #[test]
    fn multi_byte_offset_and_size() {
        let base: Vec<u8> = (0..=255u8).cycle().take(0x20000).collect();
        let mut delta = header(base.len(), 0x0102);
        // Only the second offset byte is present; both size bytes are.
        delta.extend_from_slice(&[0x80 | 0x02 | 0x10 | 0x20, 0x01, 0x02, 0x01]);
        assert_eq!(apply(&base, &delta).unwrap(), &base[0x100..0x100 + 0x102]);
    }

    #[test]
    fn source_size_mismatch() {
        let delta = header(4, 0);
        assert_eq!(
            apply(b"abc", &delta).unwrap_err(),
            DeltaError::SourceSize {
                expected: 4,
                actual: 3
            }
        );
    }

    #[test]
    fn target_size_mismatch() {
        let mut delta = header(3, 5);
        delta.extend_from_slice(&[0x90, 3]);
        assert_eq!(
            apply(b"abc", &delta).unwrap_err(),
            DeltaError::TargetSize {
                expected: 5,
                actual: 3
            }
        );
    }

    #[test]
    fn huge_declared_target_is_an_error() {
        let delta = [0x00, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x3f];
        match apply(&[], &delta).unwrap_err() {
            DeltaError::TargetSize { expected, actual } => {
                assert_eq!(expected, target_size(&delta).unwrap());
                assert_eq!(actual, 0);
            }
            err => panic!("Unexpected error {:?}", err),
        }
    }

    #[test]
    fn copy_out_of_range() {
        let mut delta = header(3, 4);
        delta.extend_from_slice(&[0x91, 1, 4]);
        assert_eq!(
            apply(b"abc", &delta).unwrap_err(),
            DeltaError::CopyOutOfRange { offset: 1, size: 4 }
        );
    }

    #[test]
    fn reserved_opcode() {
        let mut delta = header(3, 1);
        delta.push(0);
        assert_eq!(apply(b"abc", &delta).unwrap_err(), DeltaError::ReservedOpcode);
    }

    #[test]
    fn truncated_insert() {
        let mut delta = header(3, 4);
        delta.extend_from_slice(&[4, b'a']);
        assert_eq!(apply(b"abc", &delta).unwrap_err(), DeltaError::Truncated);
    }

    proptest! {
        #[test]
        fn insert_only_reproduces_target(
            base in proptest::collection::vec(any::<u8>(), 0..64),
            target in proptest::collection::vec(any::<u8>(), 0..600),
        ) {
            let mut delta = header(base.len(), target.len());
            for chunk in target.chunks(0x7f) {
                delta.push(chunk.len() as u8);
                delta.extend_from_slice(chunk);
            }
            prop_assert_eq!(apply(&base, &delta).unwrap(), target);
        }

        #[test]
        fn copy_slices_base(
            base in proptest::collection::vec(any::<u8>(), 1..300),
            a in 0usize..300,
            b in 0usize..300,
        ) {
            let start = a % base.len();
            let len = 1 + b % (base.len() - start);
            let len = len.min(0xff);

            let mut delta = header(base.len(), len);
            delta.extend_from_slice(&[0x80 | 0x01 | 0x02 | 0x10, start as u8, (start >> 8) as u8, len as u8]);
            prop_assert_eq!(apply(&base, &delta).unwrap(), base[start..start + len].to_vec());
        }
    }
}
