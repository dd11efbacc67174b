//! Pack index (`.idx`) files, versions 1 and 2.
//!
//! ```text
//! v1: fanout[256] (u32 BE), then N x (offset u32 BE, id[20])
//! v2: "\xfftOc", version 2, fanout[256], ids[N], crc32[N], offsets[N],
//!     large offsets[M] (u64 BE, used when an offset has its top bit set)
//! ```
//!
//! Both versions end with the pack checksum and the index checksum, which
//! are not verified here.

use crate::object::{Id, ID_LEN};

const V2_MAGIC: [u8; 4] = [0xff, b't', b'O', b'c'];
const FANOUT_LEN: usize = 256 * 4;

/// Parse an index file into `(id, offset)` pairs.
///
/// Returns a description of the problem if the index is malformed.
pub(crate) fn parse(data: &[u8]) -> Result<Vec<(Id, u64)>, String> {
    if data.starts_with(&V2_MAGIC) {
        let version = read_u32(data, 4)?;
        if version != 2 {
            return Err(format!("unsupported index version {}", version));
        }
        parse_v2(&data[8..])
    } else {
        parse_v1(data)
    }
}

fn parse_v1(data: &[u8]) -> Result<Vec<(Id, u64)>, String> {
    let count = object_count(data)?;
    let table = &data[FANOUT_LEN..];

    let entry_len = 4 + ID_LEN;
    if table.len() < count * entry_len {
        return Err("index is truncated".to_string());
    }

    let mut entries = Vec::with_capacity(count);
    for entry in table[..count * entry_len].chunks(entry_len) {
        let offset = u64::from(read_u32(entry, 0)?);
        entries.push((id_at(entry, 4)?, offset));
    }
    Ok(entries)
}

fn parse_v2(data: &[u8]) -> Result<Vec<(Id, u64)>, String> {
    let count = object_count(data)?;

    let ids_at = FANOUT_LEN;
    let crcs_at = ids_at + count * ID_LEN;
    let offsets_at = crcs_at + count * 4;
    let large_at = offsets_at + count * 4;

    if data.len() < large_at {
        return Err("index is truncated".to_string());
    }

    let mut entries = Vec::with_capacity(count);
    for i in 0..count {
        let id = id_at(data, ids_at + i * ID_LEN)?;
        let small = read_u32(data, offsets_at + i * 4)?;

        let offset = if small & 0x8000_0000 != 0 {
            let index = (small & 0x7fff_ffff) as usize;
            read_u64(data, large_at + index * 8)?
        } else {
            u64::from(small)
        };

        entries.push((id, offset));
    }
    Ok(entries)
}

/// The last fanout slot holds the total number of objects.
fn object_count(data: &[u8]) -> Result<usize, String> {
    if data.len() < FANOUT_LEN {
        return Err("index fanout table is truncated".to_string());
    }

    let mut previous = 0;
    for slot in 0..256 {
        let count = read_u32(data, slot * 4)?;
        if count < previous {
            return Err("index fanout table is not monotonic".to_string());
        }
        previous = count;
    }

    Ok(previous as usize)
}

fn read_u32(data: &[u8], at: usize) -> Result<u32, String> {
    data.get(at..at + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| "index is truncated".to_string())
}

fn read_u64(data: &[u8], at: usize) -> Result<u64, String> {
    data.get(at..at + 8)
        .map(|b| {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(b);
            u64::from_be_bytes(bytes)
        })
        .ok_or_else(|| "index large offset table is truncated".to_string())
}

fn id_at(data: &[u8], at: usize) -> Result<Id, String> {
    data.get(at..at + ID_LEN)
        .and_then(|b| Id::new(b).ok())
        .ok_or_else(|| "index is truncated".to_string())
}
