//! Read-only access to git pack files.
//!
//! ```text
//! "PACK", version (u32 BE, 2 or 3), object count (u32 BE)
//! entries:
//!   type (3 bits) + size (varint, 4 bits in the first byte)
//!   OFS_DELTA: negative offset to the base entry
//!   REF_DELTA: 20-byte id of the base object
//!   zlib-compressed content or delta
//! SHA-1 of everything above
//! ```
//!
//! If a `.idx` file sits next to the pack, it supplies the id of every
//! entry. Otherwise the pack is scanned and every entry is resolved to
//! compute its id.

use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::bufread::ZlibDecoder;
use sha1::{Digest, Sha1};
use tracing::{debug, info};

pub mod delta;
mod index;

use crate::error::{Error, Result};
use crate::object::{id_for, Id, Kind, Object, ID_LEN};

const SIGNATURE: &[u8; 4] = b"PACK";
const HEADER_LEN: usize = 12;
const TRAILER_LEN: usize = ID_LEN;

const OFS_DELTA: u8 = 6;
const REF_DELTA: u8 = 7;

/// Longest delta chain that will be followed before the pack is
/// considered corrupt.
const MAX_DELTA_DEPTH: usize = 4096;

/// A single pack file, held in memory, with an index from object id to
/// entry offset.
pub struct Pack {
    path: PathBuf,
    data: Vec<u8>,
    version: u32,
    index: HashMap<Id, u64>,
}

/// One entry as stored, before delta resolution.
enum RawEntry {
    Whole(Kind, Vec<u8>),
    OfsDelta(u64, Vec<u8>),
    RefDelta(Id, Vec<u8>),
}

impl Pack {
    /// Open and index the pack file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Pack> {
        let path = path.as_ref().to_path_buf();
        let data = fs::read(&path)?;

        let mut pack = Pack {
            path,
            data,
            version: 0,
            index: HashMap::new(),
        };

        let count = pack.read_header()?;
        pack.verify_checksum()?;

        let idx_path = pack.path.with_extension("idx");
        if idx_path.is_file() {
            pack.load_index(&idx_path, count)?;
        } else {
            pack.scan(count)?;
        }

        info!(
            path = %pack.path.display(),
            objects = pack.index.len(),
            "loaded pack"
        );
        Ok(pack)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Pack format version (2 or 3).
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Number of objects in the pack.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains(&self, id: &Id) -> bool {
        self.index.contains_key(id)
    }

    /// The offset of the entry holding `id`.
    pub fn offset(&self, id: &Id) -> Option<u64> {
        self.index.get(id).copied()
    }

    /// Every object id in the pack together with its entry offset.
    pub fn each_entry(&self) -> impl Iterator<Item = (Id, u64)> + '_ {
        self.index.iter().map(|(id, offset)| (*id, *offset))
    }

    /// Read the object `id` from this pack.
    pub fn get(&self, id: &Id) -> Result<Object> {
        match self.index.get(id) {
            Some(offset) => self.parse_object(*offset),
            None => Err(Error::ObjectNotFound(*id)),
        }
    }

    /// Read the entry at `offset`, resolving any chain of deltas.
    pub fn parse_object(&self, offset: u64) -> Result<Object> {
        self.try_resolve(offset)?
            .ok_or_else(|| self.corrupt(format!("delta base for entry at {} is missing", offset)))
    }

    fn read_header(&mut self) -> Result<usize> {
        if self.data.len() < HEADER_LEN + TRAILER_LEN || &self.data[0..4] != SIGNATURE {
            return Err(self.corrupt("missing PACK signature".to_string()));
        }

        self.version = be_u32(&self.data[4..8]);
        if self.version != 2 && self.version != 3 {
            return Err(self.corrupt(format!("unsupported version {}", self.version)));
        }

        Ok(be_u32(&self.data[8..12]) as usize)
    }

    fn verify_checksum(&self) -> Result<()> {
        let split = self.data.len() - TRAILER_LEN;
        let digest = Sha1::digest(&self.data[..split]);
        if digest.as_slice() != &self.data[split..] {
            return Err(self.corrupt("checksum mismatch".to_string()));
        }
        Ok(())
    }

    fn load_index(&mut self, idx_path: &Path, count: usize) -> Result<()> {
        let data = fs::read(idx_path)?;
        let entries = index::parse(&data).map_err(|reason| Error::CorruptPack {
            path: idx_path.to_path_buf(),
            reason,
        })?;

        if entries.len() != count {
            return Err(self.corrupt(format!(
                "index lists {} objects but pack holds {}",
                entries.len(),
                count
            )));
        }

        debug!(path = %idx_path.display(), objects = count, "read pack index");
        self.index = entries.into_iter().collect();
        Ok(())
    }

    /// Build the index by walking every entry. Whole objects are hashed
    /// directly; deltas are resolved in repeated passes because a
    /// `REF_DELTA` may name a base that appears later in the pack.
    fn scan(&mut self, count: usize) -> Result<()> {
        let end = self.data.len() - TRAILER_LEN;
        let mut pending: Vec<u64> = Vec::new();
        let mut pos = HEADER_LEN as u64;

        for _ in 0..count {
            if pos as usize >= end {
                return Err(self.corrupt(format!("pack ends before entry {}", pos)));
            }

            let (raw, next) = self.read_raw(pos)?;
            match raw {
                RawEntry::Whole(kind, content) => {
                    self.index.insert(id_for(kind, &content), pos);
                }
                _ => pending.push(pos),
            }
            pos = next;
        }

        while !pending.is_empty() {
            let mut deferred = Vec::new();
            for offset in &pending {
                match self.try_resolve(*offset)? {
                    Some(object) => {
                        self.index.insert(object.id(), *offset);
                    }
                    None => deferred.push(*offset),
                }
            }

            if deferred.len() == pending.len() {
                return Err(self.corrupt(format!(
                    "{} deltas have bases that are not in the pack",
                    deferred.len()
                )));
            }
            pending = deferred;
        }

        Ok(())
    }

    /// Resolve the entry at `offset`. Returns `None` if a `REF_DELTA` base
    /// is not (yet) known.
    fn try_resolve(&self, offset: u64) -> Result<Option<Object>> {
        let mut deltas: Vec<Vec<u8>> = Vec::new();
        let mut current = offset;

        let (kind, mut content) = loop {
            if deltas.len() > MAX_DELTA_DEPTH {
                return Err(self.corrupt(format!("delta chain at {} is too deep", offset)));
            }

            match self.read_raw(current)?.0 {
                RawEntry::Whole(kind, content) => break (kind, content),
                RawEntry::OfsDelta(base, delta) => {
                    deltas.push(delta);
                    current = base;
                }
                RawEntry::RefDelta(base, delta) => match self.index.get(&base) {
                    Some(base) => {
                        deltas.push(delta);
                        current = *base;
                    }
                    None => return Ok(None),
                },
            }
        };

        for delta in deltas.iter().rev() {
            content = delta::apply(&content, delta)
                .map_err(|err| self.corrupt(format!("entry at {}: {}", offset, err)))?;
        }

        Ok(Some(Object::new(kind, content)))
    }

    /// Read one entry without resolving deltas. Returns the entry and the
    /// offset of the next one.
    fn read_raw(&self, offset: u64) -> Result<(RawEntry, u64)> {
        let start = offset as usize;
        let end = self.data.len() - TRAILER_LEN;
        let truncated = || self.corrupt(format!("entry at {} is truncated", offset));

        let mut pos = start;
        let mut c = *self.data[..end].get(pos).ok_or_else(truncated)?;
        pos += 1;

        let tag = (c >> 4) & 0x7;
        let mut size = usize::from(c & 0x0f);
        let mut shift = 4;
        while c & 0x80 != 0 {
            if shift > 57 {
                return Err(self.corrupt(format!("entry at {} has an oversized header", offset)));
            }
            c = *self.data[..end].get(pos).ok_or_else(truncated)?;
            pos += 1;
            size |= usize::from(c & 0x7f) << shift;
            shift += 7;
        }

        let entry = match tag {
            OFS_DELTA => {
                let mut c = *self.data[..end].get(pos).ok_or_else(truncated)?;
                pos += 1;
                let mut back = u64::from(c & 0x7f);
                while c & 0x80 != 0 {
                    if back > u64::MAX >> 8 {
                        return Err(self.corrupt(format!(
                            "entry at {} has an oversized base offset",
                            offset
                        )));
                    }
                    c = *self.data[..end].get(pos).ok_or_else(truncated)?;
                    pos += 1;
                    back = ((back + 1) << 7) | u64::from(c & 0x7f);
                }

                let base = offset
                    .checked_sub(back)
                    .filter(|base| back > 0 && *base >= HEADER_LEN as u64)
                    .ok_or_else(|| {
                        self.corrupt(format!("entry at {} has an invalid base offset", offset))
                    })?;

                let (delta, next) = self.inflate(pos, size, offset)?;
                (RawEntry::OfsDelta(base, delta), next)
            }
            REF_DELTA => {
                let base = self.data[..end]
                    .get(pos..pos + ID_LEN)
                    .ok_or_else(truncated)
                    .and_then(|b| Id::new(b).map_err(Error::from))?;
                pos += ID_LEN;

                let (delta, next) = self.inflate(pos, size, offset)?;
                (RawEntry::RefDelta(base, delta), next)
            }
            _ => {
                let kind = Kind::from_pack_type(tag).ok_or_else(|| {
                    self.corrupt(format!("entry at {} has unknown type {}", offset, tag))
                })?;

                let (content, next) = self.inflate(pos, size, offset)?;
                (RawEntry::Whole(kind, content), next)
            }
        };

        Ok(entry)
    }

    /// Inflate the zlib stream starting at `pos`, which must hold exactly
    /// `size` bytes. Returns the bytes and the offset just past the stream.
    fn inflate(&self, pos: usize, size: usize, offset: u64) -> Result<(Vec<u8>, u64)> {
        let end = self.data.len() - TRAILER_LEN;
        let input = self.data.get(pos..end).unwrap_or_default();

        let mut decoder = ZlibDecoder::new(input);
        // At most one byte past `size` is read, so an overlong stream is
        // still caught below.
        let mut out = Vec::with_capacity(size.min(input.len()));
        (&mut decoder)
            .take((size as u64).saturating_add(1))
            .read_to_end(&mut out)
            .map_err(|err| self.corrupt(format!("entry at {}: {}", offset, err)))?;

        if out.len() != size {
            return Err(self.corrupt(format!(
                "entry at {} declares {} bytes but inflates to {}",
                offset,
                size,
                out.len()
            )));
        }

        Ok((out, (pos as u64) + decoder.total_in()))
    }

    fn corrupt(&self, reason: String) -> Error {
        Error::CorruptPack {
            path: self.path.clone(),
            reason,
        }
    }
}

impl std::fmt::Debug for Pack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pack")
            .field("path", &self.path)
            .field("version", &self.version)
            .field("objects", &self.index.len())
            .finish()
    }
}

fn be_u32(b: &[u8]) -> u32 {
    u32::from_be_bytes([b[0], b[1], b[2], b[3]])
}
