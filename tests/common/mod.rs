use std::io::Write;
use std::path::Path;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use sha1::{Digest, Sha1};

use git_store::object::{Id, Kind};
use git_store::Store;

#[allow(dead_code)]
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init()
        .ok();
}

/// A fresh store in a temporary working directory.
#[allow(dead_code)]
pub fn temp_store() -> (tempfile::TempDir, Store) {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let store = Store::init(dir.path()).unwrap();
    (dir, store)
}

/// Builds pack files entry by entry.
#[allow(dead_code)]
pub struct PackBuilder {
    data: Vec<u8>,
    count: u32,
    version: u32,
}

#[allow(dead_code)]
impl PackBuilder {
    pub fn new() -> PackBuilder {
        PackBuilder::with_version(2)
    }

    pub fn with_version(version: u32) -> PackBuilder {
        let mut data = b"PACK".to_vec();
        data.extend_from_slice(&version.to_be_bytes());
        data.extend_from_slice(&0u32.to_be_bytes());
        PackBuilder {
            data,
            count: 0,
            version,
        }
    }

    /// Append a whole object. Returns its offset.
    pub fn whole(&mut self, kind: Kind, content: &[u8]) -> u64 {
        self.whole_declaring(kind, content.len(), content)
    }

    /// Append a whole object whose header claims `size` bytes.
    pub fn whole_declaring(&mut self, kind: Kind, size: usize, content: &[u8]) -> u64 {
        let tag = match kind {
            Kind::Commit => 1,
            Kind::Tree => 2,
            Kind::Blob => 3,
            Kind::Tag => 4,
        };
        self.entry(tag, size, &[], content)
    }

    /// Append a delta against the entry at `base`.
    pub fn ofs_delta(&mut self, base: u64, delta: &[u8]) -> u64 {
        let offset = self.data.len() as u64;
        let mut n = offset - base;
        let mut encoded = vec![(n & 0x7f) as u8];
        n >>= 7;
        while n > 0 {
            n -= 1;
            encoded.push(0x80 | (n & 0x7f) as u8);
            n >>= 7;
        }
        encoded.reverse();
        self.entry(6, delta.len(), &encoded, delta)
    }

    /// Append a delta against the object `base`.
    pub fn ref_delta(&mut self, base: &Id, delta: &[u8]) -> u64 {
        self.entry(7, delta.len(), base.as_bytes(), delta)
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.data[8..12].copy_from_slice(&self.count.to_be_bytes());
        let digest = Sha1::digest(&self.data);
        self.data.extend_from_slice(digest.as_slice());
        self.data
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    fn entry(&mut self, tag: u8, size: usize, prefix: &[u8], payload: &[u8]) -> u64 {
        let offset = self.data.len() as u64;

        let mut size = size;
        let mut c = (tag << 4) | (size & 0x0f) as u8;
        size >>= 4;
        while size > 0 {
            self.data.push(c | 0x80);
            c = (size & 0x7f) as u8;
            size >>= 7;
        }
        self.data.push(c);
        self.data.extend_from_slice(prefix);

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(payload).unwrap();
        self.data.extend(encoder.finish().unwrap());

        self.count += 1;
        offset
    }
}

/// A delta that copies the first `copy` bytes of `base` and then appends
/// `insert`.
#[allow(dead_code)]
pub fn copy_then_insert(base: &[u8], copy: usize, insert: &[u8]) -> Vec<u8> {
    let mut delta = Vec::new();
    push_varint(&mut delta, base.len());
    push_varint(&mut delta, copy + insert.len());

    if copy > 0 {
        let mut op = 0x80u8;
        let mut sizes = Vec::new();
        for i in 0..3 {
            let byte = ((copy >> (8 * i)) & 0xff) as u8;
            if byte != 0 {
                op |= 0x10 << i;
                sizes.push(byte);
            }
        }
        delta.push(op);
        delta.extend(sizes);
    }

    for chunk in insert.chunks(0x7f) {
        delta.push(chunk.len() as u8);
        delta.extend_from_slice(chunk);
    }
    delta
}

fn push_varint(out: &mut Vec<u8>, mut n: usize) {
    while n >= 0x80 {
        out.push(0x80 | (n & 0x7f) as u8);
        n >>= 7;
    }
    out.push(n as u8);
}

/// Write a version 2 `.idx` for the given entries.
#[allow(dead_code)]
pub fn write_idx(path: &Path, entries: &[(Id, u64)]) {
    let mut entries = entries.to_vec();
    entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

    let mut data = vec![0xff, b't', b'O', b'c'];
    data.extend_from_slice(&2u32.to_be_bytes());
    for slot in 0..256usize {
        let count = entries
            .iter()
            .filter(|(id, _)| usize::from(id.as_bytes()[0]) <= slot)
            .count() as u32;
        data.extend_from_slice(&count.to_be_bytes());
    }
    for (id, _) in &entries {
        data.extend_from_slice(id.as_bytes());
    }
    for _ in &entries {
        data.extend_from_slice(&0u32.to_be_bytes());
    }
    for (_, offset) in &entries {
        data.extend_from_slice(&(*offset as u32).to_be_bytes());
    }
    data.extend_from_slice(&[0u8; 40]);

    std::fs::write(path, data).unwrap();
}

/// Raw tree content for `(mode, name, id)` rows, which must already be in
/// git order.
#[allow(dead_code)]
pub fn tree_content(rows: &[(&str, &str, Id)]) -> Vec<u8> {
    let mut out = Vec::new();
    for (mode, name, id) in rows {
        out.extend_from_slice(format!("{} {}\0", mode, name).as_bytes());
        out.extend_from_slice(id.as_bytes());
    }
    out
}
