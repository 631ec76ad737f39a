//! Git pack file format implementation.
//!
//! Pack files are the format used by git for efficient object transfer.
//! Commits, trees and blobs are stored whole; REF_DELTA entries name a base
//! object by digest and are resolved once the whole pack has been read.
//! See: https://git-scm.com/docs/pack-format

use crate::delta::{self, DeltaObject};
use crate::{Result, TransferError};
use flate2::bufread::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use minigit_storage::{Object, ObjectId, ObjectSource, ObjectType};
use sha1::{Digest, Sha1};
use std::collections::HashMap;
use std::io::{Read, Write};

/// Magic bytes at the start of a pack file.
const PACK_SIGNATURE: &[u8; 4] = b"PACK";
/// Pack version written by [`PackBuilder`].
const PACK_VERSION: u32 = 2;
/// Header: signature, version, object count.
const HEADER_LEN: usize = 12;
/// Trailing SHA-1 of everything before it.
const CHECKSUM_LEN: usize = 20;

const OBJ_TAG: u8 = 4;
const OBJ_OFS_DELTA: u8 = 6;
const OBJ_REF_DELTA: u8 = 7;

/// Largest buffer reserved up front for an inflated entry.
const PREALLOC_LIMIT: usize = 1 << 24;

enum PackEntry {
    Object(Object),
    RefDelta(DeltaObject),
}

/// Builds a pack file from a set of objects.
pub struct PackBuilder {
    entries: Vec<PackEntry>,
}

impl PackBuilder {
    /// Creates a new pack builder.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Adds a whole object to the pack.
    pub fn add(&mut self, object: Object) {
        self.entries.push(PackEntry::Object(object));
    }

    /// Adds a REF_DELTA entry against `base`.
    pub fn add_ref_delta(&mut self, base: ObjectId, instructions: Vec<u8>) {
        self.entries
            .push(PackEntry::RefDelta(DeltaObject { base, instructions }));
    }

    /// Adds every object of a source by ID.
    pub fn add_from_source(&mut self, source: &impl ObjectSource, ids: &[ObjectId]) -> Result<()> {
        for id in ids {
            self.add(source.get(id)?);
        }
        Ok(())
    }

    /// Number of entries added so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no entry was added.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Builds the pack file.
    pub fn build(self) -> Result<Vec<u8>> {
        let mut pack = Vec::new();

        pack.extend_from_slice(PACK_SIGNATURE);
        pack.extend_from_slice(&PACK_VERSION.to_be_bytes());
        pack.extend_from_slice(&(self.entries.len() as u32).to_be_bytes());

        for entry in &self.entries {
            match entry {
                PackEntry::Object(object) => {
                    write_entry_header(&mut pack, object.object_type().pack_type(), object.size());
                    write_compressed(&mut pack, object.payload())?;
                }
                PackEntry::RefDelta(delta) => {
                    write_entry_header(&mut pack, OBJ_REF_DELTA, delta.instructions.len());
                    pack.extend_from_slice(delta.base.as_bytes());
                    write_compressed(&mut pack, &delta.instructions)?;
                }
            }
        }

        let checksum = Sha1::digest(&pack);
        pack.extend_from_slice(&checksum);

        Ok(pack)
    }
}

impl Default for PackBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes the type and size header of an entry.
///
/// First byte: continuation bit, 3 type bits, low 4 size bits. Further
/// bytes carry 7 size bits each, least significant first.
fn write_entry_header(pack: &mut Vec<u8>, type_code: u8, size: usize) {
    let mut first_byte = (type_code << 4) | ((size & 0x0F) as u8);
    let mut remaining_size = size >> 4;

    if remaining_size > 0 {
        first_byte |= 0x80;
    }
    pack.push(first_byte);

    while remaining_size > 0 {
        let mut byte = (remaining_size & 0x7F) as u8;
        remaining_size >>= 7;
        if remaining_size > 0 {
            byte |= 0x80;
        }
        pack.push(byte);
    }
}

fn write_compressed(pack: &mut Vec<u8>, data: &[u8]) -> Result<()> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| TransferError::InvalidPack(e.to_string()))?;
    let compressed = encoder
        .finish()
        .map_err(|e| TransferError::InvalidPack(e.to_string()))?;
    pack.extend_from_slice(&compressed);
    Ok(())
}

/// Objects decoded from a pack, in pack order, with deltas resolved.
#[derive(Debug, Clone, Default)]
pub struct PackContents {
    objects: Vec<Object>,
    index: HashMap<ObjectId, usize>,
}

impl PackContents {
    /// Adds an object unless one with the same digest is already present.
    fn insert(&mut self, object: Object) -> bool {
        if self.index.contains_key(object.id()) {
            return false;
        }
        self.index.insert(*object.id(), self.objects.len());
        self.objects.push(object);
        true
    }

    /// Looks up an object by digest.
    pub fn get(&self, id: &ObjectId) -> Option<&Object> {
        self.index.get(id).map(|&i| &self.objects[i])
    }

    /// Number of distinct objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns true if the pack held no objects.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Iterates over the objects: whole objects in pack order, then
    /// resolved deltas in resolution order.
    pub fn iter(&self) -> impl Iterator<Item = &Object> {
        self.objects.iter()
    }

    /// IDs of all objects, in iteration order.
    pub fn ids(&self) -> Vec<ObjectId> {
        self.objects.iter().map(|o| *o.id()).collect()
    }

    /// Consumes the contents, returning the objects.
    pub fn into_objects(self) -> Vec<Object> {
        self.objects
    }
}

impl ObjectSource for PackContents {
    fn try_get(&self, id: &ObjectId) -> minigit_storage::Result<Option<Object>> {
        Ok(PackContents::get(self, id).cloned())
    }
}

/// Parses a pack file into memory.
pub struct PackParser<'a> {
    data: &'a [u8],
    pos: usize,
    end: usize,
}

impl<'a> PackParser<'a> {
    /// Creates a new pack parser.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            end: data.len().saturating_sub(CHECKSUM_LEN),
        }
    }

    /// Decodes every entry and resolves all deltas.
    ///
    /// Nothing is written anywhere; the caller decides what to persist once
    /// the whole pack is known to be good.
    pub fn parse(mut self) -> Result<PackContents> {
        if self.data.len() < HEADER_LEN + CHECKSUM_LEN {
            return Err(TransferError::InvalidPack("pack too small".to_string()));
        }

        if &self.data[0..4] != PACK_SIGNATURE {
            return Err(TransferError::InvalidPack("invalid signature".to_string()));
        }

        let version = u32::from_be_bytes([self.data[4], self.data[5], self.data[6], self.data[7]]);
        if version != 2 && version != 3 {
            return Err(TransferError::InvalidPack(format!(
                "unsupported version: {}",
                version
            )));
        }

        let object_count =
            u32::from_be_bytes([self.data[8], self.data[9], self.data[10], self.data[11]]) as usize;

        let computed = Sha1::digest(&self.data[..self.end]);
        if computed.as_slice() != &self.data[self.end..] {
            return Err(TransferError::InvalidPack("checksum mismatch".to_string()));
        }

        self.pos = HEADER_LEN;

        let mut contents = PackContents::default();
        let mut pending = Vec::new();
        for _ in 0..object_count {
            match self.parse_entry()? {
                PackEntry::Object(object) => {
                    contents.insert(object);
                }
                PackEntry::RefDelta(delta) => pending.push(delta),
            }
        }

        if self.pos != self.end {
            return Err(TransferError::InvalidPack(format!(
                "{} unexpected bytes after last entry",
                self.end - self.pos
            )));
        }

        let deltas = pending.len();
        resolve_deltas(&mut contents, pending)?;

        tracing::debug!(
            entries = object_count,
            objects = contents.len(),
            deltas,
            "parsed pack"
        );
        Ok(contents)
    }

    fn parse_entry(&mut self) -> Result<PackEntry> {
        let (type_code, size) = self.read_entry_header()?;

        match type_code {
            OBJ_REF_DELTA => {
                let base = self
                    .data
                    .get(self.pos..self.pos + ObjectId::LEN)
                    .filter(|_| self.pos + ObjectId::LEN <= self.end)
                    .ok_or_else(|| {
                        TransferError::InvalidPack("truncated delta base".to_string())
                    })?;
                let base = ObjectId::from_slice(base)?;
                self.pos += ObjectId::LEN;
                let instructions = self.inflate(size)?;
                Ok(PackEntry::RefDelta(DeltaObject { base, instructions }))
            }
            OBJ_OFS_DELTA => Err(TransferError::Protocol(
                "OFS_DELTA entries are not supported".to_string(),
            )),
            OBJ_TAG => Err(TransferError::Protocol(
                "tag objects are not supported".to_string(),
            )),
            code => {
                let object_type = ObjectType::from_pack_type(code).ok_or_else(|| {
                    TransferError::InvalidPack(format!("invalid object type: {}", code))
                })?;
                let payload = self.inflate(size)?;
                Ok(PackEntry::Object(Object::from_payload(object_type, payload)?))
            }
        }
    }

    /// Reads the type code and inflated size of the next entry.
    fn read_entry_header(&mut self) -> Result<(u8, usize)> {
        let first_byte = self.next_byte()?;
        let type_code = (first_byte >> 4) & 0x07;
        let mut size = (first_byte & 0x0F) as u64;
        let mut shift = 4u32;

        let mut byte = first_byte;
        while byte & 0x80 != 0 {
            byte = self.next_byte()?;
            if shift > 57 {
                return Err(TransferError::InvalidPack("entry size overflows".to_string()));
            }
            size |= ((byte & 0x7F) as u64) << shift;
            shift += 7;
        }

        let size = usize::try_from(size)
            .map_err(|_| TransferError::InvalidPack(format!("entry too large: {}", size)))?;
        Ok((type_code, size))
    }

    fn next_byte(&mut self) -> Result<u8> {
        if self.pos >= self.end {
            return Err(TransferError::InvalidPack("unexpected end of pack".to_string()));
        }
        let byte = self.data[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    /// Inflates one zlib stream, which must produce exactly `size` bytes,
    /// and advances past the compressed bytes it consumed.
    fn inflate(&mut self, size: usize) -> Result<Vec<u8>> {
        let mut decoder = ZlibDecoder::new(&self.data[self.pos..self.end]);
        let mut out = Vec::with_capacity(size.min(PREALLOC_LIMIT));
        (&mut decoder)
            .take(size as u64 + 1)
            .read_to_end(&mut out)
            .map_err(|e| TransferError::InvalidPack(format!("decompression failed: {}", e)))?;

        if out.len() != size {
            return Err(TransferError::InvalidPack(format!(
                "entry inflated to {} bytes, header says {}",
                out.len(),
                size
            )));
        }

        self.pos += decoder.total_in() as usize;
        Ok(out)
    }
}

/// Resolves deltas in passes until none are left.
///
/// A delta may name a base that is itself a delta, in any pack order. A
/// pass that resolves nothing means the remaining bases are absent.
fn resolve_deltas(contents: &mut PackContents, mut pending: Vec<DeltaObject>) -> Result<()> {
    while !pending.is_empty() {
        let before = pending.len();
        let mut unresolved = Vec::new();

        for delta in pending {
            let resolved = match contents.get(&delta.base) {
                Some(base) => delta::resolve(base, &delta.instructions)?,
                None => {
                    unresolved.push(delta);
                    continue;
                }
            };
            tracing::trace!(base = %delta.base, id = %resolved.id(), "resolved delta");
            contents.insert(resolved);
        }

        if unresolved.len() == before {
            return Err(TransferError::Protocol(format!(
                "{} deltas reference missing bases (first: {})",
                unresolved.len(),
                unresolved[0].base
            )));
        }
        pending = unresolved;
    }
    Ok(())
}


#[cfg(test)]
mod proptests {
    use super::*;
    use minigit_storage::Blob;
    use proptest::prelude::*;

    proptest! {
        /// Pack roundtrip preserves blob content.
        #[test]
        fn prop_pack_roundtrip_blob(data in prop::collection::vec(any::<u8>(), 0..10000)) {
            let object = Object::from(Blob::new(data.clone()));
            let id = *object.id();

            let mut builder = PackBuilder::new();
            builder.add(object);
            let pack = builder.build().unwrap();

            let contents = PackParser::new(&pack).parse().unwrap();
            prop_assert_eq!(contents.len(), 1);
            prop_assert_eq!(contents.get(&id).unwrap().payload().as_ref(), data.as_slice());
        }

        /// A delta stored ahead of its base still resolves to the target.
        #[test]
        fn prop_ref_delta_resolves(
            base in prop::collection::vec(any::<u8>(), 1..2000),
            keep in 0usize..2000,
            tail in prop::collection::vec(any::<u8>(), 0..300),
        ) {
            let keep = keep % base.len();
            let mut target = base[..keep].to_vec();
            target.extend_from_slice(&tail);

            let base = Object::from(Blob::new(base));
            let delta = crate::delta::DeltaEncoder::new(base.size())
                .copy(0, keep)
                .insert(&tail)
                .finish();

            let mut builder = PackBuilder::new();
            builder.add_ref_delta(*base.id(), delta);
            builder.add(base);
            let pack = builder.build().unwrap();

            let contents = PackParser::new(&pack).parse().unwrap();
            let expected = Blob::new(target);
            prop_assert!(contents.get(expected.id()).is_some());
        }

        /// Arbitrary bytes never panic the parser.
        #[test]
        fn prop_invalid_pack_no_panic(data in prop::collection::vec(any::<u8>(), 0..1000)) {
            let _ = PackParser::new(&data).parse();
        }

        /// Any corrupted checksum byte is detected.
        #[test]
        fn prop_corrupted_checksum_detected(
            content in prop::collection::vec(any::<u8>(), 1..1000),
            corrupt_byte in 0u8..20
        ) {
            let mut builder = PackBuilder::new();
            builder.add(Object::from(Blob::new(content)));
            let mut pack = builder.build().unwrap();

            let len = pack.len();
            pack[len - 1 - corrupt_byte as usize] ^= 0xFF;

            prop_assert!(PackParser::new(&pack).parse().is_err());
        }
    }
}
