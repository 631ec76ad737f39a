//! Delta instruction streams.
//!
//! A delta is `<base size><result size><instructions>`, both sizes being
//! little-endian base-128 varints. Each instruction either copies a range of
//! the base object or inserts literal bytes from the stream.
//! See: https://git-scm.com/docs/pack-format#_deltified_representation

use crate::{Result, TransferError};
use minigit_storage::{Object, ObjectId};

/// Largest buffer reserved up front for a delta result.
const PREALLOC_LIMIT: usize = 1 << 24;

/// Copy size used when a copy instruction encodes a size of zero.
const DEFAULT_COPY_SIZE: usize = 0x10000;

/// Largest literal run a single insert instruction can carry.
const MAX_INSERT: usize = 0x7f;

/// A REF_DELTA entry waiting for its base object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaObject {
    /// Digest of the base object.
    pub base: ObjectId,
    /// The inflated delta stream.
    pub instructions: Vec<u8>,
}

/// Reconstructs an object from its base and a delta.
///
/// The result has the base's type; its digest is recomputed from the new
/// payload.
pub fn resolve(base: &Object, delta: &[u8]) -> Result<Object> {
    let payload = apply_delta(base.payload(), delta)?;
    Ok(Object::from_payload(base.object_type(), payload)?)
}

/// Applies a delta stream to base bytes.
pub fn apply_delta(base: &[u8], delta: &[u8]) -> Result<Vec<u8>> {
    let mut pos = 0;

    let base_size = read_varint(delta, &mut pos)?;
    if base_size != base.len() {
        return Err(TransferError::Protocol(format!(
            "delta base size mismatch: delta expects {} bytes, base has {}",
            base_size,
            base.len()
        )));
    }
    let result_size = read_varint(delta, &mut pos)?;

    let mut out = Vec::with_capacity(result_size.min(PREALLOC_LIMIT));
    while pos < delta.len() {
        let op = delta[pos];
        pos += 1;

        if op & 0x80 != 0 {
            // copy: bits 0-3 select offset bytes, bits 4-6 select size bytes
            let mut offset = 0usize;
            for i in 0..4 {
                if op & (1 << i) != 0 {
                    offset |= (next_byte(delta, &mut pos)? as usize) << (8 * i);
                }
            }
            let mut size = 0usize;
            for i in 0..3 {
                if op & (0x10 << i) != 0 {
                    size |= (next_byte(delta, &mut pos)? as usize) << (8 * i);
                }
            }
            if size == 0 {
                size = DEFAULT_COPY_SIZE;
            }

            let end = offset
                .checked_add(size)
                .filter(|&end| end <= base.len())
                .ok_or_else(|| {
                    TransferError::Protocol(format!(
                        "delta copy {}+{} outside base of {} bytes",
                        offset,
                        size,
                        base.len()
                    ))
                })?;
            out.extend_from_slice(&base[offset..end]);
        } else if op != 0 {
            let len = op as usize;
            let literal = delta.get(pos..pos + len).ok_or_else(|| {
                TransferError::Protocol("delta insert runs past end of stream".to_string())
            })?;
            out.extend_from_slice(literal);
            pos += len;
        } else {
            return Err(TransferError::Protocol(
                "reserved delta opcode 0".to_string(),
            ));
        }

        if out.len() > result_size {
            return Err(TransferError::Protocol(format!(
                "delta result exceeds declared size {}",
                result_size
            )));
        }
    }

    if out.len() != result_size {
        return Err(TransferError::Protocol(format!(
            "delta result is {} bytes, expected {}",
            out.len(),
            result_size
        )));
    }
    Ok(out)
}

fn next_byte(data: &[u8], pos: &mut usize) -> Result<u8> {
    let byte = *data
        .get(*pos)
        .ok_or_else(|| TransferError::Protocol("truncated delta stream".to_string()))?;
    *pos += 1;
    Ok(byte)
}

fn read_varint(data: &[u8], pos: &mut usize) -> Result<usize> {
    let mut value = 0usize;
    let mut shift = 0u32;
    loop {
        let byte = next_byte(data, pos)?;
        if shift >= usize::BITS {
            return Err(TransferError::Protocol("delta size varint overflows".to_string()));
        }
        value |= ((byte & 0x7f) as usize) << shift;
        shift += 7;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
}

fn write_varint(out: &mut Vec<u8>, mut value: usize) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

/// Writes delta streams instruction by instruction.
#[derive(Debug, Clone)]
pub struct DeltaEncoder {
    base_size: usize,
    result_size: usize,
    instructions: Vec<u8>,
}

impl DeltaEncoder {
    /// Starts a delta against a base of `base_size` bytes.
    pub fn new(base_size: usize) -> Self {
        Self {
            base_size,
            result_size: 0,
            instructions: Vec::new(),
        }
    }

    /// Copies `size` bytes of the base starting at `offset`.
    pub fn copy(mut self, offset: u32, size: usize) -> Self {
        let mut remaining = size;
        let mut offset = offset as usize;
        while remaining > 0 {
            let chunk = remaining.min(0xff_ffff);
            let mut op = 0x80u8;
            let mut args = Vec::with_capacity(7);
            for i in 0..4 {
                let byte = (offset >> (8 * i)) as u8;
                if byte != 0 {
                    op |= 1 << i;
                    args.push(byte);
                }
            }
            // a zero size field means 0x10000, so that length is left implicit
            if chunk != DEFAULT_COPY_SIZE {
                for i in 0..3 {
                    let byte = (chunk >> (8 * i)) as u8;
                    if byte != 0 {
                        op |= 0x10 << i;
                        args.push(byte);
                    }
                }
            }
            self.instructions.push(op);
            self.instructions.extend_from_slice(&args);
            self.result_size += chunk;
            offset += chunk;
            remaining -= chunk;
        }
        self
    }

    /// Inserts literal bytes.
    pub fn insert(mut self, data: &[u8]) -> Self {
        for chunk in data.chunks(MAX_INSERT) {
            self.instructions.push(chunk.len() as u8);
            self.instructions.extend_from_slice(chunk);
            self.result_size += chunk.len();
        }
        self
    }

    /// Renders the delta stream.
    pub fn finish(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.instructions.len() + 20);
        write_varint(&mut out, self.base_size);
        write_varint(&mut out, self.result_size);
        out.extend_from_slice(&self.instructions);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minigit_storage::{Blob, ObjectType};

    /// "copy bytes 0-4, insert ' there'" against an 11 byte base.
    fn hello_there(declared_base: u8) -> Vec<u8> {
        let mut delta = vec![declared_base, 11];
        delta.extend_from_slice(&[0x90, 5]); // copy offset 0 (implicit), size 5
        delta.push(6);
        delta.extend_from_slice(b" there");
        delta
    }

    #[test]
    fn test_hello_there() {
        let out = apply_delta(b"hello world", &hello_there(11)).unwrap();
        assert_eq!(out, b"hello there");
    }

    #[test]
    fn test_base_size_mismatch() {
        let err = apply_delta(b"hello world", &hello_there(12)).unwrap_err();
        assert!(err.is_protocol());
        assert!(err.to_string().contains("base size mismatch"));
    }

    #[test]
    fn test_resolve_inherits_type() {
        let base = Object::from(Blob::new(b"hello world".to_vec()));
        let resolved = resolve(&base, &hello_there(11)).unwrap();

        assert_eq!(resolved.object_type(), ObjectType::Blob);
        assert_eq!(resolved.payload().as_ref(), b"hello there");
        assert_eq!(resolved.id(), Blob::new(b"hello there".to_vec()).id());
    }

    #[test]
    fn test_copy_with_offset_and_size_bytes() {
        let base: Vec<u8> = (0..=255u8).cycle().take(70_000).collect();
        // copy offset 0x0102, size 0x0300
        let delta = [0x80 | 0x01 | 0x02 | 0x20, 0x02, 0x01, 0x03];
        let mut stream = Vec::new();
        write_varint(&mut stream, base.len());
        write_varint(&mut stream, 0x300);
        stream.extend_from_slice(&delta);

        let out = apply_delta(&base, &stream).unwrap();
        assert_eq!(out, &base[0x102..0x402]);
    }

    #[test]
    fn test_zero_size_means_64k() {
        let base = vec![7u8; DEFAULT_COPY_SIZE + 10];
        let mut stream = Vec::new();
        write_varint(&mut stream, base.len());
        write_varint(&mut stream, DEFAULT_COPY_SIZE);
        stream.push(0x80);

        let out = apply_delta(&base, &stream).unwrap();
        assert_eq!(out.len(), DEFAULT_COPY_SIZE);
    }

    #[test]
    fn test_copy_out_of_bounds() {
        let delta = [5, 10, 0x80 | 0x10, 10];
        assert!(apply_delta(b"short", &delta).unwrap_err().is_protocol());
    }

    #[test]
    fn test_reserved_opcode() {
        let delta = [3, 3, 0];
        assert!(apply_delta(b"abc", &delta).unwrap_err().is_protocol());
    }

    #[test]
    fn test_result_size_mismatch() {
        let short = [3, 4, 0x90, 3];
        assert!(apply_delta(b"abc", &short).is_err());

        let long = [3, 2, 0x90, 3];
        assert!(apply_delta(b"abc", &long).is_err());
    }

    #[test]
    fn test_truncated_insert() {
        let delta = [0, 5, 5, b'a', b'b'];
        assert!(apply_delta(b"", &delta).unwrap_err().is_protocol());
    }

    #[test]
    fn test_truncated_header() {
        assert!(apply_delta(b"", &[]).is_err());
        assert!(apply_delta(b"", &[0x80]).is_err());
    }

    #[test]
    fn test_varint_roundtrip() {
        for value in [0usize, 1, 127, 128, 300, 1 << 20, usize::MAX >> 1] {
            let mut buf = Vec::new();
            write_varint(&mut buf, value);
            let mut pos = 0;
            assert_eq!(read_varint(&buf, &mut pos).unwrap(), value);
            assert_eq!(pos, buf.len());
        }
    }

    #[test]
    fn test_encoder() {
        let base = b"The quick brown fox jumps over the lazy dog";
        let delta = DeltaEncoder::new(base.len())
            .copy(0, 10)
            .insert(b"red")
            .copy(15, base.len() - 15)
            .finish();

        let out = apply_delta(base, &delta).unwrap();
        assert_eq!(out, b"The quick red fox jumps over the lazy dog");
    }

    #[test]
    fn test_encoder_long_runs() {
        let base = vec![1u8; 200_000];
        let literal = vec![2u8; 300];
        let delta = DeltaEncoder::new(base.len())
            .copy(0, DEFAULT_COPY_SIZE)
            .insert(&literal)
            .copy(1000, 150_000)
            .finish();

        let out = apply_delta(&base, &delta).unwrap();
        assert_eq!(out.len(), DEFAULT_COPY_SIZE + 300 + 150_000);
        assert_eq!(&out[DEFAULT_COPY_SIZE..DEFAULT_COPY_SIZE + 300], literal.as_slice());
    }
}
