//! Zlib compression for loose objects.

use crate::{Result, StorageError};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::str::FromStr;

/// Compression level configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionLevel {
    /// No compression
    None,
    /// Fast compression (lower ratio)
    Fast,
    /// Default compression (balanced)
    #[default]
    Default,
    /// Best compression (slower, higher ratio)
    Best,
}

impl CompressionLevel {
    /// Converts to flate2 compression level.
    pub fn to_flate2(self) -> flate2::Compression {
        match self {
            CompressionLevel::None => flate2::Compression::none(),
            CompressionLevel::Fast => flate2::Compression::fast(),
            CompressionLevel::Default => flate2::Compression::default(),
            CompressionLevel::Best => flate2::Compression::best(),
        }
    }
}

impl FromStr for CompressionLevel {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(Self::None),
            "fast" => Ok(Self::Fast),
            "default" => Ok(Self::Default),
            "best" => Ok(Self::Best),
            _ => Err(StorageError::Compression(format!(
                "unknown compression level: {}",
                s
            ))),
        }
    }
}

/// Compresses bytes into a zlib stream.
pub fn compress(data: &[u8], level: CompressionLevel) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), level.to_flate2());
    encoder
        .write_all(data)
        .map_err(|e| StorageError::Compression(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| StorageError::Compression(e.to_string()))
}

/// Inflates a complete zlib stream.
pub fn decompress(compressed: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(compressed);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| StorageError::Compression(e.to_string()))?;
    Ok(decompressed)
}
