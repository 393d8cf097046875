use std::str::FromStr;

use serde::Deserialize;

/// Algorithm used by the checksum oracle to fingerprint file contents.
///
/// - `Crc32`: 32-bit CRC. Cheap, good enough for change detection (default).
/// - `Blake3`: 256-bit BLAKE3 digest, for trees where CRC collisions matter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumAlgorithm {
    #[default]
    Crc32,
    Blake3,
}

impl FromStr for ChecksumAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "crc32" => Ok(ChecksumAlgorithm::Crc32),
            "blake3" => Ok(ChecksumAlgorithm::Blake3),
            other => Err(format!(
                "invalid checksum algorithm: {other} (expected \"crc32\" or \"blake3\")"
            )),
        }
    }
}

/// Kind of filesystem notification the engine reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
}
