// tests/property_registry.rs
#![cfg(unix)]

use std::collections::BTreeSet;
use std::path::Path;

use proptest::prelude::*;
use stylewatch::checksum::{fingerprint_bytes, Fingerprint};
use stylewatch::registry::{FileRegistry, RelPath};
use stylewatch::types::ChecksumAlgorithm;

fn name() -> impl Strategy<Value = String> {
    "[a-z]{1,6}(/[a-z_]{1,6}){0,2}\\.scss"
}

proptest! {
    /// No file is ever its own dependent, whatever its import set says.
    #[test]
    fn dependents_never_include_self(
        files in prop::collection::btree_set(name(), 1..8),
        picks in prop::collection::vec((any::<prop::sample::Index>(), any::<prop::sample::Index>()), 0..24),
    ) {
        let files: Vec<RelPath> = files.iter().map(|f| RelPath::parse(f).unwrap()).collect();
        let mut registry = FileRegistry::new("/root");
        let mut imports: Vec<BTreeSet<RelPath>> = vec![BTreeSet::new(); files.len()];

        for (from, to) in picks {
            let from = from.index(files.len());
            let to = to.index(files.len());
            imports[from].insert(files[to].clone());
        }
        // Every file also reports reading itself.
        for (i, file) in files.iter().enumerate() {
            imports[i].insert(file.clone());
            registry.get_or_create(file);
            registry.record_compile(
                file,
                fingerprint_bytes(ChecksumAlgorithm::Crc32, file.as_str().as_bytes()),
                Some(imports[i].clone()),
            );
        }

        for file in &files {
            let dependents = registry.dependents_of(file);
            prop_assert!(!dependents.contains(file));
            let mut sorted = dependents.clone();
            sorted.sort();
            prop_assert_eq!(dependents, sorted);
        }
    }

    /// Relativizing a joined path gives back the same relative path.
    #[test]
    fn relpath_from_absolute_inverts_to_path(file in name()) {
        let root = Path::new("/srv/site");
        let rel = RelPath::parse(&file).unwrap();
        let abs = rel.to_path(root);
        prop_assert_eq!(RelPath::from_absolute(root, &abs), Some(rel));
    }

    /// `a/./b/../c` style noise never changes identity.
    #[test]
    fn relpath_ignores_dot_segments(file in name(), noise in "[a-z]{1,4}") {
        let noisy = format!("./{noise}/../{file}");
        prop_assert_eq!(RelPath::parse(&noisy), RelPath::parse(&file));
    }

    /// Any single-byte difference changes the CRC32 fingerprint.
    #[test]
    fn crc32_detects_single_byte_change(
        data in prop::collection::vec(any::<u8>(), 1..256),
        idx in any::<prop::sample::Index>(),
        flip in 1u8..=255,
    ) {
        let mut changed = data.clone();
        let i = idx.index(data.len());
        changed[i] ^= flip;
        let before: Fingerprint = fingerprint_bytes(ChecksumAlgorithm::Crc32, &data);
        let after = fingerprint_bytes(ChecksumAlgorithm::Crc32, &changed);
        prop_assert_ne!(before, after);
    }
}
