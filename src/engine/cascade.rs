// src/engine/cascade.rs

//! Which files a change affects.

use crate::registry::{FileRegistry, RelPath};

/// The changed file followed by every file that imports it.
///
/// Only one level: files importing the dependents are not included. Call
/// this *before* recording the changed file's new import set so the result
/// reflects who depended on it up to now.
pub fn affected_by(registry: &FileRegistry, changed: &RelPath) -> Vec<RelPath> {
    let mut affected = vec![changed.clone()];
    affected.extend(registry.dependents_of(changed));
    affected
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn rel(s: &str) -> RelPath {
        RelPath::parse(s).unwrap()
    }

    #[test]
    fn changed_file_comes_first_then_direct_dependents() {
        let mut registry = FileRegistry::new("/proj");
        registry.record_import_set(&rel("b.scss"), BTreeSet::from([rel("_a.scss")]));
        registry.record_import_set(&rel("c.scss"), BTreeSet::from([rel("b.scss")]));

        assert_eq!(
            affected_by(&registry, &rel("_a.scss")),
            vec![rel("_a.scss"), rel("b.scss")]
        );
    }

    #[test]
    fn untracked_file_affects_only_itself() {
        let registry = FileRegistry::new("/proj");
        assert_eq!(affected_by(&registry, &rel("new.scss")), vec![rel("new.scss")]);
    }
}
