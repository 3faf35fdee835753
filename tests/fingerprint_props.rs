// Property-based tests for content fingerprinting.
// CI: 64 cases (default). Soak: PROPTEST_CASES=1000 cargo test --release

use std::collections::BTreeMap;
use std::path::Path;

use proptest::prelude::*;

use toorpia_client::compute_fingerprint;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn config_64() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(64),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

/// Canonical filenames: plain lowercase stems, .csv suffix. Cannot collide
/// with any derived-artifact pattern.
fn arb_canonical_name() -> impl Strategy<Value = String> {
    "[a-z]{1,8}\\.csv"
}

fn arb_derived_name() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z]{1,6}\\.log",
        "segments-add-[0-9]{1,3}\\.csv",
        "xy-add-[0-9]{1,3}\\.dat",
        "rawdata_add_[0-9]{1,3}\\.csv",
    ]
}

/// A canonical file set: name → content, deduplicated by name.
fn arb_file_set() -> impl Strategy<Value = BTreeMap<String, Vec<u8>>> {
    prop::collection::btree_map(
        arb_canonical_name(),
        prop::collection::vec(any::<u8>(), 0..256),
        1..6,
    )
}

fn write_files(dir: &Path, files: &BTreeMap<String, Vec<u8>>) {
    for (name, content) in files {
        std::fs::write(dir.join(name), content).unwrap();
    }
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_64())]

    /// Re-running on unchanged content returns the identical digest, and
    /// the digest does not depend on which directory holds the files.
    #[test]
    fn fingerprint_is_a_pure_function_of_content(files in arb_file_set()) {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        write_files(a.path(), &files);
        write_files(b.path(), &files);

        let fp_a = compute_fingerprint(a.path()).unwrap();
        prop_assert_eq!(&fp_a, &compute_fingerprint(a.path()).unwrap());
        prop_assert_eq!(&fp_a, &compute_fingerprint(b.path()).unwrap());
    }

    /// Derived files never contribute to the digest.
    #[test]
    fn derived_files_are_invisible(
        files in arb_file_set(),
        derived in prop::collection::btree_map(
            arb_derived_name(),
            prop::collection::vec(any::<u8>(), 0..256),
            0..4,
        ),
    ) {
        let clean = tempfile::tempdir().unwrap();
        write_files(clean.path(), &files);

        let noisy = tempfile::tempdir().unwrap();
        write_files(noisy.path(), &files);
        write_files(noisy.path(), &derived);

        prop_assert_eq!(
            compute_fingerprint(clean.path()).unwrap(),
            compute_fingerprint(noisy.path()).unwrap(),
        );
    }

    /// Changing one canonical byte changes the digest.
    #[test]
    fn canonical_byte_flip_changes_the_digest(files in arb_file_set()) {
        let name = files.keys().next().unwrap().clone();

        let original = tempfile::tempdir().unwrap();
        write_files(original.path(), &files);
        let before = compute_fingerprint(original.path()).unwrap();

        let mut mutated = files.clone();
        let content = mutated.get_mut(&name).unwrap();
        if content.is_empty() {
            content.push(0x01);
        } else {
            content[0] ^= 0xff;
        }

        let changed = tempfile::tempdir().unwrap();
        write_files(changed.path(), &mutated);
        let after = compute_fingerprint(changed.path()).unwrap();

        prop_assert_ne!(before, after);
    }
}
