//! C9 — Differ.
//!
//! Structurally compares two previously-built and re-loaded snapshots (a
//! pair of Master Structures, or a pair of Dependency Maps) and reports
//! every key, subkey, and list element that differs between them.
//!
//! Unlike the upstream tool, list comparisons under the binary-forensics
//! catalogs (`binaries`, `libraries`, `files`, `strings`) fold a library
//! appearing under two different shared-object version suffixes (e.g.
//! `libfoo.so.1` vs `libfoo.so.2`) into a single consolidated `updates`
//! note instead of reporting it as one item missing from each side — a
//! rebuild against a patched system routinely perturbs these versions and
//! reporting them as plain additions/removals drowns out differences that
//! actually matter.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use slog::Logger;

use crate::error::{Error, Result};

const LIBRARY_VERSION_KEYS: &[&str] = &["binaries", "libraries", "files", "strings"];

/// The portion of a shared-object name before its first `.`, e.g.
/// `libfoo.so.1` and `libfoo-dbg.so.2` both reduce to `libfoo` and
/// `libfoo-dbg` respectively — the granularity the library-version
/// suppression pass matches on.
fn basename_before_first_dot(name: &str) -> &str {
    name.split('.').next().unwrap_or(name)
}

/// One node of a structural diff: either a leaf message describing a
/// scalar or list mismatch, or a subtree of further differences keyed by
/// field name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Diff {
    Message(String),
    Tree(BTreeMap<String, Diff>),
}

/// Compare two JSON objects (typically a serialized [`crate::master::MasterStructure`]
/// or [`crate::closure::DependencyMap`] pair) and return every top-level key
/// that differs, recursively. Both inputs must be JSON objects — anything
/// else (not found, not JSON, a bare array/scalar) is a fatal shape
/// mismatch, per §7's `InputLoadFailure` policy: unlike every other
/// component, the differ has nothing sensible left to compare and cannot
/// just warn and continue.
pub fn compare(origin: &Value, comp: &Value, _log: &Logger) -> Result<BTreeMap<String, Diff>> {
    let (Some(origin_map), Some(comp_map)) = (origin.as_object(), comp.as_object()) else {
        return Err(Error::InputLoadFailure(
            "comparison inputs must both be JSON objects".to_string(),
        ));
    };

    let mut diff = BTreeMap::new();
    for (key, origin_val) in origin_map {
        match comp_map.get(key) {
            None => {
                diff.insert(
                    key.clone(),
                    Diff::Message("present in origin file but not the comparison file".to_string()),
                );
            }
            Some(comp_val) => {
                let suppress = LIBRARY_VERSION_KEYS.contains(&key.as_str());
                if let Some(d) = compare_value(origin_val, comp_val, suppress) {
                    diff.insert(key.clone(), d);
                }
            }
        }
    }
    for key in comp_map.keys() {
        if !origin_map.contains_key(key) {
            diff.insert(
                key.clone(),
                Diff::Message("present in comparison file but not the origin file".to_string()),
            );
        }
    }
    Ok(diff)
}

/// `suppress` is sticky once set at an ancestor key in [`LIBRARY_VERSION_KEYS`]
/// — every list nested beneath `libraries`/`binaries`/`files`/`strings`
/// gets the same version-noise suppression regardless of its own subkey
/// name (a unit or binary path, not one of those four names).
fn compare_value(origin: &Value, comp: &Value, suppress: bool) -> Option<Diff> {
    match (origin, comp) {
        (Value::String(a), Value::String(b)) => {
            if a != b {
                Some(Diff::Message(format!(
                    "origin file has: \"{}\", comparison file has: \"{}\"",
                    a, b
                )))
            } else {
                None
            }
        }
        (Value::Array(a), Value::Array(b)) => {
            let as_strings = |values: &[Value]| -> Vec<String> {
                values.iter().filter_map(|v| v.as_str().map(str::to_owned)).collect()
            };
            compare_lists(&as_strings(a), &as_strings(b), suppress)
        }
        (Value::Object(a), Value::Object(b)) => {
            let mut sub = BTreeMap::new();
            for (subkey, sub_origin) in a {
                match b.get(subkey) {
                    None => {
                        sub.insert(
                            subkey.clone(),
                            Diff::Message("found in origin file but not the comparison file".to_string()),
                        );
                    }
                    Some(sub_comp) => {
                        if let Some(d) = compare_value(sub_origin, sub_comp, suppress) {
                            sub.insert(subkey.clone(), d);
                        }
                    }
                }
            }
            for subkey in b.keys() {
                if !a.contains_key(subkey) {
                    sub.insert(
                        subkey.clone(),
                        Diff::Message("found in comparison file but not the origin file".to_string()),
                    );
                }
            }
            if sub.is_empty() {
                None
            } else {
                Some(Diff::Tree(sub))
            }
        }
        (a, b) => {
            if a != b {
                Some(Diff::Message(format!(
                    "origin file has: {}, comparison file has: {}",
                    a, b
                )))
            } else {
                None
            }
        }
    }
}

/// Order-insensitive comparison of two string lists. When `suppress_versions`
/// is set, a pair of items unique to each side that share their
/// basename-before-first-`.` (e.g. `libfoo.so.1` and `libfoo.so.2`, stem
/// `libfoo`) are pulled out of the unique lists and folded into a single
/// `updates` entry instead, keyed by that shared stem.
fn compare_lists(origin: &[String], comp: &[String], suppress_versions: bool) -> Option<Diff> {
    let origin_set: BTreeSet<&String> = origin.iter().collect();
    let comp_set: BTreeSet<&String> = comp.iter().collect();

    let mut unique_to_origin: Vec<String> = origin
        .iter()
        .filter(|item| !comp_set.contains(item))
        .cloned()
        .collect();
    let mut unique_to_comp: Vec<String> = comp
        .iter()
        .filter(|item| !origin_set.contains(item))
        .cloned()
        .collect();

    let mut updates: BTreeMap<String, Diff> = BTreeMap::new();
    if suppress_versions {
        let mut matched_comp: BTreeSet<String> = BTreeSet::new();
        let remaining_origin: Vec<String> = unique_to_origin
            .into_iter()
            .filter(|o| {
                let stem = basename_before_first_dot(o);
                match unique_to_comp
                    .iter()
                    .find(|c| !matched_comp.contains(*c) && basename_before_first_dot(c) == stem)
                {
                    Some(c) => {
                        matched_comp.insert(c.clone());
                        updates.insert(
                            stem.to_string(),
                            Diff::Message(format!("Changed from {} to {}", o, c)),
                        );
                        false
                    }
                    None => true,
                }
            })
            .collect();
        unique_to_origin = remaining_origin;
        unique_to_comp.retain(|c| !matched_comp.contains(c));
    }

    let items = match (unique_to_origin.is_empty(), unique_to_comp.is_empty()) {
        (true, true) => None,
        (false, true) => Some(format!(
            "origin file contains {:?}, which the comparison file doesn't have",
            unique_to_origin
        )),
        (true, false) => Some(format!(
            "comparison file contains {:?}, which the origin file doesn't have",
            unique_to_comp
        )),
        (false, false) => Some(format!(
            "origin file contains {:?}, which the comparison file doesn't have; comparison file contains {:?}, which the origin file doesn't have",
            unique_to_origin, unique_to_comp
        )),
    };

    if updates.is_empty() {
        return items.map(Diff::Message);
    }

    let mut tree = BTreeMap::new();
    tree.insert("updates".to_string(), Diff::Tree(updates));
    if let Some(msg) = items {
        tree.insert("items".to_string(), Diff::Message(msg));
    }
    Some(Diff::Tree(tree))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn discard_logger() -> Logger {
        Logger::root(slog::Discard, slog::o!())
    }

    #[test]
    fn identical_objects_produce_no_diff() {
        let a = json!({"foo": "bar"});
        let log = discard_logger();
        assert!(compare(&a, &a, &log).unwrap().is_empty());
    }

    #[test]
    fn scalar_mismatch_is_reported() {
        let a = json!({"remote_path": "/a"});
        let b = json!({"remote_path": "/b"});
        let log = discard_logger();
        let diff = compare(&a, &b, &log).unwrap();
        assert!(matches!(diff.get("remote_path"), Some(Diff::Message(_))));
    }

    #[test]
    fn missing_top_level_key_is_reported_both_ways() {
        let a = json!({"only_in_a": "x"});
        let b = json!({"only_in_b": "y"});
        let log = discard_logger();
        let diff = compare(&a, &b, &log).unwrap();
        assert_eq!(diff.len(), 2);
        assert!(diff.contains_key("only_in_a"));
        assert!(diff.contains_key("only_in_b"));
    }

    #[test]
    fn non_object_input_is_a_fatal_input_load_failure() {
        let a = json!(["not", "an", "object"]);
        let b = json!({"foo": "bar"});
        let log = discard_logger();
        assert!(matches!(compare(&a, &b, &log), Err(Error::InputLoadFailure(_))));
    }

    #[test]
    fn library_version_suffix_difference_becomes_an_update_note() {
        let origin = vec!["libfoo.so.1".to_string()];
        let comp = vec!["libfoo.so.2".to_string()];
        match compare_lists(&origin, &comp, true) {
            Some(Diff::Tree(tree)) => match tree.get("updates") {
                Some(Diff::Tree(updates)) => assert_eq!(
                    updates.get("libfoo"),
                    Some(&Diff::Message("Changed from libfoo.so.1 to libfoo.so.2".to_string()))
                ),
                other => panic!("expected an updates subtree, got {:?}", other),
            },
            other => panic!("expected a tree diff, got {:?}", other),
        }
        // Without suppression the same lists are reported as a plain mismatch.
        assert!(matches!(compare_lists(&origin, &comp, false), Some(Diff::Message(_))));
    }

    #[test]
    fn genuinely_missing_library_is_still_reported_even_with_suppression() {
        let origin = vec!["libfoo.so.1".to_string()];
        let comp = vec!["libbar.so.1".to_string()];
        assert!(compare_lists(&origin, &comp, true).is_some());
    }

    #[test]
    fn update_note_and_genuinely_unique_items_coexist() {
        let origin = vec!["libfoo.so.1".to_string(), "libonly-origin.so.1".to_string()];
        let comp = vec!["libfoo.so.2".to_string(), "libonly-comp.so.1".to_string()];
        match compare_lists(&origin, &comp, true) {
            Some(Diff::Tree(tree)) => {
                assert!(tree.contains_key("updates"));
                assert!(tree.contains_key("items"));
            }
            other => panic!("expected a tree diff, got {:?}", other),
        }
    }

    #[test]
    fn nested_object_diff_is_scoped_to_its_subkey() {
        let a = json!({"libraries": {"/bin/foo": ["libfoo.so.1"]}});
        let b = json!({"libraries": {"/bin/foo": ["libfoo.so.1", "libbar.so.1"]}});
        let log = discard_logger();
        let diff = compare(&a, &b, &log).unwrap();
        match diff.get("libraries") {
            Some(Diff::Tree(sub)) => assert!(sub.contains_key("/bin/foo")),
            other => panic!("expected nested tree diff, got {:?}", other),
        }
    }

    #[test]
    fn version_suppression_applies_through_nested_libraries_catalog() {
        let a = json!({"libraries": {"/bin/foo": ["libfoo.so.1"]}});
        let b = json!({"libraries": {"/bin/foo": ["libfoo.so.2"]}});
        let log = discard_logger();
        let diff = compare(&a, &b, &log).unwrap();
        match diff.get("libraries") {
            Some(Diff::Tree(sub)) => match sub.get("/bin/foo") {
                Some(Diff::Tree(entry)) => assert!(entry.contains_key("updates")),
                other => panic!("expected nested update entry, got {:?}", other),
            },
            other => panic!("expected nested tree diff, got {:?}", other),
        }
    }
}
