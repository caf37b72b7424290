//! C2 — Binary Inspector.
//!
//! Extracts the direct NEEDED-library set from an ELF executable in-process
//! via `goblin` (see SPEC_FULL.md §10.1 for why this supersedes shelling out
//! to `objdump`/`ld.so`), and shells out to `strings` to harvest file-like
//! and path-like string constants. Recursion across the library closure
//! uses a fixed candidate-directory probe instead of the live dynamic
//! linker, since the alternative root's linker cannot safely be invoked.

use std::collections::BTreeSet;
use std::path::Path;
use std::process::Command;

use once_cell::sync::Lazy;
use regex::Regex;
use slog::{debug, Logger};

use crate::config::{Config, LIB_DIRS};

static FILE_EXT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^.+\.(cfg|conf|ini|log|exe|der|crt|cer|pem|crl|pfx|p8|p8e|pk8|p10|csr|p7r|p7s|p7m|p7c|p7b|keystore|p12|pkcs12)$",
    )
    .unwrap()
});

static PATH_LIKE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^/\w+(/[\w.\-]*)+$").unwrap());

/// Forensic extraction results for a single executable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BinaryForensics {
    pub needed: BTreeSet<String>,
    pub files: BTreeSet<String>,
    pub strings: BTreeSet<String>,
}

/// Parse the ELF header at `path` (already joined with the alternative
/// root) and return the basenames listed as `DT_NEEDED`. An unreadable or
/// non-ELF file yields an empty set rather than propagating an error — the
/// build must continue past a single bad binary.
pub fn needed_libraries(path: &Path, log: &Logger) -> BTreeSet<String> {
    let buf = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) => {
            debug!(log, "could not read binary"; "path" => %path.display(), "err" => %e);
            return BTreeSet::new();
        }
    };
    match goblin::elf::Elf::parse(&buf) {
        Ok(elf) => elf.libraries.into_iter().map(str::to_owned).collect(),
        Err(e) => {
            debug!(log, "not a parseable ELF binary"; "path" => %path.display(), "err" => %e);
            BTreeSet::new()
        }
    }
}

/// Run the `strings` tool over `path` and split its output into file-like
/// tokens (matching a known configuration/log/certificate extension) and
/// path-like tokens (absolute, slash-separated). A leading `key=` prefix is
/// stripped from any matched token.
pub fn strings_and_files(cfg: &Config, path: &Path, log: &Logger) -> (BTreeSet<String>, BTreeSet<String>) {
    let output = match Command::new(&cfg.strings_tool).arg(path).output() {
        Ok(o) if o.status.success() => o,
        Ok(o) => {
            debug!(log, "strings exited non-zero"; "path" => %path.display(), "status" => ?o.status.code());
            return (BTreeSet::new(), BTreeSet::new());
        }
        Err(e) => {
            debug!(log, "failed to invoke strings tool"; "path" => %path.display(), "err" => %e);
            return (BTreeSet::new(), BTreeSet::new());
        }
    };
    let text = String::from_utf8_lossy(&output.stdout);

    let mut files = BTreeSet::new();
    let mut paths = BTreeSet::new();
    for token in text.split_whitespace() {
        if FILE_EXT_RE.is_match(token) {
            files.insert(strip_key_prefix(token));
        } else if PATH_LIKE_RE.is_match(token) {
            paths.insert(strip_key_prefix(token));
        }
    }
    // path_regex can match the same tokens as file_regex; keep files out of
    // the path-like set (symmetric_difference in the original).
    for f in &files {
        paths.remove(f);
    }
    (files, paths)
}

fn strip_key_prefix(token: &str) -> String {
    token.rsplit('=').next().unwrap_or(token).to_owned()
}

/// Inspect one executable end-to-end: NEEDED set, file-like and path-like
/// strings. Does not recurse into the NEEDED set's own libraries — see
/// [`record_library_deps`] for that.
pub fn inspect_binary(cfg: &Config, bin_path: &str, log: &Logger) -> BinaryForensics {
    let real_path = cfg.under_root(bin_path);
    let needed = needed_libraries(&real_path, log);
    let (files, strings) = strings_and_files(cfg, &real_path, log);
    BinaryForensics { needed, files, strings }
}

/// Recursively resolve every library in `lib_list` against the fixed
/// candidate directories, folding newly discovered NEEDED sets into
/// `libraries`. Guarded against cycles by checking key presence before
/// recursing — a library already in `libraries` is never re-probed.
pub fn record_library_deps(
    cfg: &Config,
    lib_list: &BTreeSet<String>,
    libraries: &mut std::collections::BTreeMap<String, BTreeSet<String>>,
    log: &Logger,
) {
    for library in lib_list {
        if libraries.contains_key(library) {
            continue;
        }
        let mut found = None;
        for lib_dir in LIB_DIRS {
            let candidate = cfg.under_root(format!("{}/{}", lib_dir, library));
            if candidate.is_file() {
                found = Some(candidate);
                break;
            }
        }
        let Some(candidate) = found else { continue };
        let new_libs = needed_libraries(&candidate, log);
        libraries.insert(library.clone(), new_libs.clone());
        if !new_libs.is_empty() {
            record_library_deps(cfg, &new_libs, libraries, log);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_ext_regex_matches_known_config_suffixes() {
        assert!(FILE_EXT_RE.is_match("/etc/app.conf"));
        assert!(FILE_EXT_RE.is_match("cert.pem"));
        assert!(!FILE_EXT_RE.is_match("/usr/bin/noext"));
    }

    #[test]
    fn path_like_regex_matches_absolute_paths() {
        assert!(PATH_LIKE_RE.is_match("/var/log/app/current"));
        assert!(!PATH_LIKE_RE.is_match("relative/path"));
    }

    #[test]
    fn strip_key_prefix_keeps_text_after_last_equals() {
        assert_eq!(strip_key_prefix("KEY=/etc/app.conf"), "/etc/app.conf");
        assert_eq!(strip_key_prefix("/etc/app.conf"), "/etc/app.conf");
    }

    #[test]
    fn needed_libraries_on_missing_file_is_empty() {
        let log = Logger::root(slog::Discard, slog::o!());
        let set = needed_libraries(Path::new("/nonexistent/binary"), &log);
        assert!(set.is_empty());
    }
}
