//! C6 — Master Structure Builder.
//!
//! Walks every search directory under the alternative root, classifies and
//! parses each entry via [`crate::artifact`], harvests binary forensics for
//! any command directive it finds along the way, and folds in the
//! generator-synthesized fstab units.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use slog::{debug, info, Logger};
use walkdir::WalkDir;

use crate::artifact::{self, Artifact, UnitFileRecord};
use crate::binary;
use crate::config::{Config, BIN_DIRS};
use crate::fstab;
use crate::unit_kind::COMMAND_DIRECTIVES;

/// The full catalog built by a single pass over the alternative root: every
/// recognized artifact, keyed by its alternative-root-relative path, plus
/// the binary/library/file/string tables gathered from command directives.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MasterStructure {
    pub remote_path: String,
    pub binaries: BTreeMap<String, BTreeSet<String>>,
    pub libraries: BTreeMap<String, BTreeSet<String>>,
    pub files: BTreeMap<String, BTreeSet<String>>,
    pub strings: BTreeMap<String, BTreeSet<String>>,
    pub artifacts: BTreeMap<String, Artifact>,
}

/// Build a [`MasterStructure`] from everything reachable under `cfg`'s
/// search directories. A single unreadable artifact is logged and skipped;
/// only a missing fstab or search directory is treated as expected. The
/// `anyhow::Result` wrapper gives callers a `?`-able entry point to attach
/// context to, matching the teacher's top-level build functions, even
/// though nothing below this walk currently raises past it.
pub fn build_master(cfg: &Config, log: &Logger) -> Result<MasterStructure> {
    info!(log, "beginning recording of all files in systemd folders");

    let mut ms = MasterStructure {
        remote_path: cfg.remote_root.to_string_lossy().into_owned(),
        ..Default::default()
    };

    let mut search_dirs = cfg.search_dirs.clone();
    // Avoid walking /lib/systemd/system/ twice when /lib is symlinked to
    // usr/lib, same as the upstream generator's dedup check.
    if let Ok(target) = std::fs::read_link(cfg.under_root("/lib")) {
        if target == Path::new("usr/lib") {
            search_dirs.retain(|d| d.as_os_str() != "/lib/systemd/system/");
        }
    }

    for search_dir in &search_dirs {
        let full_dir = cfg.under_root(search_dir);
        if !full_dir.exists() {
            continue;
        }
        for entry in WalkDir::new(&full_dir).min_depth(1).follow_links(false) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    debug!(log, "could not walk entry"; "err" => %e);
                    continue;
                }
            };
            let name = entry.file_name().to_string_lossy().into_owned();
            let parent = entry.path().parent().unwrap_or(entry.path());
            let relative_dir = {
                let mut s = cfg.strip_root(parent).to_string_lossy().into_owned();
                if !s.ends_with('/') {
                    s.push('/');
                }
                s
            };

            debug!(log, "processing entry"; "path" => %entry.path().display());
            let Some(parsed) = artifact::parse_entry(cfg, &relative_dir, &name, log) else {
                continue;
            };

            if let Artifact::UnitFile(unit) = &parsed {
                collect_binaries(cfg, unit, &mut ms, log);
            }

            ms.artifacts
                .insert(format!("{}{}", relative_dir, name), parsed);
        }
    }

    info!(log, "finished recording all systemd unit files into the master structure");

    for (key, unit) in fstab::parse_fstab(cfg, log) {
        ms.artifacts.entry(key).or_insert(unit);
    }

    Ok(ms)
}

/// For every command directive (`ExecStart=`, `ExecStop=`, ...) in `unit`,
/// resolve the named binary and, if not already cataloged, record its
/// direct NEEDED set, file-like strings, and path-like strings, then
/// recurse into its library closure.
fn collect_binaries(cfg: &Config, unit: &UnitFileRecord, ms: &mut MasterStructure, log: &Logger) {
    for directive in COMMAND_DIRECTIVES {
        let Some(commands) = unit.directives.get(*directive) else {
            continue;
        };
        for cmd in commands {
            if cmd.trim().is_empty() {
                continue;
            }
            let binary = get_bin_path(cfg, cmd);
            if binary.is_empty() || ms.binaries.contains_key(&binary) {
                continue;
            }

            let forensics = binary::inspect_binary(cfg, &binary, log);
            ms.binaries.insert(binary.clone(), forensics.needed.clone());
            ms.files.insert(binary.clone(), forensics.files);
            ms.strings.insert(binary.clone(), forensics.strings);

            if !forensics.needed.is_empty() {
                binary::record_library_deps(cfg, &forensics.needed, &mut ms.libraries, log);
            }
        }
    }
}

/// Resolve the first whitespace-delimited token of a command directive's
/// argument to an alternative-root-relative binary path, stripping the
/// systemd prefix characters (`@`, `-`, `:`, `+`, `!`) and, if the token
/// isn't already an existing path under the root, probing [`BIN_DIRS`].
fn get_bin_path(cfg: &Config, cmd_string: &str) -> String {
    let Some(first) = cmd_string.split_whitespace().next() else {
        return String::new();
    };
    let binary = remove_prefixes(first);
    if binary.is_empty() {
        return String::new();
    }

    if cfg.under_root(binary).is_file() {
        return binary.to_string();
    }
    for bin_dir in BIN_DIRS {
        let candidate_rel = format!("{}{}", bin_dir, binary.trim_start_matches('/'));
        if cfg.under_root(&candidate_rel).is_file() {
            return candidate_rel;
        }
    }
    binary.to_string()
}

fn remove_prefixes(binary: &str) -> &str {
    const PREFIXES: &[char] = &['@', '-', ':', '+', '!'];
    let trimmed = binary.trim_start_matches(PREFIXES);
    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FixtureRoot;

    fn discard_logger() -> Logger {
        Logger::root(slog::Discard, slog::o!())
    }

    #[test]
    fn remove_prefixes_strips_leading_modifiers() {
        assert_eq!(remove_prefixes("@-:+!/usr/bin/foo"), "/usr/bin/foo");
        assert_eq!(remove_prefixes("/usr/bin/foo"), "/usr/bin/foo");
    }

    #[test]
    fn builds_master_structure_from_fixture_tree() {
        let fx = FixtureRoot::new("master_build").unwrap();
        fx.unit("foo.service", "[Unit]\nDescription=demo\n[Service]\nExecStart=/usr/bin/true\n");
        fx.dep_dir("multi-user.target.wants", &["foo.service"]);
        let cfg = fx.config();
        let log = discard_logger();
        let ms = build_master(&cfg, &log).unwrap();

        assert!(ms.artifacts.contains_key("/etc/systemd/system/foo.service"));
        assert!(ms
            .artifacts
            .contains_key("/etc/systemd/system/multi-user.target.wants"));
    }

    #[test]
    fn folds_in_fstab_units_without_overwriting_real_units() {
        let fx = FixtureRoot::new("master_fstab_merge").unwrap();
        fx.fstab("/dev/sda1 / ext4 defaults 0 1\n");
        let cfg = fx.config();
        let log = discard_logger();
        let ms = build_master(&cfg, &log).unwrap();
        assert!(ms.artifacts.contains_key("/run/systemd/generator/-.mount"));
    }
}
