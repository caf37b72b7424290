//! C3 — Unit Artifact Parser.
//!
//! Classifies one filesystem entry under a search directory as a
//! dependency directory, a symbolic link, or a unit file, and parses it
//! into the corresponding [`Artifact`] variant.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use slog::{debug, warn, Logger};

use crate::config::Config;
use crate::implicit;
use crate::unit_kind::{UnitKind, SPACE_DELIM_OPTS};
use crate::paths;

/// `<unit>.d` / `<unit>.wants` / `<unit>.requires` directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepDirRecord {
    pub dependency_folder_paths: Vec<String>,
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub config_files: Vec<String>,
    #[serde(rename = "Wants", default, skip_serializing_if = "Vec::is_empty")]
    pub wants: Vec<String>,
    #[serde(rename = "Requires", default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<String>,
}

/// A symbolic link under a search directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymLinkRecord {
    pub sym_link_path: String,
    pub sym_link_unit: String,
    pub sym_link_target_path: String,
    pub sym_link_target_unit: String,
    pub dependencies: Vec<String>,
}

/// A parsed unit file (or a `fstab_unit` synthesized by C5, which shares
/// this same shape).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitFileRecord {
    pub kind: UnitKind,
    /// Directive name -> argument list, exactly as parsed from the file
    /// (including directives not recognized for this kind, recorded
    /// verbatim per §4.3).
    pub directives: BTreeMap<String, Vec<String>>,
    /// Directives synthesized by the implicit-dependency rule table
    /// (§4.4), kept separate so union-not-overwrite is trivial to apply.
    pub synthesized: BTreeMap<String, Vec<String>>,
}

impl UnitFileRecord {
    pub fn get(&self, directive: &str) -> Option<&Vec<String>> {
        self.directives.get(directive)
    }

    /// Union `values` into `directive`, creating the entry if absent.
    /// Implements the "duplicate directive lines append" rule from §4.3.
    pub fn extend_directive(&mut self, directive: &str, values: Vec<String>) {
        self.directives
            .entry(directive.to_string())
            .or_default()
            .extend(values);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "file_type", rename_all = "snake_case")]
pub enum Artifact {
    DepDir(DepDirRecord),
    SymLink(SymLinkRecord),
    UnitFile(UnitFileRecord),
    FstabUnit(UnitFileRecord),
}

impl Artifact {
    pub fn file_type(&self) -> &'static str {
        match self {
            Self::DepDir(_) => "dep_dir",
            Self::SymLink(_) => "sym_link",
            Self::UnitFile(_) => "unit_file",
            Self::FstabUnit(_) => "fstab_unit",
        }
    }
}

/// Classify and parse the filesystem entry named `name` inside
/// `relative_dir` (alternative-root-relative, trailing `/`). Returns
/// `None` when the entry is a directory whose name is not a recognized
/// dependency-directory kind (a warning is logged in that case), or when
/// the entry is neither a directory, a symlink, nor a regular file.
pub fn parse_entry(
    cfg: &Config,
    relative_dir: &str,
    name: &str,
    log: &Logger,
) -> Option<Artifact> {
    let full_path = cfg.under_root(format!("{}{}", relative_dir, name));

    // Symlinks must be checked before is_dir()/is_file(), both of which
    // follow links.
    if full_path.symlink_metadata().map(|m| m.file_type().is_symlink()).unwrap_or(false) {
        return parse_sym_link(cfg, relative_dir, name, &full_path, log).map(Artifact::SymLink);
    }
    if full_path.is_dir() {
        return parse_dep_dir(relative_dir, name, &full_path, log).map(Artifact::DepDir);
    }
    if full_path.is_file() {
        return Some(Artifact::UnitFile(parse_unit_file(
            cfg,
            relative_dir,
            name,
            &full_path,
            log,
        )));
    }
    warn!(log, "could not determine systemd file type"; "path" => %full_path.display());
    None
}

fn parse_dep_dir(relative_dir: &str, name: &str, full_path: &Path, log: &Logger) -> Option<DepDirRecord> {
    let dep_type = name.rsplit('.').next().unwrap_or("");

    let mut entries: Vec<String> = match std::fs::read_dir(full_path) {
        Ok(rd) => rd
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect(),
        Err(e) => {
            debug!(log, "could not list dependency directory"; "path" => %full_path.display(), "err" => %e);
            Vec::new()
        }
    };
    entries.sort();

    let dep_dir_path = format!("{}{}", relative_dir, name);
    let mut record = DepDirRecord {
        dependency_folder_paths: vec![dep_dir_path],
        ..Default::default()
    };

    match dep_type {
        "d" => {
            record.config_files = entries.clone();
            record.dependencies = entries;
        }
        "wants" => {
            record.wants = entries.clone();
            record.dependencies = entries;
        }
        "requires" => {
            record.requires = entries.clone();
            record.dependencies = entries;
        }
        other => {
            warn!(log, "unknown or invalid dependency-directory kind"; "kind" => other, "path" => %full_path.display());
            return None;
        }
    }

    Some(record)
}

fn parse_sym_link(
    cfg: &Config,
    relative_dir: &str,
    name: &str,
    full_path: &Path,
    log: &Logger,
) -> Option<SymLinkRecord> {
    let resolved = paths::resolve_symlink(cfg, full_path, relative_dir, log)?;
    Some(SymLinkRecord {
        sym_link_path: relative_dir.to_string(),
        sym_link_unit: name.to_string(),
        sym_link_target_path: resolved.target_dir,
        sym_link_target_unit: resolved.target_basename.clone(),
        dependencies: vec![resolved.target_basename],
    })
}

fn parse_unit_file(
    cfg: &Config,
    relative_dir: &str,
    name: &str,
    full_path: &Path,
    log: &Logger,
) -> UnitFileRecord {
    let suffix = name.rsplit('.').next().unwrap_or("");
    let kind = match UnitKind::from_suffix(suffix) {
        Some(k) => k,
        None => {
            warn!(log, "invalid or unknown unit file type, treating as target"; "path" => %full_path.display());
            UnitKind::Target
        }
    };

    let mut record = UnitFileRecord {
        kind,
        ..Default::default()
    };

    let content = match std::fs::read_to_string(full_path) {
        Ok(c) => c,
        Err(e) => {
            warn!(log, "could not open unit file"; "path" => %full_path.display(), "err" => %e);
            implicit::synthesize(&mut record, name);
            return record;
        }
    };

    let mut lines = content.lines();
    while let Some(line) = lines.next() {
        if !line.contains('=') || line.starts_with('#') {
            continue;
        }

        let mut joined = line.to_string();
        while joined.ends_with('\\') {
            joined.pop();
            match lines.next() {
                Some(next) => joined.push_str(next),
                None => break,
            }
        }

        let mut parts = joined.splitn(2, '=');
        let directive = parts.next().unwrap_or("").to_string();
        let arg_text = parts.next().unwrap_or("").to_string();

        let checked = check_option(&directive, kind, name, log);
        let args = format_arguments(&checked, &arg_text);
        record.extend_directive(&checked, args);
    }

    implicit::synthesize(&mut record, name);
    record
}

fn check_option(directive: &str, kind: UnitKind, unit_name: &str, log: &Logger) -> String {
    if kind.accepts(directive) {
        return directive.to_string();
    }
    warn!(
        log,
        "not a valid option for this unit kind";
        "option" => directive, "kind" => kind.as_str(), "unit" => unit_name
    );
    directive.to_string()
}

fn format_arguments(directive: &str, arg_text: &str) -> Vec<String> {
    if SPACE_DELIM_OPTS.contains(&directive) {
        arg_text.split_whitespace().map(str::to_owned).collect()
    } else {
        vec![arg_text.to_string()]
    }
}
