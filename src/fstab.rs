//! C5 — fstab Generator Emulator.
//!
//! Mimics the units `systemd-fstab-generator(8)` would dynamically create
//! at boot from `/etc/fstab`, without actually mounting anything. These
//! synthetic units are folded into the Master Structure under
//! `/run/systemd/generator/` so the closure engine can traverse into them
//! exactly as it would a unit file found on disk.

use std::collections::BTreeMap;

use slog::{debug, warn, Logger};

use crate::artifact::{Artifact, UnitFileRecord};
use crate::config::Config;
use crate::unit_kind::UnitKind;

const GENERATOR_DIR: &str = "/run/systemd/generator/";

/// Parse `cfg.fstab_path` and return one synthesized [`Artifact::FstabUnit`]
/// per non-comment entry, keyed by its full generator path. A missing or
/// unreadable fstab yields an empty map rather than failing the whole
/// build.
pub fn parse_fstab(cfg: &Config, log: &Logger) -> BTreeMap<String, Artifact> {
    let content = match std::fs::read_to_string(&cfg.fstab_path) {
        Ok(c) => c,
        Err(e) => {
            debug!(log, "no fstab to synthesize units from"; "path" => %cfg.fstab_path.display(), "err" => %e);
            return BTreeMap::new();
        }
    };

    let mut out = BTreeMap::new();
    for line in content.lines() {
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        if fields.len() < 4 {
            warn!(log, "malformed fstab line, skipping"; "line" => line);
            continue;
        }
        let (device, mount_path, fs_type, options) = (fields[0], fields[1], fields[2], fields[3]);

        let unit_name = mount_path_to_unit_name(device, mount_path, fs_type);
        let kind = unit_name
            .rsplit('.')
            .next()
            .and_then(UnitKind::from_suffix)
            .unwrap_or(UnitKind::Mount);

        let mut record = UnitFileRecord {
            kind,
            ..Default::default()
        };
        record.extend_directive(
            "Description",
            vec!["This is a unit file that will be dynamically created by systemd-fstab-generator".to_string()],
        );
        record.extend_directive(
            "Documentation",
            vec!["man:fstab(5) man:systemd-fstab-generator(8)".to_string()],
        );
        record.extend_directive("SourcePath", vec!["/etc/fstab".to_string()]);
        record.extend_directive("Where", vec![mount_path.to_string()]);
        record.extend_directive("What", vec![resolve_device_entry(device)]);
        record.extend_directive("Type", vec![fs_type.to_string()]);
        record.extend_directive("Options", vec![options.to_string()]);

        let key = format!("{}{}", GENERATOR_DIR, unit_name);
        out.insert(key, Artifact::FstabUnit(record));
    }
    out
}

fn resolve_device_entry(entry: &str) -> String {
    if entry.contains("UUID") {
        if let Some(uuid) = entry.split('=').next_back() {
            return format!("/dev/disk/by-uuid{}", uuid);
        }
    }
    entry.to_string()
}

fn mount_path_to_unit_name(device_name: &str, mount_path: &str, fs_type: &str) -> String {
    let mount_path = mount_path.trim_start_matches('/');
    if mount_path.is_empty() {
        return "-.mount".to_string();
    }
    if fs_type == "swap" {
        if device_name.to_uppercase().contains("UUID") {
            return format!("dev-disk-by\\x2duuid-{}.swap", device_to_unit_name(device_name));
        }
        return format!("{}.swap", device_name.trim_start_matches('/').replace('/', "-"));
    }
    format!("{}.mount", mount_path.replace('/', "-"))
}

fn device_to_unit_name(file_path: &str) -> String {
    file_path
        .rsplit('=')
        .next()
        .unwrap_or(file_path)
        .replace('-', "\\x2d")
}
