//! C8 — Closure Engine.
//!
//! Breadth-first worklist over the Master Structure starting from an
//! origin unit, producing a [`DependencyMap`]: every unit transitively
//! reachable through a dependency-creating directive, each annotated with
//! the reverse edge that reached it and the binary forensics pulled in by
//! its command directives.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use slog::{debug, info, Logger};

use crate::artifact::Artifact;
use crate::depunit::DependencyUnit;
use crate::master::MasterStructure;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencyMap {
    pub units: BTreeMap<String, DependencyUnit>,
    pub dynamic_mount_points: BTreeMap<String, String>,
}

/// Walk the transitive closure of dependency-creating directives starting
/// at `origin_unit`, within `master`. A unit name that never matches any
/// Master Structure key simply yields an otherwise-empty [`DependencyUnit`]
/// (it is recorded, but carries no directives) — the engine never errors
/// out over a dangling reference.
pub fn build_deps(master: &MasterStructure, origin_unit: &str, log: &Logger) -> Result<DependencyMap> {
    info!(log, "starting the dependency relationship mapping"; "origin" => origin_unit);

    let mut units: BTreeMap<String, DependencyUnit> = BTreeMap::new();
    let mut unrecorded: VecDeque<(String, Option<String>, Option<String>)> = VecDeque::new();
    unrecorded.push_back((origin_unit.to_string(), None, None));

    let mut seen: BTreeSet<(String, String, String)> = BTreeSet::new();
    seen.insert((origin_unit.to_string(), "None".to_string(), "None".to_string()));

    while let Some((current_unit, parent_path, dep_type)) = unrecorded.pop_front() {
        let mut new_unit = DependencyUnit::new(
            current_unit.clone(),
            parent_path.as_deref(),
            dep_type.as_deref(),
        );
        let mut new_tups = Vec::new();

        debug!(log, "searching master structure"; "unit" => &current_unit);

        if let Some(prev) = units.get(&current_unit) {
            new_unit.load_from_dep_map(prev);
        } else {
            for (key, artifact) in &master.artifacts {
                let basename = key.rsplit('/').next().unwrap_or(key);
                if !basename.contains(&new_unit.unit_name) {
                    continue;
                }
                new_unit.load_from_ms(artifact);
                if matches!(artifact, Artifact::SymLink(_)) {
                    new_tups.extend(new_unit.create_dep_tups(key));
                }
            }
        }

        attach_binary_metadata(master, &mut new_unit);

        new_tups.extend(new_unit.create_dep_tups(&current_unit));
        units.insert(new_unit.unit_name.clone(), new_unit);

        for (dep, parent, kind) in new_tups {
            if kind == "sym_linked_from" && !parent.contains('/') {
                debug!(log, "discarding sym link duplicate tuple"; "dep" => &dep, "parent" => &parent);
                continue;
            }
            let tup = (dep.clone(), parent.clone(), kind.clone());
            if seen.contains(&tup) {
                continue;
            }
            seen.insert(tup);
            unrecorded.push_back((dep, Some(parent), Some(kind)));
        }
    }

    info!(log, "finished recording all dependency relationships");

    let (fstab_units, dynamic_mount_points) = record_fstab_units(master);
    for (name, unit) in fstab_units {
        units.insert(name, unit);
    }

    info!(log, "creating nested mount unit dependencies");
    apply_nested_mount_dependencies(&mut units, log);

    Ok(DependencyMap {
        units,
        dynamic_mount_points,
    })
}

/// Resolve each command this unit's directives named to the binary key it
/// was cataloged under while building the Master Structure, then pull in
/// its NEEDED closure, files, and strings. Pure lookup against `master`'s
/// catalogs — this component has no filesystem access of its own.
fn attach_binary_metadata(master: &MasterStructure, unit: &mut DependencyUnit) {
    let commands: Vec<String> = unit.commands.iter().cloned().collect();
    for command in &commands {
        let Some(binary) = resolve_binary_key(master, command) else {
            continue;
        };
        unit.binaries.insert(binary.clone());
        if let Some(needed) = master.binaries.get(&binary) {
            find_lib_deps(needed, &master.libraries, &mut unit.libraries);
        }
        if let Some(files) = master.files.get(&binary) {
            unit.files.extend(files.iter().cloned());
        }
        if let Some(strings) = master.strings.get(&binary) {
            unit.strings.extend(strings.iter().cloned());
        }
    }
}

fn resolve_binary_key(master: &MasterStructure, command: &str) -> Option<String> {
    let first = command.split_whitespace().next()?;
    let stripped = first.trim_start_matches(['@', '-', ':', '+', '!']);
    if master.binaries.contains_key(stripped) {
        return Some(stripped.to_string());
    }
    let base = stripped.rsplit('/').next().unwrap_or(stripped);
    master
        .binaries
        .keys()
        .find(|k| k.rsplit('/').next() == Some(base))
        .cloned()
}

fn find_lib_deps(seed: &BTreeSet<String>, libraries: &BTreeMap<String, BTreeSet<String>>, acc: &mut BTreeSet<String>) {
    for lib in seed {
        if acc.insert(lib.clone()) {
            if let Some(next) = libraries.get(lib) {
                find_lib_deps(next, libraries, acc);
            }
        }
    }
}

/// Every `fstab_unit` in the Master Structure is a unit that would only
/// come into existence once `systemd-fstab-generator(8)` runs at boot; it
/// is recorded into the dependency map unconditionally (not only when
/// reached by the closure walk) so the mount it will perform is visible
/// even when nothing in the origin unit's closure references it directly.
fn record_fstab_units(
    master: &MasterStructure,
) -> (Vec<(String, DependencyUnit)>, BTreeMap<String, String>) {
    let mut out = Vec::new();
    let mut mount_points = BTreeMap::new();

    for (key, artifact) in &master.artifacts {
        let Artifact::FstabUnit(record) = artifact else {
            continue;
        };
        let unit_name = key.rsplit('/').next().unwrap_or(key).to_string();
        let mut unit = DependencyUnit::new(unit_name.clone(), None, None);
        unit.load_from_ms(artifact);

        let where_val = record.get("Where").and_then(|v| v.first()).cloned().unwrap_or_default();
        let type_val = record.get("Type").and_then(|v| v.first()).cloned().unwrap_or_default();
        mount_points.insert(
            unit_name.clone(),
            format!(
                "'{}' will be dynamically mounted by '{}' as a(n) '{}' filesystem",
                where_val, key, type_val
            ),
        );
        out.push((unit_name, unit));
    }
    (out, mount_points)
}

/// systemd.mount(5), implicit dependencies bullet 1: a mount unit nested
/// under another mount's path gains a `Requires=`/`After=` on the
/// containing mount. Detected here by substring match on the dash-joined
/// unit stem, since all unit file dependencies are recorded by now.
fn apply_nested_mount_dependencies(units: &mut BTreeMap<String, DependencyUnit>, log: &Logger) {
    let mount_units: Vec<String> = units
        .keys()
        .filter(|k| k.rsplit('.').next().map(|s| s.contains("mount")).unwrap_or(false))
        .cloned()
        .collect();

    for unit_file in &mount_units {
        let stem = unit_file.split('.').next().unwrap_or(unit_file);
        for comp_unit in &mount_units {
            if unit_file == comp_unit {
                continue;
            }
            let comp_stem = comp_unit.split('.').next().unwrap_or(comp_unit);
            if !comp_stem.contains(stem) {
                continue;
            }
            debug!(log, "nested mount dependency"; "child" => comp_unit, "parent" => unit_file);
            if let Some(u) = units.get_mut(comp_unit) {
                u.forward
                    .entry("Requires".to_string())
                    .or_default()
                    .insert(unit_file.clone());
                u.forward
                    .entry("After".to_string())
                    .or_default()
                    .insert(unit_file.clone());
                u.dependencies.insert(unit_file.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::master::build_master;
    use crate::testutil::FixtureRoot;

    fn discard_logger() -> Logger {
        Logger::root(slog::Discard, slog::o!())
    }

    #[test]
    fn walks_wants_directory_closure() {
        let fx = FixtureRoot::new("closure_wants").unwrap();
        fx.unit("multi-user.target", "[Unit]\nDescription=mu\n");
        fx.unit("foo.service", "[Unit]\nDescription=foo\n[Service]\nExecStart=/bin/true\n");
        fx.dep_dir("multi-user.target.wants", &["foo.service"]);
        let cfg = fx.config();
        let log = discard_logger();
        let ms = build_master(&cfg, &log).unwrap();
        let deps = build_deps(&ms, "multi-user.target", &log).unwrap();

        assert!(deps.units.contains_key("multi-user.target"));
        assert!(deps.units.contains_key("foo.service"));
        let foo = &deps.units["foo.service"];
        assert!(foo.reverse.get("wanted_by").unwrap().contains("multi-user.target"));
    }

    #[test]
    fn dangling_dependency_is_recorded_without_directives() {
        let fx = FixtureRoot::new("closure_dangling").unwrap();
        fx.unit(
            "multi-user.target",
            "[Unit]\nDescription=mu\nWants=ghost.service\n",
        );
        let cfg = fx.config();
        let log = discard_logger();
        let ms = build_master(&cfg, &log).unwrap();
        let deps = build_deps(&ms, "multi-user.target", &log).unwrap();
        assert!(deps.units.contains_key("ghost.service"));
        assert!(deps.units["ghost.service"].forward.is_empty());
    }

    #[test]
    fn fstab_units_appear_as_dynamic_mount_points() {
        let fx = FixtureRoot::new("closure_fstab").unwrap();
        fx.unit("default.target", "[Unit]\nDescription=d\n");
        fx.fstab("/dev/sda1 /var/lib/foo ext4 defaults 0 1\n");
        let cfg = fx.config();
        let log = discard_logger();
        let ms = build_master(&cfg, &log).unwrap();
        let deps = build_deps(&ms, "default.target", &log).unwrap();
        assert!(deps.units.contains_key("var-lib-foo.mount"));
        assert!(deps.dynamic_mount_points.contains_key("var-lib-foo.mount"));
    }
}
