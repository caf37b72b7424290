//! C7 — Dependency Unit Aggregator.
//!
//! One [`DependencyUnit`] is built per unit name visited by the closure
//! engine. It folds together every Master Structure artifact whose key
//! resolves to that unit name, and records the reverse-dependency edge
//! that caused it to be visited in the first place.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::artifact::{Artifact, DepDirRecord, SymLinkRecord, UnitFileRecord};
use crate::unit_kind::COMMAND_DIRECTIVES;

/// Forward directive name -> the attribute that records the reverse edge
/// it implies. `sym_linked_to` is synthesized by this aggregator itself
/// (not a directive systemd recognizes) so the unit a symlink points at
/// can be told apart from the unit the symlink lives as.
pub const REV_DEP_MAP: &[(&str, &str)] = &[
    ("sym_linked_to", "sym_linked_from"),
    ("Wants", "wanted_by"),
    ("Requires", "required_by"),
    ("Requisite", "requisite_of"),
    ("BindsTo", "bound_by"),
    ("PartOf", "has_part"),
    ("Upholds", "upheld_by"),
    ("OnSuccess", "on_success_of"),
    ("Sockets", "socket_of"),
    ("Service", "uses_service"),
    ("iTimer_for", "has_timer"),
    ("iSocket_of", "has_socket"),
    ("iPath_for", "needs_path"),
    ("iTemplate_of", "uses_template"),
    ("iSlice_of", "uses_slice"),
];

const DEP_CREATING_DIRS: &[&str] = &["Wants", "Requires"];

/// One unit's accumulated dependency-mapping state: its forward
/// directives, the reverse edge it arrived by, and the binary forensics
/// pulled in through any command directive it carries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencyUnit {
    pub unit_name: String,
    pub parents: BTreeSet<String>,
    pub reverse_deps: BTreeSet<String>,
    pub dependencies: BTreeSet<String>,
    pub commands: BTreeSet<String>,
    pub r#where: BTreeSet<String>,
    /// Forward directive name (`Wants`, `Requires`, `iPath_for`, ...) to
    /// the set of units it names.
    pub forward: BTreeMap<String, BTreeSet<String>>,
    /// Reverse attribute name (`wanted_by`, `required_by`, ...) to the
    /// set of units that created that edge.
    pub reverse: BTreeMap<String, BTreeSet<String>>,
    pub binaries: BTreeSet<String>,
    pub libraries: BTreeSet<String>,
    pub files: BTreeSet<String>,
    pub strings: BTreeSet<String>,
}

impl DependencyUnit {
    pub fn new(unit_name: impl Into<String>, parent_unit_path: Option<&str>, rev_dep: Option<&str>) -> Self {
        let mut unit = Self {
            unit_name: unit_name.into(),
            ..Default::default()
        };
        unit.set_rev_dep(parent_unit_path, rev_dep);
        unit
    }

    fn set_rev_dep(&mut self, parent_unit_path: Option<&str>, rev_dep: Option<&str>) {
        let (Some(parent_path), Some(rev_dep)) = (parent_unit_path, rev_dep) else {
            return;
        };
        let parent = parent_path.rsplit('/').next().unwrap_or(parent_path).to_string();
        self.parents.insert(parent.clone());
        self.reverse_deps.insert(rev_dep.to_string());
        let value = if rev_dep == "sym_linked_from" {
            parent_path.to_string()
        } else {
            parent
        };
        self.reverse.entry(rev_dep.to_string()).or_default().insert(value);
    }

    /// Dispatch on the artifact's kind and fold its contribution into this
    /// unit's forward directives / dependency set.
    pub fn load_from_ms(&mut self, artifact: &Artifact) {
        match artifact {
            Artifact::DepDir(d) => self.update_ms_dep_dir(d),
            Artifact::SymLink(s) => self.update_ms_sym_link(s),
            Artifact::UnitFile(u) | Artifact::FstabUnit(u) => self.update_ms_unit_file(u),
        }
    }

    /// `.d` directories carry no `Wants=`/`Requires=` of their own; only
    /// `.wants`/`.requires` directories create dependencies.
    fn update_ms_dep_dir(&mut self, d: &DepDirRecord) {
        for dep in DEP_CREATING_DIRS {
            let values = match *dep {
                "Wants" => &d.wants,
                "Requires" => &d.requires,
                _ => continue,
            };
            if values.is_empty() {
                continue;
            }
            self.forward
                .entry(dep.to_string())
                .or_default()
                .extend(values.iter().cloned());
            self.dependencies.extend(values.iter().cloned());
        }
    }

    fn update_ms_sym_link(&mut self, s: &SymLinkRecord) {
        let target = format!("{}{}", s.sym_link_target_path, s.sym_link_target_unit);
        self.forward
            .entry("sym_linked_to".to_string())
            .or_default()
            .insert(target);
        self.dependencies.insert(s.sym_link_target_unit.clone());
    }

    fn update_ms_unit_file(&mut self, u: &UnitFileRecord) {
        for (directive, values) in u.directives.iter().chain(u.synthesized.iter()) {
            if directive == "Where" {
                self.r#where.extend(values.iter().cloned());
            } else if REV_DEP_MAP.iter().any(|(k, _)| k == directive) {
                self.forward
                    .entry(directive.clone())
                    .or_default()
                    .extend(values.iter().cloned());
                self.dependencies.extend(values.iter().cloned());
            }
            if COMMAND_DIRECTIVES.contains(&directive.as_str()) && !values.is_empty() {
                self.commands.extend(values.iter().cloned());
            }
        }
    }

    /// Merge a previously-recorded unit's state into this one. Used when
    /// the closure engine re-enters a unit it has already fully recorded
    /// through a different dependency path.
    pub fn load_from_dep_map(&mut self, prev: &DependencyUnit) {
        self.parents.extend(prev.parents.iter().cloned());
        self.reverse_deps.extend(prev.reverse_deps.iter().cloned());
        self.dependencies.extend(prev.dependencies.iter().cloned());
        self.commands.extend(prev.commands.iter().cloned());
        self.r#where.extend(prev.r#where.iter().cloned());
        self.binaries.extend(prev.binaries.iter().cloned());
        self.libraries.extend(prev.libraries.iter().cloned());
        self.files.extend(prev.files.iter().cloned());
        self.strings.extend(prev.strings.iter().cloned());
        for (k, v) in &prev.forward {
            self.forward.entry(k.clone()).or_default().extend(v.iter().cloned());
        }
        for (k, v) in &prev.reverse {
            self.reverse.entry(k.clone()).or_default().extend(v.iter().cloned());
        }
    }

    /// Produce one `(dependency basename, this unit, reverse-edge kind)`
    /// tuple per forward dependency this unit carries, for the closure
    /// engine to enqueue. Does not deduplicate against the worklist.
    pub fn create_dep_tups(&self, current_item: &str) -> Vec<(String, String, String)> {
        let mut tups = Vec::new();
        for (key, reverse_kind) in REV_DEP_MAP {
            let Some(values) = self.forward.get(*key) else {
                continue;
            };
            for dep in values {
                let basename = dep.rsplit('/').next().unwrap_or(dep).to_string();
                tups.push((basename, current_item.to_string(), reverse_kind.to_string()));
            }
        }
        tups
    }
}
