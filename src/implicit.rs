//! C4 — Implicit Dependency Synthesizer.
//!
//! Populates [`UnitFileRecord::synthesized`] with the dependency and
//! ordering directives systemd creates automatically based on unit type
//! and directive presence, per the systemd.automount(5)/path(5)/socket(5)/
//! service(5)/timer(5)/exec(5)/resource-control(5) implicit-dependency
//! rules.
//!
//! Every applicable rule below fires independently and the resulting sets
//! are unioned into `synthesized` — this supersedes the upstream tool's
//! `if`/`elif` chain, under which at most one rule could ever apply to a
//! given unit file.

use crate::artifact::UnitFileRecord;
use crate::unit_kind::UnitKind;

fn stem(unit_name: &str) -> &str {
    unit_name.split('.').next().unwrap_or(unit_name)
}

fn add(record: &mut UnitFileRecord, directive: &str, values: Vec<String>) {
    record
        .synthesized
        .entry(directive.to_string())
        .or_default()
        .extend(values);
}

/// Apply every applicable implicit-dependency rule to `record`, given the
/// unit's own file name (used to derive its instance stem).
pub fn synthesize(record: &mut UnitFileRecord, unit_name: &str) {
    let stem = stem(unit_name);
    let kind = record.kind;

    // systemd.automount(5), automatic dependencies
    if kind == UnitKind::Automount {
        add(record, "Before", vec![format!("{}.mount", stem)]);
    }

    // systemd.path(5), description para 3: an implicit Unit= is added
    // pointing at the same-named service unless one was given explicitly.
    if kind == UnitKind::Path && !record.directives.contains_key("Unit") {
        add(record, "iPath_for", vec![format!("{}.service", stem)]);
        add(record, "Before", vec![format!("{}.service", stem)]);
    }

    // systemd.socket(5), description para 4: same rule for sockets.
    if kind == UnitKind::Socket && !record.directives.contains_key("Service") {
        add(record, "iSocket_of", vec![format!("{}.service", stem)]);
    }

    // systemd.socket(5), automatic dependencies: BindToDevice= implies a
    // BindsTo= (and, per systemd.device(5), an After=) on that device unit.
    if let Some(device) = record.directives.get("BindToDevice").cloned() {
        add(record, "BindsTo", device.clone());
        add(record, "After", device);
    }

    // systemd.service(5), automatic dependencies, bullet 1: Type=dbus pulls
    // in dbus.socket.
    if let Some(ty) = record.directives.get("Type") {
        if ty.iter().any(|v| v == "dbus") {
            add(record, "Requires", vec!["dbus.socket".to_string()]);
            add(record, "After", vec!["dbus.socket".to_string()]);
        }
    }

    // systemd.service(5), automatic dependencies, bullet 2: Sockets= pulls
    // in each listed socket unit.
    if let Some(sockets) = record.directives.get("Sockets").cloned() {
        add(record, "Wants", sockets.clone());
        add(record, "After", sockets);
    }

    // systemd.timer(5), description para 3 / implicit dependencies bullet 1.
    if kind == UnitKind::Timer && !record.directives.contains_key("Unit") {
        add(record, "iTimer_for", vec![format!("{}.service", stem)]);
        add(record, "Before", vec![format!("{}.service", stem)]);
    }

    // systemd.exec(5), implicit dependencies, bullet 4.
    if record.directives.contains_key("TTYPath") {
        add(
            record,
            "After",
            vec!["systemd-vconsole-setup.service".to_string()],
        );
    }

    // systemd.exec(5), implicit dependencies, bullet 5.
    if record.directives.contains_key("LogNamespace") {
        add(
            record,
            "Requires",
            vec!["systemd-journald@.service".to_string()],
        );
    }

    // systemd.resource-control(5), implicit dependencies, bullet 1.
    if let Some(slice) = record.directives.get("Slice").cloned() {
        add(record, "Requires", slice.clone());
        add(record, "After", slice);
    }

    // systemd.unit(5), templates: an instantiated unit depends on its
    // template and, absent an explicit Slice=, on a same-named slice.
    if let Some(at_idx) = unit_name.find('@') {
        let prefix = &unit_name[..at_idx];
        let after_at = &unit_name[at_idx + 1..];
        let instance = after_at.split('.').next().unwrap_or(after_at);
        if !instance.is_empty() {
            add(record, "iTemplate_of", vec![format!("{}@.{}", prefix, kind.as_str())]);
            add(record, "iSlice_of", vec![format!("{}.slice", prefix)]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn unit(kind: UnitKind, directives: &[(&str, &[&str])]) -> UnitFileRecord {
        let mut map = BTreeMap::new();
        for (k, v) in directives {
            map.insert(k.to_string(), v.iter().map(|s| s.to_string()).collect());
        }
        UnitFileRecord {
            kind,
            directives: map,
            synthesized: BTreeMap::new(),
        }
    }

    #[test]
    fn automount_gets_before_mount() {
        let mut u = unit(UnitKind::Automount, &[]);
        synthesize(&mut u, "home.automount");
        assert_eq!(
            u.synthesized.get("Before").unwrap(),
            &vec!["home.mount".to_string()]
        );
    }

    #[test]
    fn path_without_unit_gets_implicit_service() {
        let mut u = unit(UnitKind::Path, &[]);
        synthesize(&mut u, "foo.path");
        assert_eq!(
            u.synthesized.get("iPath_for").unwrap(),
            &vec!["foo.service".to_string()]
        );
        assert_eq!(
            u.synthesized.get("Before").unwrap(),
            &vec!["foo.service".to_string()]
        );
    }

    #[test]
    fn path_with_explicit_unit_suppresses_implicit_rule() {
        let mut u = unit(UnitKind::Path, &[("Unit", &["custom.service"])]);
        synthesize(&mut u, "foo.path");
        assert!(!u.synthesized.contains_key("iPath_for"));
    }

    #[test]
    fn multiple_independent_rules_all_fire_and_union() {
        // A service with both Type=dbus and TTYPath= should get both rule
        // sets' contributions to After=, unioned rather than only one
        // firing.
        let mut u = unit(
            UnitKind::Service,
            &[("Type", &["dbus"]), ("TTYPath", &["/dev/tty1"])],
        );
        synthesize(&mut u, "foo.service");
        let after = u.synthesized.get("After").unwrap();
        assert!(after.contains(&"dbus.socket".to_string()));
        assert!(after.contains(&"systemd-vconsole-setup.service".to_string()));
        assert_eq!(
            u.synthesized.get("Requires").unwrap(),
            &vec!["dbus.socket".to_string()]
        );
    }

    #[test]
    fn instantiated_unit_gets_template_and_slice() {
        let mut u = unit(UnitKind::Service, &[]);
        synthesize(&mut u, "getty@tty1.service");
        assert_eq!(
            u.synthesized.get("iTemplate_of").unwrap(),
            &vec!["getty@.service".to_string()]
        );
        assert_eq!(
            u.synthesized.get("iSlice_of").unwrap(),
            &vec!["getty.slice".to_string()]
        );
    }

    #[test]
    fn bare_template_unit_has_no_empty_instance_rule() {
        let mut u = unit(UnitKind::Service, &[]);
        synthesize(&mut u, "getty@.service");
        assert!(!u.synthesized.contains_key("iTemplate_of"));
        assert!(!u.synthesized.contains_key("iSlice_of"));
    }

    #[test]
    fn bind_to_device_adds_binds_to_and_after() {
        let mut u = unit(UnitKind::Socket, &[("BindToDevice", &["eth0.device"])]);
        synthesize(&mut u, "foo.socket");
        assert_eq!(
            u.synthesized.get("BindsTo").unwrap(),
            &vec!["eth0.device".to_string()]
        );
        assert_eq!(
            u.synthesized.get("After").unwrap(),
            &vec!["eth0.device".to_string()]
        );
    }
}
