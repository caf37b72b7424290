//! C1 — Path & Symlink Resolver.
//!
//! Resolves a symlink's stored target against an alternative root without
//! following further link chains, so the result is the absolute path the
//! *target* filesystem would see at boot.

use std::path::{Path, PathBuf};

use slog::{warn, Logger};

use crate::config::Config;

/// The resolved form of a symlink target: the absolute directory it lives
/// in (always ending in `/`, with the alternative root stripped) and its
/// basename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub target_dir: String,
    pub target_basename: String,
}

/// Resolve the on-disk symlink at `link_path` (already joined with the
/// alternative root) into the path the booted system would resolve it to.
///
/// `link_parent` is the link's parent directory, alternative-root-relative
/// (e.g. `/etc/systemd/system/`), used to reconstruct a relative target.
pub fn resolve_symlink(
    cfg: &Config,
    link_path: &Path,
    link_parent: &str,
    log: &Logger,
) -> Option<ResolvedTarget> {
    let raw_target = match std::fs::read_link(link_path) {
        Ok(t) => t,
        Err(_) => {
            warn!(log, "not actually a symlink"; "path" => %link_path.display());
            return None;
        }
    };

    let target_basename = raw_target
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();

    let absolute = if raw_target.is_absolute() {
        raw_target.clone()
    } else {
        // Reconstruct the absolute form by joining against the link's
        // parent directory under the real (alternative-rooted) filesystem,
        // then lexically normalizing — mirrors chdir(parent); abspath(target).
        let real_parent = cfg.under_root(link_parent);
        lexical_normalize(&real_parent.join(&raw_target))
    };

    let stripped = cfg.strip_root(&absolute);

    // The original implementation builds target_path from the *parent* of
    // the resolved absolute path (it splits off the basename), so do the
    // same here: take everything up to the final component.
    let target_dir = {
        let mut s = stripped.to_string_lossy().into_owned();
        if !target_basename.is_empty() {
            if let Some(idx) = s.rfind(&format!("/{}", target_basename)) {
                s.truncate(idx);
            }
        }
        if !s.ends_with('/') {
            s.push('/');
        }
        s
    };

    Some(ResolvedTarget {
        target_dir,
        target_basename,
    })
}

/// Lexically resolve `.` and `..` components without touching the
/// filesystem (the link's own parent may not exist under an image root in
/// every test fixture, and we must never change the process cwd).
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        use std::path::Component::*;
        match component {
            CurDir => {}
            ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FixtureRoot;

    fn discard_logger() -> Logger {
        Logger::root(slog::Discard, slog::o!())
    }

    #[test]
    fn resolves_absolute_symlink_and_strips_root() {
        let fx = FixtureRoot::new("resolve_abs").unwrap();
        fx.unit("graphical.target", "[Unit]\n");
        fx.symlink_abs(
            "/etc/systemd/system/default.target",
            "/lib/systemd/system/graphical.target",
        );
        let cfg = fx.config();
        let log = discard_logger();
        let link_path = cfg.under_root("/etc/systemd/system/default.target");
        let resolved = resolve_symlink(&cfg, &link_path, "/etc/systemd/system/", &log).unwrap();
        assert_eq!(resolved.target_basename, "graphical.target");
        assert_eq!(resolved.target_dir, "/lib/systemd/system/");
    }

    #[test]
    fn resolves_relative_symlink() {
        let fx = FixtureRoot::new("resolve_rel").unwrap();
        fx.dir("etc/systemd/system/multi-user.target.wants");
        fx.unit("foo.service", "[Unit]\n");
        fx.symlink_rel(
            "/etc/systemd/system/multi-user.target.wants/foo.service",
            "../../system/foo.service",
        );
        let cfg = fx.config();
        let log = discard_logger();
        let link_path =
            cfg.under_root("/etc/systemd/system/multi-user.target.wants/foo.service");
        let resolved = resolve_symlink(
            &cfg,
            &link_path,
            "/etc/systemd/system/multi-user.target.wants/",
            &log,
        )
        .unwrap();
        assert_eq!(resolved.target_basename, "foo.service");
        assert_eq!(resolved.target_dir, "/etc/systemd/system/");
    }

    #[test]
    fn returns_none_for_non_symlink() {
        let fx = FixtureRoot::new("resolve_none").unwrap();
        fx.unit("foo.service", "[Unit]\n");
        let cfg = fx.config();
        let log = discard_logger();
        let path = cfg.under_root("/etc/systemd/system/foo.service");
        assert!(resolve_symlink(&cfg, &path, "/etc/systemd/system/", &log).is_none());
    }
}
