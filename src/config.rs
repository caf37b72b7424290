use std::path::{Path, PathBuf};

/// The 13 search directories systemd itself walks for system unit files, in
/// the order it walks them. Mirrors the fixed table the original tool reads
/// out of `unit_file_lists.sys_unit_paths`.
pub const SEARCH_DIRS: &[&str] = &[
    "/etc/systemd/system.control/",
    "/run/systemd/system.control/",
    "/run/systemd/transient/",
    "/run/systemd/generator.early/",
    "/etc/systemd/system/",
    "/etc/systemd/system.attached/",
    "/run/systemd/system/",
    "/run/systemd/system.attached/",
    "/run/systemd/generator/",
    "/lib/systemd/system/",
    "/usr/local/lib/systemd/system",
    "/usr/lib/systemd/system/",
    "/run/systemd/generator.late/",
];

/// Candidate directories probed, in order, when resolving the binary a
/// command directive names to an absolute path.
pub const BIN_DIRS: &[&str] = &["/bin/", "/sbin/", "/usr/bin/", "/usr/sbin/"];

/// Candidate directories probed when recursively resolving a library
/// basename to a file so its own NEEDED set can be inspected.
pub const LIB_DIRS: &[&str] = &[
    "/lib",
    "/lib32",
    "/lib64",
    "/libexec",
    "/lib/systemd",
    "/usr/lib",
    "/usr/lib/systemd",
    "/usr/lib/x86_64-linux-gnu",
    "/usr/lib32",
    "/usr/lib64",
    "/usr/libexec",
    "/var/lib",
];

/// Gathers everything that would otherwise be a bare string argument
/// threaded through every function in the crate: the alternative-root
/// prefix, the search-path list (overridable so tests can point it at a
/// temp directory), and the path to the fstab file.
#[derive(Debug, Clone)]
pub struct Config {
    pub remote_root: PathBuf,
    pub search_dirs: Vec<PathBuf>,
    pub fstab_path: PathBuf,
    pub strings_tool: PathBuf,
}

impl Config {
    /// Build a `Config` for inspecting the filesystem rooted at
    /// `remote_root` ("" for the live local root) using the fixed,
    /// systemd-defined search-path list.
    pub fn new(remote_root: impl Into<PathBuf>) -> Self {
        let remote_root = remote_root.into();
        let fstab_path = remote_root.join("etc/fstab");
        Self {
            search_dirs: SEARCH_DIRS.iter().map(PathBuf::from).collect(),
            fstab_path,
            remote_root,
            strings_tool: PathBuf::from("strings"),
        }
    }

    /// Join a path that is relative to the alternative root (e.g.
    /// `/etc/systemd/system/`) with the root itself, producing the real
    /// filesystem path to open.
    pub fn under_root(&self, relative: impl AsRef<Path>) -> PathBuf {
        let relative = relative.as_ref();
        let stripped = relative.strip_prefix("/").unwrap_or(relative);
        self.remote_root.join(stripped)
    }

    /// Strip the alternative-root prefix back off an absolute path that was
    /// built with [`Config::under_root`], so it reads as the path the
    /// target filesystem would see at boot.
    pub fn strip_root<'a>(&self, absolute: &'a Path) -> PathBuf {
        match absolute.strip_prefix(&self.remote_root) {
            Ok(rest) => Path::new("/").join(rest),
            Err(_) => absolute.to_path_buf(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_search_dirs_match_fixed_table() {
        let cfg = Config::new("");
        assert_eq!(cfg.search_dirs.len(), 13);
        assert_eq!(cfg.search_dirs[0], PathBuf::from("/etc/systemd/system.control/"));
        assert_eq!(cfg.search_dirs[12], PathBuf::from("/run/systemd/generator.late/"));
    }

    #[test]
    fn under_root_joins_relative_to_remote_root() {
        let cfg = Config::new("/mnt/image");
        assert_eq!(
            cfg.under_root("/etc/systemd/system/foo.service"),
            PathBuf::from("/mnt/image/etc/systemd/system/foo.service")
        );
    }

    #[test]
    fn strip_root_removes_remote_prefix() {
        let cfg = Config::new("/mnt/image");
        assert_eq!(
            cfg.strip_root(Path::new("/mnt/image/usr/lib/systemd/system")),
            PathBuf::from("/usr/lib/systemd/system")
        );
    }
}
