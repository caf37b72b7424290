//! Test-only fixture builder. Mirrors the `setup_generator_test` idiom used
//! by the teacher's generator-lib tests: build a throwaway directory tree
//! under the OS temp dir, pre-seed the search-path layout, and expose small
//! helpers so component tests don't repeat `create_dir_all` boilerplate.
#![cfg(test)]

use std::io;
use std::os::unix::fs::symlink;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::{Config, SEARCH_DIRS};

pub struct FixtureRoot {
    pub root: PathBuf,
}

impl FixtureRoot {
    pub fn new(name: &'static str) -> io::Result<Self> {
        let ts = SystemTime::now().duration_since(UNIX_EPOCH).unwrap();
        let root = std::env::temp_dir().join(format!(
            "unitsnap_test_{}_{}_{}",
            name,
            ts.as_secs(),
            ts.subsec_nanos()
        ));
        std::fs::create_dir_all(&root)?;
        for dir in SEARCH_DIRS {
            let stripped = dir.trim_start_matches('/');
            std::fs::create_dir_all(root.join(stripped))?;
        }
        Ok(Self { root })
    }

    pub fn config(&self) -> Config {
        Config::new(self.root.clone())
    }

    /// Create `/etc/systemd/system/<name>` with the given contents.
    pub fn unit(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.root.join("etc/systemd/system").join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// Create an arbitrary directory under the fixture root (relative path,
    /// no leading slash).
    pub fn dir(&self, relative: &str) -> PathBuf {
        let path = self.root.join(relative);
        std::fs::create_dir_all(&path).unwrap();
        path
    }

    /// Create a file with arbitrary content at an alt-root-relative path
    /// (leading `/` optional).
    pub fn file(&self, relative: &str, contents: &str) -> PathBuf {
        let stripped = relative.trim_start_matches('/');
        let path = self.root.join(stripped);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// A dependency directory (`<unit>.wants`, `<unit>.requires`, `<unit>.d`)
    /// under `/etc/systemd/system/`, pre-populated with the given entries
    /// (each entry is itself created as an empty regular file).
    pub fn dep_dir(&self, name: &str, entries: &[&str]) -> PathBuf {
        let path = self.root.join("etc/systemd/system").join(name);
        std::fs::create_dir_all(&path).unwrap();
        for entry in entries {
            std::fs::write(path.join(entry), "").unwrap();
        }
        path
    }

    /// Create a symlink at an alt-root-relative path with an absolute
    /// target exactly as given (not itself prefixed with the fixture root —
    /// this is how real unit-file symlinks store their targets).
    pub fn symlink_abs(&self, at: &str, target: &str) -> PathBuf {
        let stripped = at.trim_start_matches('/');
        let path = self.root.join(stripped);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        symlink(target, &path).unwrap();
        path
    }

    /// Create a symlink at an alt-root-relative path with a relative
    /// target, as authored relative to the link's own parent directory.
    pub fn symlink_rel(&self, at: &str, target: &str) -> PathBuf {
        self.symlink_abs(at, target)
    }

    pub fn fstab(&self, contents: &str) -> PathBuf {
        self.file("/etc/fstab", contents)
    }
}

impl Drop for FixtureRoot {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}
