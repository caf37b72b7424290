//! Offline static analysis of a systemd unit-file tree rooted at an
//! alternative filesystem prefix (a firmware image, a mounted disk, a
//! container rootfs — never the live system).
//!
//! Four operations compose the crate's public surface:
//!
//! - [`master::build_master`] walks every search directory and produces the
//!   full catalog of artifacts found (the Master Structure).
//! - [`closure::build_deps`] walks the transitive dependency closure from a
//!   single origin unit within that catalog (the Dependency Map).
//! - [`differ::compare`] structurally diffs two serialized snapshots of
//!   either structure.
//! - [`graph::build_graph`] assembles a typed directed multigraph over the
//!   catalog, optionally reduced to the subtree reachable from an origin
//!   unit.
//!
//! Everything else in this crate exists to support those four entry
//! points; none of it reaches the filesystem on its own.

pub mod artifact;
pub mod binary;
pub mod closure;
pub mod config;
pub mod depunit;
pub mod differ;
pub mod error;
pub mod fstab;
pub mod graph;
pub mod implicit;
pub mod master;
pub mod paths;
pub mod unit_kind;

#[cfg(test)]
mod testutil;

pub use closure::{build_deps, DependencyMap};
pub use config::Config;
pub use differ::{compare, Diff};
pub use error::{Error, Result};
pub use graph::{build_graph, UnitGraph};
pub use master::{build_master, MasterStructure};
