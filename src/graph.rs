//! C10 — Graph Assembler.
//!
//! Walks a built [`MasterStructure`] and assembles a typed directed
//! multigraph of its units, symlinks, commands, executables, libraries and
//! extracted strings. Dependency-directory artifacts contribute nothing
//! here — their entries are already folded into the owning unit's
//! directives, so drawing them again would duplicate every edge.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use regex::Regex;
use serde::{Deserialize, Serialize};
use slog::{debug, Logger};

use crate::artifact::{Artifact, UnitFileRecord};
use crate::master::MasterStructure;
use crate::unit_kind::COMMAND_DIRECTIVES;

static TEMPLATE_MATCHER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\S+@\S+\.\S+$").unwrap());

const COMMAND_PREFIXES: &[char] = &['@', '-', ':', '+', '!'];

/// Directives that draw an edge from the owning unit to a referenced unit
/// vertex. `Unit` covers the explicit override some `.path`/`.socket`/
/// `.timer` files use in place of the implicit `iPath_for`/`iSocket_of`/
/// `iTimer_for` synthesis; `OnFailure` is not dependency-creating for the
/// closure engine but is still drawn here since it is a real edge between
/// units.
const EDGE_DIRECTIVES: &[&str] = &[
    "Wants",
    "Requires",
    "Requisite",
    "BindsTo",
    "PartOf",
    "Upholds",
    "OnSuccess",
    "Sockets",
    "Service",
    "Unit",
    "OnFailure",
];

/// One of the six vertex kinds a unit tree can contain, plus the `DropIn`
/// case the original tool splits out of `unit_file` entries living under a
/// `.d` directory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VertexKind {
    Unit,
    DropIn,
    Alias,
    Command(String),
    Executable,
    Library,
    Str(String),
}

impl VertexKind {
    /// The Master Structure's type-key string, e.g. `COMMAND.START` or
    /// `STRING.FILE`, used as the edge label when an executable's children
    /// are drawn.
    pub fn type_key(&self) -> String {
        match self {
            Self::Unit => "UNIT".to_string(),
            Self::DropIn => "DROPIN".to_string(),
            Self::Alias => "ALIAS".to_string(),
            Self::Command(suffix) => format!("COMMAND.{}", suffix),
            Self::Executable => "EXECUTABLE".to_string(),
            Self::Library => "LIBRARY".to_string(),
            Self::Str(category) => format!("STRING.{}", category),
        }
    }
}

/// A graph node: its kind, its identifying id, and the text a renderer
/// would label it with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vertex {
    pub id: String,
    pub kind: VertexKind,
    pub label: String,
    /// True when this is a `Unit` vertex whose name matches the
    /// `name@instance.suffix` template pattern — only meaningful for
    /// vertices created implicitly by a dependency directive that named a
    /// unit never found as its own artifact.
    pub template: bool,
}

/// A graph edge: the directive or relationship name it was drawn for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub label: String,
}

pub type UnitGraph = DiGraph<Vertex, Edge>;

struct Builder<'a> {
    master: &'a MasterStructure,
    graph: UnitGraph,
    nodes: BTreeMap<(VertexKind, String), NodeIndex>,
    log: &'a Logger,
}

impl<'a> Builder<'a> {
    fn get_or_add(&mut self, kind: VertexKind, id: &str, label: &str) -> NodeIndex {
        let key = (kind.clone(), id.to_string());
        if let Some(idx) = self.nodes.get(&key) {
            return *idx;
        }
        let template = matches!(kind, VertexKind::Unit) && TEMPLATE_MATCHER.is_match(id);
        let idx = self.graph.add_node(Vertex {
            id: id.to_string(),
            kind: kind.clone(),
            label: label.to_string(),
            template,
        });
        self.nodes.insert(key, idx);
        idx
    }

    fn add_edge(&mut self, from: NodeIndex, to: NodeIndex, label: &str) {
        self.graph.add_edge(from, to, Edge { label: label.to_string() });
    }

    fn visit_alias(&mut self, key: &str, target_unit: &str) {
        let alias = self.get_or_add(VertexKind::Alias, key, key);
        let target = self.get_or_add(VertexKind::Unit, target_unit, target_unit);
        self.add_edge(alias, target, "ALIAS");
    }

    fn visit_unit_file(&mut self, key: &str) {
        let is_drop_in = key
            .rsplit_once('/')
            .map(|(parent, _)| parent.ends_with(".d"))
            .unwrap_or(false);

        let record = match self.master.artifacts.get(key) {
            Some(Artifact::UnitFile(u)) | Some(Artifact::FstabUnit(u)) => u.clone(),
            _ => return,
        };

        let (owner_kind, owner_id) = if is_drop_in {
            (VertexKind::DropIn, key.to_string())
        } else {
            let basename = key.rsplit('/').next().unwrap_or(key).to_string();
            (VertexKind::Unit, basename)
        };
        let owner = self.get_or_add(owner_kind, &owner_id, &owner_id);

        self.visit_commands(owner, &record);
        self.visit_edge_directives(owner, &record);
        self.visit_sequencing(owner, &record);
    }

    fn visit_commands(&mut self, owner: NodeIndex, record: &UnitFileRecord) {
        for directive in COMMAND_DIRECTIVES {
            let Some(values) = record.get(directive) else { continue };
            let cmds: Vec<&str> = values.iter().map(String::as_str).filter(|s| !s.is_empty()).collect();
            if cmds.is_empty() {
                continue;
            }

            let suffix = directive.strip_prefix("Exec").unwrap_or(directive).to_uppercase();
            let joined: Vec<String> = cmds.iter().map(|c| command_line_string(c)).collect();
            let command_id = joined.join("; ");
            let label = command_id.split(';').collect::<Vec<_>>().join("\n");
            let command_vertex = self.get_or_add(VertexKind::Command(suffix), &command_id, &label);
            self.add_edge(owner, command_vertex, directive);

            for cmd in &cmds {
                let (executable, _) = parse_command_line(cmd);
                if executable.is_empty() {
                    continue;
                }
                let exec_vertex = self.get_or_add(VertexKind::Executable, &executable, &executable);
                self.add_edge(command_vertex, exec_vertex, "EXECUTABLE");
                self.visit_executable_children(exec_vertex, &executable);
            }
        }
    }

    fn visit_executable_children(&mut self, exec_vertex: NodeIndex, executable: &str) {
        if let Some(libs) = self.master.libraries.get(executable).cloned() {
            for lib in libs {
                let lib_vertex = self.get_or_add(VertexKind::Library, &lib, &lib);
                self.add_edge(exec_vertex, lib_vertex, "LIBRARY");
            }
        }
        if let Some(files) = self.master.files.get(executable).cloned() {
            for file in files {
                let trimmed = file.trim().to_string();
                let str_vertex = self.get_or_add(VertexKind::Str("FILE".to_string()), &trimmed, &trimmed);
                self.add_edge(exec_vertex, str_vertex, "STRING.FILE");
            }
        }
        if let Some(paths) = self.master.strings.get(executable).cloned() {
            for path in paths {
                let trimmed = path.trim().to_string();
                let str_vertex = self.get_or_add(VertexKind::Str("PATH".to_string()), &trimmed, &trimmed);
                self.add_edge(exec_vertex, str_vertex, "STRING.PATH");
            }
        }
    }

    fn visit_edge_directives(&mut self, owner: NodeIndex, record: &UnitFileRecord) {
        for directive in EDGE_DIRECTIVES {
            let Some(values) = record.get(directive) else { continue };
            for target in values {
                let target_vertex = self.get_or_add(VertexKind::Unit, target, target);
                self.add_edge(owner, target_vertex, directive);
            }
        }
    }

    /// `After=` is drawn with reversed direction: the referenced unit comes
    /// first, so the edge points from it to the owning unit.
    fn visit_sequencing(&mut self, owner: NodeIndex, record: &UnitFileRecord) {
        for (seq, reversed) in [("After", true), ("Before", false)] {
            let Some(values) = record.get(seq) else { continue };
            for target in values {
                let target_vertex = self.get_or_add(VertexKind::Unit, target, target);
                if reversed {
                    self.add_edge(target_vertex, owner, seq);
                } else {
                    self.add_edge(owner, target_vertex, seq);
                }
            }
        }
    }
}

fn parse_command_line(cstr: &str) -> (String, Option<String>) {
    let mut split = cstr.splitn(2, char::is_whitespace);
    let first = split.next().unwrap_or("");
    let rest = split.next().map(str::trim_start).filter(|s| !s.is_empty()).map(str::to_string);

    let mut stripped = first;
    while let Some(ch) = stripped.chars().next() {
        if COMMAND_PREFIXES.contains(&ch) {
            stripped = &stripped[ch.len_utf8()..];
        } else {
            break;
        }
    }
    (stripped.to_string(), rest)
}

fn command_line_string(cstr: &str) -> String {
    let (executable, args) = parse_command_line(cstr);
    match args {
        Some(a) => format!("{} {}", executable, a),
        None => executable,
    }
}

/// Assemble the full directed multigraph for `master`, skipping dependency
/// directory artifacts (their contributions are already folded into the
/// owning unit's directives). When `origin` is given, the result is reduced
/// to the subtree reachable from it — depth-limited if `depth` is given,
/// unbounded otherwise — mirroring a depth-limited `dfs_tree` extraction
/// from the origin vertex.
pub fn build_graph(
    master: &MasterStructure,
    origin: Option<&str>,
    depth: Option<usize>,
    log: &Logger,
) -> UnitGraph {
    let mut builder = Builder {
        master,
        graph: DiGraph::new(),
        nodes: BTreeMap::new(),
        log,
    };

    for (key, artifact) in &master.artifacts {
        match artifact {
            Artifact::DepDir(_) => continue,
            Artifact::SymLink(s) => builder.visit_alias(key, &s.sym_link_target_unit),
            Artifact::UnitFile(_) | Artifact::FstabUnit(_) => builder.visit_unit_file(key),
        }
    }

    debug!(log, "graph assembled"; "nodes" => builder.graph.node_count(), "edges" => builder.graph.edge_count());

    let Some(origin) = origin else {
        return builder.graph;
    };

    let Some(root) = builder
        .nodes
        .get(&(VertexKind::Unit, origin.to_string()))
        .copied()
    else {
        debug!(log, "origin unit not found in assembled graph"; "origin" => origin);
        return builder.graph;
    };

    subtree(&builder.graph, root, depth.unwrap_or(usize::MAX))
}

/// Depth-limited DFS-tree extraction: each reachable node keeps only the
/// edge that first discovered it, same as `networkx.dfs_tree`.
fn subtree(graph: &UnitGraph, origin: NodeIndex, depth: usize) -> UnitGraph {
    use std::collections::BTreeSet;

    let mut visited = BTreeSet::new();
    visited.insert(origin);
    let mut tree_edges = Vec::new();
    let mut stack = vec![(origin, 0usize)];

    while let Some((node, d)) = stack.pop() {
        if d >= depth {
            continue;
        }
        for edge in graph.edges(node) {
            let target = edge.target();
            if visited.insert(target) {
                tree_edges.push((node, target, edge.weight().clone()));
                stack.push((target, d + 1));
            }
        }
    }

    let mut sub = DiGraph::new();
    let mut index_map = BTreeMap::new();
    for node in &visited {
        index_map.insert(*node, sub.add_node(graph[*node].clone()));
    }
    for (from, to, weight) in tree_edges {
        sub.add_edge(index_map[&from], index_map[&to], weight);
    }
    sub
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::master::build_master;
    use crate::testutil::FixtureRoot;

    fn discard_logger() -> Logger {
        Logger::root(slog::Discard, slog::o!())
    }

    fn find(graph: &UnitGraph, kind: &VertexKind, id: &str) -> Option<NodeIndex> {
        graph
            .node_indices()
            .find(|&i| &graph[i].kind == kind && graph[i].id == id)
    }

    #[test]
    fn unit_gets_command_executable_chain() {
        let fx = FixtureRoot::new("graph_chain").unwrap();
        fx.unit(
            "foo.service",
            "[Unit]\nDescription=demo\n[Service]\nExecStart=/usr/bin/true --flag\n",
        );
        let cfg = fx.config();
        let log = discard_logger();
        let ms = build_master(&cfg, &log).unwrap();
        let graph = build_graph(&ms, None, None, &log);

        let unit = find(&graph, &VertexKind::Unit, "foo.service").expect("unit vertex");
        let command = graph
            .node_indices()
            .find(|&i| matches!(&graph[i].kind, VertexKind::Command(suffix) if suffix == "START"))
            .expect("command vertex");
        assert!(graph.find_edge(unit, command).is_some());

        let exec = find(&graph, &VertexKind::Executable, "/usr/bin/true").expect("executable vertex");
        assert!(graph.find_edge(command, exec).is_some());
    }

    #[test]
    fn alias_points_at_target_unit_basename() {
        let fx = FixtureRoot::new("graph_alias").unwrap();
        fx.unit("graphical.target", "[Unit]\nDescription=gt\n");
        fx.symlink_abs(
            "/etc/systemd/system/default.target",
            "/etc/systemd/system/graphical.target",
        );
        let cfg = fx.config();
        let log = discard_logger();
        let ms = build_master(&cfg, &log).unwrap();
        let graph = build_graph(&ms, None, None, &log);

        let alias = graph
            .node_indices()
            .find(|&i| matches!(graph[i].kind, VertexKind::Alias))
            .expect("alias vertex");
        let unit = find(&graph, &VertexKind::Unit, "graphical.target").expect("unit vertex");
        assert!(graph.find_edge(alias, unit).is_some());
    }

    #[test]
    fn after_directive_reverses_edge_direction() {
        let fx = FixtureRoot::new("graph_after").unwrap();
        fx.unit("foo.service", "[Unit]\nDescription=foo\nAfter=bar.service\n");
        let cfg = fx.config();
        let log = discard_logger();
        let ms = build_master(&cfg, &log).unwrap();
        let graph = build_graph(&ms, None, None, &log);

        let foo = find(&graph, &VertexKind::Unit, "foo.service").expect("foo vertex");
        let bar = find(&graph, &VertexKind::Unit, "bar.service").expect("bar vertex");
        assert!(graph.find_edge(bar, foo).is_some());
        assert!(graph.find_edge(foo, bar).is_none());
    }

    #[test]
    fn unresolved_unit_named_with_template_syntax_is_flagged() {
        let fx = FixtureRoot::new("graph_template").unwrap();
        fx.unit("foo.service", "[Unit]\nDescription=foo\nWants=getty@tty1.service\n");
        let cfg = fx.config();
        let log = discard_logger();
        let ms = build_master(&cfg, &log).unwrap();
        let graph = build_graph(&ms, None, None, &log);

        let getty = find(&graph, &VertexKind::Unit, "getty@tty1.service").expect("getty vertex");
        assert!(graph[getty].template);
    }

    #[test]
    fn origin_restricts_to_reachable_subtree() {
        let fx = FixtureRoot::new("graph_subtree").unwrap();
        fx.unit("multi-user.target", "[Unit]\nDescription=mu\nWants=foo.service\n");
        fx.unit("unrelated.service", "[Unit]\nDescription=unrelated\n");
        let cfg = fx.config();
        let log = discard_logger();
        let ms = build_master(&cfg, &log).unwrap();
        let graph = build_graph(&ms, Some("multi-user.target"), None, &log);

        assert!(find(&graph, &VertexKind::Unit, "foo.service").is_some());
        assert!(find(&graph, &VertexKind::Unit, "unrelated.service").is_none());
    }
}
