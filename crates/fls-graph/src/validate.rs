//! Consistency checks between a project record and its version graph.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use fls_types::{NodeId, Project, Stage};

use crate::graph::VersionGraph;

/// Result of validating a project.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub node_count: usize,
    pub branch_count: usize,
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    /// Returns `true` if no error-level violation was found.
    pub fn is_valid(&self) -> bool {
        self.errors().next().is_none()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Violation> {
        self.violations
            .iter()
            .filter(|v| v.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Violation> {
        self.violations
            .iter()
            .filter(|v| v.severity == Severity::Warning)
    }

    fn push(&mut self, node: Option<NodeId>, kind: ViolationKind, description: String) {
        self.violations.push(Violation {
            node,
            severity: kind.severity(),
            kind,
            description,
        });
    }
}

/// A specific inconsistency detected during validation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// The node the violation is about, if any.
    pub node: Option<NodeId>,
    pub kind: ViolationKind,
    pub severity: Severity,
    pub description: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViolationKind {
    /// An indexed node has no record.
    MissingNode,
    /// A node id is indexed more than once.
    DuplicateNode,
    /// A node record belongs to another project.
    ForeignNode,
    /// `root_node_id` is not the first indexed node.
    RootMismatch,
    /// The root node has a parent.
    RootHasParent,
    /// A non-root node has no parent.
    MissingParent,
    /// A parent is not indexed.
    DanglingParent,
    /// A parent was indexed at or after its child.
    ParentNotEarlier,
    /// `stage_index` disagrees with `stage`.
    StageIndexMismatch,
    /// A branch pointer does not resolve.
    DanglingBranch,
    /// HEAD does not resolve.
    DanglingHead,
    /// A settled node has no artifact reference.
    SettledWithoutArtifact,
}

impl ViolationKind {
    pub fn severity(self) -> Severity {
        match self {
            ViolationKind::SettledWithoutArtifact => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Check `project` against the nodes in `graph`.
///
/// Checks the forest property (single root, every other node's parent
/// indexed strictly earlier), that every branch pointer and HEAD resolve to
/// indexed nodes, and that settled nodes carry an artifact. A parent that
/// always precedes its child rules out cycles.
pub fn validate(project: &Project, graph: &VersionGraph) -> ValidationReport {
    let mut report = ValidationReport {
        node_count: project.node_ids.len(),
        branch_count: project.branches.len(),
        violations: Vec::new(),
    };

    let mut positions: HashMap<NodeId, usize> = HashMap::new();
    for (pos, id) in project.node_ids.iter().enumerate() {
        if positions.contains_key(id) {
            report.push(
                Some(*id),
                ViolationKind::DuplicateNode,
                format!("node {id} is indexed more than once"),
            );
        } else {
            positions.insert(*id, pos);
        }
    }

    match (project.node_ids.first(), project.root_node_id) {
        (None, Some(root)) => report.push(
            Some(root),
            ViolationKind::RootMismatch,
            "root is set but no node is indexed".into(),
        ),
        (Some(first), root) if root != Some(*first) => report.push(
            root,
            ViolationKind::RootMismatch,
            format!("root should be the first indexed node {first}"),
        ),
        _ => {}
    }

    let mut checked = HashSet::new();
    for (pos, id) in project.node_ids.iter().enumerate() {
        if !checked.insert(*id) {
            continue;
        }
        let Some(node) = graph.get(id) else {
            report.push(
                Some(*id),
                ViolationKind::MissingNode,
                format!("node {id} is indexed but has no record"),
            );
            continue;
        };

        if node.project_id != project.id {
            report.push(
                Some(*id),
                ViolationKind::ForeignNode,
                format!("node {id} belongs to project {}", node.project_id),
            );
        }
        if !node.stage_index_matches() {
            report.push(
                Some(*id),
                ViolationKind::StageIndexMismatch,
                format!(
                    "stage {} has index {}, record says {}",
                    node.stage,
                    node.stage.index(),
                    node.stage_index
                ),
            );
        }

        let is_root = project.root_node_id == Some(*id);
        match (is_root, node.parent_id) {
            (true, Some(parent)) => report.push(
                Some(*id),
                ViolationKind::RootHasParent,
                format!("root node has parent {parent}"),
            ),
            (false, None) => report.push(
                Some(*id),
                ViolationKind::MissingParent,
                format!("non-root node {id} has no parent"),
            ),
            (false, Some(parent)) => match positions.get(&parent) {
                None => report.push(
                    Some(*id),
                    ViolationKind::DanglingParent,
                    format!("parent {parent} is not indexed"),
                ),
                Some(&parent_pos) if parent_pos >= pos => report.push(
                    Some(*id),
                    ViolationKind::ParentNotEarlier,
                    format!("parent {parent} is indexed at {parent_pos}, child at {pos}"),
                ),
                Some(_) => {}
            },
            (true, None) => {}
        }

        let exempt = is_root && node.stage == Stage::Input;
        if node.is_settled() && node.artifact_reference.is_none() && !exempt {
            report.push(
                Some(*id),
                ViolationKind::SettledWithoutArtifact,
                format!("node {id} is {} but has no artifact", node.status),
            );
        }
    }

    let resolves = |id: &NodeId| positions.contains_key(id) && graph.contains(id);

    for (name, head) in &project.branches {
        if !resolves(head) {
            report.push(
                Some(*head),
                ViolationKind::DanglingBranch,
                format!("branch {name:?} points at unknown node {head}"),
            );
        }
    }

    match project.current_node_id {
        Some(head) if !resolves(&head) => report.push(
            Some(head),
            ViolationKind::DanglingHead,
            format!("HEAD points at unknown node {head}"),
        ),
        None if !project.node_ids.is_empty() => report.push(
            None,
            ViolationKind::DanglingHead,
            "HEAD is unset but nodes exist".into(),
        ),
        _ => {}
    }

    report
}
