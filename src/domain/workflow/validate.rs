//! Save-time structural validation of workflow graphs.
//!
//! All problems are collected so the author sees them in one response.

use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use thiserror::Error;

use crate::domain::rules::ConditionError;

use super::definition::{ActionKind, EdgeGuard, NodeKind, WorkflowDraft, WorkflowNode};

/// Longest wait a node may declare (90 days).
pub const MAX_WAIT_HOURS: u32 = 24 * 90;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkflowValidationError {
    #[error("workflow name cannot be empty")]
    EmptyName,

    #[error("duplicate node id '{node}'")]
    DuplicateNodeId { node: String },

    #[error("expected exactly one start node, found {found}")]
    StartNodeCount { found: usize },

    #[error("workflow needs at least one end node")]
    NoEndNode,

    #[error("edge {from} -> {to} references unknown node '{missing}'")]
    UnknownEdgeEndpoint {
        from: String,
        to: String,
        missing: String,
    },

    #[error("start node '{node}' cannot have incoming edges")]
    StartHasIncoming { node: String },

    #[error("end node '{node}' cannot have outgoing edges")]
    EndHasOutgoing { node: String },

    #[error("node '{node}' must have exactly one outgoing edge, found {found}")]
    OutgoingEdgeCount { node: String, found: usize },

    #[error("condition node '{node}' needs at least two outgoing edges, found {found}")]
    TooFewBranches { node: String, found: usize },

    #[error("condition node '{node}' needs exactly one default edge, found {found}")]
    DefaultEdgeCount { node: String, found: usize },

    #[error("edge {from} -> {to}: condition node edges must be 'when' or 'default'")]
    UnguardedBranch { from: String, to: String },

    #[error("edge {from} -> {to}: only condition nodes may have guarded edges")]
    GuardOnPlainNode { from: String, to: String },

    #[error("edge {from} -> {to}: 'when' guard needs at least one condition")]
    EmptyBranchGuard { from: String, to: String },

    #[error("edge {from} -> {to}, condition {index}: {error}")]
    InvalidBranchCondition {
        from: String,
        to: String,
        index: usize,
        error: ConditionError,
    },

    #[error("node '{node}' is not reachable from the start node")]
    Unreachable { node: String },

    #[error("node '{node}' cannot reach an end node")]
    CannotReachEnd { node: String },

    #[error("cycle through [{}] has no wait node", .nodes.join(", "))]
    CycleWithoutWait { nodes: Vec<String> },

    #[error("cycle through [{}] has no retry node", .nodes.join(", "))]
    CycleWithoutRetry { nodes: Vec<String> },

    #[error("wait node '{node}' duration must be between 1 and {max} hours, got {actual}")]
    InvalidWaitDuration { node: String, max: u32, actual: u32 },

    #[error("node '{node}' needs a template id")]
    MissingTemplate { node: String },
}

/// Validates a workflow draft, returning every problem found.
pub fn validate(draft: &WorkflowDraft) -> Result<(), Vec<WorkflowValidationError>> {
    use WorkflowValidationError as E;

    let mut errors = Vec::new();

    if draft.name.trim().is_empty() {
        errors.push(E::EmptyName);
    }

    let mut nodes: HashMap<&str, &WorkflowNode> = HashMap::new();
    for node in &draft.nodes {
        if nodes.insert(node.id.as_str(), node).is_some() {
            errors.push(E::DuplicateNodeId {
                node: node.id.to_string(),
            });
        }
        check_node_payload(node, &mut errors);
    }

    let starts: Vec<&WorkflowNode> = draft
        .nodes
        .iter()
        .filter(|n| n.kind == NodeKind::Start)
        .collect();
    if starts.len() != 1 {
        errors.push(E::StartNodeCount {
            found: starts.len(),
        });
    }
    if !draft.nodes.iter().any(|n| n.kind == NodeKind::End) {
        errors.push(E::NoEndNode);
    }

    let mut outgoing: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut incoming: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in &draft.edges {
        let (from, to) = (edge.from.as_str(), edge.to.as_str());
        let mut dangling = false;
        for endpoint in [from, to] {
            if !nodes.contains_key(endpoint) {
                dangling = true;
                errors.push(E::UnknownEdgeEndpoint {
                    from: from.to_string(),
                    to: to.to_string(),
                    missing: endpoint.to_string(),
                });
            }
        }
        if dangling {
            continue;
        }
        outgoing.entry(from).or_default().push(to);
        incoming.entry(to).or_default().push(from);

        let source_is_condition = nodes
            .get(from)
            .map_or(false, |n| n.kind == NodeKind::Condition);
        match (&edge.guard, source_is_condition) {
            (EdgeGuard::Always, true) => errors.push(E::UnguardedBranch {
                from: from.to_string(),
                to: to.to_string(),
            }),
            (EdgeGuard::When { .. } | EdgeGuard::Default, false) => {
                errors.push(E::GuardOnPlainNode {
                    from: from.to_string(),
                    to: to.to_string(),
                })
            }
            (EdgeGuard::When { conditions }, true) => {
                if conditions.is_empty() {
                    errors.push(E::EmptyBranchGuard {
                        from: from.to_string(),
                        to: to.to_string(),
                    });
                }
                for (index, condition) in conditions.iter().enumerate() {
                    if let Err(error) = condition.validate() {
                        errors.push(E::InvalidBranchCondition {
                            from: from.to_string(),
                            to: to.to_string(),
                            index,
                            error,
                        });
                    }
                }
            }
            _ => {}
        }
    }

    for node in &draft.nodes {
        let id = node.id.as_str();
        let out = outgoing.get(id).map_or(0, Vec::len);
        match node.kind {
            NodeKind::Start if incoming.contains_key(id) => {
                errors.push(E::StartHasIncoming { node: id.to_string() })
            }
            NodeKind::End if out > 0 => errors.push(E::EndHasOutgoing { node: id.to_string() }),
            NodeKind::Condition => {
                if out < 2 {
                    errors.push(E::TooFewBranches {
                        node: id.to_string(),
                        found: out,
                    });
                }
                let defaults = draft
                    .edges
                    .iter()
                    .filter(|e| e.from.as_str() == id && e.guard == EdgeGuard::Default)
                    .count();
                if defaults != 1 {
                    errors.push(E::DefaultEdgeCount {
                        node: id.to_string(),
                        found: defaults,
                    });
                }
            }
            _ => {}
        }
        if !matches!(node.kind, NodeKind::Condition | NodeKind::End) && out != 1 {
            errors.push(E::OutgoingEdgeCount {
                node: id.to_string(),
                found: out,
            });
        }
    }

    // Graph-shape checks only make sense once ids and endpoints are sound.
    if errors.is_empty() {
        let start = starts[0].id.as_str();
        let ends: Vec<&str> = draft
            .nodes
            .iter()
            .filter(|n| n.kind == NodeKind::End)
            .map(|n| n.id.as_str())
            .collect();

        let forward = reachable(&[start], &outgoing);
        let backward = reachable(&ends, &incoming);
        for node in &draft.nodes {
            let id = node.id.as_str();
            if !forward.contains(id) {
                errors.push(E::Unreachable { node: id.to_string() });
            }
            if !backward.contains(id) {
                errors.push(E::CannotReachEnd { node: id.to_string() });
            }
        }

        let order: Vec<&str> = draft.nodes.iter().map(|n| n.id.as_str()).collect();
        if let Some(cycle) = find_cycle(&order, &outgoing, |id| nodes[id].is_wait()) {
            errors.push(E::CycleWithoutWait { nodes: cycle });
        }
        if let Some(cycle) = find_cycle(&order, &outgoing, |id| nodes[id].is_retry()) {
            errors.push(E::CycleWithoutRetry { nodes: cycle });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_node_payload(node: &WorkflowNode, errors: &mut Vec<WorkflowValidationError>) {
    match &node.kind {
        NodeKind::Wait {
            duration_hours: Some(hours),
            ..
        } if *hours == 0 || *hours > MAX_WAIT_HOURS => {
            errors.push(WorkflowValidationError::InvalidWaitDuration {
                node: node.id.to_string(),
                max: MAX_WAIT_HOURS,
                actual: *hours,
            });
        }
        NodeKind::Action {
            action:
                ActionKind::SendEmail { template_id, .. } | ActionKind::Escalate { template_id, .. },
        } if template_id.trim().is_empty() => {
            errors.push(WorkflowValidationError::MissingTemplate {
                node: node.id.to_string(),
            });
        }
        _ => {}
    }
}

fn reachable<'a>(from: &[&'a str], adjacency: &HashMap<&'a str, Vec<&'a str>>) -> HashSet<&'a str> {
    let mut seen: HashSet<&str> = from.iter().copied().collect();
    let mut queue: VecDeque<&str> = from.iter().copied().collect();
    while let Some(id) = queue.pop_front() {
        for &next in adjacency.get(id).into_iter().flatten() {
            if seen.insert(next) {
                queue.push_back(next);
            }
        }
    }
    seen
}

/// Finds a cycle in the subgraph that excludes nodes matching `breaks_cycle`.
///
/// A cycle without a wait exists iff the graph minus wait nodes is cyclic,
/// and likewise for retry nodes.
fn find_cycle<'a>(
    order: &[&'a str],
    adjacency: &HashMap<&'a str, Vec<&'a str>>,
    breaks_cycle: impl Fn(&str) -> bool,
) -> Option<Vec<String>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Open,
        Done,
    }

    fn visit<'a>(
        id: &'a str,
        adjacency: &HashMap<&'a str, Vec<&'a str>>,
        breaks_cycle: &dyn Fn(&str) -> bool,
        marks: &mut HashMap<&'a str, Mark>,
        path: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        marks.insert(id, Mark::Open);
        path.push(id);
        for &next in adjacency.get(id).into_iter().flatten() {
            if breaks_cycle(next) {
                continue;
            }
            match marks.get(next) {
                Some(Mark::Open) => {
                    let start = path.iter().position(|n| *n == next).unwrap_or(0);
                    return Some(path[start..].iter().map(|s| s.to_string()).collect());
                }
                Some(Mark::Done) => {}
                None => {
                    if let Some(cycle) = visit(next, adjacency, breaks_cycle, marks, path) {
                        return Some(cycle);
                    }
                }
            }
        }
        path.pop();
        marks.insert(id, Mark::Done);
        None
    }

    let mut marks: HashMap<&str, Mark> = HashMap::new();
    for &id in order {
        if breaks_cycle(id) || marks.contains_key(id) {
            continue;
        }
        let mut path = Vec::new();
        if let Some(cycle) = visit(id, adjacency, &breaks_cycle, &mut marks, &mut path) {
            return Some(cycle);
        }
    }
    None
}
