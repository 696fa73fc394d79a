//! Workflow graph model: nodes, guarded edges and versioned definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::domain::foundation::{NodeId, Timestamp, WorkflowId};
use crate::domain::rules::{Condition, EvaluationContext};

/// Delivery channel of a notification. The engine does not care which
/// integration sits behind each one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Sms,
    Slack,
    Webhook,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Channel::Email => "email",
            Channel::Sms => "sms",
            Channel::Slack => "slack",
            Channel::Webhook => "webhook",
        };
        f.write_str(s)
    }
}

fn default_channel() -> Channel {
    Channel::Email
}

/// Side-effecting step of an `action` node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionKind {
    /// Ask the payment gateway to retry the failed payment.
    Retry,

    /// Send a templated message to the customer.
    SendEmail {
        template_id: String,
        #[serde(default = "default_channel")]
        channel: Channel,
    },

    /// Mark the campaign escalated and notify internal recipients.
    Escalate {
        template_id: String,
        #[serde(default = "default_channel")]
        channel: Channel,
        #[serde(default)]
        recipients: Vec<String>,
    },

    /// Suspend the subscription's account; completes the campaign.
    SuspendAccount,
}

/// Whether a wait is a retry delay or a grace period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitKind {
    Delay,
    Grace,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    Start,
    Action {
        action: ActionKind,
    },
    Wait {
        wait: WaitKind,
        /// When absent the duration comes from configuration.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration_hours: Option<u32>,
    },
    Condition,
    End,
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Start => "start",
            NodeKind::Action { action } => match action {
                ActionKind::Retry => "retry",
                ActionKind::SendEmail { .. } => "send_email",
                ActionKind::Escalate { .. } => "escalate",
                ActionKind::SuspendAccount => "suspend_account",
            },
            NodeKind::Wait { .. } => "wait",
            NodeKind::Condition => "condition",
            NodeKind::End => "end",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowNode {
    pub id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub kind: NodeKind,
}

impl WorkflowNode {
    pub fn new(id: NodeId, kind: NodeKind) -> Self {
        Self {
            id,
            label: None,
            kind,
        }
    }

    pub fn is_retry(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Action {
                action: ActionKind::Retry
            }
        )
    }

    pub fn is_wait(&self) -> bool {
        matches!(self.kind, NodeKind::Wait { .. })
    }
}

/// Edge predicate. Only `condition` nodes branch; other nodes use `Always`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EdgeGuard {
    #[default]
    Always,
    /// Taken when all conditions hold.
    When { conditions: Vec<Condition> },
    /// Taken when no `When` edge of the same node matches.
    Default,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowEdge {
    pub from: NodeId,
    pub to: NodeId,
    #[serde(default)]
    pub guard: EdgeGuard,
}

impl WorkflowEdge {
    pub fn always(from: NodeId, to: NodeId) -> Self {
        Self {
            from,
            to,
            guard: EdgeGuard::Always,
        }
    }
}

/// Operator-authored graph, before validation and versioning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDraft {
    pub id: WorkflowId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub nodes: Vec<WorkflowNode>,
    pub edges: Vec<WorkflowEdge>,
}

/// Immutable, validated workflow version. Campaigns pin `(id, version)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: WorkflowId,
    pub version: u32,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub nodes: Vec<WorkflowNode>,
    pub edges: Vec<WorkflowEdge>,
    pub created_at: Timestamp,
}

impl WorkflowDefinition {
    /// Validates `draft` and stamps it with `version`.
    pub fn create(
        draft: WorkflowDraft,
        version: u32,
        now: Timestamp,
    ) -> Result<Self, Vec<super::WorkflowValidationError>> {
        super::validate(&draft)?;
        Ok(Self {
            id: draft.id,
            version,
            name: draft.name.trim().to_string(),
            description: draft.description,
            nodes: draft.nodes,
            edges: draft.edges,
            created_at: now,
        })
    }

    pub fn node(&self, id: &NodeId) -> Option<&WorkflowNode> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    pub fn start_node(&self) -> Option<&WorkflowNode> {
        self.nodes.iter().find(|n| n.kind == NodeKind::Start)
    }

    pub fn outgoing<'a>(&'a self, id: &'a NodeId) -> impl Iterator<Item = &'a WorkflowEdge> + 'a {
        self.edges.iter().filter(move |e| &e.from == id)
    }
}

/// Runtime graph lookups that cannot succeed on this definition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("node '{0}' does not exist in this workflow")]
    NodeNotFound(NodeId),

    #[error("node '{0}' has no outgoing edge to follow")]
    NoOutgoingEdge(NodeId),
}

/// Resolves the node after `current`.
///
/// Condition nodes take the first `When` edge, in declaration order, whose
/// conditions all hold, and otherwise their `Default` edge. Every other node
/// follows its single outgoing edge.
pub fn next_node<'a>(
    definition: &'a WorkflowDefinition,
    current: &NodeId,
    ctx: &EvaluationContext,
) -> Result<&'a NodeId, GraphError> {
    let node = definition
        .node(current)
        .ok_or_else(|| GraphError::NodeNotFound(current.clone()))?;

    let mut edges = definition.edges.iter().filter(|e| &e.from == current);

    if node.kind == NodeKind::Condition {
        let edges: Vec<&WorkflowEdge> = edges.collect();
        let taken = edges
            .iter()
            .copied()
            .find(|e| match &e.guard {
                EdgeGuard::When { conditions } => {
                    !conditions.is_empty() && conditions.iter().all(|c| c.evaluate(ctx))
                }
                _ => false,
            })
            .or_else(|| edges.iter().copied().find(|e| e.guard == EdgeGuard::Default));
        return taken
            .map(|e| &e.to)
            .ok_or_else(|| GraphError::NoOutgoingEdge(current.clone()));
    }

    edges
        .next()
        .map(|e| &e.to)
        .ok_or_else(|| GraphError::NoOutgoingEdge(current.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::rules::Operator;
    use serde_json::json;

    fn nid(s: &str) -> NodeId {
        NodeId::new(s).unwrap()
    }

    fn branching() -> WorkflowDefinition {
        WorkflowDefinition {
            id: WorkflowId::new("branching").unwrap(),
            version: 1,
            name: "Branching".to_string(),
            description: None,
            nodes: vec![
                WorkflowNode::new(nid("start"), NodeKind::Start),
                WorkflowNode::new(nid("check"), NodeKind::Condition),
                WorkflowNode::new(
                    nid("vip_mail"),
                    NodeKind::Action {
                        action: ActionKind::SendEmail {
                            template_id: "vip".to_string(),
                            channel: Channel::Email,
                        },
                    },
                ),
                WorkflowNode::new(nid("end"), NodeKind::End),
            ],
            edges: vec![
                WorkflowEdge::always(nid("start"), nid("check")),
                WorkflowEdge {
                    from: nid("check"),
                    to: nid("vip_mail"),
                    guard: EdgeGuard::When {
                        conditions: vec![Condition::new(
                            "customer.segment",
                            Operator::Equals,
                            json!("enterprise"),
                        )],
                    },
                },
                WorkflowEdge {
                    from: nid("check"),
                    to: nid("end"),
                    guard: EdgeGuard::Default,
                },
                WorkflowEdge::always(nid("vip_mail"), nid("end")),
            ],
            created_at: Timestamp::now(),
        }
    }

    #[test]
    fn branch_takes_matching_edge() {
        let def = branching();
        let ctx = EvaluationContext::new().with_section("customer", json!({"segment": "enterprise"}));
        assert_eq!(next_node(&def, &nid("check"), &ctx).unwrap(), &nid("vip_mail"));
    }

    #[test]
    fn branch_falls_back_to_default_when_field_missing() {
        let def = branching();
        let ctx = EvaluationContext::new();
        assert_eq!(next_node(&def, &nid("check"), &ctx).unwrap(), &nid("end"));
    }

    #[test]
    fn plain_nodes_follow_single_edge() {
        let def = branching();
        let ctx = EvaluationContext::new();
        assert_eq!(next_node(&def, &nid("start"), &ctx).unwrap(), &nid("check"));
    }

    #[test]
    fn end_and_unknown_nodes_report_errors() {
        let def = branching();
        let ctx = EvaluationContext::new();
        assert_eq!(
            next_node(&def, &nid("end"), &ctx),
            Err(GraphError::NoOutgoingEdge(nid("end")))
        );
        assert_eq!(
            next_node(&def, &nid("ghost"), &ctx),
            Err(GraphError::NodeNotFound(nid("ghost")))
        );
    }

    #[test]
    fn nodes_serialize_with_type_tags() {
        let node = WorkflowNode::new(
            nid("grace"),
            NodeKind::Wait {
                wait: WaitKind::Grace,
                duration_hours: Some(168),
            },
        );
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(
            json,
            json!({"id": "grace", "kind": {"type": "wait", "wait": "grace", "duration_hours": 168}})
        );

        let retry: WorkflowNode =
            serde_json::from_value(json!({"id": "r1", "kind": {"type": "action", "action": {"kind": "retry"}}}))
                .unwrap();
        assert!(retry.is_retry());
    }

    #[test]
    fn edges_default_to_always() {
        let edge: WorkflowEdge = serde_json::from_value(json!({"from": "a", "to": "b"})).unwrap();
        assert_eq!(edge.guard, EdgeGuard::Always);
    }
}
