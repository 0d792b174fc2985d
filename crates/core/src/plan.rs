// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plan graph: the node definitions one execution walks
//!
//! A plan is fixed once an execution starts. The only change allowed
//! afterwards is appending identity nodes, which alias an existing node's
//! configuration under a fresh id with their own successor pointer.

use crate::adviser::AdviserConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Errors in plan structure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("start node not found: {0}")]
    MissingStartNode(String),
    #[error("node not found: {0}")]
    NodeNotFound(String),
    #[error("node {node_id} references missing node {reference}")]
    DanglingReference { node_id: String, reference: String },
    #[error("identity chain does not reach a plan node: {0}")]
    IdentityCycle(String),
    #[error("node already exists: {0}")]
    DuplicateNode(String),
}

/// What a plan node does when it runs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    /// Dispatched to an external worker
    #[default]
    Step,
    /// Runs one child chain; finishes when the chain does
    Section { child: String },
    /// Runs every child as a parallel branch; finishes when all do
    Fork { children: Vec<String> },
}

/// A node with its own step configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanNode {
    pub id: String,
    pub identifier: String,
    pub name: String,
    pub step_type: String,
    #[serde(default)]
    pub kind: NodeKind,
    #[serde(default)]
    pub preserve_in_rollback: bool,
    #[serde(default)]
    pub next_id: Option<String>,
    #[serde(default)]
    pub advisers: Vec<AdviserConfig>,
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
}

impl PlanNode {
    /// A step node whose identifier and name default to its id
    pub fn step(id: impl Into<String>, step_type: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            identifier: id.clone(),
            name: id.clone(),
            id,
            step_type: step_type.into(),
            kind: NodeKind::Step,
            preserve_in_rollback: false,
            next_id: None,
            advisers: Vec::new(),
            timeout: None,
        }
    }

    pub fn section(id: impl Into<String>, child: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::Section {
                child: child.into(),
            },
            ..Self::step(id, "SECTION")
        }
    }

    pub fn fork(id: impl Into<String>, children: Vec<String>) -> Self {
        Self {
            kind: NodeKind::Fork { children },
            ..Self::step(id, "FORK")
        }
    }

    pub fn with_next(mut self, next_id: impl Into<String>) -> Self {
        self.next_id = Some(next_id.into());
        self
    }

    pub fn with_adviser(mut self, adviser: AdviserConfig) -> Self {
        self.advisers.push(adviser);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn is_step(&self) -> bool {
        self.kind == NodeKind::Step
    }

    fn references(&self) -> Vec<&str> {
        let mut refs: Vec<&str> = self.next_id.iter().map(String::as_str).collect();
        match &self.kind {
            NodeKind::Step => {}
            NodeKind::Section { child } => refs.push(child),
            NodeKind::Fork { children } => refs.extend(children.iter().map(String::as_str)),
        }
        refs.extend(
            self.advisers
                .iter()
                .filter_map(AdviserConfig::target)
                .filter(|t| !t.is_empty()),
        );
        refs
    }
}

/// A reference node reusing another node's configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityPlanNode {
    pub id: String,
    /// Node whose configuration this node runs
    pub original_node_id: String,
    /// Execution instance being aliased, when the alias re-enters a prior run
    #[serde(default)]
    pub original_node_execution_id: Option<String>,
    /// Successor override
    #[serde(default)]
    pub next_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node_type", rename_all = "snake_case")]
pub enum Node {
    Plan(PlanNode),
    Identity(IdentityPlanNode),
}

impl Node {
    pub fn id(&self) -> &str {
        match self {
            Node::Plan(n) => &n.id,
            Node::Identity(n) => &n.id,
        }
    }

    /// Static successor of this node
    pub fn next_id(&self) -> Option<&str> {
        match self {
            Node::Plan(n) => n.next_id.as_deref(),
            Node::Identity(n) => n.next_id.as_deref(),
        }
    }

    pub fn is_identity(&self) -> bool {
        matches!(self, Node::Identity(_))
    }
}

impl From<PlanNode> for Node {
    fn from(node: PlanNode) -> Self {
        Node::Plan(node)
    }
}

impl From<IdentityPlanNode> for Node {
    fn from(node: IdentityPlanNode) -> Self {
        Node::Identity(node)
    }
}

/// Node definitions for one execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub start_node_id: String,
    pub nodes: BTreeMap<String, Node>,
    pub created_at: DateTime<Utc>,
}

impl Plan {
    pub fn new(
        id: impl Into<String>,
        start_node_id: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            start_node_id: start_node_id.into(),
            nodes: BTreeMap::new(),
            created_at,
        }
    }

    /// Add a node while authoring the plan
    pub fn with_node(mut self, node: impl Into<Node>) -> Self {
        let node = node.into();
        self.nodes.insert(node.id().to_string(), node);
        self
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Configuration a node runs with, following identity aliases
    pub fn resolve(&self, id: &str) -> Result<&PlanNode, PlanError> {
        let mut current = id;
        for _ in 0..=self.nodes.len() {
            match self.nodes.get(current) {
                Some(Node::Plan(node)) => return Ok(node),
                Some(Node::Identity(alias)) => current = &alias.original_node_id,
                None => return Err(PlanError::NodeNotFound(current.to_string())),
            }
        }
        Err(PlanError::IdentityCycle(id.to_string()))
    }

    /// Static successor of a node (identity nodes use their override)
    pub fn next_of(&self, id: &str) -> Option<&str> {
        self.nodes.get(id).and_then(Node::next_id)
    }

    /// Check that every reference in the graph resolves
    pub fn validate(&self) -> Result<(), PlanError> {
        if !self.nodes.contains_key(&self.start_node_id) {
            return Err(PlanError::MissingStartNode(self.start_node_id.clone()));
        }

        for node in self.nodes.values() {
            let refs = match node {
                Node::Plan(n) => n.references(),
                Node::Identity(n) => {
                    self.resolve(&n.id)?;
                    let mut refs = vec![n.original_node_id.as_str()];
                    refs.extend(n.next_id.as_deref());
                    refs
                }
            };
            if let Some(missing) = refs.into_iter().find(|r| !self.nodes.contains_key(*r)) {
                return Err(PlanError::DanglingReference {
                    node_id: node.id().to_string(),
                    reference: missing.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Append a dynamically created identity node
    pub fn append_identity(&mut self, node: IdentityPlanNode) -> Result<(), PlanError> {
        if self.nodes.contains_key(&node.id) {
            return Err(PlanError::DuplicateNode(node.id));
        }
        if !self.nodes.contains_key(&node.original_node_id) {
            return Err(PlanError::DanglingReference {
                node_id: node.id,
                reference: node.original_node_id,
            });
        }
        if let Some(next) = node.next_id.as_deref() {
            if !self.nodes.contains_key(next) {
                return Err(PlanError::DanglingReference {
                    node_id: node.id.clone(),
                    reference: next.to_string(),
                });
            }
        }
        self.nodes.insert(node.id.clone(), Node::Identity(node));
        Ok(())
    }
}

#[cfg(test)]
#[path = "plan_tests.rs"]
mod tests;
