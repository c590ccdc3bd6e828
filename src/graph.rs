//! Usage Graph Builder: which scenarios lean on which shared entities.
//!
//! The graph is a pure function of the canonical model, rebuilt on demand
//! and never persisted with it. Identical models yield identical node and
//! edge sets regardless of construction order.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use petgraph::graph::{DiGraph, NodeIndex};

use crate::model::{ParameterSet, ScenarioEntry, TestPlan};

/// A node of the usage graph.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum UsageNode {
    Scenario { id: u32, title: String },
    SharedStep { id: u32, title: String },
    SharedParameters { id: u32, name: String },
}

impl UsageNode {
    /// Stable identity used for deduplication and DOT node ids.
    fn key(&self) -> String {
        match self {
            UsageNode::Scenario { id, .. } => format!("scenario:{id}"),
            UsageNode::SharedStep { id, .. } => format!("shared_step:{id}"),
            UsageNode::SharedParameters { id, .. } => format!("shared_parameters:{id}"),
        }
    }

    fn label(&self) -> &str {
        match self {
            UsageNode::Scenario { title, .. } | UsageNode::SharedStep { title, .. } => title,
            UsageNode::SharedParameters { name, .. } => name,
        }
    }
}

/// Edge kind: a step reference or a parameter-set reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum UsageEdge {
    Step,
    Parameters,
}

impl UsageEdge {
    fn as_str(self) -> &'static str {
        match self {
            UsageEdge::Step => "step",
            UsageEdge::Parameters => "parameters",
        }
    }
}

/// Directed reuse graph: consumer → shared entity.
#[derive(Debug)]
pub struct UsageGraph {
    graph: DiGraph<UsageNode, UsageEdge>,
}

/// Derive the usage graph from a populated plan.
pub fn build(plan: &TestPlan) -> UsageGraph {
    let mut graph = DiGraph::new();
    let mut index_by_key: BTreeMap<String, NodeIndex> = BTreeMap::new();

    let mut intern = |graph: &mut DiGraph<UsageNode, UsageEdge>, node: UsageNode| {
        let key = node.key();
        *index_by_key
            .entry(key)
            .or_insert_with(|| graph.add_node(node))
    };

    for suite in &plan.suites {
        for scenario in &suite.scenarios {
            let consumer = intern(
                &mut graph,
                UsageNode::Scenario {
                    id: scenario.id,
                    title: scenario.title.clone(),
                },
            );
            for entry in &scenario.entries {
                if let ScenarioEntry::SharedStep(id) = entry {
                    if let Some(shared) = plan.shared_steps.get(id) {
                        let target = intern(
                            &mut graph,
                            UsageNode::SharedStep {
                                id: shared.id,
                                title: shared.title.clone(),
                            },
                        );
                        graph.add_edge(consumer, target, UsageEdge::Step);
                    }
                }
            }
            if let ParameterSet::Shared(bindings) = &scenario.parameters {
                let mut set_ids = BTreeSet::new();
                for binding in bindings {
                    if !set_ids.insert(binding.set_id) {
                        continue;
                    }
                    if let Some(set) = plan.shared_parameters.get(&binding.set_id) {
                        let target = intern(
                            &mut graph,
                            UsageNode::SharedParameters {
                                id: set.id,
                                name: set.name.clone(),
                            },
                        );
                        graph.add_edge(consumer, target, UsageEdge::Parameters);
                    }
                }
            }
        }
    }

    tracing::debug!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "built usage graph"
    );
    UsageGraph { graph }
}

impl UsageGraph {
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Order-independent node set, keyed by identity.
    pub fn node_set(&self) -> BTreeSet<UsageNode> {
        self.graph.node_weights().cloned().collect()
    }

    /// Order-independent edge set as (consumer key, target key, kind).
    pub fn edge_set(&self) -> BTreeSet<(String, String, &'static str)> {
        self.graph
            .edge_indices()
            .filter_map(|edge| {
                let (from, to) = self.graph.edge_endpoints(edge)?;
                Some((
                    self.graph[from].key(),
                    self.graph[to].key(),
                    self.graph[edge].as_str(),
                ))
            })
            .collect()
    }

    /// Render a DOT listing for external visualization.
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph usage {\n");
        for node in self.graph.node_indices() {
            let weight = &self.graph[node];
            let shape = match weight {
                UsageNode::Scenario { .. } => "box",
                UsageNode::SharedStep { .. } => "ellipse",
                UsageNode::SharedParameters { .. } => "diamond",
            };
            let _ = writeln!(
                out,
                "    {:?} [label={:?} shape={shape}];",
                weight.key(),
                weight.label()
            );
        }
        for (from, to, kind) in self.edge_set() {
            let _ = writeln!(out, "    {from:?} -> {to:?} [label={kind:?}];");
        }
        out.push_str("}\n");
        out
    }
}
