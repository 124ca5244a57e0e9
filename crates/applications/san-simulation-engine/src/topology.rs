//! SAN topology: switches, servers and storage arrays
//!
//! Holds the immutable graph (adjacency, switch-to-switch degrees, redistribution
//! closures, per-node failure parameters) plus the mutable load vector of one run.
//! Adjacency is undirected: every edge is stored in both directions.

use std::collections::{BTreeMap, HashSet};

use pathfinding::prelude::bfs_reach;
use san_core::{LoadSnapshot, NodeId, NodeKind, NodeSpec, ReliabilityMap, Result, SanError};

use crate::aftm;

/// Constant failure rate of servers and storage arrays (per hour)
pub const SERVER_ARRAY_LAMBDA: f64 = 4.756469781e-11;

/// Graph of SAN nodes with per-node failure parameters and current loads
#[derive(Debug, Clone, PartialEq)]
pub struct Topology {
    nodes: Vec<NodeSpec>,
    index: BTreeMap<NodeId, usize>,
    adjacency: BTreeMap<NodeId, Vec<NodeId>>,
    degrees: BTreeMap<NodeId, u32>,
    redistribution_neighbors: BTreeMap<NodeId, Vec<NodeId>>,
    initial_loads: LoadSnapshot,
    loads: LoadSnapshot,
}

impl Topology {
    /// Build and validate a topology.
    ///
    /// `degrees` and `redistribution_neighbors` are derived from the switch-to-switch
    /// part of the adjacency when not supplied.
    pub fn new(
        nodes: Vec<NodeSpec>,
        adjacency: BTreeMap<NodeId, Vec<NodeId>>,
        degrees: Option<BTreeMap<NodeId, u32>>,
        redistribution_neighbors: Option<BTreeMap<NodeId, Vec<NodeId>>>,
    ) -> Result<Self> {
        if nodes.is_empty() {
            return Err(SanError::topology("topology has no nodes"));
        }

        let mut index = BTreeMap::new();
        for (i, node) in nodes.iter().enumerate() {
            validate_node(node)?;
            if index.insert(node.id.clone(), i).is_some() {
                return Err(SanError::topology(format!("duplicate node id {}", node.id)));
            }
        }

        let kind_of = |id: &str| index.get(id).map(|&i| nodes[i].kind);

        // Symmetrize, keeping first-seen neighbor order
        let mut undirected: BTreeMap<NodeId, Vec<NodeId>> =
            nodes.iter().map(|n| (n.id.clone(), Vec::new())).collect();
        for (from, targets) in &adjacency {
            let from_kind = kind_of(from)
                .ok_or_else(|| SanError::topology(format!("adjacency for unknown node {from}")))?;
            for to in targets {
                let to_kind = kind_of(to).ok_or_else(|| {
                    SanError::topology(format!("{from} is adjacent to unknown node {to}"))
                })?;
                if from == to {
                    return Err(SanError::topology(format!("self-loop on {from}")));
                }
                if from_kind != NodeKind::Switch && to_kind != NodeKind::Switch {
                    return Err(SanError::topology(format!(
                        "{from} and {to} may only connect through switches"
                    )));
                }
                push_unique(undirected.entry(from.clone()).or_default(), to);
                push_unique(undirected.entry(to.clone()).or_default(), from);
            }
        }

        let switch_neighbors = |id: &str| -> Vec<NodeId> {
            undirected
                .get(id)
                .map(|ns| {
                    ns.iter()
                        .filter(|n| kind_of(n) == Some(NodeKind::Switch))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        };
        let switch_ids: Vec<NodeId> = nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Switch)
            .map(|n| n.id.clone())
            .collect();

        let degrees = match degrees {
            Some(table) => {
                for id in table.keys() {
                    if kind_of(id) != Some(NodeKind::Switch) {
                        return Err(SanError::topology(format!(
                            "degree given for non-switch node {id}"
                        )));
                    }
                }
                table
            }
            None => switch_ids
                .iter()
                .map(|id| (id.clone(), switch_neighbors(id).len() as u32))
                .collect(),
        };

        let redistribution_neighbors = match redistribution_neighbors {
            Some(map) => {
                for (id, ns) in &map {
                    for n in std::iter::once(id).chain(ns) {
                        if kind_of(n) != Some(NodeKind::Switch) {
                            return Err(SanError::topology(format!(
                                "redistribution neighbor map references non-switch {n}"
                            )));
                        }
                    }
                }
                map
            }
            None => switch_ids
                .iter()
                .map(|id| (id.clone(), switch_neighbors(id)))
                .collect(),
        };

        let initial_loads: LoadSnapshot = nodes
            .iter()
            .filter(|n| n.kind == NodeKind::Switch)
            .map(|n| (n.id.clone(), n.initial_load))
            .collect();

        let topology = Topology {
            loads: initial_loads.clone(),
            initial_loads,
            nodes,
            index,
            adjacency: undirected,
            degrees,
            redistribution_neighbors,
        };

        if !topology.is_connected() {
            return Err(SanError::topology("graph is not connected"));
        }

        Ok(topology)
    }

    /// The reference SAN: five meshed switches, two servers, two storage arrays
    pub fn san_default() -> Self {
        let nodes = vec![
            NodeSpec::switch("Sw1", 3.0e-6, 15.0),
            NodeSpec::switch("Sw2", 5.0e-6, 50.0),
            NodeSpec::switch("Sw3", 3.0e-5, 5.0),
            NodeSpec::switch("Sw4", 3.0e-6, 1.0),
            NodeSpec::switch("Sw5", 3.5e-6, 8.0),
            NodeSpec::server("Sr1", SERVER_ARRAY_LAMBDA),
            NodeSpec::server("Sr2", SERVER_ARRAY_LAMBDA),
            NodeSpec::storage("Sa1", SERVER_ARRAY_LAMBDA),
            NodeSpec::storage("Sa2", SERVER_ARRAY_LAMBDA),
        ];

        let adjacency = edges(&[
            ("Sr1", &["Sw4", "Sw5"][..]),
            ("Sr2", &["Sw3", "Sw5"][..]),
            ("Sa1", &["Sw1", "Sw2"][..]),
            ("Sa2", &["Sw2", "Sw3"][..]),
            ("Sw1", &["Sw2", "Sw4", "Sw5"][..]),
            ("Sw2", &["Sw1", "Sw3", "Sw4", "Sw5"][..]),
            ("Sw3", &["Sw2", "Sw4", "Sw5"][..]),
            ("Sw4", &["Sw1", "Sw2", "Sw3", "Sw5"][..]),
            ("Sw5", &["Sw1", "Sw2", "Sw3", "Sw4"][..]),
        ]);

        // Closures of the published mesh figure, narrower than the full adjacency
        let closures = edges(&[
            ("Sw1", &["Sw4"][..]),
            ("Sw2", &["Sw4", "Sw5"][..]),
            ("Sw3", &["Sw5"][..]),
            ("Sw4", &["Sw1", "Sw2"][..]),
            ("Sw5", &["Sw2", "Sw3"][..]),
        ]);

        match Topology::new(nodes, adjacency, None, Some(closures)) {
            Ok(topology) => topology,
            Err(e) => unreachable!("built-in SAN topology is invalid: {e}"),
        }
    }

    pub fn nodes(&self) -> &[NodeSpec] {
        &self.nodes
    }

    pub fn node(&self, id: &str) -> Option<&NodeSpec> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    /// Switch ids in declaration order
    pub fn switches(&self) -> Vec<NodeId> {
        self.ids_of(NodeKind::Switch)
    }

    pub fn ids_of(&self, kind: NodeKind) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|n| n.kind == kind)
            .map(|n| n.id.clone())
            .collect()
    }

    /// Switch-to-switch degree; zero for servers, storage and unknown ids
    pub fn degree(&self, id: &str) -> u32 {
        self.degrees.get(id).copied().unwrap_or(0)
    }

    pub fn degrees(&self) -> &BTreeMap<NodeId, u32> {
        &self.degrees
    }

    /// All neighbors of a node, any kind; empty for unknown ids
    pub fn neighbors(&self, id: &str) -> Vec<NodeId> {
        self.adjacency.get(id).cloned().unwrap_or_default()
    }

    pub fn adjacency(&self) -> &BTreeMap<NodeId, Vec<NodeId>> {
        &self.adjacency
    }

    /// Switch neighbors that may receive a switch's redistributed load
    pub fn redistribution_neighbors(&self) -> &BTreeMap<NodeId, Vec<NodeId>> {
        &self.redistribution_neighbors
    }

    pub fn initial_loads(&self) -> &LoadSnapshot {
        &self.initial_loads
    }

    pub fn loads(&self) -> &LoadSnapshot {
        &self.loads
    }

    pub fn set_loads(&mut self, loads: LoadSnapshot) {
        self.loads = loads;
    }

    pub fn set_load(&mut self, id: &str, load: f64) {
        self.loads.insert(id.to_string(), load);
    }

    /// Add `delta` to one node's current load
    pub fn add_load(&mut self, id: &str, delta: f64) {
        *self.loads.entry(id.to_string()).or_insert(0.0) += delta;
    }

    /// Restore loads to L0
    pub fn reset_loads(&mut self) {
        self.loads = self.initial_loads.clone();
    }

    /// Independent deep copy for a sandboxed run
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// Override α on every switch
    pub fn set_switch_alpha(&mut self, alpha: f64) -> Result<()> {
        if !alpha.is_finite() {
            return Err(SanError::invalid_input(format!("alpha must be finite, got {alpha}")));
        }
        for node in self.nodes.iter_mut().filter(|n| n.kind == NodeKind::Switch) {
            node.alpha = alpha;
        }
        Ok(())
    }

    /// Whether every node is reachable from the first one
    pub fn is_connected(&self) -> bool {
        let Some(start) = self.nodes.first() else {
            return true;
        };
        let reachable: HashSet<NodeId> = bfs_reach(start.id.clone(), |id: &NodeId| {
            self.adjacency.get(id).cloned().unwrap_or_default()
        })
        .collect();
        reachable.len() == self.nodes.len()
    }

    /// Per-component reliability at time `t` for the given loads.
    ///
    /// Switches follow the load-dependent model; servers and storage use their
    /// constant rate. Switches missing from `loads` are treated as unloaded.
    pub fn reliabilities_at(&self, t: f64, loads: &LoadSnapshot) -> Result<ReliabilityMap> {
        self.nodes
            .iter()
            .map(|node| {
                let r = if node.kind.is_load_dependent() {
                    let load = loads.get(&node.id).copied().unwrap_or(0.0);
                    aftm::reliability(t, load, node.base_lambda, node.alpha)?
                } else {
                    aftm::constant_rate_reliability(t, node.base_lambda)?
                };
                Ok((node.id.clone(), r))
            })
            .collect()
    }
}

fn validate_node(node: &NodeSpec) -> Result<()> {
    if node.id.trim().is_empty() {
        return Err(SanError::topology("node id must not be empty"));
    }
    if !node.base_lambda.is_finite() || node.base_lambda < 0.0 {
        return Err(SanError::topology(format!(
            "{}: base_lambda must be a non-negative number",
            node.id
        )));
    }
    if !node.alpha.is_finite() {
        return Err(SanError::topology(format!("{}: alpha must be finite", node.id)));
    }
    if !node.initial_load.is_finite() || node.initial_load < 0.0 {
        return Err(SanError::topology(format!(
            "{}: initial_load must be a non-negative number",
            node.id
        )));
    }
    Ok(())
}

fn push_unique(list: &mut Vec<NodeId>, id: &str) {
    if !list.iter().any(|n| n == id) {
        list.push(id.to_string());
    }
}

fn edges(list: &[(&str, &[&str])]) -> BTreeMap<NodeId, Vec<NodeId>> {
    list.iter()
        .map(|(from, to)| {
            (
                from.to_string(),
                to.iter().map(|s| s.to_string()).collect(),
            )
        })
        .collect()
}
