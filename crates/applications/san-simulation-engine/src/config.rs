//! JSON configuration files
//!
//! A topology file lists the nodes, the adjacency and, optionally, an explicit
//! degree table and redistribution neighbor map:
//!
//! ```json
//! {
//!   "nodes": [
//!     { "id": "Sw1", "kind": "switch", "base_lambda": 3.0e-6, "initial_load": 15.0 },
//!     { "id": "Sr1", "kind": "server", "base_lambda": 4.756469781e-11 }
//!   ],
//!   "adjacency": { "Sr1": ["Sw1"] }
//! }
//! ```
//!
//! A simulation file holds a [`SimulationConfig`]; every field is optional.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use san_core::{NodeId, NodeSpec};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::simulator::SimulationConfig;
use crate::topology::Topology;

/// Serializable form of a [`Topology`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyConfig {
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub adjacency: BTreeMap<NodeId, Vec<NodeId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degrees: Option<BTreeMap<NodeId, u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redistribution_neighbors: Option<BTreeMap<NodeId, Vec<NodeId>>>,
}

impl TopologyConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| {
            EngineError::config(format!("cannot read topology file {}: {e}", path.display()))
        })?;
        debug!(path = %path.display(), "loaded topology file");
        Self::from_json(&json)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Validate and build the topology
    pub fn build(self) -> Result<Topology> {
        Ok(Topology::new(
            self.nodes,
            self.adjacency,
            self.degrees,
            self.redistribution_neighbors,
        )?)
    }
}

impl TryFrom<TopologyConfig> for Topology {
    type Error = EngineError;

    fn try_from(config: TopologyConfig) -> Result<Self> {
        config.build()
    }
}

impl From<&Topology> for TopologyConfig {
    /// Full description with explicit degrees and closures, so a round trip keeps
    /// them even when they were not derived from the adjacency
    fn from(topology: &Topology) -> Self {
        TopologyConfig {
            nodes: topology.nodes().to_vec(),
            adjacency: topology.adjacency().clone(),
            degrees: Some(topology.degrees().clone()),
            redistribution_neighbors: Some(topology.redistribution_neighbors().clone()),
        }
    }
}

/// Read a simulation config file
pub fn load_simulation_config(path: &Path) -> Result<SimulationConfig> {
    let json = fs::read_to_string(path).map_err(|e| {
        EngineError::config(format!("cannot read simulation config {}: {e}", path.display()))
    })?;
    let config: SimulationConfig = serde_json::from_str(&json)?;
    config.validate()?;
    Ok(config)
}
