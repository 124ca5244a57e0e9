//! Core types for the SAN reliability model

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::SanError;

/// Node identifier (e.g. "Sw1", "Sr2", "Sa1")
pub type NodeId = String;

/// Point-in-time load per node.
///
/// Ordered by id so every iteration over a snapshot is deterministic.
pub type LoadSnapshot = BTreeMap<NodeId, f64>;

/// Probability that each component is up, keyed by node id
pub type ReliabilityMap = BTreeMap<NodeId, f64>;

/// Kind of SAN node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Switch,
    Server,
    Storage,
}

impl NodeKind {
    /// Only switches have load-dependent failure rates
    pub fn is_load_dependent(&self) -> bool {
        matches!(self, NodeKind::Switch)
    }
}

fn default_alpha() -> f64 {
    1.0
}

/// Static description of a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: NodeId,
    pub kind: NodeKind,
    /// Base failure rate λ₀ (per hour). For servers and storage this is the constant rate.
    pub base_lambda: f64,
    /// Load exponent α (switches only)
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    /// Initial load L0
    #[serde(default)]
    pub initial_load: f64,
}

impl NodeSpec {
    pub fn switch(id: impl Into<NodeId>, base_lambda: f64, initial_load: f64) -> Self {
        NodeSpec {
            id: id.into(),
            kind: NodeKind::Switch,
            base_lambda,
            alpha: default_alpha(),
            initial_load,
        }
    }

    pub fn server(id: impl Into<NodeId>, base_lambda: f64) -> Self {
        NodeSpec {
            id: id.into(),
            kind: NodeKind::Server,
            base_lambda,
            alpha: default_alpha(),
            initial_load: 0.0,
        }
    }

    pub fn storage(id: impl Into<NodeId>, base_lambda: f64) -> Self {
        NodeSpec {
            id: id.into(),
            kind: NodeKind::Storage,
            base_lambda,
            alpha: default_alpha(),
            initial_load: 0.0,
        }
    }

    /// Override the load exponent
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }
}

/// How the trigger threshold evolves across rounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThresholdPolicy {
    /// Constant threshold for every round
    Static,
    /// Threshold decays by a fixed step after each successful round
    Dynamic,
}

/// Ranking used to choose redistribution sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionCriterion {
    /// Lowest reliability first (most vulnerable)
    Reliability,
    /// Highest load first
    Load,
}

/// The four mitigation schemes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SchemeId {
    StaticReliability = 1,
    StaticLoad = 2,
    DynamicReliability = 3,
    DynamicLoad = 4,
}

impl SchemeId {
    pub const ALL: [SchemeId; 4] = [
        SchemeId::StaticReliability,
        SchemeId::StaticLoad,
        SchemeId::DynamicReliability,
        SchemeId::DynamicLoad,
    ];

    pub fn number(&self) -> u8 {
        *self as u8
    }

    pub fn threshold_policy(&self) -> ThresholdPolicy {
        match self {
            SchemeId::StaticReliability | SchemeId::StaticLoad => ThresholdPolicy::Static,
            SchemeId::DynamicReliability | SchemeId::DynamicLoad => ThresholdPolicy::Dynamic,
        }
    }

    pub fn criterion(&self) -> SelectionCriterion {
        match self {
            SchemeId::StaticReliability | SchemeId::DynamicReliability => {
                SelectionCriterion::Reliability
            }
            SchemeId::StaticLoad | SchemeId::DynamicLoad => SelectionCriterion::Load,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SchemeId::StaticReliability => "StaticReliability",
            SchemeId::StaticLoad => "StaticLoad",
            SchemeId::DynamicReliability => "DynamicReliability",
            SchemeId::DynamicLoad => "DynamicLoad",
        }
    }
}

impl TryFrom<u8> for SchemeId {
    type Error = SanError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(SchemeId::StaticReliability),
            2 => Ok(SchemeId::StaticLoad),
            3 => Ok(SchemeId::DynamicReliability),
            4 => Ok(SchemeId::DynamicLoad),
            other => Err(SanError::UnknownScheme(other)),
        }
    }
}

impl From<SchemeId> for u8 {
    fn from(id: SchemeId) -> u8 {
        id.number()
    }
}

impl fmt::Display for SchemeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.number(), self.name())
    }
}

/// Relative change in system reliability, (after - before) / before.
///
/// Undefined when the baseline reliability is zero.
pub fn improvement_ratio(before: f64, after: f64) -> Option<f64> {
    if before == 0.0 {
        None
    } else {
        Some((after - before) / before)
    }
}

/// Outcome of one redistribution round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedistributionRecord {
    /// One-based round index within the scheme run
    pub round: u32,
    /// Simulated time of the trigger (hours)
    pub time: f64,
    /// Threshold active when the round was triggered
    pub threshold: f64,
    /// Sources redistributed in this round, in the order they were chosen
    pub sources: Vec<NodeId>,
    /// Switch loads before the round
    pub loads_before: LoadSnapshot,
    /// Switch loads after the round
    pub loads_after: LoadSnapshot,
    pub reliabilities_before: ReliabilityMap,
    pub reliabilities_after: ReliabilityMap,
    pub system_reliability_before: f64,
    pub system_reliability_after: f64,
    /// `None` when the baseline system reliability was zero
    pub improvement_ratio: Option<f64>,
}

impl RedistributionRecord {
    /// Total switch load before the round
    pub fn total_load_before(&self) -> f64 {
        self.loads_before.values().sum()
    }

    /// Total switch load after the round
    pub fn total_load_after(&self) -> f64 {
        self.loads_after.values().sum()
    }
}

/// Snapshot handed to observers after every tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickSample {
    pub time: f64,
    pub threshold: f64,
    /// Switch loads at the end of the tick
    pub loads: LoadSnapshot,
    /// System reliability at the end of the tick, if the fault tree could be evaluated
    pub system_reliability: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_id_conversion() {
        for n in 1..=4u8 {
            let id = SchemeId::try_from(n).unwrap();
            assert_eq!(id.number(), n);
        }
        assert_eq!(SchemeId::try_from(0), Err(SanError::UnknownScheme(0)));
        assert_eq!(SchemeId::try_from(5), Err(SanError::UnknownScheme(5)));
    }

    #[test]
    fn test_scheme_policy_matrix() {
        assert_eq!(SchemeId::StaticReliability.threshold_policy(), ThresholdPolicy::Static);
        assert_eq!(SchemeId::StaticLoad.criterion(), SelectionCriterion::Load);
        assert_eq!(SchemeId::DynamicReliability.threshold_policy(), ThresholdPolicy::Dynamic);
        assert_eq!(SchemeId::DynamicReliability.criterion(), SelectionCriterion::Reliability);
        assert_eq!(SchemeId::DynamicLoad.threshold_policy(), ThresholdPolicy::Dynamic);
        assert_eq!(SchemeId::DynamicLoad.criterion(), SelectionCriterion::Load);
    }

    #[test]
    fn test_scheme_id_serde_as_number() {
        let json = serde_json::to_string(&SchemeId::DynamicLoad).unwrap();
        assert_eq!(json, "4");

        let parsed: SchemeId = serde_json::from_str("2").unwrap();
        assert_eq!(parsed, SchemeId::StaticLoad);
        assert!(serde_json::from_str::<SchemeId>("7").is_err());
    }

    #[test]
    fn test_improvement_ratio() {
        assert_eq!(improvement_ratio(0.5, 0.75), Some(0.5));
        assert_eq!(improvement_ratio(0.8, 0.8), Some(0.0));
        assert_eq!(improvement_ratio(0.0, 0.4), None);
    }

    #[test]
    fn test_node_spec_defaults_from_json() {
        let node: NodeSpec =
            serde_json::from_str(r#"{"id": "Sw9", "kind": "switch", "base_lambda": 1e-6}"#)
                .unwrap();

        assert_eq!(node.kind, NodeKind::Switch);
        assert_eq!(node.alpha, 1.0);
        assert_eq!(node.initial_load, 0.0);
        assert!(node.kind.is_load_dependent());
        assert!(!NodeKind::Storage.is_load_dependent());
    }
}
