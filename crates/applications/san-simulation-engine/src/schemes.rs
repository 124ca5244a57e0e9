//! Mitigation schemes: threshold policy x source selection
//!
//! Four schemes to compare:
//! - 1: Static threshold, reliability-sensitive selection
//! - 2: Static threshold, load-sensitive selection
//! - 3: Dynamic threshold (decays by `s` after each round), reliability-sensitive
//! - 4: Dynamic threshold, load-sensitive
//!
//! Source selection is pluggable: either a ranking computed from the current
//! snapshot, or a fixed per-round table reproducing published source sets.

use std::collections::BTreeMap;

use san_core::{
    LoadSnapshot, NodeId, ReliabilityMap, Result, SanError, SchemeId, SelectionCriterion,
    ThresholdPolicy,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Default trigger threshold
pub const DEFAULT_THRESHOLD: f64 = 50.0;

/// Default dynamic decay step `s`
pub const DEFAULT_DECAY_STEP: f64 = 5.0;

/// Default number of sources per round
pub const DEFAULT_TOP_K: usize = 3;

/// Strategy for choosing the sources of a round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SourceSelection {
    /// Rank the candidates by the criterion and take the top K
    Ranked(SelectionCriterion),

    /// Fixed source list per one-based round; rounds missing from the table use
    /// the fallback ranking
    Table {
        rounds: BTreeMap<u32, Vec<NodeId>>,
        fallback: SelectionCriterion,
    },
}

impl SourceSelection {
    /// Published per-round source sets for a scheme
    pub fn reference_table(scheme: SchemeId) -> Self {
        let sets: [[&str; 3]; 3] = match scheme.criterion() {
            SelectionCriterion::Reliability => [
                ["Sw1", "Sw2", "Sw3"],
                ["Sw2", "Sw3", "Sw5"],
                ["Sw2", "Sw3", "Sw4"],
            ],
            SelectionCriterion::Load => [
                ["Sw2", "Sw1", "Sw5"],
                ["Sw2", "Sw3", "Sw5"],
                ["Sw2", "Sw3", "Sw4"],
            ],
        };

        let rounds: BTreeMap<u32, Vec<NodeId>> = sets
            .iter()
            .zip(1u32..)
            .map(|(set, round)| (round, set.iter().map(|s| s.to_string()).collect()))
            .collect();

        SourceSelection::Table {
            rounds,
            fallback: scheme.criterion(),
        }
    }

    /// Choose up to `top_k` sources, never including `excluded`
    pub fn select(
        &self,
        loads: &LoadSnapshot,
        reliabilities: &ReliabilityMap,
        excluded: &str,
        all_nodes: &[NodeId],
        round: u32,
        top_k: usize,
    ) -> Vec<NodeId> {
        match self {
            SourceSelection::Ranked(criterion) => {
                rank(*criterion, loads, reliabilities, excluded, all_nodes, top_k)
            }
            SourceSelection::Table { rounds, fallback } => match rounds.get(&round) {
                Some(fixed) => fixed
                    .iter()
                    .filter(|id| all_nodes.contains(id) && id.as_str() != excluded)
                    .take(top_k)
                    .cloned()
                    .collect(),
                None => rank(*fallback, loads, reliabilities, excluded, all_nodes, top_k),
            },
        }
    }
}

fn rank(
    criterion: SelectionCriterion,
    loads: &LoadSnapshot,
    reliabilities: &ReliabilityMap,
    excluded: &str,
    all_nodes: &[NodeId],
    top_k: usize,
) -> Vec<NodeId> {
    let mut candidates: Vec<&NodeId> = all_nodes.iter().filter(|id| id.as_str() != excluded).collect();

    // Stable sort: ties keep declaration order
    match criterion {
        SelectionCriterion::Reliability => candidates.sort_by(|a, b| {
            let ra = reliabilities.get(*a).copied().unwrap_or(1.0);
            let rb = reliabilities.get(*b).copied().unwrap_or(1.0);
            ra.total_cmp(&rb)
        }),
        SelectionCriterion::Load => candidates.sort_by(|a, b| {
            let la = loads.get(*a).copied().unwrap_or(0.0);
            let lb = loads.get(*b).copied().unwrap_or(0.0);
            lb.total_cmp(&la)
        }),
    }

    candidates.into_iter().take(top_k).cloned().collect()
}

/// Tunables of a scheme run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SchemeParams {
    pub initial_threshold: f64,
    /// Decay step `s` applied after each dynamic round
    pub decay_step: f64,
    /// Dynamic thresholds never go below this
    pub threshold_floor: f64,
    pub top_k: usize,
}

impl Default for SchemeParams {
    fn default() -> Self {
        SchemeParams {
            initial_threshold: DEFAULT_THRESHOLD,
            decay_step: DEFAULT_DECAY_STEP,
            threshold_floor: 0.0,
            top_k: DEFAULT_TOP_K,
        }
    }
}

/// Threshold state machine and source selector for one scheme run.
///
/// Owns the only cross-round mutable state of a run: the active threshold and the
/// one-based round counter.
#[derive(Debug, Clone)]
pub struct MitigationScheme {
    id: SchemeId,
    selection: SourceSelection,
    params: SchemeParams,
    threshold: f64,
    round: u32,
}

impl MitigationScheme {
    /// Create a scheme that ranks sources by its criterion
    pub fn new(id: SchemeId, params: SchemeParams) -> Result<Self> {
        validate_params(id, &params)?;
        Ok(MitigationScheme {
            id,
            selection: SourceSelection::Ranked(id.criterion()),
            threshold: params.initial_threshold,
            params,
            round: 1,
        })
    }

    /// Create a scheme that replays the published source tables
    pub fn with_reference_table(id: SchemeId, params: SchemeParams) -> Result<Self> {
        Ok(Self::new(id, params)?.with_selection(SourceSelection::reference_table(id)))
    }

    /// Replace the selection strategy
    pub fn with_selection(mut self, selection: SourceSelection) -> Self {
        self.selection = selection;
        self
    }

    pub fn id(&self) -> SchemeId {
        self.id
    }

    pub fn selection(&self) -> &SourceSelection {
        &self.selection
    }

    pub fn params(&self) -> &SchemeParams {
        &self.params
    }

    pub fn is_dynamic(&self) -> bool {
        self.id.threshold_policy() == ThresholdPolicy::Dynamic
    }

    /// Currently active trigger threshold
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// One-based index of the next round
    pub fn round_index(&self) -> u32 {
        self.round
    }

    /// Select the sources for `round`, excluding the overloaded node
    pub fn select_sources(
        &self,
        loads: &LoadSnapshot,
        reliabilities: &ReliabilityMap,
        excluded: &str,
        all_nodes: &[NodeId],
        round: u32,
    ) -> Vec<NodeId> {
        let sources = self.selection.select(
            loads,
            reliabilities,
            excluded,
            all_nodes,
            round,
            self.params.top_k,
        );
        debug!(scheme = self.id.number(), round, ?sources, "selected sources");
        sources
    }

    /// Mark the current round as applied
    pub fn complete_round(&mut self) {
        self.round += 1;
    }

    /// Decay the threshold after a dynamic round. No-op for static schemes.
    pub fn apply_after_trigger(&mut self) {
        if self.is_dynamic() {
            let next = (self.threshold - self.params.decay_step).max(self.params.threshold_floor);
            debug!(
                scheme = self.id.number(),
                from = self.threshold,
                to = next,
                "threshold decayed"
            );
            self.threshold = next;
        }
    }

    /// Restore the initial threshold and round counter
    pub fn reset(&mut self) {
        self.threshold = self.params.initial_threshold;
        self.round = 1;
    }
}

fn validate_params(id: SchemeId, params: &SchemeParams) -> Result<()> {
    let non_negative = |name: &str, v: f64| {
        if v.is_finite() && v >= 0.0 {
            Ok(())
        } else {
            Err(SanError::invalid_input(format!(
                "{name} must be a non-negative number, got {v}"
            )))
        }
    };
    non_negative("initial threshold", params.initial_threshold)?;
    non_negative("decay step", params.decay_step)?;
    non_negative("threshold floor", params.threshold_floor)?;

    if params.threshold_floor > params.initial_threshold {
        return Err(SanError::invalid_input(format!(
            "threshold floor {} exceeds initial threshold {}",
            params.threshold_floor, params.initial_threshold
        )));
    }
    // A dynamic threshold must strictly decrease until it reaches the floor
    if id.threshold_policy() == ThresholdPolicy::Dynamic && params.decay_step <= 0.0 {
        return Err(SanError::invalid_input(format!(
            "scheme {id} needs a positive decay step, got {}",
            params.decay_step
        )));
    }
    if params.top_k == 0 {
        return Err(SanError::invalid_input("top_k must be at least 1"));
    }
    Ok(())
}
