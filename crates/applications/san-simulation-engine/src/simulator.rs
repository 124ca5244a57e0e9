//! Time-stepped simulation driver
//!
//! Advances a clock in fixed ticks. Each tick the bottleneck switch's load grows
//! linearly; once it reaches the scheme's active threshold a redistribution round
//! is planned against a frozen snapshot, evaluated (per-component reliabilities,
//! system reliability before and after, improvement ratio) and committed.
//!
//! Static schemes run all their rounds at the first crossing. Dynamic schemes run
//! one round per crossing and then decay the threshold, so later rounds fire at
//! later ticks.

use std::str::FromStr;

use san_core::{
    improvement_ratio, LoadSnapshot, NodeId, NodeKind, NoopObserver, RedistributionRecord,
    Result, SanError, SchemeId, SimulationObserver, TickSample,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::redistribution::{redistribute, RedistributionMode};
use crate::reliability::FaultTree;
use crate::schemes::{
    MitigationScheme, SchemeParams, DEFAULT_DECAY_STEP, DEFAULT_THRESHOLD, DEFAULT_TOP_K,
};
use crate::topology::Topology;

/// Where each round's sources come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    /// Published per-round source tables, ranked selection past the last round
    Table,
    /// Rank candidates by the scheme's criterion every round
    Ranked,
}

impl FromStr for SelectionMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "table" => Ok(SelectionMode::Table),
            "ranked" => Ok(SelectionMode::Ranked),
            other => Err(format!("unknown selection mode '{other}' (expected table or ranked)")),
        }
    }
}

/// Parameters of a simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Mission time (hours)
    pub mission_time: f64,
    /// Tick length (hours)
    pub time_step: f64,
    /// Switch whose load grows until it triggers redistribution
    pub bottleneck: NodeId,
    /// Bottleneck load growth per hour
    pub growth_rate: f64,
    /// Bottleneck load at t = 0, replacing its L0. Defaults to `Some(0.0)` so the
    /// load follows L(t) = growth_rate * t and first crosses the threshold mid-mission;
    /// starting from L0 (`None`) triggers the reference SAN at t = 0.
    pub bottleneck_initial_load: Option<f64>,
    /// Maximum redistribution rounds per scheme run
    pub max_rounds: usize,
    /// Degree exponent β of the proportional weights
    pub beta: f64,
    pub initial_threshold: f64,
    /// Dynamic threshold decay step `s`
    pub decay_step: f64,
    pub threshold_floor: f64,
    /// Sources chosen per round, not counting the bottleneck
    pub top_k: usize,
    pub selection: SelectionMode,
    /// Shed the bottleneck's excess alongside the selected sources
    pub include_bottleneck: bool,
    /// Override α on every switch
    pub alpha: Option<f64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            mission_time: 2500.0,
            time_step: 1.0,
            bottleneck: "Sw2".to_string(),
            growth_rate: 0.05,
            bottleneck_initial_load: Some(0.0),
            max_rounds: 3,
            beta: 1.0,
            initial_threshold: DEFAULT_THRESHOLD,
            decay_step: DEFAULT_DECAY_STEP,
            threshold_floor: 0.0,
            top_k: DEFAULT_TOP_K,
            selection: SelectionMode::Table,
            include_bottleneck: true,
            alpha: None,
        }
    }
}

impl SimulationConfig {
    pub fn scheme_params(&self) -> SchemeParams {
        SchemeParams {
            initial_threshold: self.initial_threshold,
            decay_step: self.decay_step,
            threshold_floor: self.threshold_floor,
            top_k: self.top_k,
        }
    }

    /// Build the scheme this config describes
    pub fn build_scheme(&self, id: SchemeId) -> Result<MitigationScheme> {
        match self.selection {
            SelectionMode::Table => MitigationScheme::with_reference_table(id, self.scheme_params()),
            SelectionMode::Ranked => MitigationScheme::new(id, self.scheme_params()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.mission_time.is_finite() || self.mission_time < 0.0 {
            return Err(SanError::invalid_input(format!(
                "mission time must be non-negative, got {}",
                self.mission_time
            )));
        }
        if !self.time_step.is_finite() || self.time_step <= 0.0 {
            return Err(SanError::invalid_input(format!(
                "time step must be positive, got {}",
                self.time_step
            )));
        }
        if !self.growth_rate.is_finite() || self.growth_rate < 0.0 {
            return Err(SanError::invalid_input(format!(
                "growth rate must be non-negative, got {}",
                self.growth_rate
            )));
        }
        if let Some(load) = self.bottleneck_initial_load {
            if !load.is_finite() || load < 0.0 {
                return Err(SanError::invalid_input(format!(
                    "bottleneck initial load must be non-negative, got {load}"
                )));
            }
        }
        if !self.beta.is_finite() {
            return Err(SanError::invalid_input(format!("beta must be finite, got {}", self.beta)));
        }
        if let Some(alpha) = self.alpha {
            if !alpha.is_finite() {
                return Err(SanError::invalid_input(format!("alpha must be finite, got {alpha}")));
            }
        }
        Ok(())
    }
}

/// Result of one scheme run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    pub scheme: SchemeId,
    pub policy_name: String,
    pub records: Vec<RedistributionRecord>,
    /// Mean of the defined improvement ratios, 0 when there are none
    pub mean_improvement_ratio: f64,
    pub timeline: Vec<TickSample>,
    pub final_loads: LoadSnapshot,
    pub final_threshold: f64,
    /// Error that stopped the run early, if any
    pub halted: Option<String>,
}

impl SimulationResult {
    pub fn rounds(&self) -> usize {
        self.records.len()
    }

    /// Time of the first redistribution
    pub fn first_trigger_time(&self) -> Option<f64> {
        self.records.first().map(|r| r.time)
    }
}

/// Mean of the defined improvement ratios; 0 for an empty run
pub fn mean_improvement_ratio(records: &[RedistributionRecord]) -> f64 {
    let defined: Vec<f64> = records.iter().filter_map(|r| r.improvement_ratio).collect();
    if defined.is_empty() {
        0.0
    } else {
        defined.iter().sum::<f64>() / defined.len() as f64
    }
}

/// Driver for a single scheme over its own copy of the topology
pub struct Simulator {
    config: SimulationConfig,
    topology: Topology,
    tree: FaultTree,
    scheme: MitigationScheme,
    switches: Vec<NodeId>,

    current_time: f64,
    records: Vec<RedistributionRecord>,
    timeline: Vec<TickSample>,
    halted: Option<String>,
}

impl Simulator {
    /// Create a simulator for one of the four schemes, configured from `config`
    pub fn new(config: SimulationConfig, topology: &Topology, scheme: SchemeId) -> Result<Self> {
        let scheme = config.build_scheme(scheme)?;
        Self::with_scheme(config, topology, scheme)
    }

    /// Create a simulator around an already-built scheme
    pub fn with_scheme(
        config: SimulationConfig,
        topology: &Topology,
        scheme: MitigationScheme,
    ) -> Result<Self> {
        config.validate()?;

        let mut topology = topology.copy();
        if let Some(alpha) = config.alpha {
            topology.set_switch_alpha(alpha)?;
        }
        match topology.node(&config.bottleneck) {
            Some(node) if node.kind == NodeKind::Switch => {}
            Some(_) => {
                return Err(SanError::invalid_input(format!(
                    "bottleneck {} is not a switch",
                    config.bottleneck
                )));
            }
            None => return Err(SanError::MissingComponent(config.bottleneck.clone())),
        }

        let switches = topology.switches();
        let mut simulator = Simulator {
            config,
            topology,
            tree: FaultTree::san(),
            scheme,
            switches,
            current_time: 0.0,
            records: Vec::new(),
            timeline: Vec::new(),
            halted: None,
        };
        simulator.reset();
        Ok(simulator)
    }

    /// Replace the fault tree used for system reliability
    pub fn with_fault_tree(mut self, tree: FaultTree) -> Self {
        self.tree = tree;
        self
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn scheme(&self) -> &MitigationScheme {
        &self.scheme
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn loads(&self) -> &LoadSnapshot {
        self.topology.loads()
    }

    /// Restore loads, threshold and round counter to their starting values
    pub fn reset(&mut self) {
        self.topology.reset_loads();
        if let Some(load) = self.config.bottleneck_initial_load {
            self.topology.set_load(&self.config.bottleneck, load);
        }
        self.scheme.reset();
        self.current_time = 0.0;
        self.records.clear();
        self.timeline.clear();
        self.halted = None;
    }

    /// Run from t = 0 without an observer
    pub fn run(&mut self) -> SimulationResult {
        self.run_with(&mut NoopObserver)
    }

    /// Run from t = 0, reporting every tick and round to `observer`
    pub fn run_with(&mut self, observer: &mut dyn SimulationObserver) -> SimulationResult {
        self.reset();
        info!(
            scheme = self.scheme.id().number(),
            policy = self.scheme.id().name(),
            mission_time = self.config.mission_time,
            threshold = self.scheme.threshold(),
            "starting scheme run"
        );

        let mut previous = 0.0;
        let mut tick: u64 = 0;
        loop {
            let t = tick as f64 * self.config.time_step;
            if t > self.config.mission_time || self.records.len() >= self.config.max_rounds {
                break;
            }

            self.topology
                .add_load(&self.config.bottleneck, self.config.growth_rate * (t - previous));
            previous = t;
            self.current_time = t;

            if self.bottleneck_load() >= self.scheme.threshold() {
                self.trigger(t, observer);
            }

            let sample = self.sample(t);
            observer.on_tick(&sample);
            self.timeline.push(sample);

            if self.halted.is_some() {
                break;
            }
            tick += 1;
        }

        self.collect_results()
    }

    fn bottleneck_load(&self) -> f64 {
        self.topology
            .loads()
            .get(&self.config.bottleneck)
            .copied()
            .unwrap_or(0.0)
    }

    fn trigger(&mut self, t: f64, observer: &mut dyn SimulationObserver) {
        info!(
            scheme = self.scheme.id().number(),
            time = t,
            load = self.bottleneck_load(),
            threshold = self.scheme.threshold(),
            "threshold reached"
        );

        if self.scheme.is_dynamic() {
            if self.apply_round(t, observer) {
                self.scheme.apply_after_trigger();
            }
        } else {
            while self.records.len() < self.config.max_rounds {
                if !self.apply_round(t, observer) {
                    break;
                }
            }
        }
    }

    /// Plan, evaluate and commit one round. A failed round changes nothing and
    /// halts the run.
    fn apply_round(&mut self, t: f64, observer: &mut dyn SimulationObserver) -> bool {
        match self.plan_round(t) {
            Ok(record) => {
                debug!(
                    round = record.round,
                    r_before = record.system_reliability_before,
                    r_after = record.system_reliability_after,
                    ir = ?record.improvement_ratio,
                    "round applied"
                );
                self.topology.set_loads(record.loads_after.clone());
                self.scheme.complete_round();
                observer.on_redistribution(&record);
                self.records.push(record);
                true
            }
            Err(e) => {
                warn!(
                    scheme = self.scheme.id().number(),
                    round = self.scheme.round_index(),
                    error = %e,
                    "redistribution round failed, halting run"
                );
                self.halted = Some(e.to_string());
                false
            }
        }
    }

    fn plan_round(&self, t: f64) -> Result<RedistributionRecord> {
        let loads = self.topology.loads();
        let reliabilities_before = self.topology.reliabilities_at(t, loads)?;
        let system_before = self.tree.system_reliability(&reliabilities_before)?;

        let round = self.scheme.round_index();
        let threshold = self.scheme.threshold();
        let bottleneck = self.config.bottleneck.as_str();

        let mut sources =
            self.scheme
                .select_sources(loads, &reliabilities_before, bottleneck, &self.switches, round);
        if sources.is_empty() {
            warn!(scheme = self.scheme.id().number(), round, "no sources selected");
        }
        if self.config.include_bottleneck {
            sources.insert(0, bottleneck.to_string());
        }

        let loads_after = redistribute(
            loads,
            self.topology.degrees(),
            &sources,
            self.topology.redistribution_neighbors(),
            self.config.beta,
            RedistributionMode::ExcessOnly {
                node: bottleneck,
                threshold,
            },
        );
        let reliabilities_after = self.topology.reliabilities_at(t, &loads_after)?;
        let system_after = self.tree.system_reliability(&reliabilities_after)?;

        Ok(RedistributionRecord {
            round,
            time: t,
            threshold,
            sources,
            loads_before: loads.clone(),
            loads_after,
            reliabilities_before,
            reliabilities_after,
            system_reliability_before: system_before,
            system_reliability_after: system_after,
            improvement_ratio: improvement_ratio(system_before, system_after),
        })
    }

    fn sample(&self, t: f64) -> TickSample {
        let loads = self.topology.loads().clone();
        let system_reliability = self
            .topology
            .reliabilities_at(t, &loads)
            .and_then(|rel| self.tree.system_reliability(&rel))
            .ok();
        TickSample {
            time: t,
            threshold: self.scheme.threshold(),
            loads,
            system_reliability,
        }
    }

    fn collect_results(&self) -> SimulationResult {
        let mean = mean_improvement_ratio(&self.records);
        info!(
            scheme = self.scheme.id().number(),
            rounds = self.records.len(),
            mean_ir = mean,
            halted = self.halted.is_some(),
            "scheme run finished"
        );

        SimulationResult {
            scheme: self.scheme.id(),
            policy_name: self.scheme.id().name().to_string(),
            records: self.records.clone(),
            mean_improvement_ratio: mean,
            timeline: self.timeline.clone(),
            final_loads: self.topology.loads().clone(),
            final_threshold: self.scheme.threshold(),
            halted: self.halted.clone(),
        }
    }
}

/// Run each scheme independently against its own copy of `topology`
pub fn run_all(
    config: &SimulationConfig,
    topology: &Topology,
    schemes: &[SchemeId],
) -> Result<Vec<SimulationResult>> {
    schemes
        .iter()
        .map(|&id| Simulator::new(config.clone(), topology, id).map(|mut sim| sim.run()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use san_core::EventLog;

    const EPS: f64 = 1e-12;

    fn run(scheme: SchemeId, config: SimulationConfig) -> SimulationResult {
        Simulator::new(config, &Topology::san_default(), scheme)
            .unwrap()
            .run()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < EPS
    }

    #[test]
    fn test_static_reliability_scheme_regression() {
        let result = run(SchemeId::StaticReliability, SimulationConfig::default());

        assert_eq!(result.rounds(), 3);
        assert!(result.halted.is_none());
        // 0.05 accumulated 1000 times falls just short of 50
        assert!(result.records.iter().all(|r| r.time == 1001.0));
        assert!(result.records.iter().all(|r| r.threshold == 50.0));

        let first = &result.records[0];
        assert_eq!(first.sources, vec!["Sw2", "Sw1", "Sw3"]);
        assert!((first.loads_before["Sw2"] - 50.05).abs() < 1e-9);
        assert_eq!(first.loads_after["Sw2"], 50.0);
        assert!(close(first.loads_after["Sw1"], 6.428571428571428));
        assert!(close(first.loads_after["Sw3"], 2.142857142857143));
        assert!((first.loads_after["Sw4"] - 9.596428571428218).abs() < 1e-9);
        assert!((first.loads_after["Sw5"] - 10.882142857142505).abs() < 1e-9);
        assert!(close(first.system_reliability_before, 0.9991371250120955));
        assert!(close(first.system_reliability_after, 0.999432279531343));
        assert!((first.improvement_ratio.unwrap() - 2.954094206477108e-4).abs() < 1e-10);

        assert_eq!(result.records[1].sources, vec!["Sw2", "Sw3", "Sw5"]);
        assert!((result.records[1].improvement_ratio.unwrap() - 5.580527720288939e-05).abs() < 1e-10);
        assert!((result.records[2].improvement_ratio.unwrap() - 1.2187956531740723e-4).abs() < 1e-10);
        assert!((result.mean_improvement_ratio - 1.5769808772266914e-4).abs() < 1e-10);

        // Load is only moved, never created
        let total: f64 = result.final_loads.values().sum();
        assert!((total - 79.05).abs() < 1e-9);
        // Ticks 0..=1001
        assert_eq!(result.timeline.len(), 1002);
    }

    #[test]
    fn test_static_load_scheme_first_round() {
        let result = run(SchemeId::StaticLoad, SimulationConfig::default());

        assert_eq!(result.records[0].sources, vec!["Sw2", "Sw1", "Sw5"]);
        assert!((result.records[0].improvement_ratio.unwrap() - 3.58357361070115e-4).abs() < 1e-10);
        assert!((result.mean_improvement_ratio - 1.5810130320857916e-4).abs() < 1e-10);
    }

    #[test]
    fn test_dynamic_scheme_decays_threshold_between_rounds() {
        let result = run(SchemeId::DynamicReliability, SimulationConfig::default());

        let times: Vec<f64> = result.records.iter().map(|r| r.time).collect();
        let thresholds: Vec<f64> = result.records.iter().map(|r| r.threshold).collect();
        assert_eq!(times, vec![1001.0, 1002.0, 1003.0]);
        assert_eq!(thresholds, vec![50.0, 45.0, 40.0]);
        assert_eq!(result.final_threshold, 35.0);

        // Round 1 sources do not feed Sw2, so it keeps exactly the threshold
        assert_eq!(result.records[0].loads_after["Sw2"], 50.0);
        // Sw5 sheds into Sw2 in round 2
        assert!((result.records[1].loads_after["Sw2"] - 48.95714285714273).abs() < 1e-9);
        // One more tick of growth before round 3
        assert!((result.records[2].loads_before["Sw2"] - 49.007142857142725).abs() < 1e-9);

        let irs: Vec<f64> = result.records.iter().filter_map(|r| r.improvement_ratio).collect();
        assert!((irs[0] - 2.954094206477108e-4).abs() < 1e-10);
        assert!((irs[1] - -1.5211409586734918e-4).abs() < 1e-10);
        assert!((irs[2] - 1.9129582478255483e-4).abs() < 1e-10);
        assert!((result.mean_improvement_ratio - 1.1153038318763882e-4).abs() < 1e-10);

        let total: f64 = result.final_loads.values().sum();
        assert!((total - 79.15).abs() < 1e-9);
    }

    #[test]
    fn test_dynamic_load_scheme_mean() {
        let result = run(SchemeId::DynamicLoad, SimulationConfig::default());
        assert_eq!(result.rounds(), 3);
        assert!((result.mean_improvement_ratio - 1.120977618287221e-4).abs() < 1e-10);
    }

    #[test]
    fn test_ranked_selection() {
        let config = SimulationConfig {
            selection: SelectionMode::Ranked,
            ..SimulationConfig::default()
        };
        let result = run(SchemeId::StaticReliability, config);

        // Sw3 has by far the highest base rate, so it ranks least reliable
        assert_eq!(result.records[0].sources, vec!["Sw2", "Sw3", "Sw1", "Sw5"]);
        assert!((result.records[0].improvement_ratio.unwrap() - 2.4066033382335117e-4).abs() < 1e-10);
    }

    #[test]
    fn test_mean_skips_undefined_ratios() {
        let template = run(SchemeId::StaticLoad, SimulationConfig::default()).records[0].clone();
        let with_ratio = |ir: Option<f64>| RedistributionRecord {
            improvement_ratio: ir,
            ..template.clone()
        };

        let records = vec![with_ratio(Some(0.2)), with_ratio(None), with_ratio(Some(0.4))];
        assert!((mean_improvement_ratio(&records) - 0.3).abs() < EPS);

        assert_eq!(mean_improvement_ratio(&[with_ratio(None)]), 0.0);
        assert_eq!(mean_improvement_ratio(&[]), 0.0);
    }

    #[test]
    fn test_bottleneck_can_be_left_out_of_sources() {
        let config = SimulationConfig {
            include_bottleneck: false,
            ..SimulationConfig::default()
        };
        let result = run(SchemeId::StaticReliability, config);

        let first = &result.records[0];
        assert_eq!(first.sources, vec!["Sw1", "Sw3"]);
        // Neither Sw1 nor Sw3 feeds Sw2, and Sw2 sheds nothing itself
        assert_eq!(first.loads_after["Sw2"], first.loads_before["Sw2"]);
        assert!(first.loads_after["Sw2"] > first.threshold);
        assert!(result.records.iter().all(|r| !r.sources.contains(&"Sw2".to_string())));
    }

    #[test]
    fn test_starting_from_initial_loads_triggers_immediately() {
        let config = SimulationConfig {
            bottleneck_initial_load: None,
            ..SimulationConfig::default()
        };
        let result = run(SchemeId::StaticReliability, config);

        // Sw2 starts at its L0 of 50, already at the threshold
        assert_eq!(result.first_trigger_time(), Some(0.0));
        assert_eq!(result.records[0].loads_before["Sw2"], 50.0);
        // Every component is perfectly reliable at t = 0
        assert!(result.records.iter().all(|r| r.improvement_ratio == Some(0.0)));
        assert_eq!(result.timeline.len(), 1);
    }

    #[test]
    fn test_no_trigger_before_threshold() {
        let config = SimulationConfig {
            mission_time: 500.0,
            ..SimulationConfig::default()
        };
        let result = run(SchemeId::DynamicLoad, config);

        assert!(result.records.is_empty());
        assert_eq!(result.mean_improvement_ratio, 0.0);
        assert_eq!(result.first_trigger_time(), None);
        assert_eq!(result.timeline.len(), 501);
        assert_eq!(result.final_threshold, 50.0);
    }

    #[test]
    fn test_timeline_samples() {
        let result = run(SchemeId::StaticReliability, SimulationConfig::default());

        let first = &result.timeline[0];
        assert_eq!(first.time, 0.0);
        assert_eq!(first.loads["Sw2"], 0.0);
        assert_eq!(first.loads["Sw1"], 15.0);
        assert_eq!(first.system_reliability, Some(1.0));

        let last = result.timeline.last().unwrap();
        assert_eq!(last.time, 1001.0);
        assert_eq!(&last.loads, &result.final_loads);
        assert!(last.system_reliability.unwrap() < 1.0);
    }

    #[test]
    fn test_observer_sees_every_tick_and_round() {
        struct Counter {
            ticks: usize,
            log: EventLog,
        }

        impl SimulationObserver for Counter {
            fn on_tick(&mut self, _sample: &TickSample) {
                self.ticks += 1;
            }

            fn on_redistribution(&mut self, record: &RedistributionRecord) {
                self.log.on_redistribution(record);
            }
        }

        let mut observer = Counter {
            ticks: 0,
            log: EventLog::default(),
        };
        let mut sim =
            Simulator::new(SimulationConfig::default(), &Topology::san_default(), SchemeId::DynamicLoad)
                .unwrap();
        let result = sim.run_with(&mut observer);

        assert_eq!(observer.ticks, result.timeline.len());
        assert_eq!(observer.log.entries.len(), 3);
        assert_eq!(observer.log.entries[1].0, 1002.0);
    }

    #[test]
    fn test_runs_are_repeatable() {
        let mut sim = Simulator::new(
            SimulationConfig::default(),
            &Topology::san_default(),
            SchemeId::DynamicReliability,
        )
        .unwrap();

        let first = sim.run();
        let second = sim.run();
        assert_eq!(first.records, second.records);
        assert_eq!(first.timeline.len(), second.timeline.len());
    }

    #[test]
    fn test_run_does_not_touch_source_topology() {
        let topology = Topology::san_default();
        let _ = Simulator::new(SimulationConfig::default(), &topology, SchemeId::StaticLoad)
            .unwrap()
            .run();
        assert_eq!(topology.loads(), topology.initial_loads());
        assert_eq!(topology.loads()["Sw2"], 50.0);
    }

    #[test]
    fn test_missing_fault_tree_component_halts_run() {
        let tree = FaultTree::new(
            vec!["Sw2".to_string(), "Ghost".to_string()],
            crate::reliability::FaultExpr::and([
                crate::reliability::FaultExpr::down("Sw2"),
                crate::reliability::FaultExpr::down("Ghost"),
            ]),
        )
        .unwrap();
        let mut sim = Simulator::new(
            SimulationConfig::default(),
            &Topology::san_default(),
            SchemeId::StaticReliability,
        )
        .unwrap()
        .with_fault_tree(tree);

        let result = sim.run();
        assert!(result.records.is_empty());
        assert!(result.halted.as_deref().unwrap().contains("Ghost"));
        // The failed round left the loads as they were
        assert!((result.final_loads["Sw2"] - 50.05).abs() < 1e-9);
        assert_eq!(result.final_loads["Sw1"], 15.0);
        assert_eq!(result.timeline.last().unwrap().system_reliability, None);
    }

    #[test]
    fn test_invalid_configs_rejected() {
        let topology = Topology::san_default();
        let cases = [
            SimulationConfig {
                time_step: 0.0,
                ..SimulationConfig::default()
            },
            SimulationConfig {
                mission_time: -1.0,
                ..SimulationConfig::default()
            },
            SimulationConfig {
                bottleneck: "Sr1".to_string(),
                ..SimulationConfig::default()
            },
            SimulationConfig {
                threshold_floor: 60.0,
                ..SimulationConfig::default()
            },
        ];
        for config in cases {
            assert!(Simulator::new(config, &topology, SchemeId::StaticLoad).is_err());
        }

        let missing = SimulationConfig {
            bottleneck: "Sw9".to_string(),
            ..SimulationConfig::default()
        };
        assert_eq!(
            Simulator::new(missing, &topology, SchemeId::StaticLoad).err(),
            Some(SanError::MissingComponent("Sw9".to_string()))
        );
    }

    #[test]
    fn test_run_all_is_independent_per_scheme() {
        let results =
            run_all(&SimulationConfig::default(), &Topology::san_default(), &SchemeId::ALL).unwrap();
        assert_eq!(results.len(), 4);
        assert_eq!(results[0].scheme, SchemeId::StaticReliability);
        assert_eq!(results[0].records, run(SchemeId::StaticReliability, SimulationConfig::default()).records);
        assert!(results.iter().all(|r| r.rounds() == 3));
    }

    #[test]
    fn test_selection_mode_parsing() {
        assert_eq!("table".parse::<SelectionMode>(), Ok(SelectionMode::Table));
        assert_eq!("Ranked".parse::<SelectionMode>(), Ok(SelectionMode::Ranked));
        assert!("best".parse::<SelectionMode>().is_err());
    }
}
