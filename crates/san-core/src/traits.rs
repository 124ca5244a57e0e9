//! Traits for read-only simulation collaborators

use crate::types::{RedistributionRecord, TickSample};

/// Observer of a running simulation.
///
/// Chart and editor front-ends implement this to receive the per-tick load series
/// and the redistribution event log. Observers only ever see shared references to
/// snapshots taken after a tick completes, so they cannot influence the run.
pub trait SimulationObserver {
    /// Called once per tick, after any redistribution at that tick has been applied
    fn on_tick(&mut self, sample: &TickSample);

    /// Called once per successfully applied redistribution round
    fn on_redistribution(&mut self, record: &RedistributionRecord);
}

/// Observer that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SimulationObserver for NoopObserver {
    fn on_tick(&mut self, _sample: &TickSample) {}

    fn on_redistribution(&mut self, _record: &RedistributionRecord) {}
}

/// Observer that keeps a textual event log, one line per redistribution
#[derive(Debug, Default, Clone)]
pub struct EventLog {
    pub entries: Vec<(f64, String)>,
}

impl SimulationObserver for EventLog {
    fn on_tick(&mut self, _sample: &TickSample) {}

    fn on_redistribution(&mut self, record: &RedistributionRecord) {
        self.entries.push((
            record.time,
            format!(
                "round {} at t={} (threshold {:.2}): sources [{}], R {:.9} -> {:.9}",
                record.round,
                record.time,
                record.threshold,
                record.sources.join(", "),
                record.system_reliability_before,
                record.system_reliability_after,
            ),
        ));
    }
}
