//! Degree-weighted proportional load redistribution
//!
//! Each source `k` sheds an amount of load across its closure `N_k`, weighted by
//! switch-to-switch degree:
//!
//! ```text
//! Π_j   = deg(j)^β / Σ_{m ∈ N_k} deg(m)^β
//! ΔL_jk = amount_k · Π_j
//! ```
//!
//! All sources of one call are applied simultaneously: every transfer is planned
//! against the same input snapshot, per-receiver contributions are summed, and the
//! result is written in a single pass. Sources and closure members are visited in
//! sorted id order, so the output is identical whatever order the caller lists them in.

use std::collections::{BTreeMap, BTreeSet};

use san_core::{LoadSnapshot, NodeId};
use serde::{Deserialize, Serialize};

/// How much a source sheds
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RedistributionMode<'a> {
    /// Every source sheds its entire load over `{k} ∪ neighbors(k)`
    Full,
    /// `node` sheds only its load above `threshold`, over its neighbors, keeping
    /// exactly `threshold`. Other sources behave as in `Full`.
    ExcessOnly { node: &'a str, threshold: f64 },
}

/// Planned movement of one source's load
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceTransfer {
    pub source: NodeId,
    /// Load taken off the source
    pub amount: f64,
    /// Load the source keeps before receiving any shares
    pub retained: f64,
    /// Receiver -> proportion Π_j (sums to 1)
    pub shares: Vec<(NodeId, f64)>,
}

/// Degree-weighted proportions over a closure.
///
/// Unknown ids count as degree zero. When every weight is zero the amount is split
/// evenly.
pub fn proportions(
    closure: &BTreeSet<&str>,
    degrees: &BTreeMap<NodeId, u32>,
    beta: f64,
) -> Vec<(NodeId, f64)> {
    if closure.is_empty() {
        return Vec::new();
    }

    let weights: Vec<(&str, f64)> = closure
        .iter()
        .map(|&id| {
            let degree = degrees.get(id).copied().unwrap_or(0) as f64;
            (id, degree.powf(beta))
        })
        .collect();
    let denom: f64 = weights.iter().map(|(_, w)| w).sum();

    if !denom.is_finite() || denom <= 0.0 {
        let even = 1.0 / closure.len() as f64;
        return weights.into_iter().map(|(id, _)| (id.to_string(), even)).collect();
    }

    weights
        .into_iter()
        .map(|(id, w)| (id.to_string(), w / denom))
        .collect()
}

/// Plan every source's transfer against the frozen `loads` snapshot.
///
/// Sources missing from the snapshot, with no load, with nothing to shed, or with
/// an empty closure produce no transfer.
pub fn plan_transfers(
    loads: &LoadSnapshot,
    degrees: &BTreeMap<NodeId, u32>,
    sources: &[NodeId],
    closures: &BTreeMap<NodeId, Vec<NodeId>>,
    beta: f64,
    mode: RedistributionMode<'_>,
) -> Vec<SourceTransfer> {
    let unique: BTreeSet<&str> = sources.iter().map(String::as_str).collect();
    let mut transfers = Vec::with_capacity(unique.len());

    for k in unique {
        let Some(&load) = loads.get(k) else {
            continue;
        };
        if load <= 0.0 {
            continue;
        }

        let neighbors = closures
            .get(k)
            .into_iter()
            .flatten()
            .map(String::as_str)
            .filter(|&n| n != k);

        let (amount, retained, closure): (f64, f64, BTreeSet<&str>) = match mode {
            RedistributionMode::ExcessOnly { node, threshold } if node == k => {
                let excess = (load - threshold).max(0.0);
                (excess, load.min(threshold), neighbors.collect())
            }
            _ => (load, 0.0, std::iter::once(k).chain(neighbors).collect()),
        };

        if amount <= 0.0 || closure.is_empty() {
            continue;
        }

        transfers.push(SourceTransfer {
            source: k.to_string(),
            amount,
            retained,
            shares: proportions(&closure, degrees, beta),
        });
    }

    transfers
}

/// Apply planned transfers to a snapshot, returning the new snapshot
pub fn apply_transfers(loads: &LoadSnapshot, transfers: &[SourceTransfer]) -> LoadSnapshot {
    let mut received: BTreeMap<&str, f64> = BTreeMap::new();
    for transfer in transfers {
        for (receiver, share) in &transfer.shares {
            *received.entry(receiver.as_str()).or_insert(0.0) += transfer.amount * share;
        }
    }

    let mut next = loads.clone();
    for transfer in transfers {
        next.insert(transfer.source.clone(), transfer.retained);
    }
    for (receiver, delta) in received {
        *next.entry(receiver.to_string()).or_insert(0.0) += delta;
    }
    next
}

/// Redistribute `sources` simultaneously and return the new snapshot.
///
/// Never mutates `loads`. An empty source list returns an identical copy.
pub fn redistribute(
    loads: &LoadSnapshot,
    degrees: &BTreeMap<NodeId, u32>,
    sources: &[NodeId],
    closures: &BTreeMap<NodeId, Vec<NodeId>>,
    beta: f64,
    mode: RedistributionMode<'_>,
) -> LoadSnapshot {
    let transfers = plan_transfers(loads, degrees, sources, closures, beta, mode);
    apply_transfers(loads, &transfers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    const EPS: f64 = 1e-9;

    fn snapshot(pairs: &[(&str, f64)]) -> LoadSnapshot {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn degree_map(pairs: &[(&str, u32)]) -> BTreeMap<NodeId, u32> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn closure_map(pairs: &[(&str, &[&str])]) -> BTreeMap<NodeId, Vec<NodeId>> {
        pairs
            .iter()
            .map(|(k, ns)| (k.to_string(), ns.iter().map(|s| s.to_string()).collect()))
            .collect()
    }

    fn ids(list: &[&str]) -> Vec<NodeId> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn total(loads: &LoadSnapshot) -> f64 {
        loads.values().sum()
    }

    fn line_of_three() -> (LoadSnapshot, BTreeMap<NodeId, u32>, BTreeMap<NodeId, Vec<NodeId>>) {
        (
            snapshot(&[("Sw1", 10.0), ("Sw2", 60.0), ("Sw3", 5.0)]),
            degree_map(&[("Sw1", 3), ("Sw2", 4), ("Sw3", 3)]),
            closure_map(&[
                ("Sw1", &["Sw2"][..]),
                ("Sw2", &["Sw1", "Sw3"][..]),
                ("Sw3", &["Sw2"][..]),
            ]),
        )
    }

    #[test]
    fn test_full_mode_single_source() {
        let (loads, degrees, closures) = line_of_three();

        let next = redistribute(
            &loads,
            &degrees,
            &ids(&["Sw2"]),
            &closures,
            1.0,
            RedistributionMode::Full,
        );

        assert!((next["Sw1"] - 28.0).abs() < EPS);
        assert!((next["Sw2"] - 24.0).abs() < EPS);
        assert!((next["Sw3"] - 23.0).abs() < EPS);
        assert!((total(&next) - 75.0).abs() < EPS);

        // Input untouched
        assert_eq!(loads["Sw2"], 60.0);
    }

    #[test]
    fn test_proportions_follow_degree() {
        let degrees = degree_map(&[("Sw1", 3), ("Sw2", 4), ("Sw3", 3)]);
        let closure: BTreeSet<&str> = ["Sw1", "Sw2", "Sw3"].into_iter().collect();

        let shares = proportions(&closure, &degrees, 1.0);
        let sum: f64 = shares.iter().map(|(_, p)| p).sum();
        assert!((sum - 1.0).abs() < 1e-12);

        let by_id: BTreeMap<_, _> = shares.into_iter().collect();
        assert!((by_id["Sw1"] - 0.3).abs() < 1e-12);
        assert!((by_id["Sw2"] - 0.4).abs() < 1e-12);
        assert!((by_id["Sw3"] - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_beta_sharpens_weights() {
        let degrees = degree_map(&[("A", 1), ("B", 2)]);
        let closure: BTreeSet<&str> = ["A", "B"].into_iter().collect();

        let shares: BTreeMap<_, _> = proportions(&closure, &degrees, 2.0).into_iter().collect();
        assert!((shares["A"] - 0.2).abs() < 1e-12);
        assert!((shares["B"] - 0.8).abs() < 1e-12);

        let flat: BTreeMap<_, _> = proportions(&closure, &degrees, 0.0).into_iter().collect();
        assert!((flat["A"] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_zero_degrees_split_evenly() {
        let loads = snapshot(&[("A", 9.0), ("B", 0.0), ("C", 0.0)]);
        let closures = closure_map(&[("A", &["B", "C"][..])]);

        let next = redistribute(
            &loads,
            &BTreeMap::new(),
            &ids(&["A"]),
            &closures,
            1.0,
            RedistributionMode::Full,
        );

        for id in ["A", "B", "C"] {
            assert!((next[id] - 3.0).abs() < EPS, "{id} = {}", next[id]);
        }
    }

    #[test]
    fn test_empty_sources_and_unknown_sources_are_noops() {
        let (loads, degrees, closures) = line_of_three();

        let unchanged = redistribute(&loads, &degrees, &[], &closures, 1.0, RedistributionMode::Full);
        assert_eq!(unchanged, loads);

        let unknown = redistribute(
            &loads,
            &degrees,
            &ids(&["Sw42"]),
            &closures,
            1.0,
            RedistributionMode::Full,
        );
        assert_eq!(unknown, loads);
    }

    #[test]
    fn test_source_without_closure_entry_keeps_its_load() {
        let loads = snapshot(&[("A", 7.0), ("B", 1.0)]);
        let degrees = degree_map(&[("A", 1), ("B", 1)]);

        // Closure degenerates to {A}: shed and received back in full
        let next = redistribute(
            &loads,
            &degrees,
            &ids(&["A"]),
            &BTreeMap::new(),
            1.0,
            RedistributionMode::Full,
        );
        assert!((next["A"] - 7.0).abs() < EPS);
        assert_eq!(next["B"], 1.0);
    }

    #[test]
    fn test_excess_only_keeps_threshold() {
        let (loads, degrees, closures) = line_of_three();

        let next = redistribute(
            &loads,
            &degrees,
            &ids(&["Sw2"]),
            &closures,
            1.0,
            RedistributionMode::ExcessOnly {
                node: "Sw2",
                threshold: 50.0,
            },
        );

        assert_eq!(next["Sw2"], 50.0);
        // Excess of 10 split 3:3 between the two neighbors
        assert!((next["Sw1"] - 15.0).abs() < EPS);
        assert!((next["Sw3"] - 10.0).abs() < EPS);
        assert!((total(&next) - total(&loads)).abs() < EPS);
    }

    #[test]
    fn test_excess_only_without_neighbors_keeps_load() {
        let loads = snapshot(&[("A", 60.0)]);

        let next = redistribute(
            &loads,
            &BTreeMap::new(),
            &ids(&["A"]),
            &BTreeMap::new(),
            1.0,
            RedistributionMode::ExcessOnly {
                node: "A",
                threshold: 50.0,
            },
        );

        // Nowhere to shed the excess
        assert_eq!(next["A"], 60.0);
        assert_eq!(next, loads);
    }

    #[test]
    fn test_excess_only_below_threshold_is_noop() {
        let (loads, degrees, closures) = line_of_three();

        let next = redistribute(
            &loads,
            &degrees,
            &ids(&["Sw2"]),
            &closures,
            1.0,
            RedistributionMode::ExcessOnly {
                node: "Sw2",
                threshold: 80.0,
            },
        );
        assert_eq!(next, loads);
    }

    #[test]
    fn test_excess_only_other_sources_use_full_mode() {
        let (loads, degrees, closures) = line_of_three();

        let transfers = plan_transfers(
            &loads,
            &degrees,
            &ids(&["Sw2", "Sw1"]),
            &closures,
            1.0,
            RedistributionMode::ExcessOnly {
                node: "Sw2",
                threshold: 50.0,
            },
        );

        assert_eq!(transfers.len(), 2);
        let sw1 = transfers.iter().find(|t| t.source == "Sw1").unwrap();
        assert_eq!(sw1.amount, 10.0);
        assert_eq!(sw1.retained, 0.0);
        assert_eq!(sw1.shares.len(), 2);

        let sw2 = transfers.iter().find(|t| t.source == "Sw2").unwrap();
        assert_eq!(sw2.amount, 10.0);
        assert_eq!(sw2.retained, 50.0);
        assert!(sw2.shares.iter().all(|(id, _)| id != "Sw2"));
    }

    #[test]
    fn test_overlapping_sources_are_simultaneous() {
        let (loads, degrees, closures) = line_of_three();

        let forward = redistribute(
            &loads,
            &degrees,
            &ids(&["Sw1", "Sw2"]),
            &closures,
            1.0,
            RedistributionMode::Full,
        );
        let backward = redistribute(
            &loads,
            &degrees,
            &ids(&["Sw2", "Sw1"]),
            &closures,
            1.0,
            RedistributionMode::Full,
        );
        assert_eq!(forward, backward);

        // Both amounts come from the frozen snapshot:
        // Sw1 sheds 10 over {Sw1:3, Sw2:4}; Sw2 sheds 60 over {Sw1:3, Sw2:4, Sw3:3}
        let expected_sw1 = 10.0 * 3.0 / 7.0 + 60.0 * 0.3;
        let expected_sw2 = 10.0 * 4.0 / 7.0 + 60.0 * 0.4;
        assert!((forward["Sw1"] - expected_sw1).abs() < EPS);
        assert!((forward["Sw2"] - expected_sw2).abs() < EPS);
        assert!((forward["Sw3"] - 23.0).abs() < EPS);
    }

    #[test]
    fn test_duplicate_sources_counted_once() {
        let (loads, degrees, closures) = line_of_three();

        let once = redistribute(&loads, &degrees, &ids(&["Sw2"]), &closures, 1.0, RedistributionMode::Full);
        let twice = redistribute(
            &loads,
            &degrees,
            &ids(&["Sw2", "Sw2"]),
            &closures,
            1.0,
            RedistributionMode::Full,
        );
        assert_eq!(once, twice);
    }

    #[test]
    fn test_random_snapshots_conserve_load_in_any_order() {
        let mut rng = StdRng::seed_from_u64(0x5a17);
        let switches = ["Sw1", "Sw2", "Sw3", "Sw4", "Sw5"];
        let degrees = degree_map(&[("Sw1", 3), ("Sw2", 4), ("Sw3", 3), ("Sw4", 4), ("Sw5", 4)]);
        let closures = closure_map(&[
            ("Sw1", &["Sw4"][..]),
            ("Sw2", &["Sw4", "Sw5"][..]),
            ("Sw3", &["Sw5"][..]),
            ("Sw4", &["Sw1", "Sw2"][..]),
            ("Sw5", &["Sw2", "Sw3"][..]),
        ]);

        for _ in 0..200 {
            let loads: LoadSnapshot = switches
                .iter()
                .map(|s| (s.to_string(), rng.gen_range(0.0..100.0)))
                .collect();
            let mut sources: Vec<NodeId> = switches
                .iter()
                .filter(|_| rng.gen_bool(0.5))
                .map(|s| s.to_string())
                .collect();
            let beta = rng.gen_range(0.0..3.0);
            let threshold = rng.gen_range(0.0..100.0);

            for mode in [
                RedistributionMode::Full,
                RedistributionMode::ExcessOnly {
                    node: "Sw2",
                    threshold,
                },
            ] {
                let next = redistribute(&loads, &degrees, &sources, &closures, beta, mode);
                assert!((total(&next) - total(&loads)).abs() < 1e-9);
                assert!(next.values().all(|&l| l >= 0.0));

                sources.shuffle(&mut rng);
                let reordered = redistribute(&loads, &degrees, &sources, &closures, beta, mode);
                assert_eq!(next, reordered);
            }
        }
    }
}
