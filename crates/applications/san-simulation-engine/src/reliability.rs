//! Exact system reliability from a fault tree
//!
//! The top event is a boolean combination of "component down" basic events. With
//! independent components, P(top) is computed exactly by enumerating all 2^n joint
//! up/down states and summing the probabilities of the states in which the top
//! event holds. That stays cheap for the SAN's nine components; the enumeration
//! refuses trees above [`MAX_EXACT_COMPONENTS`] basic events.
//!
//! The SAN tree:
//!
//! ```text
//! SAN failure = ServerFailure OR StorageFailure OR PathFailure
//!
//! ServerFailure  = (Sr1 OR (Sw5 AND Sw4)) AND (Sr2 OR (Sw3 AND Sw5))
//! StorageFailure = (Sa1 OR (Sw5 AND Sw2)) AND (Sa2 OR (Sw3 AND Sw2))
//! PathFailure    = (Sw1 AND Sw2 AND Sw3) AND (Sw3 AND Sw4 AND Sw5)
//! ```

use san_core::{NodeId, ReliabilityMap, Result, SanError};
use serde::{Deserialize, Serialize};

/// Largest number of basic events evaluated by full enumeration
pub const MAX_EXACT_COMPONENTS: usize = 16;

/// Boolean expression over "component is down" events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FaultExpr {
    Down(NodeId),
    And(Vec<FaultExpr>),
    Or(Vec<FaultExpr>),
}

impl FaultExpr {
    pub fn down(id: impl Into<NodeId>) -> Self {
        FaultExpr::Down(id.into())
    }

    pub fn and(children: impl IntoIterator<Item = FaultExpr>) -> Self {
        FaultExpr::And(children.into_iter().collect())
    }

    pub fn or(children: impl IntoIterator<Item = FaultExpr>) -> Self {
        FaultExpr::Or(children.into_iter().collect())
    }

    fn compile(&self, components: &[NodeId]) -> Result<Gate> {
        Ok(match self {
            FaultExpr::Down(id) => {
                let idx = components.iter().position(|c| c == id).ok_or_else(|| {
                    SanError::invalid_input(format!("fault tree references undeclared component {id}"))
                })?;
                Gate::Basic(idx)
            }
            FaultExpr::And(children) => Gate::And(
                children
                    .iter()
                    .map(|c| c.compile(components))
                    .collect::<Result<_>>()?,
            ),
            FaultExpr::Or(children) => Gate::Or(
                children
                    .iter()
                    .map(|c| c.compile(components))
                    .collect::<Result<_>>()?,
            ),
        })
    }
}

/// Expression compiled against component indices; bit `i` of a mask set means
/// component `i` is down
#[derive(Debug, Clone)]
enum Gate {
    Basic(usize),
    And(Vec<Gate>),
    Or(Vec<Gate>),
}

impl Gate {
    fn holds(&self, down_mask: u32) -> bool {
        match self {
            Gate::Basic(i) => down_mask & (1 << *i) != 0,
            Gate::And(children) => children.iter().all(|c| c.holds(down_mask)),
            Gate::Or(children) => children.iter().any(|c| c.holds(down_mask)),
        }
    }
}

/// Fault tree with a fixed, ordered set of basic components
#[derive(Debug, Clone)]
pub struct FaultTree {
    components: Vec<NodeId>,
    top: FaultExpr,
    gate: Gate,
}

impl FaultTree {
    pub fn new(components: Vec<NodeId>, top: FaultExpr) -> Result<Self> {
        if components.len() > MAX_EXACT_COMPONENTS {
            return Err(SanError::TooManyComponents {
                count: components.len(),
                max: MAX_EXACT_COMPONENTS,
            });
        }
        for (i, id) in components.iter().enumerate() {
            if components[..i].contains(id) {
                return Err(SanError::invalid_input(format!(
                    "component {id} declared twice"
                )));
            }
        }

        let gate = top.compile(&components)?;
        Ok(FaultTree {
            components,
            top,
            gate,
        })
    }

    /// The reference SAN tree over Sw1..Sw5, Sr1, Sr2, Sa1, Sa2
    pub fn san() -> Self {
        use FaultExpr as E;

        let components = ["Sw1", "Sw2", "Sw3", "Sw4", "Sw5", "Sr1", "Sr2", "Sa1", "Sa2"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let both = |a: &str, b: &str| E::and([E::down(a), E::down(b)]);
        let server = E::and([
            E::or([E::down("Sr1"), both("Sw5", "Sw4")]),
            E::or([E::down("Sr2"), both("Sw3", "Sw5")]),
        ]);
        let storage = E::and([
            E::or([E::down("Sa1"), both("Sw5", "Sw2")]),
            E::or([E::down("Sa2"), both("Sw3", "Sw2")]),
        ]);
        let path = E::and([
            E::and([E::down("Sw1"), E::down("Sw2"), E::down("Sw3")]),
            E::and([E::down("Sw3"), E::down("Sw4"), E::down("Sw5")]),
        ]);

        match FaultTree::new(components, E::or([server, storage, path])) {
            Ok(tree) => tree,
            Err(e) => unreachable!("built-in SAN fault tree is invalid: {e}"),
        }
    }

    pub fn components(&self) -> &[NodeId] {
        &self.components
    }

    pub fn top(&self) -> &FaultExpr {
        &self.top
    }

    /// Whether the top event holds when exactly the listed components are down
    pub fn fails_with(&self, down: &[&str]) -> bool {
        let mask = self
            .components
            .iter()
            .enumerate()
            .filter(|(_, c)| down.contains(&c.as_str()))
            .fold(0u32, |m, (i, _)| m | (1 << i));
        self.gate.holds(mask)
    }

    /// Exact probability of the top event
    pub fn failure_probability(&self, reliabilities: &ReliabilityMap) -> Result<f64> {
        let up: Vec<f64> = self
            .components
            .iter()
            .map(|id| {
                let r = *reliabilities
                    .get(id)
                    .ok_or_else(|| SanError::MissingComponent(id.clone()))?;
                if !(0.0..=1.0).contains(&r) {
                    return Err(SanError::invalid_input(format!(
                        "reliability of {id} must lie in [0, 1], got {r}"
                    )));
                }
                Ok(r)
            })
            .collect::<Result<_>>()?;

        let mut p_failure = 0.0;
        for mask in 0..(1u32 << up.len()) {
            let mut p = 1.0;
            for (i, r) in up.iter().enumerate() {
                p *= if mask & (1 << i) != 0 { 1.0 - r } else { *r };
            }
            if p == 0.0 {
                continue;
            }
            if self.gate.holds(mask) {
                p_failure += p;
            }
        }

        Ok(p_failure)
    }

    /// R_sys = 1 - P(top), clamped to [0, 1]
    pub fn system_reliability(&self, reliabilities: &ReliabilityMap) -> Result<f64> {
        Ok((1.0 - self.failure_probability(reliabilities)?).clamp(0.0, 1.0))
    }
}

/// System reliability of the reference SAN
pub fn san_system_reliability(reliabilities: &ReliabilityMap) -> Result<f64> {
    FaultTree::san().system_reliability(reliabilities)
}
