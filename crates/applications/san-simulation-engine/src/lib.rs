//! SAN Simulation Engine
//!
//! Load-dependent reliability simulation of a storage area network. A bottleneck
//! switch accumulates load until it crosses a threshold; the active mitigation
//! scheme then redistributes load across the switch mesh and the driver records how
//! much the system reliability improved.

pub mod aftm;
pub mod config;
pub mod error;
pub mod export;
pub mod redistribution;
pub mod reliability;
pub mod schemes;
pub mod simulator;
pub mod topology;

pub use error::{EngineError, Result};
pub use reliability::FaultTree;
pub use schemes::MitigationScheme;
pub use simulator::{SimulationConfig, SimulationResult, Simulator};
pub use topology::Topology;
