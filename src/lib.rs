//! Discrete-event simulator for a LoRa mesh network's routing layer.
//!
//! A single-threaded, seeded-deterministic kernel (`simulation`, `time`)
//! drives a LoRa physical-layer model (`packet`, `channel`, `collision`,
//! `energy`) and one of five routing protocol variants (`protocol::dsdv`,
//! `protocol::query`) selected per run by `config::ExperimentTag`. Build a
//! `config::SimulationConfig` and a node layout, hand both to
//! `simulation::Simulation::new`, and call `run_until` to advance virtual
//! time; `report` turns the resulting per-node counters into a summary.

pub mod channel;
pub mod collision;
pub mod config;
pub mod energy;
pub mod error;
pub mod generator;
pub mod node;
pub mod packet;
pub mod protocol;
pub mod report;
pub mod rng;
pub mod routing;
pub mod simulation;
pub mod time;
pub mod transceiver;

pub use config::{ExperimentTag, NodeSpec, SimulationConfig};
pub use error::SimError;
pub use simulation::Simulation;
