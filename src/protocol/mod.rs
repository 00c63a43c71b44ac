//! Protocol variants: a shared p-CSMA proactive handler plus two reactive
//! strategies (DSDV distance-vector, query-based tree), selected by
//! `ExperimentTag`.
//!
//! Grounded in the teacher's `network_task`'s single dispatch loop, split
//! here into the "what to do when the radio is idle" (`Proactive`) and "what
//! to do with a just-delivered packet" (`Reactive`) halves the teacher keeps
//! fused, because the five variants only ever differ in the reactive half
//! (route acceptance) while sharing one proactive transmit policy (p-CSMA) —
//! except the query protocol, which also drives its own traffic and timers
//! from the proactive side.

pub mod dsdv;
pub mod query;

use crate::config::ExperimentTag;
use crate::node::NodeId;
use crate::simulation::Simulation;

/// What a proactive handler wants to happen once its chosen packet (if any)
/// finishes transmitting.
#[derive(Debug, Clone, Copy)]
pub enum PostTxAction {
    /// Nothing further; re-enter the proactive tick cycle immediately.
    None,
    /// Idle for this many ms before the next proactive tick (e.g. the
    /// beacon's long inter-beacon gap).
    SleepMs(u64),
    /// Enter the query protocol's wait_response watchdog (spec §4.7
    /// "wait helpers"), keyed by the packet's `dest` (the queried child).
    WaitResponse,
    /// Enter the query protocol's wait_confirm watchdog, keyed by the
    /// packet's `dest` (the candidate parent a JOIN was just sent to).
    WaitConfirm,
}

/// Decides what a node does while it is not processing an inbound packet:
/// stay idle, or transmit something from its buffer / its own generator.
pub trait Proactive {
    /// Called whenever `node` reaches the front of the proactive tick queue.
    /// Implementations either schedule a `TxComplete` event and put the node
    /// in `Mode::Tx`, or schedule the next `ProactiveTick` and leave the node
    /// in `Mode::Rx`/`Mode::Sleep`.
    fn on_tick(&self, sim: &mut Simulation, node: NodeId);
}

/// Decides what a node does with a packet that has just finished arriving
/// (post-collision-resolution) at one of its receive buffer slots.
pub trait Reactive {
    /// `entry_idx` indexes `sim.nodes[receiver].rx_buffer`, which is still in
    /// scope at call time; implementations are responsible for routing
    /// table updates, relaying, and buffer cleanup.
    fn on_receive(&self, sim: &mut Simulation, receiver: NodeId, entry_idx: usize);
}

/// Build the proactive/reactive pair selected by `tag` (spec §4.7).
pub fn build_protocol(tag: ExperimentTag) -> (Box<dyn Proactive>, Box<dyn Reactive>) {
    match tag {
        ExperimentTag::V1 => (
            Box::new(dsdv::PCsmaProactive),
            Box::new(dsdv::DsdvReactive::new(dsdv::DsdvVariant::Plain)),
        ),
        ExperimentTag::V2 => (
            Box::new(dsdv::PCsmaProactive),
            Box::new(dsdv::DsdvReactive::new(dsdv::DsdvVariant::Hysteresis)),
        ),
        ExperimentTag::V3 => (Box::new(query::QueryProactive), Box::new(query::QueryReactive)),
        ExperimentTag::V4 => (
            Box::new(dsdv::PCsmaProactive),
            Box::new(dsdv::DsdvReactive::new(dsdv::DsdvVariant::PathWalk)),
        ),
        ExperimentTag::V5 => (
            Box::new(dsdv::PCsmaProactive),
            Box::new(dsdv::DsdvReactive::new(dsdv::DsdvVariant::Proportional)),
        ),
    }
}
