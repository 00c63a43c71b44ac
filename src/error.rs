//! Error taxonomy for the simulation kernel.
//!
//! Only fatal invariant violations (spec §7) become `SimError`. Protocol
//! rejections and channel losses are expected control flow and are folded
//! into statistics counters or `log::debug!`/`log::trace!` calls instead.

use crate::node::NodeId;

/// Errors that abort a running simulation.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("node {node}: arrived count {arrived} exceeds generated count {generated}")]
    ArrivedExceedsGenerated {
        node: NodeId,
        arrived: u64,
        generated: u64,
    },

    #[error("reference to undefined node id {0}")]
    UnknownNodeId(NodeId),

    #[error("packet carries undefined type tag {0}")]
    UnknownPacketType(u8),

    #[error("experiment tag {0} does not select a known protocol variant")]
    UnknownExperimentTag(u8),
}
