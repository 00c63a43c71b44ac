//! Packet generators (spec §4.8): periodic beacons at the gateway and
//! periodic-or-exponential data traffic at end devices, for the DSDV
//! variants. The query-based tree protocol (variant 3) generates its own
//! traffic from inside the proactive handler (spec §4.7) and does not use
//! this generator.

use std::collections::HashMap;

use crate::config::{GeneratorKind, PLEN_BEACON, PLEN_DATA};
use crate::node::{Node, NodeId};
use crate::packet::{PacketType, RadioParams, BROADCAST};
use crate::rng::SimRng;

/// Next inter-arrival time, in ms, for the end-device data generator.
pub fn next_interval_ms(kind: GeneratorKind, avg_ms: u64, rng: &mut SimRng) -> u64 {
    match kind {
        GeneratorKind::Periodic => avg_ms,
        GeneratorKind::Exponential => rng.exponential(avg_ms as f64).round().max(1.0) as u64,
    }
}

/// Build a broadcast beacon originated by `node`. Does not touch `pkts`:
/// only `Data` traffic counts toward the generated-packet total.
pub fn make_beacon(node: &mut Node, radio: RadioParams, ttl: u8) -> crate::packet::Packet {
    let sn = node.next_sn();
    crate::packet::Packet {
        sn,
        src: node.id,
        dest: BROADCAST,
        tx_node: node.id,
        ptype: PacketType::Beacon,
        payload_len: PLEN_BEACON,
        radio,
        ttl,
        appear_time: None,
        rssi_map: HashMap::new(),
        passed: Vec::new(),
    }
}

/// Build a unicast-routed data packet originated by `node`, addressed to
/// `dest`. Increments `node.stats.pkts` (spec §4.8).
pub fn make_data(node: &mut Node, dest: NodeId, radio: RadioParams, ttl: u8) -> crate::packet::Packet {
    let sn = node.next_sn();
    node.stats.pkts += 1;
    crate::packet::Packet {
        sn,
        src: node.id,
        dest,
        tx_node: node.id,
        ptype: PacketType::Data,
        payload_len: PLEN_DATA,
        radio,
        ttl,
        appear_time: None,
        rssi_map: HashMap::new(),
        passed: Vec::new(),
    }
}
