//! p-CSMA proactive transmit policy, shared by every DSDV variant, and the
//! four DSDV route-acceptance rules (spec §4.7 variants 1, 2, 4, 5).
//!
//! Grounded in the teacher's `network_task`'s slotted backoff-and-retry
//! transmit loop, generalized from the teacher's embassy-timer-driven sleep
//! to explicit `ProactiveTick` re-scheduling (Design Note 3).

use crate::config::BEACON_INTERVAL_MS;
use crate::node::NodeId;
use crate::packet::PacketType;
use crate::protocol::{PostTxAction, Proactive, Reactive};
use crate::simulation::Simulation;
use crate::transceiver::Event;
use crate::generator;

/// Carrier-sense slot width, in ms. A node with nothing to send re-checks its
/// buffer every slot; a node with something to send flips a `1/n0` coin each
/// slot before transmitting, approximating a shared channel with `n0`
/// contending neighbors.
pub const CSMA_SLOT_MS: u64 = 100;

pub struct PCsmaProactive;

impl Proactive for PCsmaProactive {
    fn on_tick(&self, sim: &mut Simulation, node_id: NodeId) {
        let idx = node_id as usize;

        if !sim.nodes[idx].csma_dephased {
            sim.nodes[idx].csma_dephased = true;
            let jitter = sim.rng.uniform_int(0, CSMA_SLOT_MS);
            sim.scheduler.schedule_after(jitter, Event::ProactiveTick(node_id));
            return;
        }

        if sim.nodes[idx].tx_buffer.is_empty() {
            sim.scheduler.schedule_after(CSMA_SLOT_MS, Event::ProactiveTick(node_id));
            return;
        }

        let n0 = (sim.config.protocol.n0.max(1)) as f64;
        if sim.rng.uniform01() > 1.0 / n0 {
            sim.scheduler.schedule_after(CSMA_SLOT_MS, Event::ProactiveTick(node_id));
            return;
        }

        let packet = sim.nodes[idx].tx_buffer.pop_front().expect("checked non-empty above");
        sim.begin_transmission(node_id, packet, PostTxAction::None);
    }
}

/// Which of the four distance-vector acceptance rules a `DsdvReactive`
/// applies to an incoming route advertisement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DsdvVariant {
    /// Sequence number then metric, no RSSI memory.
    Plain,
    /// Adds a bounded RSSI history and rejects stale or over-the-hop-limit
    /// advertisements.
    Hysteresis,
    /// `Hysteresis` plus an explicit walk of the current route to the
    /// advertiser, refusing a next hop that would loop back through the
    /// advertised destination.
    PathWalk,
    /// Accepts an equal-sequence advertisement whose metric has only grown
    /// by as much as the RSSI trend justifies.
    Proportional,
}

pub struct DsdvReactive {
    variant: DsdvVariant,
}

impl DsdvReactive {
    pub fn new(variant: DsdvVariant) -> Self {
        Self { variant }
    }

    /// Evaluate whether a route to `dest` via `from` at `metric`/`seq` should
    /// replace (or create) `receiver`'s current entry. `rssi` is this
    /// advertisement's sampled signal strength from `from`.
    fn accept_route(
        &self,
        sim: &mut Simulation,
        receiver: NodeId,
        dest: NodeId,
        from: NodeId,
        metric: u32,
        seq: u32,
        rssi: f32,
    ) -> bool {
        let hl = sim.config.protocol.hl;
        let rm1 = sim.config.protocol.rm1;
        let rm2 = sim.config.protocol.rm2;
        // `from`'s own path to `dest` already passing through `receiver` means
        // accepting this advertisement would route `receiver` back through
        // itself; computed against the whole fleet before the table borrow
        // below since a single node's table only knows its own next hop.
        let would_loop = crate::routing::path_contains(&sim.nodes, from, dest, receiver);
        let table = &mut sim.nodes[receiver as usize].routing;

        let current_seq = table.seq.get(&dest).copied();
        let current_metric = table.metric.get(&dest).copied();

        match self.variant {
            DsdvVariant::Plain => match (current_seq, current_metric) {
                (None, _) => true,
                (Some(cs), Some(cm)) => seq > cs || (seq == cs && metric < cm),
                (Some(cs), None) => seq >= cs,
            },
            DsdvVariant::Hysteresis => {
                if metric > hl {
                    return false;
                }
                if let Some(cs) = current_seq {
                    if seq < cs {
                        return false;
                    }
                }
                let avg = table.record_rssi(from, rssi);
                match (current_seq, current_metric) {
                    (None, _) => true,
                    (Some(cs), _) if seq > cs => true,
                    (Some(_), Some(cm)) => {
                        // Same sequence: only switch if the candidate's
                        // metric is meaningfully better, bounded by rm1 so a
                        // single noisy sample can't flap the route.
                        metric + 1 <= cm && avg > rssi - rm1
                    }
                    _ => false,
                }
            }
            DsdvVariant::PathWalk => {
                if metric > hl {
                    return false;
                }
                if let Some(cs) = current_seq {
                    if seq < cs {
                        return false;
                    }
                }
                if would_loop {
                    return false;
                }
                let avg = table.record_rssi(from, rssi);
                match (current_seq, current_metric) {
                    (None, _) => true,
                    (Some(cs), _) if seq > cs => true,
                    (Some(_), Some(cm)) => metric + 1 <= cm && avg > rssi - rm1,
                    _ => false,
                }
            }
            DsdvVariant::Proportional => {
                if metric > hl {
                    return false;
                }
                if let Some(cs) = current_seq {
                    if seq < cs {
                        return false;
                    }
                }
                let before = table.average_rssi(from);
                let avg = table.record_rssi(from, rssi);
                match (current_seq, current_metric) {
                    (None, _) => true,
                    (Some(cs), _) if seq > cs => true,
                    (Some(_), Some(cm)) => {
                        let diff = (avg - before.unwrap_or(avg)) as f64;
                        let allowance = (diff / rm2 as f64).round().max(0.0) as u32;
                        metric <= cm + allowance
                    }
                    _ => false,
                }
            }
        }
    }

    fn handle_beacon(
        &self,
        sim: &mut Simulation,
        receiver: NodeId,
        from: NodeId,
        advertised_src: NodeId,
        seq: u32,
        metric: u32,
        rssi: f32,
    ) -> bool {
        if receiver == advertised_src {
            return false; // hearing our own advertisement echoed back
        }
        if self.accept_route(sim, receiver, advertised_src, from, metric, seq, rssi) {
            sim.nodes[receiver as usize].routing.set_route(advertised_src, from, metric, seq);
            true
        } else {
            false
        }
    }

    /// Drop silently unless `receiver` is `from`'s own chosen next-hop for
    /// `packet.dest` — any other node that happened to overhear the
    /// transmission was never addressed by it.
    fn handle_data(&self, sim: &mut Simulation, receiver: NodeId, from: NodeId, packet: crate::packet::Packet) {
        if sim.designated_next_hop(from, packet.dest) != Some(receiver) {
            return;
        }
        if packet.dest == receiver {
            if let Err(e) = sim.nodes[packet.src as usize].record_arrival() {
                sim.fatal(e);
            }
            return;
        }
        if packet.ttl == 0 {
            return;
        }
        sim.nodes[receiver as usize].stats.relay += 1;
        let relayed = packet.relay(receiver);
        sim.nodes[receiver as usize].tx_buffer.push_back(relayed);
    }
}

impl Reactive for DsdvReactive {
    fn on_receive(&self, sim: &mut Simulation, receiver: NodeId, entry_idx: usize) {
        let entry = sim.nodes[receiver as usize].rx_buffer[entry_idx].clone();
        if entry.col || entry.mis {
            return;
        }
        let packet = entry.packet;
        let from = packet.tx_node;
        let rssi = entry.rssi;
        let metric = packet.passed.len() as u32 + 1;

        match packet.ptype {
            PacketType::Beacon => {
                let advertised_src = packet.src;
                let seq = packet.sn as u32;
                let accepted = self.handle_beacon(sim, receiver, from, advertised_src, seq, metric, rssi);
                if accepted && packet.ttl > 0 {
                    let relayed = packet.relay(receiver);
                    sim.nodes[receiver as usize].tx_buffer.push_back(relayed);
                }
            }
            PacketType::Data => self.handle_data(sim, receiver, from, packet),
            _ => {}
        }
    }
}

/// Gateway-only periodic route advertisement (spec §4.7/§4.8). Reuses
/// `RoutingTable::own_seq` as the beacon's sequence number, carried in the
/// packet's `sn` field so every relay hop can read it without a dedicated
/// routing-control payload.
pub(crate) fn handle_beacon_fire(sim: &mut Simulation, node: NodeId) {
    let own_seq = sim.nodes[node as usize].routing.bump_own_seq();
    let radio = sim.config.radio_defaults.to_radio_params();
    let ttl = sim.config.radio_defaults.ttl;
    let mut beacon = generator::make_beacon(&mut sim.nodes[node as usize], radio, ttl);
    beacon.sn = own_seq as u64;
    sim.nodes[node as usize].tx_buffer.push_back(beacon);
    sim.scheduler.schedule_after(BEACON_INTERVAL_MS, Event::BeaconFire(node));
}

/// End-device periodic-or-exponential data traffic generator (spec §4.8),
/// addressed to the gateway and handed to the shared p-CSMA transmit queue.
pub(crate) fn handle_generator_fire(sim: &mut Simulation, node: NodeId) {
    let radio = sim.config.radio_defaults.to_radio_params();
    let ttl = sim.config.radio_defaults.ttl;
    let data = generator::make_data(&mut sim.nodes[node as usize], 0, radio, ttl);
    sim.nodes[node as usize].tx_buffer.push_back(data);

    let kind = sim.config.protocol.generator_kind;
    let avg = sim.config.protocol.avg_gen_time_ms;
    let dt = generator::next_interval_ms(kind, avg, &mut sim.rng);
    sim.scheduler.schedule_after(dt, Event::GeneratorFire(node));
}
