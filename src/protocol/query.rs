//! Query-based tree protocol (spec §4.7 variant 3): JOIN/CONFIRM handshake
//! for tree formation, QUERY/DATA round-robin polling for upward delivery,
//! and the three wait_* watchdogs.
//!
//! Grounded in the teacher's `network_task`'s request/response pattern for
//! its control plane, generalized from the teacher's fixed gateway-request
//! shape to the spec's parent-initiated poll loop. `RoutingTable::qlst`
//! plays two roles across a node's lifetime — the candidate parents heard
//! while unjoined, and (after joining) the round-robin queue of this node's
//! own children — since a node is never in both phases at once.

use std::collections::HashMap;

use crate::config::{BEACON_INTERVAL_MS, PLEN_CONFIRM, PLEN_JOIN, PLEN_QUERY};
use crate::generator;
use crate::node::{Node, NodeId};
use crate::packet::{Packet, PacketType, RadioParams};
use crate::protocol::dsdv::CSMA_SLOT_MS;
use crate::protocol::{PostTxAction, Proactive, Reactive};
use crate::simulation::Simulation;
use crate::transceiver::Event;

/// Consecutive unanswered QUERYs before a parent gives up on a child.
const MAX_QUERY_FAILURES: u32 = 3;

fn make_control(node: &mut Node, dest: NodeId, ptype: PacketType, payload_len: usize, radio: RadioParams, ttl: u8) -> Packet {
    let sn = node.next_sn();
    Packet {
        sn,
        src: node.id,
        dest,
        tx_node: node.id,
        ptype,
        payload_len,
        radio,
        ttl,
        appear_time: None,
        rssi_map: HashMap::new(),
        passed: Vec::new(),
    }
}

pub struct QueryProactive;

impl Proactive for QueryProactive {
    fn on_tick(&self, sim: &mut Simulation, node: NodeId) {
        let idx = node as usize;

        if let Some(packet) = sim.nodes[idx].tx_buffer.pop_front() {
            let post = match packet.ptype {
                PacketType::Beacon => PostTxAction::SleepMs(BEACON_INTERVAL_MS),
                PacketType::Query => PostTxAction::WaitResponse,
                PacketType::Join => PostTxAction::WaitConfirm,
                PacketType::Data | PacketType::Confirm => PostTxAction::None,
            };
            sim.begin_transmission(node, packet, post);
            return;
        }

        let joined = sim.nodes[idx].routing.joined;
        if !joined {
            if sim.nodes[idx].routing.pending_parent.is_some() {
                return; // wait_confirm governs resumption
            }
            if let Some(candidate) = sim.nodes[idx].routing.qlst.pop_front() {
                sim.nodes[idx].routing.pending_parent = Some(candidate);
                let radio = sim.config.radio_defaults.to_radio_params();
                let ttl = sim.config.radio_defaults.ttl;
                let join = make_control(&mut sim.nodes[idx], candidate, PacketType::Join, PLEN_JOIN, radio, ttl);
                sim.begin_transmission(node, join, PostTxAction::WaitConfirm);
                return;
            }
            sim.scheduler.schedule_after(CSMA_SLOT_MS, Event::ProactiveTick(node));
            return;
        }

        // Only the gateway runs the query round-robin; a non-gateway end
        // device has nothing left to do proactively once its tx_buffer (the
        // drain above) is empty.
        if node != 0 {
            sim.scheduler.schedule_after(CSMA_SLOT_MS, Event::ProactiveTick(node));
            return;
        }

        if sim.nodes[idx].routing.waiting.is_some() {
            return; // wait_response governs resumption
        }
        if let Some(child) = sim.nodes[idx].routing.qlst.pop_front() {
            sim.nodes[idx].routing.qlst.push_back(child);
            let radio = sim.config.radio_defaults.to_radio_params();
            let ttl = sim.config.radio_defaults.ttl;
            let query = make_control(&mut sim.nodes[idx], child, PacketType::Query, PLEN_QUERY, radio, ttl);
            sim.begin_transmission(node, query, PostTxAction::WaitResponse);
            return;
        }
        sim.scheduler.schedule_after(CSMA_SLOT_MS, Event::ProactiveTick(node));
    }
}

pub struct QueryReactive;

impl Reactive for QueryReactive {
    fn on_receive(&self, sim: &mut Simulation, receiver: NodeId, entry_idx: usize) {
        let entry = sim.nodes[receiver as usize].rx_buffer[entry_idx].clone();
        if entry.col || entry.mis {
            return;
        }
        let packet = entry.packet;
        let from = packet.tx_node;
        let idx = receiver as usize;

        match packet.ptype {
            PacketType::Beacon => {
                let already_settled = sim.nodes[idx].routing.joined || sim.nodes[idx].routing.pending_parent.is_some();
                if !already_settled && packet.src != receiver && !sim.nodes[idx].routing.qlst.contains(&packet.src) {
                    sim.nodes[idx].routing.qlst.push_back(packet.src);
                }
                if packet.ttl > 0 {
                    let relayed = packet.relay(receiver);
                    sim.nodes[idx].tx_buffer.push_back(relayed);
                }
            }
            PacketType::Join => {
                if sim.nodes[idx].routing.joined && packet.dest == receiver {
                    sim.nodes[idx].routing.add_child(packet.src);
                    if !sim.nodes[idx].routing.qlst.contains(&packet.src) {
                        sim.nodes[idx].routing.qlst.push_back(packet.src);
                    }
                    let radio = sim.config.radio_defaults.to_radio_params();
                    let ttl = sim.config.radio_defaults.ttl;
                    let confirm = make_control(&mut sim.nodes[idx], packet.src, PacketType::Confirm, PLEN_CONFIRM, radio, ttl);
                    sim.nodes[idx].tx_buffer.push_back(confirm);
                }
            }
            PacketType::Confirm => {
                let is_expected = sim.nodes[idx].routing.pending_parent == Some(from) && packet.dest == receiver;
                if is_expected {
                    let now = sim.scheduler.now();
                    let table = &mut sim.nodes[idx].routing;
                    table.parent = Some(from);
                    table.pending_parent = None;
                    table.joined = true;
                    table.hops = 1;
                    table.lrt = now;
                    sim.scheduler.schedule_at(now, Event::ProactiveTick(receiver));
                }
            }
            PacketType::Query => {
                if packet.dest == receiver {
                    sim.nodes[idx].routing.lrt = sim.scheduler.now();
                    if let Some(data) = sim.nodes[idx].tx_buffer.pop_front() {
                        sim.begin_transmission(receiver, data, PostTxAction::None);
                    }
                }
            }
            PacketType::Data => {
                // Drop silently unless we are the transmitter's parent: an
                // overhearing neighbor was never addressed by this packet.
                if sim.designated_next_hop(from, packet.dest) != Some(receiver) {
                    return;
                }

                if receiver == 0 && packet.dest == 0 {
                    if let Err(e) = sim.nodes[packet.src as usize].record_arrival() {
                        sim.fatal(e);
                    }
                } else if packet.ttl > 0 {
                    sim.nodes[idx].stats.relay += 1;
                    let relayed = packet.relay(receiver);
                    sim.nodes[idx].tx_buffer.push_back(relayed);
                }

                if sim.nodes[idx].routing.waiting == Some(from) {
                    sim.nodes[idx].routing.waiting = None;
                    if let Some(t) = sim.nodes[idx].routing.tout.get_mut(&from) {
                        *t = 0;
                    }
                    if let Some(r) = sim.nodes[idx].routing.resp.get_mut(&from) {
                        *r = true;
                    }
                    let now = sim.scheduler.now();
                    sim.scheduler.schedule_at(now, Event::ProactiveTick(receiver));
                }
            }
        }
    }
}

pub(crate) fn handle_beacon_fire(sim: &mut Simulation, node: NodeId) {
    if sim.nodes[node as usize].routing.joined {
        let radio = sim.config.radio_defaults.to_radio_params();
        let ttl = sim.config.radio_defaults.ttl;
        let beacon = generator::make_beacon(&mut sim.nodes[node as usize], radio, ttl);
        sim.nodes[node as usize].tx_buffer.push_back(beacon);
    }
    sim.scheduler.schedule_after(BEACON_INTERVAL_MS, Event::BeaconFire(node));
}

pub(crate) fn handle_generator_fire(sim: &mut Simulation, node: NodeId) {
    if node != 0 && sim.nodes[node as usize].routing.joined {
        let radio = sim.config.radio_defaults.to_radio_params();
        let ttl = sim.config.radio_defaults.ttl;
        let data = generator::make_data(&mut sim.nodes[node as usize], 0, radio, ttl);
        sim.nodes[node as usize].tx_buffer.push_back(data);
    }
    let kind = sim.config.protocol.generator_kind;
    let avg = sim.config.protocol.avg_gen_time_ms;
    let dt = generator::next_interval_ms(kind, avg, &mut sim.rng);
    sim.scheduler.schedule_after(dt, Event::GeneratorFire(node));
}

/// Parent-side watchdog: `parent` queried `child` and heard nothing within
/// RTH. Re-validated against `routing.waiting` so a reply that arrived in
/// the same instant the timer was already in flight is not double-counted.
pub(crate) fn handle_wait_response(sim: &mut Simulation, parent: NodeId, child: NodeId) {
    let idx = parent as usize;
    if sim.nodes[idx].routing.waiting != Some(child) {
        return;
    }
    sim.nodes[idx].routing.waiting = None;
    if let Some(t) = sim.nodes[idx].routing.tout.get_mut(&child) {
        *t += 1;
    }
    let failures = sim.nodes[idx].routing.tout.get(&child).copied().unwrap_or(0);
    if failures >= MAX_QUERY_FAILURES {
        log::debug!("node {parent} dropping unresponsive child {child} after {failures} missed queries");
        sim.nodes[idx].routing.drop_child(child);
        sim.nodes[idx].routing.qlst.retain(|c| *c != child);
    }
    let now = sim.scheduler.now();
    sim.scheduler.schedule_at(now, Event::ProactiveTick(parent));
}

/// Child-side watchdog: if too long has passed since the parent last
/// queried us, assume the parent (or the path to it) is gone and fall back
/// to unjoined. Reschedules itself every QTH regardless, for the lifetime of
/// the node.
pub(crate) fn handle_wait_query(sim: &mut Simulation, node: NodeId) {
    let idx = node as usize;
    let qth = sim.config.protocol.qth_ms;
    let now = sim.scheduler.now();
    let (joined, lrt) = {
        let table = &sim.nodes[idx].routing;
        (table.joined, table.lrt)
    };
    if joined && now.saturating_sub(lrt) > qth {
        log::debug!("node {node} lost its parent, falling back to unjoined at t={now}ms");
        sim.nodes[idx].routing.reset_to_unjoined();
        sim.scheduler.schedule_at(now, Event::ProactiveTick(node));
    }
    sim.scheduler.schedule_after(qth, Event::WaitQuery(node));
}

/// Joiner-side watchdog: `node` sent a JOIN to `candidate` and heard no
/// CONFIRM within CTH. Drops the candidate and resumes the discovery loop.
pub(crate) fn handle_wait_confirm(sim: &mut Simulation, node: NodeId, candidate: NodeId) {
    let idx = node as usize;
    if sim.nodes[idx].routing.pending_parent != Some(candidate) {
        return;
    }
    sim.nodes[idx].routing.pending_parent = None;
    sim.nodes[idx].routing.qlst.retain(|c| *c != candidate);
    let now = sim.scheduler.now();
    sim.scheduler.schedule_at(now, Event::ProactiveTick(node));
}
