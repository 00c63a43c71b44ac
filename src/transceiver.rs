//! Radio front-end: the scheduler's event vocabulary and the channel-facing
//! half of transmission (registration at every in-range neighbor, collision
//! resolution, delivery at completion).
//!
//! Grounded in the teacher's `network_task::process_packet_transmission` /
//! `process_packet_reception` pair, restructured around `time::Scheduler`'s
//! explicit events instead of the teacher's embassy channel `select!` loop
//! (Design Note 3).

use crate::config::{CTH_MS, RTH_MS};
use crate::node::{Mode, NodeId, RxEntry};
use crate::packet::{airtime_ms, Packet, PacketType};
use crate::protocol::{PostTxAction, Reactive};
use crate::simulation::Simulation;
use crate::{channel, collision, energy};

/// Everything the scheduler can wake up on. Every variant carries just
/// enough to re-validate itself against current node state (a fired timer
/// whose condition no longer holds is a no-op, not an error).
#[derive(Debug, Clone)]
pub enum Event {
    /// `node` is between packets and must decide whether to transmit.
    ProactiveTick(NodeId),
    /// The transmission `tx_node` began is finishing right now; deliver it
    /// to every node that registered it, then apply `post_tx`.
    TxComplete(NodeId, Packet, PostTxAction),
    /// Time for `node` to consider broadcasting a route/presence beacon.
    BeaconFire(NodeId),
    /// Time for `node`'s own data generator to produce its next packet.
    GeneratorFire(NodeId),
    /// `parent` queried `child` and has not heard a reply within RTH.
    WaitResponse(NodeId, NodeId),
    /// `node` has not heard from its tree parent within QTH; re-checked
    /// against `routing.lrt` at fire time.
    WaitQuery(NodeId),
    /// `node` sent a JOIN to `candidate` and has not heard a CONFIRM within
    /// CTH.
    WaitConfirm(NodeId, NodeId),
}

impl Simulation {
    /// The node `tx_node` has actually chosen to relay a packet addressed to
    /// `dest` through, per its own routing state: DSDV variants read
    /// `routing.next`, the tree protocol always hands data up to its
    /// `routing.parent`. Every other receiver that happens to hear the
    /// transmission was never "supposed to" get it (spec's catchloss
    /// accounting and protocol-rejection rule both key off this node only).
    pub(crate) fn designated_next_hop(&self, tx_node: NodeId, dest: NodeId) -> Option<NodeId> {
        if self.config.experiment.is_query() {
            self.nodes[tx_node as usize].routing.parent
        } else {
            self.nodes[tx_node as usize].routing.next.get(&dest).copied()
        }
    }

    /// Hand `packet` to the channel: register it at every in-range
    /// neighbor (running collision detection against whatever else is
    /// already in flight there), account `tx_node`'s transmit energy, put
    /// `tx_node` in `Mode::Tx`, and schedule the matching `TxComplete`.
    pub(crate) fn begin_transmission(&mut self, tx_node: NodeId, mut packet: Packet, post_tx: PostTxAction) {
        let now = self.scheduler.now();
        packet.appear_time = Some(now);
        let air = airtime_ms(&packet.radio, packet.payload_len);

        {
            let node = &mut self.nodes[tx_node as usize];
            node.mark_all_missed();
            node.transition_mode(Mode::Tx, now);
            node.stats.energy += energy::tx_energy_mj(air, packet.radio.txpow);
        }

        let next_hop = if packet.ptype == PacketType::Data {
            self.designated_next_hop(tx_node, packet.dest)
        } else {
            None
        };

        let tx_pos = self.nodes[tx_node as usize].position;
        for r in 0..self.nodes.len() {
            if r as NodeId == tx_node {
                continue;
            }
            let r_pos = self.nodes[r].position;
            let d = channel::euclidean((tx_pos.x, tx_pos.y), (r_pos.x, r_pos.y));
            let rssi = channel::rssi(packet.radio.txpow, d, &self.config.channel, &mut self.rng);
            let sens = channel::sensitivity(packet.radio.sf, packet.radio.bw);
            if rssi < sens {
                if next_hop == Some(r as NodeId) {
                    self.nodes[packet.src as usize].stats.atte += 1;
                }
                continue; // out of range: never even registered
            }

            let signal = collision::IncomingSignal {
                freq: packet.radio.freq,
                sf: packet.radio.sf,
                bw: packet.radio.bw,
                now,
                airtime_ms: air,
                rssi,
            };
            let outcome = collision::detect(&signal, &self.nodes[r].rx_buffer);
            for idx in &outcome.existing_casualties {
                self.nodes[r].rx_buffer[*idx].col = true;
            }
            let mis = self.nodes[r].mode != Mode::Rx;
            let mut received = packet.clone();
            received.rssi_map.insert(r as NodeId, rssi);
            self.nodes[r].rx_buffer.push(RxEntry {
                packet: received,
                rssi,
                col: outcome.new_is_casualty,
                mis,
            });
        }

        self.scheduler
            .schedule_after(air.round() as u64, Event::TxComplete(tx_node, packet, post_tx));
    }

    /// Deliver a just-finished transmission to every node that registered
    /// it. A lost Data packet only moves `coll`/`miss` (attributed to
    /// `packet.src`, never the relaying `tx_node`) when the loss happened at
    /// `tx_node`'s designated next-hop; every other registered receiver was
    /// eavesdropping and is simply dropped. Then act on `post_tx`.
    pub(crate) fn handle_tx_complete(
        &mut self,
        tx_node: NodeId,
        packet: Packet,
        post_tx: PostTxAction,
        reactive: &dyn Reactive,
    ) {
        let now = self.scheduler.now();
        self.nodes[tx_node as usize].transition_mode(Mode::Rx, now);

        let next_hop = if packet.ptype == PacketType::Data {
            self.designated_next_hop(tx_node, packet.dest)
        } else {
            None
        };

        for r in 0..self.nodes.len() {
            if r as NodeId == tx_node {
                continue;
            }
            let idx = self.nodes[r].rx_buffer.iter().position(|e| {
                e.packet.src == packet.src && e.packet.sn == packet.sn && e.packet.tx_node == packet.tx_node
            });
            let idx = match idx {
                Some(i) => i,
                None => continue,
            };
            let (col, mis) = {
                let entry = &self.nodes[r].rx_buffer[idx];
                (entry.col, entry.mis)
            };

            if mis || col {
                if next_hop == Some(r as NodeId) {
                    if mis {
                        self.nodes[packet.src as usize].stats.miss += 1;
                    }
                    if col {
                        self.nodes[packet.src as usize].stats.coll += 1;
                    }
                }
                self.nodes[r].rx_buffer.remove(idx);
                continue;
            }

            reactive.on_receive(self, r as NodeId, idx);
            if idx < self.nodes[r].rx_buffer.len() {
                self.nodes[r].rx_buffer.remove(idx);
            }
        }

        match post_tx {
            PostTxAction::None => {
                self.scheduler.schedule_at(now, Event::ProactiveTick(tx_node));
            }
            PostTxAction::SleepMs(ms) => {
                self.nodes[tx_node as usize].transition_mode(Mode::Sleep, now);
                self.scheduler.schedule_after(ms, Event::ProactiveTick(tx_node));
            }
            PostTxAction::WaitResponse => {
                let child = packet.dest;
                self.nodes[tx_node as usize].routing.waiting = Some(child);
                self.scheduler.schedule_after(RTH_MS, Event::WaitResponse(tx_node, child));
            }
            PostTxAction::WaitConfirm => {
                let candidate = packet.dest;
                self.scheduler
                    .schedule_after(CTH_MS, Event::WaitConfirm(tx_node, candidate));
            }
        }
    }
}
