//! Packet model and closed-form airtime.
//!
//! Grounded in the teacher's `signal_calculations::calculate_air_time`,
//! generalized to the exact closed form of spec §4.3 (explicit `H`/`DE`
//! terms instead of boolean flags baked into the formula, milliseconds
//! instead of seconds).

use std::collections::HashMap;

use crate::node::NodeId;

/// Sentinel destination for broadcast packets (beacons). No real node uses
/// this id.
pub const BROADCAST: NodeId = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Data = 0,
    Beacon = 1,
    Query = 2,
    Join = 3,
    Confirm = 4,
}

impl PacketType {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Data),
            1 => Some(Self::Beacon),
            2 => Some(Self::Query),
            3 => Some(Self::Join),
            4 => Some(Self::Confirm),
            _ => None,
        }
    }
}

/// Radio parameters fixed for the lifetime of a packet.
#[derive(Debug, Clone, Copy)]
pub struct RadioParams {
    pub txpow: f32,
    pub sf: u8,
    pub cr: u8,
    pub bw: u16,
    pub freq: f64,
}

/// A packet in flight. Immutable fields are set at creation; `appear_time`,
/// `rssi_map`, and `passed` are mutated as the packet moves through the
/// channel.
#[derive(Debug, Clone)]
pub struct Packet {
    /// Serial number, unique per source, preserved across relays.
    pub sn: u64,
    /// Original source node. Never changes across relays (Design Note: the
    /// loss/collision counters are attributed to this field even when the
    /// transmitting node differs, which is the documented intent).
    pub src: NodeId,
    /// Semantic destination: the final destination for `Data`, the target
    /// child for `Query`, the candidate parent for `Join`, the new child for
    /// `Confirm`, or `BROADCAST` for `Beacon`.
    pub dest: NodeId,
    /// Node currently transmitting this packet (the source on first
    /// transmission, the relayer afterward).
    pub tx_node: NodeId,
    pub ptype: PacketType,
    pub payload_len: usize,
    pub radio: RadioParams,
    /// Hops remaining; a relay decrements this and refuses to relay at 0.
    pub ttl: u8,
    /// Set when the packet is handed to the channel model for transmission.
    pub appear_time: Option<u64>,
    /// Per-receiver RSSI sampled once per transmission, frozen for the
    /// lifetime of this packet instance.
    pub rssi_map: HashMap<NodeId, f32>,
    /// Node ids that have relayed this logical packet (by `(src, sn)`).
    pub passed: Vec<NodeId>,
}

impl Packet {
    /// Produce the relayed instance: a new packet with `ttl` decremented,
    /// `tx_node` set to the relayer, and a cleared per-transmission state.
    /// `(src, sn)` is preserved so arrival accounting on the original source
    /// still lines up.
    pub fn relay(&self, relayer: NodeId) -> Packet {
        let mut passed = self.passed.clone();
        passed.push(relayer);
        Packet {
            sn: self.sn,
            src: self.src,
            dest: self.dest,
            tx_node: relayer,
            ptype: self.ptype,
            payload_len: self.payload_len,
            radio: self.radio,
            ttl: self.ttl.saturating_sub(1),
            appear_time: None,
            rssi_map: HashMap::new(),
            passed,
        }
    }
}

/// LoRa-style airtime in milliseconds.
///
/// ```text
/// Tsym = 2^sf / bw
/// Tpream = (8 + 4.25) * Tsym
/// payloadSymb = 8 + max(ceil((8*plen - 4*sf + 28 + 16 - 20*H) / (4*(sf - 2*DE))) * (cr+4), 0)
/// airtime = Tpream + payloadSymb * Tsym      (H = 1, DE = 0)
/// ```
///
/// `bw` is in kHz, so `Tsym` comes out in milliseconds directly.
pub fn airtime_ms(radio: &RadioParams, plen: usize) -> f64 {
    let sf = radio.sf as f64;
    let bw = radio.bw as f64;
    let cr = radio.cr as f64;
    let plen = plen as f64;

    let t_sym = 2f64.powf(sf) / bw;
    let t_pream = (8.0 + 4.25) * t_sym;

    const H: f64 = 1.0;
    const DE: f64 = 0.0;
    let numerator = 8.0 * plen - 4.0 * sf + 28.0 + 16.0 - 20.0 * H;
    let denom = 4.0 * (sf - 2.0 * DE);
    let payload_symbols = 8.0 + ((numerator / denom).ceil() * (cr + 4.0)).max(0.0);

    t_pream + payload_symbols * t_sym
}

#[cfg(test)]
mod tests {
    use super::*;

    fn radio(sf: u8, bw: u16) -> RadioParams {
        RadioParams {
            txpow: 14.0,
            sf,
            cr: 1,
            bw,
            freq: 868_000_000.0,
        }
    }

    #[test]
    fn airtime_increases_with_payload_length() {
        let r = radio(7, 125);
        assert!(airtime_ms(&r, 50) > airtime_ms(&r, 10));
    }

    #[test]
    fn airtime_increases_with_spreading_factor() {
        let r7 = radio(7, 125);
        let r9 = radio(9, 125);
        assert!(airtime_ms(&r9, 20) > airtime_ms(&r7, 20));
    }

    #[test]
    fn airtime_decreases_with_bandwidth() {
        let r125 = radio(7, 125);
        let r500 = radio(7, 500);
        assert!(airtime_ms(&r500, 20) < airtime_ms(&r125, 20));
    }

    #[test]
    fn relay_preserves_src_and_sn_and_decrements_ttl() {
        let p = Packet {
            sn: 7,
            src: 3,
            dest: 0,
            tx_node: 3,
            ptype: PacketType::Data,
            payload_len: 15,
            radio: radio(7, 125),
            ttl: 4,
            appear_time: Some(100),
            rssi_map: HashMap::new(),
            passed: vec![],
        };
        let relayed = p.relay(9);
        assert_eq!(relayed.sn, p.sn);
        assert_eq!(relayed.src, p.src);
        assert_eq!(relayed.ttl, 3);
        assert_eq!(relayed.tx_node, 9);
        assert_eq!(relayed.passed, vec![9]);
        assert!(relayed.appear_time.is_none());
    }
}
