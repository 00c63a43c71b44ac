//! Driver-facing configuration (spec §6). A `SimulationConfig` is what an
//! external experiment driver builds (by hand, or by deserializing from
//! TOML/JSON with the teacher's `serde` stack) and passes to
//! `Simulation::new`.

use serde::Deserialize;

use crate::channel::ChannelParams;
use crate::node::{NodeId, Point};
use crate::packet::RadioParams;

/// Selects the proactive+reactive protocol pair (spec §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ExperimentTag {
    /// Plain DSDV.
    V1 = 1,
    /// DSDV with RSSI hysteresis.
    V2 = 2,
    /// Query-based tree protocol.
    V3 = 3,
    /// DSDV with RSSI hysteresis and explicit path-walk loop prevention.
    V4 = 4,
    /// DSDV with the proportional RSSI acceptance rule.
    V5 = 5,
}

impl ExperimentTag {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::V1),
            2 => Some(Self::V2),
            3 => Some(Self::V3),
            4 => Some(Self::V4),
            5 => Some(Self::V5),
            _ => None,
        }
    }

    pub fn is_query(self) -> bool {
        matches!(self, ExperimentTag::V3)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum GeneratorKind {
    Periodic,
    Exponential,
}

/// A node's identity and fixed position, as supplied by the driver's
/// position-layout loader (out of scope for this crate per spec §1).
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct NodeSpec {
    pub id: NodeId,
    pub x: f64,
    pub y: f64,
}

impl NodeSpec {
    pub fn position(&self) -> Point {
        Point {
            x: self.x,
            y: self.y,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    pub radio_defaults: RadioDefaults,
    #[serde(default)]
    pub channel: ChannelParams,
    pub protocol: ProtocolParams,
    pub experiment: ExperimentTag,
}

impl SimulationConfig {
    /// Parse a configuration from JSON, as a driver would load it from a
    /// scenario file.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RadioDefaults {
    pub ptx: f32,
    pub sf: u8,
    pub cr: u8,
    pub bw: u16,
    pub freq: f64,
    pub ttl: u8,
}

impl RadioDefaults {
    pub fn to_radio_params(self) -> RadioParams {
        RadioParams {
            txpow: self.ptx,
            sf: self.sf,
            cr: self.cr,
            bw: self.bw,
            freq: self.freq,
        }
    }
}

impl Default for RadioDefaults {
    fn default() -> Self {
        Self {
            ptx: 14.0,
            sf: 7,
            cr: 1,
            bw: 125,
            freq: 868_000_000.0,
            ttl: 8,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ProtocolParams {
    /// Assumed-neighbor count used by p-CSMA's transmit probability.
    pub n0: u32,
    /// RSSI hysteresis margins for the DSDV "with memory" variants.
    pub rm1: f32,
    pub rm2: f32,
    /// Query-protocol join timeout, in ms (default 5 min).
    #[serde(default = "default_qth_ms")]
    pub qth_ms: u64,
    /// Hop limit for route/JOIN acceptance.
    pub hl: u32,
    pub generator_kind: GeneratorKind,
    /// Mean inter-arrival time for the end-device data generator, in ms.
    pub avg_gen_time_ms: u64,
}

fn default_qth_ms() -> u64 {
    5 * 60 * 1000
}

impl Default for ProtocolParams {
    fn default() -> Self {
        Self {
            n0: 5,
            rm1: 3.0,
            rm2: 3.0,
            qth_ms: default_qth_ms(),
            hl: 10,
            generator_kind: GeneratorKind::Exponential,
            avg_gen_time_ms: 10_000,
        }
    }
}

/// Query-protocol timer thresholds (spec §4.7 "Wait helpers"), in ms.
pub const RTH_MS: u64 = 1_000;
pub const CTH_MS: u64 = 5_000;

pub const PLEN_BEACON: usize = 20;
pub const PLEN_DATA: usize = 15;
pub const PLEN_JOIN: usize = 10;
pub const PLEN_QUERY: usize = 8;
pub const PLEN_CONFIRM: usize = 8;
pub const BEACON_INTERVAL_MS: u64 = 600_000;
