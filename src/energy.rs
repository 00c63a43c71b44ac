//! Observational energy accounting (spec §4.9). Summed into
//! `node.stats.energy` for reporting only; never feeds back into a
//! decision.
//!
//! Grounded in the teacher's `signal_calculations::{dbm_to_mw, mw_to_dbm}`
//! dBm/linear conversion helpers, generalized here to the spec's 23-entry
//! current-draw table instead of a continuous formula.

const SUPPLY_VOLTAGE: f64 = 3.0;

/// Current draw in mA, indexed by `txpow + 2` (covering -2..=20 dBm).
const CURRENT_MA: [f64; 23] = [
    20.0, 20.5, 21.0, 21.5, 22.0, 22.5, 23.5, 24.5, 25.5, 27.0, 29.0, 31.0, 33.0, 35.5, 38.0,
    41.0, 44.0, 60.0, 75.0, 90.0, 100.0, 110.0, 120.0,
];

/// Transmit current draw, in mA, for `txpow_dbm` in `[-2, 20]`. Clamps to
/// the table's bounds outside that range.
pub fn tx_current_ma(txpow_dbm: f32) -> f64 {
    let idx = (txpow_dbm.round() as i32 + 2).clamp(0, CURRENT_MA.len() as i32 - 1) as usize;
    CURRENT_MA[idx]
}

/// Energy contribution, in mJ, of one transmission: `airtime_ms * I * V`.
pub fn tx_energy_mj(airtime_ms: f64, txpow_dbm: f32) -> f64 {
    airtime_ms * tx_current_ma(txpow_dbm) * SUPPLY_VOLTAGE / 1000.0
}
