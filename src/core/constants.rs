//! Centralized windowing and threshold constants for the observation pipeline.
//!
//! Open Question 1 (spec) asked for a single place to name these; this is it.

/// M3 ring buffer capacity (samples retained per symbol, upper bound).
pub const M3_RING_CAPACITY: usize = 1024;

/// M3 max sample age, seconds. Retention is min(ring capacity, max age).
pub const M3_MAX_AGE_SECS: f64 = 600.0;

/// Bucket width for TradeBurst (#15).
pub const TRADE_BURST_WINDOW_SECS: f64 = 1.0;

/// Candle width for PriceAcceptanceRatio (#17).
pub const ACCEPTANCE_CANDLE_SECS: f64 = 1.0;

/// Default node band half-width when a symbol has no configured override.
pub const DEFAULT_NODE_BAND: f64 = 5.0;

/// Default tick size, used for the absorption stability bound.
pub const DEFAULT_TICK_SIZE: f64 = 0.5;

/// AbsorptionEvent (#11) stability bound, expressed in ticks.
pub const ABSORPTION_STABILITY_TICKS: f64 = 1.0;

/// Minimum gap between consecutive M3 samples, seconds, to count as a "void"
/// interval for TraversalVoidSpan (#7).
pub const VOID_GAP_THRESHOLD_SECS: f64 = 5.0;

/// Node decay rates, per second, by lifecycle state.
pub const ACTIVE_DECAY_RATE: f64 = 1e-4;
pub const DORMANT_DECAY_RATE: f64 = 1e-5;
pub const ARCHIVED_DECAY_RATE: f64 = 0.0;

/// Lifecycle transition thresholds.
pub const ACTIVE_TO_DORMANT_STRENGTH: f64 = 0.15;
pub const ACTIVE_TO_DORMANT_IDLE_SECS: f64 = 3600.0;
pub const DORMANT_TO_ARCHIVED_STRENGTH: f64 = 0.01;
pub const DORMANT_TO_ARCHIVED_IDLE_SECS: f64 = 86400.0;

/// Evidence deltas, see spec Evidence accumulation table.
pub const EVIDENCE_OB_BASE: f64 = 0.3;
pub const EVIDENCE_OB_PER_SEC: f64 = 0.01;
pub const EVIDENCE_OB_CONFIDENCE: f64 = 0.6;

pub const EVIDENCE_VOLUME_BASE: f64 = 0.4;
pub const EVIDENCE_VOLUME_PER_1000: f64 = 0.05;
pub const EVIDENCE_VOLUME_CONFIDENCE: f64 = 0.7;

pub const EVIDENCE_LIQUIDATION_BASE: f64 = 0.3;
pub const EVIDENCE_LIQUIDATION_PER_COUNT: f64 = 0.05;
pub const EVIDENCE_LIQUIDATION_CONFIDENCE: f64 = 0.5;

pub const EVIDENCE_REVISIT_BONUS: f64 = 0.1;
pub const EVIDENCE_REVIVAL_BONUS: f64 = 0.2;
