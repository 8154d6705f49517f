//! Canonical event records and the primitive value catalog.
//!
//! Everything in this module is an immutable value type. Nothing here owns
//! mutable state - owners live in `m2_continuity` and `m3_temporal`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which side initiated a trade, or which side a liquidation hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

/// A normalized trade, the output of `m1_ingestion::normalize_trade`.
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub timestamp: f64,
    pub symbol: String,
    pub price: f64,
    pub quantity: f64,
    pub aggressor_side: Side,
}

/// A normalized liquidation, the output of `m1_ingestion::normalize_liquidation`.
#[derive(Debug, Clone, PartialEq)]
pub struct Liquidation {
    pub timestamp: f64,
    pub symbol: String,
    pub price: f64,
    pub quantity: f64,
    pub side: Side,
}

/// One absolute-state level in a depth update. `size == 0.0` removes the level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthLevel {
    pub price: f64,
    pub size: f64,
}

/// A normalized depth update, the output of `m1_ingestion::normalize_depth_update`.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthUpdate {
    pub timestamp: f64,
    pub symbol: String,
    pub bids: Vec<DepthLevel>,
    pub asks: Vec<DepthLevel>,
}

/// The discriminated event variant M1 produces and M5 routes into M2/M3.
#[derive(Debug, Clone, PartialEq)]
pub enum CanonicalEvent {
    Trade(Trade),
    Liquidation(Liquidation),
    Depth(DepthUpdate),
}

/// The event kind named in an `ingest` call, before normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Trade,
    Liquidation,
    Depth,
}

/// A side-agnostic direction, used by several primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Up,
    Down,
}

// ---------------------------------------------------------------------------
// M4 primitive catalog - immutable, purely descriptive. None of these fields
// may ever name strength, confidence, support, resistance, or signal.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ZonePenetration {
    pub price: f64,
    pub depth_into_zone: f64,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DisplacementOriginAnchor {
    pub anchor_price: f64,
    pub dwell_duration: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceTraversalVelocity {
    pub start_price: f64,
    pub end_price: f64,
    pub duration: f64,
    pub velocity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TraversalCompactness {
    pub net_displacement: f64,
    pub total_path_length: f64,
    pub ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CentralTendencyDeviation {
    pub reference_price: f64,
    pub central_price: f64,
    pub deviation: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StructuralAbsenceDuration {
    pub absence_duration: f64,
    pub observation_window: f64,
    pub absence_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraversalVoidSpan {
    pub max_void_duration: f64,
    pub void_intervals: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EventNonOccurrenceCounter {
    pub expected_count: u64,
    pub observed_count: u64,
    pub non_occurrence_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RestingSizeAtPrice {
    pub price: f64,
    pub size_bid: f64,
    pub size_ask: f64,
    pub timestamp: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OrderConsumption {
    pub price: f64,
    pub initial_size: f64,
    pub consumed_size: f64,
    pub remaining_size: f64,
    pub duration: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AbsorptionEvent {
    pub price: f64,
    pub consumed_size: f64,
    pub duration: f64,
    pub trade_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RefillEvent {
    pub price: f64,
    pub refill_size: f64,
    pub duration: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LiquidationDensity {
    pub price_center: f64,
    pub total_volume: f64,
    pub liquidation_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DirectionalContinuity {
    pub consecutive_count: u64,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TradeBurst {
    pub count: u64,
    pub window_duration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuralPersistenceDuration {
    pub total_persistence_duration: f64,
    pub presence_intervals: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceAcceptanceRatio {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub body_ratio: f64,
}

/// One optional slot per primitive in the catalog. Absent (`None`) means
/// insufficient data, never an error.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PrimitiveBundle {
    pub zone_penetration: Option<ZonePenetration>,
    pub displacement_origin_anchor: Option<DisplacementOriginAnchor>,
    pub price_traversal_velocity: Option<PriceTraversalVelocity>,
    pub traversal_compactness: Option<TraversalCompactness>,
    pub central_tendency_deviation: Option<CentralTendencyDeviation>,
    pub structural_absence_duration: Option<StructuralAbsenceDuration>,
    pub traversal_void_span: Option<TraversalVoidSpan>,
    pub event_non_occurrence_counter: Option<EventNonOccurrenceCounter>,
    pub resting_size_at_price: Option<RestingSizeAtPrice>,
    pub order_consumption: Option<OrderConsumption>,
    pub absorption_event: Option<AbsorptionEvent>,
    pub refill_event: Option<RefillEvent>,
    pub liquidation_density: Option<LiquidationDensity>,
    pub directional_continuity: Option<DirectionalContinuity>,
    pub trade_burst: Option<TradeBurst>,
    pub structural_persistence_duration: Option<StructuralPersistenceDuration>,
    pub price_acceptance_ratio: Option<PriceAcceptanceRatio>,
}

/// Deliberately narrow: there is no "OK" member. Absence of these two is the
/// ambient healthy condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ObservationStatus {
    Uninitialized,
    Failed,
}

/// The sole outward view of the system at a moment in time.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub status: ObservationStatus,
    pub timestamp: f64,
    pub symbols_active: Vec<String>,
    pub primitives: HashMap<String, PrimitiveBundle>,
}
