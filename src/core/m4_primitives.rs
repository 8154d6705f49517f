//! M4 Primitive Computation - pure, referentially-transparent functions over
//! M2 (`ContinuityStore`) and M3 (`TemporalStore`) state. No mutation, no
//! side effects, no logging, no randomness. Any function may return `None`
//! when its inputs are insufficient; that is never an error.

use super::constants::*;
use super::m2_continuity::ContinuityStore;
use super::m3_temporal::TemporalStore;
use super::types::*;

/// #1 ZonePenetration - locate the node whose band the current price falls
/// within, and how deep past the edge it has penetrated.
pub fn zone_penetration(
    continuity: &ContinuityStore,
    temporal: &TemporalStore,
    symbol: &str,
) -> Option<ZonePenetration> {
    let price = temporal.get_most_recent_price(symbol)?;
    let node = continuity
        .active_nodes(symbol)
        .into_iter()
        .find(|n| n.overlaps(price))?;
    let offset = price - node.price_center;
    let direction = if offset >= 0.0 { Direction::Up } else { Direction::Down };
    let depth_into_zone = offset.abs();
    Some(ZonePenetration {
        price,
        depth_into_zone,
        direction,
    })
}

/// #2 DisplacementOriginAnchor - the node nearest the current price anchors
/// the traversal; dwell_duration is how long it has existed.
pub fn displacement_origin_anchor(
    continuity: &ContinuityStore,
    temporal: &TemporalStore,
    symbol: &str,
    now: f64,
) -> Option<DisplacementOriginAnchor> {
    let price = temporal.get_most_recent_price(symbol)?;
    let node = continuity.nearest_active_to_price(symbol, price)?;
    Some(DisplacementOriginAnchor {
        anchor_price: node.price_center,
        dwell_duration: (now - node.created_ts).max(0.0),
    })
}

/// #3 PriceTraversalVelocity - `None` if fewer than 2 samples or `duration == 0`.
pub fn price_traversal_velocity(
    temporal: &TemporalStore,
    symbol: &str,
) -> Option<PriceTraversalVelocity> {
    let samples = temporal.get_recent_prices(symbol, None);
    let first = samples.first()?;
    let last = samples.last()?;
    if samples.len() < 2 {
        return None;
    }
    let duration = last.timestamp - first.timestamp;
    if duration == 0.0 {
        return None;
    }
    Some(PriceTraversalVelocity {
        start_price: first.price,
        end_price: last.price,
        duration,
        velocity: (last.price - first.price) / duration,
    })
}

/// #4 TraversalCompactness - `None` if fewer than 2 samples or path length is 0.
pub fn traversal_compactness(
    temporal: &TemporalStore,
    symbol: &str,
) -> Option<TraversalCompactness> {
    let samples = temporal.get_recent_prices(symbol, None);
    if samples.len() < 2 {
        return None;
    }
    let net_displacement = (samples.last().unwrap().price - samples.first().unwrap().price).abs();
    let total_path_length: f64 = samples
        .windows(2)
        .map(|w| (w[1].price - w[0].price).abs())
        .sum();
    if total_path_length <= 0.0 {
        return None;
    }
    Some(TraversalCompactness {
        net_displacement,
        total_path_length,
        ratio: net_displacement / total_path_length,
    })
}

/// #5 CentralTendencyDeviation - strength-weighted mean of ACTIVE node
/// centers vs. the current price.
pub fn central_tendency_deviation(
    continuity: &ContinuityStore,
    temporal: &TemporalStore,
    symbol: &str,
) -> Option<CentralTendencyDeviation> {
    let price = temporal.get_most_recent_price(symbol)?;
    let active = continuity.active_nodes(symbol);
    if active.is_empty() {
        return None;
    }
    let weight_sum: f64 = active.iter().map(|n| n.strength()).sum();
    if weight_sum <= 0.0 {
        return None;
    }
    let central_price: f64 = active
        .iter()
        .map(|n| n.price_center * n.strength())
        .sum::<f64>()
        / weight_sum;
    Some(CentralTendencyDeviation {
        reference_price: price,
        central_price,
        deviation: price - central_price,
    })
}

/// #6 StructuralAbsenceDuration - the longest idle node in the symbol.
pub fn structural_absence_duration(
    continuity: &ContinuityStore,
    symbol: &str,
    now: f64,
) -> Option<StructuralAbsenceDuration> {
    let nodes = continuity.nodes(symbol);
    if nodes.is_empty() {
        return None;
    }
    let absence_duration = nodes
        .iter()
        .map(|n| (now - n.last_interaction_ts).max(0.0))
        .fold(0.0_f64, f64::max);
    let observation_window = M3_MAX_AGE_SECS;
    let absence_ratio = (absence_duration / observation_window).min(1.0);
    Some(StructuralAbsenceDuration {
        absence_duration,
        observation_window,
        absence_ratio,
    })
}

/// #7 TraversalVoidSpan - gaps between consecutive samples exceeding
/// `VOID_GAP_THRESHOLD_SECS`. `None` with fewer than 2 samples.
pub fn traversal_void_span(temporal: &TemporalStore, symbol: &str) -> Option<TraversalVoidSpan> {
    let samples = temporal.get_recent_prices(symbol, None);
    if samples.len() < 2 {
        return None;
    }
    let void_intervals: Vec<f64> = samples
        .windows(2)
        .map(|w| w[1].timestamp - w[0].timestamp)
        .filter(|&gap| gap > VOID_GAP_THRESHOLD_SECS)
        .collect();
    let max_void_duration = void_intervals.iter().copied().fold(0.0_f64, f64::max);
    Some(TraversalVoidSpan {
        max_void_duration,
        void_intervals,
    })
}

/// #8 EventNonOccurrenceCounter - compares trade counts in the older vs.
/// more recent half of the retained window. `None` with fewer than 4 trades.
pub fn event_non_occurrence_counter(
    temporal: &TemporalStore,
    symbol: &str,
    now: f64,
) -> Option<EventNonOccurrenceCounter> {
    let timestamps = temporal.recent_trade_timestamps(symbol);
    if timestamps.len() < 4 {
        return None;
    }
    let earliest = *timestamps.first().unwrap();
    let midpoint = (earliest + now) / 2.0;
    let observed_count = timestamps.iter().filter(|&&t| t >= midpoint).count() as u64;
    let expected_count = timestamps.iter().filter(|&&t| t < midpoint).count() as u64;
    let non_occurrence_count = expected_count.saturating_sub(observed_count);
    Some(EventNonOccurrenceCounter {
        expected_count,
        observed_count,
        non_occurrence_count,
    })
}

/// #9 RestingSizeAtPrice - the ACTIVE node nearest the current price.
pub fn resting_size_at_price(
    continuity: &ContinuityStore,
    temporal: &TemporalStore,
    symbol: &str,
) -> Option<RestingSizeAtPrice> {
    let price = temporal.get_most_recent_price(symbol)?;
    let node = continuity.nearest_active_to_price(symbol, price)?;
    Some(RestingSizeAtPrice {
        price: node.price_center,
        size_bid: node.resting_size_bid,
        size_ask: node.resting_size_ask,
        timestamp: node.last_orderbook_update_ts,
    })
}

fn side_consumption(prev: f64, curr: f64) -> Option<(f64, f64)> {
    if prev > curr {
        Some((prev, prev - curr))
    } else {
        None
    }
}

/// The node most recently touched by a real depth update, across the whole
/// symbol. `last_orderbook_update_ts` is seeded to a node's creation time,
/// not a sentinel, so a node with no order-book activity yet must be
/// excluded here rather than compared on that timestamp alone - otherwise a
/// node created after another node's genuine OB update would look more
/// recent and mask the real event.
fn most_recently_ob_updated_node<'a>(
    continuity: &'a ContinuityStore,
    symbol: &str,
) -> Option<&'a super::m2_continuity::MemoryNode> {
    continuity
        .nodes(symbol)
        .iter()
        .filter(|n| n.has_orderbook_activity)
        .max_by(|a, b| {
            a.last_orderbook_update_ts
                .partial_cmp(&b.last_orderbook_update_ts)
                .unwrap()
        })
}

/// #10 OrderConsumption - the most-recently-updated OB node; whichever side
/// shows a positive size reduction (larger reduction wins if both did).
pub fn order_consumption(continuity: &ContinuityStore, symbol: &str) -> Option<OrderConsumption> {
    let node = most_recently_ob_updated_node(continuity, symbol)?;
    let bid = side_consumption(node.previous_resting_size_bid, node.resting_size_bid);
    let ask = side_consumption(node.previous_resting_size_ask, node.resting_size_ask);
    let (initial_size, consumed_size, remaining_size) = match (bid, ask) {
        (Some((_, cb)), Some((pa, ca))) if ca > cb => (pa, ca, node.resting_size_ask),
        (Some((pb, cb)), _) => (pb, cb, node.resting_size_bid),
        (None, Some((pa, ca))) => (pa, ca, node.resting_size_ask),
        (None, None) => return None,
    };
    let duration = (node.last_orderbook_update_ts - node.previous_orderbook_update_ts).max(0.0);
    Some(OrderConsumption {
        price: node.price_center,
        initial_size,
        consumed_size,
        remaining_size,
        duration,
    })
}

/// #11 AbsorptionEvent - a non-trivial consumption while the recent price
/// range stays within the stability bound.
pub fn absorption_event(
    continuity: &ContinuityStore,
    temporal: &TemporalStore,
    symbol: &str,
    tick_size: f64,
) -> Option<AbsorptionEvent> {
    let consumption = order_consumption(continuity, symbol)?;
    if consumption.consumed_size <= 0.0 {
        return None;
    }
    let samples = temporal.get_recent_prices(symbol, None);
    if samples.len() < 2 {
        return None;
    }
    let range = samples
        .iter()
        .map(|s| s.price)
        .fold(f64::MIN, f64::max)
        - samples.iter().map(|s| s.price).fold(f64::MAX, f64::min);
    if range > ABSORPTION_STABILITY_TICKS * tick_size {
        return None;
    }
    let node = most_recently_ob_updated_node(continuity, symbol)?;
    Some(AbsorptionEvent {
        price: consumption.price,
        consumed_size: consumption.consumed_size,
        duration: consumption.duration,
        trade_count: node.trade_count_since_last_ob_update,
    })
}

/// #12 RefillEvent - size increased after a previous non-zero value.
pub fn refill_event(continuity: &ContinuityStore, symbol: &str) -> Option<RefillEvent> {
    let node = most_recently_ob_updated_node(continuity, symbol)?;
    let duration = (node.last_orderbook_update_ts - node.previous_orderbook_update_ts).max(0.0);
    let bid_refill = if node.previous_resting_size_bid > 0.0
        && node.resting_size_bid > node.previous_resting_size_bid
    {
        Some(node.resting_size_bid - node.previous_resting_size_bid)
    } else {
        None
    };
    let ask_refill = if node.previous_resting_size_ask > 0.0
        && node.resting_size_ask > node.previous_resting_size_ask
    {
        Some(node.resting_size_ask - node.previous_resting_size_ask)
    } else {
        None
    };
    let refill_size = match (bid_refill, ask_refill) {
        (Some(b), Some(a)) => b.max(a),
        (Some(b), None) => b,
        (None, Some(a)) => a,
        (None, None) => return None,
    };
    Some(RefillEvent {
        price: node.price_center,
        refill_size,
        duration,
    })
}

/// #13 LiquidationDensity - the node nearest the current price.
pub fn liquidation_density(
    continuity: &ContinuityStore,
    temporal: &TemporalStore,
    symbol: &str,
) -> Option<LiquidationDensity> {
    let price = temporal.get_most_recent_price(symbol)?;
    let node = continuity.nearest_to_price(symbol, price)?;
    if node.liquidation_count == 0 {
        return None;
    }
    Some(LiquidationDensity {
        price_center: node.price_center,
        total_volume: node.liquidation_volume,
        liquidation_count: node.liquidation_count,
    })
}

/// #14 DirectionalContinuity - longest tail run of same-sign deltas ending
/// at the most recent sample.
pub fn directional_continuity(
    temporal: &TemporalStore,
    symbol: &str,
) -> Option<DirectionalContinuity> {
    let samples = temporal.get_recent_prices(symbol, None);
    if samples.len() < 2 {
        return None;
    }
    let deltas: Vec<f64> = samples
        .windows(2)
        .map(|w| w[1].price - w[0].price)
        .filter(|d| *d != 0.0)
        .collect();
    let last_sign = *deltas.last()?;
    let direction = if last_sign > 0.0 {
        Direction::Up
    } else {
        Direction::Down
    };
    let mut consecutive_count = 0u64;
    for delta in deltas.iter().rev() {
        if (*delta > 0.0) == (last_sign > 0.0) {
            consecutive_count += 1;
        } else {
            break;
        }
    }
    Some(DirectionalContinuity {
        consecutive_count,
        direction,
    })
}

/// #15 TradeBurst - maximum trades observed in any `TRADE_BURST_WINDOW_SECS`
/// bucket over the retained window.
pub fn trade_burst(temporal: &TemporalStore, symbol: &str) -> Option<TradeBurst> {
    let timestamps = temporal.recent_trade_timestamps(symbol);
    if timestamps.is_empty() {
        return None;
    }
    let earliest = *timestamps.first().unwrap();
    let latest = *timestamps.last().unwrap();
    let mut max_count = 0u64;
    let mut bucket_start = earliest;
    while bucket_start <= latest {
        let bucket_end = bucket_start + TRADE_BURST_WINDOW_SECS;
        let count = timestamps
            .iter()
            .filter(|&&t| t >= bucket_start && t < bucket_end)
            .count() as u64;
        max_count = max_count.max(count);
        bucket_start += TRADE_BURST_WINDOW_SECS;
    }
    Some(TradeBurst {
        count: max_count,
        window_duration: TRADE_BURST_WINDOW_SECS,
    })
}

/// #16 StructuralPersistenceDuration - sum of ACTIVE-state presence
/// intervals for the node nearest the current price.
pub fn structural_persistence_duration(
    continuity: &ContinuityStore,
    temporal: &TemporalStore,
    symbol: &str,
    now: f64,
) -> Option<StructuralPersistenceDuration> {
    let price = temporal.get_most_recent_price(symbol)?;
    let node = continuity.nearest_to_price(symbol, price)?;
    if node.presence_log.is_empty() {
        return None;
    }
    let presence_intervals: Vec<(f64, f64)> = node
        .presence_log
        .iter()
        .map(|iv| (iv.enter_ts, iv.exit_ts.unwrap_or(now)))
        .collect();
    let total_persistence_duration = presence_intervals.iter().map(|(a, b)| b - a).sum();
    Some(StructuralPersistenceDuration {
        total_persistence_duration,
        presence_intervals,
    })
}

/// #17 PriceAcceptanceRatio - from the most recent *closed* 1s candle.
pub fn price_acceptance_ratio(
    temporal: &TemporalStore,
    symbol: &str,
) -> Option<PriceAcceptanceRatio> {
    let candle = temporal.last_closed_candle(symbol)?;
    let range = candle.high - candle.low;
    if range <= 0.0 {
        return None;
    }
    Some(PriceAcceptanceRatio {
        open: candle.open,
        high: candle.high,
        low: candle.low,
        close: candle.close,
        body_ratio: (candle.close - candle.open).abs() / range,
    })
}

/// Compute every primitive for one symbol. Used by M5 to assemble a
/// `PrimitiveBundle` per allowed symbol.
pub fn compute_bundle(
    continuity: &ContinuityStore,
    temporal: &TemporalStore,
    symbol: &str,
    now: f64,
    tick_size: f64,
) -> PrimitiveBundle {
    PrimitiveBundle {
        zone_penetration: zone_penetration(continuity, temporal, symbol),
        displacement_origin_anchor: displacement_origin_anchor(continuity, temporal, symbol, now),
        price_traversal_velocity: price_traversal_velocity(temporal, symbol),
        traversal_compactness: traversal_compactness(temporal, symbol),
        central_tendency_deviation: central_tendency_deviation(continuity, temporal, symbol),
        structural_absence_duration: structural_absence_duration(continuity, symbol, now),
        traversal_void_span: traversal_void_span(temporal, symbol),
        event_non_occurrence_counter: event_non_occurrence_counter(temporal, symbol, now),
        resting_size_at_price: resting_size_at_price(continuity, temporal, symbol),
        order_consumption: order_consumption(continuity, symbol),
        absorption_event: absorption_event(continuity, temporal, symbol, tick_size),
        refill_event: refill_event(continuity, symbol),
        liquidation_density: liquidation_density(continuity, temporal, symbol),
        directional_continuity: directional_continuity(temporal, symbol),
        trade_burst: trade_burst(temporal, symbol),
        structural_persistence_duration: structural_persistence_duration(
            continuity, temporal, symbol, now,
        ),
        price_acceptance_ratio: price_acceptance_ratio(temporal, symbol),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::m2_continuity::ContinuityStore;
    use super::super::m3_temporal::{SampleSource, TemporalStore};

    #[test]
    fn velocity_and_compactness_need_two_samples() {
        let mut temporal = TemporalStore::new();
        temporal.push("BTC", 0.0, 49900.0, SampleSource::Trade);
        assert!(price_traversal_velocity(&temporal, "BTC").is_none());
        temporal.push("BTC", 1.0, 50050.0, SampleSource::Trade);
        temporal.push("BTC", 2.0, 50100.0, SampleSource::Trade);

        let velocity = price_traversal_velocity(&temporal, "BTC").unwrap();
        assert_eq!(velocity.velocity, 100.0);

        let compactness = traversal_compactness(&temporal, "BTC").unwrap();
        assert_eq!(compactness.net_displacement, 200.0);
        assert_eq!(compactness.total_path_length, 200.0);
        assert_eq!(compactness.ratio, 1.0);

        let continuity_dir = directional_continuity(&temporal, "BTC").unwrap();
        assert_eq!(continuity_dir.consecutive_count, 2);
        assert_eq!(continuity_dir.direction, Direction::Up);
    }

    #[test]
    fn no_nodes_means_all_node_primitives_none() {
        let continuity = ContinuityStore::new();
        let temporal = TemporalStore::new();
        assert!(zone_penetration(&continuity, &temporal, "BTC").is_none());
        assert!(liquidation_density(&continuity, &temporal, "BTC").is_none());
        assert!(structural_absence_duration(&continuity, "BTC", 0.0).is_none());
    }

    #[test]
    fn order_consumption_reduction_detected() {
        let mut continuity = ContinuityStore::new();
        continuity.on_liquidation("BTC", 1000.0, 50000.0, 1.0, Side::Buy, 5.0);
        continuity.on_depth_level("BTC", 1001.0, 50000.0, 10.0, true);
        continuity.on_depth_level("BTC", 1002.0, 50000.0, 3.0, true);
        let consumption = order_consumption(&continuity, "BTC").unwrap();
        assert_eq!(consumption.consumed_size, 7.0);
        assert_eq!(consumption.remaining_size, 3.0);
    }

    #[test]
    fn absorption_requires_stable_prices() {
        let mut continuity = ContinuityStore::new();
        let mut temporal = TemporalStore::new();
        continuity.on_liquidation("BTC", 1000.0, 50000.0, 1.0, Side::Buy, 5.0);
        continuity.on_depth_level("BTC", 1001.0, 50000.0, 10.0, true);
        continuity.on_depth_level("BTC", 1002.0, 50000.0, 3.0, true);
        temporal.push("BTC", 1001.0, 50000.0, SampleSource::Trade);
        temporal.push("BTC", 1002.0, 50000.1, SampleSource::Trade);
        let event = absorption_event(&continuity, &temporal, "BTC", 0.5).unwrap();
        assert_eq!(event.consumed_size, 7.0);
    }

    #[test]
    fn refill_after_depletion_is_detected() {
        let mut continuity = ContinuityStore::new();
        continuity.on_liquidation("BTC", 1000.0, 50000.0, 1.0, Side::Buy, 5.0);
        continuity.on_depth_level("BTC", 1001.0, 50000.0, 5.0, true);
        continuity.on_depth_level("BTC", 1002.0, 50000.0, 12.0, true);
        let refill = refill_event(&continuity, "BTC").unwrap();
        assert_eq!(refill.refill_size, 7.0);
    }

    #[test]
    fn size_prev_zero_produces_no_consumption() {
        let mut continuity = ContinuityStore::new();
        continuity.on_liquidation("BTC", 1000.0, 50000.0, 1.0, Side::Buy, 5.0);
        continuity.on_depth_level("BTC", 1001.0, 50000.0, 0.0, true);
        assert!(order_consumption(&continuity, "BTC").is_none());
    }

    /// A node created after another node's real OB update must not be
    /// selected as "the most-recently-updated OB node" just because its
    /// creation timestamp is newer - it has no order-book activity at all.
    #[test]
    fn node_with_no_orderbook_activity_does_not_mask_an_earlier_real_update() {
        let mut continuity = ContinuityStore::new();
        // Node A: real depth update at t=1002 (consumption 10 -> 3).
        continuity.on_liquidation("BTC", 1000.0, 50000.0, 1.0, Side::Buy, 5.0);
        continuity.on_depth_level("BTC", 1001.0, 50000.0, 10.0, true);
        continuity.on_depth_level("BTC", 1002.0, 50000.0, 3.0, true);
        // Node B: created later at a different price, no OB activity yet.
        continuity.on_liquidation("BTC", 1003.0, 50200.0, 1.0, Side::Sell, 5.0);

        let consumption = order_consumption(&continuity, "BTC").unwrap();
        assert_eq!(consumption.price, 50000.0);
        assert_eq!(consumption.consumed_size, 7.0);

        let refill = refill_event(&continuity, "BTC");
        assert!(refill.is_none());
    }

    #[test]
    fn acceptance_ratio_needs_closed_candle() {
        let mut temporal = TemporalStore::new();
        temporal.push("BTC", 0.1, 100.0, SampleSource::Trade);
        assert!(price_acceptance_ratio(&temporal, "BTC").is_none());
        temporal.push("BTC", 0.5, 102.0, SampleSource::Trade);
        temporal.push("BTC", 1.1, 99.0, SampleSource::Trade);
        let ratio = price_acceptance_ratio(&temporal, "BTC").unwrap();
        assert_eq!(ratio.open, 100.0);
        assert_eq!(ratio.high, 102.0);
    }
}
