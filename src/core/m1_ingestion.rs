//! M1 Ingestion - translate exchange-shaped raw payloads into canonical
//! events. Pure field extraction: no filtering, no ordering, no state.

use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};

use super::types::{CanonicalEvent, DepthLevel, DepthUpdate, Liquidation, Side, Trade};

/// Error counters for malformed payloads, one per event kind. Never exposed
/// on the `Snapshot` boundary; an operator-facing diagnostic only, the same
/// role `EdgeReceiverStats` plays for the wire layer it is modeled on.
#[derive(Debug, Default)]
pub struct IngestionStats {
    pub trade_parse_failures: AtomicU64,
    pub liquidation_parse_failures: AtomicU64,
    pub depth_parse_failures: AtomicU64,
}

impl IngestionStats {
    pub fn snapshot(&self) -> IngestionStatsSnapshot {
        IngestionStatsSnapshot {
            trade_parse_failures: self.trade_parse_failures.load(Ordering::Relaxed),
            liquidation_parse_failures: self.liquidation_parse_failures.load(Ordering::Relaxed),
            depth_parse_failures: self.depth_parse_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IngestionStatsSnapshot {
    pub trade_parse_failures: u64,
    pub liquidation_parse_failures: u64,
    pub depth_parse_failures: u64,
}

fn parse_f64(v: &Value, field: &str) -> Option<f64> {
    match v.get(field)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }
}

fn parse_side(v: &Value, field: &str) -> Option<Side> {
    match v.get(field)?.as_str()? {
        "BUY" | "buy" => Some(Side::Buy),
        "SELL" | "sell" => Some(Side::Sell),
        _ => None,
    }
}

/// A "buyer maker" flag inverts to a SELL aggressor: the maker was the buyer,
/// so the taker (aggressor) sold into them.
fn infer_aggressor_from_buyer_maker(v: &Value) -> Option<Side> {
    match v.get("buyer_maker")?.as_bool()? {
        true => Some(Side::Sell),
        false => Some(Side::Buy),
    }
}

/// Normalize a raw trade payload. Returns `None` on any missing or malformed
/// field; never panics, never synthesizes a field.
pub fn normalize_trade(stats: &IngestionStats, symbol: &str, payload: &Value) -> Option<Trade> {
    let result = (|| {
        let timestamp_ms = parse_f64(payload, "timestamp_ms")?;
        let price = parse_f64(payload, "price")?;
        let quantity = parse_f64(payload, "quantity")?;
        let aggressor_side = parse_side(payload, "aggressor_side")
            .or_else(|| infer_aggressor_from_buyer_maker(payload))?;
        Some(Trade {
            timestamp: timestamp_ms / 1000.0,
            symbol: symbol.to_string(),
            price,
            quantity,
            aggressor_side,
        })
    })();
    if result.is_none() {
        stats.trade_parse_failures.fetch_add(1, Ordering::Relaxed);
    }
    result
}

/// Normalize a raw liquidation payload.
pub fn normalize_liquidation(
    stats: &IngestionStats,
    symbol: &str,
    payload: &Value,
) -> Option<Liquidation> {
    let result = (|| {
        let timestamp_ms = parse_f64(payload, "timestamp_ms")?;
        let price = parse_f64(payload, "price")?;
        let quantity = parse_f64(payload, "quantity")?;
        let side = parse_side(payload, "side")?;
        Some(Liquidation {
            timestamp: timestamp_ms / 1000.0,
            symbol: symbol.to_string(),
            price,
            quantity,
            side,
        })
    })();
    if result.is_none() {
        stats
            .liquidation_parse_failures
            .fetch_add(1, Ordering::Relaxed);
    }
    result
}

fn parse_levels(v: &Value) -> Option<Vec<DepthLevel>> {
    let arr = v.as_array()?;
    let mut levels = Vec::with_capacity(arr.len());
    for level in arr {
        let pair = level.as_array()?;
        if pair.len() != 2 {
            return None;
        }
        let price = pair[0].as_f64().or_else(|| pair[0].as_str()?.parse().ok())?;
        let size = pair[1].as_f64().or_else(|| pair[1].as_str()?.parse().ok())?;
        levels.push(DepthLevel { price, size });
    }
    Some(levels)
}

/// Normalize a raw depth-update payload. `bids`/`asks` are absolute states
/// at each level; a `size == 0` level means "removed", it is not filtered
/// out here - M2 interprets removal.
pub fn normalize_depth_update(
    stats: &IngestionStats,
    symbol: &str,
    payload: &Value,
) -> Option<DepthUpdate> {
    let result = (|| {
        let timestamp_ms = parse_f64(payload, "timestamp_ms")?;
        let bids = parse_levels(payload.get("bids")?)?;
        let asks = parse_levels(payload.get("asks")?)?;
        Some(DepthUpdate {
            timestamp: timestamp_ms / 1000.0,
            symbol: symbol.to_string(),
            bids,
            asks,
        })
    })();
    if result.is_none() {
        stats.depth_parse_failures.fetch_add(1, Ordering::Relaxed);
    }
    result
}

/// Dispatch helper used by M5: normalize by kind, wrap in `CanonicalEvent`.
pub fn normalize(
    stats: &IngestionStats,
    kind: super::types::EventKind,
    symbol: &str,
    payload: &Value,
) -> Option<CanonicalEvent> {
    use super::types::EventKind;
    match kind {
        EventKind::Trade => normalize_trade(stats, symbol, payload).map(CanonicalEvent::Trade),
        EventKind::Liquidation => {
            normalize_liquidation(stats, symbol, payload).map(CanonicalEvent::Liquidation)
        }
        EventKind::Depth => {
            normalize_depth_update(stats, symbol, payload).map(CanonicalEvent::Depth)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn trade_missing_field_returns_none_and_counts() {
        let stats = IngestionStats::default();
        let payload = json!({ "timestamp_ms": 1000.0, "price": 50000.0 });
        assert!(normalize_trade(&stats, "BTC", &payload).is_none());
        assert_eq!(stats.snapshot().trade_parse_failures, 1);
    }

    #[test]
    fn trade_parses_explicit_side() {
        let stats = IngestionStats::default();
        let payload = json!({
            "timestamp_ms": 1_000_000.0,
            "price": 50000.0,
            "quantity": 5.0,
            "aggressor_side": "SELL"
        });
        let trade = normalize_trade(&stats, "BTC", &payload).unwrap();
        assert_eq!(trade.timestamp, 1000.0);
        assert_eq!(trade.aggressor_side, Side::Sell);
        assert_eq!(stats.snapshot().trade_parse_failures, 0);
    }

    #[test]
    fn trade_infers_aggressor_from_buyer_maker() {
        let stats = IngestionStats::default();
        let payload = json!({
            "timestamp_ms": 1000.0,
            "price": 1.0,
            "quantity": 1.0,
            "buyer_maker": true
        });
        let trade = normalize_trade(&stats, "BTC", &payload).unwrap();
        assert_eq!(trade.aggressor_side, Side::Sell);
    }

    #[test]
    fn liquidation_parses() {
        let stats = IngestionStats::default();
        let payload = json!({
            "timestamp_ms": 1_000_000.0,
            "price": 50000.0,
            "quantity": 100.0,
            "side": "BUY"
        });
        let liq = normalize_liquidation(&stats, "BTC", &payload).unwrap();
        assert_eq!(liq.quantity, 100.0);
        assert_eq!(liq.side, Side::Buy);
    }

    #[test]
    fn depth_update_parses_levels_and_removal() {
        let stats = IngestionStats::default();
        let payload = json!({
            "timestamp_ms": 1000.0,
            "bids": [[50000.0, 10.0], [49990.0, 0.0]],
            "asks": [[50010.0, 5.0]]
        });
        let depth = normalize_depth_update(&stats, "BTC", &payload).unwrap();
        assert_eq!(depth.bids.len(), 2);
        assert_eq!(depth.bids[1].size, 0.0);
        assert_eq!(depth.asks[0].price, 50010.0);
    }

    #[test]
    fn malformed_depth_is_dropped_not_panicking() {
        let stats = IngestionStats::default();
        let payload = json!({ "timestamp_ms": 1000.0, "bids": "not-an-array", "asks": [] });
        assert!(normalize_depth_update(&stats, "BTC", &payload).is_none());
        assert_eq!(stats.snapshot().depth_parse_failures, 1);
    }
}
