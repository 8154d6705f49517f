//! End-to-end tests against the public `System` API: the quantified
//! invariants and boundary behaviors from the governance spec's testable
//! properties section.

use observation_substrate::{EventKind, ObservationStatus, System};
use serde_json::{json, Value};

fn liquidation(ts_ms: f64, price: f64, qty: f64, side: &str) -> Value {
    json!({ "timestamp_ms": ts_ms, "price": price, "quantity": qty, "side": side })
}

fn trade(ts_ms: f64, price: f64, qty: f64, side: &str) -> Value {
    json!({ "timestamp_ms": ts_ms, "price": price, "quantity": qty, "aggressor_side": side })
}

#[test]
fn system_time_is_non_decreasing_across_ingests() {
    let mut system = System::new(["BTC"]).unwrap();
    let timestamps = [10.0, 10.0, 20.0, 25.0, 25.0];
    let mut observed = Vec::new();
    for &ts in &timestamps {
        system.ingest(ts, "BTC", EventKind::Trade, &trade(ts * 1000.0, 100.0, 1.0, "BUY"));
        observed.push(system.query().timestamp);
    }
    assert!(observed.windows(2).all(|w| w[1] >= w[0]));
    assert!(!system.is_halted());
}

#[test]
fn out_of_allowlist_symbols_never_appear_and_never_halt() {
    let mut system = System::new(["BTC"]).unwrap();
    system.ingest(1.0, "SHIB", EventKind::Liquidation, &liquidation(1000.0, 1.0, 1.0, "BUY"));
    assert!(!system.is_halted());
    let snapshot = system.query();
    assert!(!snapshot.primitives.contains_key("SHIB"));
    assert_eq!(snapshot.status, ObservationStatus::Uninitialized);
}

#[test]
fn malformed_payload_is_dropped_without_halting() {
    let mut system = System::new(["BTC"]).unwrap();
    system.ingest(1.0, "BTC", EventKind::Trade, &json!({ "price": 1.0 }));
    assert!(!system.is_halted());
    assert_eq!(system.ingestion_stats().trade_parse_failures, 1);
}

#[test]
fn every_allowlisted_symbol_has_a_bundle_in_every_snapshot() {
    let system = System::new(["BTC", "ETH", "SOL"]).unwrap();
    let snapshot = system.query();
    for symbol in &["BTC", "ETH", "SOL"] {
        assert!(snapshot.primitives.contains_key(*symbol));
    }
}

#[test]
fn repeated_advance_time_at_same_timestamp_is_idempotent() {
    let mut system = System::new(["BTC"]).unwrap();
    system.ingest(1000.0, "BTC", EventKind::Liquidation, &liquidation(1_000_000.0, 50000.0, 100.0, "BUY"));
    system.advance_time(1500.0);
    let first = format!("{:?}", system.query().primitives["BTC"].liquidation_density);
    system.advance_time(1500.0);
    let second = format!("{:?}", system.query().primitives["BTC"].liquidation_density);
    assert_eq!(first, second);
}

#[test]
fn global_time_regression_halts_and_is_permanent() {
    let mut system = System::new(["BTC", "ETH"]).unwrap();
    system.ingest(1001.0, "BTC", EventKind::Trade, &trade(1_001_000.0, 50000.0, 5.0, "SELL"));
    system.ingest(1000.5, "ETH", EventKind::Liquidation, &liquidation(1_000_500.0, 3000.0, 50.0, "SELL"));
    assert!(system.is_halted());
    assert_eq!(system.query().status, ObservationStatus::Failed);

    system.ingest(5000.0, "BTC", EventKind::Trade, &trade(5_000_000.0, 1.0, 1.0, "BUY"));
    assert_eq!(system.query().status, ObservationStatus::Failed);
}

#[test]
fn no_liquidations_yet_no_nodes_and_not_failed() {
    let system = System::new(["BTC"]).unwrap();
    let snapshot = system.query();
    assert_eq!(snapshot.status, ObservationStatus::Uninitialized);
    let bundle = &snapshot.primitives["BTC"];
    assert!(bundle.zone_penetration.is_none());
    assert!(bundle.liquidation_density.is_none());
    assert!(bundle.price_traversal_velocity.is_none());
}

/// Scanning the serialized field names of every primitive record proves the
/// epistemic boundary holds: nothing interpretive crosses it.
#[test]
fn no_primitive_carries_a_forbidden_interpretive_term() {
    let mut system = System::new(["BTC"]).unwrap();
    system.ingest(1000.0, "BTC", EventKind::Liquidation, &liquidation(1_000_000.0, 50000.0, 100.0, "BUY"));
    system.ingest(1001.0, "BTC", EventKind::Trade, &trade(1_001_000.0, 50000.0, 5.0, "SELL"));
    system.ingest(
        1002.0,
        "BTC",
        EventKind::Depth,
        &json!({ "timestamp_ms": 1_002_000.0, "bids": [[50000.0, 3.0]], "asks": [] }),
    );

    let snapshot = system.query();
    let serialized = serde_json::to_string(&snapshot).unwrap();
    for forbidden in ["strength", "confidence", "support", "resistance", "signal"] {
        assert!(
            !serialized.to_lowercase().contains(forbidden),
            "snapshot leaked forbidden term `{forbidden}`: {serialized}"
        );
    }
}
