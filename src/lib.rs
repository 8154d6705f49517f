//! Constitutional observation substrate - library entrypoint.
//!
//! Exposes the M1->M5 observation pipeline (`core`). Everything a host
//! application needs - `System`, the canonical event types, and the
//! `Snapshot`/`PrimitiveBundle` output shape - is re-exported at the crate
//! root.

pub mod core;

pub use crate::core::{
    CanonicalEvent, Config, ContinuityStore, Direction, EventKind, HaltReason,
    IngestionStats, IngestionStatsSnapshot, MemoryNode, NodeState, ObservationStatus,
    PresenceInterval, PrimitiveBundle, Side, Snapshot, SymbolConfig, System, TemporalStore,
};
