//! The M1->M5 observation pipeline: ingest raw exchange events, maintain an
//! internal continuity memory, and expose only structural primitives across
//! the `Snapshot` boundary. See each submodule for its slice of the design.

pub mod config;
pub mod constants;
pub mod m1_ingestion;
pub mod m2_continuity;
pub mod m3_temporal;
pub mod m4_primitives;
pub mod m5_governance;
pub mod types;

pub use config::Config;
pub use m1_ingestion::{IngestionStats, IngestionStatsSnapshot};
pub use m2_continuity::{ContinuityStore, MemoryNode, NodeState, PresenceInterval};
pub use m3_temporal::{Candle, PriceSample, SampleSource, TemporalStore};
pub use m5_governance::{HaltReason, SymbolConfig, System};
pub use types::*;
