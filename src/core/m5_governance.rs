//! M5 Governance - owns M1/M2/M3, dispatches ingestion, assembles
//! snapshots, enforces symbol partitioning, time monotonicity, and the
//! permanent halt.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use super::constants::DEFAULT_NODE_BAND;
use super::m1_ingestion::{normalize, IngestionStats, IngestionStatsSnapshot};
use super::m2_continuity::ContinuityStore;
use super::m3_temporal::{SampleSource, TemporalStore};
use super::m4_primitives::compute_bundle;
use super::types::{CanonicalEvent, EventKind, ObservationStatus, Snapshot};

/// Why the system halted. Never crosses the `Snapshot` boundary - operator
/// diagnostics only, the same role the teacher's stats snapshots play.
#[derive(Debug, Clone, PartialEq)]
pub enum HaltReason {
    TimeRegression { attempted: f64, system_time: f64 },
    PerSymbolTimeRegression { symbol: String, attempted: f64, last: f64 },
}

/// Per-symbol tuning. `band` is the half-width new nodes are created with;
/// `tick_size` feeds AbsorptionEvent's stability bound.
#[derive(Debug, Clone, Copy)]
pub struct SymbolConfig {
    pub band: f64,
    pub tick_size: f64,
}

impl Default for SymbolConfig {
    fn default() -> Self {
        Self {
            band: DEFAULT_NODE_BAND,
            tick_size: super::constants::DEFAULT_TICK_SIZE,
        }
    }
}

/// Owns M1/M2/M3 state for the whole run. Single-threaded, cooperative:
/// every public method is synchronous, and callers are responsible for
/// serializing calls (see concurrency model in the governance spec).
pub struct System {
    allowlist: HashSet<String>,
    symbol_configs: HashMap<String, SymbolConfig>,
    continuity: ContinuityStore,
    temporal: TemporalStore,
    ingestion_stats: IngestionStats,
    system_time: f64,
    halted: bool,
    halt_reason: Option<HaltReason>,
}

impl System {
    /// Construct a new system. Rejects an empty allow-list - a system that
    /// can never observe anything is a configuration error, not a runtime
    /// state.
    pub fn new<I, S>(symbol_allowlist: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let allowlist: HashSet<String> = symbol_allowlist.into_iter().map(Into::into).collect();
        anyhow::ensure!(!allowlist.is_empty(), "symbol allow-list must not be empty");
        let symbol_configs = allowlist
            .iter()
            .map(|s| (s.clone(), SymbolConfig::default()))
            .collect();
        Ok(Self {
            allowlist,
            symbol_configs,
            continuity: ContinuityStore::new(),
            temporal: TemporalStore::new(),
            ingestion_stats: IngestionStats::default(),
            system_time: 0.0,
            halted: false,
            halt_reason: None,
        })
    }

    /// Construct from a loaded `Config`, applying its default band/tick
    /// size to every allow-listed symbol.
    pub fn from_config(config: &super::config::Config) -> anyhow::Result<Self> {
        let mut system = Self::new(config.symbol_allowlist.clone())?;
        let symbol_config = SymbolConfig {
            band: config.default_band,
            tick_size: config.default_tick_size,
        };
        for symbol in &config.symbol_allowlist {
            system.configure_symbol(symbol, symbol_config);
        }
        Ok(system)
    }

    /// Override the default band/tick-size for one allow-listed symbol.
    pub fn configure_symbol(&mut self, symbol: &str, config: SymbolConfig) {
        if self.allowlist.contains(symbol) {
            self.symbol_configs.insert(symbol.to_string(), config);
        }
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn halt_reason(&self) -> Option<&HaltReason> {
        self.halt_reason.as_ref()
    }

    pub fn ingestion_stats(&self) -> IngestionStatsSnapshot {
        self.ingestion_stats.snapshot()
    }

    fn halt(&mut self, reason: HaltReason) {
        tracing::error!(?reason, "observation system halted");
        self.halted = true;
        self.halt_reason = Some(reason);
    }

    /// Route a raw payload through M1, then M2/M3, then advance the clock
    /// and run decay/lifecycle on every symbol.
    ///
    /// - symbol outside the allow-list: silently dropped.
    /// - already halted: silently dropped (callers must read `is_halted`).
    /// - `timestamp < system_time`: transitions to FAILED and halts.
    pub fn ingest(&mut self, timestamp: f64, symbol: &str, event_type: EventKind, payload: &Value) {
        if self.halted {
            return;
        }
        if !self.allowlist.contains(symbol) {
            return;
        }
        if timestamp < self.system_time {
            self.halt(HaltReason::TimeRegression {
                attempted: timestamp,
                system_time: self.system_time,
            });
            return;
        }
        if !self.temporal.is_monotonic(symbol, timestamp) {
            self.halt(HaltReason::PerSymbolTimeRegression {
                symbol: symbol.to_string(),
                attempted: timestamp,
                last: self.system_time,
            });
            return;
        }

        if let Some(event) = normalize(&self.ingestion_stats, event_type, symbol, payload) {
            self.apply_event(timestamp, symbol, event);
        }

        self.advance_clock(timestamp);
    }

    /// Advance the global clock without ingestion: same monotonicity rule,
    /// runs decay/lifecycle on every symbol.
    pub fn advance_time(&mut self, timestamp: f64) {
        if self.halted {
            return;
        }
        if timestamp < self.system_time {
            self.halt(HaltReason::TimeRegression {
                attempted: timestamp,
                system_time: self.system_time,
            });
            return;
        }
        self.advance_clock(timestamp);
    }

    fn advance_clock(&mut self, timestamp: f64) {
        self.system_time = self.system_time.max(timestamp);
        self.continuity.decay_and_transition_all(self.system_time);
    }

    fn apply_event(&mut self, timestamp: f64, symbol: &str, event: CanonicalEvent) {
        let band = self
            .symbol_configs
            .get(symbol)
            .map(|c| c.band)
            .unwrap_or(DEFAULT_NODE_BAND);

        match event {
            CanonicalEvent::Liquidation(liq) => {
                self.continuity
                    .on_liquidation(symbol, timestamp, liq.price, liq.quantity, liq.side, band);
                self.temporal
                    .push(symbol, timestamp, liq.price, SampleSource::Liquidation);
            }
            CanonicalEvent::Trade(trade) => {
                self.continuity
                    .on_trade(symbol, timestamp, trade.price, trade.quantity, trade.aggressor_side);
                self.temporal
                    .push(symbol, timestamp, trade.price, SampleSource::Trade);
            }
            CanonicalEvent::Depth(depth) => {
                for level in &depth.bids {
                    self.continuity
                        .on_depth_level(symbol, timestamp, level.price, level.size, true);
                }
                for level in &depth.asks {
                    self.continuity
                        .on_depth_level(symbol, timestamp, level.price, level.size, false);
                }
            }
        }
    }

    /// Assemble a snapshot: one bundle per allow-listed symbol. Never
    /// mutates M2/M3.
    pub fn query(&self) -> Snapshot {
        let status = if self.halted {
            ObservationStatus::Failed
        } else {
            ObservationStatus::Uninitialized
        };

        let mut symbols_active: Vec<String> = self.allowlist.iter().cloned().collect();
        symbols_active.sort();

        let mut primitives = HashMap::new();
        for symbol in &symbols_active {
            let tick_size = self
                .symbol_configs
                .get(symbol)
                .map(|c| c.tick_size)
                .unwrap_or(super::constants::DEFAULT_TICK_SIZE);
            let bundle = compute_bundle(&self.continuity, &self.temporal, symbol, self.system_time, tick_size);
            primitives.insert(symbol.clone(), bundle);
        }

        Snapshot {
            status,
            timestamp: self.system_time,
            symbols_active,
            primitives,
        }
    }
}
