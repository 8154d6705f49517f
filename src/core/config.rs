//! Ambient configuration - the allow-list and windowing knobs the host
//! process loads before constructing a `System`. Grounded on the teacher's
//! `models::Config::from_env` (`dotenv` + `std::env::var` + `unwrap_or_else`
//! defaults); this crate reads no other configuration surface.

use super::constants::{DEFAULT_NODE_BAND, DEFAULT_TICK_SIZE};

/// Construction-time configuration for a `System`.
#[derive(Debug, Clone)]
pub struct Config {
    /// Symbols the system will observe; all others are silently discarded.
    pub symbol_allowlist: Vec<String>,
    /// Default node band half-width for symbols without a per-symbol override.
    pub default_band: f64,
    /// Default tick size, feeds the AbsorptionEvent stability bound.
    pub default_tick_size: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            symbol_allowlist: Vec::new(),
            default_band: DEFAULT_NODE_BAND,
            default_tick_size: DEFAULT_TICK_SIZE,
        }
    }
}

impl Config {
    /// Load from the process environment (with a `.env` file, if present).
    /// `OBS_SYMBOL_ALLOWLIST` is a comma-separated list, e.g. `BTC,ETH`.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let symbol_allowlist = std::env::var("OBS_SYMBOL_ALLOWLIST")
            .unwrap_or_else(|_| "BTC,ETH".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let default_band = std::env::var("OBS_DEFAULT_BAND")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_NODE_BAND);

        let default_tick_size = std::env::var("OBS_DEFAULT_TICK_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TICK_SIZE);

        anyhow::ensure!(!symbol_allowlist.is_empty(), "OBS_SYMBOL_ALLOWLIST must not be empty");

        Ok(Self {
            symbol_allowlist,
            default_band,
            default_tick_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_windowing() {
        let config = Config::default();
        assert!(config.default_band > 0.0);
        assert!(config.default_tick_size > 0.0);
    }
}
