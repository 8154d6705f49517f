//! M3 Temporal Store - per-symbol bounded, ordered price history plus a
//! 1-second candle builder (Open Question 4).

use std::collections::{HashMap, VecDeque};

use super::constants::{ACCEPTANCE_CANDLE_SECS, M3_MAX_AGE_SECS, M3_RING_CAPACITY};

/// Which kind of event produced a price sample. TradeBurst (#15) needs to
/// count trades specifically, not liquidation prints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleSource {
    Trade,
    Liquidation,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceSample {
    pub timestamp: f64,
    pub price: f64,
    pub source: SampleSource,
}

/// One OHLC candle over `[start, start + width)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candle {
    pub start: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Folds trade prints into fixed-width candles, keyed by
/// `floor(timestamp / width) * width`. Only trades build candles - depth
/// and liquidation prices are not trade prints.
#[derive(Debug)]
struct CandleBuilder {
    width: f64,
    current: Option<Candle>,
    last_closed: Option<Candle>,
}

impl CandleBuilder {
    fn new(width: f64) -> Self {
        Self {
            width,
            current: None,
            last_closed: None,
        }
    }

    fn push(&mut self, ts: f64, price: f64) {
        let bucket_start = (ts / self.width).floor() * self.width;
        match &mut self.current {
            Some(c) if c.start == bucket_start => {
                c.high = c.high.max(price);
                c.low = c.low.min(price);
                c.close = price;
            }
            Some(c) => {
                self.last_closed = Some(*c);
                self.current = Some(Candle {
                    start: bucket_start,
                    open: price,
                    high: price,
                    low: price,
                    close: price,
                });
            }
            None => {
                self.current = Some(Candle {
                    start: bucket_start,
                    open: price,
                    high: price,
                    low: price,
                    close: price,
                });
            }
        }
    }

    /// The most recently *closed* candle, or `None` until a second bucket
    /// has started.
    fn last_closed(&self) -> Option<Candle> {
        self.last_closed
    }
}

#[derive(Debug)]
struct SymbolSeries {
    samples: VecDeque<PriceSample>,
    candles: CandleBuilder,
}

impl SymbolSeries {
    fn new() -> Self {
        Self {
            samples: VecDeque::with_capacity(M3_RING_CAPACITY),
            candles: CandleBuilder::new(ACCEPTANCE_CANDLE_SECS),
        }
    }

    fn trim(&mut self, now: f64) {
        while self.samples.len() > M3_RING_CAPACITY {
            self.samples.pop_front();
        }
        while let Some(front) = self.samples.front() {
            if now - front.timestamp > M3_MAX_AGE_SECS {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Per-symbol ordered price history, owned by `System`.
#[derive(Debug, Default)]
pub struct TemporalStore {
    series: HashMap<String, SymbolSeries>,
    last_timestamp: HashMap<String, f64>,
}

impl TemporalStore {
    pub fn new() -> Self {
        Self {
            series: HashMap::new(),
            last_timestamp: HashMap::new(),
        }
    }

    /// `true` if `timestamp` does not regress the per-symbol clock
    /// (accept-equal, per Open Question 2).
    pub fn is_monotonic(&self, symbol: &str, timestamp: f64) -> bool {
        match self.last_timestamp.get(symbol) {
            Some(&last) => timestamp >= last,
            None => true,
        }
    }

    /// Append a sample. Caller must have already checked `is_monotonic`;
    /// this only enforces it defensively.
    pub fn push(&mut self, symbol: &str, timestamp: f64, price: f64, source: SampleSource) {
        debug_assert!(self.is_monotonic(symbol, timestamp));
        self.last_timestamp.insert(symbol.to_string(), timestamp);
        let series = self
            .series
            .entry(symbol.to_string())
            .or_insert_with(SymbolSeries::new);
        series.samples.push_back(PriceSample {
            timestamp,
            price,
            source,
        });
        if source == SampleSource::Trade {
            series.candles.push(timestamp, price);
        }
        series.trim(timestamp);
    }

    pub fn get_recent_prices(&self, symbol: &str, max_count: Option<usize>) -> Vec<PriceSample> {
        let Some(series) = self.series.get(symbol) else {
            return Vec::new();
        };
        match max_count {
            Some(n) if n < series.samples.len() => {
                let skip = series.samples.len() - n;
                series.samples.iter().skip(skip).copied().collect()
            }
            _ => series.samples.iter().copied().collect(),
        }
    }

    pub fn get_most_recent_price(&self, symbol: &str) -> Option<f64> {
        self.series.get(symbol)?.samples.back().map(|s| s.price)
    }

    pub fn recent_trade_timestamps(&self, symbol: &str) -> Vec<f64> {
        self.series
            .get(symbol)
            .map(|s| {
                s.samples
                    .iter()
                    .filter(|s| s.source == SampleSource::Trade)
                    .map(|s| s.timestamp)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn last_closed_candle(&self, symbol: &str) -> Option<Candle> {
        self.series.get(symbol)?.candles.last_closed()
    }

    /// For invariant tests: are samples for `symbol` sorted ascending?
    pub fn is_sorted(&self, symbol: &str) -> bool {
        let Some(series) = self.series.get(symbol) else {
            return true;
        };
        series.samples.iter().zip(series.samples.iter().skip(1)).all(|(a, b)| a.timestamp <= b.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_read_back_ordered() {
        let mut store = TemporalStore::new();
        store.push("BTC", 1.0, 100.0, SampleSource::Trade);
        store.push("BTC", 2.0, 101.0, SampleSource::Trade);
        let recent = store.get_recent_prices("BTC", None);
        assert_eq!(recent.len(), 2);
        assert_eq!(store.get_most_recent_price("BTC"), Some(101.0));
        assert!(store.is_sorted("BTC"));
    }

    #[test]
    fn max_count_limits_to_tail() {
        let mut store = TemporalStore::new();
        for i in 0..10 {
            store.push("BTC", i as f64, i as f64, SampleSource::Trade);
        }
        let recent = store.get_recent_prices("BTC", Some(3));
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[2].price, 9.0);
    }

    #[test]
    fn regression_is_detected_before_push() {
        let mut store = TemporalStore::new();
        store.push("BTC", 10.0, 100.0, SampleSource::Trade);
        assert!(!store.is_monotonic("BTC", 5.0));
        assert!(store.is_monotonic("BTC", 10.0)); // accept-equal
    }

    #[test]
    fn retention_window_trims_old_samples() {
        let mut store = TemporalStore::new();
        store.push("BTC", 0.0, 100.0, SampleSource::Trade);
        store.push("BTC", M3_MAX_AGE_SECS + 1.0, 200.0, SampleSource::Trade);
        let recent = store.get_recent_prices("BTC", None);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].price, 200.0);
    }

    #[test]
    fn candle_closes_on_next_bucket() {
        let mut store = TemporalStore::new();
        store.push("BTC", 0.1, 100.0, SampleSource::Trade);
        store.push("BTC", 0.5, 102.0, SampleSource::Trade);
        assert!(store.last_closed_candle("BTC").is_none());
        store.push("BTC", 1.2, 101.0, SampleSource::Trade);
        let candle = store.last_closed_candle("BTC").unwrap();
        assert_eq!(candle.open, 100.0);
        assert_eq!(candle.high, 102.0);
        assert_eq!(candle.close, 102.0);
    }

    #[test]
    fn liquidation_samples_excluded_from_trade_burst_source() {
        let mut store = TemporalStore::new();
        store.push("BTC", 1.0, 100.0, SampleSource::Liquidation);
        store.push("BTC", 1.1, 100.0, SampleSource::Trade);
        let trades = store.recent_trade_timestamps("BTC");
        assert_eq!(trades, vec![1.1]);
    }
}
