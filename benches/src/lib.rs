//! Benchmark utilities for candlestream.

use candlestream_lib::RawTrade;

/// Shape of a synthetic trade stream.
#[derive(Debug, Clone)]
pub struct TradeMix {
    /// Number of distinct instruments, traded round-robin.
    pub instruments: usize,
    /// Total number of trades.
    pub trades: usize,
    /// Milliseconds between consecutive trades.
    pub spacing_ms: i64,
    /// First event time (ms since epoch).
    pub start_ms: i64,
}

impl Default for TradeMix {
    fn default() -> Self {
        Self {
            instruments: 4,
            trades: 100_000,
            // Roughly 600 trades per 1-minute bucket.
            spacing_ms: 100,
            // 2024-01-01T00:00:00Z
            start_ms: 1_704_067_200_000,
        }
    }
}

impl TradeMix {
    /// Returns the instrument name for index `i`.
    pub fn instrument(i: usize) -> String {
        format!("SYM{i}USDT")
    }

    /// Generates the trades, prices drifting in a small sawtooth.
    pub fn generate(&self) -> Vec<RawTrade> {
        let instruments = self.instruments.max(1);
        (0..self.trades)
            .map(|n| {
                let symbol = Self::instrument(n % instruments);
                let cents = 10_000 + (n % 97) as i64 - 48;
                let price = format!("{}.{:02}", cents / 100, cents % 100);
                let quantity = format!("0.{:03}", 1 + n % 999);
                RawTrade::new(symbol, price, quantity, self.start_ms + n as i64 * self.spacing_ms)
            })
            .collect()
    }

    /// Renders the trades as an NDJSON capture, one payload per line.
    pub fn to_ndjson(&self) -> String {
        let mut out = String::new();
        for trade in self.generate() {
            if let Ok(line) = serde_json::to_string(&trade) {
                out.push_str(&line);
                out.push('\n');
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate() {
        let mix = TradeMix {
            trades: 10,
            ..Default::default()
        };
        let trades = mix.generate();
        assert_eq!(trades.len(), 10);
        assert!(trades.iter().all(|t| t.parse().is_ok()));
        assert_eq!(trades[1].symbol, TradeMix::instrument(1));
    }

    #[test]
    fn test_ndjson_lines() {
        let mix = TradeMix {
            trades: 5,
            ..Default::default()
        };
        assert_eq!(mix.to_ndjson().lines().count(), 5);
    }
}
