//! Trade representation, raw and parsed.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ParseError;

/// A trade record exactly as it arrives on the wire.
///
/// Prices and quantities are kept as text so that no binary float ever sits
/// between the exchange and the aggregation engine. Field names follow the
/// Binance aggregated-trade payload:
///
/// | field | wire name | meaning |
/// |-------|-----------|---------|
/// | `symbol` | `s` | instrument identifier |
/// | `price` | `p` | trade price |
/// | `quantity` | `q` | traded quantity |
/// | `trade_time` | `T` | trade time, Unix milliseconds |
///
/// The remaining fields are optional exchange metadata and are not used by
/// the aggregation engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTrade {
    /// Instrument identifier (e.g. `BTCUSDT`).
    #[serde(rename = "s")]
    pub symbol: String,
    /// Trade price as decimal text.
    #[serde(rename = "p")]
    pub price: String,
    /// Trade quantity as decimal text.
    #[serde(rename = "q")]
    pub quantity: String,
    /// Trade time in Unix milliseconds.
    #[serde(rename = "T")]
    pub trade_time: i64,
    /// Event type (`aggTrade`).
    #[serde(rename = "e", default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    /// Time the exchange emitted the event, Unix milliseconds.
    #[serde(rename = "E", default, skip_serializing_if = "Option::is_none")]
    pub event_time: Option<i64>,
    /// Aggregate trade identifier.
    #[serde(rename = "a", default, skip_serializing_if = "Option::is_none")]
    pub agg_trade_id: Option<i64>,
    /// First underlying trade identifier.
    #[serde(rename = "f", default, skip_serializing_if = "Option::is_none")]
    pub first_trade_id: Option<i64>,
    /// Last underlying trade identifier.
    #[serde(rename = "l", default, skip_serializing_if = "Option::is_none")]
    pub last_trade_id: Option<i64>,
    /// Whether the buyer was the market maker.
    #[serde(rename = "m", default, skip_serializing_if = "Option::is_none")]
    pub is_buyer_maker: Option<bool>,
}

impl RawTrade {
    /// Creates a raw trade without exchange metadata.
    #[must_use]
    pub fn new(
        symbol: impl Into<String>,
        price: impl Into<String>,
        quantity: impl Into<String>,
        trade_time: i64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            price: price.into(),
            quantity: quantity.into(),
            trade_time,
            event_type: None,
            event_time: None,
            agg_trade_id: None,
            first_trade_id: None,
            last_trade_id: None,
            is_buyer_maker: None,
        }
    }

    /// Parses this record into a validated [`Trade`].
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] if any field is malformed.
    pub fn parse(&self) -> Result<Trade, ParseError> {
        Trade::parse(self)
    }
}

/// A validated trade, the input unit of the aggregation engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    /// Instrument identifier.
    pub instrument: String,
    /// Trade price (non-negative).
    pub price: Decimal,
    /// Traded quantity (non-negative).
    pub quantity: Decimal,
    /// Time the trade happened (UTC, millisecond resolution).
    pub event_time: DateTime<Utc>,
}

impl Trade {
    /// Creates a new trade.
    ///
    /// No validation happens here; see [`Trade::validate`].
    #[must_use]
    pub fn new(
        instrument: impl Into<String>,
        price: Decimal,
        quantity: Decimal,
        event_time: DateTime<Utc>,
    ) -> Self {
        Self {
            instrument: instrument.into(),
            price,
            quantity,
            event_time,
        }
    }

    /// Parses a wire record.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] when the instrument is empty, the price or
    /// quantity is not a non-negative decimal, or the trade time is negative
    /// or out of range.
    pub fn parse(raw: &RawTrade) -> Result<Self, ParseError> {
        let price = parse_decimal(&raw.price).ok_or_else(|| ParseError::Price(raw.price.clone()))?;
        let quantity = parse_decimal(&raw.quantity)
            .ok_or_else(|| ParseError::Quantity(raw.quantity.clone()))?;

        if raw.trade_time < 0 {
            return Err(ParseError::EventTime(raw.trade_time));
        }
        let event_time = DateTime::from_timestamp_millis(raw.trade_time)
            .ok_or(ParseError::EventTime(raw.trade_time))?;

        let trade = Self::new(raw.symbol.trim(), price, quantity, event_time);
        trade.validate()?;
        Ok(trade)
    }

    /// Checks the invariants the engine relies on.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] when the instrument is empty or the price or
    /// quantity is negative.
    pub fn validate(&self) -> Result<(), ParseError> {
        if self.instrument.is_empty() {
            return Err(ParseError::EmptyInstrument);
        }
        if is_negative(self.price) {
            return Err(ParseError::Negative {
                field: "price",
                value: self.price,
            });
        }
        if is_negative(self.quantity) {
            return Err(ParseError::Negative {
                field: "quantity",
                value: self.quantity,
            });
        }
        Ok(())
    }

    /// Returns the traded notional (price × quantity), or `None` if it does
    /// not fit in a [`Decimal`].
    #[must_use]
    pub fn notional(&self) -> Option<Decimal> {
        self.price.checked_mul(self.quantity)
    }
}

impl TryFrom<&RawTrade> for Trade {
    type Error = ParseError;

    fn try_from(raw: &RawTrade) -> Result<Self, Self::Error> {
        Self::parse(raw)
    }
}

fn parse_decimal(text: &str) -> Option<Decimal> {
    Decimal::from_str(text.trim()).ok()
}

/// `-0` is accepted as zero.
fn is_negative(value: Decimal) -> bool {
    value.is_sign_negative() && !value.is_zero()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_valid_trade() {
        let raw = RawTrade::new("BTCUSDT", "100.50", "0.25", 1_700_000_000_123);
        let trade = raw.parse().unwrap();

        assert_eq!(trade.instrument, "BTCUSDT");
        assert_eq!(trade.price, dec!(100.50));
        assert_eq!(trade.quantity, dec!(0.25));
        assert_eq!(trade.event_time.timestamp_millis(), 1_700_000_000_123);
    }

    #[test]
    fn test_parse_zero_time_and_zero_price() {
        let raw = RawTrade::new("X", "0.0", "1.0", 0);
        let trade = Trade::try_from(&raw).unwrap();

        assert_eq!(trade.price, Decimal::ZERO);
        assert_eq!(trade.event_time, Utc.timestamp_opt(0, 0).unwrap());
    }

    #[test]
    fn test_parse_malformed_price() {
        let raw = RawTrade::new("BTCUSDT", "abc", "1.0", 0);
        assert_eq!(raw.parse(), Err(ParseError::Price("abc".to_string())));
    }

    #[test]
    fn test_parse_malformed_quantity() {
        let raw = RawTrade::new("BTCUSDT", "1.0", "", 0);
        assert_eq!(raw.parse(), Err(ParseError::Quantity(String::new())));
    }

    #[test]
    fn test_parse_negative_values() {
        let raw = RawTrade::new("BTCUSDT", "-1.0", "1.0", 0);
        assert!(matches!(
            raw.parse(),
            Err(ParseError::Negative { field: "price", .. })
        ));

        let raw = RawTrade::new("BTCUSDT", "1.0", "-0.5", 0);
        assert!(matches!(
            raw.parse(),
            Err(ParseError::Negative {
                field: "quantity",
                ..
            })
        ));
    }

    #[test]
    fn test_parse_negative_zero_is_zero() {
        let raw = RawTrade::new("BTCUSDT", "-0.0", "0", 0);
        assert!(raw.parse().is_ok());
    }

    #[test]
    fn test_parse_negative_time() {
        let raw = RawTrade::new("BTCUSDT", "1.0", "1.0", -1);
        assert_eq!(raw.parse(), Err(ParseError::EventTime(-1)));
    }

    #[test]
    fn test_parse_empty_instrument() {
        let raw = RawTrade::new("  ", "1.0", "1.0", 0);
        assert_eq!(raw.parse(), Err(ParseError::EmptyInstrument));
    }

    #[test]
    fn test_deserialize_binance_payload() {
        let json = r#"{"e":"aggTrade","E":1672515782136,"s":"BNBBTC","a":12345,
            "p":"0.001","q":"100","f":100,"l":105,"T":1672515782136,"m":true,"M":true}"#;
        let raw: RawTrade = serde_json::from_str(json).unwrap();

        assert_eq!(raw.symbol, "BNBBTC");
        assert_eq!(raw.price, "0.001");
        assert_eq!(raw.quantity, "100");
        assert_eq!(raw.trade_time, 1_672_515_782_136);
        assert_eq!(raw.agg_trade_id, Some(12345));
        assert_eq!(raw.is_buyer_maker, Some(true));
    }

    #[test]
    fn test_notional() {
        let trade = Trade::new("X", dec!(2.5), dec!(4), Utc::now());
        assert_eq!(trade.notional(), Some(dec!(10.0)));
    }
}
