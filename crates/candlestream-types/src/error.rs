//! Error types for candlestream.

use rust_decimal::Decimal;
use thiserror::Error;

/// Errors raised while turning a wire record into a [`Trade`](crate::Trade).
///
/// A trade that fails to parse is dropped; the engine state is never touched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Price is not a decimal number.
    #[error("Invalid price: '{0}'")]
    Price(String),

    /// Quantity is not a decimal number.
    #[error("Invalid quantity: '{0}'")]
    Quantity(String),

    /// A price or quantity is below zero.
    #[error("Negative {field}: {value}")]
    Negative {
        /// Name of the offending field.
        field: &'static str,
        /// The parsed value.
        value: Decimal,
    },

    /// Trade time is negative or not representable.
    #[error("Invalid event time: {0} ms")]
    EventTime(i64),

    /// Instrument identifier is empty.
    #[error("Empty instrument identifier")]
    EmptyInstrument,
}
