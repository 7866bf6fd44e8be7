//! Decoding of websocket frames into trade records.

use candlestream_types::RawTrade;
use serde::Deserialize;

use crate::SourceError;

/// Event type of aggregated-trade payloads.
pub const AGG_TRADE_EVENT: &str = "aggTrade";

#[derive(Deserialize)]
#[serde(untagged)]
enum Frame {
    /// `{"stream": "btcusdt@aggTrade", "data": {...}}`
    Combined { data: RawTrade },
    /// A bare payload, as sent on single-stream connections.
    Direct(RawTrade),
    /// Subscription acknowledgements: `{"result": null, "id": 1}`.
    Control {
        #[serde(rename = "id")]
        _id: serde_json::Value,
    },
}

/// Decodes one text frame.
///
/// Returns `Ok(None)` for control messages and for payloads of other event
/// types.
///
/// # Errors
///
/// Returns [`SourceError::Decode`] if the frame is not valid JSON or has
/// none of the expected shapes.
pub fn decode_frame(text: &str) -> Result<Option<RawTrade>, SourceError> {
    let trade = match serde_json::from_str::<Frame>(text)? {
        Frame::Combined { data, .. } | Frame::Direct(data) => data,
        Frame::Control { .. } => return Ok(None),
    };
    match trade.event_type.as_deref() {
        Some(event) if event != AGG_TRADE_EVENT => Ok(None),
        _ => Ok(Some(trade)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMBINED: &str = r#"{"stream":"btcusdt@aggTrade","data":{"e":"aggTrade","E":1672515782136,
        "s":"BTCUSDT","a":26129,"p":"16850.12","q":"0.015","f":100,"l":105,"T":1672515782134,
        "m":true,"M":true}}"#;

    #[test]
    fn test_decode_combined_frame() {
        let trade = decode_frame(COMBINED).unwrap().unwrap();
        assert_eq!(trade.symbol, "BTCUSDT");
        assert_eq!(trade.price, "16850.12");
        assert_eq!(trade.quantity, "0.015");
        assert_eq!(trade.trade_time, 1_672_515_782_134);
    }

    #[test]
    fn test_decode_direct_payload() {
        let trade = decode_frame(r#"{"s":"ETHUSDT","p":"1200","q":"1","T":0}"#)
            .unwrap()
            .unwrap();
        assert_eq!(trade.symbol, "ETHUSDT");
    }

    #[test]
    fn test_control_message_is_skipped() {
        assert!(decode_frame(r#"{"result":null,"id":1}"#).unwrap().is_none());
    }

    #[test]
    fn test_other_event_is_skipped() {
        let frame = r#"{"e":"trade","s":"BTCUSDT","p":"1","q":"1","T":0}"#;
        assert!(decode_frame(frame).unwrap().is_none());
    }

    #[test]
    fn test_garbage_is_an_error() {
        assert!(matches!(decode_frame("not json"), Err(SourceError::Decode(_))));
        assert!(matches!(
            decode_frame(r#"{"stream":"x","data":{"s":"BTCUSDT"}}"#),
            Err(SourceError::Decode(_))
        ));
    }
}
