//! Binance combined-stream URL construction.

/// Default Binance websocket endpoint.
pub const DEFAULT_BASE_URL: &str = "wss://stream.binance.com:9443";

/// Builds the combined aggregated-trade stream URL for `symbols`.
///
/// URL format: `{base}/stream?streams={symbol}@aggTrade/...`, symbols in
/// lower case.
///
/// # Example
///
/// ```
/// use candlestream_source::url::stream_url;
///
/// let url = stream_url("wss://stream.binance.com:9443", &["BTCUSDT", "ethusdt"]);
/// assert_eq!(
///     url,
///     "wss://stream.binance.com:9443/stream?streams=btcusdt@aggTrade/ethusdt@aggTrade"
/// );
/// ```
#[must_use]
pub fn stream_url<S: AsRef<str>>(base: &str, symbols: &[S]) -> String {
    let streams: Vec<String> = symbols
        .iter()
        .map(|s| s.as_ref().trim())
        .filter(|s| !s.is_empty())
        .map(|s| format!("{}@aggTrade", s.to_lowercase()))
        .collect();
    format!(
        "{}/stream?streams={}",
        base.trim_end_matches('/'),
        streams.join("/")
    )
}
