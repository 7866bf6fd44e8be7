//! Replay of recorded trades from newline-delimited JSON.

use std::path::Path;

use candlestream_types::RawTrade;
use futures::{Stream, stream};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::{SourceError, decode_frame};

/// Streams trades from NDJSON text, one record per line.
///
/// Each line may be a bare trade payload or a combined-stream frame, so raw
/// captures of the websocket can be replayed as-is. Blank lines and control
/// messages are skipped; undecodable lines are logged and skipped. A read
/// error ends the stream.
pub fn replay_stream<R>(reader: R) -> impl Stream<Item = RawTrade>
where
    R: AsyncBufRead + Unpin,
{
    stream::unfold((reader.lines(), 0usize), |(mut lines, mut line_no)| async move {
        loop {
            line_no += 1;
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return None,
                Err(e) => {
                    tracing::warn!(line = line_no, error = %e, "Replay read failed");
                    return None;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match decode_frame(&line) {
                Ok(Some(trade)) => return Some((trade, (lines, line_no))),
                Ok(None) => {}
                Err(e) => tracing::warn!(line = line_no, error = %e, "Skipping undecodable line"),
            }
        }
    })
}

/// Opens a replay file.
///
/// # Errors
///
/// Returns [`SourceError::Io`] if the file cannot be opened.
pub async fn open_replay(
    path: impl AsRef<Path>,
) -> Result<impl Stream<Item = RawTrade>, SourceError> {
    let file = tokio::fs::File::open(path.as_ref()).await?;
    Ok(replay_stream(BufReader::new(file)))
}
