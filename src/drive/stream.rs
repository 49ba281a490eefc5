//! Shared HTTP plumbing for both download strategies

use crate::error::FetchError;
use crate::types::Event;
use crate::utils::format_mib;
use futures::{Stream, StreamExt};
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Write buffer size for downloaded bodies
pub(crate) const CHUNK_SIZE: usize = 32 * 1024;

/// Minimum gap between two progress reports
pub(crate) const PROGRESS_INTERVAL: Duration = Duration::from_secs(2);

/// Send a request, giving up when the response headers take longer than `timeout`
pub(crate) async fn send(
    request: reqwest::RequestBuilder,
    timeout: Duration,
) -> Result<reqwest::Response, FetchError> {
    match tokio::time::timeout(timeout, request.send()).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(FetchError::Stalled {
            seconds: timeout.as_secs(),
        }),
    }
}

/// Does the response carry an HTML page instead of file content?
pub(crate) fn is_html(response: &reqwest::Response) -> bool {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.to_ascii_lowercase().contains("text/html"))
}

/// Pull the next body chunk, failing when nothing arrives within `read_timeout`
async fn next_chunk<S, B>(stream: &mut S, read_timeout: Duration) -> Result<Option<B>, FetchError>
where
    S: Stream<Item = reqwest::Result<B>> + Unpin,
{
    match tokio::time::timeout(read_timeout, stream.next()).await {
        Ok(Some(chunk)) => Ok(Some(chunk?)),
        Ok(None) => Ok(None),
        Err(_) => Err(FetchError::Stalled {
            seconds: read_timeout.as_secs(),
        }),
    }
}

/// Read at most roughly `limit` bytes of a body into memory
///
/// Reading stops at the first chunk that crosses the limit; the rest of the
/// body is discarded with the response.
pub(crate) async fn read_prefix(
    response: reqwest::Response,
    limit: usize,
    read_timeout: Duration,
) -> Result<Vec<u8>, FetchError> {
    let mut stream = response.bytes_stream();
    let mut head = Vec::new();

    while head.len() <= limit {
        match next_chunk(&mut stream, read_timeout).await? {
            Some(chunk) => head.extend_from_slice(&chunk),
            None => break,
        }
    }

    Ok(head)
}

/// Read the start of a page body as text, see [`read_prefix`]
pub(crate) async fn read_text(
    response: reqwest::Response,
    limit: usize,
    read_timeout: Duration,
) -> Result<String, FetchError> {
    let head = read_prefix(response, limit, read_timeout).await?;
    Ok(String::from_utf8_lossy(&head).into_owned())
}

/// Stream a response body into `dest`
///
/// Data goes through a 32 KiB write buffer. A progress event is emitted at most
/// every [`PROGRESS_INTERVAL`]. Returns the number of bytes written.
pub(crate) async fn save_body(
    response: reqwest::Response,
    dest: &Path,
    read_timeout: Duration,
    events: &broadcast::Sender<Event>,
) -> Result<u64, FetchError> {
    let total = response.content_length();
    if let Some(total) = total {
        info!("File size: {}", format_mib(total));
    }

    let file = tokio::fs::File::create(dest).await?;
    let mut writer = tokio::io::BufWriter::with_capacity(CHUNK_SIZE, file);
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;
    let mut last_report = Instant::now();

    while let Some(chunk) = next_chunk(&mut stream, read_timeout).await? {
        writer.write_all(&chunk).await?;
        written += chunk.len() as u64;

        if last_report.elapsed() >= PROGRESS_INTERVAL {
            last_report = Instant::now();
            match total {
                Some(total) if total > 0 => info!(
                    "Progress: {:.1}% ({}/{})",
                    written as f64 * 100.0 / total as f64,
                    format_mib(written),
                    format_mib(total)
                ),
                _ => info!("Downloaded: {}", format_mib(written)),
            }
            events
                .send(Event::DownloadProgress {
                    downloaded: written,
                    total,
                })
                .ok();
        }
    }

    writer.flush().await?;
    debug!(path = %dest.display(), bytes = written, "body saved");
    Ok(written)
}
