//! Console session pump
//!
//! Reads the console's byte stream in whatever chunks the transport
//! delivers and feeds them to the engine. When the stream ends (or fails)
//! the engine is cleared, since its subscriptions and reassembly state
//! belong to the connection that just went away.

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info, warn};

use crate::format::format_hex;
use crate::state::SubscriptionEngine;

const READ_BUFFER_SIZE: usize = 4096;

/// Counters for one session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub bytes: u64,
    pub reads: u64,
    pub changes: u64,
}

/// Pump bytes from `reader` into `engine` until end of stream
pub async fn pump<R>(reader: &mut R, engine: &mut SubscriptionEngine) -> Result<SessionStats>
where
    R: AsyncRead + Unpin,
{
    let mut stats = SessionStats::default();
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    let result = loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break Ok(()),
            Ok(n) => n,
            Err(e) => break Err(e),
        };

        debug!("RX <- {} bytes: {}", n, format_hex(&buf[..n]));
        stats.bytes += n as u64;
        stats.reads += 1;
        stats.changes += engine.ingest(&buf[..n]) as u64;
    };

    engine.clear();

    match result {
        Ok(()) => {
            info!(
                "Console stream closed after {} bytes ({} value changes)",
                stats.bytes, stats.changes
            );
            Ok(stats)
        }
        Err(e) => {
            warn!("Console stream failed: {}", e);
            Err(e).context("Failed to read from console")
        }
    }
}
