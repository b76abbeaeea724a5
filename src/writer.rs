//! Dedicated writer task draining the outbound packet queue.
//!
//! Callers never touch the socket: `send_message` adds packets to an
//! [`AsyncQueue`] and this task writes them in order.
//!
//! # Architecture
//!
//! ```text
//! Caller 1 ─┐
//! Caller 2 ─┼─► AsyncQueue<OutboundPacket> ─► Writer Task ─► Stream
//! Caller N ─┘
//! ```
//!
//! Ready packets are batched into a single vectored write.

use std::io::IoSlice;
use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{DebuggerError, Result};
use crate::protocol::OutboundPacket;
use crate::queue::AsyncQueue;

/// Maximum packets to batch in a single write operation.
const MAX_BATCH_SIZE: usize = 64;

/// Spawn the writer task.
///
/// The task ends when `shutdown` is cancelled or a write fails; a failed
/// write cancels `shutdown` so the read side stops as well.
pub(crate) fn spawn_writer_task<W>(
    writer: W,
    queue: Arc<AsyncQueue<OutboundPacket>>,
    shutdown: CancellationToken,
) -> JoinHandle<()>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = writer_loop(writer, &queue, &shutdown).await {
            tracing::error!("Write loop error: {}", e);
        }
        shutdown.cancel();
    })
}

/// Main writer loop - takes packets and writes them to the stream.
async fn writer_loop<W>(
    mut writer: W,
    queue: &AsyncQueue<OutboundPacket>,
    shutdown: &CancellationToken,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    loop {
        let first = tokio::select! {
            _ = shutdown.cancelled() => break,
            packet = queue.take() => packet,
        };

        // Collect additional ready packets (non-blocking)
        let mut batch = Vec::with_capacity(MAX_BATCH_SIZE);
        batch.push(first);
        while batch.len() < MAX_BATCH_SIZE {
            match queue.try_take() {
                Some(packet) => batch.push(packet),
                None => break,
            }
        }

        tokio::select! {
            _ = shutdown.cancelled() => break,
            res = write_batch(&mut writer, &batch) => res?,
        }
    }

    // Closing an already broken stream is not worth reporting.
    let _ = writer.shutdown().await;
    Ok(())
}

/// Write a batch of packets using scatter/gather I/O (write_vectored).
async fn write_batch<W>(writer: &mut W, batch: &[OutboundPacket]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let total_size: usize = batch.iter().map(OutboundPacket::len).sum();
    if total_size == 0 {
        return Ok(());
    }

    let mut total_written = 0;
    while total_written < total_size {
        let slices = build_remaining_slices(batch, total_written);
        let written = writer.write_vectored(&slices).await?;
        if written == 0 {
            return Err(DebuggerError::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "write_vectored returned 0",
            )));
        }
        total_written += written;
    }

    writer.flush().await?;
    Ok(())
}

/// Build IoSlice array for the data not yet written.
fn build_remaining_slices(batch: &[OutboundPacket], skip_bytes: usize) -> Vec<IoSlice<'_>> {
    let mut slices = Vec::with_capacity(batch.len());
    let mut offset = 0;

    for packet in batch {
        let end = offset + packet.len();
        if skip_bytes < end && !packet.is_empty() {
            let start = skip_bytes.saturating_sub(offset);
            slices.push(IoSlice::new(&packet.bytes()[start..]));
        }
        offset = end;
    }

    slices
}
