//! The per-generation read and write loops.
//!
//! Each loop owns half of the split stream and nothing else. They never
//! frame packets, never touch state-machine fields, and never close the
//! socket; they move bytes and post events. Both honour the generation's
//! shutdown token at every suspension point.

use std::io;

use log::{debug, trace};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf},
    sync::mpsc,
};
use tokio_util::sync::CancellationToken;

use super::event::Event;
use crate::{
    buffer::BufferCell,
    channel::{ByteReceiver, ByteSender},
    stream::BoxedSessionStream,
};

pub(super) struct LoopContext {
    pub events: mpsc::UnboundedSender<Event>,
    pub shutdown: CancellationToken,
    pub generation: u64,
}

/// Read socket bytes into fresh cells and publish them inbound.
///
/// Each non-empty read is copied into an allocation sized exactly to the
/// bytes read, so nothing downstream can observe stale scratch contents.
/// A zero-byte read or a read error stops the loop and reports upward.
pub(super) async fn read_loop(
    mut reader: ReadHalf<BoxedSessionStream>,
    inbound: ByteSender,
    scratch_size: usize,
    ctx: LoopContext,
) {
    let mut scratch = vec![0u8; scratch_size];
    loop {
        let read = tokio::select! {
            biased;

            () = ctx.shutdown.cancelled() => break,
            res = reader.read(&mut scratch) => res,
        };
        match read {
            Ok(0) => {
                debug!("read loop finished: generation={}, eof", ctx.generation);
                let _ = ctx.events.send(Event::ReadFinished {
                    generation: ctx.generation,
                    error: None,
                });
                break;
            }
            Ok(n) => {
                trace!("read loop moved bytes: generation={}, n={n}", ctx.generation);
                let cell = BufferCell::owned(scratch[..n].to_vec());
                if inbound.write(cell).is_err() {
                    // Full shutdown closed the inbound channel under us.
                    break;
                }
            }
            Err(error) => {
                debug!(
                    "read loop finished: generation={}, error={error}",
                    ctx.generation
                );
                let _ = ctx.events.send(Event::ReadFinished {
                    generation: ctx.generation,
                    error: Some(error),
                });
                break;
            }
        }
    }
}

/// Drain the outbound channel onto the socket.
///
/// Every dequeued cell is released after its write attempt, success or
/// failure. The loop returns the receiver so the channel survives the
/// generation: queued cells carry over to the next socket.
pub(super) async fn write_loop(
    mut writer: WriteHalf<BoxedSessionStream>,
    mut outbound: ByteReceiver,
    ctx: LoopContext,
) -> ByteReceiver {
    loop {
        let cell = tokio::select! {
            biased;

            () = ctx.shutdown.cancelled() => break,
            cell = outbound.read() => match cell {
                Some(cell) => cell,
                None => break,
            },
        };
        let result = tokio::select! {
            biased;

            () = ctx.shutdown.cancelled() => None,
            res = write_cell(&mut writer, &cell) => Some(res),
        };
        drop(cell);
        match result {
            None => break,
            Some(Ok(())) => {}
            Some(Err(error)) => {
                debug!(
                    "write loop finished: generation={}, error={error}",
                    ctx.generation
                );
                let _ = ctx.events.send(Event::WriteError {
                    generation: ctx.generation,
                    error,
                });
                break;
            }
        }
    }
    outbound
}

async fn write_cell(
    writer: &mut WriteHalf<BoxedSessionStream>,
    cell: &BufferCell,
) -> io::Result<()> {
    writer.write_all(cell.bytes()).await?;
    writer.flush().await
}
