//! Line-delimited JSON-RPC over a byte stream pair
//!
//! One request line is read, dispatched and answered before the next one is
//! read. Production wires this to stdin/stdout; tests use in-memory buffers.

use std::future::Future;

use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::mcp::{
    registry::ToolRegistry,
    rpc::{json_rpc_error, PARSE_ERROR},
    server::handle_json_rpc_line,
};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("stdio transport failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode outbound message: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    EndOfInput,
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServeSummary {
    pub lines_handled: u64,
    pub reason: ShutdownReason,
}

/// Runs the read/dispatch/write loop until end of input or until `shutdown`
/// resolves.
pub async fn serve<R, W, S>(
    registry: &ToolRegistry,
    mut reader: R,
    mut writer: W,
    shutdown: S,
) -> Result<ServeSummary, TransportError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    S: Future<Output = ()>,
{
    let mut buffer = Vec::new();
    let mut lines_handled: u64 = 0;
    tokio::pin!(shutdown);

    info!(tools = registry.len(), "mcp server starting");

    let reason = loop {
        buffer.clear();
        let read = tokio::select! {
            read = reader.read_until(b'\n', &mut buffer) => read?,
            () = &mut shutdown => {
                info!("server interrupted, shutting down");
                break ShutdownReason::Interrupted;
            }
        };

        if read == 0 {
            info!("input closed, server shutting down normally");
            break ShutdownReason::EndOfInput;
        }

        let messages = match std::str::from_utf8(&buffer) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                lines_handled += 1;
                debug!(line_number = lines_handled, request = %line, "received request");
                handle_json_rpc_line(registry, line).await
            }
            Err(err) => {
                lines_handled += 1;
                warn!(line_number = lines_handled, error = %err, "request line is not valid utf-8");
                vec![json_rpc_error(None, PARSE_ERROR, "Parse error")]
            }
        };

        for message in messages {
            write_message(&mut writer, &message).await?;
        }
    };

    Ok(ServeSummary {
        lines_handled,
        reason,
    })
}

async fn write_message<W>(writer: &mut W, message: &Value) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    let mut encoded = serde_json::to_vec(message)?;
    encoded.push(b'\n');
    writer.write_all(&encoded).await?;
    writer.flush().await?;
    Ok(())
}
