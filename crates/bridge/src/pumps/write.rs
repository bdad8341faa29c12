//! Bridge write pump: serialises outbound lines.

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Writes queued lines to the backend, one per `\n`.
///
/// The writer is shut down on exit, which closes the backend's input.
pub(crate) async fn write_pump<W>(
    mut writer: W,
    mut write_rx: mpsc::Receiver<String>,
    cancel: CancellationToken,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            line = write_rx.recv() => {
                let Some(mut line) = line else { break };
                line.push('\n');
                if let Err(e) = write_line(&mut writer, &line).await {
                    error!("bridge write error: {e}");
                    break;
                }
            }
        }
    }

    if let Err(e) = writer.shutdown().await {
        debug!("bridge writer shutdown: {e}");
    }
}

async fn write_line<W>(writer: &mut W, line: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await
}
